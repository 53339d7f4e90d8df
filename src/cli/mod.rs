//! CLI command handling

pub mod handle;
pub mod output;
pub mod setup_webhook;
pub mod sign;
pub mod state;

pub use handle::*;
pub use output::*;
pub use setup_webhook::*;
pub use sign::*;
pub use state::*;
