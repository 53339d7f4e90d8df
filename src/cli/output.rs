//! Output formatting for CLI commands

use serde::Serialize;

/// Format output as pretty JSON or a single line
pub fn format_output<T: Serialize>(data: &T, pretty: bool) -> String {
    let rendered = if pretty {
        serde_json::to_string_pretty(data)
    } else {
        serde_json::to_string(data)
    };
    rendered.unwrap_or_else(|_| "{}".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_format_output() {
        let data = json!({"statusCode": 204});
        assert_eq!(format_output(&data, false), r#"{"statusCode":204}"#);
        assert!(format_output(&data, true).contains('\n'));
    }
}
