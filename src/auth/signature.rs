//! 请求签名：HMAC-SHA256(secret, timestamp || body)，小写 hex

use hmac::{Hmac, Mac};
use sha2::Sha256;

/// 签名头
pub const SIGNATURE_HEADER: &str = "X-Signature";
/// 时间戳头（Unix 秒）
pub const TIMESTAMP_HEADER: &str = "X-Timestamp";

/// 计算签名
pub fn sign(secret: &str, timestamp: &str, body: &str) -> String {
    // new_from_slice 对 HMAC 接受任意长度的 key
    let mut mac = match Hmac::<Sha256>::new_from_slice(secret.as_bytes()) {
        Ok(mac) => mac,
        Err(_) => return String::new(),
    };
    mac.update(timestamp.as_bytes());
    mac.update(body.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

/// 校验签名（常量时间比较）
pub fn verify(signature: &str, timestamp: &str, body: &str, secret: &str) -> bool {
    let expected = sign(secret, timestamp, body);
    if expected.is_empty() {
        return false;
    }
    timing_safe_eq(&expected, signature)
}

/// 常量时间字符串比较（长度不同直接返回 false）
pub fn timing_safe_eq(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result: u8 = 0;
    for (x, y) in a.bytes().zip(b.bytes()) {
        result |= x ^ y;
    }
    result == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flip_bit(s: &str, byte: usize, bit: u8) -> String {
        let mut bytes = s.as_bytes().to_vec();
        bytes[byte] ^= 1 << bit;
        String::from_utf8_lossy(&bytes).into_owned()
    }

    #[test]
    fn test_sign_known_vector() {
        // RFC 4231 test case 2: key "Jefe", data "what do ya want for nothing?"
        let sig = sign("Jefe", "what do ya want ", "for nothing?");
        assert_eq!(
            sig,
            "5bdcc146bf60754e6a042426089575c75a003f089d2739839dec58b964ec3843"
        );
    }

    #[test]
    fn test_round_trip() {
        let cases = [
            ("secret", "1700000000", r#"{"context":{"lockState":"locked"}}"#),
            ("", "0", ""),
            ("鍵の秘密", "1760000000", "本文"),
        ];
        for (secret, ts, body) in cases {
            let sig = sign(secret, ts, body);
            assert!(verify(&sig, ts, body, secret));
        }
    }

    #[test]
    fn test_single_bit_mutations_fail() {
        let secret = "shared-secret";
        let ts = "1700000000";
        let body = r#"{"context":{"deviceType":"WoLockPro"}}"#;
        let sig = sign(secret, ts, body);

        for byte in [0, 10, sig.len() - 1] {
            for bit in 0..7 {
                let mutated = flip_bit(&sig, byte, bit);
                assert!(!verify(&mutated, ts, body, secret), "sig byte {} bit {}", byte, bit);
            }
        }
        for byte in 0..body.len() {
            let mutated = flip_bit(body, byte, 0);
            assert!(!verify(&sig, ts, &mutated, secret));
        }
        for byte in 0..ts.len() {
            let mutated = flip_bit(ts, byte, 0);
            assert!(!verify(&sig, &mutated, body, secret));
        }
    }

    #[test]
    fn test_wrong_secret_and_length() {
        let sig = sign("a", "1", "b");
        assert!(!verify(&sig, "1", "b", "c"));
        assert!(!verify(&sig[..10], "1", "b", "a"));
        assert!(!verify("", "1", "b", "a"));
    }

    #[test]
    fn test_timing_safe_eq() {
        assert!(timing_safe_eq("abc", "abc"));
        assert!(!timing_safe_eq("abc", "abd"));
        assert!(!timing_safe_eq("abc", "abcd"));
    }
}
