//! Decoding of bus payloads into mail requests.
//!
//! Wire values are space-delimited: `"<email> <key> <method>"` on `auth`
//! and `"<email> <nickname>"` on `daily`. Anything that does not match is
//! a poison message and gets dropped by the worker.

use crate::error::{EmailError, EmailResult};

/// A confirmation email request claimed from the `auth` topic.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AuthRequest {
    pub email: String,
    pub key: String,
    pub method: String,
}

impl AuthRequest {
    pub fn decode(payload: &[u8]) -> EmailResult<Self> {
        let value = std::str::from_utf8(payload)
            .map_err(|e| EmailError::Decode(format!("auth payload is not utf-8: {}", e)))?;

        let parts: Vec<&str> = value.split(' ').collect();
        let [email, key, method] = parts[..] else {
            return Err(EmailError::Decode(format!(
                "auth payload has {} fields, expected 3",
                parts.len()
            )));
        };

        if !matches!(method, "ADD" | "DELETE") {
            return Err(EmailError::Decode(format!("unknown method {:?}", method)));
        }

        Ok(Self {
            email: email.to_string(),
            key: key.to_string(),
            method: method.to_string(),
        })
    }
}

/// A daily delivery request claimed from the `daily` topic.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DailyRequest {
    pub email: String,
    pub nickname: String,
}

impl DailyRequest {
    pub fn decode(payload: &[u8]) -> EmailResult<Self> {
        let value = std::str::from_utf8(payload)
            .map_err(|e| EmailError::Decode(format!("daily payload is not utf-8: {}", e)))?;

        let parts: Vec<&str> = value.split(' ').collect();
        let [email, nickname] = parts[..] else {
            return Err(EmailError::Decode(format!(
                "daily payload has {} fields, expected 2",
                parts.len()
            )));
        };

        Ok(Self {
            email: email.to_string(),
            nickname: nickname.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_auth_request() {
        let req = AuthRequest::decode(b"arbuz@gmail.com s0mek3y ADD").unwrap();
        assert_eq!(req.email, "arbuz@gmail.com");
        assert_eq!(req.key, "s0mek3y");
        assert_eq!(req.method, "ADD");
    }

    #[test]
    fn test_decode_auth_request_delete() {
        let req = AuthRequest::decode(b"arbuz@gmail.com t0k DELETE").unwrap();
        assert_eq!(req.method, "DELETE");
    }

    #[test]
    fn test_decode_auth_request_wrong_arity() {
        assert!(AuthRequest::decode(b"arbuz@gmail.com ADD").is_err());
        assert!(AuthRequest::decode(b"a b c d").is_err());
        assert!(AuthRequest::decode(b"").is_err());
    }

    #[test]
    fn test_decode_auth_request_unknown_method() {
        assert!(AuthRequest::decode(b"arbuz@gmail.com t0k EXPLODE").is_err());
    }

    #[test]
    fn test_decode_daily_request() {
        let req = DailyRequest::decode(b"arbuz@gmail.com arbuz").unwrap();
        assert_eq!(req.email, "arbuz@gmail.com");
        assert_eq!(req.nickname, "arbuz");
    }

    #[test]
    fn test_decode_daily_request_wrong_arity() {
        assert!(DailyRequest::decode(b"arbuz@gmail.com").is_err());
        assert!(DailyRequest::decode(b"a b c").is_err());
    }

    #[test]
    fn test_decode_rejects_invalid_utf8() {
        assert!(AuthRequest::decode(&[0xff, 0xfe, 0x20, 0x20]).is_err());
    }
}
