//! Opaque 32-byte secrets used for cosigner tokens, join keys and the admin token

use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Token length in bytes
pub const TOKEN_SIZE: usize = 32;

/// A capability secret, compared by exact value
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Token([u8; TOKEN_SIZE]);

impl Token {
    /// Generate a fresh random token
    pub fn generate() -> Self {
        let mut bytes = [0u8; TOKEN_SIZE];
        OsRng.fill_bytes(&mut bytes);
        Self(bytes)
    }

    /// Parse a 64-character hex token; `None` when malformed
    pub fn from_hex(s: &str) -> Option<Self> {
        if s.len() != TOKEN_SIZE * 2 {
            return None;
        }

        let bytes = hex::decode(s).ok()?;
        let mut token = [0u8; TOKEN_SIZE];
        token.copy_from_slice(&bytes);
        Some(Self(token))
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    pub fn as_bytes(&self) -> &[u8; TOKEN_SIZE] {
        &self.0
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Token(<redacted>)")
    }
}

impl Serialize for Token {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Token {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Token::from_hex(&s).ok_or_else(|| serde::de::Error::custom("malformed token"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_unique() {
        let a = Token::generate();
        let b = Token::generate();
        assert_ne!(a, b);
        assert_eq!(a.to_hex().len(), 64);
    }

    #[test]
    fn test_from_hex() {
        let token = Token::generate();
        assert_eq!(Token::from_hex(&token.to_hex()), Some(token));

        assert!(Token::from_hex("abcd").is_none());
        assert!(Token::from_hex(&"zz".repeat(32)).is_none());
        assert!(Token::from_hex(&"aa".repeat(33)).is_none());
    }

    #[test]
    fn test_debug_is_redacted() {
        let token = Token::generate();
        let debug = format!("{:?}", token);
        assert!(!debug.contains(&token.to_hex()));
    }

    #[test]
    fn test_serde_as_hex() {
        let token = Token::from_hex(&"0f".repeat(32)).unwrap();
        let json = serde_json::to_string(&token).unwrap();
        assert_eq!(json, format!("\"{}\"", "0f".repeat(32)));

        let parsed: Token = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, token);
        assert!(serde_json::from_str::<Token>("\"nope\"").is_err());
    }
}
