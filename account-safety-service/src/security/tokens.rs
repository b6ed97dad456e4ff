//! Opaque token generation and hashing.
//!
//! Raw tokens are handed to the caller exactly once; only their SHA-256
//! hex digest is ever persisted, so a database leak does not expose
//! usable tokens.

use rand::rngs::OsRng;
use rand::RngCore;
use sha2::{Digest, Sha256};

/// Generate a 256-bit random token as 64 hex characters
pub fn generate_token() -> String {
    let mut bytes = [0u8; 32];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// SHA-256 hex digest of a raw token (64 characters)
pub fn hash_token(raw: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(raw.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_token_length_and_charset() {
        let token = generate_token();
        assert_eq!(token.len(), 64);
        assert!(token.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_generate_token_is_unique() {
        assert_ne!(generate_token(), generate_token());
    }

    #[test]
    fn test_hash_token_deterministic() {
        let raw = "a".repeat(64);
        assert_eq!(hash_token(&raw), hash_token(&raw));
        assert_eq!(hash_token(&raw).len(), 64);
    }

    #[test]
    fn test_hash_differs_from_raw() {
        let raw = generate_token();
        assert_ne!(hash_token(&raw), raw);
    }
}
