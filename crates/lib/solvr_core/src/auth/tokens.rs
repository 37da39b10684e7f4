//! Random secret generation and one-way hashing for stored credentials.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rand::{RngCore, rng};
use sha2::{Digest, Sha256};

/// Fill `len` bytes from the thread-local CSPRNG.
pub fn random_bytes(len: usize) -> Vec<u8> {
    let mut bytes = vec![0u8; len];
    rng().fill_bytes(&mut bytes);
    bytes
}

/// `len` random bytes, URL-safe base64 without padding.
pub fn random_url_safe(len: usize) -> String {
    URL_SAFE_NO_PAD.encode(random_bytes(len))
}

/// `len` random bytes, lowercase hex.
pub fn random_hex(len: usize) -> String {
    hex::encode(random_bytes(len))
}

/// SHA-256 hash a token for storage (lowercase hex).
pub fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_is_deterministic_hex() {
        let a = hash_token("secret");
        assert_eq!(a, hash_token("secret"));
        assert_eq!(a.len(), 64);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
        assert_ne!(a, hash_token("secret2"));
    }

    #[test]
    fn random_hex_has_two_chars_per_byte() {
        let token = random_hex(32);
        assert_eq!(token.len(), 64);
        assert_ne!(token, random_hex(32));
    }

    #[test]
    fn random_url_safe_has_no_padding_or_unsafe_chars() {
        let token = random_url_safe(64);
        assert!(!token.contains(['+', '/', '=']));
    }
}
