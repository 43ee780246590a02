use blake2::digest::{Update, VariableOutput};
use blake2::Blake2bVar;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{ChunkVaultError, Result};

/// Longest accepted hash string (a 512-bit digest in hex).
const MAX_HASH_HEX_LEN: usize = 128;

/// Content hash of a chunk payload, stored as lowercase hex.
///
/// Clients normally compute this themselves, so any even-length hex digest is
/// accepted. The hex-only alphabet also makes the hash safe to use directly as
/// a metadata key or file name.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ContentHash(String);

impl ContentHash {
    /// Validate and normalize a client-supplied hex digest.
    pub fn parse(raw: &str) -> Result<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty()
            || trimmed.len() % 2 != 0
            || trimmed.len() > MAX_HASH_HEX_LEN
            || !trimmed.bytes().all(|b| b.is_ascii_hexdigit())
        {
            return Err(ChunkVaultError::InvalidHash(raw.to_string()));
        }
        Ok(ContentHash(trimmed.to_ascii_lowercase()))
    }

    /// Compute the hash of `data` as unkeyed BLAKE2b-256.
    pub fn compute(data: &[u8]) -> Self {
        let mut hasher = Blake2bVar::new(32).expect("valid output size");
        hasher.update(data);
        let mut out = [0u8; 32];
        hasher.finalize_variable(&mut out).expect("correct length");
        ContentHash(hex::encode(out))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for ContentHash {
    type Error = ChunkVaultError;

    fn try_from(value: String) -> Result<Self> {
        ContentHash::parse(&value)
    }
}

impl From<ContentHash> for String {
    fn from(value: ContentHash) -> Self {
        value.0
    }
}

impl fmt::Debug for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContentHash({})", &self.0[..self.0.len().min(16)])
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compute_deterministic() {
        let a = ContentHash::compute(b"hello world");
        let b = ContentHash::compute(b"hello world");
        assert_eq!(a, b);
        assert_eq!(a.as_str().len(), 64);
    }

    #[test]
    fn compute_different_data_different_hash() {
        assert_ne!(ContentHash::compute(b"hello"), ContentHash::compute(b"world"));
    }

    #[test]
    fn parse_normalizes_case() {
        let h = ContentHash::parse("ABcd01").unwrap();
        assert_eq!(h.as_str(), "abcd01");
    }

    #[test]
    fn parse_rejects_non_hex_and_traversal() {
        assert!(ContentHash::parse("").is_err());
        assert!(ContentHash::parse("abc").is_err());
        assert!(ContentHash::parse("../etc").is_err());
        assert!(ContentHash::parse("zz").is_err());
        assert!(ContentHash::parse(&"a".repeat(130)).is_err());
    }

    #[test]
    fn serde_roundtrip_validates() {
        let h = ContentHash::compute(b"roundtrip");
        let json = serde_json::to_string(&h).unwrap();
        let back: ContentHash = serde_json::from_str(&json).unwrap();
        assert_eq!(h, back);
        assert!(serde_json::from_str::<ContentHash>("\"not-hex\"").is_err());
    }
}
