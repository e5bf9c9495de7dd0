use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// 256-bit digest used to identify blocks and transactions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Hash256([u8; 32]);

impl Hash256 {
    /// Creates a zeroed hash
    #[must_use]
    pub const fn zero() -> Self {
        Self([0u8; 32])
    }

    /// Creates a hash from a 32-byte array
    #[must_use]
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Returns the raw bytes of the hash
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Computes the SHA-256 digest of the provided data
    #[must_use]
    pub fn sha256(data: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(data);
        let result = hasher.finalize();
        let mut hash = [0u8; 32];
        hash.copy_from_slice(&result);
        Self(hash)
    }

    /// Checks whether the hex representation has at least `difficulty`
    /// leading zero nibbles — difficulty is a nibble count, not a bit count.
    #[must_use]
    pub fn meets_difficulty(&self, difficulty: u8) -> bool {
        self.leading_zero_nibbles() >= u32::from(difficulty)
    }

    /// Counts leading zero hex nibbles of this hash.
    #[must_use]
    pub fn leading_zero_nibbles(&self) -> u32 {
        leading_zero_nibbles(&self.to_hex())
    }

    #[must_use]
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

/// Counts leading `'0'` hex characters in an arbitrary hex string, for
/// checking difficulty against hashes reconstructed from storage.
#[must_use]
pub fn leading_zero_nibbles(hex_hash: &str) -> u32 {
    hex_hash.chars().take_while(|&c| c == '0').count() as u32
}

impl fmt::Display for Hash256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl TryFrom<&str> for Hash256 {
    type Error = hex::FromHexError;

    fn try_from(hex_string: &str) -> Result<Self, Self::Error> {
        let bytes = hex::decode(hex_string)?;
        if bytes.len() != 32 {
            return Err(hex::FromHexError::InvalidStringLength);
        }
        let mut hash = [0u8; 32];
        hash.copy_from_slice(&bytes);
        Ok(Self(hash))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_creation_and_display() {
        let hash = Hash256::zero();
        assert_eq!(hash.to_string().len(), 64);
        assert!(hash.to_string().chars().all(|c| c == '0'));
    }

    #[test]
    fn test_sha256_hashing() {
        let data = b"hello world";
        let hash = Hash256::sha256(data);
        assert_ne!(hash, Hash256::zero());
        assert_eq!(hash, Hash256::sha256(data));
    }

    #[test]
    fn test_difficulty_check_counts_nibbles() {
        let easy = Hash256::from_bytes([
            0x00, 0xab, 0xcd, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0,
            0, 0, 0, 0, 0, 0,
        ]);
        assert!(easy.meets_difficulty(2));
        assert!(!easy.meets_difficulty(3));
    }

    #[test]
    fn roundtrip_hex_parse() {
        let h = Hash256::sha256(b"roundtrip");
        let parsed = Hash256::try_from(h.to_hex().as_str()).unwrap();
        assert_eq!(h, parsed);
    }

    #[test]
    fn leading_zero_nibbles_on_raw_hex() {
        assert_eq!(leading_zero_nibbles("000a1b"), 3);
        assert_eq!(leading_zero_nibbles("a1b"), 0);
    }
}
