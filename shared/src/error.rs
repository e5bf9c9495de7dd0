use thiserror::Error;

/// Low-level errors surfaced by the shared crypto/hash primitives.
#[derive(Error, Debug)]
pub enum SharedError {
    #[error("invalid hex encoding: {0}")]
    InvalidHex(String),

    #[error("invalid key size: expected {expected}, got {actual}")]
    InvalidKeySize { expected: usize, actual: usize },

    #[error("cryptographic error: {0}")]
    Cryptographic(String),

    #[error("invalid address: {0}")]
    InvalidAddress(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}
