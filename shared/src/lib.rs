pub mod crypto;
pub mod error;
pub mod hash;

pub use crypto::{
    public_key_to_address, validate_address, verify_signature, KeyPair, SignedData,
};
pub use error::SharedError;
pub use hash::{leading_zero_nibbles, Hash256};

pub type Result<T> = std::result::Result<T, SharedError>;
