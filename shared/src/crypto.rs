//! Key generation, signing, and address encoding for the ledger.
//!
//! Addresses are opaque to `ledger-core`: it only ever compares them as
//! strings. This module is the one place that understands their shape
//! (Base58Check over `0x00 || RIPEMD160(SHA256(pubkey))`).

use crate::error::SharedError;
use base58check::{FromBase58Check, ToBase58Check};
use ripemd::Ripemd160;
use secp256k1::{ecdsa::Signature as EcdsaSignature, Message, PublicKey, Secp256k1, SecretKey};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

const ADDRESS_VERSION: u8 = 0x00;

/// A secp256k1 keypair used to sign transaction hashes.
#[derive(Debug, Clone)]
pub struct KeyPair {
    pub secret_key: SecretKey,
    pub public_key: PublicKey,
}

impl KeyPair {
    /// Generates a new random keypair.
    #[must_use]
    pub fn generate() -> Self {
        let secp = Secp256k1::new();
        let mut rng = rand::thread_rng();
        let (secret_key, public_key) = secp.generate_keypair(&mut rng);
        Self {
            secret_key,
            public_key,
        }
    }

    /// Derives the Base58Check address for this keypair's public key.
    #[must_use]
    pub fn address(&self) -> String {
        public_key_to_address(&self.public_key)
    }

    /// Signs a 32-byte hash, returning the compact DER signature bytes.
    pub fn sign(&self, hash: &[u8; 32]) -> Result<Vec<u8>, SharedError> {
        let secp = Secp256k1::signing_only();
        let message = Message::from_digest_slice(hash)
            .map_err(|e| SharedError::Cryptographic(e.to_string()))?;
        let signature = secp.sign_ecdsa(&message, &self.secret_key);
        Ok(signature.serialize_der().to_vec())
    }
}

/// Encodes a public key into its Base58Check address form:
/// version byte `0x00` followed by `RIPEMD160(SHA256(pubkey))`.
#[must_use]
pub fn public_key_to_address(public_key: &PublicKey) -> String {
    let sha = Sha256::digest(public_key.serialize());
    let mut ripemd = Ripemd160::new();
    ripemd.update(sha);
    let pubkey_hash = ripemd.finalize();
    pubkey_hash.to_vec().to_base58check(ADDRESS_VERSION)
}

/// Validates that `address` is well-formed Base58Check (does not prove
/// ownership — only that it decodes to a 20-byte payload under our version).
pub fn validate_address(address: &str) -> Result<(), SharedError> {
    let (version, payload) = address
        .from_base58check()
        .map_err(|_| SharedError::InvalidAddress(address.to_string()))?;
    if version != ADDRESS_VERSION || payload.len() != 20 {
        return Err(SharedError::InvalidAddress(address.to_string()));
    }
    Ok(())
}

/// Verifies a DER-encoded secp256k1 signature against a 32-byte hash and
/// a public key serialized in compressed SEC1 form.
pub fn verify_signature(
    hash: &[u8; 32],
    signature_der: &[u8],
    public_key_bytes: &[u8],
) -> Result<bool, SharedError> {
    let secp = Secp256k1::verification_only();
    let message = Message::from_digest_slice(hash)
        .map_err(|e| SharedError::Cryptographic(e.to_string()))?;
    let public_key = PublicKey::from_slice(public_key_bytes)
        .map_err(|e| SharedError::Cryptographic(e.to_string()))?;
    let signature = EcdsaSignature::from_der(signature_der)
        .map_err(|e| SharedError::Cryptographic(e.to_string()))?;
    Ok(secp.verify_ecdsa(&message, &signature, &public_key).is_ok())
}

/// A signature bundled with the public key that produced it; this is
/// what ends up serialized into a `TxInput::signature` byte string.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignedData {
    pub signature_der: Vec<u8>,
    pub public_key: Vec<u8>,
}

impl SignedData {
    pub fn sign(keypair: &KeyPair, hash: &[u8; 32]) -> Result<Self, SharedError> {
        Ok(Self {
            signature_der: keypair.sign(hash)?,
            public_key: keypair.public_key.serialize().to_vec(),
        })
    }

    pub fn verify(&self, hash: &[u8; 32]) -> Result<bool, SharedError> {
        verify_signature(hash, &self.signature_der, &self.public_key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_hash(data: &[u8]) -> [u8; 32] {
        let digest = Sha256::digest(data);
        let mut out = [0u8; 32];
        out.copy_from_slice(&digest);
        out
    }

    #[test]
    fn address_roundtrips_through_base58check() {
        let keypair = KeyPair::generate();
        let address = keypair.address();
        assert!(validate_address(&address).is_ok());
    }

    #[test]
    fn signature_verifies_against_its_own_hash() {
        let keypair = KeyPair::generate();
        let hash = test_hash(b"some transaction bytes");
        let signed = SignedData::sign(&keypair, &hash).unwrap();
        assert!(signed.verify(&hash).unwrap());
    }

    #[test]
    fn signature_fails_against_a_different_hash() {
        let keypair = KeyPair::generate();
        let hash = test_hash(b"original");
        let other = test_hash(b"tampered");
        let signed = SignedData::sign(&keypair, &hash).unwrap();
        assert!(!signed.verify(&other).unwrap());
    }
}
