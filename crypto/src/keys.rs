//! Ed25519 key handling.

use ed25519_dalek::{SigningKey, VerifyingKey, PUBLIC_KEY_LENGTH};
use rand::rngs::OsRng;
use shard_types::{Address, KeyPair, PrivateKey, PublicKey};

use crate::{blake2b_256, CryptoError};

/// Generate a new Ed25519 key pair from a secure random source.
pub fn generate_keypair() -> KeyPair {
    let signing_key = SigningKey::generate(&mut OsRng);
    KeyPair {
        public: PublicKey(signing_key.verifying_key().to_bytes()),
        private: PrivateKey(signing_key.to_bytes()),
    }
}

/// Derive a key pair from a 32-byte seed (deterministic).
pub fn keypair_from_seed(seed: &[u8; 32]) -> KeyPair {
    let signing_key = SigningKey::from_bytes(seed);
    KeyPair {
        public: PublicKey(signing_key.verifying_key().to_bytes()),
        private: PrivateKey(signing_key.to_bytes()),
    }
}

/// Deserialize a public key received from the network.
///
/// Rejects wrong lengths and byte strings that do not decompress to a point
/// on the curve.
pub fn decode_public_key(bytes: &[u8]) -> Result<PublicKey, CryptoError> {
    let arr: [u8; PUBLIC_KEY_LENGTH] = bytes.try_into().map_err(|_| CryptoError::KeyLength {
        expected: PUBLIC_KEY_LENGTH,
        actual: bytes.len(),
    })?;
    VerifyingKey::from_bytes(&arr).map_err(|_| CryptoError::InvalidKey)?;
    Ok(PublicKey(arr))
}

/// Account address owned by a public key: last 20 bytes of its Blake2b-256.
pub fn address_from_public_key(key: &PublicKey) -> Address {
    let digest = blake2b_256(key.as_bytes());
    let mut out = [0u8; 20];
    out.copy_from_slice(&digest[12..]);
    Address::new(out)
}
