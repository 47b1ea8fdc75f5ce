//! Cryptographic primitives for the shard node.
//!
//! - **Ed25519** validator keys, with strict decoding of keys received from peers
//! - **Blake2b-256** for content hashing and address derivation
//! - **Keccak-256** four-byte function selectors for staking contract calls

pub mod error;
pub mod hash;
pub mod keys;
pub mod selector;

pub use error::CryptoError;
pub use hash::{blake2b_256, blake2b_256_multi};
pub use keys::{address_from_public_key, decode_public_key, generate_keypair, keypair_from_seed};
pub use selector::{function_selector, Selector};
