//! Fundamental types for the shard node.
//!
//! This crate defines the core types shared across every other crate in the
//! workspace: addresses, hashes, keys, peers, transactions and blocks.

pub mod address;
pub mod block;
pub mod error;
pub mod hash;
pub mod keys;
pub mod peer;
pub mod transaction;

pub use address::Address;
pub use block::{Block, BlockHeader};
pub use error::TypesError;
pub use hash::{BlockHash, TxHash};
pub use keys::{KeyPair, PrivateKey, PublicKey};
pub use peer::{Peer, PeerRole};
pub use transaction::Transaction;

use blake2::digest::consts::U32;
use blake2::{Blake2b, Digest};

/// Blake2b-256 over a list of byte slices. Used for content hashes of
/// transactions and block headers.
pub(crate) fn content_hash(parts: &[&[u8]]) -> [u8; 32] {
    let mut hasher = Blake2b::<U32>::new();
    for part in parts {
        hasher.update(part);
    }
    let mut output = [0u8; 32];
    output.copy_from_slice(&hasher.finalize());
    output
}
