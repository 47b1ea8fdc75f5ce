//! Consensus seam.
//!
//! The BFT algorithm itself is external. The node hands it whole consensus
//! payloads and asks it about leadership, membership and keys.

pub mod error;

pub use error::ConsensusError;

use shard_types::{Peer, PublicKey};

/// The consensus engine as seen by the node.
pub trait Consensus: Send + Sync {
    /// Whether this node currently leads its shard.
    fn is_leader(&self) -> bool;

    /// Handle a consensus payload in the leader role. The payload starts with
    /// the consensus message type byte.
    fn process_leader_message(&self, payload: &[u8]) -> Result<(), ConsensusError>;

    /// Handle a consensus payload in the validator role.
    fn process_validator_message(&self, payload: &[u8]) -> Result<(), ConsensusError>;

    /// Replace the validator key set. Returns the size of the new set.
    fn update_public_keys(&self, keys: Vec<PublicKey>) -> usize;

    fn validator_peers(&self) -> Vec<Peer>;

    fn public_keys(&self) -> Vec<PublicKey>;

    /// Add validators to the committee. Returns how many were new.
    fn add_peers(&self, peers: &[Peer]) -> usize;

    fn shard_id(&self) -> u32;

    fn node_id(&self) -> u32;
}
