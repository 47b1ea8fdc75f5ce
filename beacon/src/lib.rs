//! Randomness beacon seam.
//!
//! Beacon internals are external. Nodes in a beacon role get their beacon
//! frames routed here and committed blocks pushed to the beacon's
//! confirmed-block queue by the node.

pub mod error;

pub use error::BeaconError;

use shard_types::Peer;

/// Trait for the randomness beacon attached to beacon-role nodes.
pub trait Beacon: Send + Sync {
    fn is_leader(&self) -> bool;

    /// Handle a beacon payload (starting with its own type byte) as leader.
    fn process_leader_message(&self, payload: &[u8]) -> Result<(), BeaconError>;

    fn process_validator_message(&self, payload: &[u8]) -> Result<(), BeaconError>;

    /// Add participants. Returns how many were new.
    fn add_peers(&self, peers: &[Peer]) -> usize;
}
