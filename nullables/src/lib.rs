//! Nullable collaborators for deterministic testing.
//!
//! Every seam the node talks through (transport, consensus, beacon, chain,
//! chain sync) has an in-memory implementation here that:
//! - records what the node asked of it
//! - can be told to fail on demand
//! - never touches the filesystem or network
//!
//! Usage: swap real implementations for nullables in tests.

pub mod beacon;
pub mod chain;
pub mod consensus;
pub mod network;

pub use beacon::NullBeacon;
pub use chain::{NullChain, NullSyncClient};
pub use consensus::NullConsensus;
pub use network::NullTransport;
