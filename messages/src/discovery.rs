//! Ping / pong discovery payloads.
//!
//! Public keys travel as raw bytes so that one malformed key inside a pong
//! can be skipped without rejecting the whole message.

use serde::{Deserialize, Serialize};
use shard_types::{Peer, PeerRole};

/// Discovery protocol version carried in every ping.
pub const DISCOVERY_VERSION: u16 = 1;

/// Self-describing peer record as it appears on the wire.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerDescriptor {
    pub ip: String,
    pub port: u16,
    pub peer_id: String,
    pub validator_id: u32,
    pub public_key: Vec<u8>,
    pub role: PeerRole,
}

impl PeerDescriptor {
    /// Wire form of a peer. A missing key is sent as an empty byte string.
    pub fn from_peer(peer: &Peer) -> Self {
        Self {
            ip: peer.ip.clone(),
            port: peer.port,
            peer_id: peer.peer_id.clone(),
            validator_id: peer.validator_id,
            public_key: peer.public_key.map(|k| k.to_vec()).unwrap_or_default(),
            role: peer.role,
        }
    }
}

/// Sent by a joining node to announce itself.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PingMessage {
    pub version: u16,
    pub node: PeerDescriptor,
}

impl PingMessage {
    pub fn new(peer: &Peer) -> Self {
        Self {
            version: DISCOVERY_VERSION,
            node: PeerDescriptor::from_peer(peer),
        }
    }
}

/// Sent by the discovery leader: the full validator membership and key set.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PongMessage {
    pub peers: Vec<PeerDescriptor>,
    pub public_keys: Vec<Vec<u8>>,
}

impl PongMessage {
    pub fn new(peers: &[Peer], public_keys: &[shard_types::PublicKey]) -> Self {
        Self {
            peers: peers.iter().map(PeerDescriptor::from_peer).collect(),
            public_keys: public_keys.iter().map(|k| k.to_vec()).collect(),
        }
    }
}
