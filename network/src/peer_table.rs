//! Known peers of this node, keyed by `ip:port:peer_id`.

use std::collections::BTreeMap;

use shard_types::{Peer, PeerRole};

/// Maps a peer's consensus port to the port its sync service listens on.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SyncPortMapping {
    pub offset: u16,
}

impl SyncPortMapping {
    pub const DEFAULT_OFFSET: u16 = 3000;

    pub fn new(offset: u16) -> Self {
        Self { offset }
    }

    /// `None` when the port is below the offset.
    pub fn translate(&self, port: u16) -> Option<u16> {
        port.checked_sub(self.offset)
    }
}

impl Default for SyncPortMapping {
    fn default() -> Self {
        Self::new(Self::DEFAULT_OFFSET)
    }
}

/// Peer registry owned by the node.
///
/// The designated client peer lives in its own slot and is never part of the
/// general table.
#[derive(Debug, Default)]
pub struct PeerTable {
    peers: BTreeMap<String, Peer>,
    incoming: Vec<Peer>,
    client: Option<Peer>,
}

impl PeerTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert peers not yet known. Returns how many were new.
    pub fn add_peers(&mut self, peers: &[Peer]) -> usize {
        let mut added = 0;
        for peer in peers {
            let key = peer.key();
            if self.peers.contains_key(&key) {
                continue;
            }
            self.peers.insert(key, peer.clone());
            added += 1;
        }
        added
    }

    pub fn add_incoming_peer(&mut self, peer: Peer) {
        self.incoming.push(peer);
    }

    pub fn incoming_peers(&self) -> &[Peer] {
        &self.incoming
    }

    /// Snapshot of peers with their sync ports, excluding this node's port.
    pub fn syncing_peers(&self, self_port: u16, mapping: &SyncPortMapping) -> Vec<Peer> {
        let mut out = Vec::with_capacity(self.peers.len());
        for peer in self.peers.values() {
            if peer.port == self_port {
                continue;
            }
            match mapping.translate(peer.port) {
                Some(port) => {
                    let mut synced = peer.clone();
                    synced.port = port;
                    out.push(synced);
                }
                None => {
                    tracing::warn!(
                        peer = %peer,
                        offset = mapping.offset,
                        "cannot derive sync port, skipping"
                    );
                }
            }
        }
        out
    }

    pub fn validator_peers(&self) -> Vec<Peer> {
        self.peers
            .values()
            .filter(|p| p.role == PeerRole::Validator)
            .cloned()
            .collect()
    }

    pub fn client_peer(&self) -> Option<&Peer> {
        self.client.as_ref()
    }

    pub fn set_client_peer(&mut self, peer: Peer) {
        self.client = Some(peer);
    }

    /// Look a peer up by transport id, including the client slot.
    pub fn find_by_peer_id(&self, peer_id: &str) -> Option<&Peer> {
        if peer_id.is_empty() {
            return None;
        }
        self.peers
            .values()
            .find(|p| p.peer_id == peer_id)
            .or_else(|| self.client.as_ref().filter(|c| c.peer_id == peer_id))
    }

    pub fn contains(&self, peer: &Peer) -> bool {
        self.peers.contains_key(&peer.key())
    }

    pub fn len(&self) -> usize {
        self.peers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }
}
