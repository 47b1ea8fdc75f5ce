//! The seam between the node and whatever carries its bytes.

use std::fmt;

use tokio::sync::mpsc;

use shard_types::Peer;

use crate::NetworkError;

/// Name of a pub-sub group.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GroupId(String);

impl GroupId {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Group every beacon participant and joining node listens on.
    pub fn beacon() -> Self {
        Self::new("beacon")
    }

    pub fn shard(shard_id: u32) -> Self {
        Self(format!("shard/{shard_id}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A message received on a group, still wrapped in its p2p envelope.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GroupMessage {
    pub sender: String,
    pub content: Vec<u8>,
}

/// Receiving end of a group subscription.
pub struct GroupSubscription {
    group: GroupId,
    rx: mpsc::Receiver<GroupMessage>,
}

impl GroupSubscription {
    pub fn new(group: GroupId, rx: mpsc::Receiver<GroupMessage>) -> Self {
        Self { group, rx }
    }

    pub fn group(&self) -> &GroupId {
        &self.group
    }

    /// Next message, or `None` once the publisher side is gone.
    pub async fn recv(&mut self) -> Option<GroupMessage> {
        self.rx.recv().await
    }
}

/// Outbound side of the network as seen by the node.
///
/// Implementations queue or write bytes; none of these calls block on the
/// remote side.
pub trait Transport: Send + Sync {
    /// This node's transport peer id.
    fn local_peer_id(&self) -> &str;

    /// Send a node frame directly to one peer.
    fn send_unicast(&self, peer: &Peer, content: &[u8]) -> Result<(), NetworkError>;

    /// Publish already-enveloped bytes to a single group.
    fn send_to_group(&self, group: &GroupId, content: &[u8]) -> Result<(), NetworkError>;

    /// Publish to every group in turn. Every group is attempted; the first
    /// error is returned.
    fn send_to_groups(&self, groups: &[GroupId], content: &[u8]) -> Result<(), NetworkError> {
        let mut first_err = None;
        for group in groups {
            if let Err(e) = self.send_to_group(group, content) {
                tracing::warn!(group = %group, error = %e, "group publish failed");
                first_err.get_or_insert(e);
            }
        }
        first_err.map_or(Ok(()), Err)
    }

    fn subscribe(&self, group: &GroupId) -> Result<GroupSubscription, NetworkError>;

    /// Make a peer known to the transport's address book.
    fn add_peer(&self, peer: &Peer) -> Result<(), NetworkError>;

    /// Open a connection to a peer (pub-sub mode only).
    fn connect_peer(&self, peer: &Peer) -> Result<(), NetworkError>;
}
