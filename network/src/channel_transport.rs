//! Channel-backed transport.
//!
//! Unicast sends do not touch sockets. They push an [`Outbound`] entry onto
//! an `mpsc` channel that the connection layer drains. Group publishes go
//! through a [`GroupHub`], an in-process pub-sub shared by every transport
//! created from it.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;

use shard_types::Peer;

use crate::transport::{GroupId, GroupMessage, GroupSubscription, Transport};
use crate::NetworkError;

/// Per-subscriber buffer.
const SUBSCRIPTION_BUFFER: usize = 256;

/// One unit of work for the connection layer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Outbound {
    /// Write `content` to the peer's stream.
    Unicast { peer: Peer, content: Vec<u8> },
    /// Reachability check. The drain dials the peer and drops the stream;
    /// later unicasts open their own.
    Connect(Peer),
}

/// In-process pub-sub fan-out.
#[derive(Clone, Default)]
pub struct GroupHub {
    subscribers: Arc<Mutex<HashMap<GroupId, Vec<mpsc::Sender<GroupMessage>>>>>,
}

impl GroupHub {
    pub fn new() -> Self {
        Self::default()
    }

    fn subscribe(&self, group: &GroupId) -> Result<GroupSubscription, NetworkError> {
        let (tx, rx) = mpsc::channel(SUBSCRIPTION_BUFFER);
        let mut subs = self.subscribers.lock().map_err(|_| NetworkError::Closed)?;
        subs.entry(group.clone()).or_default().push(tx);
        Ok(GroupSubscription::new(group.clone(), rx))
    }

    /// Deliver to every live subscriber of `group`. Dropped subscribers are
    /// pruned; a full subscriber buffer fails the publish.
    fn publish(&self, group: &GroupId, sender: &str, content: &[u8]) -> Result<usize, NetworkError> {
        let mut subs = self.subscribers.lock().map_err(|_| NetworkError::Closed)?;
        let Some(list) = subs.get_mut(group) else {
            return Ok(0);
        };
        list.retain(|tx| !tx.is_closed());

        let mut delivered = 0;
        let mut full = false;
        for tx in list.iter() {
            let msg = GroupMessage {
                sender: sender.to_string(),
                content: content.to_vec(),
            };
            match tx.try_send(msg) {
                Ok(()) => delivered += 1,
                Err(mpsc::error::TrySendError::Full(_)) => full = true,
                Err(mpsc::error::TrySendError::Closed(_)) => {}
            }
        }
        if full {
            return Err(NetworkError::PublishFailed {
                group: group.to_string(),
                reason: "subscriber buffer full".into(),
            });
        }
        Ok(delivered)
    }
}

/// Transport that hands unicast work to the connection layer over a channel.
#[derive(Clone)]
pub struct ChannelTransport {
    peer_id: String,
    outbound_tx: mpsc::Sender<Outbound>,
    hub: GroupHub,
    known: Arc<Mutex<Vec<Peer>>>,
}

impl ChannelTransport {
    pub fn new(peer_id: impl Into<String>, outbound_tx: mpsc::Sender<Outbound>, hub: GroupHub) -> Self {
        Self {
            peer_id: peer_id.into(),
            outbound_tx,
            hub,
            known: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Peers registered through `add_peer`.
    pub fn known_peers(&self) -> Vec<Peer> {
        self.known.lock().map(|k| k.clone()).unwrap_or_default()
    }

    fn queue(&self, peer: &Peer, item: Outbound) -> Result<(), NetworkError> {
        self.outbound_tx
            .try_send(item)
            .map_err(|e| NetworkError::SendFailed {
                peer: peer.to_string(),
                reason: e.to_string(),
            })
    }
}

impl Transport for ChannelTransport {
    fn local_peer_id(&self) -> &str {
        &self.peer_id
    }

    fn send_unicast(&self, peer: &Peer, content: &[u8]) -> Result<(), NetworkError> {
        self.queue(
            peer,
            Outbound::Unicast {
                peer: peer.clone(),
                content: content.to_vec(),
            },
        )
    }

    fn send_to_group(&self, group: &GroupId, content: &[u8]) -> Result<(), NetworkError> {
        let delivered = self.hub.publish(group, &self.peer_id, content)?;
        tracing::trace!(group = %group, delivered, "published");
        Ok(())
    }

    fn subscribe(&self, group: &GroupId) -> Result<GroupSubscription, NetworkError> {
        self.hub.subscribe(group)
    }

    fn add_peer(&self, peer: &Peer) -> Result<(), NetworkError> {
        let mut known = self.known.lock().map_err(|_| NetworkError::Closed)?;
        if !known.iter().any(|k| k.key() == peer.key()) {
            known.push(peer.clone());
        }
        Ok(())
    }

    fn connect_peer(&self, peer: &Peer) -> Result<(), NetworkError> {
        self.queue(peer, Outbound::Connect(peer.clone()))
    }
}
