//! Nullable transport: record sends instead of performing them.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use tokio::sync::mpsc;

use shard_network::{GroupId, GroupMessage, GroupSubscription, NetworkError, Transport};
use shard_types::Peer;

/// A transport that records every call.
pub struct NullTransport {
    peer_id: String,
    unicasts: Mutex<Vec<(Peer, Vec<u8>)>>,
    published: Mutex<Vec<(GroupId, Vec<u8>)>>,
    added: Mutex<Vec<Peer>>,
    connected: Mutex<Vec<Peer>>,
    subscribers: Mutex<HashMap<GroupId, mpsc::Sender<GroupMessage>>>,
    failing_peers: Mutex<HashSet<String>>,
    fail_unicast: AtomicBool,
    fail_publish: AtomicBool,
}

impl NullTransport {
    pub fn new(peer_id: impl Into<String>) -> Self {
        Self {
            peer_id: peer_id.into(),
            unicasts: Mutex::new(Vec::new()),
            published: Mutex::new(Vec::new()),
            added: Mutex::new(Vec::new()),
            connected: Mutex::new(Vec::new()),
            subscribers: Mutex::new(HashMap::new()),
            failing_peers: Mutex::new(HashSet::new()),
            fail_unicast: AtomicBool::new(false),
            fail_publish: AtomicBool::new(false),
        }
    }

    /// Make every unicast fail.
    pub fn fail_unicast(&self, fail: bool) {
        self.fail_unicast.store(fail, Ordering::SeqCst);
    }

    /// Make unicasts to one peer id fail.
    pub fn fail_unicast_to(&self, peer_id: &str) {
        self.failing_peers.lock().unwrap().insert(peer_id.to_string());
    }

    pub fn fail_publish(&self, fail: bool) {
        self.fail_publish.store(fail, Ordering::SeqCst);
    }

    /// Successful unicasts, in order.
    pub fn unicasts(&self) -> Vec<(Peer, Vec<u8>)> {
        self.unicasts.lock().unwrap().clone()
    }

    /// Successful group publishes, in order.
    pub fn published(&self) -> Vec<(GroupId, Vec<u8>)> {
        self.published.lock().unwrap().clone()
    }

    pub fn added_peers(&self) -> Vec<Peer> {
        self.added.lock().unwrap().clone()
    }

    pub fn connected_peers(&self) -> Vec<Peer> {
        self.connected.lock().unwrap().clone()
    }

    /// Push a message into the subscription for `group`, as if `sender`
    /// had published it. Returns `false` when nobody subscribed.
    pub fn deliver(&self, group: &GroupId, sender: &str, content: Vec<u8>) -> bool {
        let subs = self.subscribers.lock().unwrap();
        match subs.get(group) {
            Some(tx) => tx
                .try_send(GroupMessage {
                    sender: sender.to_string(),
                    content,
                })
                .is_ok(),
            None => false,
        }
    }

    pub fn reset(&self) {
        self.unicasts.lock().unwrap().clear();
        self.published.lock().unwrap().clear();
        self.added.lock().unwrap().clear();
        self.connected.lock().unwrap().clear();
    }
}

impl Default for NullTransport {
    fn default() -> Self {
        Self::new("null-peer")
    }
}

impl Transport for NullTransport {
    fn local_peer_id(&self) -> &str {
        &self.peer_id
    }

    fn send_unicast(&self, peer: &Peer, content: &[u8]) -> Result<(), NetworkError> {
        if self.fail_unicast.load(Ordering::SeqCst)
            || self.failing_peers.lock().unwrap().contains(&peer.peer_id)
        {
            return Err(NetworkError::SendFailed {
                peer: peer.to_string(),
                reason: "null transport told to fail".into(),
            });
        }
        self.unicasts
            .lock()
            .unwrap()
            .push((peer.clone(), content.to_vec()));
        Ok(())
    }

    fn send_to_group(&self, group: &GroupId, content: &[u8]) -> Result<(), NetworkError> {
        if self.fail_publish.load(Ordering::SeqCst) {
            return Err(NetworkError::PublishFailed {
                group: group.to_string(),
                reason: "null transport told to fail".into(),
            });
        }
        self.published
            .lock()
            .unwrap()
            .push((group.clone(), content.to_vec()));
        Ok(())
    }

    fn subscribe(&self, group: &GroupId) -> Result<GroupSubscription, NetworkError> {
        let (tx, rx) = mpsc::channel(64);
        self.subscribers.lock().unwrap().insert(group.clone(), tx);
        Ok(GroupSubscription::new(group.clone(), rx))
    }

    fn add_peer(&self, peer: &Peer) -> Result<(), NetworkError> {
        self.added.lock().unwrap().push(peer.clone());
        Ok(())
    }

    fn connect_peer(&self, peer: &Peer) -> Result<(), NetworkError> {
        self.connected.lock().unwrap().push(peer.clone());
        Ok(())
    }
}
