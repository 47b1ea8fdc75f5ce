//! Nullable consensus: a committee held in memory.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use shard_consensus::{Consensus, ConsensusError};
use shard_types::{Peer, PublicKey};

pub struct NullConsensus {
    leader: AtomicBool,
    shard_id: u32,
    node_id: u32,
    peers: Mutex<Vec<Peer>>,
    keys: Mutex<Vec<PublicKey>>,
    leader_messages: Mutex<Vec<Vec<u8>>>,
    validator_messages: Mutex<Vec<Vec<u8>>>,
    key_updates: AtomicUsize,
    fail_processing: AtomicBool,
}

impl NullConsensus {
    pub fn new(leader: bool) -> Self {
        Self {
            leader: AtomicBool::new(leader),
            shard_id: 0,
            node_id: 0,
            peers: Mutex::new(Vec::new()),
            keys: Mutex::new(Vec::new()),
            leader_messages: Mutex::new(Vec::new()),
            validator_messages: Mutex::new(Vec::new()),
            key_updates: AtomicUsize::new(0),
            fail_processing: AtomicBool::new(false),
        }
    }

    pub fn leader() -> Self {
        Self::new(true)
    }

    pub fn validator() -> Self {
        Self::new(false)
    }

    pub fn with_ids(mut self, shard_id: u32, node_id: u32) -> Self {
        self.shard_id = shard_id;
        self.node_id = node_id;
        self
    }

    /// Seed the committee.
    pub fn with_committee(self, peers: Vec<Peer>, keys: Vec<PublicKey>) -> Self {
        *self.peers.lock().unwrap() = peers;
        *self.keys.lock().unwrap() = keys;
        self
    }

    pub fn set_leader(&self, leader: bool) {
        self.leader.store(leader, Ordering::SeqCst);
    }

    pub fn fail_processing(&self, fail: bool) {
        self.fail_processing.store(fail, Ordering::SeqCst);
    }

    pub fn leader_messages(&self) -> Vec<Vec<u8>> {
        self.leader_messages.lock().unwrap().clone()
    }

    pub fn validator_messages(&self) -> Vec<Vec<u8>> {
        self.validator_messages.lock().unwrap().clone()
    }

    /// Number of `update_public_keys` calls.
    pub fn key_updates(&self) -> usize {
        self.key_updates.load(Ordering::SeqCst)
    }

    fn record(&self, sink: &Mutex<Vec<Vec<u8>>>, payload: &[u8]) -> Result<(), ConsensusError> {
        if self.fail_processing.load(Ordering::SeqCst) {
            return Err(ConsensusError::Other("null consensus told to fail".into()));
        }
        sink.lock().unwrap().push(payload.to_vec());
        Ok(())
    }
}

impl Default for NullConsensus {
    fn default() -> Self {
        Self::validator()
    }
}

impl Consensus for NullConsensus {
    fn is_leader(&self) -> bool {
        self.leader.load(Ordering::SeqCst)
    }

    fn process_leader_message(&self, payload: &[u8]) -> Result<(), ConsensusError> {
        self.record(&self.leader_messages, payload)
    }

    fn process_validator_message(&self, payload: &[u8]) -> Result<(), ConsensusError> {
        self.record(&self.validator_messages, payload)
    }

    fn update_public_keys(&self, keys: Vec<PublicKey>) -> usize {
        self.key_updates.fetch_add(1, Ordering::SeqCst);
        let mut current = self.keys.lock().unwrap();
        *current = keys;
        current.len()
    }

    fn validator_peers(&self) -> Vec<Peer> {
        self.peers.lock().unwrap().clone()
    }

    fn public_keys(&self) -> Vec<PublicKey> {
        self.keys.lock().unwrap().clone()
    }

    fn add_peers(&self, peers: &[Peer]) -> usize {
        let mut current = self.peers.lock().unwrap();
        let mut added = 0;
        for peer in peers {
            if !current.iter().any(|p| p.key() == peer.key()) {
                current.push(peer.clone());
                added += 1;
            }
        }
        added
    }

    fn shard_id(&self) -> u32 {
        self.shard_id
    }

    fn node_id(&self) -> u32 {
        self.node_id
    }
}
