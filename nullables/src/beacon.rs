//! Nullable beacon.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use shard_beacon::{Beacon, BeaconError};
use shard_types::Peer;

pub struct NullBeacon {
    leader: AtomicBool,
    peers: Mutex<Vec<Peer>>,
    leader_messages: Mutex<Vec<Vec<u8>>>,
    validator_messages: Mutex<Vec<Vec<u8>>>,
}

impl NullBeacon {
    pub fn new(leader: bool) -> Self {
        Self {
            leader: AtomicBool::new(leader),
            peers: Mutex::new(Vec::new()),
            leader_messages: Mutex::new(Vec::new()),
            validator_messages: Mutex::new(Vec::new()),
        }
    }

    pub fn peers(&self) -> Vec<Peer> {
        self.peers.lock().unwrap().clone()
    }

    pub fn leader_messages(&self) -> Vec<Vec<u8>> {
        self.leader_messages.lock().unwrap().clone()
    }

    pub fn validator_messages(&self) -> Vec<Vec<u8>> {
        self.validator_messages.lock().unwrap().clone()
    }
}

impl Default for NullBeacon {
    fn default() -> Self {
        Self::new(false)
    }
}

impl Beacon for NullBeacon {
    fn is_leader(&self) -> bool {
        self.leader.load(Ordering::SeqCst)
    }

    fn process_leader_message(&self, payload: &[u8]) -> Result<(), BeaconError> {
        self.leader_messages.lock().unwrap().push(payload.to_vec());
        Ok(())
    }

    fn process_validator_message(&self, payload: &[u8]) -> Result<(), BeaconError> {
        self.validator_messages.lock().unwrap().push(payload.to_vec());
        Ok(())
    }

    fn add_peers(&self, peers: &[Peer]) -> usize {
        let mut current = self.peers.lock().unwrap();
        let before = current.len();
        for peer in peers {
            if !current.iter().any(|p| p.key() == peer.key()) {
                current.push(peer.clone());
            }
        }
        current.len() - before
    }
}
