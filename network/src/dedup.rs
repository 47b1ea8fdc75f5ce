//! Bounded set of ping senders already answered in the current join round.

use std::collections::HashSet;
use std::collections::VecDeque;

/// Default capacity: remember the last 4096 senders.
pub const DEFAULT_DEDUP_CAPACITY: usize = 4096;

/// FIFO-evicting set of transport peer ids.
///
/// An empty sender id is never recorded, so stream pings (which carry no
/// sender) are always processed.
pub struct SenderDedup {
    capacity: usize,
    seen: HashSet<String>,
    order: VecDeque<String>,
}

impl SenderDedup {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            seen: HashSet::with_capacity(capacity),
            order: VecDeque::with_capacity(capacity),
        }
    }

    /// Returns `true` if `sender` was already seen. Otherwise records it.
    pub fn is_duplicate(&mut self, sender: &str) -> bool {
        if sender.is_empty() {
            return false;
        }
        if self.seen.contains(sender) {
            return true;
        }
        if self.seen.len() >= self.capacity {
            if let Some(old) = self.order.pop_front() {
                self.seen.remove(&old);
            }
        }
        self.seen.insert(sender.to_string());
        self.order.push_back(sender.to_string());
        false
    }

    /// Forget every sender. Called when a new join round starts.
    pub fn reset(&mut self) {
        self.seen.clear();
        self.order.clear();
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}

impl Default for SenderDedup {
    fn default() -> Self {
        Self::new(DEFAULT_DEDUP_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_ping_from_same_sender_is_duplicate() {
        let mut dedup = SenderDedup::new(8);
        assert!(!dedup.is_duplicate("QmPeerA"));
        assert!(dedup.is_duplicate("QmPeerA"));
        assert!(!dedup.is_duplicate("QmPeerB"));
        assert_eq!(dedup.len(), 2);
    }

    #[test]
    fn empty_sender_never_deduped() {
        let mut dedup = SenderDedup::new(8);
        assert!(!dedup.is_duplicate(""));
        assert!(!dedup.is_duplicate(""));
        assert!(dedup.is_empty());
    }

    #[test]
    fn evicts_oldest_at_capacity() {
        let mut dedup = SenderDedup::new(2);
        assert!(!dedup.is_duplicate("a"));
        assert!(!dedup.is_duplicate("b"));
        assert!(!dedup.is_duplicate("c"));
        assert_eq!(dedup.len(), 2);
        // "a" was evicted
        assert!(!dedup.is_duplicate("a"));
        assert!(dedup.is_duplicate("c"));
    }

    #[test]
    fn reset_forgets_everything() {
        let mut dedup = SenderDedup::default();
        dedup.is_duplicate("a");
        dedup.reset();
        assert!(dedup.is_empty());
        assert!(!dedup.is_duplicate("a"));
    }
}
