//! Bounded hand-off of committed blocks to the beacon.
//!
//! The commit pipeline must never wait on the beacon, so a full queue evicts
//! its oldest block instead of blocking the producer.

use std::collections::VecDeque;
use std::sync::Mutex;

use tokio::sync::Notify;

use shard_types::Block;

/// Drop-oldest FIFO of committed blocks.
///
/// The producer calls [`push`](Self::push); the beacon side calls
/// [`pop`](Self::pop), which waits until a block is available.
pub struct ConfirmedBlockQueue {
    blocks: Mutex<VecDeque<Block>>,
    capacity: usize,
    notify: Notify,
}

impl ConfirmedBlockQueue {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            blocks: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
            notify: Notify::new(),
        }
    }

    /// Enqueue a block. Returns the block evicted to make room, if any.
    pub fn push(&self, block: Block) -> Option<Block> {
        let evicted = {
            let mut blocks = self.blocks.lock().unwrap_or_else(|e| e.into_inner());
            let evicted = if blocks.len() >= self.capacity {
                blocks.pop_front()
            } else {
                None
            };
            blocks.push_back(block);
            evicted
        };
        self.notify.notify_one();
        evicted
    }

    pub fn try_pop(&self) -> Option<Block> {
        self.blocks
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop_front()
    }

    /// Oldest block. Waits asynchronously if the queue is empty.
    pub async fn pop(&self) -> Block {
        loop {
            if let Some(block) = self.try_pop() {
                return block;
            }
            self.notify.notified().await;
        }
    }

    pub fn len(&self) -> usize {
        self.blocks.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shard_types::BlockHeader;
    use std::sync::Arc;

    fn block(number: u64) -> Block {
        Block::new(
            BlockHeader {
                number,
                ..Default::default()
            },
            vec![],
        )
    }

    #[test]
    fn full_queue_drops_oldest() {
        let queue = ConfirmedBlockQueue::new(2);
        assert!(queue.push(block(1)).is_none());
        assert!(queue.push(block(2)).is_none());
        assert_eq!(queue.push(block(3)).map(|b| b.number()), Some(1));
        assert_eq!(queue.len(), 2);
        assert_eq!(queue.try_pop().map(|b| b.number()), Some(2));
        assert_eq!(queue.try_pop().map(|b| b.number()), Some(3));
        assert!(queue.try_pop().is_none());
    }

    #[tokio::test]
    async fn pop_waits_for_push() {
        let queue = Arc::new(ConfirmedBlockQueue::new(4));
        let consumer = {
            let queue = Arc::clone(&queue);
            tokio::spawn(async move { queue.pop().await.number() })
        };
        tokio::task::yield_now().await;
        queue.push(block(7));
        assert_eq!(consumer.await.unwrap(), 7);
    }

    #[test]
    fn zero_capacity_is_clamped() {
        let queue = ConfirmedBlockQueue::new(0);
        assert_eq!(queue.capacity(), 1);
    }
}
