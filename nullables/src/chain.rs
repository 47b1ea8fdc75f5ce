//! Nullable chain: thread-safe in-memory block chain for testing.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use shard_network::SyncClient;
use shard_store::{ChainStore, StoreError};
use shard_types::{Address, Block, BlockHash};

/// An in-memory chain. Validation always passes unless told otherwise.
pub struct NullChain {
    blocks: Mutex<Vec<Block>>,
    by_hash: Mutex<HashMap<BlockHash, Block>>,
    proposers: Mutex<Vec<Address>>,
    insert_calls: AtomicUsize,
    fail_validation: AtomicBool,
    fail_shard_state: AtomicBool,
    fail_insert: AtomicBool,
}

impl NullChain {
    pub fn new() -> Self {
        Self {
            blocks: Mutex::new(Vec::new()),
            by_hash: Mutex::new(HashMap::new()),
            proposers: Mutex::new(Vec::new()),
            insert_calls: AtomicUsize::new(0),
            fail_validation: AtomicBool::new(false),
            fail_shard_state: AtomicBool::new(false),
            fail_insert: AtomicBool::new(false),
        }
    }

    /// Chain pre-loaded with `blocks`, in order.
    pub fn with_blocks(blocks: Vec<Block>) -> Self {
        let chain = Self::new();
        for block in blocks {
            chain.push(block);
        }
        chain
    }

    fn push(&self, block: Block) {
        self.by_hash
            .lock()
            .unwrap()
            .insert(block.hash(), block.clone());
        self.blocks.lock().unwrap().push(block);
    }

    pub fn fail_validation(&self, fail: bool) {
        self.fail_validation.store(fail, Ordering::SeqCst);
    }

    pub fn fail_shard_state(&self, fail: bool) {
        self.fail_shard_state.store(fail, Ordering::SeqCst);
    }

    pub fn fail_insert(&self, fail: bool) {
        self.fail_insert.store(fail, Ordering::SeqCst);
    }

    pub fn blocks(&self) -> Vec<Block> {
        self.blocks.lock().unwrap().clone()
    }

    /// Proposers passed to `validate_new_block`, in order.
    pub fn proposers(&self) -> Vec<Address> {
        self.proposers.lock().unwrap().clone()
    }

    pub fn insert_calls(&self) -> usize {
        self.insert_calls.load(Ordering::SeqCst)
    }
}

impl Default for NullChain {
    fn default() -> Self {
        Self::new()
    }
}

impl ChainStore for NullChain {
    fn validate_new_block(&self, block: &Block, proposer: &Address) -> Result<(), StoreError> {
        self.proposers.lock().unwrap().push(*proposer);
        if self.fail_validation.load(Ordering::SeqCst) {
            return Err(StoreError::InvalidBlock(format!(
                "block {} rejected by null chain",
                block.number()
            )));
        }
        Ok(())
    }

    fn validate_new_shard_state(&self, block: &Block) -> Result<(), StoreError> {
        if self.fail_shard_state.load(Ordering::SeqCst) {
            return Err(StoreError::InvalidShardState(format!(
                "shard state of block {} rejected by null chain",
                block.number()
            )));
        }
        Ok(())
    }

    fn insert_chain(&self, blocks: &[Block]) -> Result<usize, StoreError> {
        self.insert_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_insert.load(Ordering::SeqCst) {
            return Err(StoreError::InsertFailed {
                inserted: 0,
                reason: "null chain told to fail".into(),
            });
        }
        let mut written = 0;
        for block in blocks {
            if self.has_block(&block.hash()) {
                continue;
            }
            self.push(block.clone());
            written += 1;
        }
        Ok(written)
    }

    fn current_block(&self) -> Option<Block> {
        self.blocks.lock().unwrap().last().cloned()
    }

    fn block_by_hash(&self, hash: &BlockHash) -> Option<Block> {
        self.by_hash.lock().unwrap().get(hash).cloned()
    }
}

/// Sync consumer that keeps every block it is handed.
#[derive(Default)]
pub struct NullSyncClient {
    received: Mutex<Vec<Block>>,
}

impl NullSyncClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn received(&self) -> Vec<Block> {
        self.received.lock().unwrap().clone()
    }
}

impl SyncClient for NullSyncClient {
    fn update_blocks(&self, blocks: Vec<Block>) {
        self.received.lock().unwrap().extend(blocks);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shard_types::BlockHeader;

    fn block(number: u64, parent: BlockHash) -> Block {
        Block::new(
            BlockHeader {
                parent_hash: parent,
                number,
                ..Default::default()
            },
            vec![],
        )
    }

    #[test]
    fn insert_is_idempotent() {
        let chain = NullChain::new();
        let b = block(1, BlockHash::ZERO);
        assert_eq!(chain.insert_chain(&[b.clone()]).unwrap(), 1);
        assert_eq!(chain.insert_chain(&[b.clone()]).unwrap(), 0);
        assert_eq!(chain.blocks().len(), 1);
        assert_eq!(chain.current_block(), Some(b));
    }

    #[test]
    fn failing_insert_writes_nothing() {
        let chain = NullChain::new();
        chain.fail_insert(true);
        assert!(chain.insert_chain(&[block(1, BlockHash::ZERO)]).is_err());
        assert!(chain.current_block().is_none());
        assert_eq!(chain.insert_calls(), 1);
    }
}
