//! Block chain storage trait.

use crate::StoreError;
use shard_types::{Address, Block, BlockHash};

/// Trait for the chain the node commits into.
pub trait ChainStore: Send + Sync {
    /// Check a block against the current head, as proposed by `proposer`.
    fn validate_new_block(&self, block: &Block, proposer: &Address) -> Result<(), StoreError>;

    /// Check the shard-state transition carried by a block.
    fn validate_new_shard_state(&self, block: &Block) -> Result<(), StoreError>;

    /// Append blocks in order. Returns how many were written.
    fn insert_chain(&self, blocks: &[Block]) -> Result<usize, StoreError>;

    /// Current head, if any block has been written.
    fn current_block(&self) -> Option<Block>;

    fn block_by_hash(&self, hash: &BlockHash) -> Option<Block>;

    fn has_block(&self, hash: &BlockHash) -> bool {
        self.block_by_hash(hash).is_some()
    }
}
