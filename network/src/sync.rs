//! Chain-sync consumer seam.

use shard_types::Block;

/// Receives blocks announced through `Node/Block/Sync` frames.
pub trait SyncClient: Send + Sync {
    fn update_blocks(&self, blocks: Vec<Block>);
}
