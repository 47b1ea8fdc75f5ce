use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("block not found: {0}")]
    NotFound(String),

    #[error("invalid block: {0}")]
    InvalidBlock(String),

    #[error("invalid shard state: {0}")]
    InvalidShardState(String),

    #[error("chain insert failed after {inserted} blocks: {reason}")]
    InsertFailed { inserted: usize, reason: String },

    #[error("storage backend error: {0}")]
    Backend(String),
}
