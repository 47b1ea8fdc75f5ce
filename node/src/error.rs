use thiserror::Error;

#[derive(Debug, Error)]
pub enum NodeError {
    #[error("protocol error: {0}")]
    Protocol(#[from] shard_protocol::ProtocolError),

    #[error("network error: {0}")]
    Network(#[from] shard_network::NetworkError),

    #[error("crypto error: {0}")]
    Crypto(#[from] shard_crypto::CryptoError),

    #[error("consensus error: {0}")]
    Consensus(#[from] shard_consensus::ConsensusError),

    #[error("beacon error: {0}")]
    Beacon(#[from] shard_beacon::BeaconError),

    #[error("store error: {0}")]
    Store(#[from] shard_store::StoreError),

    #[error("commit error: {0}")]
    Commit(#[from] CommitError),

    #[error("config error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("node already started")]
    AlreadyStarted,

    #[error("{0}")]
    Other(String),
}

/// Why a block was not committed.
#[derive(Debug, Error)]
pub enum CommitError {
    /// The chain rejected the block itself.
    #[error("block validation failed: {0}")]
    Validation(shard_store::StoreError),

    /// The shard-state transition was rejected under the strict policy.
    #[error("shard state validation failed: {0}")]
    ShardState(shard_store::StoreError),
}
