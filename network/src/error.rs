use thiserror::Error;

#[derive(Debug, Error)]
pub enum NetworkError {
    #[error("send to {peer} failed: {reason}")]
    SendFailed { peer: String, reason: String },

    #[error("publish to group {group} failed: {reason}")]
    PublishFailed { group: String, reason: String },

    #[error("peer {0} not found")]
    PeerNotFound(String),

    #[error("envelope too short: {0} bytes")]
    ShortEnvelope(usize),

    #[error("envelope length mismatch: header says {declared}, got {actual}")]
    LengthMismatch { declared: usize, actual: usize },

    #[error("frame too large: {0} bytes")]
    FrameTooLarge(usize),

    #[error("transport closed")]
    Closed,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
