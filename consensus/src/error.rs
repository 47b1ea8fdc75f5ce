use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConsensusError {
    #[error("unexpected consensus message type {0}")]
    UnexpectedMessage(u8),

    #[error("empty consensus payload")]
    EmptyPayload,

    #[error("{0}")]
    Other(String),
}
