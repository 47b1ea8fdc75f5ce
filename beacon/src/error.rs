use thiserror::Error;

#[derive(Debug, Error)]
pub enum BeaconError {
    #[error("unexpected beacon message type {0}")]
    UnexpectedMessage(u8),

    #[error("empty beacon payload")]
    EmptyPayload,

    #[error("{0}")]
    Other(String),
}
