use shard_messages::MessageCategory;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("frame too short: need {needed} bytes, got {actual}")]
    TooShort { needed: usize, actual: usize },

    #[error("frame too large: {size} > {max}")]
    TooLarge { size: usize, max: usize },

    #[error("unknown message category {0}")]
    UnknownCategory(u8),

    #[error("unknown {category:?} message type {byte}")]
    UnknownType { category: MessageCategory, byte: u8 },

    #[error("unknown {context} sub-type {byte}")]
    UnknownSubType { context: &'static str, byte: u8 },

    #[error("{0} payload is missing its sub-type byte")]
    MissingSubType(&'static str),

    #[error("malformed {context} payload: {reason}")]
    Malformed {
        context: &'static str,
        reason: String,
    },
}
