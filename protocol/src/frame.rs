//! Raw frame layout: `[category:1][type:1][payload:N]`.

use shard_messages::MessageCategory;

use crate::ProtocolError;

/// Category byte plus type byte.
pub const FRAME_HEADER_LEN: usize = 2;

/// Maximum accepted frame size in bytes.
pub const MAX_FRAME_SIZE: usize = 16 * 1024 * 1024; // 16 MiB

/// A frame split into its three layers. Borrows the buffer it was parsed from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Frame<'a> {
    pub category: MessageCategory,
    pub msg_type: u8,
    bytes: &'a [u8],
}

impl<'a> Frame<'a> {
    /// Split a buffer into category, type and payload.
    pub fn parse(bytes: &'a [u8]) -> Result<Self, ProtocolError> {
        if bytes.len() < FRAME_HEADER_LEN {
            return Err(ProtocolError::TooShort {
                needed: FRAME_HEADER_LEN,
                actual: bytes.len(),
            });
        }
        if bytes.len() > MAX_FRAME_SIZE {
            return Err(ProtocolError::TooLarge {
                size: bytes.len(),
                max: MAX_FRAME_SIZE,
            });
        }
        let category =
            MessageCategory::from_byte(bytes[0]).ok_or(ProtocolError::UnknownCategory(bytes[0]))?;
        Ok(Self {
            category,
            msg_type: bytes[1],
            bytes,
        })
    }

    /// Everything after the type byte.
    pub fn payload(&self) -> &'a [u8] {
        &self.bytes[FRAME_HEADER_LEN..]
    }

    /// Everything after the category byte. Consensus and beacon messages are
    /// handed over in this form so the collaborator sees its own type byte.
    pub fn nested(&self) -> &'a [u8] {
        &self.bytes[1..]
    }

    /// Payload split into its leading sub-type byte and the remainder.
    pub fn sub_typed(&self, context: &'static str) -> Result<(u8, &'a [u8]), ProtocolError> {
        self.payload()
            .split_first()
            .map(|(sub, rest)| (*sub, rest))
            .ok_or(ProtocolError::MissingSubType(context))
    }
}

/// Assemble a frame from its parts.
pub fn assemble(category: MessageCategory, msg_type: u8, payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(FRAME_HEADER_LEN + payload.len());
    out.push(category.to_byte());
    out.push(msg_type);
    out.extend_from_slice(payload);
    out
}
