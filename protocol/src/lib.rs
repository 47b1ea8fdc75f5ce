//! Wire protocol: frame splitting and typed message decoding/encoding.

pub mod codec;
pub mod error;
pub mod frame;

pub use codec::{
    decode, encode_beacon, encode_block_sync, encode_consensus, encode_identity_register,
    encode_ping, encode_pong, encode_stop, encode_transaction_request, encode_transactions,
    BlockMessage, ControlMessage, IdentityMessage, Message, NodeMessage, TransactionMessage,
};
pub use error::ProtocolError;
pub use frame::{Frame, FRAME_HEADER_LEN, MAX_FRAME_SIZE};
