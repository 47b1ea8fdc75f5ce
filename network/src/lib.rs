//! Networking layer for the shard node.
//!
//! Holds the peer table, the transport seam the node talks through, the
//! p2p envelope used on streams and group messages, and an in-process
//! channel-backed transport.

pub mod channel_transport;
pub mod dedup;
pub mod envelope;
pub mod error;
pub mod peer_table;
pub mod sync;
pub mod transport;

pub use channel_transport::{ChannelTransport, GroupHub, Outbound};
pub use dedup::{SenderDedup, DEFAULT_DEDUP_CAPACITY};
pub use envelope::{read_frame, unwrap_envelope, wrap_envelope, write_frame, ENVELOPE_HEADER_LEN};
pub use error::NetworkError;
pub use peer_table::{PeerTable, SyncPortMapping};
pub use sync::SyncClient;
pub use transport::{GroupId, GroupMessage, GroupSubscription, Transport};
