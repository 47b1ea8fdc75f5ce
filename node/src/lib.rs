//! Shard node: message dispatch, peer discovery and block commit.
//!
//! The node sits between the transport and the protocol engines:
//! - Decodes inbound frames and routes them to consensus, the beacon, the
//!   transaction pool, chain sync or discovery
//! - Joins its shard through the ping / pong handshake
//! - Commits agreed blocks: validation, stake accounting, client broadcast,
//!   persistence and beacon notification

pub mod chain_report;
pub mod commit;
pub mod config;
pub mod confirmed_queue;
pub mod discovery;
pub mod dispatcher;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod node;
pub mod outbound;
pub mod shutdown;
pub mod staking;
pub mod tracing_spans;
pub mod tx_pool;

pub use chain_report::ChainReport;
pub use commit::{CommitReport, Verified};
pub use config::{NodeConfig, NodeRole, ShardStatePolicy, TransportMode};
pub use confirmed_queue::ConfirmedBlockQueue;
pub use discovery::{DiscoveryPhase, JoinOutcome, PingOutcome, PongDebouncer};
pub use dispatcher::Dispatched;
pub use error::{CommitError, NodeError};
pub use logging::{init_logging, LogFormat};
pub use metrics::NodeMetrics;
pub use node::{Collaborators, ShardNode};
pub use outbound::spawn_outbound_drain;
pub use shutdown::ShutdownController;
pub use staking::{StakeChange, StakeLedger, DEPOSIT_SELECTOR, WITHDRAW_SELECTOR};
pub use tx_pool::{TxPool, MAX_TRANSACTIONS_PER_BLOCK};
