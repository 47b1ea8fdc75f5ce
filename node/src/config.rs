//! Node configuration with TOML file support.

use serde::{Deserialize, Serialize};

use shard_network::SyncPortMapping;
use shard_types::{Address, Peer, PeerRole};

use crate::logging::LogFormat;
use crate::NodeError;

/// What this node does in its shard.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeRole {
    ShardLeader,
    #[default]
    ShardValidator,
    BeaconLeader,
    BeaconValidator,
    Client,
}

impl NodeRole {
    pub fn is_beacon(self) -> bool {
        matches!(self, NodeRole::BeaconLeader | NodeRole::BeaconValidator)
    }

    pub fn is_leader(self) -> bool {
        matches!(self, NodeRole::ShardLeader | NodeRole::BeaconLeader)
    }

    /// Role advertised in pings.
    pub fn peer_role(self) -> PeerRole {
        match self {
            NodeRole::Client => PeerRole::Client,
            _ => PeerRole::Validator,
        }
    }
}

/// How peers reach each other.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportMode {
    /// Point-to-point streams; the leader answers pings with direct pongs.
    #[default]
    Direct,
    /// Pub-sub groups; pongs go out on the beacon group.
    PubSub,
}

/// What to do when a block's shard-state transition fails validation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShardStatePolicy {
    /// Log and keep committing.
    #[default]
    Lenient,
    /// Reject the block.
    Strict,
}

/// Configuration for a shard node.
///
/// Can be loaded from a TOML file via [`NodeConfig::from_toml_file`] or
/// built programmatically (e.g. for tests).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Address advertised to peers and used for the stream listener.
    #[serde(default = "default_ip")]
    pub ip: String,

    /// Consensus port. The sync port is derived from it.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Transport peer id of this node.
    #[serde(default)]
    pub peer_id: String,

    #[serde(default)]
    pub role: NodeRole,

    #[serde(default)]
    pub transport_mode: TransportMode,

    /// Subtracted from a peer's port to get its sync port.
    #[serde(default = "default_sync_port_offset")]
    pub sync_port_offset: u16,

    /// Seconds between join pings.
    #[serde(default = "default_ping_interval_secs")]
    pub ping_interval_secs: u64,

    /// Give up joining after this many seconds.
    #[serde(default = "default_join_timeout_secs")]
    pub join_timeout_secs: u64,

    /// Seconds between pong broadcaster ticks.
    #[serde(default = "default_pong_interval_secs")]
    pub pong_interval_secs: u64,

    /// How many ping senders to remember per join round.
    #[serde(default = "default_ping_dedup_capacity")]
    pub ping_dedup_capacity: usize,

    #[serde(default)]
    pub shard_state_policy: ShardStatePolicy,

    /// Hex address of the staking contract, if stake tracking is enabled.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub staking_contract: Option<String>,

    /// Capacity of the queue feeding committed blocks to the beacon.
    #[serde(default = "default_confirmed_block_capacity")]
    pub confirmed_block_capacity: usize,

    /// Whether to accept inbound streams.
    #[serde(default = "default_true")]
    pub listen: bool,

    /// `ip:port` of the leader to ping while joining.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bootstrap_leader: Option<String>,

    /// Exit the process after a control stop message.
    #[serde(default)]
    pub exit_on_stop: bool,

    /// Log format: "human" or "json".
    #[serde(default = "default_log_format")]
    pub log_format: String,

    /// Log level filter: "trace", "debug", "info", "warn", "error".
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

// ── Serde default helpers ──────────────────────────────────────────────

fn default_ip() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    9000
}

fn default_sync_port_offset() -> u16 {
    SyncPortMapping::DEFAULT_OFFSET
}

fn default_ping_interval_secs() -> u64 {
    1
}

fn default_join_timeout_secs() -> u64 {
    600
}

fn default_pong_interval_secs() -> u64 {
    10
}

fn default_ping_dedup_capacity() -> usize {
    shard_network::DEFAULT_DEDUP_CAPACITY
}

fn default_confirmed_block_capacity() -> usize {
    64
}

fn default_true() -> bool {
    true
}

fn default_log_format() -> String {
    "human".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

// ── Impl ───────────────────────────────────────────────────────────────

impl NodeConfig {
    /// Load configuration from a TOML file.
    pub fn from_toml_file(path: &str) -> Result<Self, NodeError> {
        let content =
            std::fs::read_to_string(path).map_err(|e| NodeError::Config(e.to_string()))?;
        Self::from_toml_str(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn from_toml_str(s: &str) -> Result<Self, NodeError> {
        let config: Self = toml::from_str(s).map_err(|e| NodeError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize the configuration to a TOML string.
    pub fn to_toml_string(&self) -> String {
        toml::to_string_pretty(self).expect("NodeConfig is always serializable to TOML")
    }

    /// Reject values the node cannot run with.
    pub fn validate(&self) -> Result<(), NodeError> {
        if self.ping_interval_secs == 0 {
            return Err(NodeError::Config("ping_interval_secs must be positive".into()));
        }
        if self.pong_interval_secs == 0 {
            return Err(NodeError::Config("pong_interval_secs must be positive".into()));
        }
        if self.confirmed_block_capacity == 0 {
            return Err(NodeError::Config(
                "confirmed_block_capacity must be positive".into(),
            ));
        }
        self.staking_contract_address()?;
        self.bootstrap_peer()?;
        self.parsed_log_format()?;
        Ok(())
    }

    pub fn staking_contract_address(&self) -> Result<Option<Address>, NodeError> {
        self.staking_contract
            .as_deref()
            .map(|s| Address::from_hex(s).map_err(|e| NodeError::Config(e.to_string())))
            .transpose()
    }

    /// The bootstrap leader as a peer, if configured.
    pub fn bootstrap_peer(&self) -> Result<Option<Peer>, NodeError> {
        self.bootstrap_leader
            .as_deref()
            .map(|s| Peer::from_endpoint(s).map_err(|e| NodeError::Config(e.to_string())))
            .transpose()
    }

    pub fn sync_port_mapping(&self) -> SyncPortMapping {
        SyncPortMapping::new(self.sync_port_offset)
    }

    pub fn parsed_log_format(&self) -> Result<LogFormat, NodeError> {
        self.log_format.parse()
    }
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            ip: default_ip(),
            port: default_port(),
            peer_id: String::new(),
            role: NodeRole::default(),
            transport_mode: TransportMode::default(),
            sync_port_offset: default_sync_port_offset(),
            ping_interval_secs: default_ping_interval_secs(),
            join_timeout_secs: default_join_timeout_secs(),
            pong_interval_secs: default_pong_interval_secs(),
            ping_dedup_capacity: default_ping_dedup_capacity(),
            shard_state_policy: ShardStatePolicy::default(),
            staking_contract: None,
            confirmed_block_capacity: default_confirmed_block_capacity(),
            listen: default_true(),
            bootstrap_leader: None,
            exit_on_stop: false,
            log_format: default_log_format(),
            log_level: default_log_level(),
        }
    }
}
