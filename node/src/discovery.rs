//! Ping / pong peer discovery.
//!
//! A joining node pings the leader (or the beacon group) until a pong tells it
//! the committee and key set. The leader answers pings with pongs, and a
//! periodic broadcaster re-announces membership once it has settled.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::Instrument;

use shard_crypto::decode_public_key;
use shard_messages::{PeerDescriptor, PingMessage, PongMessage};
use shard_network::{wrap_envelope, GroupId, SenderDedup};
use shard_protocol::{encode_ping, encode_pong};
use shard_types::{Peer, PeerRole, PublicKey};

use crate::config::TransportMode;
use crate::node::ShardNode;
use crate::tracing_spans::discovery_span;
use crate::NodeError;

/// Where this node is in joining its shard.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DiscoveryPhase {
    WaitToJoin,
    ReadyForConsensus,
}

/// Mutable discovery state, behind one lock in the node.
pub(crate) struct DiscoveryState {
    pub(crate) phase: DiscoveryPhase,
    pub(crate) dedup: SenderDedup,
    pub(crate) public_keys: Vec<PublicKey>,
}

impl DiscoveryState {
    pub(crate) fn new(dedup_capacity: usize) -> Self {
        Self {
            phase: DiscoveryPhase::WaitToJoin,
            dedup: SenderDedup::new(dedup_capacity),
            public_keys: Vec::new(),
        }
    }
}

/// Stop signals raised by pong handling and the pong broadcaster.
pub(crate) struct DiscoverySignals {
    pub(crate) stop_ping: watch::Sender<bool>,
    pub(crate) stop_discovery: watch::Sender<bool>,
}

impl DiscoverySignals {
    pub(crate) fn new() -> Self {
        Self {
            stop_ping: watch::channel(false).0,
            stop_discovery: watch::channel(false).0,
        }
    }

    pub(crate) fn raise_stop_ping(&self) {
        self.stop_ping.send_replace(true);
    }

    pub(crate) fn raise_stop_discovery(&self) {
        self.stop_discovery.send_replace(true);
    }
}

/// What handling a ping did.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PingOutcome {
    /// The sender already pinged in this join round.
    Duplicate,
    /// The pinger is a client and now occupies the client slot.
    ClientRegistered,
    /// The pinger was added as a validator peer.
    PeerAdded {
        new_peers: usize,
        /// Validators the leader sent a pong to.
        pong_recipients: usize,
    },
}

/// How a join loop ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum JoinOutcome {
    Joined,
    TimedOut,
    Shutdown,
    /// Nowhere to send pings.
    NoTarget,
}

/// Decides when the periodic broadcaster should emit a pong.
///
/// A change in validator or key count re-arms it. A tick with unchanged,
/// non-zero counts while armed fires once.
#[derive(Debug)]
pub struct PongDebouncer {
    peers: usize,
    keys: usize,
    sent: bool,
}

impl PongDebouncer {
    pub fn new(peers: usize, keys: usize) -> Self {
        Self {
            peers,
            keys,
            sent: false,
        }
    }

    /// Feed the current counts. Returns `true` when a pong should go out.
    pub fn tick(&mut self, peers: usize, keys: usize) -> bool {
        if peers == 0 || keys == 0 {
            return false;
        }
        let changed = peers != self.peers || keys != self.keys;
        self.peers = peers;
        self.keys = keys;
        if changed {
            self.sent = false;
            return false;
        }
        !self.sent
    }

    pub fn mark_sent(&mut self) {
        self.sent = true;
    }

    pub fn is_armed(&self) -> bool {
        !self.sent
    }
}

/// Turn a wire descriptor into a peer. The public key must decode.
pub(crate) fn peer_from_descriptor(desc: &PeerDescriptor) -> Result<Peer, NodeError> {
    let key = decode_public_key(&desc.public_key)?;
    let mut peer = Peer::new(desc.ip.clone(), desc.port)
        .with_peer_id(desc.peer_id.clone())
        .with_public_key(key)
        .with_role(desc.role);
    peer.validator_id = desc.validator_id;
    Ok(peer)
}

impl ShardNode {
    /// Insert peers into the table. When any is new, the whole batch is also
    /// handed to the transport, consensus and the beacon.
    pub async fn add_peers(&self, peers: &[Peer]) -> usize {
        let new_peers = {
            let mut table = self.peers.write().await;
            let added = table.add_peers(peers);
            self.metrics.peer_count.set(table.len() as i64);
            added
        };
        if new_peers == 0 {
            return 0;
        }
        for peer in peers {
            if let Err(e) = self.transport.add_peer(peer) {
                tracing::warn!(peer = %peer, error = %e, "transport rejected peer");
            }
        }
        self.consensus.add_peers(peers);
        if let Some(beacon) = &self.beacon {
            beacon.add_peers(peers);
        }
        tracing::debug!(new_peers, batch = peers.len(), "peers added");
        new_peers
    }

    /// Handle a discovery ping from `sender` (`None` for stream pings).
    pub async fn on_ping(&self, ping: PingMessage, sender: Option<&str>) -> Result<PingOutcome, NodeError> {
        self.metrics.pings_received.inc();

        if let Some(sender) = sender {
            if self.discovery.lock().await.dedup.is_duplicate(sender) {
                tracing::trace!(sender, "duplicate ping");
                return Ok(PingOutcome::Duplicate);
            }
        }

        let peer = peer_from_descriptor(&ping.node).map_err(|e| {
            tracing::warn!(ip = %ping.node.ip, port = ping.node.port, error = %e, "ping carries an unusable public key");
            e
        })?;

        self.peers.write().await.add_incoming_peer(peer.clone());
        if self.config.transport_mode == TransportMode::PubSub {
            if let Err(e) = self.transport.connect_peer(&peer) {
                tracing::warn!(peer = %peer, error = %e, "connect to pinging peer failed");
            }
        }

        if peer.role == PeerRole::Client {
            tracing::info!(client = %peer, node_id = self.consensus.node_id(), "client peer registered");
            self.peers.write().await.set_client_peer(peer);
            return Ok(PingOutcome::ClientRegistered);
        }

        let new_peers = self.add_peers(std::slice::from_ref(&peer)).await;

        let mut pong_recipients = 0;
        if self.consensus.is_leader() && self.config.transport_mode == TransportMode::Direct {
            let validators = self.consensus.validator_peers();
            let pong = PongMessage::new(&validators, &self.consensus.public_keys());
            let bytes = encode_pong(&pong)?;
            for validator in &validators {
                match self.transport.send_unicast(validator, &bytes) {
                    Ok(()) => pong_recipients += 1,
                    Err(e) => tracing::warn!(peer = %validator, error = %e, "pong send failed"),
                }
            }
            tracing::debug!(recipients = pong_recipients, validators = validators.len(), "leader answered ping");
        }

        Ok(PingOutcome::PeerAdded {
            new_peers,
            pong_recipients,
        })
    }

    /// Handle a pong from the leader. Returns the size of the new key set as
    /// reported by consensus.
    pub async fn on_pong(&self, pong: PongMessage) -> usize {
        self.metrics.pongs_received.inc();

        let peers: Vec<Peer> = pong
            .peers
            .iter()
            .filter_map(|desc| match peer_from_descriptor(desc) {
                Ok(peer) => Some(peer),
                Err(e) => {
                    tracing::warn!(ip = %desc.ip, port = desc.port, error = %e, "skipping pong peer");
                    None
                }
            })
            .collect();
        if !peers.is_empty() {
            self.add_peers(&peers).await;
        }

        let keys: Vec<PublicKey> = pong
            .public_keys
            .iter()
            .filter_map(|raw| match decode_public_key(raw) {
                Ok(key) => Some(key),
                Err(e) => {
                    tracing::warn!(error = %e, "skipping pong public key");
                    None
                }
            })
            .collect();

        tracing::debug!(keys = keys.len(), peers = peers.len(), "pong received");

        {
            let mut state = self.discovery.lock().await;
            state.public_keys = keys.clone();
            if state.phase == DiscoveryPhase::WaitToJoin {
                state.phase = DiscoveryPhase::ReadyForConsensus;
                self.signals.raise_stop_ping();
                tracing::info!("joined shard, ready for consensus");
            }
        }
        self.signals.raise_stop_discovery();

        self.consensus.update_public_keys(keys)
    }

    pub async fn phase(&self) -> DiscoveryPhase {
        self.discovery.lock().await.phase
    }

    /// Key set from the most recent pong.
    pub async fn public_keys(&self) -> Vec<PublicKey> {
        self.discovery.lock().await.public_keys.clone()
    }

    pub fn stop_ping_signal(&self) -> watch::Receiver<bool> {
        self.signals.stop_ping.subscribe()
    }

    pub fn stop_discovery_signal(&self) -> watch::Receiver<bool> {
        self.signals.stop_discovery.subscribe()
    }

    /// One broadcaster tick. Returns `true` if a pong was published.
    pub fn pong_broadcast_tick(&self, debouncer: &mut PongDebouncer) -> bool {
        let peers = self.consensus.validator_peers();
        let keys = self.consensus.public_keys();
        if !debouncer.tick(peers.len(), keys.len()) {
            return false;
        }
        let bytes = match encode_pong(&PongMessage::new(&peers, &keys)) {
            Ok(bytes) => wrap_envelope(&bytes),
            Err(e) => {
                tracing::error!(error = %e, "cannot encode pong");
                return false;
            }
        };
        match self.transport.send_to_groups(&[GroupId::beacon()], &bytes) {
            Ok(()) => {
                tracing::info!(group = %GroupId::beacon(), peers = peers.len(), keys = keys.len(), "pong broadcast");
                debouncer.mark_sent();
                self.signals.raise_stop_discovery();
                true
            }
            Err(e) => {
                tracing::error!(group = %GroupId::beacon(), error = %e, "pong broadcast failed");
                false
            }
        }
    }

    /// Periodically publish the settled committee on the beacon group.
    pub(crate) async fn run_pong_broadcaster(self: Arc<Self>) {
        let mut shutdown_rx = self.shutdown.subscribe();
        if self.shutdown.is_triggered() {
            return;
        }
        let mut debouncer = PongDebouncer::new(
            self.consensus.validator_peers().len(),
            self.consensus.public_keys().len(),
        );
        let mut interval = tokio::time::interval(Duration::from_secs(self.config.pong_interval_secs));
        interval.tick().await; // skip the immediate first tick
        loop {
            tokio::select! {
                biased;
                _ = shutdown_rx.recv() => {
                    tracing::debug!("pong broadcaster shutting down");
                    break;
                }
                _ = interval.tick() => {
                    self.pong_broadcast_tick(&mut debouncer);
                }
            }
        }
    }

    /// Ping until a pong arrives, the join times out or the node stops.
    pub async fn join_shard(self: Arc<Self>) -> JoinOutcome {
        let span = discovery_span("join");
        async move {
            let mut shutdown_rx = self.shutdown.subscribe();
            if self.shutdown.is_triggered() {
                return JoinOutcome::Shutdown;
            }

            let leader = match self.config.bootstrap_peer() {
                Ok(leader) => leader,
                Err(e) => {
                    tracing::error!(error = %e, "bad bootstrap leader");
                    return JoinOutcome::NoTarget;
                }
            };
            let pub_sub = self.config.transport_mode == TransportMode::PubSub;
            if leader.is_none() && !pub_sub {
                return JoinOutcome::NoTarget;
            }

            let ping = match encode_ping(&PingMessage::new(&self.self_peer)) {
                Ok(bytes) => bytes,
                Err(e) => {
                    tracing::error!(error = %e, "cannot encode ping");
                    return JoinOutcome::NoTarget;
                }
            };
            let group_ping = wrap_envelope(&ping);

            self.discovery.lock().await.dedup.reset();
            let mut stop_ping = self.stop_ping_signal();
            let mut stop_discovery = self.stop_discovery_signal();
            if *stop_ping.borrow_and_update() || *stop_discovery.borrow_and_update() {
                return JoinOutcome::Joined;
            }

            let deadline = tokio::time::sleep(Duration::from_secs(self.config.join_timeout_secs));
            tokio::pin!(deadline);
            let mut interval = tokio::time::interval(Duration::from_secs(self.config.ping_interval_secs));
            tracing::info!(leader = ?leader.as_ref().map(|l| l.to_string()), pub_sub, "joining shard");

            loop {
                tokio::select! {
                    biased;
                    _ = shutdown_rx.recv() => return JoinOutcome::Shutdown,
                    _ = stop_ping.changed() => {
                        if *stop_ping.borrow() {
                            return JoinOutcome::Joined;
                        }
                    }
                    _ = stop_discovery.changed() => {
                        if *stop_discovery.borrow() {
                            return JoinOutcome::Joined;
                        }
                    }
                    _ = &mut deadline => {
                        tracing::warn!(timeout_secs = self.config.join_timeout_secs, "gave up joining shard");
                        return JoinOutcome::TimedOut;
                    }
                    _ = interval.tick() => {
                        let sent = match &leader {
                            Some(leader) if !pub_sub => self.transport.send_unicast(leader, &ping),
                            _ => self.transport.send_to_groups(&[GroupId::beacon()], &group_ping),
                        };
                        if let Err(e) = sent {
                            tracing::warn!(error = %e, "ping send failed");
                        }
                    }
                }
            }
        }
        .instrument(span)
        .await
    }
}
