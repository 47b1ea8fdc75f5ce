//! The shard node context.
//!
//! [`ShardNode`] owns every piece of node-level state behind its own lock and
//! runs the background tasks: stream listener, group drain, pong broadcaster
//! and join loop.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, Mutex, RwLock};
use tokio::task::JoinHandle;

use shard_beacon::Beacon;
use shard_consensus::Consensus;
use shard_crypto::address_from_public_key;
use shard_network::{
    read_frame, unwrap_envelope, GroupId, GroupSubscription, Outbound, PeerTable, SyncClient, Transport,
};
use shard_store::ChainStore;
use shard_types::{Address, Peer, PublicKey};

use crate::config::{NodeConfig, TransportMode};
use crate::confirmed_queue::ConfirmedBlockQueue;
use crate::discovery::{DiscoverySignals, DiscoveryState};
use crate::metrics::NodeMetrics;
use crate::outbound::spawn_outbound_drain;
use crate::shutdown::ShutdownController;
use crate::staking::StakeLedger;
use crate::tx_pool::TxPool;
use crate::NodeError;

/// Maximum time to wait for background tasks during shutdown.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// First delay while waiting for a group subscription to be installed.
const GROUP_POLL_INITIAL: Duration = Duration::from_millis(100);
const GROUP_POLL_MAX: Duration = Duration::from_secs(2);

/// The collaborators a node is built from.
pub struct Collaborators {
    pub transport: Arc<dyn Transport>,
    pub consensus: Arc<dyn Consensus>,
    pub chain: Arc<dyn ChainStore>,
    /// Present on nodes that also run the beacon protocol.
    pub beacon: Option<Arc<dyn Beacon>>,
    pub sync_client: Option<Arc<dyn SyncClient>>,
}

/// A running shard node.
pub struct ShardNode {
    pub config: NodeConfig,
    /// How this node describes itself in pings.
    pub self_peer: Peer,
    /// Proposer address used when validating blocks.
    pub address: Address,
    pub(crate) staking_contract: Option<Address>,

    pub transport: Arc<dyn Transport>,
    pub consensus: Arc<dyn Consensus>,
    pub chain: Arc<dyn ChainStore>,
    pub beacon: Option<Arc<dyn Beacon>>,
    pub(crate) sync_client: RwLock<Option<Arc<dyn SyncClient>>>,

    pub peers: Arc<RwLock<PeerTable>>,
    pub pending: Mutex<TxPool>,
    pub stakes: Mutex<StakeLedger>,
    pub(crate) discovery: Mutex<DiscoveryState>,
    pub(crate) signals: DiscoverySignals,
    /// Committed blocks waiting for the beacon.
    pub confirmed_blocks: Arc<ConfirmedBlockQueue>,

    pub metrics: Arc<NodeMetrics>,
    pub shutdown: Arc<ShutdownController>,

    group_receiver: Mutex<Option<GroupSubscription>>,
    listen_addr: std::sync::Mutex<Option<SocketAddr>>,
    task_handles: Mutex<Vec<JoinHandle<()>>>,
    started: AtomicBool,
}

impl ShardNode {
    pub fn new(config: NodeConfig, public_key: PublicKey, deps: Collaborators) -> Result<Self, NodeError> {
        config.validate()?;
        let staking_contract = config.staking_contract_address()?;
        let self_peer = Peer::new(config.ip.clone(), config.port)
            .with_peer_id(config.peer_id.clone())
            .with_public_key(public_key)
            .with_role(config.role.peer_role());

        Ok(Self {
            address: address_from_public_key(&public_key),
            self_peer,
            staking_contract,
            transport: deps.transport,
            consensus: deps.consensus,
            chain: deps.chain,
            beacon: deps.beacon,
            sync_client: RwLock::new(deps.sync_client),
            peers: Arc::new(RwLock::new(PeerTable::new())),
            pending: Mutex::new(TxPool::new()),
            stakes: Mutex::new(StakeLedger::new()),
            discovery: Mutex::new(DiscoveryState::new(config.ping_dedup_capacity)),
            signals: DiscoverySignals::new(),
            confirmed_blocks: Arc::new(ConfirmedBlockQueue::new(config.confirmed_block_capacity)),
            metrics: Arc::new(NodeMetrics::new()),
            shutdown: Arc::new(ShutdownController::new()),
            group_receiver: Mutex::new(None),
            listen_addr: std::sync::Mutex::new(None),
            task_handles: Mutex::new(Vec::new()),
            started: AtomicBool::new(false),
            config,
        })
    }

    /// Install or replace the chain-sync consumer.
    pub async fn register_sync_client(&self, client: Arc<dyn SyncClient>) {
        *self.sync_client.write().await = Some(client);
    }

    /// Hand a group subscription to the group drain.
    pub async fn install_group_receiver(&self, subscription: GroupSubscription) {
        tracing::debug!(group = %subscription.group(), "group receiver installed");
        *self.group_receiver.lock().await = Some(subscription);
    }

    /// Address the stream listener is bound to, once started.
    pub fn listen_addr(&self) -> Option<SocketAddr> {
        self.listen_addr.lock().ok().and_then(|addr| *addr)
    }

    /// Peers to sync blocks from: every known peer except this node, on its
    /// sync port.
    pub async fn syncing_peers(&self) -> Vec<Peer> {
        self.peers
            .read()
            .await
            .syncing_peers(self.config.port, &self.config.sync_port_mapping())
    }

    /// Start the background tasks.
    pub async fn start(self: &Arc<Self>) -> Result<(), NodeError> {
        if self.started.swap(true, Ordering::SeqCst) {
            return Err(NodeError::AlreadyStarted);
        }
        tracing::info!(
            ip = %self.config.ip,
            port = self.config.port,
            role = ?self.config.role,
            mode = ?self.config.transport_mode,
            shard_id = self.consensus.shard_id(),
            node_id = self.consensus.node_id(),
            "shard node starting"
        );

        let mut handles = Vec::new();

        if self.config.listen {
            let listener = TcpListener::bind((self.config.ip.as_str(), self.config.port)).await?;
            let addr = listener.local_addr()?;
            if let Ok(mut slot) = self.listen_addr.lock() {
                *slot = Some(addr);
            }
            tracing::info!(%addr, "stream listener started");
            handles.push(tokio::spawn(Arc::clone(self).run_stream_listener(listener)));
        }

        if self.config.transport_mode == TransportMode::PubSub || self.config.role.is_beacon() {
            let subscription = self.transport.subscribe(&GroupId::beacon())?;
            self.install_group_receiver(subscription).await;
        }
        handles.push(tokio::spawn(Arc::clone(self).run_group_drain()));

        if self.config.role.is_leader() {
            handles.push(tokio::spawn(Arc::clone(self).run_pong_broadcaster()));
        }

        let pub_sub_joiner =
            self.config.transport_mode == TransportMode::PubSub && !self.config.role.is_leader();
        if self.config.bootstrap_leader.is_some() || pub_sub_joiner {
            let node = Arc::clone(self);
            handles.push(tokio::spawn(async move {
                let outcome = node.join_shard().await;
                tracing::info!(?outcome, "join loop finished");
            }));
        }

        self.task_handles.lock().await.extend(handles);
        tracing::info!("shard node started");
        Ok(())
    }

    /// Deliver the transport's outbound traffic over TCP until shutdown.
    pub async fn attach_outbound(&self, rx: mpsc::Receiver<Outbound>) {
        let handle = spawn_outbound_drain(rx, &self.shutdown);
        self.task_handles.lock().await.push(handle);
    }

    /// Signal shutdown and wait for the background tasks.
    pub async fn stop(&self) {
        tracing::info!("shard node stopping");
        self.shutdown.shutdown();

        let handles: Vec<JoinHandle<()>> = self.task_handles.lock().await.drain(..).collect();
        let wait_all = async {
            for handle in handles {
                let _ = handle.await;
            }
        };
        if tokio::time::timeout(SHUTDOWN_TIMEOUT, wait_all).await.is_err() {
            tracing::warn!(timeout = ?SHUTDOWN_TIMEOUT, "shutdown timed out, some tasks may still be running");
        }
        tracing::info!("shard node stopped");
    }

    async fn run_stream_listener(self: Arc<Self>, listener: TcpListener) {
        let mut shutdown_rx = self.shutdown.subscribe();
        loop {
            tokio::select! {
                biased;
                _ = shutdown_rx.recv() => {
                    tracing::info!("stream listener shutting down");
                    break;
                }
                result = listener.accept() => match result {
                    Ok((stream, addr)) => {
                        tracing::trace!(%addr, "stream accepted");
                        tokio::spawn(Arc::clone(&self).read_stream(stream, addr));
                    }
                    Err(e) => tracing::warn!(error = %e, "accept failed"),
                },
            }
        }
    }

    /// Dispatch every frame on one inbound stream until EOF.
    async fn read_stream(self: Arc<Self>, mut stream: TcpStream, addr: SocketAddr) {
        let mut shutdown_rx = self.shutdown.subscribe();
        loop {
            let frame = tokio::select! {
                biased;
                _ = shutdown_rx.recv() => break,
                frame = read_frame(&mut stream) => frame,
            };
            match frame {
                Ok(Some(content)) => {
                    self.handle_message(&content, None).await;
                }
                Ok(None) => break,
                Err(e) => {
                    tracing::warn!(%addr, error = %e, "stream read failed");
                    break;
                }
            }
        }
        tracing::trace!(%addr, "stream closed");
    }

    /// Drain the group subscription. Polls with backoff while none is
    /// installed, and goes back to polling when one closes.
    async fn run_group_drain(self: Arc<Self>) {
        let mut shutdown_rx = self.shutdown.subscribe();
        let mut backoff = GROUP_POLL_INITIAL;
        loop {
            if self.shutdown.is_triggered() {
                break;
            }
            let subscription = self.group_receiver.lock().await.take();
            let Some(mut subscription) = subscription else {
                tokio::select! {
                    biased;
                    _ = shutdown_rx.recv() => break,
                    _ = tokio::time::sleep(backoff) => {}
                }
                backoff = (backoff * 2).min(GROUP_POLL_MAX);
                continue;
            };
            backoff = GROUP_POLL_INITIAL;

            loop {
                let message = tokio::select! {
                    biased;
                    _ = shutdown_rx.recv() => return,
                    message = subscription.recv() => message,
                };
                let Some(message) = message else {
                    tracing::warn!(group = %subscription.group(), "group subscription closed");
                    break;
                };
                if message.sender == self.transport.local_peer_id() {
                    continue;
                }
                match unwrap_envelope(&message.content) {
                    Ok(content) => {
                        self.handle_message(content, Some(&message.sender)).await;
                    }
                    Err(e) => {
                        self.metrics.decode_failures.inc();
                        tracing::warn!(sender = %message.sender, error = %e, "dropping group message");
                    }
                }
            }
        }
        tracing::debug!("group drain shutting down");
    }
}
