//! Two nodes joining a shard end to end.
//!
//! Each node gets a channel transport. In direct mode the outbound queue is
//! delivered over real TCP streams; in pub-sub mode both transports share one
//! in-process group hub.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;

use shard_consensus::Consensus;
use shard_crypto::keypair_from_seed;
use shard_network::{ChannelTransport, GroupHub, Outbound};
use shard_node::{Collaborators, DiscoveryPhase, NodeConfig, NodeRole, ShardNode, TransportMode};
use shard_nullables::{NullChain, NullConsensus};
use shard_types::PublicKey;

fn key(n: u8) -> PublicKey {
    keypair_from_seed(&[n; 32]).public
}

fn free_port() -> u16 {
    std::net::TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port()
}

struct TestNode {
    node: Arc<ShardNode>,
    consensus: Arc<NullConsensus>,
    outbound_rx: Option<mpsc::Receiver<Outbound>>,
}

fn build(config: NodeConfig, seed: u8, consensus: NullConsensus, hub: &GroupHub) -> TestNode {
    let (outbound_tx, outbound_rx) = mpsc::channel(64);
    let transport = ChannelTransport::new(config.peer_id.clone(), outbound_tx, hub.clone());
    let consensus = Arc::new(consensus);
    let node = ShardNode::new(
        config,
        key(seed),
        Collaborators {
            transport: Arc::new(transport),
            consensus: consensus.clone(),
            chain: Arc::new(NullChain::new()),
            beacon: None,
            sync_client: None,
        },
    )
    .unwrap();
    TestNode {
        node: Arc::new(node),
        consensus,
        outbound_rx: Some(outbound_rx),
    }
}

async fn wait_until_ready(node: &ShardNode, limit: Duration) -> bool {
    let deadline = tokio::time::Instant::now() + limit;
    while tokio::time::Instant::now() < deadline {
        if node.phase().await == DiscoveryPhase::ReadyForConsensus {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    false
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn validator_joins_leader_over_tcp() {
    let hub = GroupHub::new();
    let leader_port = free_port();
    let validator_port = free_port();

    let mut leader = build(
        NodeConfig {
            port: leader_port,
            peer_id: "leader".into(),
            role: NodeRole::ShardLeader,
            ..NodeConfig::default()
        },
        1,
        NullConsensus::leader().with_committee(vec![], vec![key(1)]),
        &hub,
    );
    let mut validator = build(
        NodeConfig {
            port: validator_port,
            peer_id: "validator".into(),
            bootstrap_leader: Some(format!("127.0.0.1:{leader_port}")),
            ..NodeConfig::default()
        },
        2,
        NullConsensus::validator(),
        &hub,
    );

    // The leader is a member of its own committee.
    leader.consensus.add_peers(&[leader.node.self_peer.clone()]);

    for n in [&mut leader, &mut validator] {
        let rx = n.outbound_rx.take().unwrap();
        n.node.attach_outbound(rx).await;
        n.node.start().await.unwrap();
    }

    assert!(wait_until_ready(&validator.node, Duration::from_secs(10)).await);

    // The leader learned the validator from its ping.
    let known = leader.consensus.validator_peers();
    assert_eq!(known.len(), 2);
    let learned = known.iter().find(|p| p.port == validator_port).unwrap();
    assert_eq!(learned.public_key, Some(key(2)));
    // Stream pings carry no sender id, so each retry is recorded.
    assert!(!leader.node.peers.read().await.incoming_peers().is_empty());

    // The validator took the leader's key set and membership from the pong.
    {
        let table = validator.node.peers.read().await;
        assert_eq!(table.len(), 2);
        assert!(table.contains(&leader.node.self_peer));
        assert!(table.contains(&validator.node.self_peer));
    }
    let members = validator.consensus.validator_peers();
    assert_eq!(members.len(), 2);
    assert!(members.iter().any(|p| p.port == leader_port && p.public_key == Some(key(1))));
    assert_eq!(validator.node.public_keys().await, vec![key(1)]);
    assert_eq!(validator.consensus.public_keys(), vec![key(1)]);
    assert!(validator.node.metrics.pongs_received.get() >= 1);

    leader.node.stop().await;
    validator.node.stop().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn validator_joins_through_beacon_group() {
    let hub = GroupHub::new();

    let leader = build(
        NodeConfig {
            peer_id: "leader".into(),
            role: NodeRole::ShardLeader,
            transport_mode: TransportMode::PubSub,
            listen: false,
            pong_interval_secs: 1,
            ..NodeConfig::default()
        },
        1,
        NullConsensus::leader().with_committee(vec![], vec![key(1)]),
        &hub,
    );
    let validator = build(
        NodeConfig {
            port: 9001,
            peer_id: "validator".into(),
            transport_mode: TransportMode::PubSub,
            listen: false,
            ..NodeConfig::default()
        },
        2,
        NullConsensus::validator(),
        &hub,
    );

    leader.node.start().await.unwrap();
    validator.node.start().await.unwrap();

    assert!(wait_until_ready(&validator.node, Duration::from_secs(10)).await);
    assert_eq!(validator.consensus.public_keys(), vec![key(1)]);

    // Repeated pings from the same sender were counted once.
    assert_eq!(leader.consensus.validator_peers().len(), 1);
    assert_eq!(leader.node.peers.read().await.incoming_peers().len(), 1);

    leader.node.stop().await;
    validator.node.stop().await;
}
