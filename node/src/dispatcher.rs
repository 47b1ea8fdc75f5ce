//! Inbound message routing.

use tracing::Instrument;

use shard_messages::IdentityAction;
use shard_protocol::{
    decode, encode_transactions, BlockMessage, ControlMessage, Message, NodeMessage, TransactionMessage,
};
use shard_types::{Block, Transaction, TxHash};

use crate::chain_report::ChainReport;
use crate::discovery::PingOutcome;
use crate::node::ShardNode;
use crate::tracing_spans::dispatch_span;

/// The route a message took through [`ShardNode::handle_message`].
#[derive(Clone, Debug, PartialEq)]
pub enum Dispatched {
    Identity(IdentityAction),
    /// Handed to consensus; `leader` tells which entry point was used.
    Consensus { leader: bool },
    Beacon { leader: bool },
    /// Beacon traffic on a node without a beacon.
    BeaconIgnored,
    TransactionsAdded(usize),
    TransactionsReturned { requested: usize, returned: usize },
    /// The requester could not be resolved or the reply failed.
    TransactionRequestUnanswered { requested: usize },
    BlocksForwarded(usize),
    /// No chain-sync consumer is registered.
    BlocksIgnored(usize),
    Stop(ChainReport),
    Ping(PingOutcome),
    Pong { keys: usize },
    /// The frame did not decode.
    Rejected(String),
    /// A collaborator refused the message.
    Failed(String),
}

impl ShardNode {
    /// Decode and route one inbound frame. `sender` is the transport peer id
    /// for group traffic and `None` for stream traffic.
    pub async fn handle_message(&self, content: &[u8], sender: Option<&str>) -> Dispatched {
        let span = dispatch_span(sender.unwrap_or(""), content.len());
        self.dispatch(content, sender).instrument(span).await
    }

    async fn dispatch(&self, content: &[u8], sender: Option<&str>) -> Dispatched {
        self.metrics.frames_received.inc();
        let message = match decode(content) {
            Ok(message) => message,
            Err(e) => {
                self.metrics.decode_failures.inc();
                tracing::warn!(error = %e, len = content.len(), "dropping undecodable message");
                return Dispatched::Rejected(e.to_string());
            }
        };
        tracing::trace!(kind = message.kind(), "dispatching");

        match message {
            Message::Identity(identity) => {
                match identity.action {
                    IdentityAction::Register => {
                        tracing::info!(len = identity.payload.len(), "identity register received");
                    }
                    IdentityAction::Announce => {
                        tracing::error!("identity announce belongs to the identity chain");
                    }
                }
                Dispatched::Identity(identity.action)
            }
            Message::Consensus(payload) => {
                let leader = self.consensus.is_leader();
                let result = if leader {
                    self.consensus.process_leader_message(&payload)
                } else {
                    self.consensus.process_validator_message(&payload)
                };
                match result {
                    Ok(()) => Dispatched::Consensus { leader },
                    Err(e) => {
                        tracing::warn!(leader, error = %e, "consensus rejected message");
                        Dispatched::Failed(e.to_string())
                    }
                }
            }
            Message::Beacon(payload) => {
                let Some(beacon) = &self.beacon else {
                    tracing::debug!("no beacon attached, ignoring beacon message");
                    return Dispatched::BeaconIgnored;
                };
                let leader = beacon.is_leader();
                let result = if leader {
                    beacon.process_leader_message(&payload)
                } else {
                    beacon.process_validator_message(&payload)
                };
                match result {
                    Ok(()) => Dispatched::Beacon { leader },
                    Err(e) => {
                        tracing::warn!(leader, error = %e, "beacon rejected message");
                        Dispatched::Failed(e.to_string())
                    }
                }
            }
            Message::Node(node) => self.dispatch_node(node, sender).await,
        }
    }

    async fn dispatch_node(&self, message: NodeMessage, sender: Option<&str>) -> Dispatched {
        match message {
            NodeMessage::Transaction(TransactionMessage::Send(txs)) => {
                Dispatched::TransactionsAdded(self.add_pending(txs).await)
            }
            NodeMessage::Transaction(TransactionMessage::Request(hashes)) => {
                self.answer_transaction_request(&hashes, sender).await
            }
            NodeMessage::Block(BlockMessage::Sync(blocks)) => self.forward_blocks(blocks).await,
            NodeMessage::Control(ControlMessage::Stop) => self.stop_requested(),
            NodeMessage::Ping(ping) => match self.on_ping(ping, sender).await {
                Ok(outcome) => Dispatched::Ping(outcome),
                Err(e) => Dispatched::Failed(e.to_string()),
            },
            NodeMessage::Pong(pong) => Dispatched::Pong {
                keys: self.on_pong(pong).await,
            },
        }
    }

    async fn add_pending(&self, txs: Vec<Transaction>) -> usize {
        let mut pool = self.pending.lock().await;
        let added = pool.add(txs);
        self.metrics.pending_transactions.set(pool.len() as i64);
        tracing::debug!(added, pending = pool.len(), "transactions received");
        added
    }

    /// Replies go to the requester resolved from the transport sender id.
    /// Stream traffic carries no sender id, so only requests that arrive
    /// over a pub-sub group can be answered.
    async fn answer_transaction_request(&self, hashes: &[TxHash], sender: Option<&str>) -> Dispatched {
        let requested = hashes.len();
        let requester = match sender {
            Some(id) => self.peers.read().await.find_by_peer_id(id).cloned(),
            None => None,
        };
        let Some(requester) = requester else {
            tracing::warn!(sender = sender.unwrap_or(""), requested, "cannot resolve transaction requester");
            return Dispatched::TransactionRequestUnanswered { requested };
        };

        let found = self.pending.lock().await.matching(hashes);
        let returned = found.len();
        let bytes = match encode_transactions(&found) {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::error!(error = %e, "cannot encode requested transactions");
                return Dispatched::TransactionRequestUnanswered { requested };
            }
        };
        if let Err(e) = self.transport.send_unicast(&requester, &bytes) {
            tracing::warn!(peer = %requester, error = %e, "transaction reply failed");
            return Dispatched::TransactionRequestUnanswered { requested };
        }
        tracing::debug!(peer = %requester, requested, returned, "answered transaction request");
        Dispatched::TransactionsReturned { requested, returned }
    }

    async fn forward_blocks(&self, blocks: Vec<Block>) -> Dispatched {
        let count = blocks.len();
        let client = self.sync_client.read().await.clone();
        match client {
            Some(client) => {
                client.update_blocks(blocks);
                tracing::debug!(count, "blocks handed to sync client");
                Dispatched::BlocksForwarded(count)
            }
            None => {
                tracing::debug!(count, "no sync client registered, dropping blocks");
                Dispatched::BlocksIgnored(count)
            }
        }
    }

    fn stop_requested(&self) -> Dispatched {
        let report = ChainReport::compute(self.chain.as_ref());
        tracing::info!(
            block_count = report.block_count,
            avg_block_size = report.avg_block_size,
            tx_count = report.tx_count,
            avg_tx_size = report.avg_tx_size,
            "stop requested: {report}"
        );
        self.shutdown.shutdown();
        if self.config.exit_on_stop {
            std::process::exit(0);
        }
        Dispatched::Stop(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::config::NodeConfig;
    use crate::node::Collaborators;
    use shard_nullables::{NullBeacon, NullChain, NullConsensus, NullSyncClient, NullTransport};
    use shard_protocol::{
        encode_beacon, encode_block_sync, encode_consensus, encode_identity_register, encode_stop,
        encode_transaction_request,
    };
    use shard_types::{Address, BlockHash, BlockHeader, Peer, PublicKey};

    fn key(n: u8) -> PublicKey {
        shard_crypto::keypair_from_seed(&[n; 32]).public
    }

    fn tx(nonce: u64) -> Transaction {
        Transaction {
            nonce,
            shard_id: 0,
            from: Address::new([1; 20]),
            to: Some(Address::new([2; 20])),
            value: 10,
            gas_limit: 21_000,
            data: vec![],
        }
    }

    fn block(number: u64, parent: BlockHash, txs: Vec<Transaction>) -> Block {
        Block::new(
            BlockHeader {
                parent_hash: parent,
                number,
                timestamp: number,
                ..Default::default()
            },
            txs,
        )
    }

    struct Harness {
        node: ShardNode,
        transport: Arc<NullTransport>,
        consensus: Arc<NullConsensus>,
        beacon: Option<Arc<NullBeacon>>,
    }

    fn harness(with_beacon: bool, chain: NullChain) -> Harness {
        let transport = Arc::new(NullTransport::new("self"));
        let consensus = Arc::new(NullConsensus::validator());
        let beacon = with_beacon.then(|| Arc::new(NullBeacon::new(true)));
        let node = ShardNode::new(
            NodeConfig {
                listen: false,
                ..NodeConfig::default()
            },
            key(99),
            Collaborators {
                transport: transport.clone(),
                consensus: consensus.clone(),
                chain: Arc::new(chain),
                beacon: beacon.clone().map(|b| b as Arc<dyn shard_beacon::Beacon>),
                sync_client: None,
            },
        )
        .unwrap();
        Harness {
            node,
            transport,
            consensus,
            beacon,
        }
    }

    #[tokio::test]
    async fn every_bad_frame_counts_once() {
        let h = harness(false, NullChain::new());
        let bad: [&[u8]; 4] = [&[], &[1], &[9, 0], &[1, 5, 0xFF]];
        for frame in bad {
            assert!(matches!(h.node.handle_message(frame, None).await, Dispatched::Rejected(_)));
        }
        assert_eq!(h.node.metrics.decode_failures.get(), 4);
        assert_eq!(h.node.metrics.frames_received.get(), 4);
    }

    #[tokio::test]
    async fn consensus_routes_by_leadership() {
        let h = harness(false, NullChain::new());
        let frame = encode_consensus(&[4, 2]);
        assert_eq!(
            h.node.handle_message(&frame, None).await,
            Dispatched::Consensus { leader: false }
        );
        h.consensus.set_leader(true);
        assert_eq!(
            h.node.handle_message(&frame, None).await,
            Dispatched::Consensus { leader: true }
        );
        assert_eq!(h.consensus.validator_messages(), vec![vec![4, 2]]);
        assert_eq!(h.consensus.leader_messages(), vec![vec![4, 2]]);

        h.consensus.fail_processing(true);
        assert!(matches!(h.node.handle_message(&frame, None).await, Dispatched::Failed(_)));
    }

    #[tokio::test]
    async fn beacon_traffic_needs_a_beacon() {
        let without = harness(false, NullChain::new());
        let frame = encode_beacon(&[1, 1]);
        assert_eq!(without.node.handle_message(&frame, None).await, Dispatched::BeaconIgnored);

        let with = harness(true, NullChain::new());
        assert_eq!(
            with.node.handle_message(&frame, None).await,
            Dispatched::Beacon { leader: true }
        );
        assert_eq!(with.beacon.unwrap().leader_messages(), vec![vec![1, 1]]);
    }

    #[tokio::test]
    async fn identity_register_is_logged_only() {
        let h = harness(false, NullChain::new());
        let frame = encode_identity_register(b"id");
        assert_eq!(
            h.node.handle_message(&frame, None).await,
            Dispatched::Identity(IdentityAction::Register)
        );
    }

    #[tokio::test]
    async fn transactions_are_pooled_and_requests_answered() {
        let h = harness(false, NullChain::new());
        let txs = vec![tx(1), tx(2), tx(3)];
        let frame = encode_transactions(&txs).unwrap();
        assert_eq!(h.node.handle_message(&frame, None).await, Dispatched::TransactionsAdded(3));
        assert_eq!(h.node.handle_message(&frame, None).await, Dispatched::TransactionsAdded(0));
        assert_eq!(h.node.metrics.pending_transactions.get(), 3);

        h.node
            .add_peers(&[Peer::new("10.0.0.2", 8000).with_peer_id("asker").with_public_key(key(1))])
            .await;
        let request = encode_transaction_request(&[txs[2].hash(), TxHash::new([9; 32])]);
        assert_eq!(
            h.node.handle_message(&request, Some("asker")).await,
            Dispatched::TransactionsReturned {
                requested: 2,
                returned: 1
            }
        );
        let sent = h.transport.unicasts();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0.peer_id, "asker");
        assert_eq!(
            decode(&sent[0].1).unwrap(),
            Message::Node(NodeMessage::Transaction(TransactionMessage::Send(vec![tx(3)])))
        );
    }

    #[tokio::test]
    async fn unknown_requester_gets_nothing() {
        let h = harness(false, NullChain::new());
        let request = encode_transaction_request(&[TxHash::new([1; 32])]);
        assert_eq!(
            h.node.handle_message(&request, Some("stranger")).await,
            Dispatched::TransactionRequestUnanswered { requested: 1 }
        );
        assert_eq!(
            h.node.handle_message(&request, None).await,
            Dispatched::TransactionRequestUnanswered { requested: 1 }
        );
        assert!(h.transport.unicasts().is_empty());
    }

    #[tokio::test]
    async fn stream_request_from_known_peer_is_unanswered() {
        let h = harness(false, NullChain::new());
        let pooled = tx(1);
        h.node
            .handle_message(&encode_transactions(&[pooled.clone()]).unwrap(), None)
            .await;
        h.node
            .add_peers(&[Peer::new("10.0.0.2", 8000).with_peer_id("asker").with_public_key(key(1))])
            .await;

        let request = encode_transaction_request(&[pooled.hash()]);
        assert_eq!(
            h.node.handle_message(&request, None).await,
            Dispatched::TransactionRequestUnanswered { requested: 1 }
        );
        assert!(h.transport.unicasts().is_empty());

        assert_eq!(
            h.node.handle_message(&request, Some("asker")).await,
            Dispatched::TransactionsReturned {
                requested: 1,
                returned: 1
            }
        );
    }

    #[tokio::test]
    async fn block_sync_goes_to_registered_client() {
        let h = harness(false, NullChain::new());
        let blocks = vec![block(1, BlockHash::ZERO, vec![])];
        let frame = encode_block_sync(&blocks).unwrap();
        assert_eq!(h.node.handle_message(&frame, None).await, Dispatched::BlocksIgnored(1));

        let client = Arc::new(NullSyncClient::new());
        h.node.register_sync_client(client.clone()).await;
        assert_eq!(h.node.handle_message(&frame, None).await, Dispatched::BlocksForwarded(1));
        assert_eq!(client.received(), blocks);
    }

    #[tokio::test]
    async fn stop_reports_chain_and_shuts_down() {
        let genesis = block(0, BlockHash::ZERO, vec![tx(1)]);
        let next = block(1, genesis.hash(), vec![tx(2), tx(3)]);
        let h = harness(false, NullChain::with_blocks(vec![genesis, next]));

        let Dispatched::Stop(report) = h.node.handle_message(&encode_stop(), None).await else {
            panic!("expected stop");
        };
        assert_eq!(report.block_count, 2);
        assert_eq!(report.tx_count, 3);
        assert!(h.node.shutdown.is_triggered());
    }
}
