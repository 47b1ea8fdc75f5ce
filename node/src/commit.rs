//! Post-consensus block commit.
//!
//! Called once consensus has agreed on a block: validate it, update the stake
//! ledger, hand it to the client, persist it and notify the beacon.

use std::time::Instant;

use tracing::Instrument;

use shard_network::{wrap_envelope, GroupId};
use shard_protocol::encode_block_sync;
use shard_types::{Block, BlockHash, TxHash};

use crate::config::{ShardStatePolicy, TransportMode};
use crate::error::CommitError;
use crate::node::ShardNode;
use crate::staking::StakeChange;
use crate::tracing_spans::commit_span;

/// Outcome of [`ShardNode::verify_new_block`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Verified {
    Clean,
    /// The shard-state check failed and the lenient policy let it through.
    ShardStateWarning,
}

/// What [`ShardNode::commit_block`] did with a block.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CommitReport {
    pub hash: BlockHash,
    /// The chain already held the block; nothing else ran.
    pub already_committed: bool,
    pub shard_state_warning: bool,
    pub stake_changes: Vec<StakeChange>,
    /// The block was sent to the registered client.
    pub broadcast: bool,
    pub inserted: bool,
    /// Pending transactions removed because the block carried them.
    pub pruned: usize,
    pub beacon_notified: bool,
}

impl ShardNode {
    /// Check a block against the chain with this node as proposer.
    pub fn verify_new_block(&self, block: &Block) -> Result<Verified, CommitError> {
        self.chain
            .validate_new_block(block, &self.address)
            .map_err(CommitError::Validation)?;

        match self.chain.validate_new_shard_state(block) {
            Ok(()) => Ok(Verified::Clean),
            Err(e) => match self.config.shard_state_policy {
                ShardStatePolicy::Lenient => {
                    tracing::warn!(number = block.number(), error = %e, "shard state check failed, continuing");
                    Ok(Verified::ShardStateWarning)
                }
                ShardStatePolicy::Strict => Err(CommitError::ShardState(e)),
            },
        }
    }

    /// Run the commit pipeline for one agreed block.
    pub async fn commit_block(&self, block: &Block) -> Result<CommitReport, CommitError> {
        let hash = block.hash();
        let span = commit_span(&hash.to_string(), block.number());
        self.commit_inner(block, hash).instrument(span).await
    }

    async fn commit_inner(&self, block: &Block, hash: BlockHash) -> Result<CommitReport, CommitError> {
        let started = Instant::now();
        let mut report = CommitReport {
            hash,
            ..CommitReport::default()
        };

        if self.chain.has_block(&hash) {
            tracing::debug!("block already committed");
            report.already_committed = true;
            return Ok(report);
        }

        match self.verify_new_block(block) {
            Ok(verified) => report.shard_state_warning = verified == Verified::ShardStateWarning,
            Err(e) => {
                self.metrics.blocks_rejected.inc();
                tracing::warn!(error = %e, "block rejected");
                return Err(e);
            }
        }

        if self.config.role.is_beacon() {
            if let Some(contract) = &self.staking_contract {
                report.stake_changes = self.stakes.lock().await.apply_block(block, contract);
                if !report.stake_changes.is_empty() {
                    tracing::info!(changes = report.stake_changes.len(), "stake ledger updated");
                }
            }
        }

        if self.consensus.is_leader() {
            report.broadcast = self.send_to_client(block).await;
        }

        match self.chain.insert_chain(std::slice::from_ref(block)) {
            Ok(_) => {
                report.inserted = true;
                self.metrics.blocks_committed.inc();
                let hashes: Vec<TxHash> = block.transactions.iter().map(|tx| tx.hash()).collect();
                let mut pool = self.pending.lock().await;
                report.pruned = pool.remove(&hashes);
                self.metrics.pending_transactions.set(pool.len() as i64);
            }
            Err(e) => {
                tracing::error!(error = %e, "block insert failed");
            }
        }

        if self.beacon.is_some() {
            if let Some(evicted) = self.confirmed_blocks.push(block.clone()) {
                self.metrics.confirmed_blocks_dropped.inc();
                tracing::warn!(dropped = evicted.number(), "confirmed block queue full, dropped oldest");
            }
            report.beacon_notified = true;
        }

        self.metrics
            .commit_time_ms
            .observe(started.elapsed().as_secs_f64() * 1000.0);
        tracing::info!(
            number = block.number(),
            txs = block.transactions.len(),
            inserted = report.inserted,
            "block committed"
        );
        Ok(report)
    }

    /// Hand a block to the registered client, if any. Returns whether it was sent.
    async fn send_to_client(&self, block: &Block) -> bool {
        let Some(client) = self.peers.read().await.client_peer().cloned() else {
            return false;
        };
        let bytes = match encode_block_sync(std::slice::from_ref(block)) {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::error!(error = %e, "cannot encode block for client");
                return false;
            }
        };
        let sent = match self.config.transport_mode {
            TransportMode::Direct => self.transport.send_unicast(&client, &bytes),
            TransportMode::PubSub => self
                .transport
                .send_to_groups(&[GroupId::beacon()], &wrap_envelope(&bytes)),
        };
        match sent {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(client = %client, error = %e, "block broadcast to client failed");
                false
            }
        }
    }
}
