//! Pending transaction pool.

use std::collections::HashSet;

use shard_types::{Transaction, TxHash};

/// Upper bound on transactions handed out for a single block proposal.
pub const MAX_TRANSACTIONS_PER_BLOCK: usize = 8000;

/// Insertion-ordered set of transactions waiting for a block.
#[derive(Debug, Default)]
pub struct TxPool {
    txs: Vec<(TxHash, Transaction)>,
    hashes: HashSet<TxHash>,
}

impl TxPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Union `txs` into the pool. Returns how many were new.
    pub fn add(&mut self, txs: Vec<Transaction>) -> usize {
        let mut added = 0;
        for tx in txs {
            let hash = tx.hash();
            if self.hashes.insert(hash) {
                self.txs.push((hash, tx));
                added += 1;
            }
        }
        added
    }

    /// Pending transactions whose hash is in `wanted`, in pool order.
    pub fn matching(&self, wanted: &[TxHash]) -> Vec<Transaction> {
        let wanted: HashSet<&TxHash> = wanted.iter().collect();
        self.txs
            .iter()
            .filter(|(hash, _)| wanted.contains(hash))
            .map(|(_, tx)| tx.clone())
            .collect()
    }

    /// Remove and return the oldest transactions, at most `max`.
    pub fn take_for_block(&mut self, max: usize) -> Vec<Transaction> {
        let n = max.min(MAX_TRANSACTIONS_PER_BLOCK).min(self.txs.len());
        let taken: Vec<Transaction> = self.txs.drain(..n).map(|(_, tx)| tx).collect();
        for tx in &taken {
            self.hashes.remove(&tx.hash());
        }
        taken
    }

    /// Drop every transaction whose hash is in `committed`. Returns how many
    /// were removed.
    pub fn remove(&mut self, committed: &[TxHash]) -> usize {
        let committed: HashSet<&TxHash> = committed.iter().collect();
        let before = self.txs.len();
        self.txs.retain(|(hash, _)| !committed.contains(hash));
        for hash in committed {
            self.hashes.remove(hash);
        }
        before - self.txs.len()
    }

    pub fn contains(&self, hash: &TxHash) -> bool {
        self.hashes.contains(hash)
    }

    pub fn len(&self) -> usize {
        self.txs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.txs.is_empty()
    }
}
