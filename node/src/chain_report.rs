//! Summary of the local chain, logged when a control stop arrives.

use std::collections::HashSet;
use std::fmt;

use shard_store::ChainStore;

/// Totals and averages over every block reachable from the head.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ChainReport {
    pub block_count: usize,
    pub avg_block_size: f64,
    pub tx_count: usize,
    pub avg_tx_size: f64,
}

impl ChainReport {
    /// Walk parent links from the current head until a block is missing.
    pub fn compute(chain: &dyn ChainStore) -> Self {
        let mut seen = HashSet::new();
        let mut block_count = 0usize;
        let mut block_bytes = 0usize;
        let mut tx_count = 0usize;
        let mut tx_bytes = 0usize;

        let mut cursor = chain.current_block();
        while let Some(block) = cursor {
            if !seen.insert(block.hash()) {
                tracing::warn!(number = block.number(), "cycle in parent links, report truncated");
                break;
            }
            block_count += 1;
            block_bytes += block.size();
            tx_count += block.transactions.len();
            tx_bytes += block
                .transactions
                .iter()
                .map(|tx| tx.encoded_len())
                .sum::<usize>();

            let parent = block.parent_hash();
            cursor = if parent.is_zero() {
                None
            } else {
                chain.block_by_hash(&parent)
            };
        }

        Self {
            block_count,
            avg_block_size: average(block_bytes, block_count),
            tx_count,
            avg_tx_size: average(tx_bytes, tx_count),
        }
    }
}

fn average(total: usize, count: usize) -> f64 {
    if count == 0 {
        0.0
    } else {
        total as f64 / count as f64
    }
}

impl fmt::Display for ChainReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "blocks={} avg_block_size={:.1} txs={} avg_tx_size={:.1}",
            self.block_count, self.avg_block_size, self.tx_count, self.avg_tx_size
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shard_nullables::NullChain;
    use shard_types::{Address, Block, BlockHash, BlockHeader, Transaction};

    fn tx(nonce: u64) -> Transaction {
        Transaction {
            nonce,
            shard_id: 0,
            from: Address::new([1; 20]),
            to: None,
            value: 0,
            gas_limit: 1,
            data: vec![0; 10],
        }
    }

    fn chain_of(lengths: &[usize]) -> Vec<Block> {
        let mut parent = BlockHash::ZERO;
        let mut blocks = Vec::new();
        for (i, n) in lengths.iter().enumerate() {
            let block = Block::new(
                BlockHeader {
                    parent_hash: parent,
                    number: i as u64,
                    ..Default::default()
                },
                (0..*n as u64).map(tx).collect(),
            );
            parent = block.hash();
            blocks.push(block);
        }
        blocks
    }

    #[test]
    fn empty_chain_reports_zeroes() {
        let report = ChainReport::compute(&NullChain::new());
        assert_eq!(report, ChainReport::default());
    }

    #[test]
    fn counts_every_reachable_block() {
        let blocks = chain_of(&[0, 2, 3]);
        let expected_block_bytes: usize = blocks.iter().map(|b| b.size()).sum();
        let chain = NullChain::with_blocks(blocks);
        let report = ChainReport::compute(&chain);
        assert_eq!(report.block_count, 3);
        assert_eq!(report.tx_count, 5);
        assert!((report.avg_block_size - expected_block_bytes as f64 / 3.0).abs() < 1e-9);
        assert_eq!(report.avg_tx_size, tx(0).encoded_len() as f64);
    }

    #[test]
    fn walk_stops_at_missing_parent() {
        let blocks = chain_of(&[1, 1, 1]);
        // Drop the genesis block: the walk ends at block 1.
        let chain = NullChain::with_blocks(blocks[1..].to_vec());
        assert_eq!(ChainReport::compute(&chain).block_count, 2);
    }
}
