//! Block header and body.

use serde::{Deserialize, Serialize};

use crate::{BlockHash, Transaction};

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockHeader {
    pub parent_hash: BlockHash,
    pub number: u64,
    pub shard_id: u32,
    pub timestamp: u64,
    pub extra: Vec<u8>,
}

/// A block as handed over by consensus. Receipts and state roots live with
/// the ledger engine and are not modelled here.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub header: BlockHeader,
    pub transactions: Vec<Transaction>,
}

impl Block {
    pub fn new(header: BlockHeader, transactions: Vec<Transaction>) -> Self {
        Self {
            header,
            transactions,
        }
    }

    /// Blake2b-256 over the encoded header followed by every transaction hash.
    pub fn hash(&self) -> BlockHash {
        let header = bincode::serialize(&self.header).unwrap_or_default();
        let tx_hashes: Vec<[u8; 32]> = self
            .transactions
            .iter()
            .map(|tx| *tx.hash().as_bytes())
            .collect();
        let mut parts: Vec<&[u8]> = Vec::with_capacity(tx_hashes.len() + 1);
        parts.push(&header);
        parts.extend(tx_hashes.iter().map(|h| h.as_slice()));
        BlockHash::new(crate::content_hash(&parts))
    }

    pub fn number(&self) -> u64 {
        self.header.number
    }

    pub fn parent_hash(&self) -> BlockHash {
        self.header.parent_hash
    }

    /// Encoded size of the whole block in bytes.
    pub fn size(&self) -> usize {
        bincode::serialized_size(self).map_or(0, |n| n as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Address;

    fn block(number: u64, txs: usize) -> Block {
        let transactions = (0..txs as u64)
            .map(|nonce| Transaction {
                nonce,
                shard_id: 0,
                from: Address::new([9; 20]),
                to: None,
                value: 0,
                gas_limit: 0,
                data: vec![],
            })
            .collect();
        Block::new(
            BlockHeader {
                number,
                ..BlockHeader::default()
            },
            transactions,
        )
    }

    #[test]
    fn hash_commits_to_transactions() {
        assert_ne!(block(1, 1).hash(), block(1, 2).hash());
        assert_ne!(block(1, 1).hash(), block(2, 1).hash());
        assert_eq!(block(3, 3).hash(), block(3, 3).hash());
    }

    #[test]
    fn size_grows_with_body() {
        assert!(block(1, 5).size() > block(1, 0).size());
    }
}
