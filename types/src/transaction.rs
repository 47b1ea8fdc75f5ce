//! Account-model transaction as carried in blocks and the pending pool.

use serde::{Deserialize, Serialize};

use crate::{Address, TxHash};

/// A signed-and-verified transaction. Signature checking belongs to the
/// ledger engine; by the time a transaction reaches this type its sender has
/// been recovered into `from`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub nonce: u64,
    pub shard_id: u32,
    pub from: Address,
    /// `None` for contract creation.
    pub to: Option<Address>,
    pub value: u128,
    pub gas_limit: u64,
    pub data: Vec<u8>,
}

impl Transaction {
    /// Blake2b-256 of the bincode encoding.
    pub fn hash(&self) -> TxHash {
        let bytes = bincode::serialize(self).unwrap_or_default();
        TxHash::new(crate::content_hash(&[&bytes]))
    }

    /// Length of the bincode encoding in bytes.
    pub fn encoded_len(&self) -> usize {
        bincode::serialized_size(self).map_or(0, |n| n as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

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

    #[test]
    fn hash_is_deterministic_and_content_bound() {
        assert_eq!(tx(1).hash(), tx(1).hash());
        assert_ne!(tx(1).hash(), tx(2).hash());
        assert!(!tx(1).hash().is_zero());
    }
}
