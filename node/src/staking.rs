//! Stake accounting driven by committed blocks.
//!
//! Only two calls to the staking contract are understood: `deposit()`, which
//! stakes the transaction value, and `withdraw(uint256)`, which unstakes the
//! 32-byte big-endian argument.

use std::collections::HashMap;

use shard_crypto::Selector;
use shard_types::{Address, Block, Transaction};

/// `deposit()`
pub const DEPOSIT_SELECTOR: Selector = [0xd0, 0xe3, 0x0d, 0xb0];
/// `withdraw(uint256)`
pub const WITHDRAW_SELECTOR: Selector = [0x2e, 0x1a, 0x7d, 0x4d];

const WITHDRAW_ARG_LEN: usize = 32;

/// What one staking transaction did.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StakeChange {
    Deposited { account: Address, amount: i128 },
    Withdrawn { account: Address, amount: i128 },
    /// The withdrawal exceeded the stake; the account is gone.
    Removed { account: Address },
}

/// Address → staked amount.
#[derive(Debug, Default)]
pub struct StakeLedger {
    stakes: HashMap<Address, i128>,
}

impl StakeLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stake_of(&self, account: &Address) -> Option<i128> {
        self.stakes.get(account).copied()
    }

    pub fn set_stake(&mut self, account: Address, amount: i128) {
        self.stakes.insert(account, amount);
    }

    pub fn len(&self) -> usize {
        self.stakes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stakes.is_empty()
    }

    /// Apply every staking call in `block` addressed to `contract`, in order.
    pub fn apply_block(&mut self, block: &Block, contract: &Address) -> Vec<StakeChange> {
        block
            .transactions
            .iter()
            .filter(|tx| tx.to.as_ref() == Some(contract))
            .filter_map(|tx| self.apply_transaction(tx))
            .collect()
    }

    fn apply_transaction(&mut self, tx: &Transaction) -> Option<StakeChange> {
        let selector: Selector = tx.data.get(..4)?.try_into().ok()?;
        match selector {
            DEPOSIT_SELECTOR => {
                let amount = i128::try_from(tx.value).unwrap_or(i128::MAX);
                let stake = self.stakes.entry(tx.from).or_insert(0);
                *stake = stake.saturating_add(amount);
                Some(StakeChange::Deposited {
                    account: tx.from,
                    amount,
                })
            }
            WITHDRAW_SELECTOR => {
                let Some(arg) = tx.data.get(4..4 + WITHDRAW_ARG_LEN) else {
                    tracing::warn!(account = %tx.from, len = tx.data.len(), "withdraw call without amount");
                    return None;
                };
                let amount = decode_amount(arg);
                let current = *self.stakes.get(&tx.from)?;
                if amount > current {
                    self.stakes.remove(&tx.from);
                    Some(StakeChange::Removed { account: tx.from })
                } else {
                    self.stakes.insert(tx.from, current - amount);
                    Some(StakeChange::Withdrawn {
                        account: tx.from,
                        amount,
                    })
                }
            }
            _ => None,
        }
    }
}

/// 32-byte big-endian word, saturated to `i128::MAX`.
fn decode_amount(word: &[u8]) -> i128 {
    let (high, low) = word.split_at(WITHDRAW_ARG_LEN - 16);
    if high.iter().any(|b| *b != 0) {
        return i128::MAX;
    }
    let mut buf = [0u8; 16];
    buf.copy_from_slice(low);
    i128::try_from(u128::from_be_bytes(buf)).unwrap_or(i128::MAX)
}
