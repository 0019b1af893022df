//! Monetary constants for the ledger
//!
//! Amounts are plain reals: there is no smallest unit and no fee market. The
//! only way new value enters the chain is the per-block reward paid by the
//! reserved `network` sender.

/// Sender used by protocol-issued reward transactions
pub const NETWORK_SENDER: &str = "network";

/// Reward credited to the miner of every non-genesis block
pub const BLOCK_REWARD: f64 = 50.0;

/// Data payload carried by reward transactions
pub const REWARD_MEMO: &str = "Mining Reward";

/// Whether an amount can appear in a transaction
pub fn is_valid_amount(amount: f64) -> bool {
    amount.is_finite() && amount > 0.0
}
