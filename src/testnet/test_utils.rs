//! Test utilities for ledger testing

use crate::core::{Block, Coordinate, FixedNoise, Ledger, ProofOfWork, SearchOutcome, Transaction};
use crate::error::{LedgerError, Result};
use crate::utils::HASH_HEX_LEN;
use tempfile::TempDir;

/// Coordinate used for test blocks (score 0.1 without noise)
pub const TEST_COORDINATE: (i64, i64, i64) = (100, 100, 100);

/// Create a temporary directory for testing
pub fn create_temp_dir() -> Result<TempDir> {
    tempfile::tempdir().map_err(LedgerError::from)
}

/// Ledger at difficulty 1 for fast tests
pub fn create_test_ledger() -> Ledger {
    Ledger::new(1).expect("difficulty 1 is always valid")
}

/// Next unmined block for `ledger`, one second after the tip, with the reward appended
pub fn candidate_block(ledger: &Ledger, miner: &str, transactions: Vec<Transaction>) -> Block {
    let timestamp = ledger.last_block().get_timestamp() + 1.0;
    candidate_block_at(ledger, miner, transactions, timestamp)
}

pub fn candidate_block_at(
    ledger: &Ledger,
    miner: &str,
    mut transactions: Vec<Transaction>,
    timestamp: f64,
) -> Block {
    let last = ledger.last_block();
    let reward = Transaction::new_reward(miner, ledger.params().block_reward, timestamp)
        .expect("reward fields are valid");
    transactions.push(reward);

    let (a, b, c) = TEST_COORDINATE;
    Block::new(
        last.get_index() + 1,
        timestamp,
        transactions,
        miner,
        Coordinate::new(a, b, c).expect("test coordinate is in range"),
        last.get_hash(),
    )
    .expect("candidate fields are valid")
}

/// Solve `block` at `difficulty` with a noise-free engine
pub fn mine_block(block: Block, difficulty: u32) -> Block {
    let mut pow =
        ProofOfWork::with_noise(difficulty, Box::new(FixedNoise(0.0))).expect("valid difficulty");
    match pow.search(block, u64::MAX).expect("search runs") {
        SearchOutcome::Solved(solved) => solved.block,
        other => panic!("search did not solve the block: {other:?}"),
    }
}

/// Candidate block for the ledger's tip, mined at the ledger difficulty
pub fn mine_next_block(ledger: &Ledger, miner: &str, transactions: Vec<Transaction>) -> Block {
    mine_block(
        candidate_block(ledger, miner, transactions),
        ledger.get_difficulty(),
    )
}

/// Give `block` a correct hash that fails even difficulty 1
pub fn with_failing_proof(mut block: Block) -> Block {
    let mut preimage = block.hash_preimage().expect("block serializes");
    for nonce in 0.. {
        let hash = Block::hash_preimage_with_nonce(&mut preimage, nonce).expect("hash");
        if !hash.starts_with('0') {
            assert_eq!(hash.len(), HASH_HEX_LEN);
            block.set_proof(nonce, hash);
            return block;
        }
    }
    unreachable!("nonce space exhausted")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mined_candidate_is_accepted() {
        let ledger = create_test_ledger();
        let block = mine_next_block(&ledger, "minerX", vec![]);
        assert_eq!(block.get_index(), 1);
        assert!(block.meets_difficulty(1));
        ledger.append_block(block).unwrap();
        assert_eq!(ledger.height(), 2);
    }

    #[test]
    fn test_failing_proof() {
        let ledger = create_test_ledger();
        let block = with_failing_proof(candidate_block(&ledger, "minerX", vec![]));
        assert!(block.has_valid_hash());
        assert!(!block.meets_difficulty(1));
    }

    #[test]
    fn test_create_temp_dir() {
        let dir = create_temp_dir().unwrap();
        assert!(dir.path().exists());
    }
}
