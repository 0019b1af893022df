//! Core ledger functionality
//!
//! This module contains the fundamental ledger components including
//! coordinates, transactions, blocks, the chain itself and the
//! proof-of-fractal-work engine with its difficulty controller.

pub mod block;
pub mod coordinate;
pub mod difficulty;
pub mod ledger;
pub mod monetary;
pub mod proof_of_work;
pub mod transaction;

pub use block::{target_prefix, zero_hash, Block};
pub use coordinate::{Coordinate, MAX_COORDINATE, MIN_COORDINATE};
pub use difficulty::{
    DifficultyAdjustment, FixedNoise, NoiseSource, RandomNoise, INITIAL_DIFFICULTY,
    MAX_DIFFICULTY, MAX_SCORE, MIN_DIFFICULTY, MIN_SCORE, NOISE_RANGE, TARGET_BLOCK_TIME,
};
pub use ledger::{
    ChainStats, ConsensusParams, Ledger, MAX_PENDING_TRANSACTIONS, MAX_TRANSACTIONS_PER_BLOCK,
};
pub use monetary::{BLOCK_REWARD, NETWORK_SENDER, REWARD_MEMO};
pub use proof_of_work::{ProofOfWork, SearchOutcome, SolvedBlock, DEFAULT_MAX_NONCE};
pub use transaction::{SignatureVerifier, Signer, Transaction};
