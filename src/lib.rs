//! # Triad Ledger - a single-node ledger with proof-of-fractal-work mining
//!
//! An in-memory chain of blocks, a bounded pool of pending transactions and a
//! background miner. Every miner works at a point in a bounded 3-D coordinate
//! space; that coordinate's score feeds the difficulty retargeting alongside
//! the observed block time.
//!
//! ## What lives where
//! - `core/`: coordinates, transactions, blocks, the ledger, the proof-of-work
//!   engine and its difficulty controller
//! - `storage/`: the pending transaction pool
//! - `mining/`: the mining coordinator with its retry backoff and statistics
//! - `node/`: the facade tying one ledger to one coordinator
//! - `config/`: TOML and environment configuration
//! - `utils/`: hashing, timestamps and canonical JSON
//! - `cli/`: command-line parsing for the binary
//!
//! ## Things to keep in mind
//! - Block and transaction hashes are SHA-256 over canonical JSON (sorted
//!   keys, camelCase block fields, `hash` excluded), so exports replay to the
//!   exact same hashes
//! - The ledger difficulty is a fixed minimum. The miner's engine may retarget
//!   above it but never below it
//! - Locks are fine-grained and never held across the nonce scan; when both
//!   are needed the chain lock is taken before the pool lock

pub mod cli;
pub mod config;
pub mod core;
pub mod error;
pub mod mining;
pub mod node;
pub mod storage;
pub mod utils;

#[cfg(test)]
pub mod testnet;

// Re-export commonly used types for convenience
pub use cli::{Command, Opt};
pub use config::{Config, MiningSettings, GLOBAL_CONFIG};
pub use core::{
    Block, ChainStats, ConsensusParams, Coordinate, DifficultyAdjustment, FixedNoise, Ledger,
    NoiseSource, ProofOfWork, RandomNoise, SearchOutcome, SignatureVerifier, Signer,
    SolvedBlock, Transaction,
};
pub use error::{LedgerError, Result};
pub use mining::{IterationOutcome, Miner, MinerStatus, MiningStats};
pub use node::{Node, NodeStatus};
pub use storage::MemoryPool;
pub use utils::{current_timestamp, sha256_digest, sha256_hex};
