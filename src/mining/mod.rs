//! Block production
//!
//! The mining coordinator assembles candidate blocks from the pending pool,
//! runs the proof-of-work search and commits results to the ledger, either
//! one attempt at a time or on a background worker thread.

pub mod backoff;
pub mod miner;
pub mod stats;

pub use backoff::{Backoff, BackoffAction};
pub use miner::{IterationOutcome, Miner, MinerStatus};
pub use stats::MiningStats;
