//! Ledger testing helpers
//!
//! Builders for candidate blocks and a noise-free miner, so tests can produce
//! blocks the ledger will accept (or reject in a controlled way).

pub mod test_utils;

pub use test_utils::*;
