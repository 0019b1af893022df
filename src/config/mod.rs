//! Configuration management
//!
//! This module handles the node's settings: the consensus parameters the
//! ledger enforces and the tuning knobs of the mining coordinator.
//!
//! Settings come from an optional TOML file plus a few environment overrides.

pub mod settings;

pub use settings::{Config, MiningSettings, GLOBAL_CONFIG};
