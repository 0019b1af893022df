//! Node facade
//!
//! A [`Node`] owns one ledger and at most one mining coordinator and exposes
//! the operations a caller (the CLI, or an embedding application) needs:
//! submitting transactions, driving mining, and querying chain state.

pub mod service;

pub use service::{Node, NodeStatus};
