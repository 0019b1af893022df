//! Error handling for the ledger
//!
//! This module provides the error types returned by every ledger, mining and
//! configuration operation.

use std::fmt;

/// Result type alias for ledger operations
pub type Result<T> = std::result::Result<T, LedgerError>;

/// Error types for ledger operations
#[derive(Debug, Clone, PartialEq)]
pub enum LedgerError {
    /// Malformed input to a constructor (amounts, coordinates, hashes, difficulty)
    Validation(String),
    /// Block failed linkage, difficulty, hash or reward checks
    Consensus(String),
    /// The pending pool is at capacity
    PoolFull { capacity: usize },
    /// A transaction with this id is already pending or processed
    Duplicate(String),
    /// Empty or otherwise unusable address
    InvalidAddress(String),
    /// Mining engine or coordinator errors
    Mining(String),
    /// Signing service errors
    Signature(String),
    /// Configuration errors
    Config(String),
    /// Serialization/deserialization errors
    Serialization(String),
    /// File I/O errors
    Io(String),
}

impl LedgerError {
    /// Whether the error belongs to the pool family (full pool, duplicate id)
    pub fn is_pool_error(&self) -> bool {
        matches!(self, LedgerError::PoolFull { .. } | LedgerError::Duplicate(_))
    }
}

impl fmt::Display for LedgerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LedgerError::Validation(msg) => write!(f, "Validation error: {msg}"),
            LedgerError::Consensus(msg) => write!(f, "Invalid block: {msg}"),
            LedgerError::PoolFull { capacity } => {
                write!(f, "Transaction pool is full (capacity {capacity})")
            }
            LedgerError::Duplicate(id) => write!(f, "Duplicate transaction: {id}"),
            LedgerError::InvalidAddress(addr) => write!(f, "Invalid address: {addr}"),
            LedgerError::Mining(msg) => write!(f, "Mining error: {msg}"),
            LedgerError::Signature(msg) => write!(f, "Signature error: {msg}"),
            LedgerError::Config(msg) => write!(f, "Configuration error: {msg}"),
            LedgerError::Serialization(msg) => write!(f, "Serialization error: {msg}"),
            LedgerError::Io(msg) => write!(f, "I/O error: {msg}"),
        }
    }
}

impl std::error::Error for LedgerError {}

impl From<std::io::Error> for LedgerError {
    fn from(err: std::io::Error) -> Self {
        LedgerError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for LedgerError {
    fn from(err: serde_json::Error) -> Self {
        LedgerError::Serialization(err.to_string())
    }
}

impl From<toml::de::Error> for LedgerError {
    fn from(err: toml::de::Error) -> Self {
        LedgerError::Config(err.to_string())
    }
}
