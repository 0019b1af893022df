//! Utility functions and helpers
//!
//! This module contains hashing, timestamp and canonical serialization
//! helpers used throughout the ledger.

pub mod crypto;
pub mod serialization;

pub use crypto::{current_timestamp, is_hex_digest, sha256_digest, sha256_hex, HASH_HEX_LEN};

pub use serialization::{canonical_string, canonicalize, to_canonical_json};
