//! Transaction storage
//!
//! This module holds the in-memory pool of transactions waiting to be
//! included in a block.

pub mod memory_pool;

pub use memory_pool::{MemoryPool, DEFAULT_POOL_CAPACITY};
