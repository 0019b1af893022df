use crate::core::Transaction;
use crate::error::{LedgerError, Result};
use std::collections::{HashSet, VecDeque};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

pub const DEFAULT_POOL_CAPACITY: usize = 1000;

#[derive(Default)]
struct PoolState {
    queue: VecDeque<Transaction>,
    ids: HashSet<String>,
}

/// Bounded FIFO of unconfirmed transactions, unique by id
pub struct MemoryPool {
    inner: RwLock<PoolState>,
    capacity: usize,
}

impl Default for MemoryPool {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryPool {
    pub fn new() -> MemoryPool {
        Self::with_capacity(DEFAULT_POOL_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> MemoryPool {
        MemoryPool {
            inner: RwLock::new(PoolState::default()),
            capacity,
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, PoolState> {
        self.inner.read().unwrap_or_else(|poisoned| {
            log::error!("Memory pool lock was poisoned, recovering");
            PoisonError::into_inner(poisoned)
        })
    }

    fn write(&self) -> RwLockWriteGuard<'_, PoolState> {
        self.inner.write().unwrap_or_else(|poisoned| {
            log::error!("Memory pool lock was poisoned, recovering");
            PoisonError::into_inner(poisoned)
        })
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Append to the back of the queue
    pub fn add(&self, tx: Transaction) -> Result<()> {
        let mut pool = self.write();
        if pool.ids.contains(tx.get_id()) {
            return Err(LedgerError::Duplicate(tx.get_id().to_string()));
        }
        if pool.queue.len() >= self.capacity {
            return Err(LedgerError::PoolFull {
                capacity: self.capacity,
            });
        }
        pool.ids.insert(tx.get_id().to_string());
        pool.queue.push_back(tx);
        Ok(())
    }

    pub fn contains(&self, txid: &str) -> bool {
        self.read().ids.contains(txid)
    }

    pub fn get(&self, txid: &str) -> Option<Transaction> {
        self.read()
            .queue
            .iter()
            .find(|tx| tx.get_id() == txid)
            .cloned()
    }

    /// Copies of up to `limit` transactions, oldest first. The pool is unchanged.
    pub fn take(&self, limit: usize) -> Vec<Transaction> {
        self.read().queue.iter().take(limit).cloned().collect()
    }

    /// Drop every transaction whose id is listed; returns how many were removed
    pub fn remove_many(&self, txids: &[String]) -> usize {
        let wanted: HashSet<&str> = txids.iter().map(String::as_str).collect();
        let mut pool = self.write();
        let before = pool.queue.len();
        pool.queue.retain(|tx| !wanted.contains(tx.get_id()));
        for id in &wanted {
            pool.ids.remove(*id);
        }
        before - pool.queue.len()
    }

    pub fn len(&self) -> usize {
        self.read().queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().queue.is_empty()
    }

    pub fn get_all(&self) -> Vec<Transaction> {
        self.read().queue.iter().cloned().collect()
    }

    pub fn clear(&self) {
        let mut pool = self.write();
        pool.queue.clear();
        pool.ids.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tx(n: u32) -> Transaction {
        Transaction::with_timestamp("alice", "bob", f64::from(n) + 1.0, "", 1_700_000_000.0)
            .unwrap()
    }

    #[test]
    fn test_fifo_order() {
        let pool = MemoryPool::new();
        for n in 0..5 {
            pool.add(tx(n)).unwrap();
        }
        let taken = pool.take(3);
        assert_eq!(taken.len(), 3);
        assert_eq!(taken[0].get_id(), tx(0).get_id());
        assert_eq!(taken[2].get_id(), tx(2).get_id());
        // take() leaves the pool intact
        assert_eq!(pool.len(), 5);
    }

    #[test]
    fn test_capacity() {
        let pool = MemoryPool::with_capacity(2);
        pool.add(tx(0)).unwrap();
        pool.add(tx(1)).unwrap();
        assert_eq!(
            pool.add(tx(2)),
            Err(LedgerError::PoolFull { capacity: 2 })
        );
        assert_eq!(pool.len(), 2);
    }

    #[test]
    fn test_duplicate_rejected() {
        let pool = MemoryPool::new();
        pool.add(tx(0)).unwrap();
        assert!(matches!(pool.add(tx(0)), Err(LedgerError::Duplicate(_))));
        assert_eq!(pool.len(), 1);
    }

    #[test]
    fn test_remove_many() {
        let pool = MemoryPool::new();
        for n in 0..4 {
            pool.add(tx(n)).unwrap();
        }
        let removed = pool.remove_many(&[
            tx(1).get_id().to_string(),
            tx(3).get_id().to_string(),
            "not-present".to_string(),
        ]);
        assert_eq!(removed, 2);
        assert!(!pool.contains(tx(1).get_id()));
        assert!(pool.contains(tx(2).get_id()));
        assert_eq!(pool.get(tx(2).get_id()), Some(tx(2)));

        // A removed id can be pooled again
        pool.add(tx(1)).unwrap();
        assert_eq!(
            pool.get_all().last().map(|t| t.get_id().to_string()),
            Some(tx(1).get_id().to_string())
        );
    }

    #[test]
    fn test_clear() {
        let pool = MemoryPool::new();
        pool.add(tx(0)).unwrap();
        pool.clear();
        assert!(pool.is_empty());
        pool.add(tx(0)).unwrap();
    }
}
