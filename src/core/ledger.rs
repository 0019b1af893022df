// This is the ledger - the single authoritative in-memory chain
// It owns the accepted blocks, the pool of pending transactions and the running
// statistics, and it is the only place cross-block invariants are enforced

use crate::core::{
    zero_hash, Block, DifficultyAdjustment, Transaction, BLOCK_REWARD, NETWORK_SENDER,
};
use crate::error::{LedgerError, Result};
use crate::storage::MemoryPool;
use crate::utils::current_timestamp;
use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

pub const MAX_TRANSACTIONS_PER_BLOCK: usize = 100; // Maximum transactions allowed in a block
pub const MAX_PENDING_TRANSACTIONS: usize = 1000; // Maximum size of the transaction pool

/// Consensus rules shared by the ledger and the miner
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsensusParams {
    pub block_reward: f64,
    pub max_transactions_per_block: usize,
    pub max_pending_transactions: usize,
}

impl Default for ConsensusParams {
    fn default() -> Self {
        ConsensusParams {
            block_reward: BLOCK_REWARD,
            max_transactions_per_block: MAX_TRANSACTIONS_PER_BLOCK,
            max_pending_transactions: MAX_PENDING_TRANSACTIONS,
        }
    }
}

impl ConsensusParams {
    pub fn validate(&self) -> Result<()> {
        if !crate::core::monetary::is_valid_amount(self.block_reward) {
            return Err(LedgerError::Config(format!(
                "block_reward must be positive, got {}",
                self.block_reward
            )));
        }
        // A block always needs room for its reward
        if self.max_transactions_per_block == 0 {
            return Err(LedgerError::Config(
                "max_transactions_per_block must be at least 1".to_string(),
            ));
        }
        if self.max_pending_transactions == 0 {
            return Err(LedgerError::Config(
                "max_pending_transactions must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Snapshot of the ledger's running statistics
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainStats {
    pub total_blocks: u64,
    pub total_transactions: u64,
    pub total_rewards: f64,
    pub average_block_time: f64,
    pub last_block_time: f64,
    pub processed_transactions: usize,
}

#[derive(Default)]
struct Statistics {
    total_blocks: u64,
    total_transactions: u64,
    total_rewards: f64,
    average_block_time: f64,
    last_block_time: f64,
    processed_ids: HashSet<String>,
}

struct ChainState {
    chain: Vec<Block>,
    stats: Statistics,
}

impl ChainState {
    fn last(&self) -> &Block {
        // The chain always holds at least the genesis block
        &self.chain[self.chain.len() - 1]
    }
}

pub struct Ledger {
    difficulty: u32,
    params: ConsensusParams,
    state: RwLock<ChainState>,
    pool: MemoryPool,
}

impl Ledger {
    /// Create a ledger with default consensus parameters and a fresh genesis block
    pub fn new(difficulty: u32) -> Result<Ledger> {
        Self::with_params(difficulty, ConsensusParams::default())
    }

    pub fn with_params(difficulty: u32, params: ConsensusParams) -> Result<Ledger> {
        let genesis = Block::generate_genesis_block(current_timestamp()?)?;
        Self::from_genesis(difficulty, params, genesis)
    }

    fn from_genesis(difficulty: u32, params: ConsensusParams, genesis: Block) -> Result<Ledger> {
        DifficultyAdjustment::validate_difficulty(difficulty)?;
        params.validate()?;
        Self::check_genesis(&genesis).map_err(LedgerError::Consensus)?;

        info!("Initializing ledger with difficulty {difficulty}");
        let stats = Statistics {
            total_blocks: 1,
            last_block_time: genesis.get_timestamp(),
            ..Default::default()
        };
        info!("Genesis block created with hash: {}...", &genesis.get_hash()[..10]);

        Ok(Ledger {
            difficulty,
            pool: MemoryPool::with_capacity(params.max_pending_transactions),
            params,
            state: RwLock::new(ChainState {
                chain: vec![genesis],
                stats,
            }),
        })
    }

    /// Rebuild a ledger from an exported chain. The first block must be a
    /// genesis block; every later block goes through [`Ledger::append_block`].
    pub fn replay(difficulty: u32, params: ConsensusParams, blocks: Vec<Block>) -> Result<Ledger> {
        let mut blocks = blocks.into_iter();
        let genesis = blocks
            .next()
            .ok_or_else(|| LedgerError::Consensus("Cannot replay an empty chain".to_string()))?;
        let ledger = Self::from_genesis(difficulty, params, genesis)?;
        for block in blocks {
            ledger.append_block(block)?;
        }
        info!("Replayed chain of {} blocks", ledger.height());
        Ok(ledger)
    }

    fn read_state(&self) -> RwLockReadGuard<'_, ChainState> {
        self.state.read().unwrap_or_else(|poisoned| {
            error!("Chain lock was poisoned, recovering");
            PoisonError::into_inner(poisoned)
        })
    }

    fn write_state(&self) -> RwLockWriteGuard<'_, ChainState> {
        self.state.write().unwrap_or_else(|poisoned| {
            error!("Chain lock was poisoned, recovering");
            PoisonError::into_inner(poisoned)
        })
    }

    pub fn get_difficulty(&self) -> u32 {
        self.difficulty
    }

    pub fn params(&self) -> &ConsensusParams {
        &self.params
    }

    /// Number of blocks, genesis included
    pub fn height(&self) -> usize {
        self.read_state().chain.len()
    }

    pub fn last_block(&self) -> Block {
        self.read_state().last().clone()
    }

    pub fn block(&self, index: usize) -> Option<Block> {
        self.read_state().chain.get(index).cloned()
    }

    /// Copy of the whole chain, genesis first
    pub fn blocks(&self) -> Vec<Block> {
        self.read_state().chain.clone()
    }

    pub fn stats(&self) -> ChainStats {
        let state = self.read_state();
        ChainStats {
            total_blocks: state.stats.total_blocks,
            total_transactions: state.stats.total_transactions,
            total_rewards: state.stats.total_rewards,
            average_block_time: state.stats.average_block_time,
            last_block_time: state.stats.last_block_time,
            processed_transactions: state.stats.processed_ids.len(),
        }
    }

    pub fn is_processed(&self, txid: &str) -> bool {
        self.read_state().stats.processed_ids.contains(txid)
    }

    /// Validate and append a block. A rejected block leaves every piece of
    /// ledger state untouched.
    pub fn append_block(&self, block: Block) -> Result<()> {
        let mut state = self.write_state();

        if let Err(reason) = self.check_block(&state, &block) {
            warn!("Block {} validation failed: {reason}", block.get_index());
            return Err(LedgerError::Consensus(reason));
        }

        let stats = &mut state.stats;
        stats.total_blocks += 1;
        stats.total_transactions += block.get_transactions().len() as u64;
        for tx in block.get_transactions() {
            stats.processed_ids.insert(tx.get_id().to_string());
            if tx.is_reward() {
                stats.total_rewards += tx.get_amount();
            }
        }

        if stats.last_block_time > 0.0 {
            let block_time = block.get_timestamp() - stats.last_block_time;
            let n = stats.total_blocks as f64;
            stats.average_block_time = (stats.average_block_time * (n - 1.0) + block_time) / n;
        }
        stats.last_block_time = block.get_timestamp();

        info!(
            "Block {} added to chain with hash: {}... ({} transactions)",
            block.get_index(),
            &block.get_hash()[..10],
            block.get_transactions().len()
        );
        state.chain.push(block);
        Ok(())
    }

    fn check_block(&self, state: &ChainState, block: &Block) -> std::result::Result<(), String> {
        if block.get_index() != state.chain.len() as u64 {
            return Err(format!(
                "Invalid block index. Expected {}, got {}",
                state.chain.len(),
                block.get_index()
            ));
        }
        self.check_header(block, state.last())?;
        self.check_contents(block, &state.stats.processed_ids)?;
        Ok(())
    }

    // Linkage, difficulty and hash integrity against the predecessor
    fn check_header(&self, block: &Block, previous: &Block) -> std::result::Result<(), String> {
        if block.get_index() != previous.get_index() + 1 {
            return Err(format!(
                "Block index {} does not follow {}",
                block.get_index(),
                previous.get_index()
            ));
        }
        if block.get_previous_hash() != previous.get_hash() {
            return Err("Block's previous hash doesn't match last block's hash".to_string());
        }
        if !block.meets_difficulty(self.difficulty) {
            return Err(format!(
                "Block hash doesn't meet difficulty requirement of {}",
                self.difficulty
            ));
        }
        let calculated = block
            .calculate_hash()
            .map_err(|e| format!("Failed to recompute block hash: {e}"))?;
        if calculated != block.get_hash() {
            return Err("Block hash is invalid".to_string());
        }
        Ok(())
    }

    // Size limit, id integrity, duplicates and the reward rule. Returns the
    // block's ids so chain-wide checks can accumulate them.
    fn check_contents(
        &self,
        block: &Block,
        known_ids: &HashSet<String>,
    ) -> std::result::Result<HashSet<String>, String> {
        let transactions = block.get_transactions();
        if transactions.len() > self.params.max_transactions_per_block {
            return Err(format!(
                "Block exceeds maximum transaction limit of {}",
                self.params.max_transactions_per_block
            ));
        }

        let mut block_ids = HashSet::with_capacity(transactions.len());
        for tx in transactions {
            if !tx.has_valid_id() {
                return Err(format!("Transaction {} does not match its id", tx.get_id()));
            }
            if known_ids.contains(tx.get_id()) {
                return Err(format!("Transaction already processed: {}", tx.get_id()));
            }
            if !block_ids.insert(tx.get_id().to_string()) {
                return Err(format!("Duplicate transaction found: {}", tx.get_id()));
            }
        }

        let mut rewards = 0usize;
        for tx in block.reward_transactions() {
            rewards += 1;
            if rewards > 1 {
                return Err("Multiple reward transactions found".to_string());
            }
            if tx.get_amount() != self.params.block_reward {
                return Err(format!("Invalid mining reward amount: {}", tx.get_amount()));
            }
            if tx.get_receiver() != block.get_miner() {
                return Err("Mining reward receiver doesn't match block miner".to_string());
            }
        }
        if rewards == 0 {
            return Err("No mining reward transaction found".to_string());
        }

        Ok(block_ids)
    }

    fn check_genesis(genesis: &Block) -> std::result::Result<(), String> {
        if genesis.get_index() != 0 {
            return Err(format!("Genesis block has index {}", genesis.get_index()));
        }
        if genesis.get_previous_hash() != zero_hash() {
            return Err("Genesis previous hash must be all zeros".to_string());
        }
        if !genesis.get_transactions().is_empty() {
            return Err("Genesis block must not carry transactions".to_string());
        }
        if !genesis.has_valid_hash() {
            return Err("Genesis block hash is invalid".to_string());
        }
        Ok(())
    }

    /// Queue a transaction for inclusion in a future block
    pub fn add_pending_transaction(&self, tx: Transaction) -> Result<()> {
        if tx.get_sender() == NETWORK_SENDER {
            return Err(LedgerError::Validation(
                "Reward transactions cannot be submitted to the pool".to_string(),
            ));
        }
        // Anything pooled must be something append_block can accept
        if !tx.has_valid_id() {
            return Err(LedgerError::Validation(format!(
                "Transaction {} does not match its id",
                tx.get_id()
            )));
        }

        // Chain before pool, so an id cannot be committed between the two checks
        let state = self.read_state();
        if state.stats.processed_ids.contains(tx.get_id()) {
            return Err(LedgerError::Duplicate(tx.get_id().to_string()));
        }
        let short_id = tx.short_id().to_string();
        self.pool.add(tx)?;
        drop(state);

        debug!(
            "Added transaction {short_id}... to pending pool (pool size: {})",
            self.pool.len()
        );
        Ok(())
    }

    /// Oldest-first copies of up to `limit` pending transactions
    pub fn take_pending(&self, limit: usize) -> Vec<Transaction> {
        self.pool.take(limit)
    }

    pub fn remove_pending(&self, txids: &[String]) -> usize {
        self.pool.remove_many(txids)
    }

    pub fn pending_count(&self) -> usize {
        self.pool.len()
    }

    pub fn pending_snapshot(&self) -> Vec<Transaction> {
        self.pool.get_all()
    }

    pub fn is_pending(&self, txid: &str) -> bool {
        self.pool.contains(txid)
    }

    /// Re-verify the whole chain from scratch, independently of the statistics
    pub fn is_chain_valid(&self) -> bool {
        let state = self.read_state();

        if let Err(reason) = Self::check_genesis(&state.chain[0]) {
            error!("Invalid chain: {reason}");
            return false;
        }

        let mut seen_ids: HashSet<String> = HashSet::new();
        for pair in state.chain.windows(2) {
            let (previous, current) = (&pair[0], &pair[1]);
            let index = current.get_index();

            if let Err(reason) = self.check_header(current, previous) {
                error!("Invalid chain: block {index}: {reason}");
                return false;
            }
            match self.check_contents(current, &seen_ids) {
                Ok(ids) => seen_ids.extend(ids),
                Err(reason) => {
                    error!("Invalid chain: block {index}: {reason}");
                    return false;
                }
            }
        }

        info!("Chain validation successful");
        true
    }

    /// Sum of everything received minus everything sent, across the whole chain
    pub fn balance_of(&self, address: &str) -> Result<f64> {
        if address.is_empty() {
            return Err(LedgerError::InvalidAddress(
                "Address must be a non-empty string".to_string(),
            ));
        }

        let state = self.read_state();
        let mut balance = 0.0;
        for block in &state.chain {
            for tx in block.get_transactions() {
                if tx.get_receiver() == address {
                    balance += tx.get_amount();
                }
                if tx.get_sender() == address {
                    balance -= tx.get_amount();
                }
            }
        }
        Ok(balance)
    }

    /// Apply `edit` to a committed block, bypassing validation
    #[cfg(test)]
    pub(crate) fn tamper_with(&self, index: usize, edit: impl FnOnce(&mut Block)) {
        let mut state = self.write_state();
        edit(&mut state.chain[index]);
    }
}
