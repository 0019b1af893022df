use crate::config::Config;
use crate::core::{Block, ChainStats, Coordinate, Ledger, Transaction};
use crate::error::{LedgerError, Result};
use crate::mining::{IterationOutcome, Miner};
use log::{error, info};
use serde::Serialize;
use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Combined view of the ledger and the coordinator
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeStatus {
    pub active: bool,
    pub chain_height: usize,
    pub difficulty: u32,
    pub coordinate: Option<Coordinate>,
    pub pending_count: usize,
    pub blocks_mined: u64,
    pub total_reward: f64,
    pub hash_rate_per_hour: f64,
}

pub struct Node {
    config: Config,
    ledger: Arc<Ledger>,
    // Handles are cloned out so no caller holds the slot during a search
    miner: Mutex<Option<Arc<Miner>>>,
}

impl Node {
    /// Fresh node with a new genesis block
    pub fn new(config: Config) -> Result<Node> {
        config.validate()?;
        let ledger = Ledger::with_params(config.difficulty, config.consensus.clone())?;
        Ok(Self::with_ledger(config, ledger))
    }

    /// Node over a chain previously written by [`Node::export_chain`]
    pub fn from_export(config: Config, json: &str) -> Result<Node> {
        config.validate()?;
        let blocks: Vec<Block> = serde_json::from_str(json)?;
        let ledger = Ledger::replay(config.difficulty, config.consensus.clone(), blocks)?;
        Ok(Self::with_ledger(config, ledger))
    }

    pub fn load(config: Config, path: &Path) -> Result<Node> {
        let json = fs::read_to_string(path)?;
        Self::from_export(config, &json)
    }

    fn with_ledger(config: Config, ledger: Ledger) -> Node {
        Node {
            config,
            ledger: Arc::new(ledger),
            miner: Mutex::new(None),
        }
    }

    fn miner_slot(&self) -> MutexGuard<'_, Option<Arc<Miner>>> {
        self.miner.lock().unwrap_or_else(|poisoned| {
            error!("Miner slot lock was poisoned, recovering");
            PoisonError::into_inner(poisoned)
        })
    }

    pub fn ledger(&self) -> &Arc<Ledger> {
        &self.ledger
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Build a transaction stamped now and queue it. Returns its id.
    pub fn submit_transaction(
        &self,
        sender: &str,
        receiver: &str,
        amount: f64,
        data: &str,
    ) -> Result<String> {
        let tx = Transaction::new(sender, receiver, amount, data)?;
        self.submit(tx)
    }

    /// Queue a pre-built (possibly signed) transaction. Returns its id.
    pub fn submit(&self, tx: Transaction) -> Result<String> {
        let id = tx.get_id().to_string();
        self.ledger.add_pending_transaction(tx)?;
        Ok(id)
    }

    // Create the coordinator on first use, otherwise point it at the new target
    fn prepare_miner(
        &self,
        slot: &mut Option<Arc<Miner>>,
        miner_address: &str,
        coordinate: Coordinate,
        auto_adjust: bool,
    ) -> Result<Arc<Miner>> {
        if let Some(miner) = slot.as_ref() {
            miner.reconfigure(miner_address, coordinate, auto_adjust)?;
            return Ok(Arc::clone(miner));
        }
        let miner = Arc::new(Miner::new(
            Arc::clone(&self.ledger),
            self.config.mining.clone(),
            miner_address,
            coordinate,
        )?);
        miner.reconfigure(miner_address, coordinate, auto_adjust)?;
        *slot = Some(Arc::clone(&miner));
        Ok(miner)
    }

    fn current_miner(&self) -> Option<Arc<Miner>> {
        self.miner_slot().clone()
    }

    /// Start (or retarget) background mining
    pub fn start_mining(
        &self,
        miner_address: &str,
        coordinate: Coordinate,
        auto_adjust: bool,
    ) -> Result<()> {
        let miner = {
            let mut slot = self.miner_slot();
            self.prepare_miner(&mut slot, miner_address, coordinate, auto_adjust)?
        };
        miner.start()
    }

    /// Stop background mining. The join timeout is waited out without the slot.
    pub fn stop_mining(&self) {
        if let Some(miner) = self.current_miner() {
            miner.stop();
        }
    }

    /// Run a single mining attempt on the calling thread
    pub fn mine_block(
        &self,
        miner_address: &str,
        coordinate: Coordinate,
        auto_adjust: bool,
    ) -> Result<IterationOutcome> {
        let miner = {
            let mut slot = self.miner_slot();
            if slot.as_ref().is_some_and(|miner| miner.is_running()) {
                return Err(LedgerError::Mining(
                    "Background mining is active".to_string(),
                ));
            }
            self.prepare_miner(&mut slot, miner_address, coordinate, auto_adjust)?
        };
        miner.mine_once()
    }

    pub fn get_status(&self) -> NodeStatus {
        let miner_status = self.current_miner().map(|miner| miner.status());
        NodeStatus {
            active: miner_status.as_ref().is_some_and(|s| s.active),
            chain_height: self.ledger.height(),
            difficulty: miner_status
                .as_ref()
                .map_or(self.ledger.get_difficulty(), |s| s.difficulty),
            coordinate: miner_status.as_ref().map(|s| s.coordinate),
            pending_count: self.ledger.pending_count(),
            blocks_mined: miner_status.as_ref().map_or(0, |s| s.blocks_mined),
            total_reward: miner_status.as_ref().map_or(0.0, |s| s.total_reward),
            hash_rate_per_hour: miner_status.as_ref().map_or(0.0, |s| s.hash_rate_per_hour),
        }
    }

    pub fn get_balance(&self, address: &str) -> Result<f64> {
        self.ledger.balance_of(address)
    }

    pub fn is_chain_valid(&self) -> bool {
        self.ledger.is_chain_valid()
    }

    pub fn chain_stats(&self) -> ChainStats {
        self.ledger.stats()
    }

    /// The whole chain as pretty-printed JSON
    pub fn export_chain(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.ledger.blocks())?)
    }

    pub fn export_to(&self, path: &Path) -> Result<()> {
        fs::write(path, self.export_chain()?)?;
        info!("Exported {} blocks to {}", self.ledger.height(), path.display());
        Ok(())
    }
}

impl Drop for Node {
    fn drop(&mut self) {
        self.stop_mining();
    }
}
