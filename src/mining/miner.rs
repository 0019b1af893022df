// The mining coordinator - turns pending transactions into blocks
// One worker thread loops: build a candidate, search for a nonce, hand the
// result to the ledger, then prune the pool. Failures back off exponentially
// and eventually push the coordinate somewhere else.

use crate::config::MiningSettings;
use crate::core::{
    Block, Coordinate, Ledger, NoiseSource, ProofOfWork, SearchOutcome, SolvedBlock, Transaction,
};
use crate::error::{LedgerError, Result};
use crate::mining::{Backoff, BackoffAction, MiningStats};
use crate::utils::current_timestamp;
use log::{error, info, warn};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Result of a single mining attempt
#[derive(Debug, Clone)]
pub enum IterationOutcome {
    /// The ledger accepted the block
    Accepted(Block),
    /// No nonce below the ceiling met the target
    Exhausted,
    /// A block was found but the ledger refused it
    Rejected(String),
    /// The coordinator was stopped mid-search
    Interrupted,
}

/// Point-in-time view of the coordinator
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MinerStatus {
    pub active: bool,
    pub miner_address: String,
    pub coordinate: Coordinate,
    pub auto_adjust: bool,
    pub difficulty: u32,
    pub blocks_mined: u64,
    pub total_reward: f64,
    pub hash_rate_per_hour: f64,
    pub retries: u32,
}

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(|poisoned| {
        error!("Miner lock was poisoned, recovering");
        PoisonError::into_inner(poisoned)
    })
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(|poisoned| {
        error!("Miner lock was poisoned, recovering");
        PoisonError::into_inner(poisoned)
    })
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| {
        error!("Miner lock was poisoned, recovering");
        PoisonError::into_inner(poisoned)
    })
}

// State shared between the handle and the worker thread
struct Shared {
    ledger: Arc<Ledger>,
    settings: MiningSettings,
    miner_address: RwLock<String>,
    coordinate: RwLock<Coordinate>,
    auto_adjust: AtomicBool,
    running: AtomicBool,
    engine: Mutex<ProofOfWork>,
    // Mirrors the engine difficulty so status never waits on a search
    difficulty: AtomicU32,
    stats: RwLock<MiningStats>,
    backoff: Mutex<Backoff>,
}

struct Worker {
    handle: JoinHandle<()>,
    stop: Arc<AtomicBool>,
    wake: Sender<()>,
    done: Receiver<()>,
}

pub struct Miner {
    shared: Arc<Shared>,
    worker: Mutex<Option<Worker>>,
}

impl Miner {
    /// Coordinator for `ledger`. The engine starts at the ledger difficulty and
    /// never retargets below it.
    pub fn new(
        ledger: Arc<Ledger>,
        settings: MiningSettings,
        miner_address: &str,
        coordinate: Coordinate,
    ) -> Result<Miner> {
        let engine = ProofOfWork::new(ledger.get_difficulty())?;
        Self::with_engine(ledger, settings, miner_address, coordinate, engine)
    }

    /// Same as [`Miner::new`] with an explicit noise source for the score
    pub fn with_noise(
        ledger: Arc<Ledger>,
        settings: MiningSettings,
        miner_address: &str,
        coordinate: Coordinate,
        noise: Box<dyn NoiseSource>,
    ) -> Result<Miner> {
        let engine = ProofOfWork::with_noise(ledger.get_difficulty(), noise)?;
        Self::with_engine(ledger, settings, miner_address, coordinate, engine)
    }

    fn with_engine(
        ledger: Arc<Ledger>,
        settings: MiningSettings,
        miner_address: &str,
        coordinate: Coordinate,
        mut engine: ProofOfWork,
    ) -> Result<Miner> {
        Self::check_address(miner_address)?;
        settings.validate()?;
        engine.adjustment_mut().set_floor(ledger.get_difficulty())?;
        engine
            .adjustment_mut()
            .set_target_block_time(settings.target_block_time)?;

        let shared = Shared {
            difficulty: AtomicU32::new(engine.get_difficulty()),
            auto_adjust: AtomicBool::new(settings.auto_adjust),
            backoff: Mutex::new(Backoff::from_settings(&settings)),
            ledger,
            settings,
            miner_address: RwLock::new(miner_address.to_string()),
            coordinate: RwLock::new(coordinate),
            running: AtomicBool::new(false),
            engine: Mutex::new(engine),
            stats: RwLock::new(MiningStats::new()),
        };

        Ok(Miner {
            shared: Arc::new(shared),
            worker: Mutex::new(None),
        })
    }

    fn check_address(address: &str) -> Result<()> {
        if address.is_empty() {
            return Err(LedgerError::InvalidAddress(
                "Miner address must be a non-empty string".to_string(),
            ));
        }
        Ok(())
    }

    pub fn ledger(&self) -> &Arc<Ledger> {
        &self.shared.ledger
    }

    pub fn is_running(&self) -> bool {
        self.shared.running.load(Ordering::SeqCst)
    }

    pub fn get_coordinate(&self) -> Coordinate {
        *read(&self.shared.coordinate)
    }

    pub fn get_difficulty(&self) -> u32 {
        self.shared.difficulty.load(Ordering::SeqCst)
    }

    /// Change who gets paid, where to mine and whether to drift. Takes effect
    /// from the next attempt.
    pub fn reconfigure(
        &self,
        miner_address: &str,
        coordinate: Coordinate,
        auto_adjust: bool,
    ) -> Result<()> {
        Self::check_address(miner_address)?;
        *write(&self.shared.miner_address) = miner_address.to_string();
        *write(&self.shared.coordinate) = coordinate;
        self.shared.auto_adjust.store(auto_adjust, Ordering::SeqCst);
        info!(
            "Mining reconfigured: address {miner_address}, coordinate {coordinate}, \
             auto-adjust {auto_adjust}"
        );
        Ok(())
    }

    /// Run one build-search-commit cycle on the calling thread
    pub fn mine_once(&self) -> Result<IterationOutcome> {
        let never = AtomicBool::new(false);
        self.shared.mine_once(&never)
    }

    /// Start the background worker. Does nothing when already running.
    pub fn start(&self) -> Result<()> {
        let mut worker = lock(&self.worker);
        if self.shared.running.swap(true, Ordering::SeqCst) {
            info!("Mining already running");
            return Ok(());
        }
        // A worker that outlived its join timeout keeps its own stop flag
        *worker = None;

        let stop = Arc::new(AtomicBool::new(false));
        let (wake_tx, wake_rx) = mpsc::channel();
        let (done_tx, done_rx) = mpsc::channel();
        let shared = Arc::clone(&self.shared);
        let worker_stop = Arc::clone(&stop);
        let handle = thread::Builder::new()
            .name("miner".to_string())
            .spawn(move || shared.run(&worker_stop, wake_rx, done_tx))
            .map_err(|e| {
                self.shared.running.store(false, Ordering::SeqCst);
                LedgerError::Mining(format!("Failed to spawn mining thread: {e}"))
            })?;

        *worker = Some(Worker {
            handle,
            stop,
            wake: wake_tx,
            done: done_rx,
        });
        info!(
            "Mining started at coordinate {} for {}",
            self.get_coordinate(),
            read(&self.shared.miner_address)
        );
        Ok(())
    }

    /// Stop the background worker, waiting up to the join timeout for it to exit
    pub fn stop(&self) {
        let mut worker = lock(&self.worker);
        self.shared.running.store(false, Ordering::SeqCst);

        let Some(Worker {
            handle,
            stop,
            wake,
            done,
        }) = worker.take()
        else {
            return;
        };
        stop.store(true, Ordering::SeqCst);
        // Dropping the sender wakes a sleeping worker immediately
        drop(wake);

        match done.recv_timeout(self.shared.settings.join_timeout()) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                if handle.join().is_err() {
                    error!("Mining thread panicked");
                }
                info!("Mining stopped");
            }
            Err(RecvTimeoutError::Timeout) => {
                warn!("Mining thread did not stop within the join timeout");
            }
        }
    }

    pub fn status(&self) -> MinerStatus {
        let stats = read(&self.shared.stats);
        MinerStatus {
            active: self.is_running(),
            miner_address: read(&self.shared.miner_address).clone(),
            coordinate: self.get_coordinate(),
            auto_adjust: self.shared.auto_adjust.load(Ordering::SeqCst),
            difficulty: self.get_difficulty(),
            blocks_mined: stats.get_blocks_mined(),
            total_reward: stats.get_total_reward(),
            hash_rate_per_hour: stats.hash_rate_per_hour(),
            retries: lock(&self.shared.backoff).retries(),
        }
    }

    pub fn stats(&self) -> MiningStats {
        read(&self.shared.stats).clone()
    }
}

impl Drop for Miner {
    fn drop(&mut self) {
        self.stop();
    }
}

impl Shared {
    fn run(&self, stop: &AtomicBool, wake: Receiver<()>, done: Sender<()>) {
        info!("Mining loop started");
        while !stop.load(Ordering::SeqCst) {
            let result = self.mine_once(stop);
            if matches!(result, Ok(IterationOutcome::Interrupted)) {
                break;
            }
            if let Some(wait) = self.settle(&result) {
                Self::pause(&wake, wait);
            }
        }
        info!("Mining loop exited");
        let _ = done.send(());
    }

    // Book-keeping after an attempt; returns how long to wait before the next
    fn settle(&self, result: &Result<IterationOutcome>) -> Option<Duration> {
        match result {
            Ok(IterationOutcome::Accepted(_)) => {
                lock(&self.backoff).reset();
                None
            }
            Ok(IterationOutcome::Interrupted) => None,
            Ok(IterationOutcome::Exhausted) | Ok(IterationOutcome::Rejected(_)) => {
                self.register_failure()
            }
            Err(e) => {
                error!("Mining error: {e}");
                Some(self.settings.error_pause())
            }
        }
    }

    // Returns immediately once the handle drops its sender
    fn pause(wake: &Receiver<()>, duration: Duration) {
        let _ = wake.recv_timeout(duration);
    }

    fn register_failure(&self) -> Option<Duration> {
        let action = lock(&self.backoff).on_failure();
        match action {
            BackoffAction::Wait(wait) => {
                info!("Retrying in {:.1}s", wait.as_secs_f64());
                Some(wait)
            }
            BackoffAction::Jump => {
                let mut coordinate = write(&self.coordinate);
                *coordinate = coordinate.shift(self.settings.retry_jump);
                warn!("Max retries reached, jumping to coordinate {}", *coordinate);
                None
            }
        }
    }

    fn build_candidate(&self) -> Result<Block> {
        let miner_address = read(&self.miner_address).clone();
        let coordinate = *read(&self.coordinate);
        let params = self.ledger.params();

        let last = self.ledger.last_block();
        // Leave one slot for the reward
        let mut transactions = self
            .ledger
            .take_pending(params.max_transactions_per_block.saturating_sub(1));
        let timestamp = current_timestamp()?;
        transactions.push(Transaction::new_reward(
            &miner_address,
            params.block_reward,
            timestamp,
        )?);

        Block::new(
            last.get_index() + 1,
            timestamp,
            transactions,
            &miner_address,
            coordinate,
            last.get_hash(),
        )
    }

    fn mine_once(&self, interrupt: &AtomicBool) -> Result<IterationOutcome> {
        let candidate = self.build_candidate()?;

        let outcome = {
            let mut engine = lock(&self.engine);
            engine.search_interruptible(candidate, self.settings.max_nonce, interrupt)?
        };

        match outcome {
            SearchOutcome::Solved(solved) => self.commit(solved),
            SearchOutcome::Exhausted { .. } => Ok(IterationOutcome::Exhausted),
            SearchOutcome::Interrupted { .. } => Ok(IterationOutcome::Interrupted),
        }
    }

    // Hand a solved block to the ledger, then prune the pool and drift
    fn commit(&self, solved: SolvedBlock) -> Result<IterationOutcome> {
        self.difficulty.store(solved.next_difficulty, Ordering::SeqCst);

        let block = solved.block;
        match self.ledger.append_block(block.clone()) {
            Ok(()) => {}
            Err(LedgerError::Consensus(reason)) => {
                warn!("Mined block {} was rejected: {reason}", block.get_index());
                return Ok(IterationOutcome::Rejected(reason));
            }
            Err(e) => return Err(e),
        }

        let confirmed = block.transaction_ids();
        let pruned = self.ledger.remove_pending(&confirmed);
        let reward: f64 = block.reward_transactions().map(Transaction::get_amount).sum();
        write(&self.stats).record_block(block.get_hash(), reward, solved.duration);
        info!(
            "Mined block {} ({} transactions, {pruned} pruned from pool)",
            block.get_index(),
            block.get_transactions().len()
        );

        if self.auto_adjust.load(Ordering::SeqCst) {
            self.drift(solved.duration);
        }
        Ok(IterationOutcome::Accepted(block))
    }

    // Slow blocks move the coordinate up, fast ones move it down
    fn drift(&self, duration: Duration) {
        let step = if duration > self.settings.slow_block() {
            self.settings.coordinate_step
        } else if duration < self.settings.fast_block() {
            -self.settings.coordinate_step
        } else {
            return;
        };
        let mut coordinate = write(&self.coordinate);
        let moved = coordinate.shift(step);
        if moved != *coordinate {
            info!("Adjusted mining coordinate from {} to {moved}", *coordinate);
            *coordinate = moved;
        }
    }
}
