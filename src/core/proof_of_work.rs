use crate::core::{target_prefix, Block, Coordinate, DifficultyAdjustment, NoiseSource};
use crate::error::{LedgerError, Result};
use log::{info, warn};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

pub const DEFAULT_MAX_NONCE: u64 = 1_000_000;

// How many attempts pass between checks of the interrupt flag
const INTERRUPT_POLL_INTERVAL: u64 = 1024;

/// A block whose nonce satisfied the target
#[derive(Debug, Clone)]
pub struct SolvedBlock {
    pub block: Block,
    pub hash: String,
    pub nonce: u64,
    pub duration: Duration,
    pub score: f64,
    /// Engine difficulty after retargeting
    pub next_difficulty: u32,
}

#[derive(Debug, Clone)]
pub enum SearchOutcome {
    Solved(SolvedBlock),
    /// Every nonce below the ceiling was tried
    Exhausted { attempts: u64, duration: Duration },
    /// The interrupt flag was raised mid-search
    Interrupted { attempts: u64, duration: Duration },
}

impl SearchOutcome {
    pub fn is_solved(&self) -> bool {
        matches!(self, SearchOutcome::Solved(_))
    }

    pub fn duration(&self) -> Duration {
        match self {
            SearchOutcome::Solved(solved) => solved.duration,
            SearchOutcome::Exhausted { duration, .. }
            | SearchOutcome::Interrupted { duration, .. } => *duration,
        }
    }
}

/// Proof-of-work search engine. Brute-forces nonces against a leading-zero
/// target, then retargets using the block time and the coordinate score.
pub struct ProofOfWork {
    adjustment: DifficultyAdjustment,
}

impl ProofOfWork {
    pub fn new(difficulty: u32) -> Result<ProofOfWork> {
        let adjustment = DifficultyAdjustment::new(difficulty)?;
        info!("Initialized proof of work with difficulty {difficulty}");
        Ok(ProofOfWork { adjustment })
    }

    pub fn with_noise(difficulty: u32, noise: Box<dyn NoiseSource>) -> Result<ProofOfWork> {
        Ok(ProofOfWork {
            adjustment: DifficultyAdjustment::with_noise(difficulty, noise)?,
        })
    }

    pub fn get_difficulty(&self) -> u32 {
        self.adjustment.get_difficulty()
    }

    pub fn target(&self) -> String {
        target_prefix(self.get_difficulty())
    }

    pub fn adjustment(&self) -> &DifficultyAdjustment {
        &self.adjustment
    }

    pub fn adjustment_mut(&mut self) -> &mut DifficultyAdjustment {
        &mut self.adjustment
    }

    pub fn score(&mut self, coordinate: &Coordinate) -> f64 {
        self.adjustment.score(coordinate)
    }

    pub fn retarget(&mut self, duration_secs: f64, score: f64) -> u32 {
        self.adjustment.retarget(duration_secs, score)
    }

    /// Validate that a mined block carries a correct hash meeting `difficulty`
    pub fn validate(block: &Block, difficulty: u32) -> bool {
        block.meets_difficulty(difficulty) && block.has_valid_hash()
    }

    /// Try nonces `0..max_nonce` until the block hash starts with the target
    pub fn search(&mut self, block: Block, max_nonce: u64) -> Result<SearchOutcome> {
        let never = AtomicBool::new(false);
        self.search_interruptible(block, max_nonce, &never)
    }

    /// Like [`ProofOfWork::search`], giving up early once `interrupt` is set
    pub fn search_interruptible(
        &mut self,
        mut block: Block,
        max_nonce: u64,
        interrupt: &AtomicBool,
    ) -> Result<SearchOutcome> {
        if max_nonce == 0 {
            return Err(LedgerError::Validation(
                "max_nonce must be positive".to_string(),
            ));
        }

        let start = Instant::now();
        let score = self.score(&block.get_coordinate());
        let target = self.target();
        let mut preimage = block.hash_preimage()?;

        info!(
            "Starting to mine block {} with difficulty {}",
            block.get_index(),
            self.get_difficulty()
        );

        for nonce in 0..max_nonce {
            if nonce % INTERRUPT_POLL_INTERVAL == 0 && interrupt.load(Ordering::SeqCst) {
                return Ok(SearchOutcome::Interrupted {
                    attempts: nonce,
                    duration: start.elapsed(),
                });
            }

            let hash = Block::hash_preimage_with_nonce(&mut preimage, nonce)?;
            if hash.starts_with(&target) {
                let duration = start.elapsed();
                block.set_proof(nonce, hash.clone());
                let next_difficulty = self.retarget(duration.as_secs_f64(), score);

                info!(
                    "Block {} mined! Hash: {}... Nonce: {nonce} Time: {:.2}s \
                     Difficulty: {next_difficulty}",
                    block.get_index(),
                    &hash[..10],
                    duration.as_secs_f64()
                );

                return Ok(SearchOutcome::Solved(SolvedBlock {
                    block,
                    hash,
                    nonce,
                    duration,
                    score,
                    next_difficulty,
                }));
            }
        }

        let duration = start.elapsed();
        warn!(
            "Failed to mine block {} after {max_nonce} attempts in {:.2}s",
            block.get_index(),
            duration.as_secs_f64()
        );
        Ok(SearchOutcome::Exhausted {
            attempts: max_nonce,
            duration,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{zero_hash, FixedNoise, Transaction, BLOCK_REWARD};

    fn create_test_block() -> Block {
        let reward = Transaction::new_reward("minerX", BLOCK_REWARD, 1_700_000_000.0).unwrap();
        Block::new(
            1,
            1_700_000_000.0,
            vec![reward],
            "minerX",
            Coordinate::new(100, 100, 100).unwrap(),
            &zero_hash(),
        )
        .unwrap()
    }

    fn engine(difficulty: u32) -> ProofOfWork {
        ProofOfWork::with_noise(difficulty, Box::new(FixedNoise(0.0))).unwrap()
    }

    #[test]
    fn test_search_finds_valid_nonce() {
        let mut pow = engine(1);
        let outcome = pow.search(create_test_block(), DEFAULT_MAX_NONCE).unwrap();
        let SearchOutcome::Solved(solved) = outcome else {
            panic!("difficulty 1 should be solvable");
        };

        assert!(solved.hash.starts_with('0'));
        assert_eq!(solved.block.get_hash(), solved.hash);
        assert_eq!(solved.block.get_nonce(), solved.nonce);
        assert_eq!(solved.block.calculate_hash().unwrap(), solved.hash);
        assert!(ProofOfWork::validate(&solved.block, 1));
    }

    #[test]
    fn test_search_is_deterministic() {
        let first = engine(1).search(create_test_block(), DEFAULT_MAX_NONCE).unwrap();
        let second = engine(1).search(create_test_block(), DEFAULT_MAX_NONCE).unwrap();
        match (first, second) {
            (SearchOutcome::Solved(a), SearchOutcome::Solved(b)) => {
                assert_eq!(a.nonce, b.nonce);
                assert_eq!(a.hash, b.hash);
            }
            _ => panic!("both searches should succeed"),
        }
    }

    #[test]
    fn test_search_exhausts_nonce_space() {
        let mut pow = engine(32);
        let outcome = pow.search(create_test_block(), 50).unwrap();
        assert!(matches!(
            outcome,
            SearchOutcome::Exhausted { attempts: 50, .. }
        ));
        // No retarget on failure
        assert_eq!(pow.get_difficulty(), 32);
    }

    #[test]
    fn test_search_rejects_zero_ceiling() {
        let mut pow = engine(1);
        assert!(matches!(
            pow.search(create_test_block(), 0),
            Err(LedgerError::Validation(_))
        ));
    }

    #[test]
    fn test_search_interrupted() {
        let mut pow = engine(32);
        let interrupt = AtomicBool::new(true);
        let outcome = pow
            .search_interruptible(create_test_block(), DEFAULT_MAX_NONCE, &interrupt)
            .unwrap();
        assert!(matches!(
            outcome,
            SearchOutcome::Interrupted { attempts: 0, .. }
        ));
    }

    #[test]
    fn test_fast_solve_retargets_upward() {
        // Score for (100,100,100) is 0.1; a sub-second block gives 60 * 0.1 = 6.0
        let mut pow = engine(1);
        let outcome = pow.search(create_test_block(), DEFAULT_MAX_NONCE).unwrap();
        assert!(outcome.is_solved());
        assert_eq!(pow.get_difficulty(), 2);
        assert_eq!(pow.target(), "00");
    }

    #[test]
    fn test_validate_rejects_tampered_block() {
        let mut pow = engine(1);
        let outcome = pow.search(create_test_block(), DEFAULT_MAX_NONCE).unwrap();
        let SearchOutcome::Solved(solved) = outcome else {
            panic!("difficulty 1 should be solvable");
        };
        let mut tampered = solved.block.clone();
        tampered.transactions_mut().clear();
        assert!(!ProofOfWork::validate(&tampered, 1));
    }
}
