use crate::core::Coordinate;
use crate::error::{LedgerError, Result};
use log::{debug, info};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

// Difficulty adjustment constants
pub const TARGET_BLOCK_TIME: f64 = 60.0; // seconds
pub const INITIAL_DIFFICULTY: u32 = 4; // Starting difficulty
pub const MIN_DIFFICULTY: u32 = 1; // Minimum difficulty
pub const MAX_DIFFICULTY: u32 = 32; // Maximum difficulty (every hex digit zero)

// Coordinate score constants
const WEIGHT_A: f64 = 0.4;
const WEIGHT_B: f64 = 0.4;
const WEIGHT_C: f64 = 0.2;
const SCORE_SCALE: f64 = 1000.0;
pub const NOISE_RANGE: f64 = 0.1;
pub const MIN_SCORE: f64 = 0.1;
pub const MAX_SCORE: f64 = 2.0;

// Hysteresis band around a perfectly on-target block
const RAISE_THRESHOLD: f64 = 1.1;
const LOWER_THRESHOLD: f64 = 0.9;

/// Source of the uniform noise added to coordinate scores
pub trait NoiseSource: Send {
    /// A sample in `[-NOISE_RANGE, NOISE_RANGE]`
    fn sample(&mut self) -> f64;
}

/// Uniform noise from a seedable generator
pub struct RandomNoise {
    rng: StdRng,
}

impl RandomNoise {
    pub fn new() -> RandomNoise {
        RandomNoise {
            rng: StdRng::from_entropy(),
        }
    }

    pub fn seeded(seed: u64) -> RandomNoise {
        RandomNoise {
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl Default for RandomNoise {
    fn default() -> Self {
        Self::new()
    }
}

impl NoiseSource for RandomNoise {
    fn sample(&mut self) -> f64 {
        self.rng.gen_range(-NOISE_RANGE..=NOISE_RANGE)
    }
}

/// Always returns the same sample, clamped to the noise range
pub struct FixedNoise(pub f64);

impl NoiseSource for FixedNoise {
    fn sample(&mut self) -> f64 {
        self.0.clamp(-NOISE_RANGE, NOISE_RANGE)
    }
}

/// Difficulty controller driven by block time and coordinate score
pub struct DifficultyAdjustment {
    difficulty: u32,
    floor: u32,
    target_block_time: f64,
    noise: Box<dyn NoiseSource>,
}

impl DifficultyAdjustment {
    pub fn new(difficulty: u32) -> Result<DifficultyAdjustment> {
        Self::with_noise(difficulty, Box::new(RandomNoise::new()))
    }

    pub fn with_noise(
        difficulty: u32,
        noise: Box<dyn NoiseSource>,
    ) -> Result<DifficultyAdjustment> {
        Self::validate_difficulty(difficulty)?;
        Ok(DifficultyAdjustment {
            difficulty,
            floor: MIN_DIFFICULTY,
            target_block_time: TARGET_BLOCK_TIME,
            noise,
        })
    }

    /// Lowest difficulty retargeting may reach (never below `MIN_DIFFICULTY`)
    pub fn set_floor(&mut self, floor: u32) -> Result<()> {
        Self::validate_difficulty(floor)?;
        self.floor = floor;
        self.difficulty = self.difficulty.max(floor);
        Ok(())
    }

    pub fn set_target_block_time(&mut self, seconds: f64) -> Result<()> {
        if !seconds.is_finite() || seconds <= 0.0 {
            return Err(LedgerError::Validation(format!(
                "Target block time must be positive, got {seconds}"
            )));
        }
        self.target_block_time = seconds;
        Ok(())
    }

    /// Weighted coordinate score plus noise, clamped to `[MIN_SCORE, MAX_SCORE]`
    pub fn score(&mut self, coordinate: &Coordinate) -> f64 {
        let base = (f64::from(coordinate.a()) * WEIGHT_A
            + f64::from(coordinate.b()) * WEIGHT_B
            + f64::from(coordinate.c()) * WEIGHT_C)
            / SCORE_SCALE;
        let noise = self.noise.sample();
        let score = (base + noise).clamp(MIN_SCORE, MAX_SCORE);
        debug!("Coordinate score {score:.3} (base: {base:.3}, noise: {noise:.3})");
        score
    }

    /// Step difficulty by one when `target / duration * score` leaves the band
    pub fn retarget(&mut self, duration_secs: f64, score: f64) -> u32 {
        let time_ratio = self.target_block_time / duration_secs.max(1.0);
        let delta = time_ratio * score;
        let old_difficulty = self.difficulty;

        if delta > RAISE_THRESHOLD {
            self.difficulty = (self.difficulty + 1).min(MAX_DIFFICULTY);
        } else if delta < LOWER_THRESHOLD {
            self.difficulty = self.difficulty.saturating_sub(1).max(self.floor.max(MIN_DIFFICULTY));
        }

        if self.difficulty != old_difficulty {
            info!(
                "Difficulty adjusted from {old_difficulty} to {} (time ratio: {time_ratio:.2}, \
                 score: {score:.2})",
                self.difficulty
            );
        }
        self.difficulty
    }

    pub fn get_difficulty(&self) -> u32 {
        self.difficulty
    }

    pub fn get_floor(&self) -> u32 {
        self.floor
    }

    pub fn get_target_block_time(&self) -> f64 {
        self.target_block_time
    }

    /// Validate that a difficulty value is within acceptable bounds
    pub fn validate_difficulty(difficulty: u32) -> Result<()> {
        if !(MIN_DIFFICULTY..=MAX_DIFFICULTY).contains(&difficulty) {
            return Err(LedgerError::Validation(format!(
                "Difficulty {difficulty} is outside valid range \
                 [{MIN_DIFFICULTY}, {MAX_DIFFICULTY}]"
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn controller(difficulty: u32, noise: f64) -> DifficultyAdjustment {
        DifficultyAdjustment::with_noise(difficulty, Box::new(FixedNoise(noise))).unwrap()
    }

    #[test]
    fn test_validate_difficulty() {
        assert!(DifficultyAdjustment::validate_difficulty(0).is_err());
        assert!(DifficultyAdjustment::validate_difficulty(1).is_ok());
        assert!(DifficultyAdjustment::validate_difficulty(32).is_ok());
        assert!(DifficultyAdjustment::validate_difficulty(33).is_err());
        assert!(DifficultyAdjustment::new(0).is_err());
    }

    #[test]
    fn test_score_without_noise() {
        let mut ctl = controller(4, 0.0);
        let coord = Coordinate::new(500, 500, 500).unwrap();
        // (200 + 200 + 100) / 1000
        assert!((ctl.score(&coord) - 0.5).abs() < 1e-9);
        // Origin clamps up to the minimum score
        assert_eq!(ctl.score(&Coordinate::ORIGIN), MIN_SCORE);
    }

    #[test]
    fn test_score_noise_extremes_stay_in_bounds() {
        let high = Coordinate::new(500, 500, 500).unwrap();
        let mut plus = controller(4, 5.0);
        assert!((plus.score(&high) - 0.6).abs() < 1e-9);

        let mut minus = controller(4, -5.0);
        assert_eq!(minus.score(&Coordinate::ORIGIN), MIN_SCORE);

        let mut random =
            DifficultyAdjustment::with_noise(4, Box::new(RandomNoise::seeded(42))).unwrap();
        for _ in 0..1000 {
            let score = random.score(&high);
            assert!((MIN_SCORE..=MAX_SCORE).contains(&score));
            assert!((0.4 - 1e-12..=0.6 + 1e-12).contains(&score));
        }
    }

    #[test]
    fn test_fast_block_high_score_does_not_decrease() {
        let mut ctl = controller(4, 0.0);
        // 60 / 30 * 1.5 = 3.0 > 1.1
        assert_eq!(ctl.retarget(30.0, 1.5), 5);
    }

    #[test]
    fn test_slow_block_low_score_does_not_increase() {
        let mut ctl = controller(4, 0.0);
        // 60 / 120 * 0.5 = 0.25 < 0.9
        assert_eq!(ctl.retarget(120.0, 0.5), 3);
    }

    #[test]
    fn test_inside_band_unchanged() {
        let mut ctl = controller(4, 0.0);
        // 60 / 60 * 1.0 = 1.0
        assert_eq!(ctl.retarget(60.0, 1.0), 4);
        // Sub-second durations count as one second
        let mut fast = controller(4, 0.0);
        assert_eq!(fast.retarget(0.001, 0.1), 5);
    }

    #[test]
    fn test_bounds_and_floor() {
        let mut top = controller(MAX_DIFFICULTY, 0.0);
        assert_eq!(top.retarget(1.0, 2.0), MAX_DIFFICULTY);

        let mut bottom = controller(MIN_DIFFICULTY, 0.0);
        assert_eq!(bottom.retarget(600.0, 0.1), MIN_DIFFICULTY);

        let mut floored = controller(3, 0.0);
        floored.set_floor(3).unwrap();
        assert_eq!(floored.retarget(600.0, 0.1), 3);

        let mut raised = controller(2, 0.0);
        raised.set_floor(4).unwrap();
        assert_eq!(raised.get_difficulty(), 4);
    }

    #[test]
    fn test_custom_target_block_time() {
        let mut ctl = controller(4, 0.0);
        ctl.set_target_block_time(10.0).unwrap();
        // 10 / 20 * 1.0 = 0.5
        assert_eq!(ctl.retarget(20.0, 1.0), 3);
        assert!(ctl.set_target_block_time(0.0).is_err());
    }
}
