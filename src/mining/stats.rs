use std::time::{Duration, Instant};

const SECONDS_PER_HOUR: f64 = 3600.0;

/// Counters kept by the mining coordinator for the blocks it produced
#[derive(Debug, Clone)]
pub struct MiningStats {
    blocks_mined: u64,
    total_reward: f64,
    started: Instant,
    last_block_duration: Option<Duration>,
    last_block_hash: Option<String>,
}

impl Default for MiningStats {
    fn default() -> Self {
        Self::new()
    }
}

impl MiningStats {
    pub fn new() -> MiningStats {
        MiningStats {
            blocks_mined: 0,
            total_reward: 0.0,
            started: Instant::now(),
            last_block_duration: None,
            last_block_hash: None,
        }
    }

    pub fn record_block(&mut self, hash: &str, reward: f64, duration: Duration) {
        self.blocks_mined += 1;
        self.total_reward += reward;
        self.last_block_duration = Some(duration);
        self.last_block_hash = Some(hash.to_string());
    }

    pub fn get_blocks_mined(&self) -> u64 {
        self.blocks_mined
    }

    pub fn get_total_reward(&self) -> f64 {
        self.total_reward
    }

    pub fn get_last_block_duration(&self) -> Option<Duration> {
        self.last_block_duration
    }

    pub fn get_last_block_hash(&self) -> Option<&str> {
        self.last_block_hash.as_deref()
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Blocks mined per hour since the stats were created
    pub fn hash_rate_per_hour(&self) -> f64 {
        Self::rate_per_hour(self.blocks_mined, self.elapsed())
    }

    fn rate_per_hour(blocks: u64, elapsed: Duration) -> f64 {
        let secs = elapsed.as_secs_f64();
        if secs <= 0.0 {
            return 0.0;
        }
        blocks as f64 / secs * SECONDS_PER_HOUR
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_block() {
        let mut stats = MiningStats::new();
        assert_eq!(stats.hash_rate_per_hour(), 0.0);
        stats.record_block("abc", 50.0, Duration::from_millis(200));
        stats.record_block("def", 50.0, Duration::from_millis(300));
        assert_eq!(stats.get_blocks_mined(), 2);
        assert_eq!(stats.get_total_reward(), 100.0);
        assert_eq!(stats.get_last_block_hash(), Some("def"));
        assert_eq!(stats.get_last_block_duration(), Some(Duration::from_millis(300)));
        assert!(stats.hash_rate_per_hour() > 0.0);
    }

    #[test]
    fn test_rate_per_hour() {
        assert_eq!(MiningStats::rate_per_hour(3, Duration::from_secs(1800)), 6.0);
        assert_eq!(MiningStats::rate_per_hour(3, Duration::ZERO), 0.0);
    }
}
