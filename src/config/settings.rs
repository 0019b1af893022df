use crate::core::{
    ConsensusParams, DifficultyAdjustment, DEFAULT_MAX_NONCE, INITIAL_DIFFICULTY,
    TARGET_BLOCK_TIME,
};
use crate::error::{LedgerError, Result};
use log::{info, warn};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Process-wide configuration, loaded once from the environment
pub static GLOBAL_CONFIG: Lazy<Config> = Lazy::new(|| {
    Config::from_env().unwrap_or_else(|e| {
        warn!("Falling back to default configuration: {e}");
        Config::default()
    })
});

const CONFIG_PATH_KEY: &str = "LEDGER_CONFIG";
const DIFFICULTY_KEY: &str = "LEDGER_DIFFICULTY";
const MAX_NONCE_KEY: &str = "MINING_MAX_NONCE";
const TARGET_BLOCK_TIME_KEY: &str = "MINING_TARGET_BLOCK_TIME";

// Coordinator defaults
const MAX_RETRIES: u32 = 5;
const INITIAL_BACKOFF_SECS: f64 = 1.0;
const MAX_BACKOFF_SECS: f64 = 30.0;
const COORDINATE_STEP: i64 = 50;
const RETRY_JUMP: i64 = 100;
const SLOW_BLOCK_SECS: f64 = 120.0;
const FAST_BLOCK_SECS: f64 = 10.0;
const ERROR_PAUSE_SECS: f64 = 5.0;
const JOIN_TIMEOUT_SECS: f64 = 5.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Minimum leading zeros every non-genesis block hash must carry
    pub difficulty: u32,
    pub consensus: ConsensusParams,
    pub mining: MiningSettings,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            difficulty: INITIAL_DIFFICULTY,
            consensus: ConsensusParams::default(),
            mining: MiningSettings::default(),
        }
    }
}

/// Tuning for the mining coordinator. Durations are in seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MiningSettings {
    pub max_nonce: u64,
    pub target_block_time: f64,
    pub auto_adjust: bool,
    pub max_retries: u32,
    pub initial_backoff: f64,
    pub max_backoff: f64,
    /// Per-axis coordinate nudge after unusually slow or fast blocks
    pub coordinate_step: i64,
    /// Per-axis coordinate jump once retries run out
    pub retry_jump: i64,
    pub slow_block: f64,
    pub fast_block: f64,
    pub error_pause: f64,
    pub join_timeout: f64,
}

impl Default for MiningSettings {
    fn default() -> Self {
        MiningSettings {
            max_nonce: DEFAULT_MAX_NONCE,
            target_block_time: TARGET_BLOCK_TIME,
            auto_adjust: true,
            max_retries: MAX_RETRIES,
            initial_backoff: INITIAL_BACKOFF_SECS,
            max_backoff: MAX_BACKOFF_SECS,
            coordinate_step: COORDINATE_STEP,
            retry_jump: RETRY_JUMP,
            slow_block: SLOW_BLOCK_SECS,
            fast_block: FAST_BLOCK_SECS,
            error_pause: ERROR_PAUSE_SECS,
            join_timeout: JOIN_TIMEOUT_SECS,
        }
    }
}

fn seconds(value: f64) -> Duration {
    Duration::try_from_secs_f64(value).unwrap_or(Duration::ZERO)
}

impl MiningSettings {
    pub fn initial_backoff(&self) -> Duration {
        seconds(self.initial_backoff)
    }

    pub fn max_backoff(&self) -> Duration {
        seconds(self.max_backoff)
    }

    pub fn slow_block(&self) -> Duration {
        seconds(self.slow_block)
    }

    pub fn fast_block(&self) -> Duration {
        seconds(self.fast_block)
    }

    pub fn error_pause(&self) -> Duration {
        seconds(self.error_pause)
    }

    pub fn join_timeout(&self) -> Duration {
        seconds(self.join_timeout)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_nonce == 0 {
            return Err(LedgerError::Config("max_nonce must be positive".to_string()));
        }
        let positive = [
            ("target_block_time", self.target_block_time),
            ("initial_backoff", self.initial_backoff),
            ("max_backoff", self.max_backoff),
        ];
        for (name, value) in positive {
            if !value.is_finite() || value <= 0.0 {
                return Err(LedgerError::Config(format!(
                    "{name} must be a positive number of seconds, got {value}"
                )));
            }
        }
        let non_negative = [
            ("slow_block", self.slow_block),
            ("fast_block", self.fast_block),
            ("error_pause", self.error_pause),
            ("join_timeout", self.join_timeout),
        ];
        for (name, value) in non_negative {
            if !value.is_finite() || value < 0.0 {
                return Err(LedgerError::Config(format!(
                    "{name} must not be negative, got {value}"
                )));
            }
        }
        if self.initial_backoff > self.max_backoff {
            return Err(LedgerError::Config(
                "initial_backoff must not exceed max_backoff".to_string(),
            ));
        }
        if self.fast_block > self.slow_block {
            return Err(LedgerError::Config(
                "fast_block must not exceed slow_block".to_string(),
            ));
        }
        Ok(())
    }
}

impl Config {
    /// Load a TOML file. Missing fields take their defaults.
    pub fn from_file(path: &Path) -> Result<Config> {
        let contents = fs::read_to_string(path).map_err(|e| {
            LedgerError::Config(format!("Failed to read config from {}: {e}", path.display()))
        })?;
        let config: Config = toml::from_str(&contents)?;
        config.validate()?;
        info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Defaults, then the file named by `LEDGER_CONFIG`, then single-value overrides
    pub fn from_env() -> Result<Config> {
        let mut config = match env::var(CONFIG_PATH_KEY) {
            Ok(path) => Self::from_file(Path::new(&path))?,
            Err(_) => Config::default(),
        };

        if let Ok(value) = env::var(DIFFICULTY_KEY) {
            config.difficulty = parse_var(DIFFICULTY_KEY, &value)?;
        }
        if let Ok(value) = env::var(MAX_NONCE_KEY) {
            config.mining.max_nonce = parse_var(MAX_NONCE_KEY, &value)?;
        }
        if let Ok(value) = env::var(TARGET_BLOCK_TIME_KEY) {
            config.mining.target_block_time = parse_var(TARGET_BLOCK_TIME_KEY, &value)?;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let contents = toml::to_string_pretty(self)
            .map_err(|e| LedgerError::Serialization(e.to_string()))?;
        fs::write(path, contents)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        DifficultyAdjustment::validate_difficulty(self.difficulty)
            .map_err(|e| LedgerError::Config(e.to_string()))?;
        self.consensus.validate()?;
        self.mining.validate()
    }
}

fn parse_var<T: std::str::FromStr>(key: &str, value: &str) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e| LedgerError::Config(format!("Invalid value for {key} '{value}': {e}")))
}
