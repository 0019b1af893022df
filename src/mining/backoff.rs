use crate::config::MiningSettings;
use std::time::Duration;

/// What the mining loop should do after a failed attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackoffAction {
    /// Sleep before trying again
    Wait(Duration),
    /// Retries are used up: move the coordinate and try again at once
    Jump,
}

/// Exponential retry schedule with a cap and a retry budget
#[derive(Debug, Clone)]
pub struct Backoff {
    initial: Duration,
    max: Duration,
    max_retries: u32,
    retries: u32,
    current: Duration,
}

impl Backoff {
    pub fn new(initial: Duration, max: Duration, max_retries: u32) -> Backoff {
        Backoff {
            initial,
            max,
            max_retries,
            retries: 0,
            current: initial,
        }
    }

    pub fn from_settings(settings: &MiningSettings) -> Backoff {
        Self::new(
            settings.initial_backoff(),
            settings.max_backoff(),
            settings.max_retries,
        )
    }

    /// Record a failure and decide how to react to it
    pub fn on_failure(&mut self) -> BackoffAction {
        self.retries += 1;
        if self.retries > self.max_retries {
            self.reset();
            return BackoffAction::Jump;
        }
        let wait = self.current;
        self.current = (self.current * 2).min(self.max);
        BackoffAction::Wait(wait)
    }

    pub fn reset(&mut self) {
        self.retries = 0;
        self.current = self.initial;
    }

    pub fn retries(&self) -> u32 {
        self.retries
    }

    pub fn current(&self) -> Duration {
        self.current
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secs(n: u64) -> BackoffAction {
        BackoffAction::Wait(Duration::from_secs(n))
    }

    #[test]
    fn test_default_schedule() {
        let mut backoff = Backoff::from_settings(&MiningSettings::default());
        let actions: Vec<_> = (0..7).map(|_| backoff.on_failure()).collect();
        assert_eq!(
            actions,
            vec![secs(1), secs(2), secs(4), secs(8), secs(16), BackoffAction::Jump, secs(1)]
        );
    }

    #[test]
    fn test_cap() {
        let mut backoff = Backoff::new(Duration::from_secs(1), Duration::from_secs(30), 10);
        let waits: Vec<_> = (0..8).map(|_| backoff.on_failure()).collect();
        assert_eq!(waits[5], secs(30));
        assert_eq!(waits[7], secs(30));
        assert_eq!(backoff.current(), Duration::from_secs(30));
    }

    #[test]
    fn test_reset() {
        let mut backoff = Backoff::new(Duration::from_secs(1), Duration::from_secs(30), 5);
        backoff.on_failure();
        backoff.on_failure();
        assert_eq!(backoff.retries(), 2);
        backoff.reset();
        assert_eq!(backoff.retries(), 0);
        assert_eq!(backoff.on_failure(), secs(1));
    }

    #[test]
    fn test_zero_retry_budget_jumps_immediately() {
        let mut backoff = Backoff::new(Duration::from_secs(1), Duration::from_secs(30), 0);
        assert_eq!(backoff.on_failure(), BackoffAction::Jump);
    }
}
