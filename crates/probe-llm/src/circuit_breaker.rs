//! Circuit breaker guarding the language-model endpoint
//!
//! After `threshold` consecutive failures the breaker opens and calls are
//! refused until `cooldown` has passed; the next call then probes recovery.

use parking_lot::Mutex;
use probe_core::{ProbeError, Result};
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::{Duration, Instant};

/// Circuit breaker states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    Open,
    /// Cooldown elapsed; one probe call is allowed
    HalfOpen,
}

pub struct CircuitBreaker {
    consecutive_failures: AtomicU32,
    opened_at: Mutex<Option<Instant>>,
    threshold: u32,
    cooldown: Duration,
}

impl CircuitBreaker {
    pub fn new(threshold: u32, cooldown: Duration) -> Self {
        Self {
            consecutive_failures: AtomicU32::new(0),
            opened_at: Mutex::new(None),
            threshold: threshold.max(1),
            cooldown,
        }
    }

    pub fn state(&self) -> CircuitState {
        match *self.opened_at.lock() {
            None => CircuitState::Closed,
            Some(at) if at.elapsed() >= self.cooldown => CircuitState::HalfOpen,
            Some(_) => CircuitState::Open,
        }
    }

    /// Refuse with [`ProbeError::ApiLimit`] while open
    pub fn check(&self) -> Result<()> {
        match self.state() {
            CircuitState::Open => Err(ProbeError::ApiLimit(format!(
                "language model circuit open after {} failures; retry in {}s",
                self.failure_count(),
                self.time_until_retry().as_secs()
            ))),
            _ => Ok(()),
        }
    }

    pub fn record_success(&self) {
        self.consecutive_failures.store(0, Ordering::Relaxed);
        *self.opened_at.lock() = None;
    }

    pub fn record_failure(&self) {
        let failures = self.consecutive_failures.fetch_add(1, Ordering::Relaxed) + 1;
        if failures >= self.threshold {
            let mut opened = self.opened_at.lock();
            // A failed half-open probe restarts the cooldown
            *opened = Some(Instant::now());
            tracing::warn!(failures, "Language model circuit opened");
        }
    }

    pub fn failure_count(&self) -> u32 {
        self.consecutive_failures.load(Ordering::Relaxed)
    }

    /// Zero unless open
    pub fn time_until_retry(&self) -> Duration {
        match *self.opened_at.lock() {
            Some(at) => self.cooldown.saturating_sub(at.elapsed()),
            None => Duration::ZERO,
        }
    }
}

impl Default for CircuitBreaker {
    /// Five failures, one minute
    fn default() -> Self {
        Self::new(5, Duration::from_secs(60))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread::sleep;

    #[test]
    fn test_opens_after_threshold() {
        let cb = CircuitBreaker::default();
        for _ in 0..4 {
            cb.record_failure();
            assert_eq!(cb.state(), CircuitState::Closed);
        }
        cb.record_failure();
        assert_eq!(cb.state(), CircuitState::Open);
        assert!(matches!(cb.check(), Err(ProbeError::ApiLimit(_))));
    }

    #[test]
    fn test_success_closes() {
        let cb = CircuitBreaker::new(2, Duration::from_secs(60));
        cb.record_failure();
        cb.record_failure();
        assert_eq!(cb.state(), CircuitState::Open);
        cb.record_success();
        assert_eq!(cb.state(), CircuitState::Closed);
        assert_eq!(cb.failure_count(), 0);
        assert_eq!(cb.time_until_retry(), Duration::ZERO);
    }

    #[test]
    fn test_half_open_after_cooldown() {
        let cb = CircuitBreaker::new(1, Duration::from_millis(50));
        cb.record_failure();
        assert_eq!(cb.state(), CircuitState::Open);
        assert!(cb.time_until_retry() <= Duration::from_millis(50));
        sleep(Duration::from_millis(80));
        assert_eq!(cb.state(), CircuitState::HalfOpen);
        assert!(cb.check().is_ok());

        // failed probe reopens
        cb.record_failure();
        assert_eq!(cb.state(), CircuitState::Open);
    }
}
