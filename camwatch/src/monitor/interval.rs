//! Adaptive polling interval

use std::time::Duration;

use crate::utils::{calc_exp_backoff, CooldownOptions};

/// Interval shrink factor when hot-plug events are stale
pub const STALE_FACTOR: f64 = 0.8;

/// Interval growth factor when hot-plug events are fresh
pub const FRESH_FACTOR: f64 = 1.2;

/// Polling interval that adapts to hot-plug freshness and enumeration health
#[derive(Debug, Clone)]
pub struct AdaptivePollInterval {
    current: Duration,
    min: Duration,
    max: Duration,
    max_backoff: Duration,
    failure_count: u32,
    total_failures: u64,
    adjustments: u64,
    last_error: Option<String>,
}

impl AdaptivePollInterval {
    pub fn new(initial: Duration, min: Duration, max: Duration, max_backoff: Duration) -> Self {
        Self {
            current: initial.clamp(min, max),
            min,
            max,
            max_backoff,
            failure_count: 0,
            total_failures: 0,
            adjustments: 0,
            last_error: None,
        }
    }

    /// Poll more often because hot-plug events are not arriving
    pub fn on_stale(&mut self) -> bool {
        self.rescale(STALE_FACTOR)
    }

    /// Poll less often because hot-plug events are covering discovery
    pub fn on_fresh(&mut self) -> bool {
        self.rescale(FRESH_FACTOR)
    }

    fn rescale(&mut self, factor: f64) -> bool {
        let next = self.current.mul_f64(factor).clamp(self.min, self.max);
        if next == self.current {
            return false;
        }
        self.current = next;
        self.adjustments += 1;
        true
    }

    /// Record an enumeration failure; returns the delay before the next attempt
    pub fn record_failure(&mut self, error: impl Into<String>) -> Duration {
        self.failure_count = self.failure_count.saturating_add(1);
        self.total_failures += 1;
        self.last_error = Some(error.into());
        self.backoff_delay()
    }

    /// Record a successful enumeration; returns the failure streak it ended, if any
    pub fn record_success(&mut self) -> Option<u32> {
        if self.failure_count == 0 {
            return None;
        }
        let streak = self.failure_count;
        self.failure_count = 0;
        Some(streak)
    }

    fn backoff_delay(&self) -> Duration {
        let cooldown = CooldownOptions {
            base_delay: self.current,
            max_delay: self.max_backoff.max(self.current),
            multiplier: 2.0,
        };
        calc_exp_backoff(&cooldown, self.failure_count)
    }

    /// Delay before the next cycle
    pub fn next_delay(&self) -> Duration {
        if self.failure_count > 0 {
            self.backoff_delay()
        } else {
            self.current
        }
    }

    pub fn current(&self) -> Duration {
        self.current
    }

    pub fn failure_count(&self) -> u32 {
        self.failure_count
    }

    pub fn total_failures(&self) -> u64 {
        self.total_failures
    }

    pub fn adjustments(&self) -> u64 {
        self.adjustments
    }

    /// Most recent enumeration error, kept after recovery for diagnostics
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }
}
