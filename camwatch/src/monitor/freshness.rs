//! Hot-plug event freshness

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use crate::utils::unix_millis;

/// Timestamp of the most recent hot-plug record.
///
/// The listener writes it and the poller only reads it; zero means no record
/// has ever arrived.
#[derive(Debug, Default)]
pub struct EventFreshness {
    last_event_millis: AtomicU64,
}

impl EventFreshness {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn touch(&self) {
        self.last_event_millis.store(unix_millis().max(1), Ordering::SeqCst);
    }

    pub fn last_event_millis(&self) -> Option<u64> {
        match self.last_event_millis.load(Ordering::SeqCst) {
            0 => None,
            millis => Some(millis),
        }
    }

    /// Time since the last hot-plug record, `None` if there never was one
    pub fn age(&self) -> Option<Duration> {
        self.last_event_millis()
            .map(|last| Duration::from_millis(unix_millis().saturating_sub(last)))
    }

    /// Whether a record arrived within `threshold`
    pub fn is_fresh(&self, threshold: Duration) -> bool {
        matches!(self.age(), Some(age) if age < threshold)
    }
}
