//! Monitor statistics

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

/// Point-in-time view of the monitor's counters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonitorStats {
    pub running: bool,
    pub event_source_available: bool,
    pub event_source_name: String,

    /// Hot-plug records received
    pub events_processed: u64,
    /// Hot-plug records dropped by filtering
    pub events_filtered: u64,
    /// Camera events queued for consumers
    pub events_emitted: u64,

    pub polling_cycles: u64,
    pub polling_cycles_skipped: u64,
    /// Current streak of enumeration failures
    pub polling_failure_count: u32,
    pub total_polling_failures: u64,
    pub adaptive_adjustments: u64,
    pub current_poll_interval_ms: u64,

    /// Milliseconds since the last hot-plug record, `None` if none arrived yet
    pub last_event_age_ms: Option<u64>,

    pub probes_attempted: u64,
    pub probes_succeeded: u64,
    pub probe_timeouts: u64,

    pub callback_failures: u64,
    pub known_devices: usize,
    pub last_enumeration_error: Option<String>,
}

/// Counters updated from the workers without taking the registry lock
#[derive(Debug, Default)]
pub struct StatsCounters {
    pub events_processed: AtomicU64,
    pub events_filtered: AtomicU64,
    pub polling_cycles: AtomicU64,
    pub polling_cycles_skipped: AtomicU64,
    pub probes_attempted: AtomicU64,
    pub probes_succeeded: AtomicU64,
    pub probe_timeouts: AtomicU64,
}

impl StatsCounters {
    pub fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn read(counter: &AtomicU64) -> u64 {
        counter.load(Ordering::Relaxed)
    }
}
