//! Application configuration options

use std::path::PathBuf;
use std::time::Duration;

use crate::capability::state::{CapabilityPolicy, MIN_CONFIRMATION_THRESHOLD};
use crate::errors::MonitorError;
use crate::logs::LogOptions;

/// Largest number of device indices the monitor will watch
pub const MAX_DEVICE_RANGE: usize = 64;

/// Main application options
#[derive(Debug, Clone, Default)]
pub struct AppOptions {
    /// Monitor configuration
    pub monitor: MonitorOptions,

    /// Logging configuration
    pub logging: LogOptions,
}

/// Options of the hybrid camera monitor
#[derive(Debug, Clone)]
pub struct MonitorOptions {
    /// Device indices to watch (`N` of `/dev/videoN`)
    pub device_range: Vec<u32>,

    /// Directory holding the device nodes
    pub device_dir: PathBuf,

    /// Capability probing tool
    pub probe_tool: String,

    /// Upper bound for a single probe
    pub probe_timeout: Duration,

    /// Consecutive successful probes before capability is confirmed
    pub confirmation_threshold: u32,

    /// Consecutive failures that drop confirmed capability, never when `None`
    pub demotion_failure_threshold: Option<u32>,

    /// Starting polling interval
    pub poll_interval: Duration,

    /// Floor of the adaptive polling interval
    pub min_poll_interval: Duration,

    /// Ceiling of the adaptive polling interval
    pub max_poll_interval: Duration,

    /// Ceiling of the enumeration failure backoff
    pub max_backoff: Duration,

    /// Hot-plug records younger than this let the poller skip a cycle
    pub event_freshness_threshold: Duration,

    /// Delay before the first polling cycle
    pub initial_poll_delay: Duration,

    /// Re-probe known devices on every executed polling cycle
    pub reprobe_known_devices: bool,

    /// Listen for OS hot-plug events when the build supports it
    pub enable_event_source: bool,

    /// Grace period for workers to stop
    pub max_shutdown_delay: Duration,
}

impl Default for MonitorOptions {
    fn default() -> Self {
        Self {
            device_range: (0..=9).collect(),
            device_dir: PathBuf::from("/dev"),
            probe_tool: "v4l2-ctl".to_string(),
            probe_timeout: Duration::from_secs(2),
            confirmation_threshold: 3,
            demotion_failure_threshold: None,
            poll_interval: Duration::from_secs(5),
            min_poll_interval: Duration::from_secs(1),
            max_poll_interval: Duration::from_secs(30),
            max_backoff: Duration::from_secs(60),
            event_freshness_threshold: Duration::from_secs(15),
            initial_poll_delay: Duration::ZERO,
            reprobe_known_devices: true,
            enable_event_source: true,
            max_shutdown_delay: Duration::from_secs(5),
        }
    }
}

impl MonitorOptions {
    /// Check the options, naming the first offending field
    pub fn validate(&self) -> Result<(), MonitorError> {
        if self.device_range.is_empty() {
            return Err(MonitorError::config("device_range", "must not be empty"));
        }
        if self.device_range.len() > MAX_DEVICE_RANGE {
            return Err(MonitorError::config(
                "device_range",
                format!("must not list more than {} devices", MAX_DEVICE_RANGE),
            ));
        }
        if self.probe_tool.trim().is_empty() {
            return Err(MonitorError::config("probe_tool", "must not be empty"));
        }

        let positive = [
            ("probe_timeout", self.probe_timeout),
            ("poll_interval", self.poll_interval),
            ("min_poll_interval", self.min_poll_interval),
            ("max_poll_interval", self.max_poll_interval),
            ("max_backoff", self.max_backoff),
            ("event_freshness_threshold", self.event_freshness_threshold),
            ("max_shutdown_delay", self.max_shutdown_delay),
        ];
        for (field, value) in positive {
            if value.is_zero() {
                return Err(MonitorError::config(field, "must be positive"));
            }
        }

        if self.min_poll_interval > self.max_poll_interval {
            return Err(MonitorError::config(
                "min_poll_interval",
                "must not exceed max_poll_interval",
            ));
        }
        if self.poll_interval < self.min_poll_interval || self.poll_interval > self.max_poll_interval {
            return Err(MonitorError::config(
                "poll_interval",
                "must lie between min_poll_interval and max_poll_interval",
            ));
        }
        if self.confirmation_threshold < MIN_CONFIRMATION_THRESHOLD {
            return Err(MonitorError::config(
                "confirmation_threshold",
                format!("must be at least {}", MIN_CONFIRMATION_THRESHOLD),
            ));
        }
        if self.demotion_failure_threshold == Some(0) {
            return Err(MonitorError::config(
                "demotion_failure_threshold",
                "must be positive when set",
            ));
        }

        Ok(())
    }

    pub fn capability_policy(&self) -> CapabilityPolicy {
        CapabilityPolicy {
            confirmation_threshold: self.confirmation_threshold,
            demotion_failure_threshold: self.demotion_failure_threshold,
        }
    }

    pub fn in_range(&self, index: u32) -> bool {
        self.device_range.contains(&index)
    }
}
