//! Settings file management

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::app::options::{AppOptions, MonitorOptions};
use crate::errors::MonitorError;
use crate::filesys::file::File;
use crate::logs::{LogLevel, LogOptions};

/// Default location of the settings file
pub const DEFAULT_SETTINGS_PATH: &str = "/etc/camwatch/settings.json";

/// Monitor settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// Log level
    #[serde(default)]
    pub log_level: LogLevel,

    /// Emit JSON log lines on stdout
    #[serde(default)]
    pub log_json: bool,

    /// Directory for daily-rolling log files
    #[serde(default)]
    pub log_dir: Option<PathBuf>,

    /// Device indices to watch
    #[serde(default = "default_device_range")]
    pub device_range: Vec<u32>,

    /// Directory holding the device nodes
    #[serde(default = "default_device_dir")]
    pub device_dir: PathBuf,

    /// Capability probing tool
    #[serde(default = "default_probe_tool")]
    pub probe_tool: String,

    /// Probe timeout in milliseconds
    #[serde(default = "default_probe_timeout_ms")]
    pub probe_timeout_ms: u64,

    #[serde(default = "default_confirmation_threshold")]
    pub confirmation_threshold: u32,

    #[serde(default)]
    pub demotion_failure_threshold: Option<u32>,

    /// Polling interval in seconds
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,

    #[serde(default = "default_min_poll_interval")]
    pub min_poll_interval_secs: u64,

    #[serde(default = "default_max_poll_interval")]
    pub max_poll_interval_secs: u64,

    #[serde(default = "default_max_backoff")]
    pub max_backoff_secs: u64,

    #[serde(default = "default_event_freshness_threshold")]
    pub event_freshness_threshold_secs: u64,

    #[serde(default)]
    pub initial_poll_delay_secs: u64,

    #[serde(default = "default_true")]
    pub reprobe_known_devices: bool,

    /// Listen for OS hot-plug events
    #[serde(default = "default_true")]
    pub enable_event_source: bool,

    #[serde(default = "default_max_shutdown_delay")]
    pub max_shutdown_delay_secs: u64,
}

fn default_true() -> bool {
    true
}

fn default_device_range() -> Vec<u32> {
    (0..=9).collect()
}

fn default_device_dir() -> PathBuf {
    PathBuf::from("/dev")
}

fn default_probe_tool() -> String {
    "v4l2-ctl".to_string()
}

fn default_probe_timeout_ms() -> u64 {
    2000
}

fn default_confirmation_threshold() -> u32 {
    3
}

fn default_poll_interval() -> u64 {
    5
}

fn default_min_poll_interval() -> u64 {
    1
}

fn default_max_poll_interval() -> u64 {
    30
}

fn default_max_backoff() -> u64 {
    60
}

fn default_event_freshness_threshold() -> u64 {
    15
}

fn default_max_shutdown_delay() -> u64 {
    5
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            log_level: LogLevel::Info,
            log_json: false,
            log_dir: None,
            device_range: default_device_range(),
            device_dir: default_device_dir(),
            probe_tool: default_probe_tool(),
            probe_timeout_ms: default_probe_timeout_ms(),
            confirmation_threshold: default_confirmation_threshold(),
            demotion_failure_threshold: None,
            poll_interval_secs: default_poll_interval(),
            min_poll_interval_secs: default_min_poll_interval(),
            max_poll_interval_secs: default_max_poll_interval(),
            max_backoff_secs: default_max_backoff(),
            event_freshness_threshold_secs: default_event_freshness_threshold(),
            initial_poll_delay_secs: 0,
            reprobe_known_devices: true,
            enable_event_source: true,
            max_shutdown_delay_secs: default_max_shutdown_delay(),
        }
    }
}

impl Settings {
    /// Read settings from `file`, falling back to defaults when it does not exist.
    ///
    /// Malformed JSON and wrongly typed values are configuration errors.
    pub async fn load(file: &File) -> Result<Self, MonitorError> {
        if !file.exists().await {
            info!("No settings file at {}, using defaults", file.path().display());
            return Ok(Self::default());
        }

        file.read_json::<Settings>().await.map_err(|e| match e {
            MonitorError::JsonError(e) => {
                MonitorError::config(file.path().display().to_string(), e.to_string())
            }
            other => other,
        })
    }

    /// Parse settings from a JSON string
    pub fn from_json(json: &str) -> Result<Self, MonitorError> {
        serde_json::from_str(json).map_err(|e| MonitorError::config("settings", e.to_string()))
    }

    /// Convert to validated runtime options
    pub fn to_options(&self) -> Result<AppOptions, MonitorError> {
        let monitor = MonitorOptions {
            device_range: self.device_range.clone(),
            device_dir: self.device_dir.clone(),
            probe_tool: self.probe_tool.clone(),
            probe_timeout: Duration::from_millis(self.probe_timeout_ms),
            confirmation_threshold: self.confirmation_threshold,
            demotion_failure_threshold: self.demotion_failure_threshold,
            poll_interval: Duration::from_secs(self.poll_interval_secs),
            min_poll_interval: Duration::from_secs(self.min_poll_interval_secs),
            max_poll_interval: Duration::from_secs(self.max_poll_interval_secs),
            max_backoff: Duration::from_secs(self.max_backoff_secs),
            event_freshness_threshold: Duration::from_secs(self.event_freshness_threshold_secs),
            initial_poll_delay: Duration::from_secs(self.initial_poll_delay_secs),
            reprobe_known_devices: self.reprobe_known_devices,
            enable_event_source: self.enable_event_source,
            max_shutdown_delay: Duration::from_secs(self.max_shutdown_delay_secs),
        };
        monitor.validate()?;

        let logging = LogOptions {
            log_level: self.log_level.clone(),
            log_dir: self.log_dir.clone(),
            json_format: self.log_json,
            ..Default::default()
        };

        Ok(AppOptions { monitor, logging })
    }
}
