//! Per-device capability confirmation state

use serde::{Deserialize, Serialize};

use crate::probe::result::{CapabilityProbeResult, PixelFormat};

/// Lowest allowed confirmation threshold
pub const MIN_CONFIRMATION_THRESHOLD: u32 = 2;

/// Confirmation policy
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapabilityPolicy {
    /// Consecutive successful probes required before data is confirmed
    pub confirmation_threshold: u32,

    /// Consecutive failures that drop confirmed data, never when `None`
    pub demotion_failure_threshold: Option<u32>,
}

impl Default for CapabilityPolicy {
    fn default() -> Self {
        Self {
            confirmation_threshold: 3,
            demotion_failure_threshold: None,
        }
    }
}

/// How much the effective capability can be trusted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValidationStatus {
    Confirmed,
    Provisional,
    #[serde(rename = "none")]
    Unknown,
}

impl ValidationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ValidationStatus::Confirmed => "confirmed",
            ValidationStatus::Provisional => "provisional",
            ValidationStatus::Unknown => "none",
        }
    }
}

impl std::fmt::Display for ValidationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Observation counts keyed by value, remembering first-seen order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FrequencyTable {
    entries: Vec<(String, u64)>,
}

impl FrequencyTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one more observation of `value`
    pub fn record(&mut self, value: &str) {
        match self.entries.iter_mut().find(|(v, _)| v == value) {
            Some((_, count)) => *count += 1,
            None => self.entries.push((value.to_string(), 1)),
        }
    }

    pub fn count(&self, value: &str) -> u64 {
        self.entries
            .iter()
            .find(|(v, _)| v == value)
            .map(|(_, count)| *count)
            .unwrap_or(0)
    }

    /// Highest-count value; ties go to the value seen first
    pub fn most_frequent(&self) -> Option<&str> {
        let mut best: Option<&(String, u64)> = None;
        for entry in &self.entries {
            if best.map_or(true, |(_, count)| entry.1 > *count) {
                best = Some(entry);
            }
        }
        best.map(|(value, _)| value.as_str())
    }

    /// Observed values in first-seen order
    pub fn values(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(value, _)| value.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Validation status before and after an update
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusTransition {
    pub previous: ValidationStatus,
    pub current: ValidationStatus,
}

impl StatusTransition {
    pub fn changed(&self) -> bool {
        self.previous != self.current
    }
}

/// Capability state for one device path
#[derive(Debug, Clone)]
pub struct DeviceCapabilityState {
    device_path: String,
    policy: CapabilityPolicy,
    provisional_data: Option<CapabilityProbeResult>,
    confirmed_data: Option<CapabilityProbeResult>,
    consecutive_successes: u32,
    consecutive_failures: u32,
    resolution_frequency: FrequencyTable,
    frame_rate_frequency: FrequencyTable,
    observed_formats: Vec<PixelFormat>,
    last_error: Option<String>,
}

impl DeviceCapabilityState {
    pub fn new(device_path: impl Into<String>, policy: CapabilityPolicy) -> Self {
        Self {
            device_path: device_path.into(),
            policy,
            provisional_data: None,
            confirmed_data: None,
            consecutive_successes: 0,
            consecutive_failures: 0,
            resolution_frequency: FrequencyTable::new(),
            frame_rate_frequency: FrequencyTable::new(),
            observed_formats: Vec::new(),
            last_error: None,
        }
    }

    /// Fold one probe result into the state
    pub fn update(&mut self, result: CapabilityProbeResult) -> StatusTransition {
        let previous = self.validation_status();

        if !result.detected {
            self.consecutive_successes = 0;
            self.consecutive_failures += 1;
            self.last_error = result.error.clone();

            if let Some(limit) = self.policy.demotion_failure_threshold {
                if self.consecutive_failures >= limit {
                    self.confirmed_data = None;
                }
            }

            return StatusTransition {
                previous,
                current: self.validation_status(),
            };
        }

        self.consecutive_failures = 0;
        self.consecutive_successes += 1;
        self.last_error = None;

        // Cumulative popularity counters, consistent or not
        for resolution in &result.resolutions {
            self.resolution_frequency.record(resolution);
        }
        for rate in &result.frame_rates {
            self.frame_rate_frequency.record(rate);
        }
        for format in &result.formats {
            if !self.observed_formats.iter().any(|f| f.code == format.code) {
                self.observed_formats.push(format.clone());
            }
        }

        self.provisional_data = Some(result);

        if self.consecutive_successes >= self.policy.confirmation_threshold {
            self.confirmed_data = self.synthesize_confirmed();
        }

        StatusTransition {
            previous,
            current: self.validation_status(),
        }
    }

    fn synthesize_confirmed(&self) -> Option<CapabilityProbeResult> {
        let provisional = self.provisional_data.as_ref()?;

        let mut confirmed = provisional.clone();
        confirmed.formats = self.observed_formats.clone();
        confirmed.resolutions = self
            .resolution_frequency
            .most_frequent()
            .map(|r| vec![r.to_string()])
            .unwrap_or_default();
        confirmed.frame_rates = self
            .frame_rate_frequency
            .most_frequent()
            .map(|f| vec![f.to_string()])
            .unwrap_or_default();
        confirmed.error = None;
        confirmed.timeout_context = None;
        Some(confirmed)
    }

    /// Confirmed data if present, else provisional data
    pub fn get_effective_capability(&self) -> Option<&CapabilityProbeResult> {
        self.confirmed_data.as_ref().or(self.provisional_data.as_ref())
    }

    pub fn validation_status(&self) -> ValidationStatus {
        if self.confirmed_data.is_some() {
            ValidationStatus::Confirmed
        } else if self.provisional_data.is_some() {
            ValidationStatus::Provisional
        } else {
            ValidationStatus::Unknown
        }
    }

    pub fn device_path(&self) -> &str {
        &self.device_path
    }

    pub fn provisional_data(&self) -> Option<&CapabilityProbeResult> {
        self.provisional_data.as_ref()
    }

    pub fn confirmed_data(&self) -> Option<&CapabilityProbeResult> {
        self.confirmed_data.as_ref()
    }

    pub fn consecutive_successes(&self) -> u32 {
        self.consecutive_successes
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    pub fn resolution_frequency(&self) -> &FrequencyTable {
        &self.resolution_frequency
    }

    pub fn frame_rate_frequency(&self) -> &FrequencyTable {
        &self.frame_rate_frequency
    }

    pub fn observed_formats(&self) -> &[PixelFormat] {
        &self.observed_formats
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }
}
