//! Read-only capability view handed to downstream consumers

use serde::{Deserialize, Serialize};

use crate::capability::state::{DeviceCapabilityState, ValidationStatus};

/// Point-in-time snapshot of a device's best-known capability
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapabilityMetadata {
    pub validation_status: ValidationStatus,

    /// Preferred resolution as `WxH`
    pub resolution: Option<String>,

    /// Preferred frame rate, rounded to whole frames
    pub fps: Option<u32>,

    /// FourCC codes of the effective pixel formats
    pub formats: Vec<String>,

    /// Every resolution observed since the device connected, first-seen order
    pub all_resolutions: Vec<String>,

    /// Every frame rate observed since the device connected, first-seen order
    pub all_frame_rates: Vec<String>,

    pub consecutive_successes: u32,
    pub consecutive_failures: u32,
}

impl CapabilityMetadata {
    pub fn from_state(state: &DeviceCapabilityState) -> Self {
        let effective = state.get_effective_capability();

        let resolution = effective.and_then(|data| data.resolutions.first().cloned());
        let fps = effective
            .and_then(|data| data.frame_rates.first())
            .and_then(|rate| rate.parse::<f64>().ok())
            .map(|rate| rate.round() as u32);
        let formats = effective
            .map(|data| data.formats.iter().map(|f| f.code.clone()).collect())
            .unwrap_or_default();

        Self {
            validation_status: state.validation_status(),
            resolution,
            fps,
            formats,
            all_resolutions: state.resolution_frequency().values().map(str::to_string).collect(),
            all_frame_rates: state.frame_rate_frequency().values().map(str::to_string).collect(),
            consecutive_successes: state.consecutive_successes(),
            consecutive_failures: state.consecutive_failures(),
        }
    }
}
