//! Probe result value types

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// A pixel format reported by a device
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PixelFormat {
    /// FourCC code, e.g. `YUYV`
    pub code: String,

    /// Human readable description, e.g. `YUYV 4:2:2`
    pub description: String,
}

impl PixelFormat {
    pub fn new(code: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            description: description.into(),
        }
    }
}

/// Outcome of a single capability probe
///
/// Every field is always present; a probe that found nothing carries empty
/// collections rather than missing values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapabilityProbeResult {
    /// Device node that was probed
    pub device_path: String,

    /// The probe produced structured capability data
    pub detected: bool,

    /// The device node could be opened and queried
    pub accessible: bool,

    /// Card name reported by the driver
    pub device_name: String,

    /// Kernel driver name
    pub driver: String,

    /// Pixel formats, in first-seen order
    pub formats: Vec<PixelFormat>,

    /// Discrete resolutions as `WxH`, in first-seen order
    pub resolutions: Vec<String>,

    /// Distinct frame rates
    pub frame_rates: Vec<String>,

    /// Failure description when the probe did not succeed
    pub error: Option<String>,

    /// Diagnostic detail recorded when the probe timed out
    pub timeout_context: Option<String>,

    /// Wall-clock time spent probing
    #[serde(with = "duration_millis")]
    pub duration: Duration,
}

impl CapabilityProbeResult {
    /// A result with nothing detected and no error
    pub fn empty(device_path: impl Into<String>) -> Self {
        Self {
            device_path: device_path.into(),
            detected: false,
            accessible: false,
            device_name: String::new(),
            driver: String::new(),
            formats: Vec::new(),
            resolutions: Vec::new(),
            frame_rates: Vec::new(),
            error: None,
            timeout_context: None,
            duration: Duration::ZERO,
        }
    }

    /// A failed probe carrying an error description
    pub fn failure(device_path: impl Into<String>, accessible: bool, error: impl Into<String>) -> Self {
        Self {
            accessible,
            error: Some(error.into()),
            ..Self::empty(device_path)
        }
    }

    /// A successful probe reporting the given capabilities
    pub fn success(
        device_path: impl Into<String>,
        formats: Vec<PixelFormat>,
        resolutions: Vec<String>,
        frame_rates: Vec<String>,
    ) -> Self {
        let detected = !formats.is_empty() || !resolutions.is_empty() || !frame_rates.is_empty();
        Self {
            detected,
            accessible: true,
            formats,
            resolutions,
            frame_rates,
            ..Self::empty(device_path)
        }
    }

    /// Attach the driver-reported identity
    pub fn with_identity(mut self, device_name: impl Into<String>, driver: impl Into<String>) -> Self {
        self.device_name = device_name.into();
        self.driver = driver.into();
        self
    }

    pub fn is_timeout(&self) -> bool {
        self.timeout_context.is_some()
    }
}

mod duration_millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(deserializer)?))
    }
}
