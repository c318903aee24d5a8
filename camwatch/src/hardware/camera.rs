//! Camera device model and device-node discovery

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::fs;

use crate::errors::MonitorError;
use crate::probe::result::CapabilityProbeResult;

/// Node name prefix of V4L2 capture devices
pub const VIDEO_NODE_PREFIX: &str = "video";

/// Connection status of a device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeviceStatus {
    Connected,
    Disconnected,
}

/// A video device known to the monitor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Device {
    /// Device node path, e.g. `/dev/video0`
    pub path: String,

    /// The `N` in `videoN`
    pub index: u32,

    /// Human readable name
    pub name: String,

    /// Kernel driver, empty when unknown
    pub driver: String,

    pub status: DeviceStatus,

    /// Last time the device was observed
    pub last_seen: DateTime<Utc>,
}

impl Device {
    /// Create a connected device, taking identity from a probe when it has one
    pub fn connected(path: &str, index: u32, probe: &CapabilityProbeResult) -> Self {
        let name = if probe.device_name.is_empty() {
            format!("Video Device {}", index)
        } else {
            probe.device_name.clone()
        };

        Self {
            path: path.to_string(),
            index,
            name,
            driver: probe.driver.clone(),
            status: DeviceStatus::Connected,
            last_seen: Utc::now(),
        }
    }

    /// Copy of this device marked as disconnected
    pub fn disconnected(&self) -> Self {
        Self {
            status: DeviceStatus::Disconnected,
            last_seen: Utc::now(),
            ..self.clone()
        }
    }

    /// Refresh identity from a probe; returns true when name or driver changed
    pub fn refresh_identity(&mut self, probe: &CapabilityProbeResult) -> bool {
        self.last_seen = Utc::now();
        let mut changed = false;
        if !probe.device_name.is_empty() && probe.device_name != self.name {
            self.name = probe.device_name.clone();
            changed = true;
        }
        if !probe.driver.is_empty() && probe.driver != self.driver {
            self.driver = probe.driver.clone();
            changed = true;
        }
        changed
    }
}

/// Parse the device index from a node path such as `/dev/video3`
pub fn parse_device_index(path: &str) -> Option<u32> {
    let file_name = Path::new(path).file_name()?.to_str()?;
    let digits = file_name.strip_prefix(VIDEO_NODE_PREFIX)?;
    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

/// Path of the node for `index` inside `device_dir`
pub fn device_path(device_dir: &Path, index: u32) -> String {
    device_dir
        .join(format!("{}{}", VIDEO_NODE_PREFIX, index))
        .to_string_lossy()
        .into_owned()
}

/// List `videoN` nodes in `device_dir` whose index is in `range`, sorted by index
pub async fn enumerate_device_nodes(
    device_dir: &Path,
    range: &[u32],
) -> Result<Vec<(u32, String)>, MonitorError> {
    let mut entries = fs::read_dir(device_dir).await.map_err(|e| {
        MonitorError::EnumerationError(format!("cannot list {}: {}", device_dir.display(), e))
    })?;

    let mut nodes = Vec::new();
    loop {
        let entry = match entries.next_entry().await {
            Ok(Some(entry)) => entry,
            Ok(None) => break,
            Err(e) => {
                return Err(MonitorError::EnumerationError(format!(
                    "error reading {}: {}",
                    device_dir.display(),
                    e
                )))
            }
        };

        let path: PathBuf = entry.path();
        let path = path.to_string_lossy().into_owned();
        if let Some(index) = parse_device_index(&path) {
            if range.contains(&index) {
                nodes.push((index, path));
            }
        }
    }

    nodes.sort_by_key(|(index, _)| *index);
    Ok(nodes)
}

/// Whether the device node exists
pub async fn node_exists(path: &str) -> bool {
    fs::metadata(path).await.is_ok()
}

/// Whether the device node can be opened for reading
pub async fn is_accessible(path: &str) -> bool {
    fs::File::open(path).await.is_ok()
}
