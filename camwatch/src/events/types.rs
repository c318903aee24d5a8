//! Event records

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::hardware::camera::Device;
use crate::utils::generate_uuid;

/// Subsystem name of V4L2 devices in hot-plug records
pub const VIDEO_SUBSYSTEM: &str = "video4linux";

/// Kind of camera lifecycle event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CameraEventKind {
    Connected,
    Disconnected,
    StatusChanged,
}

/// Camera lifecycle event delivered to consumers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CameraEvent {
    /// Unique event id, for correlating consumer logs
    pub id: String,
    pub kind: CameraEventKind,
    pub device_path: String,
    pub device: Device,
    pub timestamp: DateTime<Utc>,
}

impl CameraEvent {
    pub fn new(kind: CameraEventKind, device: Device) -> Self {
        Self {
            id: generate_uuid(),
            kind,
            device_path: device.path.clone(),
            device,
            timestamp: Utc::now(),
        }
    }
}

/// Action carried by an OS hot-plug record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceAction {
    Add,
    Remove,
    Change,
}

impl std::str::FromStr for DeviceAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "add" => Ok(DeviceAction::Add),
            "remove" => Ok(DeviceAction::Remove),
            "change" => Ok(DeviceAction::Change),
            _ => Err(format!("Unsupported device action: {}", s)),
        }
    }
}

/// Hot-plug record from the OS event facility
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceEvent {
    pub device_node: String,
    pub action: DeviceAction,
    pub subsystem: String,
}

impl DeviceEvent {
    pub fn new(device_node: impl Into<String>, action: DeviceAction) -> Self {
        Self {
            device_node: device_node.into(),
            action,
            subsystem: VIDEO_SUBSYSTEM.to_string(),
        }
    }

    pub fn add(device_node: impl Into<String>) -> Self {
        Self::new(device_node, DeviceAction::Add)
    }

    pub fn remove(device_node: impl Into<String>) -> Self {
        Self::new(device_node, DeviceAction::Remove)
    }

    pub fn change(device_node: impl Into<String>) -> Self {
        Self::new(device_node, DeviceAction::Change)
    }

    pub fn is_video(&self) -> bool {
        self.subsystem == VIDEO_SUBSYSTEM
    }
}
