//! Device registry: known devices and their capability state, mutated as a pair

use std::collections::HashMap;

use tracing::{debug, info};

use crate::capability::metadata::CapabilityMetadata;
use crate::capability::state::CapabilityPolicy;
use crate::capability::tracker::CapabilityTracker;
use crate::events::types::{CameraEvent, CameraEventKind};
use crate::hardware::camera::Device;
use crate::probe::result::CapabilityProbeResult;

/// Everything the engine guards with its single lock.
///
/// A path is in `known_devices` iff it is considered connected. Removing a
/// device drops its capability state in the same call.
#[derive(Debug)]
pub struct Registry {
    known_devices: HashMap<String, Device>,
    capabilities: CapabilityTracker,
    pending_adds: HashMap<String, u64>,
    next_epoch: u64,
}

impl Registry {
    pub fn new(policy: CapabilityPolicy) -> Self {
        Self {
            known_devices: HashMap::new(),
            capabilities: CapabilityTracker::new(policy),
            pending_adds: HashMap::new(),
            next_epoch: 0,
        }
    }

    /// Mark an add as in flight and return its epoch
    pub fn begin_add(&mut self, path: &str) -> u64 {
        self.next_epoch += 1;
        self.pending_adds.insert(path.to_string(), self.next_epoch);
        self.next_epoch
    }

    pub fn is_pending(&self, path: &str, epoch: u64) -> bool {
        self.pending_adds.get(path) == Some(&epoch)
    }

    /// Finish an add started with `begin_add`.
    ///
    /// Discarded when a remove or a newer add for the same path happened
    /// while the probe was running.
    pub fn complete_add(
        &mut self,
        path: &str,
        index: u32,
        epoch: u64,
        probe: CapabilityProbeResult,
    ) -> Option<CameraEvent> {
        if !self.is_pending(path, epoch) {
            debug!("Discarding stale add for {} (epoch {})", path, epoch);
            return None;
        }
        self.pending_adds.remove(path);
        self.register(path, index, probe)
    }

    /// Register a device found by enumeration, or refresh it if already known
    pub fn register(
        &mut self,
        path: &str,
        index: u32,
        probe: CapabilityProbeResult,
    ) -> Option<CameraEvent> {
        if self.known_devices.contains_key(path) {
            return self.apply_probe(path, probe);
        }

        let device = Device::connected(path, index, &probe);
        self.capabilities.update(path, probe);
        info!("Camera connected: {} ({})", path, device.name);
        self.known_devices.insert(path.to_string(), device.clone());
        Some(CameraEvent::new(CameraEventKind::Connected, device))
    }

    /// Fold a re-probe of a known device into its state.
    ///
    /// Unknown paths are ignored so a probe racing a removal cannot resurrect
    /// capability state. Emits STATUS_CHANGED when the identity changed.
    pub fn apply_probe(&mut self, path: &str, probe: CapabilityProbeResult) -> Option<CameraEvent> {
        let device = self.known_devices.get_mut(path)?;
        let identity_changed = device.refresh_identity(&probe);
        let snapshot = device.clone();
        self.capabilities.update(path, probe);

        if identity_changed {
            info!(
                "Camera identity changed: {} is now {} ({})",
                path, snapshot.name, snapshot.driver
            );
            return Some(CameraEvent::new(CameraEventKind::StatusChanged, snapshot));
        }
        None
    }

    /// Refresh a known device after a hot-plug `change` record
    pub fn mark_changed(&mut self, path: &str) -> Option<CameraEvent> {
        let device = self.known_devices.get_mut(path)?;
        device.last_seen = chrono::Utc::now();
        Some(CameraEvent::new(CameraEventKind::StatusChanged, device.clone()))
    }

    /// Remove a device and its capability state; a second call is a no-op
    pub fn remove(&mut self, path: &str) -> Option<CameraEvent> {
        self.pending_adds.remove(path);
        self.capabilities.remove(path);
        let device = self.known_devices.remove(path)?;
        info!("Camera disconnected: {}", path);
        Some(CameraEvent::new(CameraEventKind::Disconnected, device.disconnected()))
    }

    pub fn contains(&self, path: &str) -> bool {
        self.known_devices.contains_key(path)
    }

    pub fn known_paths(&self) -> Vec<String> {
        self.known_devices.keys().cloned().collect()
    }

    pub fn devices(&self) -> HashMap<String, Device> {
        self.known_devices.clone()
    }

    pub fn metadata(&self, path: &str) -> Option<CapabilityMetadata> {
        self.capabilities.metadata(path)
    }

    pub fn capabilities(&self) -> &CapabilityTracker {
        &self.capabilities
    }

    pub fn len(&self) -> usize {
        self.known_devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.known_devices.is_empty()
    }
}
