//! Capability state machine over all device paths

use std::collections::HashMap;

use tracing::{debug, info};

use crate::capability::metadata::CapabilityMetadata;
use crate::capability::state::{CapabilityPolicy, DeviceCapabilityState, StatusTransition};
use crate::probe::result::CapabilityProbeResult;

/// Owns one `DeviceCapabilityState` per device path
#[derive(Debug, Default)]
pub struct CapabilityTracker {
    policy: CapabilityPolicy,
    states: HashMap<String, DeviceCapabilityState>,
}

impl CapabilityTracker {
    pub fn new(policy: CapabilityPolicy) -> Self {
        Self {
            policy,
            states: HashMap::new(),
        }
    }

    /// Fold a probe result into the state for `device_path`, creating it on first use
    pub fn update(&mut self, device_path: &str, result: CapabilityProbeResult) -> StatusTransition {
        let policy = &self.policy;
        let state = self
            .states
            .entry(device_path.to_string())
            .or_insert_with(|| DeviceCapabilityState::new(device_path, policy.clone()));

        let transition = state.update(result);
        if transition.changed() {
            info!(
                "Capability of {} is now {} (was {}, successes={})",
                device_path,
                transition.current,
                transition.previous,
                state.consecutive_successes()
            );
        } else {
            debug!(
                "Capability of {} remains {} (successes={}, failures={})",
                device_path,
                transition.current,
                state.consecutive_successes(),
                state.consecutive_failures()
            );
        }
        transition
    }

    /// Drop all capability history for `device_path`
    pub fn remove(&mut self, device_path: &str) -> Option<DeviceCapabilityState> {
        self.states.remove(device_path)
    }

    pub fn get(&self, device_path: &str) -> Option<&DeviceCapabilityState> {
        self.states.get(device_path)
    }

    pub fn metadata(&self, device_path: &str) -> Option<CapabilityMetadata> {
        self.states.get(device_path).map(CapabilityMetadata::from_state)
    }

    pub fn contains(&self, device_path: &str) -> bool {
        self.states.contains_key(device_path)
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    pub fn policy(&self) -> &CapabilityPolicy {
        &self.policy
    }
}
