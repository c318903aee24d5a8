//! Discovery engine

pub mod engine;
pub mod freshness;
pub mod interval;
pub mod registry;
pub mod shutdown;
pub mod stats;

pub use engine::{HybridCameraMonitor, MonitorCore, PollCycle};
pub use stats::MonitorStats;
