//! camwatch library
//!
//! Hybrid V4L2 camera monitor. Hot-plug events and a polling fallback feed
//! one device registry, and repeated `v4l2-ctl` probes are folded into a
//! per-device capability record that is only confirmed after enough
//! consecutive successes.

pub mod app;
pub mod capability;
pub mod diagnostic;
pub mod errors;
pub mod events;
pub mod filesys;
pub mod hardware;
pub mod logs;
pub mod monitor;
pub mod probe;
pub mod storage;
pub mod utils;
pub mod workers;

pub use monitor::engine::{HybridCameraMonitor, PollCycle};
