//! Capability confirmation

pub mod metadata;
pub mod state;
pub mod tracker;
