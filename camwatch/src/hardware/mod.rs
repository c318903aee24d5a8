//! Hardware device access

pub mod camera;
