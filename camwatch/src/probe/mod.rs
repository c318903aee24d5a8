//! Device capability probing

pub mod parser;
pub mod prober;
pub mod result;
