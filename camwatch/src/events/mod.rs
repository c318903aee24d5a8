//! Hot-plug input and camera event output

pub mod dispatcher;
pub mod source;
pub mod types;
