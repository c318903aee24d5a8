//! Background workers of the monitor

pub mod dispatcher;
pub mod listener;
pub mod poller;
