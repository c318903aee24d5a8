//! Integration tests for camwatch

mod test_capability;
mod test_monitor;
mod test_settings;
