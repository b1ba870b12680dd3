//! Configuration module
//!
//! Environment variable parsing and run-time settings.

pub mod env;

pub use env::{constants, ConfigError, EnvConfig, FailurePolicy, HostKeyPolicy};
