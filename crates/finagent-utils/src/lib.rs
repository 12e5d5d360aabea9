//! Shared utilities for finagent
//!
//! Logging setup and environment-driven configuration used by the server and
//! CLI binaries.

pub mod config;
pub mod logging;

pub use config::{AppConfig, ConfigError, optional_env, required_env};
pub use logging::{LogFormat, init_tracing};
