//! Configuration management utilities

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised while reading configuration
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// A required environment variable is unset or blank
    #[error("{0} environment variable not set")]
    MissingEnv(String),

    /// A value is present but unusable
    #[error("Invalid value for {key}: {reason}")]
    Invalid { key: String, reason: String },
}

/// Read a required environment variable
///
/// Blank values count as missing.
pub fn required_env(name: &str) -> Result<String, ConfigError> {
    optional_env(name).ok_or_else(|| ConfigError::MissingEnv(name.to_string()))
}

/// Read an optional environment variable, treating blank values as unset
pub fn optional_env(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Process-level settings shared by the binaries
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Application name
    pub app_name: String,
    /// Environment (development, production, ...)
    pub environment: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            app_name: "finagent".to_string(),
            environment: "development".to_string(),
        }
    }
}

impl AppConfig {
    /// Build from `FINAGENT_ENV`, defaulting to development
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(env) = optional_env("FINAGENT_ENV") {
            config.environment = env;
        }
        config
    }

    /// Whether this is a production deployment
    pub fn is_production(&self) -> bool {
        self.environment.eq_ignore_ascii_case("production")
    }
}
