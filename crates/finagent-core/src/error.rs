//! Error types for finagent-core

use thiserror::Error;

/// Result type alias for finagent-core
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for agent operations
#[derive(Error, Debug)]
pub enum Error {
    /// Agent initialization failed
    #[error("Agent initialization failed: {0}")]
    InitializationFailed(String),

    /// Agent processing failed
    #[error("Agent processing failed: {0}")]
    ProcessingFailed(String),

    /// The input could not be interpreted
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}
