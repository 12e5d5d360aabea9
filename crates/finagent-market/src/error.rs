//! Error types for market-data, document and voice operations

use crate::retrieval::RetrievalError;
use thiserror::Error;

/// Errors surfaced by the finagent-market wrappers
///
/// Quote-provider failures stay distinguishable: transport problems,
/// payloads missing an expected key, explicit provider error messages and
/// rate-limit notices each have their own variant.
#[derive(Debug, Error)]
pub enum MarketError {
    /// Network or HTTP error
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// The provider answered with a non-success HTTP status
    #[error("HTTP {status} from {provider}")]
    HttpStatus { provider: String, status: u16 },

    /// An expected key was absent from the response
    #[error("Missing key in response: {0}")]
    MissingField(String),

    /// The provider returned an explicit error payload
    #[error("Alpha Vantage API Error: {0}")]
    Provider(String),

    /// The provider throttled the request
    #[error("Rate limit exceeded for {provider}")]
    RateLimited { provider: String },

    /// Unsupported interval code
    #[error("Interval '{0}' not supported. Use '1d', '1wk', or '1mo'.")]
    InvalidInterval(String),

    /// JSON parsing error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Document could not be parsed
    #[error("Document error: {0}")]
    Document(String),

    /// Prompt template failed to render
    #[error("Template error: {0}")]
    Template(#[from] minijinja::Error),

    /// Retrieval store error
    #[error(transparent)]
    Retrieval(#[from] RetrievalError),

    /// Language-model or embedding error
    #[error("LLM error: {0}")]
    Llm(#[from] finagent_llm::LLMError),

    /// Speech recognition or synthesis error
    #[error("Speech error: {0}")]
    Speech(String),

    /// Audio device or encoding error
    #[error("Audio error: {0}")]
    Audio(String),

    /// Filesystem error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for market operations
pub type Result<T> = std::result::Result<T, MarketError>;

impl MarketError {
    /// Whether the caller supplied a bad argument, as opposed to an upstream failure
    pub fn is_client_error(&self) -> bool {
        matches!(self, MarketError::InvalidInterval(_))
    }
}

impl From<finagent_utils::ConfigError> for MarketError {
    fn from(err: finagent_utils::ConfigError) -> Self {
        MarketError::Config(err.to_string())
    }
}

impl From<hound::Error> for MarketError {
    fn from(err: hound::Error) -> Self {
        MarketError::Audio(err.to_string())
    }
}

impl From<MarketError> for finagent_core::Error {
    fn from(err: MarketError) -> Self {
        finagent_core::Error::ProcessingFailed(err.to_string())
    }
}
