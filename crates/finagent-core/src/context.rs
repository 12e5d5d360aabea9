//! Per-query context for agents
//!
//! A small key-value store carried alongside a query. The orchestrator reads
//! the language and any symbol override from it, and records how the query
//! arrived along with the transcript of spoken input.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Well-known context keys
pub mod keys {
    /// Language preference (e.g., "en", "zh")
    pub const LANGUAGE: &str = "language";
    /// Session ID for tracking
    pub const SESSION_ID: &str = "session_id";
    /// How the query was captured, see [`super::InputMode`]
    pub const INPUT_MODE: &str = "input_mode";
    /// Symbols overriding the configured watchlist
    pub const SYMBOLS: &str = "symbols";
    /// Transcript of the spoken query, when the input was audio
    pub const TRANSCRIPT: &str = "transcript";
}

/// How a query reached the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InputMode {
    /// Typed text
    Text,
    /// Recorded or uploaded audio
    Voice,
}

/// Context passed to agents during execution
///
/// # Example
///
/// ```
/// use finagent_core::Context;
///
/// let ctx = Context::new()
///     .with_language("en")
///     .with_symbols(["AAPL", "TSM"]);
///
/// assert_eq!(ctx.language(), Some("en"));
/// assert_eq!(ctx.symbols(), vec!["AAPL".to_string(), "TSM".to_string()]);
/// ```
#[derive(Debug, Clone, Default)]
pub struct Context {
    data: HashMap<String, serde_json::Value>,
}

impl Context {
    /// Create a new empty context
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the language preference
    pub fn with_language(mut self, lang: impl Into<String>) -> Self {
        self.insert(keys::LANGUAGE, serde_json::json!(lang.into()));
        self
    }

    /// Set the session ID
    pub fn with_session_id(mut self, session_id: impl Into<String>) -> Self {
        self.insert(keys::SESSION_ID, serde_json::json!(session_id.into()));
        self
    }

    /// Restrict the analysis to the given symbols
    pub fn with_symbols<I, S>(mut self, symbols: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let symbols: Vec<String> = symbols.into_iter().map(Into::into).collect();
        self.insert(keys::SYMBOLS, serde_json::json!(symbols));
        self
    }

    /// Language preference, if any
    pub fn language(&self) -> Option<&str> {
        self.get(keys::LANGUAGE).and_then(|v| v.as_str())
    }

    /// Session ID, if any
    pub fn session_id(&self) -> Option<&str> {
        self.get(keys::SESSION_ID).and_then(|v| v.as_str())
    }

    /// Symbols requested for this query; empty when the watchlist should be used
    pub fn symbols(&self) -> Vec<String> {
        self.get(keys::SYMBOLS)
            .and_then(|v| v.as_array())
            .map(|items| {
                items
                    .iter()
                    .filter_map(|item| item.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// How the query was captured
    pub fn input_mode(&self) -> Option<InputMode> {
        self.get(keys::INPUT_MODE)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    /// Record how the query was captured
    pub fn set_input_mode(&mut self, mode: InputMode) {
        self.insert(keys::INPUT_MODE, serde_json::json!(mode));
    }

    /// Transcript of a spoken query
    pub fn transcript(&self) -> Option<&str> {
        self.get(keys::TRANSCRIPT).and_then(|v| v.as_str())
    }

    /// Record the transcript of a spoken query
    pub fn set_transcript(&mut self, transcript: impl Into<String>) {
        self.insert(keys::TRANSCRIPT, serde_json::json!(transcript.into()));
    }

    /// Insert a raw JSON value
    pub fn insert(&mut self, key: impl Into<String>, value: serde_json::Value) {
        self.data.insert(key.into(), value);
    }

    /// Get a raw JSON value
    pub fn get(&self, key: &str) -> Option<&serde_json::Value> {
        self.data.get(key)
    }

    /// Check if a key exists
    pub fn contains_key(&self, key: &str) -> bool {
        self.data.contains_key(key)
    }

    /// Remove a value
    pub fn remove(&mut self, key: &str) -> Option<serde_json::Value> {
        self.data.remove(key)
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the context holds no entries
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}
