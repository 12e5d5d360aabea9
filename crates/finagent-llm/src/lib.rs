//! Language-model abstraction layer for finagent
//!
//! - Message types for chat completion
//! - Completion request/response types
//! - [`LLMProvider`] for text generation and [`EmbeddingProvider`] for
//!   vectorizing filing chunks and queries
//! - An OpenAI-compatible implementation of both

pub mod completion;
pub mod error;
pub mod messages;
pub mod provider;
pub mod providers;

pub use completion::{CompletionRequest, CompletionResponse, StopReason, TokenUsage};
pub use error::{LLMError, Result};
pub use messages::{Message, Role};
pub use provider::{EmbeddingProvider, LLMProvider};
