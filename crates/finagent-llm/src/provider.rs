//! Provider traits

use crate::{CompletionRequest, CompletionResponse, Result};
use async_trait::async_trait;

/// A chat-completion backend
#[async_trait]
pub trait LLMProvider: Send + Sync {
    /// Generate a completion from the model
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse>;

    /// Provider name (e.g., "openai")
    fn name(&self) -> &str;
}

/// A text-embedding backend
///
/// Returned vectors are `f32` and share one dimension per model; one vector is
/// produced per input, in input order.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Embed a batch of texts
    async fn embed(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>>;

    /// Dimension of the produced vectors
    fn dimension(&self) -> usize;
}
