//! OpenAI-compatible provider
//!
//! Implements [`LLMProvider`] over `/chat/completions` and
//! [`EmbeddingProvider`] over `/embeddings`. Any server speaking the same
//! protocol (local llama.cpp, vLLM, LM Studio, Azure deployments) works by
//! overriding the API base.
//!
//! ```no_run
//! use finagent_llm::{CompletionRequest, LLMProvider, Message};
//! use finagent_llm::providers::OpenAIProvider;
//!
//! # async fn run() -> finagent_llm::Result<()> {
//! let provider = OpenAIProvider::from_env()?;
//! let request = CompletionRequest::builder(provider.config().chat_model.clone())
//!     .add_message(Message::user("Summarize today's tech risk"))
//!     .build();
//! let response = provider.complete(request).await?;
//! println!("{}", response.message.text());
//! # Ok(())
//! # }
//! ```

use crate::{
    CompletionRequest, CompletionResponse, EmbeddingProvider, LLMError, LLMProvider, Message,
    Result, Role, StopReason, TokenUsage,
};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, instrument};

const DEFAULT_OPENAI_API_BASE: &str = "https://api.openai.com/v1";
const DEFAULT_TIMEOUT_SECS: u64 = 120;
const DEFAULT_CHAT_MODEL: &str = "gpt-4o-mini";
const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-3-small";
const DEFAULT_EMBEDDING_DIMENSION: usize = 1536;

/// Configuration for the OpenAI provider
#[derive(Debug, Clone)]
pub struct OpenAIConfig {
    /// API key for authentication
    pub api_key: String,

    /// Base URL, e.g. "https://api.openai.com/v1"
    pub api_base: String,

    /// Request timeout in seconds
    pub timeout_secs: u64,

    /// Model used for narrative generation
    pub chat_model: String,

    /// Model used for embeddings
    pub embedding_model: String,

    /// Dimension of vectors returned by `embedding_model`
    pub embedding_dimension: usize,
}

impl OpenAIConfig {
    /// Create a config with the given API key and default settings
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            ..Self::default()
        }
    }

    /// Create config from the environment
    ///
    /// `OPENAI_API_KEY` is required. `OPENAI_API_BASE`, `OPENAI_MODEL` and
    /// `OPENAI_EMBEDDING_MODEL` are optional overrides.
    pub fn from_env() -> Result<Self> {
        let api_key = finagent_utils::required_env("OPENAI_API_KEY")?;
        let mut config = Self::new(api_key);

        if let Some(base) = finagent_utils::optional_env("OPENAI_API_BASE") {
            config.api_base = base;
        }
        if let Some(model) = finagent_utils::optional_env("OPENAI_MODEL") {
            config.chat_model = model;
        }
        if let Some(model) = finagent_utils::optional_env("OPENAI_EMBEDDING_MODEL") {
            config.embedding_model = model;
        }

        Ok(config)
    }

    /// Set custom API base URL
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }

    /// Set request timeout in seconds
    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }

    /// Set the chat model
    pub fn with_chat_model(mut self, model: impl Into<String>) -> Self {
        self.chat_model = model.into();
        self
    }

    /// Set the embedding model and its output dimension
    pub fn with_embedding_model(mut self, model: impl Into<String>, dimension: usize) -> Self {
        self.embedding_model = model.into();
        self.embedding_dimension = dimension;
        self
    }

    /// Join a path onto the API base
    pub fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.api_base.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}

impl Default for OpenAIConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            api_base: DEFAULT_OPENAI_API_BASE.to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            chat_model: DEFAULT_CHAT_MODEL.to_string(),
            embedding_model: DEFAULT_EMBEDDING_MODEL.to_string(),
            embedding_dimension: DEFAULT_EMBEDDING_DIMENSION,
        }
    }
}

/// OpenAI provider
pub struct OpenAIProvider {
    client: Client,
    config: OpenAIConfig,
}

impl OpenAIProvider {
    /// Create a provider with custom configuration
    pub fn with_config(config: OpenAIConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self { client, config })
    }

    /// Create a provider with an API key and default settings
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        Self::with_config(OpenAIConfig::new(api_key))
    }

    /// Create a provider from the environment
    pub fn from_env() -> Result<Self> {
        Self::with_config(OpenAIConfig::from_env()?)
    }

    /// Current configuration
    pub fn config(&self) -> &OpenAIConfig {
        &self.config
    }

    async fn post_json<B: Serialize, R: for<'de> Deserialize<'de>>(
        &self,
        path: &str,
        body: &B,
        model: &str,
    ) -> Result<R> {
        let response = self
            .client
            .post(self.config.endpoint(path))
            .bearer_auth(&self.config.api_key)
            .json(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await?;
            return Err(map_status(status, error_text, model));
        }

        response
            .json()
            .await
            .map_err(|e| LLMError::UnexpectedResponse(format!("Failed to parse response: {e}")))
    }
}

#[async_trait]
impl LLMProvider for OpenAIProvider {
    #[instrument(skip(self, request), fields(model = %request.model, api_base = %self.config.api_base))]
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse> {
        let body = ChatRequest {
            model: request.model.clone(),
            messages: build_chat_messages(request.system.as_deref(), &request.messages),
            max_tokens: request.max_tokens,
            temperature: request.temperature,
        };

        let response: ChatResponse = self
            .post_json("chat/completions", &body, &request.model)
            .await?;

        let choice = response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| LLMError::UnexpectedResponse("No choices in response".to_string()))?;

        let usage = response.usage.unwrap_or_default();
        debug!(
            "Received completion - finish_reason: {}, tokens: {}/{}",
            choice.finish_reason.as_deref().unwrap_or("none"),
            usage.prompt_tokens,
            usage.completion_tokens
        );

        Ok(CompletionResponse {
            message: Message::assistant(choice.message.content.unwrap_or_default()),
            stop_reason: map_stop_reason(choice.finish_reason.as_deref().unwrap_or("stop")),
            usage: TokenUsage {
                input_tokens: usage.prompt_tokens,
                output_tokens: usage.completion_tokens,
            },
        })
    }

    fn name(&self) -> &'static str {
        "openai"
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAIProvider {
    #[instrument(skip(self, texts), fields(model = %self.config.embedding_model, count = texts.len()))]
    async fn embed(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let expected = texts.len();
        let body = EmbeddingRequest {
            model: self.config.embedding_model.clone(),
            input: texts,
        };

        let response: EmbeddingResponse = self
            .post_json("embeddings", &body, &self.config.embedding_model)
            .await?;

        let mut data = response.data;
        data.sort_by_key(|item| item.index);

        if data.len() != expected {
            return Err(LLMError::UnexpectedResponse(format!(
                "Expected {expected} embeddings, received {}",
                data.len()
            )));
        }

        Ok(data.into_iter().map(|item| item.embedding).collect())
    }

    fn dimension(&self) -> usize {
        self.config.embedding_dimension
    }
}

// ============================================================================
// Wire types
// ============================================================================

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    max_tokens: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Debug, Serialize, PartialEq)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
    #[serde(default)]
    usage: Option<ChatUsage>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ChatUsage {
    #[serde(default)]
    prompt_tokens: usize,
    #[serde(default)]
    completion_tokens: usize,
}

#[derive(Debug, Serialize)]
struct EmbeddingRequest {
    model: String,
    input: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingItem>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingItem {
    #[serde(default)]
    index: usize,
    embedding: Vec<f32>,
}

fn build_chat_messages(system: Option<&str>, messages: &[Message]) -> Vec<ChatMessage> {
    let system = system.map(|text| ChatMessage {
        role: Role::System.as_str(),
        content: text.to_string(),
    });

    system
        .into_iter()
        .chain(messages.iter().map(|msg| ChatMessage {
            role: msg.role.as_str(),
            content: msg.content.clone(),
        }))
        .collect()
}

fn map_status(status: StatusCode, body: String, model: &str) -> LLMError {
    match status.as_u16() {
        401 => LLMError::AuthenticationFailed,
        429 => LLMError::RateLimitExceeded(body),
        400 => LLMError::InvalidRequest(body),
        404 => LLMError::ModelNotFound(model.to_string()),
        _ => LLMError::RequestFailed(format!("HTTP {status}: {body}")),
    }
}

fn map_stop_reason(reason: &str) -> StopReason {
    match reason {
        "length" => StopReason::MaxTokens,
        "content_filter" => StopReason::ContentFilter,
        _ => StopReason::EndTurn,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_builder() {
        let config = OpenAIConfig::new("sk-test")
            .with_api_base("http://localhost:1234/v1/")
            .with_timeout(30)
            .with_chat_model("local-model")
            .with_embedding_model("nomic-embed", 768);

        assert_eq!(config.api_key, "sk-test");
        assert_eq!(config.timeout_secs, 30);
        assert_eq!(config.chat_model, "local-model");
        assert_eq!(config.embedding_dimension, 768);
        assert_eq!(
            config.endpoint("/chat/completions"),
            "http://localhost:1234/v1/chat/completions"
        );
    }

    #[test]
    fn test_config_from_env() {
        unsafe {
            std::env::set_var("OPENAI_API_KEY", "test-key-from-env");
            std::env::set_var("OPENAI_API_BASE", "https://custom.openai.com/v1");
        }

        let config = OpenAIConfig::from_env().unwrap();
        assert_eq!(config.api_key, "test-key-from-env");
        assert_eq!(config.api_base, "https://custom.openai.com/v1");

        unsafe {
            std::env::remove_var("OPENAI_API_KEY");
            std::env::remove_var("OPENAI_API_BASE");
        }

        assert!(matches!(
            OpenAIProvider::from_env(),
            Err(LLMError::ConfigurationError(_))
        ));
    }

    #[test]
    fn test_system_prompt_goes_first() {
        let messages = build_chat_messages(
            Some("You are a financial analyst"),
            &[Message::user("Brief me"), Message::assistant("Sure")],
        );

        assert_eq!(messages.len(), 3);
        assert_eq!(messages[0].role, "system");
        assert_eq!(messages[1].role, "user");
        assert_eq!(messages[2].content, "Sure");
    }

    #[test]
    fn test_status_mapping() {
        assert!(matches!(
            map_status(StatusCode::UNAUTHORIZED, String::new(), "m"),
            LLMError::AuthenticationFailed
        ));
        assert!(matches!(
            map_status(StatusCode::TOO_MANY_REQUESTS, "slow down".into(), "m"),
            LLMError::RateLimitExceeded(body) if body == "slow down"
        ));
        assert!(matches!(
            map_status(StatusCode::NOT_FOUND, String::new(), "gpt-x"),
            LLMError::ModelNotFound(model) if model == "gpt-x"
        ));
        assert!(matches!(
            map_status(StatusCode::BAD_GATEWAY, String::new(), "m"),
            LLMError::RequestFailed(_)
        ));
    }

    #[test]
    fn test_stop_reason_mapping() {
        assert_eq!(map_stop_reason("stop"), StopReason::EndTurn);
        assert_eq!(map_stop_reason("length"), StopReason::MaxTokens);
        assert_eq!(map_stop_reason("content_filter"), StopReason::ContentFilter);
        assert_eq!(map_stop_reason("unknown"), StopReason::EndTurn);
    }

    #[test]
    fn test_parse_chat_response() {
        let raw = r#"{
            "choices": [{"message": {"role": "assistant", "content": "Brief"}, "finish_reason": "stop"}],
            "usage": {"prompt_tokens": 12, "completion_tokens": 3}
        }"#;
        let parsed: ChatResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed.choices[0].message.content.as_deref(), Some("Brief"));
        assert_eq!(parsed.usage.unwrap().prompt_tokens, 12);
    }

    #[test]
    fn test_parse_embedding_response() {
        let raw = r#"{"data": [
            {"index": 1, "embedding": [0.5, 0.5]},
            {"index": 0, "embedding": [1.0, 0.0]}
        ]}"#;
        let mut parsed: EmbeddingResponse = serde_json::from_str(raw).unwrap();
        parsed.data.sort_by_key(|item| item.index);
        assert_eq!(parsed.data[0].embedding, vec![1.0, 0.0]);
    }

    #[tokio::test]
    async fn test_embed_empty_batch_skips_request() {
        let provider = OpenAIProvider::new("sk-test").unwrap();
        let vectors = provider.embed(Vec::new()).await.unwrap();
        assert!(vectors.is_empty());
        assert_eq!(provider.dimension(), 1536);
    }

    #[tokio::test]
    #[ignore] // Requires OPENAI_API_KEY and network access
    async fn test_live_completion() {
        let provider = OpenAIProvider::from_env().unwrap();
        let request = CompletionRequest::builder(provider.config().chat_model.clone())
            .add_message(Message::user("Reply with the word ok"))
            .max_tokens(5)
            .build();
        let response = provider.complete(request).await.unwrap();
        assert!(!response.message.text().is_empty());
    }
}
