//! Query orchestration
//!
//! The [`Orchestrator`] routes a query by keyword, runs the matching branch
//! and hands the result to the [`LanguageAgent`]:
//!
//! - market data: risk exposure over the named symbols (or the watchlist)
//!   plus the latest earnings surprise per symbol, narrated as a brief
//! - filings: the query is embedded, the nearest filing chunks are retrieved
//!   and the model answers from them
//!
//! Anything else gets a fixed apology. Every reply is spoken when a
//! [`VoiceAgent`] is attached.

use crate::analysis::{RiskAnalyzer, RiskAssessment};
use crate::api::{AlphaVantageClient, CachedProvider, MarketDataProvider};
use crate::config::MarketConfig;
use crate::error::{MarketError, Result};
use crate::model::EarningsSurprise;
use crate::narrative::LanguageAgent;
use crate::portfolio::AllocationTable;
use crate::prompts::Language;
use crate::retrieval::{Metadata, RetrievalError, RetrievalStore, RetrievedDocument};
use crate::router::{QueryRoute, QueryRouter};
use crate::scraping::ScrapingAgent;
use crate::voice::VoiceAgent;
use async_trait::async_trait;
use finagent_core::{Agent, Context, InputMode};
use finagent_llm::EmbeddingProvider;
use finagent_llm::providers::OpenAIProvider;
use ndarray::Array2;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, error, info, instrument, warn};

/// Reply for queries that match no branch
pub const UNKNOWN_REQUEST: &str = "Sorry, I couldn't understand your request.";

/// Longest filing chunk stored in the retrieval store
pub const MAX_CHUNK_CHARS: usize = 1_000;

/// Environment variable selecting the narrative language (`en` or `zh`)
pub const LANGUAGE_ENV: &str = "FINAGENT_LANGUAGE";

/// Text reply plus the synthesized audio that was played for it
#[derive(Debug, Clone, PartialEq)]
pub struct OrchestratorReply {
    pub response: String,
    /// WAV bytes, when speech synthesis succeeded
    pub audio: Option<Vec<u8>>,
}

pub struct Orchestrator {
    config: MarketConfig,
    provider: Arc<dyn MarketDataProvider>,
    analyzer: RiskAnalyzer,
    scraper: ScrapingAgent,
    embedder: Arc<dyn EmbeddingProvider>,
    store: RwLock<RetrievalStore>,
    language: LanguageAgent,
    voice: Option<VoiceAgent>,
    allocation: AllocationTable,
    router: QueryRouter,
}

impl Orchestrator {
    pub fn new(
        config: MarketConfig,
        provider: Arc<dyn MarketDataProvider>,
        embedder: Arc<dyn EmbeddingProvider>,
        language: LanguageAgent,
    ) -> Result<Self> {
        config.validate()?;
        let scraper = ScrapingAgent::new(&config)?;
        let analyzer = RiskAnalyzer::new(Arc::clone(&provider), &config);
        let store = RetrievalStore::flat(embedder.dimension());

        Ok(Self {
            config,
            provider,
            analyzer,
            scraper,
            embedder,
            store: RwLock::new(store),
            language,
            voice: None,
            allocation: AllocationTable::default(),
            router: QueryRouter::new(),
        })
    }

    /// Production wiring from the environment
    ///
    /// Requires `ALPHA_VANTAGE_API_KEY` and `OPENAI_API_KEY`. Price histories
    /// go through a [`CachedProvider`]; OpenAI serves chat, embeddings and
    /// speech.
    pub fn from_env() -> Result<Self> {
        let config = MarketConfig::default()
            .with_env_api_key()?
            .with_env_watchlist();
        let client = AlphaVantageClient::new(&config)?;
        let provider = Arc::new(CachedProvider::new(
            Arc::new(client),
            config.series_cache_ttl,
        ));

        let openai = Arc::new(OpenAIProvider::from_env()?);
        let model = openai.config().chat_model.clone();
        let language = finagent_utils::optional_env(LANGUAGE_ENV)
            .map_or_else(Language::default, |code| Language::from_code(&code));
        let narrator = LanguageAgent::new(openai.clone(), model).with_language(language);

        let orchestrator = Self::new(config, provider, openai, narrator)?
            .with_voice(VoiceAgent::from_env()?)
            .with_allocation(AllocationTable::from_env()?);

        info!(
            symbols = ?orchestrator.config.symbols(),
            language = language.code(),
            "Orchestrator ready"
        );
        Ok(orchestrator)
    }

    /// Speak every reply through `voice`
    pub fn with_voice(mut self, voice: VoiceAgent) -> Self {
        self.voice = Some(voice);
        self
    }

    pub fn with_allocation(mut self, allocation: AllocationTable) -> Self {
        self.allocation = allocation;
        self
    }

    /// Quote provider shared with the risk analysis
    pub fn provider(&self) -> Arc<dyn MarketDataProvider> {
        Arc::clone(&self.provider)
    }

    pub fn voice(&self) -> Option<&VoiceAgent> {
        self.voice.as_ref()
    }

    pub fn language_agent(&self) -> &LanguageAgent {
        &self.language
    }

    pub fn allocation(&self) -> &AllocationTable {
        &self.allocation
    }

    pub fn config(&self) -> &MarketConfig {
        &self.config
    }

    /// Number of filing chunks available for retrieval
    pub async fn indexed_chunks(&self) -> usize {
        self.store.read().await.len()
    }

    /// Route and answer `query` in the agent's default language
    pub async fn handle_query(&self, query: &str) -> OrchestratorReply {
        self.handle_query_in(query, self.language.language()).await
    }

    /// Route and answer `query`, narrating in `language`
    pub async fn handle_query_in(&self, query: &str, language: Language) -> OrchestratorReply {
        self.answer(query, language, &[]).await
    }

    /// Route and answer `query` using the language and symbols in `context`
    ///
    /// Symbols set on the context take precedence over tickers named in the
    /// query.
    pub async fn handle_query_with(&self, query: &str, context: &Context) -> OrchestratorReply {
        if let Some(session) = context.session_id() {
            debug!(%session, "Query for session");
        }
        self.answer(query, self.context_language(context), &context.symbols())
            .await
    }

    /// Transcribe `audio` and answer the transcript
    ///
    /// Fails when no voice agent is attached or nothing was recognized.
    pub async fn handle_audio(&self, audio: Vec<u8>, language: Language) -> Result<OrchestratorReply> {
        let mut context = Context::new().with_language(language.code());
        self.handle_audio_with(audio, &mut context).await
    }

    /// Transcribe `audio`, record the transcript in `context` and answer it
    pub async fn handle_audio_with(
        &self,
        audio: Vec<u8>,
        context: &mut Context,
    ) -> Result<OrchestratorReply> {
        let voice = self
            .voice
            .as_ref()
            .ok_or_else(|| MarketError::Speech("Voice input is not configured".to_string()))?;

        let transcript = voice.transcribe_audio(audio).await;
        if transcript.is_empty() {
            return Err(MarketError::Speech(
                "No speech recognized in the audio".to_string(),
            ));
        }

        context.set_input_mode(InputMode::Voice);
        context.set_transcript(transcript.as_str());
        Ok(self.handle_query_with(&transcript, context).await)
    }

    fn context_language(&self, context: &Context) -> Language {
        context
            .language()
            .map_or(self.language.language(), Language::from_code)
    }

    #[instrument(skip(self))]
    async fn answer(&self, query: &str, language: Language, symbols: &[String]) -> OrchestratorReply {
        let routed = self.router.route(query);
        info!(route = routed.route.as_str(), symbols = ?routed.symbols, "Handling query");

        let response = match routed.route {
            QueryRoute::MarketData => {
                let symbols = [symbols.to_vec(), routed.symbols]
                    .into_iter()
                    .find(|list| !list.is_empty())
                    .unwrap_or_else(|| self.config.symbols());
                self.market_brief(&symbols, language).await
            }
            QueryRoute::Filings => self.filings_answer(query, language).await,
            QueryRoute::Unknown => UNKNOWN_REQUEST.to_string(),
        };

        let audio = self.speak(&response).await;
        OrchestratorReply { response, audio }
    }

    /// Risk exposure of `symbols` against the configured allocation
    pub async fn risk_exposure(&self, symbols: &[String]) -> RiskAssessment {
        self.analyzer
            .analyze_risk_exposure(symbols, &self.allocation)
            .await
    }

    /// Risk exposure and earnings for `symbols`, narrated
    pub async fn market_brief(&self, symbols: &[String], language: Language) -> String {
        let analysis = self.risk_exposure(symbols).await;
        let surprises = self.latest_earnings(symbols).await;
        self.language
            .generate_market_brief_in(&analysis, &surprises, language)
            .await
    }

    /// Most recent earnings surprise per symbol; symbols without one are skipped
    pub async fn latest_earnings(&self, symbols: &[String]) -> Vec<EarningsSurprise> {
        let mut surprises = Vec::new();
        for symbol in symbols {
            match self.provider.earnings(symbol).await {
                Ok(history) => {
                    if let Some(latest) = history
                        .into_iter()
                        .max_by_key(|surprise| surprise.fiscal_date_ending)
                    {
                        surprises.push(latest);
                    }
                }
                Err(e) => warn!(%symbol, "Error fetching earnings: {e}"),
            }
        }
        surprises
    }

    async fn filings_answer(&self, query: &str, language: Language) -> String {
        let documents = match self.relevant_filings(query).await {
            Ok(documents) => documents,
            Err(e) => {
                warn!("Error retrieving filings: {e}");
                Vec::new()
            }
        };
        self.language
            .answer_from_documents(query, &documents, language)
            .await
    }

    /// Filing chunks nearest to `query`
    pub async fn relevant_filings(&self, query: &str) -> Result<Vec<RetrievedDocument>> {
        let mut vectors = self.embedder.embed(vec![query.to_string()]).await?;
        if vectors.is_empty() {
            return Err(RetrievalError::LengthMismatch {
                texts: 1,
                embeddings: 0,
            }
            .into());
        }
        let query_vector = vectors.swap_remove(0);

        let store = self.store.read().await;
        Ok(store.retrieve(&query_vector, self.config.top_k)?)
    }

    /// Scrape, chunk, embed and store each filing; returns the chunks added
    ///
    /// Filings that cannot be scraped or embedded are logged and skipped.
    pub async fn ingest_filings(&self, urls: &[String]) -> usize {
        let documents: Vec<(String, String)> = urls
            .iter()
            .zip(self.scraper.scrape_filings(urls).await)
            .filter_map(|(url, document)| document.map(|doc| (url.clone(), doc.text())))
            .collect();
        let added = self.ingest_documents(&documents).await;
        info!(filings = urls.len(), chunks = added, "Ingested filings");
        added
    }

    /// Ingest `(source, text)` pairs independently; returns the chunks added
    pub async fn ingest_documents(&self, documents: &[(String, String)]) -> usize {
        let mut added = 0;
        for (source, text) in documents {
            match self.ingest_text(source, text).await {
                Ok(count) => added += count,
                Err(e) => error!(%source, "Failed to ingest document: {e}"),
            }
        }
        added
    }

    /// Chunk, embed and store `text` under `source`
    pub async fn ingest_text(&self, source: &str, text: &str) -> Result<usize> {
        let chunks = chunk_text(text, MAX_CHUNK_CHARS);
        if chunks.is_empty() {
            warn!(%source, "No text to ingest");
            return Ok(0);
        }

        let vectors = self.embedder.embed(chunks.clone()).await?;
        let embeddings = to_matrix(&vectors, chunks.len(), self.embedder.dimension())?;
        let metadata = (0..chunks.len())
            .map(|chunk| {
                let mut entry = Metadata::new();
                entry.insert("source".to_string(), Value::from(source));
                entry.insert("chunk".to_string(), Value::from(chunk));
                entry
            })
            .collect();

        let count = chunks.len();
        self.store
            .write()
            .await
            .add_texts(chunks, embeddings, Some(metadata))?;
        Ok(count)
    }

    async fn speak(&self, response: &str) -> Option<Vec<u8>> {
        let voice = self.voice.as_ref()?;
        let audio = voice.synthesize(response).await?;
        voice.play_in_background(audio.clone());
        Some(audio)
    }
}

#[async_trait]
impl Agent for Orchestrator {
    async fn process(&self, input: String, context: &mut Context) -> finagent_core::Result<String> {
        if input.trim().is_empty() {
            return Err(finagent_core::Error::InvalidInput("empty query".to_string()));
        }
        if context.input_mode().is_none() {
            context.set_input_mode(InputMode::Text);
        }

        let reply = self.handle_query_with(&input, context).await;
        Ok(reply.response)
    }

    fn name(&self) -> &str {
        "orchestrator"
    }

    async fn initialize(&mut self) -> finagent_core::Result<()> {
        if self.embedder.dimension() == 0 {
            error!("Embedding provider reports a zero dimension");
            return Err(finagent_core::Error::InitializationFailed(
                "embedding dimension must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

/// One row per vector, each checked against `dimension`
fn to_matrix(vectors: &[Vec<f32>], expected_rows: usize, dimension: usize) -> Result<Array2<f32>> {
    if vectors.len() != expected_rows {
        return Err(RetrievalError::LengthMismatch {
            texts: expected_rows,
            embeddings: vectors.len(),
        }
        .into());
    }
    if let Some(bad) = vectors.iter().find(|v| v.len() != dimension) {
        return Err(RetrievalError::DimensionMismatch {
            expected: dimension,
            actual: bad.len(),
        }
        .into());
    }
    Ok(Array2::from_shape_fn((vectors.len(), dimension), |(row, col)| {
        vectors[row][col]
    }))
}

/// Pack paragraphs into chunks of at most `max_chars` characters
///
/// Paragraphs are separated by line breaks. A paragraph longer than
/// `max_chars` is split on whitespace, or mid-word when a single word is
/// too long.
pub fn chunk_text(text: &str, max_chars: usize) -> Vec<String> {
    let max_chars = max_chars.max(1);
    let mut chunks = Vec::new();
    let mut current = String::new();

    for paragraph in text.lines().map(str::trim).filter(|p| !p.is_empty()) {
        for piece in split_long(paragraph, max_chars) {
            let joined_len = current.chars().count() + 1 + piece.chars().count();
            if !current.is_empty() && joined_len > max_chars {
                chunks.push(std::mem::take(&mut current));
            }
            if !current.is_empty() {
                current.push('\n');
            }
            current.push_str(&piece);
        }
    }

    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

fn split_long(paragraph: &str, max_chars: usize) -> Vec<String> {
    if paragraph.chars().count() <= max_chars {
        return vec![paragraph.to_string()];
    }

    let mut pieces = Vec::new();
    let mut current = String::new();
    for word in paragraph.split_whitespace() {
        let word_len = word.chars().count();
        let joined_len = current.chars().count() + 1 + word_len;
        if !current.is_empty() && joined_len > max_chars {
            pieces.push(std::mem::take(&mut current));
        }

        if word_len > max_chars {
            let chars: Vec<char> = word.chars().collect();
            for part in chars.chunks(max_chars) {
                pieces.push(part.iter().collect());
            }
            continue;
        }

        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(word);
    }
    if !current.is_empty() {
        pieces.push(current);
    }
    pieces
}
