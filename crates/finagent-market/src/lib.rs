//! # finagent-market
//!
//! The agents behind the finagent assistant:
//!
//! - **Quotes and history**: Alpha Vantage client with rate limiting and a
//!   TTL cache in front of price histories
//! - **Risk exposure**: correlation, portfolio volatility and allocation
//!   share over a trailing window
//! - **Filings**: HTML and PDF scraping, paragraph chunking and an in-memory
//!   vector store for retrieval
//! - **Narrative**: bilingual prompts rendered for an LLM, with conversation
//!   memory
//! - **Voice**: speech-to-text, text-to-speech and optional microphone and
//!   speaker support (feature `audio-io`)
//! - **Orchestration**: keyword routing of a query to the market-data or
//!   filings branch
//!
//! ## Example
//!
//! ```rust,ignore
//! use finagent_market::{AlphaVantageClient, MarketConfig, RiskAnalyzer, AllocationTable};
//! use std::sync::Arc;
//!
//! let config = MarketConfig::default().with_env_api_key()?;
//! let client = Arc::new(AlphaVantageClient::new(&config)?);
//! let analyzer = RiskAnalyzer::new(client, &config);
//! let assessment = analyzer
//!     .analyze_risk_exposure(&config.symbols(), &AllocationTable::demo())
//!     .await;
//! ```

pub mod analysis;
pub mod api;
pub mod cache;
pub mod config;
pub mod conversation;
pub mod error;
pub mod model;
pub mod narrative;
pub mod orchestrator;
pub mod portfolio;
pub mod prompts;
pub mod retrieval;
pub mod router;
pub mod scraping;
pub mod voice;

#[cfg(test)]
pub(crate) mod testing;

pub use analysis::{RiskAnalyzer, RiskAssessment, RiskReport};
pub use api::{AlphaVantageClient, CachedProvider, MarketDataProvider};
pub use config::MarketConfig;
pub use error::{MarketError, Result};
pub use model::{CompanyOverview, EarningsSurprise, GlobalQuote, Interval, Period, PriceBar, PriceSeries};
pub use narrative::LanguageAgent;
pub use orchestrator::{Orchestrator, OrchestratorReply};
pub use portfolio::AllocationTable;
pub use prompts::Language;
pub use retrieval::{RetrievalStore, RetrievedDocument};
pub use router::{QueryRoute, QueryRouter};
pub use scraping::{ScrapedDocument, ScrapingAgent};
pub use voice::VoiceAgent;
