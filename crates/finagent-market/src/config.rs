//! Configuration for the market-data and document agents

use crate::error::{MarketError, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Browser-like User-Agent used when fetching filings
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

/// Configuration for the finagent-market agents
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketConfig {
    /// Alpha Vantage API key
    pub alpha_vantage_api_key: Option<String>,

    /// Maximum Alpha Vantage requests per minute
    pub rate_limit_per_minute: u32,

    /// Timeout applied to every outbound HTTP request
    pub request_timeout: Duration,

    /// How long fetched price histories stay cached
    pub series_cache_ttl: Duration,

    /// Calendar days of history used by the risk analysis
    pub lookback_days: u32,

    /// Symbols analyzed when a query names none
    pub watchlist: Vec<String>,

    /// Symbol used when the watchlist is empty
    pub default_symbol: String,

    /// Number of filing chunks retrieved per query
    pub top_k: usize,

    /// User-Agent sent when scraping filings
    pub user_agent: String,
}

impl Default for MarketConfig {
    fn default() -> Self {
        Self {
            alpha_vantage_api_key: None,
            rate_limit_per_minute: 5,
            request_timeout: Duration::from_secs(30),
            series_cache_ttl: Duration::from_secs(300),
            lookback_days: 30,
            watchlist: vec!["AAPL".to_string(), "TSM".to_string(), "SSNLF".to_string()],
            default_symbol: "AAPL".to_string(),
            top_k: 5,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

impl MarketConfig {
    /// Create a new configuration builder
    pub fn builder() -> MarketConfigBuilder {
        MarketConfigBuilder::default()
    }

    /// Load the Alpha Vantage API key from `ALPHA_VANTAGE_API_KEY`
    ///
    /// A missing key is an error: nothing in the pipeline works without it.
    pub fn with_env_api_key(mut self) -> Result<Self> {
        self.alpha_vantage_api_key = Some(finagent_utils::required_env("ALPHA_VANTAGE_API_KEY")?);
        Ok(self)
    }

    /// Load the watchlist from `FINAGENT_WATCHLIST` (comma separated), if set
    pub fn with_env_watchlist(mut self) -> Self {
        if let Some(list) = finagent_utils::optional_env("FINAGENT_WATCHLIST") {
            self.watchlist = parse_symbol_list(&list);
        }
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.rate_limit_per_minute == 0 {
            return Err(MarketError::Config(
                "rate_limit_per_minute must be greater than 0".to_string(),
            ));
        }

        if self.lookback_days == 0 {
            return Err(MarketError::Config(
                "lookback_days must be greater than 0".to_string(),
            ));
        }

        if self.top_k == 0 {
            return Err(MarketError::Config("top_k must be greater than 0".to_string()));
        }

        Ok(())
    }

    /// Alpha Vantage key, or a configuration error
    pub fn api_key(&self) -> Result<&str> {
        self.alpha_vantage_api_key
            .as_deref()
            .ok_or_else(|| MarketError::Config("ALPHA_VANTAGE_API_KEY is not configured".into()))
    }

    /// Symbols to analyze: the watchlist, or the default symbol when it is empty
    pub fn symbols(&self) -> Vec<String> {
        if self.watchlist.is_empty() {
            vec![self.default_symbol.clone()]
        } else {
            self.watchlist.clone()
        }
    }
}

/// Split a comma-separated symbol list, uppercasing and dropping blanks
pub fn parse_symbol_list(list: &str) -> Vec<String> {
    list.split(',')
        .map(|s| s.trim().to_uppercase())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Builder for [`MarketConfig`]
#[derive(Debug, Default)]
pub struct MarketConfigBuilder {
    alpha_vantage_api_key: Option<String>,
    rate_limit_per_minute: Option<u32>,
    request_timeout: Option<Duration>,
    series_cache_ttl: Option<Duration>,
    lookback_days: Option<u32>,
    watchlist: Option<Vec<String>>,
    default_symbol: Option<String>,
    top_k: Option<usize>,
    user_agent: Option<String>,
}

impl MarketConfigBuilder {
    pub fn alpha_vantage_api_key(mut self, key: impl Into<String>) -> Self {
        self.alpha_vantage_api_key = Some(key.into());
        self
    }

    pub fn rate_limit_per_minute(mut self, limit: u32) -> Self {
        self.rate_limit_per_minute = Some(limit);
        self
    }

    pub fn request_timeout(mut self, duration: Duration) -> Self {
        self.request_timeout = Some(duration);
        self
    }

    pub fn series_cache_ttl(mut self, duration: Duration) -> Self {
        self.series_cache_ttl = Some(duration);
        self
    }

    pub fn lookback_days(mut self, days: u32) -> Self {
        self.lookback_days = Some(days);
        self
    }

    pub fn watchlist<I, S>(mut self, symbols: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.watchlist = Some(symbols.into_iter().map(Into::into).collect());
        self
    }

    pub fn default_symbol(mut self, symbol: impl Into<String>) -> Self {
        self.default_symbol = Some(symbol.into());
        self
    }

    pub fn top_k(mut self, top_k: usize) -> Self {
        self.top_k = Some(top_k);
        self
    }

    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    /// Load the Alpha Vantage API key from the environment, if set
    pub fn with_env_api_key(mut self) -> Self {
        if let Some(key) = finagent_utils::optional_env("ALPHA_VANTAGE_API_KEY") {
            self.alpha_vantage_api_key = Some(key);
        }
        self
    }

    /// Build and validate the configuration
    pub fn build(self) -> Result<MarketConfig> {
        let defaults = MarketConfig::default();

        let config = MarketConfig {
            alpha_vantage_api_key: self.alpha_vantage_api_key,
            rate_limit_per_minute: self
                .rate_limit_per_minute
                .unwrap_or(defaults.rate_limit_per_minute),
            request_timeout: self.request_timeout.unwrap_or(defaults.request_timeout),
            series_cache_ttl: self.series_cache_ttl.unwrap_or(defaults.series_cache_ttl),
            lookback_days: self.lookback_days.unwrap_or(defaults.lookback_days),
            watchlist: self.watchlist.unwrap_or(defaults.watchlist),
            default_symbol: self.default_symbol.unwrap_or(defaults.default_symbol),
            top_k: self.top_k.unwrap_or(defaults.top_k),
            user_agent: self.user_agent.unwrap_or(defaults.user_agent),
        };

        config.validate()?;
        Ok(config)
    }
}
