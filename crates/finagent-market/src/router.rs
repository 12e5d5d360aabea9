//! Keyword routing for orchestrator queries
//!
//! A query goes to the market-data branch if it mentions market data, to the
//! filings branch if it mentions filings, and nowhere otherwise. Market data
//! wins when both match.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Branch selected for a query
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryRoute {
    /// Risk exposure plus earnings, narrated as a brief
    MarketData,
    /// Answer from retrieved filing excerpts
    Filings,
    /// Nothing recognizable
    Unknown,
}

impl QueryRoute {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MarketData => "market_data",
            Self::Filings => "filings",
            Self::Unknown => "unknown",
        }
    }
}

mod keywords {
    pub const MARKET_DATA: &[&str] = &["market data", "market brief", "市场数据", "行情"];

    pub const FILINGS: &[&str] = &["filings", "filing", "财报", "年报", "申报文件"];

    /// All-caps words that are never tickers
    pub const NOT_SYMBOLS: &[&str] = &["I", "A", "AI", "OK", "US", "USD", "CEO", "ETF", "PDF"];

    /// True if `word` is part of a route keyword, e.g. `DATA` in "MARKET DATA"
    pub fn is_route_word(word: &str) -> bool {
        MARKET_DATA
            .iter()
            .chain(FILINGS)
            .flat_map(|kw| kw.split_whitespace())
            .any(|part| part.eq_ignore_ascii_case(word))
    }
}

/// Result of routing a query
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutedQuery {
    pub route: QueryRoute,
    /// Tickers named in the query, sorted and deduplicated
    pub symbols: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct QueryRouter {
    debug: bool,
}

impl QueryRouter {
    pub fn new() -> Self {
        Self { debug: false }
    }

    /// Log every classification at debug level
    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    /// Pick the branch for `query`, ignoring case
    pub fn classify(&self, query: &str) -> QueryRoute {
        let query_lower = query.to_lowercase();
        let route = if Self::matches_any(&query_lower, keywords::MARKET_DATA) {
            QueryRoute::MarketData
        } else if Self::matches_any(&query_lower, keywords::FILINGS) {
            QueryRoute::Filings
        } else {
            QueryRoute::Unknown
        };

        if self.debug {
            tracing::debug!(route = route.as_str(), "Classified query");
        }
        route
    }

    fn matches_any(query: &str, keywords: &[&str]) -> bool {
        keywords.iter().any(|kw| query.contains(kw))
    }

    /// Uppercase words of one to five letters, e.g. `TSM` or `$AAPL`
    pub fn extract_symbols(&self, query: &str) -> Vec<String> {
        query
            .split_whitespace()
            .map(|word| word.trim_matches(|c: char| !c.is_alphanumeric()))
            .filter(|word| {
                (1..=5).contains(&word.len())
                    && word.chars().all(|c| c.is_ascii_uppercase())
                    && !keywords::NOT_SYMBOLS.contains(word)
                    && !keywords::is_route_word(word)
            })
            .map(str::to_string)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    pub fn route(&self, query: &str) -> RoutedQuery {
        RoutedQuery {
            route: self.classify(query),
            symbols: self.extract_symbols(query),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_market_data_detection() {
        let router = QueryRouter::new();

        assert_eq!(
            router.classify("Give me the market data for Asia tech"),
            QueryRoute::MarketData
        );
        assert_eq!(router.classify("MARKET DATA please"), QueryRoute::MarketData);
        assert_eq!(router.classify("今天亚洲科技股的行情"), QueryRoute::MarketData);
    }

    #[test]
    fn test_filings_detection() {
        let router = QueryRouter::new();

        assert_eq!(
            router.classify("What do the latest filings say about export risk?"),
            QueryRoute::Filings
        );
        assert_eq!(router.classify("台积电年报里的风险"), QueryRoute::Filings);
    }

    #[test]
    fn test_market_data_wins_over_filings() {
        let router = QueryRouter::new();
        assert_eq!(
            router.classify("market data and filings for TSM"),
            QueryRoute::MarketData
        );
    }

    #[test]
    fn test_unknown_query() {
        let router = QueryRouter::new().with_debug(true);
        assert_eq!(router.classify("What's the weather?"), QueryRoute::Unknown);
        assert_eq!(router.classify(""), QueryRoute::Unknown);
    }

    #[test]
    fn test_symbol_extraction() {
        let router = QueryRouter::new();

        let symbols = router.extract_symbols("Compare TSM, $SSNLF and TSM. I want AAPL too");
        assert_eq!(symbols, vec!["AAPL", "SSNLF", "TSM"]);

        assert!(router.extract_symbols("market data please").is_empty());
        assert!(router.extract_symbols("GOOGLEX is too long").is_empty());
    }

    #[test]
    fn test_uppercase_keywords_are_not_symbols() {
        let router = QueryRouter::new();

        let result = router.route("MARKET DATA please");
        assert_eq!(result.route, QueryRoute::MarketData);
        assert!(result.symbols.is_empty());

        let result = router.route("Latest FILINGS for TSM, FILING date too");
        assert_eq!(result.route, QueryRoute::Filings);
        assert_eq!(result.symbols, vec!["TSM"]);

        assert_eq!(router.extract_symbols("MARKET BRIEF on NVDA"), vec!["NVDA"]);
    }

    #[test]
    fn test_route_result() {
        let result = QueryRouter::new().route("market data for TSM");
        assert_eq!(result.route, QueryRoute::MarketData);
        assert_eq!(result.symbols, vec!["TSM"]);
        assert_eq!(result.route.as_str(), "market_data");
    }
}
