//! Quote-provider access
//!
//! [`MarketDataProvider`] is the seam between the agents and the external
//! market-data API. [`AlphaVantageClient`] is the production implementation;
//! [`CachedProvider`] wraps any provider with a TTL cache on price histories.

pub mod alpha_vantage;

pub use alpha_vantage::AlphaVantageClient;

use crate::cache::{CacheKey, MarketCache};
use crate::error::{MarketError, Result};
use crate::model::{CompanyOverview, EarningsSurprise, GlobalQuote, Interval, Period, PriceSeries};
use async_trait::async_trait;
use chrono::NaiveDate;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, warn};

/// Source of quotes, histories and fundamentals
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MarketDataProvider: Send + Sync {
    /// Full price history at the given interval
    async fn time_series(&self, symbol: &str, interval: Interval) -> Result<PriceSeries>;

    /// Latest quote; `None` when the provider has no quote for the symbol
    async fn global_quote(&self, symbol: &str) -> Result<Option<GlobalQuote>>;

    /// Company fundamentals; `None` for unknown symbols
    async fn company_overview(&self, symbol: &str) -> Result<Option<CompanyOverview>>;

    /// Quarterly earnings surprises, newest first
    async fn earnings(&self, symbol: &str) -> Result<Vec<EarningsSurprise>>;
}

/// Latest quote for each symbol
///
/// A failure for one symbol is logged and recorded as `None`; the rest of the
/// batch still runs.
pub async fn get_stock_prices(
    provider: &dyn MarketDataProvider,
    symbols: &[String],
) -> BTreeMap<String, Option<GlobalQuote>> {
    let mut results = BTreeMap::new();
    for symbol in symbols {
        let quote = match provider.global_quote(symbol).await {
            Ok(quote) => quote,
            Err(e) => {
                error!(%symbol, "Error getting stock price: {e}");
                None
            }
        };
        results.insert(symbol.clone(), quote);
    }
    results
}

/// Historical bars for `symbol`
///
/// `interval` must be one of "1d", "1wk" or "1mo". `period` trims the series
/// to a trailing window ending at `today`; unknown periods keep everything.
pub async fn historical_data(
    provider: &dyn MarketDataProvider,
    symbol: &str,
    interval: &str,
    period: &str,
    today: NaiveDate,
) -> Result<PriceSeries> {
    let interval =
        Interval::from_code(interval).ok_or_else(|| MarketError::InvalidInterval(interval.into()))?;

    let period = Period::from_code(period).unwrap_or_else(|| {
        warn!(%period, "Unknown period, returning the full history");
        Period::Max
    });

    let series = provider.time_series(symbol, interval).await.map_err(|e| {
        error!(%symbol, "Error getting historical data: {e}");
        e
    })?;

    Ok(match period.start_date(today) {
        Some(start) => series.between(start, today),
        None => series,
    })
}

/// Provider decorator caching price histories
pub struct CachedProvider {
    inner: Arc<dyn MarketDataProvider>,
    series: MarketCache<PriceSeries>,
}

impl CachedProvider {
    pub fn new(inner: Arc<dyn MarketDataProvider>, ttl: Duration) -> Self {
        Self {
            inner,
            series: MarketCache::new(ttl),
        }
    }

    /// Drop every cached history
    pub async fn clear(&self) {
        self.series.clear().await;
    }
}

#[async_trait]
impl MarketDataProvider for CachedProvider {
    async fn time_series(&self, symbol: &str, interval: Interval) -> Result<PriceSeries> {
        let key = CacheKey::new(symbol, interval.function());
        self.series
            .get_or_fetch(key, || self.inner.time_series(symbol, interval))
            .await
    }

    async fn global_quote(&self, symbol: &str) -> Result<Option<GlobalQuote>> {
        self.inner.global_quote(symbol).await
    }

    async fn company_overview(&self, symbol: &str) -> Result<Option<CompanyOverview>> {
        self.inner.company_overview(symbol).await
    }

    async fn earnings(&self, symbol: &str) -> Result<Vec<EarningsSurprise>> {
        self.inner.earnings(symbol).await
    }
}
