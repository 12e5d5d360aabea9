//! Alpha Vantage API client

use super::MarketDataProvider;
use crate::config::MarketConfig;
use crate::error::{MarketError, Result};
use crate::model::{CompanyOverview, EarningsSurprise, GlobalQuote, Interval, PriceBar, PriceSeries};
use async_trait::async_trait;
use chrono::NaiveDate;
use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use reqwest::Client;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::num::NonZeroU32;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

const BASE_URL: &str = "https://www.alphavantage.co/query";
const PROVIDER: &str = "Alpha Vantage";

type SharedRateLimiter = Arc<RateLimiter<NotKeyed, InMemoryState, DefaultClock>>;

/// Alpha Vantage API client
#[derive(Debug, Clone)]
pub struct AlphaVantageClient {
    client: Client,
    api_key: String,
    base_url: String,
    rate_limiter: SharedRateLimiter,
}

impl AlphaVantageClient {
    /// Create a client from a validated configuration
    ///
    /// Fails when the configuration carries no API key.
    pub fn new(config: &MarketConfig) -> Result<Self> {
        let api_key = config.api_key()?.to_string();

        let quota = Quota::per_minute(
            NonZeroU32::new(config.rate_limit_per_minute).unwrap_or(NonZeroU32::MIN),
        );
        let rate_limiter = Arc::new(RateLimiter::direct(quota));

        let client = Client::builder().timeout(config.request_timeout).build()?;

        Ok(Self {
            client,
            api_key,
            base_url: BASE_URL.to_string(),
            rate_limiter,
        })
    }

    /// Create from `ALPHA_VANTAGE_API_KEY` with the default limits
    pub fn from_env() -> Result<Self> {
        let config = MarketConfig::default().with_env_api_key()?;
        Self::new(&config)
    }

    /// Point the client at a different endpoint
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Issue one rate-limited query and screen the payload for provider errors
    async fn query(&self, function: &str, symbol: &str, extra: &[(&str, &str)]) -> Result<Value> {
        self.rate_limiter.until_ready().await;

        let mut params = HashMap::new();
        params.insert("function", function);
        params.insert("symbol", symbol);
        params.insert("apikey", self.api_key.as_str());
        for &(key, value) in extra {
            params.insert(key, value);
        }

        debug!(%function, %symbol, "Querying Alpha Vantage");
        let response = self.client.get(&self.base_url).query(&params).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(MarketError::HttpStatus {
                provider: PROVIDER.to_string(),
                status: status.as_u16(),
            });
        }

        let data: Value = response.json().await?;
        check_payload(&data)?;
        Ok(data)
    }
}

#[async_trait]
impl MarketDataProvider for AlphaVantageClient {
    #[instrument(skip(self), fields(interval = interval.code()))]
    async fn time_series(&self, symbol: &str, interval: Interval) -> Result<PriceSeries> {
        let data = self
            .query(interval.function(), symbol, &[("outputsize", "full")])
            .await?;
        parse_time_series(&data, symbol, interval)
    }

    #[instrument(skip(self))]
    async fn global_quote(&self, symbol: &str) -> Result<Option<GlobalQuote>> {
        let data = self.query("GLOBAL_QUOTE", symbol, &[]).await?;
        parse_global_quote(&data, symbol)
    }

    #[instrument(skip(self))]
    async fn company_overview(&self, symbol: &str) -> Result<Option<CompanyOverview>> {
        let data = self.query("OVERVIEW", symbol, &[]).await?;
        Ok(parse_overview(&data))
    }

    #[instrument(skip(self))]
    async fn earnings(&self, symbol: &str) -> Result<Vec<EarningsSurprise>> {
        let data = self.query("EARNINGS", symbol, &[]).await?;
        parse_earnings(&data, symbol)
    }
}

/// Map provider error and throttling messages onto [`MarketError`]
pub fn check_payload(data: &Value) -> Result<()> {
    if let Some(message) = data.get("Error Message") {
        return Err(MarketError::Provider(value_text(message)));
    }

    // Both keys carry throttling notices on the free tier
    for key in ["Note", "Information"] {
        if let Some(note) = data.get(key) {
            warn!(note = %value_text(note), "Alpha Vantage throttled the request");
            return Err(MarketError::RateLimited {
                provider: PROVIDER.to_string(),
            });
        }
    }

    Ok(())
}

/// Parse a daily, weekly or monthly series payload
///
/// Bars with an unreadable date or price are skipped with a warning.
pub fn parse_time_series(data: &Value, symbol: &str, interval: Interval) -> Result<PriceSeries> {
    let key = interval.series_key();
    let raw = data
        .get(key)
        .and_then(Value::as_object)
        .ok_or_else(|| MarketError::MissingField(key.to_string()))?;

    let mut series = PriceSeries::new(symbol);
    for (day, values) in raw {
        match parse_bar(day, values) {
            Some(bar) => series.insert(bar),
            None => warn!(%symbol, %day, "Skipping malformed bar"),
        }
    }

    Ok(series)
}

fn parse_bar(day: &str, values: &Value) -> Option<PriceBar> {
    Some(PriceBar {
        date: parse_date(day)?,
        open: parse_number(values.get("1. open")?)?,
        high: parse_number(values.get("2. high")?)?,
        low: parse_number(values.get("3. low")?)?,
        close: parse_number(values.get("4. close")?)?,
        volume: parse_number(values.get("5. volume")?)?,
    })
}

/// Parse a GLOBAL_QUOTE payload
///
/// The "Global Quote" key must be present; an empty object means the
/// provider knows no such symbol.
pub fn parse_global_quote(data: &Value, symbol: &str) -> Result<Option<GlobalQuote>> {
    let raw = data
        .get("Global Quote")
        .and_then(Value::as_object)
        .ok_or_else(|| MarketError::MissingField("Global Quote".to_string()))?;

    if raw.is_empty() {
        return Ok(None);
    }

    let number = |key: &str| raw.get(key).and_then(parse_number);

    Ok(Some(GlobalQuote {
        symbol: raw
            .get("01. symbol")
            .and_then(Value::as_str)
            .unwrap_or(symbol)
            .to_string(),
        open: number("02. open"),
        high: number("03. high"),
        low: number("04. low"),
        price: number("05. price"),
        volume: number("06. volume"),
        latest_trading_day: raw
            .get("07. latest trading day")
            .and_then(Value::as_str)
            .and_then(parse_date),
        previous_close: number("08. previous close"),
        change: number("09. change"),
        change_percent: number("10. change percent"),
    }))
}

const OVERVIEW_TYPED: [&str; 14] = [
    "MarketCapitalization",
    "EBITDA",
    "PERatio",
    "PEGRatio",
    "BookValue",
    "DividendYield",
    "EPS",
    "RevenueTTM",
    "Revenue",
    "GrossProfitTTM",
    "GrossProfit",
    "ProfitMargin",
    "OperatingMarginTTM",
    "Name",
];

/// Parse an OVERVIEW payload; `None` when it has no "Symbol"
pub fn parse_overview(data: &Value) -> Option<CompanyOverview> {
    let raw = data.as_object()?;
    let symbol = raw.get("Symbol").and_then(Value::as_str)?.to_string();
    let number = |key: &str| raw.get(key).and_then(parse_number);

    let other: BTreeMap<String, String> = raw
        .iter()
        .filter(|(key, _)| key.as_str() != "Symbol" && !OVERVIEW_TYPED.contains(&key.as_str()))
        .map(|(key, value)| (key.clone(), value_text(value)))
        .collect();

    Some(CompanyOverview {
        symbol,
        name: raw
            .get("Name")
            .and_then(Value::as_str)
            .map(ToString::to_string),
        market_capitalization: number("MarketCapitalization"),
        ebitda: number("EBITDA"),
        pe_ratio: number("PERatio"),
        peg_ratio: number("PEGRatio"),
        book_value: number("BookValue"),
        dividend_yield: number("DividendYield"),
        eps: number("EPS"),
        revenue: number("RevenueTTM").or_else(|| number("Revenue")),
        gross_profit: number("GrossProfitTTM").or_else(|| number("GrossProfit")),
        profit_margin: number("ProfitMargin"),
        operating_margin: number("OperatingMarginTTM"),
        other,
    })
}

/// Parse the quarterly section of an EARNINGS payload
pub fn parse_earnings(data: &Value, symbol: &str) -> Result<Vec<EarningsSurprise>> {
    let quarters = data
        .get("quarterlyEarnings")
        .and_then(Value::as_array)
        .ok_or_else(|| MarketError::MissingField("quarterlyEarnings".to_string()))?;

    Ok(quarters
        .iter()
        .map(|quarter| {
            let number = |key: &str| quarter.get(key).and_then(parse_number);
            let day = |key: &str| quarter.get(key).and_then(Value::as_str).and_then(parse_date);
            EarningsSurprise {
                symbol: symbol.to_string(),
                fiscal_date_ending: day("fiscalDateEnding"),
                reported_date: day("reportedDate"),
                reported_eps: number("reportedEPS"),
                estimated_eps: number("estimatedEPS"),
                surprise: number("surprise"),
                surprise_percentage: number("surprisePercentage"),
            }
        })
        .collect())
}

/// Coerce a provider value to a finite number
///
/// Accepts JSON numbers and strings such as "1.23", "0.5%" or "1,234";
/// "None", "-" and blanks become `None`.
pub fn parse_number(value: &Value) -> Option<f64> {
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => {
            let cleaned: String = s
                .trim()
                .trim_end_matches('%')
                .chars()
                .filter(|c| *c != ',')
                .collect();
            cleaned.parse::<f64>().ok()
        }
        _ => None,
    };
    parsed.filter(|n| n.is_finite())
}

fn parse_date(s: &str) -> Option<NaiveDate> {
    // Intraday-style keys carry a time suffix
    let day = s.split_whitespace().next()?;
    NaiveDate::parse_from_str(day, "%Y-%m-%d").ok()
}

fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
