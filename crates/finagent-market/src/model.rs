//! Market data types
//!
//! Provider payloads are reshaped into these types before anything else in the
//! crate sees them. Numeric fields that fail to parse become `None` rather than
//! failing the whole record.

use chrono::{Datelike, Months, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One OHLCV bar
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceBar {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

/// Bars for one symbol keyed by trading day, oldest first
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PriceSeries {
    pub symbol: String,
    bars: BTreeMap<NaiveDate, PriceBar>,
}

impl PriceSeries {
    /// Create an empty series
    pub fn new(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            bars: BTreeMap::new(),
        }
    }

    /// Create a series from bars in any order; later duplicates win
    pub fn from_bars(symbol: impl Into<String>, bars: impl IntoIterator<Item = PriceBar>) -> Self {
        let mut series = Self::new(symbol);
        for bar in bars {
            series.insert(bar);
        }
        series
    }

    /// Insert or replace the bar for its trading day
    pub fn insert(&mut self, bar: PriceBar) {
        self.bars.insert(bar.date, bar);
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    /// Bars in date order
    pub fn bars(&self) -> impl Iterator<Item = &PriceBar> {
        self.bars.values()
    }

    /// Close for a given trading day
    pub fn close_on(&self, date: NaiveDate) -> Option<f64> {
        self.bars.get(&date).map(|bar| bar.close)
    }

    /// Trading days present in the series
    pub fn dates(&self) -> impl Iterator<Item = &NaiveDate> {
        self.bars.keys()
    }

    /// Closing prices in date order
    pub fn closes(&self) -> Vec<f64> {
        self.bars.values().map(|bar| bar.close).collect()
    }

    /// Most recent close
    pub fn last_close(&self) -> Option<f64> {
        self.bars.values().next_back().map(|bar| bar.close)
    }

    /// Most recent trading day
    pub fn last_date(&self) -> Option<NaiveDate> {
        self.bars.keys().next_back().copied()
    }

    /// Bars from `start` through `end`, both inclusive
    pub fn between(&self, start: NaiveDate, end: NaiveDate) -> Self {
        if start > end {
            return Self::new(self.symbol.as_str());
        }
        Self {
            symbol: self.symbol.clone(),
            bars: self
                .bars
                .range(start..=end)
                .map(|(date, bar)| (*date, *bar))
                .collect(),
        }
    }

    /// Flat list of bars, oldest first
    pub fn to_records(&self) -> Vec<PriceBar> {
        self.bars.values().copied().collect()
    }
}

/// Bar interval accepted by the history endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Interval {
    Daily,
    Weekly,
    Monthly,
}

impl Interval {
    /// Parse the wire codes "1d", "1wk" and "1mo"
    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "1d" => Some(Self::Daily),
            "1wk" => Some(Self::Weekly),
            "1mo" => Some(Self::Monthly),
            _ => None,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Self::Daily => "1d",
            Self::Weekly => "1wk",
            Self::Monthly => "1mo",
        }
    }

    /// Alpha Vantage function name
    pub fn function(&self) -> &'static str {
        match self {
            Self::Daily => "TIME_SERIES_DAILY",
            Self::Weekly => "TIME_SERIES_WEEKLY",
            Self::Monthly => "TIME_SERIES_MONTHLY",
        }
    }

    /// Key holding the bars in the Alpha Vantage payload
    pub fn series_key(&self) -> &'static str {
        match self {
            Self::Daily => "Time Series (Daily)",
            Self::Weekly => "Weekly Time Series",
            Self::Monthly => "Monthly Time Series",
        }
    }
}

/// Trailing window applied to historical data
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Period {
    OneMonth,
    ThreeMonths,
    SixMonths,
    OneYear,
    TwoYears,
    FiveYears,
    YearToDate,
    Max,
}

impl Period {
    /// Parse "1mo", "3mo", "6mo", "1y", "2y", "5y", "ytd" or "max"
    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "1mo" => Some(Self::OneMonth),
            "3mo" => Some(Self::ThreeMonths),
            "6mo" => Some(Self::SixMonths),
            "1y" => Some(Self::OneYear),
            "2y" => Some(Self::TwoYears),
            "5y" => Some(Self::FiveYears),
            "ytd" => Some(Self::YearToDate),
            "max" => Some(Self::Max),
            _ => None,
        }
    }

    /// First date inside the window ending at `today`; `None` for [`Period::Max`]
    pub fn start_date(&self, today: NaiveDate) -> Option<NaiveDate> {
        let months = match self {
            Self::OneMonth => 1,
            Self::ThreeMonths => 3,
            Self::SixMonths => 6,
            Self::OneYear => 12,
            Self::TwoYears => 24,
            Self::FiveYears => 60,
            Self::YearToDate => return today.with_ordinal(1),
            Self::Max => return None,
        };
        today.checked_sub_months(Months::new(months))
    }
}

/// Latest quote for a symbol
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GlobalQuote {
    pub symbol: String,
    pub open: Option<f64>,
    pub high: Option<f64>,
    pub low: Option<f64>,
    pub price: Option<f64>,
    pub volume: Option<f64>,
    pub latest_trading_day: Option<NaiveDate>,
    pub previous_close: Option<f64>,
    pub change: Option<f64>,
    pub change_percent: Option<f64>,
}

/// Company fundamentals
///
/// Serializes with the provider's field names so records read the same as
/// the upstream payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompanyOverview {
    #[serde(rename = "Symbol")]
    pub symbol: String,
    #[serde(rename = "Name", default)]
    pub name: Option<String>,
    #[serde(rename = "MarketCapitalization")]
    pub market_capitalization: Option<f64>,
    #[serde(rename = "EBITDA")]
    pub ebitda: Option<f64>,
    #[serde(rename = "PERatio")]
    pub pe_ratio: Option<f64>,
    #[serde(rename = "PEGRatio")]
    pub peg_ratio: Option<f64>,
    #[serde(rename = "BookValue")]
    pub book_value: Option<f64>,
    #[serde(rename = "DividendYield")]
    pub dividend_yield: Option<f64>,
    #[serde(rename = "EPS")]
    pub eps: Option<f64>,
    #[serde(rename = "RevenueTTM")]
    pub revenue: Option<f64>,
    #[serde(rename = "GrossProfitTTM")]
    pub gross_profit: Option<f64>,
    #[serde(rename = "ProfitMargin")]
    pub profit_margin: Option<f64>,
    #[serde(rename = "OperatingMarginTTM")]
    pub operating_margin: Option<f64>,
    /// Remaining descriptive fields (Sector, Industry, Exchange, ...)
    #[serde(flatten)]
    pub other: BTreeMap<String, String>,
}

impl CompanyOverview {
    pub fn sector(&self) -> Option<&str> {
        self.other.get("Sector").map(String::as_str)
    }

    pub fn industry(&self) -> Option<&str> {
        self.other.get("Industry").map(String::as_str)
    }
}

/// One quarter's reported versus estimated EPS
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EarningsSurprise {
    pub symbol: String,
    pub fiscal_date_ending: Option<NaiveDate>,
    pub reported_date: Option<NaiveDate>,
    pub reported_eps: Option<f64>,
    pub estimated_eps: Option<f64>,
    pub surprise: Option<f64>,
    pub surprise_percentage: Option<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn bar(d: &str, close: f64) -> PriceBar {
        PriceBar {
            date: date(d),
            open: close,
            high: close,
            low: close,
            close,
            volume: 1000.0,
        }
    }

    #[test]
    fn test_series_sorted_by_date() {
        let series = PriceSeries::from_bars(
            "AAPL",
            vec![bar("2024-03-05", 3.0), bar("2024-03-01", 1.0), bar("2024-03-04", 2.0)],
        );

        let closes: Vec<f64> = series.bars().map(|b| b.close).collect();
        assert_eq!(closes, vec![1.0, 2.0, 3.0]);
        assert_eq!(series.last_close(), Some(3.0));
        assert_eq!(series.last_date(), Some(date("2024-03-05")));
    }

    #[test]
    fn test_between_is_inclusive_on_both_ends() {
        let series = PriceSeries::from_bars(
            "AAPL",
            vec![
                bar("2024-03-01", 1.0),
                bar("2024-03-04", 2.0),
                bar("2024-03-05", 3.0),
                bar("2024-04-10", 4.0),
            ],
        );

        let window = series.between(date("2024-03-01"), date("2024-03-05"));
        assert_eq!(window.closes(), vec![1.0, 2.0, 3.0]);
        assert!(series.between(date("2024-04-11"), date("2024-03-01")).is_empty());
    }

    #[test]
    fn test_interval_codes() {
        assert_eq!(Interval::from_code("1d"), Some(Interval::Daily));
        assert_eq!(Interval::from_code("1wk"), Some(Interval::Weekly));
        assert_eq!(Interval::from_code("1mo"), Some(Interval::Monthly));
        assert_eq!(Interval::from_code("5m"), None);
        assert_eq!(Interval::Weekly.function(), "TIME_SERIES_WEEKLY");
        assert_eq!(Interval::Monthly.series_key(), "Monthly Time Series");
    }

    #[test]
    fn test_period_start_date() {
        let today = date("2024-06-30");
        assert_eq!(
            Period::OneYear.start_date(today),
            Some(date("2023-06-30"))
        );
        assert_eq!(
            Period::from_code("3mo").and_then(|p| p.start_date(today)),
            Some(date("2024-03-30"))
        );
        assert_eq!(
            Period::from_code("ytd").and_then(|p| p.start_date(today)),
            Some(date("2024-01-01"))
        );
        assert_eq!(Period::Max.start_date(today), None);
        assert_eq!(Period::from_code("10y"), None);
    }

    #[test]
    fn test_overview_serializes_provider_keys() {
        let mut other = BTreeMap::new();
        other.insert("Sector".to_string(), "TECHNOLOGY".to_string());
        let overview = CompanyOverview {
            symbol: "AAPL".to_string(),
            name: Some("Apple Inc".to_string()),
            market_capitalization: Some(3.0e12),
            ebitda: None,
            pe_ratio: Some(30.5),
            peg_ratio: None,
            book_value: None,
            dividend_yield: None,
            eps: None,
            revenue: None,
            gross_profit: None,
            profit_margin: None,
            operating_margin: None,
            other,
        };

        let json = serde_json::to_value(&overview).unwrap();
        assert_eq!(json["Symbol"], "AAPL");
        assert_eq!(json["PERatio"], 30.5);
        assert_eq!(json["Sector"], "TECHNOLOGY");
        assert_eq!(overview.sector(), Some("TECHNOLOGY"));
    }
}
