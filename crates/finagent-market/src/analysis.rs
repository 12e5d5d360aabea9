//! Risk exposure analysis
//!
//! The analyzer pulls recent daily closes for a set of symbols, aligns them on
//! shared trading days and reports:
//!
//! - the pairwise correlation of daily returns
//! - the volatility of the weighted portfolio return
//! - the symbol whose latest quote moved furthest from its last close
//! - how much of the book the symbols represent, today and on the prior day
//!
//! Analysis never fails outright. Problems are logged and reported as
//! [`RiskAssessment::Unavailable`] so callers can hand the result straight to
//! the narrative agent.

use crate::api::MarketDataProvider;
use crate::config::MarketConfig;
use crate::error::Result;
use crate::model::{Interval, PriceSeries};
use crate::portfolio::{AllocationTable, allocation_percentage};
use chrono::{Days, Local, NaiveDate};
use ndarray::{Array1, Array2, Axis, s};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Message reported when no symbol has usable history
pub const NO_DATA_MESSAGE: &str = "No data available for any of the provided stocks.";

/// Outcome of a risk analysis
///
/// Serializes as the bare report, or as `{"error": "..."}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RiskAssessment {
    Report(RiskReport),
    Unavailable { error: String },
}

impl RiskAssessment {
    pub fn unavailable(error: impl Into<String>) -> Self {
        Self::Unavailable {
            error: error.into(),
        }
    }

    pub fn report(&self) -> Option<&RiskReport> {
        match self {
            Self::Report(report) => Some(report),
            Self::Unavailable { .. } => None,
        }
    }

    pub fn is_available(&self) -> bool {
        matches!(self, Self::Report(_))
    }
}

/// Risk statistics for a set of symbols
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskReport {
    /// Symbols that had history in the lookback window
    pub symbols: Vec<String>,
    /// Number of daily return rows the statistics were computed from
    pub observations: usize,
    pub correlation_matrix: BTreeMap<String, BTreeMap<String, f64>>,
    /// Sample standard deviation of the weighted daily portfolio return
    pub portfolio_risk: Option<f64>,
    pub largest_change_stock: Option<String>,
    pub largest_change_value: Option<f64>,
    pub allocation_percentage: f64,
    pub previous_day_allocation_percentage: f64,
    pub as_of: NaiveDate,
}

/// Computes [`RiskAssessment`]s from provider data
pub struct RiskAnalyzer {
    provider: Arc<dyn MarketDataProvider>,
    lookback_days: u32,
}

impl RiskAnalyzer {
    pub fn new(provider: Arc<dyn MarketDataProvider>, config: &MarketConfig) -> Self {
        Self {
            provider,
            lookback_days: config.lookback_days,
        }
    }

    pub fn with_lookback(mut self, days: u32) -> Self {
        self.lookback_days = days;
        self
    }

    /// Analyze `symbols` against `allocation` as of today
    pub async fn analyze_risk_exposure(
        &self,
        symbols: &[String],
        allocation: &AllocationTable,
    ) -> RiskAssessment {
        let today = Local::now().date_naive();
        self.analyze_risk_exposure_as_of(symbols, allocation, today)
            .await
    }

    /// Analyze `symbols` against `allocation` with the window ending at `today`
    pub async fn analyze_risk_exposure_as_of(
        &self,
        symbols: &[String],
        allocation: &AllocationTable,
        today: NaiveDate,
    ) -> RiskAssessment {
        match self.assess(symbols, allocation, today).await {
            Ok(assessment) => assessment,
            Err(e) => {
                error!("Error in risk exposure analysis: {e}");
                RiskAssessment::unavailable(e.to_string())
            }
        }
    }

    async fn assess(
        &self,
        symbols: &[String],
        allocation: &AllocationTable,
        today: NaiveDate,
    ) -> Result<RiskAssessment> {
        let start = today
            .checked_sub_days(Days::new(u64::from(self.lookback_days)))
            .unwrap_or(NaiveDate::MIN);

        let mut histories = Vec::new();
        for symbol in symbols {
            let series = match self.provider.time_series(symbol, Interval::Daily).await {
                Ok(series) => series.between(start, today),
                Err(e) => {
                    error!(%symbol, "Error fetching data: {e}");
                    PriceSeries::new(symbol.as_str())
                }
            };

            if series.is_empty() {
                warn!(%symbol, "No data available, skipping");
                continue;
            }
            histories.push((symbol.clone(), series));
        }

        if histories.is_empty() {
            return Ok(RiskAssessment::unavailable(NO_DATA_MESSAGE));
        }

        let names: Vec<String> = histories.iter().map(|(s, _)| s.clone()).collect();

        let Some(allocation_pct) = allocation_percentage(&allocation.weights, &names) else {
            return Ok(RiskAssessment::unavailable(
                "Total portfolio weight must be positive.",
            ));
        };
        let Some(previous_pct) = allocation_percentage(allocation.previous_or_current(), &names)
        else {
            return Ok(RiskAssessment::unavailable(
                "Total previous-day portfolio weight must be positive.",
            ));
        };

        let series: Vec<&PriceSeries> = histories.iter().map(|(_, s)| s).collect();
        let prices = aligned_closes(&series);
        let returns = daily_returns(&prices);
        if returns.iter().any(|r| !r.is_finite()) {
            return Ok(RiskAssessment::unavailable(
                "Non-finite returns; a close price is zero.",
            ));
        }
        debug!(rows = returns.nrows(), symbols = names.len(), "Computed daily returns");

        let weights = Array1::from_iter(names.iter().map(|symbol| {
            allocation.weight(symbol).unwrap_or_else(|| {
                warn!(%symbol, "No allocation weight, using 0");
                0.0
            })
        }));

        let correlation = correlation_matrix(&returns);
        let (largest_change_stock, largest_change_value) = self.largest_change(&histories).await;

        info!(
            symbols = names.len(),
            observations = returns.nrows(),
            "Risk exposure analyzed"
        );

        Ok(RiskAssessment::Report(RiskReport {
            observations: returns.nrows(),
            correlation_matrix: labelled(&names, &correlation),
            portfolio_risk: portfolio_risk(&returns, &weights),
            largest_change_stock,
            largest_change_value,
            allocation_percentage: allocation_pct,
            previous_day_allocation_percentage: previous_pct,
            symbols: names,
            as_of: today,
        }))
    }

    /// Symbol with the largest absolute move from its last close to its latest quote
    async fn largest_change(&self, histories: &[(String, PriceSeries)]) -> (Option<String>, Option<f64>) {
        let mut largest: Option<(String, f64)> = None;

        for (symbol, series) in histories {
            let price = match self.provider.global_quote(symbol).await {
                Ok(quote) => quote.and_then(|q| q.price),
                Err(e) => {
                    warn!(%symbol, "Error fetching quote: {e}");
                    None
                }
            };
            let (Some(price), Some(close)) = (price, series.last_close()) else {
                continue;
            };

            let change = price - close;
            if largest.as_ref().is_none_or(|(_, best)| change.abs() > best.abs()) {
                largest = Some((symbol.clone(), change));
            }
        }

        match largest {
            Some((symbol, change)) => (Some(symbol), Some(change)),
            None => (None, None),
        }
    }
}

/// Closes on the trading days every series shares; one column per series
pub fn aligned_closes(series: &[&PriceSeries]) -> Array2<f64> {
    let Some((first, rest)) = series.split_first() else {
        return Array2::zeros((0, 0));
    };

    let common: BTreeSet<NaiveDate> = first
        .dates()
        .filter(|date| rest.iter().all(|s| s.close_on(**date).is_some()))
        .copied()
        .collect();

    let mut prices = Array2::zeros((common.len(), series.len()));
    for (row, date) in common.iter().enumerate() {
        for (col, s) in series.iter().enumerate() {
            prices[[row, col]] = s.close_on(*date).unwrap_or(f64::NAN);
        }
    }
    prices
}

/// Day-over-day percentage returns; one row fewer than `prices`
pub fn daily_returns(prices: &Array2<f64>) -> Array2<f64> {
    if prices.nrows() < 2 {
        return Array2::zeros((0, prices.ncols()));
    }
    &prices.slice(s![1.., ..]) / &prices.slice(s![..-1, ..]) - 1.0
}

/// Pearson correlation of the columns of `returns`
///
/// The diagonal is always 1. Pairs involving a zero-variance column, or any
/// pair when there are fewer than two rows, are 0.
pub fn correlation_matrix(returns: &Array2<f64>) -> Array2<f64> {
    let n = returns.nrows();
    let k = returns.ncols();
    let mut corr = Array2::eye(k);

    let Some(mean) = returns.mean_axis(Axis(0)) else {
        return corr;
    };
    if n < 2 {
        return corr;
    }

    let centered = returns - &mean;
    let cov = centered.t().dot(&centered) / (n - 1) as f64;
    let std: Vec<f64> = (0..k).map(|i| cov[[i, i]].sqrt()).collect();

    for i in 0..k {
        for j in (i + 1)..k {
            let value = if std[i] > 0.0 && std[j] > 0.0 {
                (cov[[i, j]] / (std[i] * std[j])).clamp(-1.0, 1.0)
            } else {
                0.0
            };
            corr[[i, j]] = value;
            corr[[j, i]] = value;
        }
    }
    corr
}

/// Sample standard deviation of the weighted portfolio return
pub fn portfolio_risk(returns: &Array2<f64>, weights: &Array1<f64>) -> Option<f64> {
    if returns.nrows() < 2 {
        return None;
    }
    let portfolio = returns.dot(weights);
    Some(portfolio.std(1.0))
}

fn labelled(names: &[String], matrix: &Array2<f64>) -> BTreeMap<String, BTreeMap<String, f64>> {
    names
        .iter()
        .enumerate()
        .map(|(i, row)| {
            let cols = names
                .iter()
                .enumerate()
                .map(|(j, col)| (col.clone(), matrix[[i, j]]))
                .collect();
            (row.clone(), cols)
        })
        .collect()
}
