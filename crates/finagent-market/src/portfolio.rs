//! Portfolio allocation table

use crate::error::{MarketError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::info;

/// Environment variable naming a JSON allocation file
pub const PORTFOLIO_ENV: &str = "FINAGENT_PORTFOLIO";

/// Symbol weights for the current portfolio and, optionally, the prior day
///
/// ```json
/// {"weights": {"AAPL": 0.10, "TSM": 0.05}, "previous": {"AAPL": 0.12, "TSM": 0.05}}
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AllocationTable {
    pub weights: BTreeMap<String, f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous: Option<BTreeMap<String, f64>>,
}

impl Default for AllocationTable {
    fn default() -> Self {
        Self::demo()
    }
}

impl AllocationTable {
    pub fn new<I, S>(weights: I) -> Self
    where
        I: IntoIterator<Item = (S, f64)>,
        S: Into<String>,
    {
        Self {
            weights: collect_weights(weights),
            previous: None,
        }
    }

    /// Built-in allocation: a small Asia tech sleeve inside a larger book
    pub fn demo() -> Self {
        Self::new([("AAPL", 0.10), ("TSM", 0.05), ("SSNLF", 0.07), ("OTHER", 0.78)])
    }

    /// Attach the prior day's snapshot
    pub fn with_previous<I, S>(mut self, weights: I) -> Self
    where
        I: IntoIterator<Item = (S, f64)>,
        S: Into<String>,
    {
        self.previous = Some(collect_weights(weights));
        self
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        let table: Self = serde_json::from_str(json)?;
        table.validate()?;
        Ok(table)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path.as_ref())?;
        Self::from_json_str(&json)
    }

    /// Load from the file named by `FINAGENT_PORTFOLIO`, or fall back to [`AllocationTable::demo`]
    pub fn from_env() -> Result<Self> {
        match finagent_utils::optional_env(PORTFOLIO_ENV) {
            Some(path) => {
                info!(%path, "Loading portfolio allocation");
                Self::from_json_file(path)
            }
            None => Ok(Self::demo()),
        }
    }

    /// Every weight must be finite and non-negative
    pub fn validate(&self) -> Result<()> {
        let snapshots = std::iter::once(&self.weights).chain(self.previous.as_ref());
        for weights in snapshots {
            if let Some((symbol, weight)) = weights.iter().find(|(_, w)| !w.is_finite() || **w < 0.0)
            {
                return Err(MarketError::Config(format!(
                    "invalid weight {weight} for {symbol}"
                )));
            }
        }
        Ok(())
    }

    pub fn weight(&self, symbol: &str) -> Option<f64> {
        self.weights.get(symbol).copied()
    }

    pub fn total(&self) -> f64 {
        self.weights.values().sum()
    }

    /// The prior-day snapshot, or the current weights when there is none
    pub fn previous_or_current(&self) -> &BTreeMap<String, f64> {
        self.previous.as_ref().unwrap_or(&self.weights)
    }

    pub fn symbols(&self) -> impl Iterator<Item = &str> {
        self.weights.keys().map(String::as_str)
    }
}

/// Share of `weights` held in `symbols`, in percent; `None` for a non-positive total
pub fn allocation_percentage(weights: &BTreeMap<String, f64>, symbols: &[String]) -> Option<f64> {
    let total: f64 = weights.values().sum();
    if total <= 0.0 {
        return None;
    }
    let subset: f64 = symbols.iter().filter_map(|s| weights.get(s)).sum();
    Some(100.0 * subset / total)
}

fn collect_weights<I, S>(weights: I) -> BTreeMap<String, f64>
where
    I: IntoIterator<Item = (S, f64)>,
    S: Into<String>,
{
    weights.into_iter().map(|(s, w)| (s.into(), w)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_demo_allocation() {
        let table = AllocationTable::default();
        assert_eq!(table.weight("TSM"), Some(0.05));
        assert_eq!(table.weight("MSFT"), None);
        assert_relative_eq!(table.total(), 1.0);
        assert!(table.previous.is_none());
    }

    #[test]
    fn test_from_json() {
        let table = AllocationTable::from_json_str(
            r#"{"weights": {"AAPL": 0.2, "TSM": 0.3}, "previous": {"AAPL": 0.25, "TSM": 0.25}}"#,
        )
        .unwrap();

        assert_eq!(table.weight("AAPL"), Some(0.2));
        assert_eq!(table.previous_or_current().get("AAPL"), Some(&0.25));

        let bare = AllocationTable::from_json_str(r#"{"weights": {"AAPL": 1.0}}"#).unwrap();
        assert_eq!(bare.previous_or_current(), &bare.weights);
    }

    #[test]
    fn test_rejects_negative_weight() {
        let result = AllocationTable::from_json_str(r#"{"weights": {"AAPL": -0.1}}"#);
        assert!(matches!(result, Err(MarketError::Config(_))));
        assert!(AllocationTable::from_json_str("not json").is_err());
    }

    #[test]
    fn test_allocation_percentage() {
        let table = AllocationTable::demo();
        let symbols = vec!["AAPL".to_string(), "TSM".to_string(), "SSNLF".to_string()];

        let pct = allocation_percentage(&table.weights, &symbols).unwrap();
        assert_relative_eq!(pct, 22.0, epsilon = 1e-9);

        let empty = BTreeMap::new();
        assert!(allocation_percentage(&empty, &symbols).is_none());
    }
}
