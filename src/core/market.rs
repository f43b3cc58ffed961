use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::types::{DistributionParams, FundAllocation, FundReturns};

/// One sampled set of economic conditions, held constant across a run.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketCondition {
    /// Calendar year the fund returns were drawn from, when sampled historically.
    pub year: Option<i32>,
    pub fund_returns: FundReturns,
    pub inflation: f64,
    pub cola: f64,
    pub health_premium_inflation: f64,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Series<'a> {
    Fund(&'a str),
    Inflation,
    Cola,
    HealthPremiumInflation,
}

pub const TSP_FUNDS: [&str; 5] = ["G", "F", "C", "S", "I"];

/// Long-run means and deviations used when nothing more specific is configured.
pub fn builtin_params(series: Series<'_>) -> DistributionParams {
    let (mean, std_dev) = match series {
        Series::Fund("G") => (0.030, 0.010),
        Series::Fund("F") => (0.045, 0.055),
        Series::Fund("C") => (0.105, 0.170),
        Series::Fund("S") => (0.110, 0.200),
        Series::Fund("I") => (0.070, 0.180),
        Series::Fund(_) => (0.060, 0.120),
        Series::Inflation => (0.030, 0.013),
        Series::Cola => (0.028, 0.015),
        Series::HealthPremiumInflation => (0.055, 0.030),
    };
    DistributionParams { mean, std_dev }
}

pub fn builtin_default_allocation() -> FundAllocation {
    [("G", 0.10), ("F", 0.10), ("C", 0.40), ("S", 0.20), ("I", 0.20)]
        .into_iter()
        .map(|(fund, weight)| (fund.to_string(), weight))
        .collect()
}

/// Read-only access to already-loaded market history.
pub trait MarketDataProvider: Send + Sync {
    fn historical_return(&self, series: Series<'_>, year: i32) -> Option<f64>;

    fn available_year_range(&self) -> Option<(i32, i32)>;

    fn fund_names(&self) -> Vec<String>;

    fn statistical_params(&self, series: Series<'_>) -> DistributionParams {
        builtin_params(series)
    }
}

/// Per-series calendar-year values, as handed over by the data loader.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HistoricalData {
    pub funds: BTreeMap<String, BTreeMap<i32, f64>>,
    pub inflation: BTreeMap<i32, f64>,
    pub cola: BTreeMap<i32, f64>,
    pub health_premium_inflation: BTreeMap<i32, f64>,
}

impl HistoricalData {
    fn series(&self, series: Series<'_>) -> Option<&BTreeMap<i32, f64>> {
        match series {
            Series::Fund(name) => self.funds.get(name),
            Series::Inflation => Some(&self.inflation),
            Series::Cola => Some(&self.cola),
            Series::HealthPremiumInflation => Some(&self.health_premium_inflation),
        }
    }
}

impl MarketDataProvider for HistoricalData {
    fn historical_return(&self, series: Series<'_>, year: i32) -> Option<f64> {
        self.series(series)?.get(&year).copied()
    }

    fn available_year_range(&self) -> Option<(i32, i32)> {
        let all = self
            .funds
            .values()
            .chain([&self.inflation, &self.cola, &self.health_premium_inflation]);
        let mut range: Option<(i32, i32)> = None;
        for series in all {
            if let (Some((&first, _)), Some((&last, _))) =
                (series.first_key_value(), series.last_key_value())
            {
                range = Some(match range {
                    Some((lo, hi)) => (lo.min(first), hi.max(last)),
                    None => (first, last),
                });
            }
        }
        range
    }

    fn fund_names(&self) -> Vec<String> {
        self.funds.keys().cloned().collect()
    }
}

/// Target-date fund allocations over time.
pub trait FundAllocationProvider: Send + Sync {
    fn allocation_at(&self, fund: &str, date: NaiveDate) -> Option<FundAllocation>;
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GlidePathRow {
    pub effective: NaiveDate,
    pub weights: FundAllocation,
}

/// In-memory glide paths. Each fund's rows are looked up as a step function.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GlidePathTable {
    pub funds: BTreeMap<String, Vec<GlidePathRow>>,
}

impl GlidePathTable {
    pub fn insert(&mut self, fund: &str, effective: NaiveDate, weights: FundAllocation) {
        let rows = self.funds.entry(fund.to_string()).or_default();
        rows.push(GlidePathRow { effective, weights });
        rows.sort_by_key(|row| row.effective);
    }
}

impl FundAllocationProvider for GlidePathTable {
    fn allocation_at(&self, fund: &str, date: NaiveDate) -> Option<FundAllocation> {
        let rows = self.funds.get(fund)?;
        rows.iter()
            .take_while(|row| row.effective <= date)
            .last()
            .or_else(|| rows.first())
            .map(|row| normalize_allocation(&row.weights))
    }
}

/// Rescales weights to sum to 1; empty or all-zero allocations stay empty.
pub fn normalize_allocation(weights: &FundAllocation) -> FundAllocation {
    let total: f64 = weights.values().map(|w| w.max(0.0)).sum();
    if total <= 0.0 {
        return FundAllocation::new();
    }
    weights
        .iter()
        .map(|(fund, w)| (fund.clone(), w.max(0.0) / total))
        .collect()
}

/// Weighted return over an allocation. Funds without a supplied return use `fallback`.
pub fn blended_return<F>(allocation: &FundAllocation, returns: &FundReturns, fallback: F) -> f64
where
    F: Fn(&str) -> f64,
{
    allocation
        .iter()
        .map(|(fund, weight)| weight * returns.get(fund).copied().unwrap_or_else(|| fallback(fund)))
        .sum()
}
