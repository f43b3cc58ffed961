use std::collections::BTreeSet;
use std::sync::Arc;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::engine::ProjectionEngine;
use super::error::SimulationError;
use super::market::{
    MarketCondition, MarketDataProvider, Series, TSP_FUNDS, blended_return,
    builtin_default_allocation, builtin_params, normalize_allocation,
};
use super::rng::{ClockSeed, SeedSource, SimRng, derive_seed};
use super::types::{
    AllocationSpec, AnnualCashFlow, DistributionParams, FundReturns, GlobalAssumptions, Person,
    Scenario,
};
use super::validation::validate_inputs;

const DEFAULT_WORKERS: usize = 10;
const SIGMA_LIMIT: f64 = 3.0;

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SamplingMode {
    Historical,
    #[default]
    Statistical,
}

/// What a run that errored contributes to the aggregate.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FailedRunPolicy {
    /// Keep a zero-valued outcome in the failed run's slot.
    #[default]
    CountAsFailure,
    /// Drop the run from every denominator.
    Exclude,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MonteCarloConfig {
    pub workers: usize,
    pub failed_run_policy: FailedRunPolicy,
    /// Net-income metrics above this are treated as calculation outliers.
    pub max_income_clamp: f64,
    /// Draw the inflation, COLA and health-premium years independently of the fund year.
    pub independent_series: bool,
    /// Historical perturbation, as a share of each series' standard deviation.
    pub historical_perturbation: f64,
}

impl Default for MonteCarloConfig {
    fn default() -> Self {
        Self {
            workers: DEFAULT_WORKERS,
            failed_run_policy: FailedRunPolicy::default(),
            max_income_clamp: 10_000_000.0,
            independent_series: true,
            historical_perturbation: 0.25,
        }
    }
}

/// The fixed inputs every run starts from.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScenarioSet {
    pub person_a: Person,
    pub person_b: Person,
    pub scenario: Scenario,
    pub assumptions: GlobalAssumptions,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationOutcome {
    pub run_index: u32,
    pub condition: Option<MarketCondition>,
    pub first_year_net_income: f64,
    pub min_net_income: f64,
    pub max_net_income: f64,
    pub average_net_income: f64,
    pub ending_balance: f64,
    /// Index of the first year with no balance left, or the horizon.
    pub balance_longevity: u32,
    pub success: bool,
    pub failed: bool,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricSummary {
    pub p10: f64,
    pub p25: f64,
    pub p50: f64,
    pub p75: f64,
    pub p90: f64,
    pub median: f64,
    pub mean: f64,
    pub std_dev: f64,
    pub best: f64,
    pub worst: f64,
}

impl MetricSummary {
    pub fn from_values(values: &mut [f64]) -> Self {
        if values.is_empty() {
            return Self::default();
        }
        values.sort_by(|a, b| a.total_cmp(b));
        let n = values.len() as f64;
        let mean = values.iter().sum::<f64>() / n;
        let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
        Self {
            p10: rank_percentile(values, 0.10),
            p25: rank_percentile(values, 0.25),
            p50: rank_percentile(values, 0.50),
            p75: rank_percentile(values, 0.75),
            p90: rank_percentile(values, 0.90),
            median: rank_percentile(values, 0.50),
            mean,
            std_dev: variance.sqrt(),
            best: values[values.len() - 1],
            worst: values[0],
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationResult {
    pub seed: u64,
    pub sampling_mode: SamplingMode,
    pub run_count: u32,
    pub completed_runs: u32,
    pub failed_runs: u32,
    pub success_rate: f64,
    pub first_year_net_income: MetricSummary,
    pub min_net_income: MetricSummary,
    pub max_net_income: MetricSummary,
    pub average_net_income: MetricSummary,
    pub ending_balance: MetricSummary,
    pub balance_longevity: MetricSummary,
}

/// Value at rank `floor(n * p)` of sorted `values`, without interpolation.
pub fn rank_percentile(sorted: &[f64], p: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let rank = (sorted.len() as f64 * p).floor() as usize;
    sorted[rank.min(sorted.len() - 1)]
}

/// Reduces one projection to its run metrics.
pub fn summarize_run(rows: &[AnnualCashFlow], max_income_clamp: f64) -> SimulationOutcome {
    let clamp = |v: f64| v.clamp(0.0, max_income_clamp.max(0.0));
    let incomes: Vec<f64> = rows.iter().map(|row| clamp(row.net_income)).collect();
    if incomes.is_empty() {
        return SimulationOutcome::default();
    }
    let horizon = rows.len() as u32;
    let balance_longevity = rows
        .iter()
        .position(|row| row.total_balance <= 0.0)
        .map_or(horizon, |idx| idx as u32);

    SimulationOutcome {
        first_year_net_income: incomes[0],
        min_net_income: incomes.iter().copied().fold(f64::INFINITY, f64::min),
        max_net_income: incomes.iter().copied().fold(f64::NEG_INFINITY, f64::max),
        average_net_income: incomes.iter().sum::<f64>() / incomes.len() as f64,
        ending_balance: rows.last().map_or(0.0, |row| row.total_balance),
        balance_longevity,
        success: balance_longevity == horizon,
        ..SimulationOutcome::default()
    }
}

#[derive(Clone)]
pub struct MonteCarloEngine {
    projection: ProjectionEngine,
    config: MonteCarloConfig,
    seed_source: Arc<dyn SeedSource>,
}

impl MonteCarloEngine {
    pub fn new(projection: ProjectionEngine) -> Self {
        let seed_source = Arc::new(ClockSeed(Arc::clone(projection.clock())));
        Self {
            projection,
            config: MonteCarloConfig::default(),
            seed_source,
        }
    }

    pub fn with_config(mut self, config: MonteCarloConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_seed_source(mut self, seed_source: Arc<dyn SeedSource>) -> Self {
        self.seed_source = seed_source;
        self
    }

    pub fn config(&self) -> &MonteCarloConfig {
        &self.config
    }

    pub fn simulate(
        &self,
        set: &ScenarioSet,
        run_count: u32,
        mode: SamplingMode,
        seed: Option<u64>,
    ) -> Result<SimulationResult, SimulationError> {
        let seed = seed.unwrap_or_else(|| self.seed_source.seed());
        let outcomes = self.simulate_outcomes(set, run_count, mode, seed)?;
        let result = aggregate(&outcomes, self.config.failed_run_policy, seed, mode);
        info!(
            runs = result.run_count,
            failed = result.failed_runs,
            success_rate = result.success_rate,
            "monte carlo batch finished"
        );
        Ok(result)
    }

    /// Every run's outcome in run-index order.
    pub fn simulate_outcomes(
        &self,
        set: &ScenarioSet,
        run_count: u32,
        mode: SamplingMode,
        seed: u64,
    ) -> Result<Vec<SimulationOutcome>, SimulationError> {
        if run_count == 0 {
            return Err(SimulationError::NoRuns);
        }
        validate_inputs(&set.person_a, &set.person_b, &set.scenario, &set.assumptions)?;
        if mode == SamplingMode::Historical && self.historical_range().is_none() {
            return Err(SimulationError::HistoricalDataUnavailable);
        }

        let workers = self.config.workers.max(1);
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .build()
            .map_err(|err| SimulationError::WorkerPool(err.to_string()))?;
        info!(runs = run_count, workers, ?mode, seed, "monte carlo batch started");

        let funds = self.sampled_funds(set);
        let outcomes = pool.install(|| {
            (0..run_count)
                .into_par_iter()
                .map(|run_index| self.run_once(set, &funds, mode, seed, run_index))
                .collect::<Vec<_>>()
        });
        Ok(outcomes)
    }

    fn run_once(
        &self,
        set: &ScenarioSet,
        funds: &[String],
        mode: SamplingMode,
        base_seed: u64,
        run_index: u32,
    ) -> SimulationOutcome {
        let mut rng = SimRng::seeded(derive_seed(base_seed, u64::from(run_index)));
        let result = self
            .sample_condition(&mut rng, funds, mode, &set.assumptions)
            .and_then(|condition| {
                let assumptions = run_assumptions(&set.assumptions, &condition);
                let rows = self.projection.project(
                    &set.person_a,
                    &set.person_b,
                    &set.scenario,
                    &assumptions,
                )?;
                Ok((condition, rows))
            });

        match result {
            Ok((condition, rows)) => {
                let mut outcome = summarize_run(&rows, self.config.max_income_clamp);
                outcome.run_index = run_index;
                outcome.condition = Some(condition);
                debug!(
                    run_index,
                    success = outcome.success,
                    ending_balance = outcome.ending_balance,
                    "run finished"
                );
                outcome
            }
            Err(err) => {
                warn!(run_index, error = %err, "monte carlo run failed");
                SimulationOutcome {
                    run_index,
                    failed: true,
                    ..SimulationOutcome::default()
                }
            }
        }
    }

    fn market(&self) -> Option<&dyn MarketDataProvider> {
        self.projection.market_data().map(|m| m.as_ref())
    }

    fn historical_range(&self) -> Option<(i32, i32)> {
        self.market()?.available_year_range()
    }

    /// The TSP funds plus every fund named by the configuration or the data.
    fn sampled_funds(&self, set: &ScenarioSet) -> Vec<String> {
        let mut funds: BTreeSet<String> = TSP_FUNDS.iter().map(|f| f.to_string()).collect();
        funds.extend(set.assumptions.fund_distributions.keys().cloned());
        if let Some(weights) = &set.assumptions.default_allocation {
            funds.extend(weights.keys().cloned());
        }
        for person in [&set.person_a, &set.person_b] {
            if let Some(AllocationSpec::Fixed { weights }) = &person.allocation {
                funds.extend(weights.keys().cloned());
            }
        }
        if let Some(market) = self.market() {
            funds.extend(market.fund_names());
        }
        funds.into_iter().collect()
    }

    fn params(&self, series: Series<'_>, assumptions: &GlobalAssumptions) -> DistributionParams {
        if let Series::Fund(fund) = series {
            if let Some(params) = assumptions.fund_distributions.get(fund) {
                return *params;
            }
        }
        match self.market() {
            Some(market) => market.statistical_params(series),
            None => builtin_params(series),
        }
    }

    fn sample_condition(
        &self,
        rng: &mut SimRng,
        funds: &[String],
        mode: SamplingMode,
        assumptions: &GlobalAssumptions,
    ) -> Result<MarketCondition, SimulationError> {
        match mode {
            SamplingMode::Statistical => {
                let mut draw = |series: Series<'_>| {
                    let params = self.params(series, assumptions);
                    params.mean + params.std_dev * rng.clamped_normal(SIGMA_LIMIT)
                };
                let fund_returns: FundReturns = funds
                    .iter()
                    .map(|fund| (fund.clone(), draw(Series::Fund(fund))))
                    .collect();
                Ok(MarketCondition {
                    year: None,
                    fund_returns,
                    inflation: draw(Series::Inflation),
                    cola: draw(Series::Cola),
                    health_premium_inflation: draw(Series::HealthPremiumInflation),
                })
            }
            SamplingMode::Historical => {
                let market = self
                    .market()
                    .ok_or(SimulationError::HistoricalDataUnavailable)?;
                let (first, last) = market
                    .available_year_range()
                    .ok_or(SimulationError::HistoricalDataUnavailable)?;
                let span = (last - first + 1).max(1) as usize;
                // One year for every fund; the rate series may draw their own.
                let fund_year = first + rng.index(span) as i32;
                let mut rate_year = || {
                    if self.config.independent_series {
                        first + rng.index(span) as i32
                    } else {
                        fund_year
                    }
                };
                let (inflation_year, cola_year, health_year) =
                    (rate_year(), rate_year(), rate_year());
                let perturbation = self.config.historical_perturbation;

                let mut draw = |series: Series<'_>, year: i32| {
                    let params = self.params(series, assumptions);
                    let value = market
                        .historical_return(series, year)
                        .unwrap_or(params.mean);
                    value + params.std_dev * perturbation * rng.clamped_normal(SIGMA_LIMIT)
                };
                let fund_returns: FundReturns = funds
                    .iter()
                    .map(|fund| (fund.clone(), draw(Series::Fund(fund), fund_year)))
                    .collect();
                Ok(MarketCondition {
                    year: Some(fund_year),
                    fund_returns,
                    inflation: draw(Series::Inflation, inflation_year),
                    cola: draw(Series::Cola, cola_year),
                    health_premium_inflation: draw(Series::HealthPremiumInflation, health_year),
                })
            }
        }
    }
}

/// A run's private assumptions: sampled rates, the sampled fund returns as
/// overrides, and their blend as the flat pre/post-retirement return.
fn run_assumptions(base: &GlobalAssumptions, condition: &MarketCondition) -> GlobalAssumptions {
    let mut assumptions = base.clone();
    assumptions.inflation_rate = condition.inflation;
    assumptions.cola_rate = condition.cola;
    assumptions.health_premium_inflation = condition.health_premium_inflation;

    let allocation = normalize_allocation(
        &base
            .default_allocation
            .clone()
            .unwrap_or_else(builtin_default_allocation),
    );
    let blended = blended_return(&allocation, &condition.fund_returns, |fund| {
        base.fund_distributions
            .get(fund)
            .map_or_else(|| builtin_params(Series::Fund(fund)).mean, |p| p.mean)
    });
    assumptions.pre_retirement_return = blended;
    assumptions.post_retirement_return = blended;
    assumptions.fund_return_overrides = Some(condition.fund_returns.clone());
    assumptions
}

fn aggregate(
    outcomes: &[SimulationOutcome],
    policy: FailedRunPolicy,
    seed: u64,
    mode: SamplingMode,
) -> SimulationResult {
    let failed_runs = outcomes.iter().filter(|o| o.failed).count() as u32;
    let counted: Vec<&SimulationOutcome> = match policy {
        FailedRunPolicy::CountAsFailure => outcomes.iter().collect(),
        FailedRunPolicy::Exclude => outcomes.iter().filter(|o| !o.failed).collect(),
    };
    let successes = counted.iter().filter(|o| o.success).count();
    let success_rate = if counted.is_empty() {
        0.0
    } else {
        successes as f64 / counted.len() as f64
    };

    let summary = |metric: fn(&SimulationOutcome) -> f64| {
        let mut values: Vec<f64> = counted.iter().map(|o| metric(o)).collect();
        MetricSummary::from_values(&mut values)
    };

    SimulationResult {
        seed,
        sampling_mode: mode,
        run_count: outcomes.len() as u32,
        completed_runs: outcomes.len() as u32 - failed_runs,
        failed_runs,
        success_rate,
        first_year_net_income: summary(|o| o.first_year_net_income),
        min_net_income: summary(|o| o.min_net_income),
        max_net_income: summary(|o| o.max_net_income),
        average_net_income: summary(|o| o.average_net_income),
        ending_balance: summary(|o| o.ending_balance),
        balance_longevity: summary(|o| f64::from(o.balance_longevity)),
    }
}
