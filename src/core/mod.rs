mod benefits;
mod dates;
mod engine;
mod error;
mod market;
mod monte_carlo;
mod mortality;
mod pension;
mod rmd;
mod rng;
mod solver;
mod tax;
mod types;
mod validation;
mod withdrawal;

pub use benefits::{
    benefit_at_claiming_age, full_retirement_age_months, own_benefit, survivor_benefit_factor,
};
pub use dates::{Clock, FixedClock, SystemClock, age_on, work_fraction};
pub use engine::{ProjectionEngine, agency_contribution_rate, project};
pub use error::{ProjectionError, SimulationError, SolverError};
pub use market::{
    FundAllocationProvider, GlidePathRow, GlidePathTable, HistoricalData, MarketCondition,
    MarketDataProvider, Series, TSP_FUNDS,
};
pub use monte_carlo::{
    FailedRunPolicy, MetricSummary, MonteCarloConfig, MonteCarloEngine, SamplingMode,
    ScenarioSet, SimulationOutcome, SimulationResult, rank_percentile, summarize_run,
};
pub use mortality::{DeathEvent, resolve_death};
pub use pension::{PensionAmounts, fers_cola, fers_supplement, pension};
pub use rmd::{required_minimum_distribution, rmd_start_age};
pub use rng::{ClockSeed, FixedSeed, SeedSource};
pub use solver::{
    BreakEvenConfig, BreakEvenIteration, BreakEvenResult, Crossover, balance_at_year,
    break_even_withdrawal_rate, cumulative_income_crossover, net_income_at_year,
};
pub use tax::{IncomeComponents, SimplifiedTaxRules, TaxRules};
pub use types::{
    AllocationSpec, AnnualCashFlow, BalanceTransfer, DistributionParams, FilingStatus,
    FilingSwitchTiming, FundAllocation, FundReturns, GlobalAssumptions, MortalityAssumptions,
    MortalitySpec, Person, PersonId, PersonYear, RetirementScenario, Scenario, TaxableIncome,
    WithdrawalStrategyKind,
};
pub use validation::{MAX_PROJECTION_YEARS, validate_inputs};
pub use withdrawal::{WithdrawalPolicy, WithdrawalRequest};
