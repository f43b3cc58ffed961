use serde::{Deserialize, Serialize};

use super::engine::ProjectionEngine;
use super::error::{ProjectionError, SolverError};
use super::types::{AnnualCashFlow, GlobalAssumptions, Person, Scenario, WithdrawalStrategyKind};

/// Net income in 1-based `year` of a projection.
pub fn net_income_at_year(rows: &[AnnualCashFlow], year: u32) -> Result<f64, ProjectionError> {
    row_at_year(rows, year).map(|row| row.net_income)
}

pub fn balance_at_year(rows: &[AnnualCashFlow], year: u32) -> Result<f64, ProjectionError> {
    row_at_year(rows, year).map(|row| row.total_balance)
}

fn row_at_year(rows: &[AnnualCashFlow], year: u32) -> Result<&AnnualCashFlow, ProjectionError> {
    year.checked_sub(1)
        .and_then(|idx| rows.get(idx as usize))
        .ok_or(ProjectionError::HorizonExceeded {
            requested: year,
            horizon: rows.len() as u32,
        })
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Crossover {
    /// 1-based year in which the alternative pulls ahead.
    pub year: u32,
    pub calendar_year: i32,
    /// Years from the projection start to the interpolated crossing point.
    pub elapsed_years: f64,
    pub baseline_cumulative: f64,
    pub alternative_cumulative: f64,
}

/// First year the alternative's cumulative net income catches up with the
/// baseline's after having trailed it.
pub fn cumulative_income_crossover(
    baseline: &[AnnualCashFlow],
    alternative: &[AnnualCashFlow],
) -> Option<Crossover> {
    let mut base_total = 0.0;
    let mut alt_total = 0.0;
    let mut previous_gap: Option<f64> = None;

    for (idx, (base, alt)) in baseline.iter().zip(alternative).enumerate() {
        base_total += base.net_income;
        alt_total += alt.net_income;
        let gap = alt_total - base_total;
        if let Some(prev) = previous_gap {
            if prev < 0.0 && gap >= 0.0 {
                let within = prev / (prev - gap);
                return Some(Crossover {
                    year: idx as u32 + 1,
                    calendar_year: alt.calendar_year,
                    elapsed_years: idx as f64 + within,
                    baseline_cumulative: base_total,
                    alternative_cumulative: alt_total,
                });
            }
        }
        previous_gap = Some(gap);
    }
    None
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BreakEvenConfig {
    /// 1-based year the balance has to last through.
    pub target_year: u32,
    /// Balance that counts as surviving; the starting household balance when absent.
    pub required_balance: Option<f64>,
    pub search_min: f64,
    pub search_max: f64,
    pub tolerance: f64,
    pub max_iterations: u32,
}

impl Default for BreakEvenConfig {
    fn default() -> Self {
        Self {
            target_year: 30,
            required_balance: None,
            search_min: 0.0,
            search_max: 0.25,
            tolerance: 1e-4,
            max_iterations: 50,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BreakEvenIteration {
    pub iteration: u32,
    pub lower_bound: f64,
    pub upper_bound: f64,
    pub candidate_rate: f64,
    pub balance_at_target: f64,
    pub survives: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BreakEvenResult {
    pub target_year: u32,
    pub required_balance: f64,
    pub search_min: f64,
    pub search_max: f64,
    pub tolerance: f64,
    pub max_iterations: u32,
    pub solved_rate: Option<f64>,
    pub balance_at_target: Option<f64>,
    pub iterations: Vec<BreakEvenIteration>,
    pub converged: bool,
    pub feasible: bool,
    pub message: String,
}

#[derive(Debug, Clone, Copy)]
struct CandidateEval {
    balance_at_target: f64,
    survives: bool,
}

/// Largest variable-percentage withdrawal rate, applied to both people, whose
/// household balance at the target year is still at least the required balance.
pub fn break_even_withdrawal_rate(
    engine: &ProjectionEngine,
    person_a: &Person,
    person_b: &Person,
    scenario: &Scenario,
    assumptions: &GlobalAssumptions,
    config: BreakEvenConfig,
) -> Result<BreakEvenResult, SolverError> {
    validate_config(assumptions, config)?;
    let required_balance = config
        .required_balance
        .unwrap_or_else(|| person_a.total_balance() + person_b.total_balance());

    let evaluate = |rate: f64| -> Result<CandidateEval, SolverError> {
        let mut candidate = scenario.clone();
        candidate.person_a.withdrawal = WithdrawalStrategyKind::VariablePercentage { rate };
        candidate.person_b.withdrawal = WithdrawalStrategyKind::VariablePercentage { rate };
        let rows = engine.project(person_a, person_b, &candidate, assumptions)?;
        let balance_at_target = balance_at_year(&rows, config.target_year)?;
        Ok(CandidateEval {
            balance_at_target,
            survives: balance_at_target + 1e-9 >= required_balance,
        })
    };

    let mut iterations = Vec::with_capacity(config.max_iterations as usize);
    let low_eval = evaluate(config.search_min)?;
    let high_eval = evaluate(config.search_max)?;

    let mut solved = None;
    let mut converged = false;
    let feasible;
    let message;

    if !low_eval.survives {
        feasible = false;
        message = "Balance does not survive even at the lower rate bound.".to_string();
    } else if high_eval.survives {
        solved = Some((config.search_max, high_eval.balance_at_target));
        converged = true;
        feasible = true;
        message = "Balance survives at the upper rate bound.".to_string();
    } else {
        feasible = true;
        let mut lo = (config.search_min, low_eval.balance_at_target);
        let mut hi = config.search_max;
        let mut it = 0;
        while it < config.max_iterations {
            it += 1;
            let mid = (lo.0 + hi) * 0.5;
            let eval = evaluate(mid)?;
            iterations.push(BreakEvenIteration {
                iteration: it,
                lower_bound: lo.0,
                upper_bound: hi,
                candidate_rate: mid,
                balance_at_target: eval.balance_at_target,
                survives: eval.survives,
            });
            if eval.survives {
                lo = (mid, eval.balance_at_target);
            } else {
                hi = mid;
            }
            if hi - lo.0 <= config.tolerance {
                converged = true;
                break;
            }
        }
        solved = Some(lo);
        message = if converged {
            "Converged within tolerance.".to_string()
        } else {
            "Reached max iterations before converging.".to_string()
        };
    }

    Ok(BreakEvenResult {
        target_year: config.target_year,
        required_balance,
        search_min: config.search_min,
        search_max: config.search_max,
        tolerance: config.tolerance,
        max_iterations: config.max_iterations,
        solved_rate: solved.map(|(rate, _)| rate),
        balance_at_target: solved.map(|(_, balance)| balance),
        iterations,
        converged,
        feasible,
        message,
    })
}

fn validate_config(assumptions: &GlobalAssumptions, config: BreakEvenConfig) -> Result<(), SolverError> {
    if config.target_year == 0 || config.target_year > assumptions.projection_years {
        return Err(ProjectionError::HorizonExceeded {
            requested: config.target_year,
            horizon: assumptions.projection_years,
        }
        .into());
    }
    if !config.search_min.is_finite() || !config.search_max.is_finite() {
        return Err(SolverError::InvalidConfig("search bounds must be finite".to_string()));
    }
    if config.search_min < 0.0 || config.search_max > 1.0 {
        return Err(SolverError::InvalidConfig(
            "search bounds must lie within [0, 1]".to_string(),
        ));
    }
    if config.search_max <= config.search_min {
        return Err(SolverError::InvalidConfig(
            "searchMax must be greater than searchMin".to_string(),
        ));
    }
    if !config.tolerance.is_finite() || config.tolerance <= 0.0 {
        return Err(SolverError::InvalidConfig("tolerance must be > 0".to_string()));
    }
    if config.max_iterations == 0 {
        return Err(SolverError::InvalidConfig("maxIterations must be > 0".to_string()));
    }
    if let Some(required) = config.required_balance {
        if !required.is_finite() || required < 0.0 {
            return Err(SolverError::InvalidConfig(
                "requiredBalance must be finite and >= 0".to_string(),
            ));
        }
    }
    Ok(())
}
