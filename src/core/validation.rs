use super::error::ProjectionError;
use super::types::{
    AllocationSpec, FundAllocation, GlobalAssumptions, Person, PersonId, RetirementScenario,
    Scenario, WithdrawalStrategyKind,
};

pub const MAX_PROJECTION_YEARS: u32 = 100;
const RATE_MIN: f64 = -0.05;
const RATE_MAX: f64 = 0.20;
const RETURN_MIN: f64 = -0.95;
const RETURN_MAX: f64 = 2.5;

fn check_rate(name: &'static str, value: f64, min: f64, max: f64) -> Result<(), ProjectionError> {
    if !value.is_finite() || value < min || value > max {
        return Err(ProjectionError::RateOutOfRange {
            name,
            value,
            min,
            max,
        });
    }
    Ok(())
}

fn check_amount(person: &'static str, field: &'static str, value: f64) -> Result<(), ProjectionError> {
    if !value.is_finite() || value < 0.0 {
        return Err(ProjectionError::NegativeAmount {
            person,
            field,
            value,
        });
    }
    Ok(())
}

pub fn validate_allocation(weights: &FundAllocation) -> Result<(), ProjectionError> {
    if weights.is_empty() {
        return Err(ProjectionError::InvalidAllocation {
            reason: "allocation has no funds".to_string(),
        });
    }
    if let Some((fund, w)) = weights.iter().find(|(_, w)| !w.is_finite() || **w < 0.0) {
        return Err(ProjectionError::InvalidAllocation {
            reason: format!("weight for {fund} must be >= 0, got {w}"),
        });
    }
    let total: f64 = weights.values().sum();
    if (total - 1.0).abs() > 1e-6 {
        return Err(ProjectionError::InvalidAllocation {
            reason: format!("weights must sum to 1, got {total}"),
        });
    }
    Ok(())
}

fn validate_person(
    id: PersonId,
    person: &Person,
    retirement: &RetirementScenario,
) -> Result<(), ProjectionError> {
    let label = id.label();
    if person.hire_date < person.birth_date {
        return Err(ProjectionError::HireBeforeBirth {
            person: label,
            hire: person.hire_date,
            birth: person.birth_date,
        });
    }
    if retirement.retirement_date < person.hire_date {
        return Err(ProjectionError::RetirementBeforeHire {
            person: label,
            retirement: retirement.retirement_date,
            hire: person.hire_date,
        });
    }
    check_amount(label, "currentSalary", person.current_salary)?;
    check_amount(label, "traditionalBalance", person.traditional_balance)?;
    check_amount(label, "rothBalance", person.roth_balance)?;
    check_amount(label, "benefitAt62", person.benefit_at_62)?;
    check_amount(label, "benefitAtFullAge", person.benefit_at_full_age)?;
    check_amount(label, "benefitAt70", person.benefit_at_70)?;
    if let Some(high_three) = person.high_three_salary {
        check_amount(label, "highThreeSalary", high_three)?;
    }
    check_rate("contribution rate", person.contribution_rate, 0.0, 1.0)?;

    let election = person.survivor_election;
    if ![0.0, 0.25, 0.5].iter().any(|v| (election - v).abs() < 1e-9) {
        return Err(ProjectionError::InvalidSurvivorElection {
            person: label,
            value: election,
        });
    }

    if !(62..=70).contains(&retirement.claiming_age) {
        return Err(ProjectionError::InvalidClaimingAge {
            person: label,
            age: retirement.claiming_age,
        });
    }

    match retirement.withdrawal {
        WithdrawalStrategyKind::FixedRealRate { initial_rate } => {
            check_rate("initial withdrawal rate", initial_rate, 0.0, 1.0)?
        }
        WithdrawalStrategyKind::NeedBased { target_monthly } => {
            check_amount(label, "targetMonthly", target_monthly)?
        }
        WithdrawalStrategyKind::VariablePercentage { rate } => {
            check_rate("withdrawal percentage", rate, 0.0, 1.0)?
        }
    }

    if let Some(AllocationSpec::Fixed { weights }) = &person.allocation {
        validate_allocation(weights)?;
    }
    Ok(())
}

/// Precondition checks run before the first projection year.
pub fn validate_inputs(
    person_a: &Person,
    person_b: &Person,
    scenario: &Scenario,
    assumptions: &GlobalAssumptions,
) -> Result<(), ProjectionError> {
    validate_person(PersonId::A, person_a, &scenario.person_a)?;
    validate_person(PersonId::B, person_b, &scenario.person_b)?;

    if assumptions.projection_years == 0 || assumptions.projection_years > MAX_PROJECTION_YEARS {
        return Err(ProjectionError::InvalidHorizon {
            years: assumptions.projection_years,
            max: MAX_PROJECTION_YEARS,
        });
    }

    check_rate("inflation rate", assumptions.inflation_rate, RATE_MIN, RATE_MAX)?;
    check_rate("COLA rate", assumptions.cola_rate, RATE_MIN, RATE_MAX)?;
    check_rate("salary growth rate", assumptions.salary_growth(), RATE_MIN, RATE_MAX)?;
    check_rate(
        "health premium inflation",
        assumptions.health_premium_inflation,
        -0.5,
        1.0,
    )?;
    check_rate(
        "pre-retirement return",
        assumptions.pre_retirement_return,
        RETURN_MIN,
        RETURN_MAX,
    )?;
    check_rate(
        "post-retirement return",
        assumptions.post_retirement_return,
        RETURN_MIN,
        RETURN_MAX,
    )?;

    let factor = scenario.mortality.survivor_spending_factor;
    if !factor.is_finite() || factor <= 0.0 || factor > 1.0 {
        return Err(ProjectionError::RateOutOfRange {
            name: "survivor spending factor",
            value: factor,
            min: 0.0,
            max: 1.0,
        });
    }

    if let Some(weights) = &assumptions.default_allocation {
        validate_allocation(weights)?;
    }
    Ok(())
}
