use std::sync::Arc;

use chrono::{Datelike, NaiveDate};

use super::benefits::{own_benefit, survivor_benefit_factor};
use super::dates::{
    Clock, SystemClock, age_on, birthday_at, dec_31, fraction_before, fraction_from, jan_1,
    work_fraction,
};
use super::error::ProjectionError;
use super::market::{
    FundAllocationProvider, MarketDataProvider, Series, builtin_default_allocation,
    builtin_params, blended_return, normalize_allocation,
};
use super::mortality::{DeathEvent, resolve_death};
use super::pension::{PensionAmounts, fers_cola, fers_supplement, pension};
use super::rmd::{required_minimum_distribution, rmd_start_age};
use super::tax::{IncomeComponents, SimplifiedTaxRules, TaxRules};
use super::types::{
    AllocationSpec, AnnualCashFlow, BalanceTransfer, FilingStatus, FilingSwitchTiming,
    FundAllocation, GlobalAssumptions, Person, PersonId, PersonYear, RetirementScenario,
    Scenario, TaxableIncome, sum_deductions, sum_income,
};
use super::validation::validate_inputs;
use super::withdrawal::{WithdrawalPolicy, WithdrawalRequest};

/// The annual projection engine and the collaborators it was built with.
#[derive(Clone)]
pub struct ProjectionEngine {
    tax_rules: Arc<dyn TaxRules>,
    clock: Arc<dyn Clock>,
    market_data: Option<Arc<dyn MarketDataProvider>>,
    allocations: Option<Arc<dyn FundAllocationProvider>>,
}

impl Default for ProjectionEngine {
    fn default() -> Self {
        Self::new(Arc::new(SimplifiedTaxRules::default()))
    }
}

impl ProjectionEngine {
    pub fn new(tax_rules: Arc<dyn TaxRules>) -> Self {
        Self {
            tax_rules,
            clock: Arc::new(SystemClock),
            market_data: None,
            allocations: None,
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_market_data(mut self, market_data: Arc<dyn MarketDataProvider>) -> Self {
        self.market_data = Some(market_data);
        self
    }

    pub fn with_allocations(mut self, allocations: Arc<dyn FundAllocationProvider>) -> Self {
        self.allocations = Some(allocations);
        self
    }

    pub fn market_data(&self) -> Option<&Arc<dyn MarketDataProvider>> {
        self.market_data.as_ref()
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    pub fn start_year(&self, assumptions: &GlobalAssumptions) -> i32 {
        assumptions
            .start_year
            .unwrap_or_else(|| self.clock.current_year())
    }

    pub fn project(
        &self,
        person_a: &Person,
        person_b: &Person,
        scenario: &Scenario,
        assumptions: &GlobalAssumptions,
    ) -> Result<Vec<AnnualCashFlow>, ProjectionError> {
        validate_inputs(person_a, person_b, scenario, assumptions)?;
        let collaborators = Collaborators {
            tax: self.tax_rules.as_ref(),
            market: self.market_data.as_deref(),
            allocations: self.allocations.as_deref(),
        };
        Ok(run_projection(
            collaborators,
            self.start_year(assumptions),
            person_a,
            person_b,
            scenario,
            assumptions,
        ))
    }
}

/// Projects one scenario with the given tax rules and no market history.
pub fn project(
    person_a: &Person,
    person_b: &Person,
    scenario: &Scenario,
    assumptions: &GlobalAssumptions,
    tax_rules: &dyn TaxRules,
) -> Result<Vec<AnnualCashFlow>, ProjectionError> {
    validate_inputs(person_a, person_b, scenario, assumptions)?;
    let start_year = assumptions
        .start_year
        .unwrap_or_else(|| SystemClock.current_year());
    let collaborators = Collaborators {
        tax: tax_rules,
        market: None,
        allocations: None,
    };
    Ok(run_projection(
        collaborators,
        start_year,
        person_a,
        person_b,
        scenario,
        assumptions,
    ))
}

#[derive(Copy, Clone)]
struct Collaborators<'a> {
    tax: &'a dyn TaxRules,
    market: Option<&'a dyn MarketDataProvider>,
    allocations: Option<&'a dyn FundAllocationProvider>,
}

/// Facts fixed for the whole projection, derived once per person.
struct PersonPlan<'a> {
    person: &'a Person,
    retirement: &'a RetirementScenario,
    pension: PensionAmounts,
    supplement: f64,
    own_benefit: f64,
    claim_date: NaiveDate,
    death: Option<DeathEvent>,
    rmd_start_age: u32,
}

impl<'a> PersonPlan<'a> {
    fn new(
        id: PersonId,
        person: &'a Person,
        scenario: &'a Scenario,
        assumptions: &GlobalAssumptions,
        start_year: i32,
    ) -> Self {
        let retirement = scenario.retirement(id);
        // Grow the high-3 from today's salary to the retirement year.
        let years_to_retirement = (retirement.retirement_date.year() - start_year).max(0);
        let mut at_retirement = person.clone();
        at_retirement.high_three_salary = Some(
            person.high_three() * (1.0 + assumptions.salary_growth()).powi(years_to_retirement),
        );
        let pension = pension(&at_retirement, retirement.retirement_date);
        let supplement = fers_supplement(person, &pension);

        Self {
            person,
            retirement,
            pension,
            supplement,
            own_benefit: own_benefit(person, retirement.claiming_age),
            claim_date: birthday_at(person.birth_date, retirement.claiming_age),
            death: resolve_death(person, scenario.mortality_spec(id), start_year),
            rmd_start_age: rmd_start_age(person.birth_date.year()),
        }
    }

    fn is_dead_by(&self, index: u32) -> bool {
        self.death.is_some_and(|d| d.is_dead_by(index))
    }

    fn dies_in(&self, index: u32) -> Option<DeathEvent> {
        self.death.filter(|d| d.dies_in(index))
    }

    fn had_retired_before_death(&self) -> bool {
        self.death
            .is_some_and(|d| self.retirement.retirement_date < d.date)
    }
}

/// Balances and strategy state carried from one year to the next.
#[derive(Debug, Clone)]
struct PersonState {
    traditional: f64,
    roth: f64,
    pension_cola_factor: f64,
    withdrawals_taken: u32,
    policy: WithdrawalPolicy,
    merged_away: bool,
}

impl PersonState {
    fn new(person: &Person, retirement: &RetirementScenario, assumptions: &GlobalAssumptions) -> Self {
        Self {
            traditional: person.traditional_balance,
            roth: person.roth_balance,
            pension_cola_factor: 1.0,
            withdrawals_taken: 0,
            policy: WithdrawalPolicy::new(retirement.withdrawal, assumptions.inflation_rate),
            merged_away: false,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq)]
enum WorkStatus {
    Working,
    Transition { work_fraction: f64 },
    Retired,
}

impl WorkStatus {
    fn of(retirement: NaiveDate, year: i32) -> Self {
        if retirement.year() > year {
            return WorkStatus::Working;
        }
        if retirement.year() < year {
            return WorkStatus::Retired;
        }
        let fraction = work_fraction(retirement);
        if fraction <= 0.0 {
            WorkStatus::Retired
        } else {
            WorkStatus::Transition {
                work_fraction: fraction,
            }
        }
    }

    fn worked_fraction(self) -> f64 {
        match self {
            WorkStatus::Working => 1.0,
            WorkStatus::Transition { work_fraction } => work_fraction,
            WorkStatus::Retired => 0.0,
        }
    }

    fn retired_fraction(self) -> f64 {
        1.0 - self.worked_fraction()
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum TaxCase {
    Working,
    Transition,
    Retired,
}

/// Per-person amounts that feed taxes and balances but are not reported directly.
#[derive(Copy, Clone, Debug)]
struct PersonFlows {
    status: WorkStatus,
    taxable_withdrawal: f64,
}

struct YearContext<'a> {
    collaborators: Collaborators<'a>,
    assumptions: &'a GlobalAssumptions,
    index: u32,
    year: i32,
    spending_factor: f64,
}

impl YearContext<'_> {
    fn cola_index(&self) -> f64 {
        (1.0 + self.assumptions.cola_rate).powi(self.index as i32)
    }

    fn fund_return(&self, fund: &str) -> f64 {
        if let Some(r) = self
            .assumptions
            .fund_return_overrides
            .as_ref()
            .and_then(|overrides| overrides.get(fund))
        {
            return *r;
        }
        if let Some(r) = self
            .collaborators
            .market
            .and_then(|market| market.historical_return(Series::Fund(fund), self.year))
        {
            return r;
        }
        self.assumptions
            .fund_distributions
            .get(fund)
            .map(|p| p.mean)
            .unwrap_or_else(|| builtin_params(Series::Fund(fund)).mean)
    }

    fn default_allocation(&self) -> FundAllocation {
        self.assumptions
            .default_allocation
            .clone()
            .unwrap_or_else(builtin_default_allocation)
    }

    fn growth_rate(&self, person: &Person, retired: bool) -> f64 {
        let allocation = match &person.allocation {
            None => {
                return if retired {
                    self.assumptions.post_retirement_return
                } else {
                    self.assumptions.pre_retirement_return
                };
            }
            Some(AllocationSpec::Fixed { weights }) => normalize_allocation(weights),
            Some(AllocationSpec::GlidePath { fund }) => self
                .collaborators
                .allocations
                .and_then(|provider| provider.allocation_at(fund, jan_1(self.year)))
                .unwrap_or_else(|| {
                    tracing::trace!(fund = %fund, year = self.year, "no glide path row; using default allocation");
                    self.default_allocation()
                }),
        };
        blended_return(&allocation, &FundAllocation::new(), |fund| {
            self.fund_return(fund)
        })
    }
}

fn run_projection(
    collaborators: Collaborators<'_>,
    start_year: i32,
    person_a: &Person,
    person_b: &Person,
    scenario: &Scenario,
    assumptions: &GlobalAssumptions,
) -> Vec<AnnualCashFlow> {
    let plans = [
        PersonPlan::new(PersonId::A, person_a, scenario, assumptions, start_year),
        PersonPlan::new(PersonId::B, person_b, scenario, assumptions, start_year),
    ];
    let mut states = [
        PersonState::new(person_a, &scenario.person_a, assumptions),
        PersonState::new(person_b, &scenario.person_b, assumptions),
    ];

    let mut rows = Vec::with_capacity(assumptions.projection_years as usize);
    for index in 0..assumptions.projection_years {
        let year = start_year + index as i32;
        rows.push(project_year(
            collaborators,
            &plans,
            &mut states,
            scenario,
            assumptions,
            index,
            year,
        ));
    }
    rows
}

pub fn agency_contribution_rate(employee_rate: f64) -> f64 {
    let rate = employee_rate.max(0.0);
    0.01 + rate.min(0.03) + 0.5 * (rate - 0.03).clamp(0.0, 0.02)
}

fn project_year(
    collaborators: Collaborators<'_>,
    plans: &[PersonPlan<'_>; 2],
    states: &mut [PersonState; 2],
    scenario: &Scenario,
    assumptions: &GlobalAssumptions,
    index: u32,
    year: i32,
) -> AnnualCashFlow {
    let deceased = [plans[0].is_dead_by(index), plans[1].is_dead_by(index)];
    let any_deceased = deceased[0] || deceased[1];
    let exactly_one = deceased[0] != deceased[1];
    let ctx = YearContext {
        collaborators,
        assumptions,
        index,
        year,
        spending_factor: if any_deceased {
            scenario.mortality.survivor_spending_factor
        } else {
            1.0
        },
    };

    if exactly_one && scenario.mortality.balance_transfer == BalanceTransfer::MergeIntoSurvivor {
        let (d, s) = if deceased[0] { (0, 1) } else { (1, 0) };
        if !states[d].merged_away {
            let traditional = std::mem::take(&mut states[d].traditional);
            let roth = std::mem::take(&mut states[d].roth);
            states[d].merged_away = true;
            states[s].traditional += traditional;
            states[s].roth += roth;
        }
    }

    let (mut row_a, flows_a) = person_year(&ctx, &plans[0], &mut states[0], deceased[0]);
    let (mut row_b, flows_b) = person_year(&ctx, &plans[1], &mut states[1], deceased[1]);

    if exactly_one {
        let (dead_plan, survivor_plan, survivor_row) = if deceased[0] {
            (&plans[0], &plans[1], &mut row_b)
        } else {
            (&plans[1], &plans[0], &mut row_a)
        };
        apply_survivor_benefits(&ctx, dead_plan, survivor_plan, survivor_row);
    }

    let filing_status = filing_status(plans, &deceased, index, scenario.mortality.filing_switch);
    let living = [(&row_a, &flows_a), (&row_b, &flows_b)]
        .into_iter()
        .filter(|(row, _)| !row.is_deceased)
        .collect::<Vec<_>>();
    let senior_count = living.iter().filter(|(row, _)| row.age >= 65).count() as u32;
    let medicare_count = senior_count;

    let tax_case = if living
        .iter()
        .all(|(_, flows)| flows.status == WorkStatus::Working)
        && !living.is_empty()
    {
        TaxCase::Working
    } else if living
        .iter()
        .all(|(_, flows)| flows.status == WorkStatus::Retired)
    {
        TaxCase::Retired
    } else {
        TaxCase::Transition
    };

    let taxes = compute_taxes(
        collaborators.tax,
        tax_case,
        filing_status,
        senior_count,
        [(&row_a, &flows_a), (&row_b, &flows_b)],
    );

    let premium_index = (1.0 + assumptions.health_premium_inflation).powi(index as i32);
    let health_premium = match living.len() {
        2 => assumptions.health_premium_self_plus_one,
        1 => assumptions.health_premium_self,
        _ => 0.0,
    } * premium_index;
    let surcharge_monthly = if medicare_count > 0 {
        collaborators
            .tax
            .irmaa_surcharge_monthly(taxes.taxable_income.adjusted_gross, filing_status)
    } else {
        0.0
    };
    let enrollee_months = 12.0 * medicare_count as f64;
    let irmaa_surcharge = enrollee_months * surcharge_monthly * premium_index;
    let medicare_premium = enrollee_months
        * (assumptions.medicare_part_b_monthly + surcharge_monthly)
        * premium_index;

    let total_contributions = row_a.contribution + row_b.contribution;
    let total_gross_income = sum_income(&row_a, &row_b);
    let net_income = total_gross_income
        - sum_deductions(
            taxes.federal,
            taxes.state,
            taxes.local,
            taxes.payroll,
            total_contributions,
            health_premium,
            medicare_premium,
        );

    let traditional_balance = row_a.traditional_balance + row_b.traditional_balance;
    let roth_balance = row_a.roth_balance + row_b.roth_balance;
    let is_rmd_year = row_a.is_rmd_year || row_b.is_rmd_year;
    let rmd_amount = row_a.rmd_amount + row_b.rmd_amount;

    AnnualCashFlow {
        year: index + 1,
        calendar_year: year,
        federal_tax: taxes.federal,
        state_tax: taxes.state,
        local_tax: taxes.local,
        payroll_tax: taxes.payroll,
        taxable_income: taxes.taxable_income,
        standard_deduction: taxes.standard_deduction,
        senior_deduction_count: senior_count,
        filing_status,
        health_premium,
        medicare_premium,
        irmaa_surcharge,
        total_contributions,
        traditional_balance,
        roth_balance,
        total_balance: traditional_balance + roth_balance,
        is_retired: tax_case == TaxCase::Retired,
        is_medicare_eligible: medicare_count > 0,
        is_rmd_year,
        is_filing_single: filing_status == FilingStatus::Single,
        rmd_amount,
        total_gross_income,
        net_income,
        person_a: row_a,
        person_b: row_b,
    }
}

fn person_year(
    ctx: &YearContext<'_>,
    plan: &PersonPlan<'_>,
    state: &mut PersonState,
    deceased: bool,
) -> (PersonYear, PersonFlows) {
    let person = plan.person;
    let age = age_on(person.birth_date, dec_31(ctx.year));
    let status = WorkStatus::of(plan.retirement.retirement_date, ctx.year);
    let mut flows = PersonFlows {
        status,
        taxable_withdrawal: 0.0,
    };
    let mut row = PersonYear {
        age,
        age_at_year_start: age_on(person.birth_date, jan_1(ctx.year)),
        is_deceased: deceased,
        ..PersonYear::default()
    };

    if deceased {
        // Whatever was not merged into the survivor keeps compounding untouched.
        grow_balances(ctx, person, state, true);
        row.traditional_balance = state.traditional;
        row.roth_balance = state.roth;
        return (row, flows);
    }

    let worked = status.worked_fraction();
    let retired = status.retired_fraction();
    row.is_retired = retired > 0.0;

    let salary_base =
        person.current_salary * (1.0 + ctx.assumptions.salary_growth()).powi(ctx.index as i32);
    row.salary = salary_base * worked;
    row.contribution = row.salary * person.contribution_rate;
    let agency_contribution = row.salary * agency_contribution_rate(person.contribution_rate);

    if row.is_retired {
        if ctx.year > plan.retirement.retirement_date.year() && age >= 62 {
            state.pension_cola_factor *= 1.0 + fers_cola(ctx.assumptions.inflation_rate);
        }
        row.pension =
            plan.pension.reduced * state.pension_cola_factor * retired * ctx.spending_factor;
        row.supplement = supplement_for_year(plan, age, retired);
        row.benefit = plan.own_benefit * ctx.cola_index() * benefit_fraction(plan, status, ctx.year);

        let (is_rmd_year, rmd_amount) = rmd_for_year(plan, state.traditional, age);
        row.is_rmd_year = is_rmd_year;
        row.rmd_amount = rmd_amount;

        let request = WithdrawalRequest {
            balance: state.traditional + state.roth,
            year_index: state.withdrawals_taken,
            target_income: state.policy.target_income(),
            age,
            is_rmd_year,
            rmd_amount,
        };
        let amount = state
            .policy
            .withdrawal(&request, retired * ctx.spending_factor);
        state.withdrawals_taken += 1;

        let from_traditional = amount.min(state.traditional);
        state.traditional = (state.traditional - from_traditional).max(0.0);
        state.roth = (state.roth - (amount - from_traditional)).max(0.0);
        row.withdrawal = amount;
        flows.taxable_withdrawal = from_traditional;
    }

    grow_balances(ctx, person, state, row.is_retired);
    state.traditional += row.contribution + agency_contribution;
    row.traditional_balance = state.traditional;
    row.roth_balance = state.roth;
    (row, flows)
}

fn grow_balances(ctx: &YearContext<'_>, person: &Person, state: &mut PersonState, retired: bool) {
    let rate = ctx.growth_rate(person, retired);
    state.traditional = (state.traditional * (1.0 + rate)).max(0.0);
    state.roth = (state.roth * (1.0 + rate)).max(0.0);
}

/// Paid from retirement until 62. The year of the 62nd birthday pays only the days before it.
fn supplement_for_year(plan: &PersonPlan<'_>, age: u32, retired: f64) -> f64 {
    if plan.supplement <= 0.0 || age > 62 {
        return 0.0;
    }
    let after_62 = if age == 62 {
        fraction_from(birthday_at(plan.person.birth_date, 62))
    } else {
        0.0
    };
    plan.supplement * (retired - after_62).max(0.0)
}

/// Share of the year benefits are payable. When both the claim birthday and the
/// retirement fall in this year, whichever comes first sets the proration.
fn benefit_fraction(plan: &PersonPlan<'_>, status: WorkStatus, year: i32) -> f64 {
    let claim = plan.claim_date;
    if claim.year() > year {
        return 0.0;
    }
    let birthday_this_year = claim.year() == year;
    match (birthday_this_year, status) {
        (true, WorkStatus::Transition { .. }) => {
            if claim <= plan.retirement.retirement_date {
                fraction_from(claim)
            } else {
                status.retired_fraction()
            }
        }
        (true, _) => fraction_from(claim),
        (false, WorkStatus::Transition { .. }) => status.retired_fraction(),
        (false, _) => 1.0,
    }
}

/// The first qualifying year owes only the share of the year after the birthday.
fn rmd_for_year(plan: &PersonPlan<'_>, traditional: f64, age: u32) -> (bool, f64) {
    if age < plan.rmd_start_age {
        return (false, 0.0);
    }
    let full = required_minimum_distribution(traditional, plan.person.birth_date.year(), age);
    let amount = if age == plan.rmd_start_age {
        full * fraction_from(birthday_at(plan.person.birth_date, plan.rmd_start_age))
    } else {
        full
    };
    (true, amount)
}

fn apply_survivor_benefits(
    ctx: &YearContext<'_>,
    dead: &PersonPlan<'_>,
    survivor: &PersonPlan<'_>,
    survivor_row: &mut PersonYear,
) {
    let death_this_year = dead.dies_in(ctx.index);

    if survivor_row.is_retired {
        let factor =
            survivor_benefit_factor(survivor_row.age, survivor.person.birth_date.year());
        let inherited = dead.own_benefit * ctx.cola_index() * factor;
        if inherited > survivor_row.benefit {
            let after = death_this_year.map_or(1.0, |d| fraction_from(d.date));
            survivor_row.benefit = survivor_row.benefit * (1.0 - after) + inherited * after;
        }
    }

    if dead.had_retired_before_death() && dead.pension.survivor_annuity > 0.0 {
        let years = (ctx.year - dead.retirement.retirement_date.year()).max(0);
        let base = dead.pension.survivor_annuity
            * (1.0 + fers_cola(ctx.assumptions.inflation_rate)).powi(years);
        let share = death_this_year.map_or(1.0, |d| 1.0 - fraction_before(d.date));
        survivor_row.survivor_pension = base * share;
    }
}

fn filing_status(
    plans: &[PersonPlan<'_>; 2],
    deceased: &[bool; 2],
    index: u32,
    timing: FilingSwitchTiming,
) -> FilingStatus {
    match (deceased[0], deceased[1]) {
        (false, false) => FilingStatus::MarriedFilingJointly,
        (true, true) => FilingStatus::Single,
        _ => {
            let dead = if deceased[0] { &plans[0] } else { &plans[1] };
            let switch = match timing {
                FilingSwitchTiming::Immediate => true,
                FilingSwitchTiming::NextCalendarYear => dead.dies_in(index).is_none(),
            };
            if switch {
                FilingStatus::Single
            } else {
                FilingStatus::MarriedFilingJointly
            }
        }
    }
}

struct YearTaxes {
    federal: f64,
    state: f64,
    local: f64,
    payroll: f64,
    standard_deduction: f64,
    taxable_income: TaxableIncome,
}

fn compute_taxes(
    rules: &dyn TaxRules,
    case: TaxCase,
    filing: FilingStatus,
    senior_count: u32,
    people: [(&PersonYear, &PersonFlows); 2],
) -> YearTaxes {
    let gross_wages: f64 = people.iter().map(|(row, _)| row.salary).sum();
    let federal_wages: f64 = people
        .iter()
        .map(|(row, _)| (row.salary - row.contribution).max(0.0))
        .sum();
    let pension: f64 = people
        .iter()
        .map(|(row, _)| row.pension + row.survivor_pension + row.supplement)
        .sum();
    let withdrawals: f64 = people.iter().map(|(_, flows)| flows.taxable_withdrawal).sum();
    let benefits: f64 = people.iter().map(|(row, _)| row.benefit).sum();

    let (mut income, payroll_applies, is_retired) = match case {
        // Earned wages carry payroll tax in any year someone still works.
        TaxCase::Working | TaxCase::Transition => (
            IncomeComponents {
                wages: federal_wages,
                pension,
                withdrawals,
                social_security: benefits,
                taxable_social_security: 0.0,
            },
            true,
            false,
        ),
        TaxCase::Retired => (
            IncomeComponents {
                wages: 0.0,
                pension,
                withdrawals,
                social_security: benefits,
                taxable_social_security: 0.0,
            },
            false,
            true,
        ),
    };
    income.taxable_social_security =
        rules.taxable_social_security(income.social_security, income.other_income(), filing);

    let federal = rules.federal_tax(&income, filing, senior_count);
    let state = rules.state_tax(&income, is_retired);
    let local = rules.local_tax(gross_wages, is_retired);
    let payroll = if payroll_applies {
        people
            .iter()
            .map(|(row, _)| rules.payroll_tax(row.salary, gross_wages))
            .sum::<f64>()
    } else {
        0.0
    };
    let standard_deduction = rules.standard_deduction(filing, senior_count);
    let adjusted_gross = income.adjusted_gross();

    YearTaxes {
        federal,
        state,
        local,
        payroll,
        standard_deduction,
        taxable_income: TaxableIncome {
            wages: income.wages,
            pension: income.pension,
            withdrawals: income.withdrawals,
            social_security: income.taxable_social_security,
            adjusted_gross,
            taxable: (adjusted_gross - standard_deduction).max(0.0),
        },
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::core::dates::FixedClock;
    use crate::core::market::GlidePathTable;
    use crate::core::types::{MortalitySpec, WithdrawalStrategyKind};
    use proptest::prelude::{prop_assert, prop_assert_eq, proptest};

    const EPS: f64 = 1e-6;

    fn assert_approx(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() <= EPS,
            "expected {expected}, got {actual}"
        );
    }

    pub(crate) fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    pub(crate) fn federal_couple() -> (Person, Person) {
        let a = Person {
            name: "Alex".into(),
            birth_date: d(1966, 4, 12),
            hire_date: d(1994, 9, 1),
            current_salary: 120_000.0,
            high_three_salary: Some(115_000.0),
            traditional_balance: 650_000.0,
            roth_balance: 50_000.0,
            contribution_rate: 0.10,
            benefit_at_62: 22_000.0,
            benefit_at_full_age: 31_000.0,
            benefit_at_70: 39_000.0,
            survivor_election: 0.5,
            allocation: None,
        };
        let b = Person {
            name: "Blair".into(),
            birth_date: d(1968, 10, 3),
            hire_date: d(2001, 2, 15),
            current_salary: 95_000.0,
            high_three_salary: None,
            traditional_balance: 320_000.0,
            roth_balance: 0.0,
            contribution_rate: 0.05,
            benefit_at_62: 17_000.0,
            benefit_at_full_age: 24_000.0,
            benefit_at_70: 30_000.0,
            survivor_election: 0.0,
            allocation: None,
        };
        (a, b)
    }

    pub(crate) fn base_scenario() -> Scenario {
        Scenario {
            name: "baseline".into(),
            person_a: RetirementScenario {
                retirement_date: d(2027, 6, 30),
                claiming_age: 62,
                withdrawal: WithdrawalStrategyKind::FixedRealRate { initial_rate: 0.04 },
            },
            person_b: RetirementScenario {
                retirement_date: d(2030, 12, 31),
                claiming_age: 67,
                withdrawal: WithdrawalStrategyKind::VariablePercentage { rate: 0.04 },
            },
            mortality_a: None,
            mortality_b: None,
            mortality: Default::default(),
        }
    }

    pub(crate) fn base_assumptions() -> GlobalAssumptions {
        GlobalAssumptions {
            start_year: Some(2025),
            projection_years: 35,
            ..GlobalAssumptions::default()
        }
    }

    /// Two 60-year-olds retired before the projection starts.
    fn retired_couple() -> (Person, Person, Scenario) {
        let (mut a, mut b) = federal_couple();
        a.birth_date = d(1965, 1, 1);
        b.birth_date = d(1965, 1, 1);
        a.traditional_balance = 1_000_000.0;
        a.roth_balance = 0.0;
        b.traditional_balance = 0.0;
        let mut scenario = base_scenario();
        scenario.person_a.retirement_date = d(2024, 12, 31);
        scenario.person_b.retirement_date = d(2024, 12, 31);
        scenario.person_a.claiming_age = 67;
        scenario.person_b.claiming_age = 67;
        scenario.person_b.withdrawal = WithdrawalStrategyKind::FixedRealRate { initial_rate: 0.04 };
        (a, b, scenario)
    }

    fn engine() -> ProjectionEngine {
        ProjectionEngine::default().with_clock(Arc::new(FixedClock::on(d(2025, 1, 1))))
    }

    fn run(a: &Person, b: &Person, scenario: &Scenario, assumptions: &GlobalAssumptions) -> Vec<AnnualCashFlow> {
        engine().project(a, b, scenario, assumptions).expect("valid projection")
    }

    fn assert_row_identities(row: &AnnualCashFlow) {
        let a = &row.person_a;
        let b = &row.person_b;
        let gross = a.salary
            + b.salary
            + a.pension
            + b.pension
            + a.survivor_pension
            + b.survivor_pension
            + a.withdrawal
            + b.withdrawal
            + a.benefit
            + b.benefit
            + a.supplement
            + b.supplement;
        assert_eq!(row.total_gross_income, gross, "gross identity in year {}", row.year);
        let deductions = row.federal_tax
            + row.state_tax
            + row.local_tax
            + row.payroll_tax
            + row.total_contributions
            + row.health_premium
            + row.medicare_premium;
        assert_eq!(row.net_income, gross - deductions, "net identity in year {}", row.year);
    }

    #[test]
    fn projection_length_matches_horizon() {
        let (a, b) = federal_couple();
        let rows = run(&a, &b, &base_scenario(), &base_assumptions());
        assert_eq!(rows.len(), 35);
        assert_eq!(rows[0].year, 1);
        assert_eq!(rows[0].calendar_year, 2025);
        assert_eq!(rows[34].calendar_year, 2059);
    }

    #[test]
    fn start_year_falls_back_to_clock() {
        let (a, b) = federal_couple();
        let mut assumptions = base_assumptions();
        assumptions.start_year = None;
        let rows = ProjectionEngine::default()
            .with_clock(Arc::new(FixedClock::on(d(2031, 5, 5))))
            .project(&a, &b, &base_scenario(), &assumptions)
            .unwrap();
        assert_eq!(rows[0].calendar_year, 2031);
    }

    #[test]
    fn baseline_invariants_hold_every_year() {
        let (a, b) = federal_couple();
        let rows = run(&a, &b, &base_scenario(), &base_assumptions());
        for pair in rows.windows(2) {
            assert_eq!(pair[1].person_a.age, pair[0].person_a.age + 1);
            assert_eq!(pair[1].person_b.age, pair[0].person_b.age + 1);
        }
        for row in &rows {
            assert_row_identities(row);
            // Neither birthday falls on Jan 1, so each year crosses one.
            assert_eq!(row.person_a.age_at_year_start + 1, row.person_a.age);
            assert_eq!(row.person_b.age_at_year_start + 1, row.person_b.age);
            assert!(row.person_a.traditional_balance >= 0.0);
            assert!(row.person_a.roth_balance >= 0.0);
            assert!(row.person_b.traditional_balance >= 0.0);
            assert!(row.person_b.roth_balance >= 0.0);
        }
    }

    #[test]
    fn four_percent_rule_first_and_second_year() {
        let (a, b, scenario) = retired_couple();
        let mut assumptions = base_assumptions();
        assumptions.inflation_rate = 0.025;
        let rows = run(&a, &b, &scenario, &assumptions);
        assert_eq!(rows[0].person_a.age, 60);
        assert_eq!(rows[0].person_b.age, 60);
        assert!(rows[0].person_a.is_retired);
        assert_approx(rows[0].person_a.withdrawal, 40_000.0);
        assert_approx(rows[1].person_a.withdrawal, 41_000.0);
        assert_approx(rows[0].person_b.withdrawal, 0.0);
        assert_approx(rows[0].person_a.salary, 0.0);
        assert!(rows[0].is_retired);
        assert_eq!(rows[0].payroll_tax, 0.0);
    }

    #[test]
    fn transition_year_prorates_salary_on_flat_365() {
        let (a, b) = federal_couple();
        let rows = run(&a, &b, &base_scenario(), &base_assumptions());
        // Person A retires 2027-06-30: 180 days worked.
        let row = &rows[2];
        let growth = (1.0_f64 + 0.025).powi(2);
        assert_approx(row.person_a.salary, 120_000.0 * growth * 180.0 / 365.0);
        assert_approx(row.person_a.contribution, row.person_a.salary * 0.10);
        assert!(row.person_a.pension > 0.0);
        assert!(row.person_a.is_retired);
        assert!(!row.is_retired);
        // Transition year still carries payroll tax on the worked part.
        assert!(row.payroll_tax > 0.0);
    }

    #[test]
    fn pension_cola_waits_until_62() {
        let (a, b) = federal_couple();
        let rows = run(&a, &b, &base_scenario(), &base_assumptions());
        // A is 61 at end of 2027 (retirement year), 62 in 2028.
        let base = rows[3].person_a.pension; // 2028, age 62: first COLA
        let retirement_year = rows[2].person_a.pension / (1.0 - 180.0 / 365.0);
        assert_approx(base, retirement_year * (1.0 + fers_cola(0.025)));
        assert_approx(rows[4].person_a.pension, base * (1.0 + fers_cola(0.025)));
    }

    #[test]
    fn fers_cola_follows_inflation_not_the_social_security_cola() {
        let (a, b) = federal_couple();
        let mut scenario = base_scenario();
        scenario.mortality_a = Some(MortalitySpec {
            death_date: Some(d(2035, 7, 2)),
            death_age: None,
        });
        let assumptions = GlobalAssumptions {
            inflation_rate: 0.04,
            cola_rate: 0.01,
            ..base_assumptions()
        };
        let rows = run(&a, &b, &scenario, &assumptions);
        // 4% inflation caps the FERS COLA at 3%.
        assert_approx(rows[4].person_a.pension / rows[3].person_a.pension, 1.03);
        assert_approx(
            rows[12].person_b.survivor_pension / rows[11].person_b.survivor_pension,
            1.03,
        );
        // Social Security keeps indexing on the COLA rate.
        assert_approx(rows[5].person_a.benefit / rows[4].person_a.benefit, 1.01);
    }

    #[test]
    fn supplement_stops_at_62() {
        let (a, b) = federal_couple();
        let rows = run(&a, &b, &base_scenario(), &base_assumptions());
        // A: 33 years of service at 61 => supplement-eligible; turns 62 on 2028-04-12.
        assert!(rows[2].person_a.supplement > 0.0);
        let partial = rows[3].person_a.supplement;
        assert!(partial > 0.0 && partial < rows[2].person_a.supplement * 2.0);
        assert_eq!(rows[4].person_a.supplement, 0.0);
    }

    #[test]
    fn benefit_prorated_from_claim_birthday() {
        let (a, b) = federal_couple();
        let rows = run(&a, &b, &base_scenario(), &base_assumptions());
        // A claims at 62 on 2028-04-12, already retired.
        let row = &rows[3];
        let cola_index = (1.0_f64 + 0.025).powi(3);
        let expected = 22_000.0 * cola_index * fraction_from(d(2028, 4, 12));
        assert_approx(row.person_a.benefit, expected);
        assert_approx(rows[4].person_a.benefit, 22_000.0 * (1.0_f64 + 0.025).powi(4));
        assert_eq!(rows[2].person_a.benefit, 0.0);
    }

    #[test]
    fn retirement_before_claim_birthday_in_same_year_uses_retirement_proration() {
        let (a, b) = federal_couple();
        let mut scenario = base_scenario();
        // Retire 2028-02-01, claim birthday 2028-04-12: retirement comes first.
        scenario.person_a.retirement_date = d(2028, 2, 1);
        let rows = run(&a, &b, &scenario, &base_assumptions());
        let row = &rows[3];
        let retired = 1.0 - work_fraction(d(2028, 2, 1));
        let expected = 22_000.0 * (1.0_f64 + 0.025).powi(3) * retired;
        assert_approx(row.person_a.benefit, expected);
    }

    #[test]
    fn death_extinguishes_own_income_and_pays_survivor() {
        let (a, b) = federal_couple();
        let mut scenario = base_scenario();
        scenario.mortality_a = Some(MortalitySpec {
            death_date: Some(d(2035, 7, 2)),
            death_age: None,
        });
        let rows = run(&a, &b, &scenario, &base_assumptions());
        let death_index = 10;
        for row in &rows[death_index..] {
            assert!(row.person_a.is_deceased);
            assert_eq!(row.person_a.salary, 0.0);
            assert_eq!(row.person_a.pension, 0.0);
            assert_eq!(row.person_a.benefit, 0.0);
            assert_eq!(row.person_a.withdrawal, 0.0);
            assert_eq!(row.person_a.supplement, 0.0);
            assert_row_identities(row);
        }
        for row in &rows[..death_index] {
            assert!(!row.person_a.is_deceased);
            assert_eq!(row.person_b.survivor_pension, 0.0);
        }

        let plan_pension = {
            let scenario = base_scenario();
            let mut grown = a.clone();
            grown.high_three_salary = Some(115_000.0 * (1.0_f64 + 0.025).powi(2));
            pension(&grown, scenario.person_a.retirement_date)
        };
        let cola = 1.0 + fers_cola(0.025);
        let death_year = &rows[death_index];
        let expected = plan_pension.survivor_annuity
            * cola.powi(2035 - 2027)
            * (1.0 - fraction_before(d(2035, 7, 2)));
        assert_approx(death_year.person_b.survivor_pension, expected);
        assert_approx(
            rows[death_index + 1].person_b.survivor_pension,
            plan_pension.survivor_annuity * cola.powi(2036 - 2027),
        );
    }

    #[test]
    fn survivor_steps_up_to_larger_deceased_benefit_from_death_date() {
        let (a, b, mut scenario) = retired_couple();
        scenario.mortality_a = Some(MortalitySpec {
            death_date: Some(d(2034, 7, 2)),
            death_age: None,
        });
        let rows = run(&a, &b, &scenario, &base_assumptions());
        let own = own_benefit(&b, 67);
        let inherited = own_benefit(&a, 67);
        assert!(inherited > own);

        // 2034: B is 69, past full retirement age, so the full benefit carries over.
        let cola = |index: i32| (1.0_f64 + 0.025).powi(index);
        let after = fraction_from(d(2034, 7, 2));
        assert_approx(
            rows[9].person_b.benefit,
            own * cola(9) * (1.0 - after) + inherited * cola(9) * after,
        );
        assert_approx(rows[10].person_b.benefit, inherited * cola(10));
        assert_approx(rows[8].person_b.benefit, own * cola(8));
    }

    #[test]
    fn survivor_keeps_own_benefit_when_it_is_larger() {
        let (a, mut b, mut scenario) = retired_couple();
        b.benefit_at_full_age = 40_000.0;
        scenario.mortality_a = Some(MortalitySpec {
            death_date: Some(d(2034, 7, 2)),
            death_age: None,
        });
        let rows = run(&a, &b, &scenario, &base_assumptions());
        assert_approx(rows[9].person_b.benefit, 40_000.0 * (1.0_f64 + 0.025).powi(9));
        assert_approx(rows[10].person_b.benefit, 40_000.0 * (1.0_f64 + 0.025).powi(10));
    }

    #[test]
    fn survivor_under_60_gets_no_survivor_benefit() {
        let (a, b) = federal_couple();
        let mut scenario = base_scenario();
        // B retires at 58 and is 59 when A dies; B turns 60 in 2028.
        scenario.person_b.retirement_date = d(2026, 12, 31);
        scenario.mortality_a = Some(MortalitySpec {
            death_date: Some(d(2027, 9, 1)),
            death_age: None,
        });
        let rows = run(&a, &b, &scenario, &base_assumptions());
        assert_eq!(rows[2].person_b.age, 59);
        assert_eq!(rows[2].person_b.age_at_year_start, 58);
        assert_eq!(rows[2].person_b.benefit, 0.0);

        let inherited = own_benefit(&a, 62);
        let expected = inherited * (1.0_f64 + 0.025).powi(3) * survivor_benefit_factor(60, 1968);
        assert_approx(rows[3].person_b.benefit, expected);
    }

    #[test]
    fn merge_moves_balance_to_survivor_in_death_year() {
        let (a, b) = federal_couple();
        let mut scenario = base_scenario();
        scenario.mortality_b = Some(MortalitySpec {
            death_date: None,
            death_age: Some(64),
        });
        let rows = run(&a, &b, &scenario, &base_assumptions());
        // B turns 64 in 2032.
        let idx = 7;
        assert!(rows[idx].person_b.is_deceased);
        assert!(!rows[idx - 1].person_b.is_deceased);
        assert_eq!(rows[idx].person_b.traditional_balance, 0.0);
        assert_eq!(rows[idx].person_b.roth_balance, 0.0);
        assert!(rows[idx].person_a.traditional_balance > rows[idx - 1].person_a.traditional_balance);
    }

    #[test]
    fn no_transfer_keeps_deceased_balance_growing() {
        let (a, b) = federal_couple();
        let mut scenario = base_scenario();
        scenario.mortality.balance_transfer = BalanceTransfer::None;
        scenario.mortality_b = Some(MortalitySpec {
            death_date: Some(d(2026, 3, 1)),
            death_age: None,
        });
        let rows = run(&a, &b, &scenario, &base_assumptions());
        assert!(rows[1].person_b.traditional_balance > rows[0].person_b.traditional_balance);
        assert_eq!(rows[1].person_b.withdrawal, 0.0);
    }

    #[test]
    fn filing_status_switch_timing() {
        let (a, b) = federal_couple();
        let mut scenario = base_scenario();
        scenario.mortality_a = Some(MortalitySpec {
            death_date: Some(d(2030, 5, 1)),
            death_age: None,
        });
        let deferred = run(&a, &b, &scenario, &base_assumptions());
        assert_eq!(deferred[4].filing_status, FilingStatus::MarriedFilingJointly);
        assert_eq!(deferred[5].filing_status, FilingStatus::MarriedFilingJointly);
        assert_eq!(deferred[6].filing_status, FilingStatus::Single);
        assert!(deferred[6].is_filing_single);

        scenario.mortality.filing_switch = FilingSwitchTiming::Immediate;
        let immediate = run(&a, &b, &scenario, &base_assumptions());
        assert_eq!(immediate[5].filing_status, FilingStatus::Single);
    }

    #[test]
    fn survivor_spending_factor_scales_withdrawals_and_own_pension() {
        let (a, b) = federal_couple();
        let mut scenario = base_scenario();
        scenario.mortality_b = Some(MortalitySpec {
            death_date: Some(d(2040, 1, 10)),
            death_age: None,
        });
        scenario.mortality.balance_transfer = BalanceTransfer::None;
        let full = run(&a, &b, &scenario, &base_assumptions());
        scenario.mortality.survivor_spending_factor = 0.8;
        let scaled = run(&a, &b, &scenario, &base_assumptions());
        let idx = 15;
        assert_approx(scaled[idx].person_a.pension, full[idx].person_a.pension * 0.8);
        assert_approx(scaled[idx].person_a.withdrawal, full[idx].person_a.withdrawal * 0.8);
        assert_approx(scaled[idx - 1].person_a.pension, full[idx - 1].person_a.pension);
    }

    #[test]
    fn rmd_first_year_is_prorated_and_floors_withdrawal() {
        let (mut a, mut b) = federal_couple();
        // Born 1952 => RMD at 73, reached 2025-08-01.
        a.birth_date = d(1952, 8, 1);
        b.birth_date = d(1953, 3, 1);
        a.traditional_balance = 800_000.0;
        a.roth_balance = 0.0;
        let mut scenario = base_scenario();
        scenario.person_a.retirement_date = d(2015, 1, 1);
        scenario.person_b.retirement_date = d(2016, 1, 1);
        scenario.person_a.claiming_age = 70;
        scenario.person_b.claiming_age = 70;
        scenario.person_a.withdrawal = WithdrawalStrategyKind::VariablePercentage { rate: 0.0 };
        a.hire_date = d(1980, 1, 1);
        b.hire_date = d(1985, 1, 1);
        let rows = run(&a, &b, &scenario, &base_assumptions());

        let first = &rows[0];
        assert!(first.person_a.is_rmd_year);
        let expected = 800_000.0 / 26.5 * fraction_from(d(2025, 8, 1));
        assert_approx(first.person_a.rmd_amount, expected);
        assert_approx(first.person_a.withdrawal, expected);

        for row in &rows {
            for p in [&row.person_a, &row.person_b] {
                if p.is_rmd_year {
                    assert!(p.withdrawal + 1e-6 >= p.rmd_amount);
                }
            }
        }
        assert!(rows[1].person_a.rmd_amount > 0.0);
    }

    #[test]
    fn fund_overrides_win_over_fallbacks() {
        let (mut a, b, scenario) = retired_couple();
        a.allocation = Some(AllocationSpec::Fixed {
            weights: [("C".to_string(), 1.0)].into_iter().collect(),
        });
        let mut assumptions = base_assumptions();
        assumptions.fund_return_overrides = Some([("C".to_string(), 0.10)].into_iter().collect());
        let rows = run(&a, &b, &scenario, &assumptions);
        assert_approx(rows[0].person_a.traditional_balance, (1_000_000.0 - 40_000.0) * 1.10);
    }

    #[test]
    fn glide_path_allocation_blends_historical_returns() {
        use crate::core::market::HistoricalData;

        let (mut a, b, scenario) = retired_couple();
        a.allocation = Some(AllocationSpec::GlidePath {
            fund: "L2030".into(),
        });
        let mut table = GlidePathTable::default();
        table.insert(
            "L2030",
            d(2020, 1, 1),
            [("G".to_string(), 0.5), ("C".to_string(), 0.5)].into_iter().collect(),
        );
        let mut history = HistoricalData::default();
        history
            .funds
            .insert("C".into(), [(2025, 0.20)].into_iter().collect());
        let engine = engine()
            .with_allocations(Arc::new(table))
            .with_market_data(Arc::new(history));
        let rows = engine
            .project(&a, &b, &scenario, &base_assumptions())
            .unwrap();
        // G falls back to its built-in mean; C comes from history.
        let rate = 0.5 * builtin_params(Series::Fund("G")).mean + 0.5 * 0.20;
        assert_approx(rows[0].person_a.traditional_balance, 960_000.0 * (1.0 + rate));
    }

    #[test]
    fn medicare_premiums_start_at_65() {
        let (a, b) = federal_couple();
        let rows = run(&a, &b, &base_scenario(), &base_assumptions());
        // A turns 65 in 2031.
        assert!(!rows[5].is_medicare_eligible);
        assert_eq!(rows[5].medicare_premium, 0.0);
        assert!(rows[6].is_medicare_eligible);
        assert!(rows[6].medicare_premium >= 12.0 * 174.70 * (1.05_f64).powi(6) - EPS);
        assert_eq!(rows[6].senior_deduction_count, 1);
    }

    #[test]
    fn agency_match_schedule() {
        assert_approx(agency_contribution_rate(0.0), 0.01);
        assert_approx(agency_contribution_rate(0.03), 0.04);
        assert_approx(agency_contribution_rate(0.05), 0.05);
        assert_approx(agency_contribution_rate(0.10), 0.05);
    }

    #[test]
    fn free_function_matches_engine() {
        let (a, b) = federal_couple();
        let rules = SimplifiedTaxRules::default();
        let direct = project(&a, &b, &base_scenario(), &base_assumptions(), &rules).unwrap();
        let via_engine = run(&a, &b, &base_scenario(), &base_assumptions());
        assert_eq!(direct, via_engine);
    }

    #[test]
    fn precondition_errors_surface_before_projection() {
        let (a, b) = federal_couple();
        let mut scenario = base_scenario();
        scenario.person_b.retirement_date = d(1999, 1, 1);
        let err = engine()
            .project(&a, &b, &scenario, &base_assumptions())
            .unwrap_err();
        assert!(matches!(err, ProjectionError::RetirementBeforeHire { person: "person B", .. }));
    }

    proptest! {
        #![proptest_config(proptest::test_runner::Config::with_cases(32))]

        #[test]
        fn prop_projection_invariants(
            retire_a_offset in 0i64..4_000,
            retire_b_offset in 0i64..4_000,
            death_offset in proptest::option::of(0i64..9_000),
            balance_a in 0u32..1_500_000,
            balance_b in 0u32..900_000,
            inflation_bp in 0u32..800,
            return_bp in -300i32..1_200,
            claim_a in 62u32..71,
            rate_bp in 0u32..1_000,
            immediate in proptest::bool::ANY,
        ) {
            let (mut a, mut b) = federal_couple();
            a.traditional_balance = balance_a as f64;
            b.traditional_balance = balance_b as f64;
            let mut scenario = base_scenario();
            scenario.person_a.retirement_date = d(2024, 1, 1) + chrono::Duration::days(retire_a_offset);
            scenario.person_b.retirement_date = d(2024, 1, 1) + chrono::Duration::days(retire_b_offset);
            scenario.person_a.claiming_age = claim_a;
            scenario.person_b.withdrawal = WithdrawalStrategyKind::VariablePercentage { rate: rate_bp as f64 / 10_000.0 };
            scenario.mortality_a = death_offset.map(|days| MortalitySpec {
                death_date: Some(d(2025, 1, 1) + chrono::Duration::days(days)),
                death_age: None,
            });
            if immediate {
                scenario.mortality.filing_switch = FilingSwitchTiming::Immediate;
            }
            let mut assumptions = base_assumptions();
            assumptions.inflation_rate = inflation_bp as f64 / 10_000.0;
            assumptions.post_retirement_return = return_bp as f64 / 10_000.0;

            let rows = run(&a, &b, &scenario, &assumptions);
            prop_assert_eq!(rows.len(), assumptions.projection_years as usize);
            for pair in rows.windows(2) {
                prop_assert_eq!(pair[1].person_a.age, pair[0].person_a.age + 1);
                prop_assert_eq!(pair[1].person_b.age, pair[0].person_b.age + 1);
            }
            let mut seen_dead = false;
            for row in &rows {
                assert_row_identities(row);
                for p in [&row.person_a, &row.person_b] {
                    prop_assert!(p.traditional_balance >= 0.0);
                    prop_assert!(p.roth_balance >= 0.0);
                    if p.is_rmd_year {
                        prop_assert!(p.withdrawal + 1e-6 >= p.rmd_amount);
                    }
                }
                if seen_dead {
                    prop_assert!(row.person_a.is_deceased);
                }
                if row.person_a.is_deceased {
                    seen_dead = true;
                    prop_assert_eq!(row.person_a.salary, 0.0);
                    prop_assert_eq!(row.person_a.pension, 0.0);
                    prop_assert_eq!(row.person_a.benefit, 0.0);
                    prop_assert_eq!(row.person_a.withdrawal, 0.0);
                }
            }
        }
    }
}
