use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Fund name → weight. Kept ordered so weighted sums are reproducible.
pub type FundAllocation = BTreeMap<String, f64>;

/// Fund name → annual return.
pub type FundReturns = BTreeMap<String, f64>;

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PersonId {
    A,
    B,
}

impl PersonId {
    pub fn label(self) -> &'static str {
        match self {
            PersonId::A => "person A",
            PersonId::B => "person B",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "kind")]
pub enum AllocationSpec {
    Fixed { weights: FundAllocation },
    GlidePath { fund: String },
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Person {
    pub name: String,
    pub birth_date: NaiveDate,
    pub hire_date: NaiveDate,
    pub current_salary: f64,
    /// Average of the highest three consecutive salaries; current salary when absent.
    #[serde(default)]
    pub high_three_salary: Option<f64>,
    pub traditional_balance: f64,
    #[serde(default)]
    pub roth_balance: f64,
    pub contribution_rate: f64,
    pub benefit_at_62: f64,
    pub benefit_at_full_age: f64,
    pub benefit_at_70: f64,
    /// Elected survivor-annuity share of the unreduced pension: 0, 0.25 or 0.5.
    #[serde(default)]
    pub survivor_election: f64,
    #[serde(default)]
    pub allocation: Option<AllocationSpec>,
}

impl Person {
    pub fn total_balance(&self) -> f64 {
        self.traditional_balance + self.roth_balance
    }

    pub fn high_three(&self) -> f64 {
        self.high_three_salary.unwrap_or(self.current_salary)
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", tag = "strategy")]
pub enum WithdrawalStrategyKind {
    /// First withdrawal is `initial_rate` of the balance at retirement start, then inflated.
    #[serde(rename_all = "camelCase")]
    FixedRealRate { initial_rate: f64 },
    #[serde(rename_all = "camelCase")]
    NeedBased { target_monthly: f64 },
    #[serde(rename_all = "camelCase")]
    VariablePercentage { rate: f64 },
}

impl Default for WithdrawalStrategyKind {
    fn default() -> Self {
        WithdrawalStrategyKind::FixedRealRate { initial_rate: 0.04 }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetirementScenario {
    pub retirement_date: NaiveDate,
    pub claiming_age: u32,
    #[serde(default)]
    pub withdrawal: WithdrawalStrategyKind,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MortalitySpec {
    #[serde(default)]
    pub death_date: Option<NaiveDate>,
    #[serde(default)]
    pub death_age: Option<u32>,
}

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BalanceTransfer {
    None,
    #[default]
    MergeIntoSurvivor,
}

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FilingSwitchTiming {
    Immediate,
    #[default]
    NextCalendarYear,
}

#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MortalityAssumptions {
    pub survivor_spending_factor: f64,
    pub balance_transfer: BalanceTransfer,
    pub filing_switch: FilingSwitchTiming,
}

impl Default for MortalityAssumptions {
    fn default() -> Self {
        Self {
            survivor_spending_factor: 1.0,
            balance_transfer: BalanceTransfer::MergeIntoSurvivor,
            filing_switch: FilingSwitchTiming::NextCalendarYear,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Scenario {
    #[serde(default)]
    pub name: String,
    pub person_a: RetirementScenario,
    pub person_b: RetirementScenario,
    #[serde(default)]
    pub mortality_a: Option<MortalitySpec>,
    #[serde(default)]
    pub mortality_b: Option<MortalitySpec>,
    #[serde(default)]
    pub mortality: MortalityAssumptions,
}

impl Scenario {
    pub fn retirement(&self, id: PersonId) -> &RetirementScenario {
        match id {
            PersonId::A => &self.person_a,
            PersonId::B => &self.person_b,
        }
    }

    pub fn mortality_spec(&self, id: PersonId) -> Option<&MortalitySpec> {
        match id {
            PersonId::A => self.mortality_a.as_ref(),
            PersonId::B => self.mortality_b.as_ref(),
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DistributionParams {
    pub mean: f64,
    pub std_dev: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GlobalAssumptions {
    pub inflation_rate: f64,
    pub cola_rate: f64,
    pub pre_retirement_return: f64,
    pub post_retirement_return: f64,
    pub projection_years: u32,
    /// Calendar year of projection year 1; the clock's current year when absent.
    pub start_year: Option<i32>,
    /// Annual raise; the inflation rate when absent.
    pub salary_growth_rate: Option<f64>,
    pub health_premium_inflation: f64,
    /// Annual household premium while both people are alive.
    pub health_premium_self_plus_one: f64,
    /// Annual premium for a lone survivor.
    pub health_premium_self: f64,
    pub medicare_part_b_monthly: f64,
    pub fund_distributions: BTreeMap<String, DistributionParams>,
    pub default_allocation: Option<FundAllocation>,
    /// Injected per-fund returns; they win over every historical or statistical fallback.
    pub fund_return_overrides: Option<FundReturns>,
}

impl Default for GlobalAssumptions {
    fn default() -> Self {
        Self {
            inflation_rate: 0.025,
            cola_rate: 0.025,
            pre_retirement_return: 0.07,
            post_retirement_return: 0.05,
            projection_years: 30,
            start_year: None,
            salary_growth_rate: None,
            health_premium_inflation: 0.05,
            health_premium_self_plus_one: 8_400.0,
            health_premium_self: 3_600.0,
            medicare_part_b_monthly: 174.70,
            fund_distributions: BTreeMap::new(),
            default_allocation: None,
            fund_return_overrides: None,
        }
    }
}

impl GlobalAssumptions {
    pub fn salary_growth(&self) -> f64 {
        self.salary_growth_rate.unwrap_or(self.inflation_rate)
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FilingStatus {
    MarriedFilingJointly,
    Single,
}

/// One person's slice of a projection year.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PersonYear {
    /// Age on Dec 31; drives every age-gated rule.
    pub age: u32,
    pub age_at_year_start: u32,
    pub salary: f64,
    pub pension: f64,
    pub survivor_pension: f64,
    pub withdrawal: f64,
    pub benefit: f64,
    pub supplement: f64,
    pub contribution: f64,
    pub rmd_amount: f64,
    pub traditional_balance: f64,
    pub roth_balance: f64,
    pub is_retired: bool,
    pub is_deceased: bool,
    pub is_rmd_year: bool,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaxableIncome {
    pub wages: f64,
    pub pension: f64,
    pub withdrawals: f64,
    pub social_security: f64,
    pub adjusted_gross: f64,
    pub taxable: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnnualCashFlow {
    /// 1-based projection year.
    pub year: u32,
    pub calendar_year: i32,
    pub person_a: PersonYear,
    pub person_b: PersonYear,
    pub federal_tax: f64,
    pub state_tax: f64,
    pub local_tax: f64,
    pub payroll_tax: f64,
    pub taxable_income: TaxableIncome,
    pub standard_deduction: f64,
    pub senior_deduction_count: u32,
    pub filing_status: FilingStatus,
    pub health_premium: f64,
    pub medicare_premium: f64,
    pub irmaa_surcharge: f64,
    pub total_contributions: f64,
    pub traditional_balance: f64,
    pub roth_balance: f64,
    pub total_balance: f64,
    pub is_retired: bool,
    pub is_medicare_eligible: bool,
    pub is_rmd_year: bool,
    pub is_filing_single: bool,
    pub rmd_amount: f64,
    pub total_gross_income: f64,
    pub net_income: f64,
}

/// Sums every income field in a fixed order so the identity can be re-checked exactly.
pub fn sum_income(a: &PersonYear, b: &PersonYear) -> f64 {
    a.salary
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
        + b.supplement
}

/// Sums every deduction applied on the way from gross to net, in a fixed order.
pub fn sum_deductions(
    federal_tax: f64,
    state_tax: f64,
    local_tax: f64,
    payroll_tax: f64,
    contributions: f64,
    health_premium: f64,
    medicare_premium: f64,
) -> f64 {
    federal_tax
        + state_tax
        + local_tax
        + payroll_tax
        + contributions
        + health_premium
        + medicare_premium
}
