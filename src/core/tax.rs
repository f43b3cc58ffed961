//! Simplified fixed-year tax formulas. Every function is total: negative
//! taxable amounts clamp to zero rather than erroring.

use serde::{Deserialize, Serialize};

use super::types::FilingStatus;

#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct IncomeComponents {
    /// Federal wages, after pre-tax retirement contributions.
    pub wages: f64,
    /// Annuities, survivor annuities and the supplement.
    pub pension: f64,
    /// Withdrawals from tax-deferred balances.
    pub withdrawals: f64,
    /// Gross government benefits received.
    pub social_security: f64,
    /// Portion of `social_security` included by the provisional-income test.
    pub taxable_social_security: f64,
}

impl IncomeComponents {
    pub fn other_income(&self) -> f64 {
        self.wages + self.pension + self.withdrawals
    }

    pub fn adjusted_gross(&self) -> f64 {
        self.other_income() + self.taxable_social_security
    }
}

pub trait TaxRules: Send + Sync {
    fn standard_deduction(&self, filing: FilingStatus, senior_count: u32) -> f64;

    fn taxable_social_security(
        &self,
        benefits: f64,
        other_income: f64,
        filing: FilingStatus,
    ) -> f64;

    fn federal_tax(
        &self,
        income: &IncomeComponents,
        filing: FilingStatus,
        senior_count: u32,
    ) -> f64;

    fn state_tax(&self, income: &IncomeComponents, is_retired: bool) -> f64;

    fn local_tax(&self, wage_income: f64, is_retired: bool) -> f64;

    fn payroll_tax(&self, wages: f64, household_wages: f64) -> f64;

    /// Monthly Part B surcharge per enrollee for a given modified AGI.
    fn irmaa_surcharge_monthly(&self, magi: f64, filing: FilingStatus) -> f64;
}

const JOINT_BRACKETS: [(f64, f64); 7] = [
    (23_200.0, 0.10),
    (94_300.0, 0.12),
    (201_050.0, 0.22),
    (383_900.0, 0.24),
    (487_450.0, 0.32),
    (731_200.0, 0.35),
    (f64::INFINITY, 0.37),
];

const SINGLE_BRACKETS: [(f64, f64); 7] = [
    (11_600.0, 0.10),
    (47_150.0, 0.12),
    (100_525.0, 0.22),
    (191_950.0, 0.24),
    (243_725.0, 0.32),
    (609_350.0, 0.35),
    (f64::INFINITY, 0.37),
];

const JOINT_IRMAA: [(f64, f64); 6] = [
    (206_000.0, 0.0),
    (258_000.0, 69.90),
    (322_000.0, 174.70),
    (386_000.0, 279.50),
    (750_000.0, 384.30),
    (f64::INFINITY, 419.30),
];

const SINGLE_IRMAA: [(f64, f64); 6] = [
    (103_000.0, 0.0),
    (129_000.0, 69.90),
    (161_000.0, 174.70),
    (193_000.0, 279.50),
    (500_000.0, 384.30),
    (f64::INFINITY, 419.30),
];

const SOCIAL_SECURITY_WAGE_BASE: f64 = 168_600.0;
const SOCIAL_SECURITY_RATE: f64 = 0.062;
const MEDICARE_RATE: f64 = 0.0145;
const ADDITIONAL_MEDICARE_RATE: f64 = 0.009;
const ADDITIONAL_MEDICARE_THRESHOLD: f64 = 250_000.0;

pub fn bracket_tax(taxable: f64, brackets: &[(f64, f64)]) -> f64 {
    let taxable = taxable.max(0.0);
    let mut tax = 0.0;
    let mut lower = 0.0;
    for &(upper, rate) in brackets {
        if taxable <= lower {
            break;
        }
        tax += (taxable.min(upper) - lower) * rate;
        lower = upper;
    }
    tax
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SimplifiedTaxRules {
    pub state_rate: f64,
    /// Household exclusion applied to pension and withdrawal income once retired.
    pub state_retirement_exclusion: f64,
    pub local_rate: f64,
}

impl Default for SimplifiedTaxRules {
    fn default() -> Self {
        Self {
            state_rate: 0.0575,
            state_retirement_exclusion: 12_000.0,
            local_rate: 0.01,
        }
    }
}

impl TaxRules for SimplifiedTaxRules {
    fn standard_deduction(&self, filing: FilingStatus, senior_count: u32) -> f64 {
        match filing {
            FilingStatus::MarriedFilingJointly => 29_200.0 + 1_550.0 * senior_count.min(2) as f64,
            FilingStatus::Single => 14_600.0 + 1_950.0 * senior_count.min(1) as f64,
        }
    }

    fn taxable_social_security(
        &self,
        benefits: f64,
        other_income: f64,
        filing: FilingStatus,
    ) -> f64 {
        if benefits <= 0.0 {
            return 0.0;
        }
        let (base, adjusted) = match filing {
            FilingStatus::MarriedFilingJointly => (32_000.0, 44_000.0),
            FilingStatus::Single => (25_000.0, 34_000.0),
        };
        let provisional = other_income.max(0.0) + 0.5 * benefits;
        if provisional <= base {
            0.0
        } else if provisional <= adjusted {
            (0.5 * (provisional - base)).min(0.5 * benefits)
        } else {
            let first_tier = (0.5 * (adjusted - base)).min(0.5 * benefits);
            (0.85 * (provisional - adjusted) + first_tier).min(0.85 * benefits)
        }
    }

    fn federal_tax(
        &self,
        income: &IncomeComponents,
        filing: FilingStatus,
        senior_count: u32,
    ) -> f64 {
        let taxable =
            (income.adjusted_gross() - self.standard_deduction(filing, senior_count)).max(0.0);
        match filing {
            FilingStatus::MarriedFilingJointly => bracket_tax(taxable, &JOINT_BRACKETS),
            FilingStatus::Single => bracket_tax(taxable, &SINGLE_BRACKETS),
        }
    }

    fn state_tax(&self, income: &IncomeComponents, is_retired: bool) -> f64 {
        let retirement_income = income.pension + income.withdrawals;
        let excluded = if is_retired {
            retirement_income.min(self.state_retirement_exclusion)
        } else {
            0.0
        };
        let taxable = (income.wages + retirement_income - excluded).max(0.0);
        taxable * self.state_rate
    }

    fn local_tax(&self, wage_income: f64, is_retired: bool) -> f64 {
        if is_retired {
            return 0.0;
        }
        wage_income.max(0.0) * self.local_rate
    }

    fn payroll_tax(&self, wages: f64, household_wages: f64) -> f64 {
        let wages = wages.max(0.0);
        if wages == 0.0 {
            return 0.0;
        }
        let social_security = wages.min(SOCIAL_SECURITY_WAGE_BASE) * SOCIAL_SECURITY_RATE;
        let medicare = wages * MEDICARE_RATE;
        let household = household_wages.max(wages);
        let excess = (household - ADDITIONAL_MEDICARE_THRESHOLD).max(0.0);
        let additional = excess * (wages / household) * ADDITIONAL_MEDICARE_RATE;
        social_security + medicare + additional
    }

    fn irmaa_surcharge_monthly(&self, magi: f64, filing: FilingStatus) -> f64 {
        let tiers = match filing {
            FilingStatus::MarriedFilingJointly => &JOINT_IRMAA,
            FilingStatus::Single => &SINGLE_IRMAA,
        };
        tiers
            .iter()
            .find(|(upper, _)| magi <= *upper)
            .map(|(_, surcharge)| *surcharge)
            .unwrap_or(0.0)
    }
}
