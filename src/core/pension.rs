use chrono::{Datelike, NaiveDate};

use super::dates::{age_on, years_between};
use super::types::Person;

/// FERS basic annuity for a given retirement date.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct PensionAmounts {
    /// Annual annuity before any reduction.
    pub gross: f64,
    /// After the early-retirement reduction, before the survivor election.
    pub annual: f64,
    /// What the retiree is paid after the survivor election.
    pub reduced: f64,
    /// Base annuity a surviving spouse receives.
    pub survivor_annuity: f64,
    pub service_years: f64,
    pub multiplier: f64,
    pub supplement_eligible: bool,
}

/// Minimum retirement age in months, phased in by birth year.
pub fn minimum_retirement_age_months(birth_year: i32) -> u32 {
    match birth_year {
        ..=1947 => 55 * 12,
        1948..=1952 => 55 * 12 + 2 * (birth_year - 1947) as u32,
        1953..=1964 => 56 * 12,
        1965..=1969 => 56 * 12 + 2 * (birth_year - 1964) as u32,
        _ => 57 * 12,
    }
}

fn age_in_months(birth: NaiveDate, date: NaiveDate) -> u32 {
    let years = age_on(birth, date);
    let mut months = date.month() as i32 - birth.month() as i32;
    if date.day() < birth.day() {
        months -= 1;
    }
    years * 12 + months.rem_euclid(12) as u32
}

pub fn survivor_reduction_rate(election: f64) -> f64 {
    if election >= 0.5 - 1e-9 {
        0.10
    } else if election >= 0.25 - 1e-9 {
        0.05
    } else {
        0.0
    }
}

pub fn pension(person: &Person, retirement_date: NaiveDate) -> PensionAmounts {
    let service_years = years_between(person.hire_date, retirement_date);
    let age_months = age_in_months(person.birth_date, retirement_date);
    let age = age_months / 12;
    let mra_months = minimum_retirement_age_months(person.birth_date.year());

    let multiplier = if age >= 62 && service_years >= 20.0 {
        0.011
    } else {
        0.010
    };
    let gross = (person.high_three() * service_years * multiplier).max(0.0);

    let unreduced = (age >= 62 && service_years >= 5.0)
        || (age >= 60 && service_years >= 20.0)
        || (age_months >= mra_months && service_years >= 30.0);

    // MRA+10 and deferred cases: 5% per year (5/12% per month) under 62.
    let age_factor = if unreduced {
        1.0
    } else {
        let months_under_62 = (62 * 12_u32).saturating_sub(age_months) as f64;
        (1.0 - months_under_62 * 0.05 / 12.0).max(0.0)
    };

    let election = person.survivor_election.clamp(0.0, 0.5);
    let annual = gross * age_factor;
    let reduced = (annual - gross * survivor_reduction_rate(election)).max(0.0);

    PensionAmounts {
        gross,
        annual,
        reduced,
        survivor_annuity: gross * election,
        service_years,
        multiplier,
        supplement_eligible: unreduced && age < 62,
    }
}

/// Tiered FERS COLA for a year's inflation.
pub fn fers_cola(inflation: f64) -> f64 {
    if inflation <= 0.02 {
        inflation.max(0.0)
    } else if inflation <= 0.03 {
        0.02
    } else {
        inflation - 0.01
    }
}

/// Annual FERS supplement: the age-62 benefit estimate scaled by whole service years / 40.
pub fn fers_supplement(person: &Person, amounts: &PensionAmounts) -> f64 {
    if !amounts.supplement_eligible {
        return 0.0;
    }
    let years = amounts.service_years.floor().min(40.0);
    (person.benefit_at_62 * years / 40.0).max(0.0)
}
