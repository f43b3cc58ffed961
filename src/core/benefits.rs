use chrono::{Datelike, NaiveDate};

use super::types::Person;

/// Full retirement age in months, by birth year.
pub fn full_retirement_age_months(birth_year: i32) -> u32 {
    match birth_year {
        ..=1937 => 65 * 12,
        1938..=1942 => 65 * 12 + 2 * (birth_year - 1937) as u32,
        1943..=1954 => 66 * 12,
        1955..=1959 => 66 * 12 + 2 * (birth_year - 1954) as u32,
        _ => 67 * 12,
    }
}

const MAX_DELAY_CREDIT_MONTHS: u32 = 48;

/// Benefit payable when claiming at `claiming_age_months`, given the full-age amount.
pub fn benefit_at_claiming_age(
    benefit_at_full_age: f64,
    birth_date: NaiveDate,
    claiming_age_months: u32,
) -> f64 {
    let fra = full_retirement_age_months(birth_date.year());
    let factor = if claiming_age_months < fra {
        let early = (fra - claiming_age_months) as f64;
        let first = early.min(36.0);
        let beyond = (early - 36.0).max(0.0);
        1.0 - first * 5.0 / 900.0 - beyond * 5.0 / 1200.0
    } else {
        let late = (claiming_age_months - fra).min(MAX_DELAY_CREDIT_MONTHS) as f64;
        1.0 + late * 2.0 / 300.0
    };
    (benefit_at_full_age * factor).max(0.0)
}

/// A person's own annual benefit at their claiming age. Published 62 and 70
/// estimates are used verbatim when they match the claim age.
pub fn own_benefit(person: &Person, claiming_age: u32) -> f64 {
    match claiming_age {
        62 if person.benefit_at_62 > 0.0 => person.benefit_at_62,
        70 if person.benefit_at_70 > 0.0 => person.benefit_at_70,
        _ => benefit_at_claiming_age(
            person.benefit_at_full_age,
            person.birth_date,
            claiming_age * 12,
        ),
    }
}

const SURVIVOR_MIN_AGE: u32 = 60;
const SURVIVOR_MIN_FACTOR: f64 = 0.715;

/// Share of the deceased's benefit a survivor receives at `survivor_age`.
/// Linear from 71.5% at 60 to 100% at the survivor's full retirement age.
pub fn survivor_benefit_factor(survivor_age: u32, survivor_birth_year: i32) -> f64 {
    if survivor_age < SURVIVOR_MIN_AGE {
        return 0.0;
    }
    let fra_years = full_retirement_age_months(survivor_birth_year) as f64 / 12.0;
    let span = fra_years - SURVIVOR_MIN_AGE as f64;
    if span <= 0.0 {
        return 1.0;
    }
    let progress = ((survivor_age - SURVIVOR_MIN_AGE) as f64 / span).min(1.0);
    SURVIVOR_MIN_FACTOR + (1.0 - SURVIVOR_MIN_FACTOR) * progress
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-9;

    fn assert_approx(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() <= EPS,
            "expected {expected}, got {actual}"
        );
    }

    fn born(year: i32) -> NaiveDate {
        NaiveDate::from_ymd_opt(year, 3, 1).unwrap()
    }

    #[test]
    fn fra_phases_in() {
        assert_eq!(full_retirement_age_months(1937), 780);
        assert_eq!(full_retirement_age_months(1940), 65 * 12 + 6);
        assert_eq!(full_retirement_age_months(1950), 792);
        assert_eq!(full_retirement_age_months(1957), 66 * 12 + 6);
        assert_eq!(full_retirement_age_months(1962), 804);
    }

    #[test]
    fn claiming_five_years_early_is_thirty_percent_reduction() {
        assert_approx(benefit_at_claiming_age(2_000.0, born(1965), 62 * 12), 1_400.0);
    }

    #[test]
    fn claiming_three_years_early_uses_only_first_tier() {
        assert_approx(benefit_at_claiming_age(1_000.0, born(1965), 64 * 12), 800.0);
    }

    #[test]
    fn delay_credits_cap_at_48_months() {
        // FRA 66 -> 70 is exactly 48 months: +32%.
        assert_approx(benefit_at_claiming_age(1_000.0, born(1950), 70 * 12), 1_320.0);
        assert_approx(benefit_at_claiming_age(1_000.0, born(1950), 72 * 12), 1_320.0);
        // FRA 67 -> 70 earns 36 months: +24%.
        assert_approx(benefit_at_claiming_age(1_000.0, born(1965), 70 * 12), 1_240.0);
    }

    #[test]
    fn survivor_factor_interpolates_to_full_age() {
        assert_approx(survivor_benefit_factor(59, 1965), 0.0);
        assert_approx(survivor_benefit_factor(60, 1965), 0.715);
        assert_approx(survivor_benefit_factor(67, 1965), 1.0);
        assert_approx(survivor_benefit_factor(75, 1965), 1.0);
        let mid = survivor_benefit_factor(63, 1965);
        assert_approx(mid, 0.715 + 0.285 * 3.0 / 7.0);
    }
}
