/// Age at which required distributions begin, phased in by birth year.
pub fn rmd_start_age(birth_year: i32) -> u32 {
    match birth_year {
        ..=1950 => 72,
        1951..=1959 => 73,
        _ => 75,
    }
}

// IRS Uniform Lifetime Table (2022), ages 72 through 120.
const UNIFORM_LIFETIME: [f64; 49] = [
    27.4, 26.5, 25.5, 24.6, 23.7, 22.9, 22.0, 21.1, 20.2, 19.4, 18.5, 17.7, 16.8, 16.0, 15.2,
    14.4, 13.7, 12.9, 12.2, 11.5, 10.8, 10.1, 9.5, 8.9, 8.4, 7.8, 7.3, 6.8, 6.4, 6.0, 5.6, 5.2,
    4.9, 4.6, 4.3, 4.1, 3.9, 3.7, 3.5, 3.4, 3.3, 3.1, 3.0, 2.9, 2.8, 2.7, 2.5, 2.3, 2.0,
];

pub fn distribution_period(age: u32) -> f64 {
    let idx = age.saturating_sub(72) as usize;
    UNIFORM_LIFETIME
        .get(idx)
        .copied()
        .unwrap_or(UNIFORM_LIFETIME[UNIFORM_LIFETIME.len() - 1])
}

pub fn is_rmd_age(birth_year: i32, age: u32) -> bool {
    age >= rmd_start_age(birth_year)
}

/// Full-year required distribution; zero before the start age.
pub fn required_minimum_distribution(balance: f64, birth_year: i32, age: u32) -> f64 {
    if !is_rmd_age(birth_year, age) || balance <= 0.0 {
        return 0.0;
    }
    balance / distribution_period(age)
}
