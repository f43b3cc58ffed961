use chrono::{Datelike, NaiveDate};

use super::dates::birthday_at;
use super::types::{MortalitySpec, Person};

/// A resolved death event. `year_index` is 0-based from the projection start
/// and may be negative when the date precedes the projection.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct DeathEvent {
    pub date: NaiveDate,
    pub year_index: i64,
}

/// Explicit death date wins over death age.
pub fn resolve_death_date(person: &Person, spec: &MortalitySpec) -> Option<NaiveDate> {
    spec.death_date
        .or_else(|| spec.death_age.map(|age| birthday_at(person.birth_date, age)))
}

pub fn resolve_death(
    person: &Person,
    spec: Option<&MortalitySpec>,
    start_year: i32,
) -> Option<DeathEvent> {
    let date = resolve_death_date(person, spec?)?;
    Some(DeathEvent {
        date,
        year_index: i64::from(date.year() - start_year),
    })
}

impl DeathEvent {
    pub fn is_dead_by(&self, year_index: u32) -> bool {
        i64::from(year_index) >= self.year_index
    }

    pub fn dies_in(&self, year_index: u32) -> bool {
        i64::from(year_index) == self.year_index
    }
}
