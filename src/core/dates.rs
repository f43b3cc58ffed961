use chrono::{DateTime, Datelike, NaiveDate, Utc};

/// Source of "now". Engines take one at construction so tests can pin the date.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;

    fn today(&self) -> NaiveDate {
        self.now().date_naive()
    }

    fn current_year(&self) -> i32 {
        self.today().year()
    }

    /// High-resolution seed material for unseeded simulation batches.
    fn seed_nanos(&self) -> u64 {
        let now = self.now();
        now.timestamp_nanos_opt()
            .map(|n| n as u64)
            .unwrap_or_else(|| now.timestamp_micros() as u64)
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl FixedClock {
    pub fn on(date: NaiveDate) -> Self {
        Self(date.and_hms_opt(0, 0, 0).unwrap_or_default().and_utc())
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

pub fn jan_1(year: i32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, 1, 1).unwrap_or(NaiveDate::MIN)
}

pub fn dec_31(year: i32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, 12, 31).unwrap_or(NaiveDate::MAX)
}

pub fn days_in_year(year: i32) -> i64 {
    if NaiveDate::from_ymd_opt(year, 2, 29).is_some() {
        366
    } else {
        365
    }
}

/// Whole years completed on `date`.
pub fn age_on(birth: NaiveDate, date: NaiveDate) -> u32 {
    if date < birth {
        return 0;
    }
    let mut age = date.year() - birth.year();
    if (date.month(), date.day()) < (birth.month(), birth.day()) {
        age -= 1;
    }
    age.max(0) as u32
}

/// The date someone turns `age`. Feb 29 birthdays fall on Feb 28 in common years.
pub fn birthday_at(birth: NaiveDate, age: u32) -> NaiveDate {
    let year = birth.year() + age as i32;
    NaiveDate::from_ymd_opt(year, birth.month(), birth.day())
        .or_else(|| NaiveDate::from_ymd_opt(year, birth.month(), 28))
        .unwrap_or(NaiveDate::MAX)
}

/// Share of the year worked before retiring. Uses a flat 365-day year.
pub fn work_fraction(retirement: NaiveDate) -> f64 {
    let days = (retirement - jan_1(retirement.year())).num_days();
    (days as f64 / 365.0).clamp(0.0, 1.0)
}

/// Share of the calendar year elapsed before `date`, on the true day count.
pub fn fraction_before(date: NaiveDate) -> f64 {
    let year = date.year();
    let days = (date - jan_1(year)).num_days();
    (days as f64 / days_in_year(year) as f64).clamp(0.0, 1.0)
}

/// Share of the calendar year from `date` (inclusive) to year end, on the true day count.
pub fn fraction_from(date: NaiveDate) -> f64 {
    1.0 - fraction_before(date)
}

/// Fractional years between two dates on a 365.25-day year.
pub fn years_between(start: NaiveDate, end: NaiveDate) -> f64 {
    ((end - start).num_days() as f64 / 365.25).max(0.0)
}
