use chrono::NaiveDate;
use thiserror::Error;

/// Errors raised before a projection starts, or by analyses that read past its horizon.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ProjectionError {
    #[error("{person}: retirement date {retirement} is before hire date {hire}")]
    RetirementBeforeHire {
        person: &'static str,
        retirement: NaiveDate,
        hire: NaiveDate,
    },

    #[error("{person}: hire date {hire} is before birth date {birth}")]
    HireBeforeBirth {
        person: &'static str,
        hire: NaiveDate,
        birth: NaiveDate,
    },

    #[error("{name} {value} is outside the supported range [{min}, {max}]")]
    RateOutOfRange {
        name: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },

    #[error("projection horizon must be between 1 and {max} years, got {years}")]
    InvalidHorizon { years: u32, max: u32 },

    #[error("{person}: survivor election must be 0, 0.25 or 0.5, got {value}")]
    InvalidSurvivorElection { person: &'static str, value: f64 },

    #[error("{person}: claiming age must be between 62 and 70, got {age}")]
    InvalidClaimingAge { person: &'static str, age: u32 },

    #[error("{person}: {field} must be finite and >= 0, got {value}")]
    NegativeAmount {
        person: &'static str,
        field: &'static str,
        value: f64,
    },

    #[error("invalid fund allocation: {reason}")]
    InvalidAllocation { reason: String },

    #[error("year {requested} is beyond the projected horizon of {horizon} years")]
    HorizonExceeded { requested: u32, horizon: u32 },
}

#[derive(Debug, Error)]
pub enum SimulationError {
    #[error("historical sampling requested but no historical market data is loaded")]
    HistoricalDataUnavailable,

    #[error("run count must be > 0")]
    NoRuns,

    #[error("failed to build the simulation worker pool: {0}")]
    WorkerPool(String),

    #[error(transparent)]
    Projection(#[from] ProjectionError),
}

#[derive(Debug, Error)]
pub enum SolverError {
    #[error("invalid search configuration: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    Projection(#[from] ProjectionError),
}
