use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::{
    BreakEvenConfig, GlidePathTable, GlobalAssumptions, HistoricalData, MonteCarloConfig,
    MonteCarloEngine, Person, ProjectionEngine, ProjectionError, SamplingMode, Scenario,
    ScenarioSet, SimplifiedTaxRules, validate_inputs,
};

pub const MAX_RUNS: u32 = 100_000;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid config JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    Invalid(String),

    #[error(transparent)]
    Projection(#[from] ProjectionError),
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SimulationOptions {
    pub runs: u32,
    pub mode: SamplingMode,
    pub seed: Option<u64>,
    #[serde(flatten)]
    pub engine: MonteCarloConfig,
}

impl Default for SimulationOptions {
    fn default() -> Self {
        Self {
            runs: 1_000,
            mode: SamplingMode::Statistical,
            seed: None,
            engine: MonteCarloConfig::default(),
        }
    }
}

/// One analysis document: the household, the scenario, and everything the
/// engines need. Used as the CLI config file and as every HTTP body.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisRequest {
    pub person_a: Person,
    pub person_b: Person,
    pub scenario: Scenario,
    #[serde(default)]
    pub assumptions: GlobalAssumptions,
    #[serde(default)]
    pub tax: SimplifiedTaxRules,
    #[serde(default)]
    pub simulation: SimulationOptions,
    #[serde(default)]
    pub break_even: BreakEvenConfig,
    #[serde(default)]
    pub historical_data: Option<HistoricalData>,
    #[serde(default)]
    pub glide_paths: Option<GlidePathTable>,
}

impl AnalysisRequest {
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&json)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_inputs(&self.person_a, &self.person_b, &self.scenario, &self.assumptions)?;
        if self.simulation.runs == 0 || self.simulation.runs > MAX_RUNS {
            return Err(ConfigError::Invalid(format!(
                "simulation.runs must be between 1 and {MAX_RUNS}"
            )));
        }
        if self.simulation.engine.workers == 0 {
            return Err(ConfigError::Invalid(
                "simulation.workers must be > 0".to_string(),
            ));
        }
        if !self.tax.state_rate.is_finite() || !(0.0..=1.0).contains(&self.tax.state_rate) {
            return Err(ConfigError::Invalid(
                "tax.stateRate must be between 0 and 1".to_string(),
            ));
        }
        if !self.tax.local_rate.is_finite() || !(0.0..=1.0).contains(&self.tax.local_rate) {
            return Err(ConfigError::Invalid(
                "tax.localRate must be between 0 and 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn projection_engine(&self) -> ProjectionEngine {
        let mut engine = ProjectionEngine::new(Arc::new(self.tax.clone()));
        if let Some(data) = &self.historical_data {
            engine = engine.with_market_data(Arc::new(data.clone()));
        }
        if let Some(paths) = &self.glide_paths {
            engine = engine.with_allocations(Arc::new(paths.clone()));
        }
        engine
    }

    pub fn monte_carlo_engine(&self) -> MonteCarloEngine {
        MonteCarloEngine::new(self.projection_engine()).with_config(self.simulation.engine.clone())
    }

    pub fn scenario_set(&self) -> ScenarioSet {
        ScenarioSet {
            person_a: self.person_a.clone(),
            person_b: self.person_b.clone(),
            scenario: self.scenario.clone(),
            assumptions: self.assumptions.clone(),
        }
    }
}
