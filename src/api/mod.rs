mod config;

use std::net::SocketAddr;
use std::path::PathBuf;

use axum::{
    Router,
    extract::Json,
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use thiserror::Error;
use tokio::net::TcpListener;
use tracing::info;

use crate::core::{
    AnnualCashFlow, BreakEvenResult, ProjectionError, SamplingMode, SimulationError,
    SimulationResult, SolverError, break_even_withdrawal_rate,
};

pub use config::{AnalysisRequest, ConfigError, MAX_RUNS, SimulationOptions};

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum CliSamplingMode {
    Historical,
    Statistical,
}

impl From<CliSamplingMode> for SamplingMode {
    fn from(value: CliSamplingMode) -> Self {
        match value {
            CliSamplingMode::Historical => SamplingMode::Historical,
            CliSamplingMode::Statistical => SamplingMode::Statistical,
        }
    }
}

#[derive(Parser, Debug)]
#[command(
    name = "fedret",
    about = "Federal retirement projection and Monte Carlo risk analysis (FERS + TSP + Social Security)"
)]
pub struct Cli {
    /// Log at debug level unless RUST_LOG says otherwise.
    #[arg(long, short, global = true)]
    pub verbose: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Serve the HTTP API.
    Serve {
        #[arg(long, default_value_t = 8080)]
        port: u16,
    },
    /// Print the year-by-year projection for a config file.
    Project { config: PathBuf },
    /// Run a Monte Carlo batch for a config file.
    Simulate {
        config: PathBuf,
        #[arg(long)]
        runs: Option<u32>,
        #[arg(long, value_enum)]
        mode: Option<CliSamplingMode>,
        #[arg(long)]
        seed: Option<u64>,
        #[arg(long)]
        workers: Option<usize>,
    },
    /// Find the largest withdrawal rate that preserves the balance through a year.
    BreakEven {
        config: PathBuf,
        #[arg(long)]
        target_year: Option<u32>,
    },
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Projection(#[from] ProjectionError),

    #[error(transparent)]
    Simulation(#[from] SimulationError),

    #[error(transparent)]
    Solver(#[from] SolverError),

    #[error("analysis task failed: {0}")]
    Task(String),

    #[error("failed to encode output: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("server error: {0}")]
    Io(#[from] std::io::Error),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::Config(_)
            | ApiError::Projection(_)
            | ApiError::Simulation(_)
            | ApiError::Solver(_) => StatusCode::BAD_REQUEST,
            ApiError::Task(_) | ApiError::Encode(_) | ApiError::Io(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectResponse {
    pub scenario: String,
    pub start_year: i32,
    pub years: Vec<AnnualCashFlow>,
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

pub fn project(request: &AnalysisRequest) -> Result<ProjectResponse, ApiError> {
    request.validate()?;
    let engine = request.projection_engine();
    let years = engine.project(
        &request.person_a,
        &request.person_b,
        &request.scenario,
        &request.assumptions,
    )?;
    Ok(ProjectResponse {
        scenario: request.scenario.name.clone(),
        start_year: engine.start_year(&request.assumptions),
        years,
    })
}

pub fn simulate(request: &AnalysisRequest) -> Result<SimulationResult, ApiError> {
    request.validate()?;
    let options = &request.simulation;
    let result = request.monte_carlo_engine().simulate(
        &request.scenario_set(),
        options.runs,
        options.mode,
        options.seed,
    )?;
    Ok(result)
}

pub fn break_even(request: &AnalysisRequest) -> Result<BreakEvenResult, ApiError> {
    request.validate()?;
    let result = break_even_withdrawal_rate(
        &request.projection_engine(),
        &request.person_a,
        &request.person_b,
        &request.scenario,
        &request.assumptions,
        request.break_even,
    )?;
    Ok(result)
}

pub async fn run(cli: Cli) -> Result<(), ApiError> {
    match cli.command {
        Command::Serve { port } => run_http_server(port).await?,
        Command::Project { config } => {
            let request = AnalysisRequest::from_path(&config)?;
            print_json(&project(&request)?)?;
        }
        Command::Simulate {
            config,
            runs,
            mode,
            seed,
            workers,
        } => {
            let mut request = AnalysisRequest::from_path(&config)?;
            if let Some(runs) = runs {
                request.simulation.runs = runs;
            }
            if let Some(mode) = mode {
                request.simulation.mode = mode.into();
            }
            if seed.is_some() {
                request.simulation.seed = seed;
            }
            if let Some(workers) = workers {
                request.simulation.engine.workers = workers;
            }
            print_json(&simulate(&request)?)?;
        }
        Command::BreakEven {
            config,
            target_year,
        } => {
            let mut request = AnalysisRequest::from_path(&config)?;
            if let Some(year) = target_year {
                request.break_even.target_year = year;
            }
            print_json(&break_even(&request)?)?;
        }
    }
    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> Result<(), ApiError> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub fn router() -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/api/project", post(project_handler))
        .route("/api/simulate", post(simulate_handler))
        .route("/api/break-even", post(break_even_handler))
        .fallback(not_found_handler)
}

pub async fn run_http_server(port: u16) -> std::io::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr).await?;
    info!(%addr, "fedret HTTP API listening");
    axum::serve(listener, router()).await
}

async fn health_handler() -> Response {
    json_response(StatusCode::OK, HealthResponse { status: "ok" })
}

async fn not_found_handler() -> Response {
    error_response(StatusCode::NOT_FOUND, "Not found")
}

async fn project_handler(Json(request): Json<AnalysisRequest>) -> Response {
    respond(blocking(move || project(&request)).await)
}

async fn simulate_handler(Json(request): Json<AnalysisRequest>) -> Response {
    respond(blocking(move || simulate(&request)).await)
}

async fn break_even_handler(Json(request): Json<AnalysisRequest>) -> Response {
    respond(blocking(move || break_even(&request)).await)
}

/// Projections and batches are CPU-bound; keep them off the async workers.
async fn blocking<T, F>(work: F) -> Result<T, ApiError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, ApiError> + Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|err| ApiError::Task(err.to_string()))?
}

fn respond<T: Serialize>(result: Result<T, ApiError>) -> Response {
    match result {
        Ok(body) => json_response(StatusCode::OK, body),
        Err(err) => {
            tracing::debug!(error = %err, "request rejected");
            error_response(err.status(), &err.to_string())
        }
    }
}

fn json_response<T: Serialize>(status: StatusCode, body: T) -> Response {
    let mut response = (status, Json(body)).into_response();
    response
        .headers_mut()
        .insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
    response
}

fn error_response(status: StatusCode, msg: &str) -> Response {
    json_response(
        status,
        ErrorResponse {
            error: msg.to_string(),
        },
    )
}
