//! FHOPS: operational forest-harvesting scheduler
//!
//! Assigns at most one timber block per machine per (day, shift) over a
//! finite horizon, honouring machine availability, harvest-system role
//! precedence inside each block, landing capacities, pre-locked
//! assignments, and blackout windows, while trading production off against
//! mobilisation cost, transition count, and soft landing-capacity slack.
//!
//! The crate is organised in three layers:
//!
//! - [`domain`]: typed scenario entities, value objects, and error kinds
//! - [`application`]: the scenario validator and problem view, the MIP
//!   builder with its backend adapters, the SA / ILS / Tabu heuristic stack,
//!   deterministic and stochastic playback with the KPI bundle, and the
//!   rolling-horizon planning controller
//! - [`infrastructure`]: scenario/CSV parsers and the output side
//!   (assignment CSV, KPI JSON, telemetry JSONL with its SQLite mirror,
//!   and the live watcher feed)
//!
//! The CLI, productivity regressions, costing helpers, GeoJSON distance
//! derivation, and dataset generators live outside this crate and consume
//! its library API.

pub mod application;
pub mod domain;
pub mod infrastructure;

pub use application::services::{
    play_deterministic, play_stochastic, AssignmentRow, KpiBundle, ProblemView, SamplingConfig,
    ScenarioValidator,
};
pub use application::solvers::{SaConfig, SaSolver, Schedule, SolverOutcome};
pub use application::use_cases::{PlanningController, RollingHorizonConfig, SolveScenario, SolverChoice};
pub use domain::entities::Scenario;
pub use domain::errors::{PlaybackError, ScenarioError, SolverError};

use tracing_subscriber::{fmt, EnvFilter};

/// Initialises tracing for embedders and tests
///
/// Honours `RUST_LOG` when set; `verbose` raises the crate's level to
/// debug. Calling this twice is a no-op (the second init fails quietly).
pub fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("fhops=debug,info")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("fhops=info"))
    };

    let _ = fmt().with_env_filter(filter).with_target(false).try_init();
}
