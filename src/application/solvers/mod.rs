//! Solver stack
//!
//! The shared schedule representation, scoring, repair, neighbourhood
//! operators and RNG plumbing, the SA / ILS / Tabu metaheuristics, the
//! multi-start harness, and the MIP builder with its backend adapters.

pub mod annealing;
pub mod ils;
pub mod mip;
pub mod multistart;
pub mod operators;
pub mod repair;
pub mod rng;
pub mod schedule;
pub mod score;
pub mod seed;
pub mod tabu;

use std::time::Duration;

pub use annealing::{SaConfig, SaSolver};
pub use ils::{IlsConfig, IlsSolver};
pub use multistart::multi_start;
pub use operators::{NeighbourhoodOperator, OperatorRegistry, OperatorStats};
pub use rng::{derive_seed, rng_from_seed, SolverRng};
pub use schedule::Schedule;
pub use score::{score, ScoreBreakdown};
pub use tabu::{TabuConfig, TabuSolver};

/// One search step, as reported to observers
#[derive(Debug, Clone, Copy)]
pub struct StepEvent {
    pub iteration: u64,
    /// Best objective so far
    pub best: f64,
    /// Objective of the current schedule
    pub current: f64,
    /// Rolling mean of the current objective over the acceptance window
    pub rolling_mean: f64,
    /// Temperature (zero for solvers without one)
    pub temperature: f64,
    /// Improvement of the best objective at this step
    pub delta_best: f64,
    /// Acceptance rate over the rolling window
    pub acceptance_window: f64,
    /// Whether this step's candidate was accepted
    pub accepted: bool,
    /// Name of the operator applied at this step
    pub operator: &'static str,
}

/// Receives step events from a running solver
///
/// Implementations must be cheap and non-blocking; solvers call them on the
/// search thread.
pub trait SearchObserver: Send + Sync {
    fn on_step(&self, _event: &StepEvent) {}
}

/// Observer that ignores everything
pub struct NullObserver;

impl SearchObserver for NullObserver {}

/// Result of a solver run
#[derive(Debug, Clone)]
pub struct SolverOutcome {
    pub schedule: Schedule,
    pub score: ScoreBreakdown,
    pub iterations: u64,
    pub elapsed: Duration,
    /// Set when the wall-clock deadline cut the run short
    pub time_limit_reached: bool,
    pub operator_stats: Vec<OperatorStats>,
}
