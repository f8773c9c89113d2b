//! Scenario solving use case
//!
//! Dispatches a problem view to the chosen solver (exact MIP or one of the
//! heuristic engines), plumbing the wall-clock deadline through and
//! normalising the result shape.

use std::sync::Arc;
use std::time::Duration;

use crate::application::services::ProblemView;
use crate::application::solvers::annealing::{SaConfig, SaSolver};
use crate::application::solvers::ils::{IlsConfig, IlsSolver};
use crate::application::solvers::mip::{solve_mip, MipBackend, SolveOptions};
use crate::application::solvers::multistart::multi_start;
use crate::application::solvers::tabu::{TabuConfig, TabuSolver};
use crate::application::solvers::{Schedule, SearchObserver, SolverOutcome};
use crate::domain::errors::SolverError;

/// Which solver a solve request runs
#[derive(Clone)]
pub enum SolverChoice {
    Mip { backend: Arc<dyn MipBackend> },
    Annealing(SaConfig),
    Ils(IlsConfig),
    Tabu(TabuConfig),
    /// K independent annealing runs with derived seeds
    MultiStartAnnealing {
        config: SaConfig,
        runs: usize,
        max_workers: usize,
    },
}

impl SolverChoice {
    pub fn name(&self) -> &'static str {
        match self {
            SolverChoice::Mip { .. } => "mip",
            SolverChoice::Annealing(_) => "sa",
            SolverChoice::Ils(_) => "ils",
            SolverChoice::Tabu(_) => "tabu",
            SolverChoice::MultiStartAnnealing { .. } => "multistart_sa",
        }
    }
}

/// Use case: solve one (possibly sliced) scenario
#[derive(Clone)]
pub struct SolveScenario {
    choice: SolverChoice,
    time_limit: Option<Duration>,
}

impl SolveScenario {
    pub fn new(choice: SolverChoice) -> Self {
        Self {
            choice,
            time_limit: None,
        }
    }

    /// Caps the whole solve with a wall-clock deadline
    pub fn with_time_limit(mut self, limit: Duration) -> Self {
        self.time_limit = Some(limit);
        self
    }

    pub fn solver_name(&self) -> &'static str {
        self.choice.name()
    }

    /// Tightest of the configured limit and a solver config's own limit
    fn effective_limit(&self, config_limit: Option<Duration>) -> Option<Duration> {
        match (self.time_limit, config_limit) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    /// Runs the chosen solver
    ///
    /// # Arguments
    ///
    /// * `view` - Problem view of the scenario to solve
    /// * `incumbent` - Warm-start schedule, honoured where supported
    /// * `observer` - Step-event sink
    pub fn execute(
        &self,
        view: &ProblemView,
        incumbent: Option<&Schedule>,
        observer: &dyn SearchObserver,
    ) -> Result<SolverOutcome, SolverError> {
        match &self.choice {
            SolverChoice::Mip { backend } => {
                let options = SolveOptions {
                    time_limit: self.time_limit,
                    warm_start: incumbent.cloned(),
                };
                solve_mip(view, backend.as_ref(), &options)
            }
            SolverChoice::Annealing(config) => {
                let config = SaConfig {
                    time_limit: self.effective_limit(config.time_limit),
                    ..config.clone()
                };
                Ok(SaSolver::new(config).solve(view, incumbent, observer))
            }
            SolverChoice::Ils(config) => {
                let config = IlsConfig {
                    time_limit: self.effective_limit(config.time_limit),
                    ..config.clone()
                };
                Ok(IlsSolver::new(config).solve(view, incumbent, observer))
            }
            SolverChoice::Tabu(config) => {
                let config = TabuConfig {
                    time_limit: self.effective_limit(config.time_limit),
                    ..config.clone()
                };
                Ok(TabuSolver::new(config).solve(view, incumbent, observer))
            }
            SolverChoice::MultiStartAnnealing {
                config,
                runs,
                max_workers,
            } => {
                let base = SaConfig {
                    time_limit: self.effective_limit(config.time_limit),
                    ..config.clone()
                };
                let (best, _summaries) = multi_start(base.seed, *runs, *max_workers, |seed, _| {
                    SaSolver::new(SaConfig {
                        seed,
                        ..base.clone()
                    })
                    .solve(view, incumbent, observer)
                });
                Ok(best)
            }
        }
    }
}
