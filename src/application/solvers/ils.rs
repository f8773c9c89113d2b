//! Iterated local search
//!
//! Wraps simulated annealing in an outer loop: perturb the working
//! schedule with a handful of random operator applications, descend with a
//! short SA phase, keep the result if it improves, and fall back to the
//! best-so-far (or to a short MIP solve in hybrid mode) after a stall.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{info, warn};

use crate::application::services::ProblemView;
use crate::application::solvers::annealing::{SaConfig, SaSolver};
use crate::application::solvers::mip::backend::{MipBackend, SolveOptions};
use crate::application::solvers::mip::builder::MipBuilder;
use crate::application::solvers::operators::OperatorRegistry;
use crate::application::solvers::repair::repair;
use crate::application::solvers::rng::{derive_seed, rng_from_seed};
use crate::application::solvers::schedule::Schedule;
use crate::application::solvers::score::score;
use crate::application::solvers::{SearchObserver, SolverOutcome};

/// Iterated local search parameters
#[derive(Debug, Clone)]
pub struct IlsConfig {
    /// Outer perturb-and-descend phases
    pub outer_iters: u64,
    /// Random operator applications per perturbation
    pub perturbation_strength: u32,
    /// Stalled outer phases before restarting from best-so-far
    pub stall_limit: u64,
    /// Re-seed the inner phase from a short MIP solve after a stall
    pub hybrid_use_mip: bool,
    pub seed: u64,
    pub time_limit: Option<Duration>,
    /// Time granted to a hybrid MIP re-seed
    pub mip_time_limit: Duration,
    /// Inner SA phase template; its seed is derived per phase
    pub inner: SaConfig,
}

impl Default for IlsConfig {
    fn default() -> Self {
        Self {
            outer_iters: 10,
            perturbation_strength: 3,
            stall_limit: 3,
            hybrid_use_mip: false,
            seed: 0,
            time_limit: None,
            mip_time_limit: Duration::from_secs(2),
            inner: SaConfig {
                iters: 400,
                ..Default::default()
            },
        }
    }
}

/// ILS solver composed from the SA engine and the operator registry
pub struct IlsSolver {
    config: IlsConfig,
    registry: OperatorRegistry,
    mip_backend: Option<Arc<dyn MipBackend>>,
}

impl IlsSolver {
    pub fn new(config: IlsConfig) -> Self {
        Self {
            config,
            registry: OperatorRegistry::with_defaults(),
            mip_backend: None,
        }
    }

    /// Supplies the backend used for hybrid MIP re-seeding
    pub fn with_mip_seed(mut self, backend: Arc<dyn MipBackend>) -> Self {
        self.mip_backend = Some(backend);
        self
    }

    pub fn solve(
        &self,
        view: &ProblemView,
        incumbent: Option<&Schedule>,
        observer: &dyn SearchObserver,
    ) -> SolverOutcome {
        let started = Instant::now();
        let deadline = self.config.time_limit.map(|limit| started + limit);
        let mut perturb_rng = rng_from_seed(derive_seed(self.config.seed, u64::MAX));

        let mut working: Option<Schedule> = incumbent.cloned();
        let mut best: Option<Schedule> = None;
        let mut best_total = f64::NEG_INFINITY;
        let mut operator_stats = Vec::new();
        let mut iterations = 0;
        let mut time_limit_reached = false;
        let mut stall: u64 = 0;

        for phase in 0..self.config.outer_iters {
            if let Some(deadline) = deadline {
                if Instant::now() >= deadline {
                    time_limit_reached = true;
                    break;
                }
            }

            let perturbed = working.as_ref().map(|schedule| {
                let mut candidate = schedule.clone();
                for _ in 0..self.config.perturbation_strength {
                    let op = self.registry.entry(self.registry.pick(&mut perturb_rng));
                    if let Some(next) = op.operator.apply(view, &candidate, &mut perturb_rng) {
                        candidate = next;
                    }
                }
                repair(view, &candidate)
            });

            let inner_config = SaConfig {
                seed: derive_seed(self.config.seed, phase),
                time_limit: deadline.map(|d| d.saturating_duration_since(Instant::now())),
                ..self.config.inner.clone()
            };
            let outcome =
                SaSolver::new(inner_config).solve(view, perturbed.as_ref(), observer);
            iterations += outcome.iterations;
            time_limit_reached |= outcome.time_limit_reached;
            operator_stats = merge_stats(operator_stats, outcome.operator_stats);

            if outcome.score.total > best_total {
                best_total = outcome.score.total;
                best = Some(outcome.schedule.clone());
                working = Some(outcome.schedule);
                stall = 0;
            } else {
                working = Some(outcome.schedule);
                stall += 1;
                if stall >= self.config.stall_limit {
                    working = self.restart_schedule(view, &best);
                    stall = 0;
                }
            }
        }

        let schedule = repair(
            view,
            best.as_ref().unwrap_or(&Schedule::empty(
                view.num_machines(),
                view.num_days(),
                view.shifts_per_day(),
            )),
        );
        let final_score = score(view, &schedule);
        info!(objective = final_score.total, iterations, "ILS finished");

        SolverOutcome {
            schedule,
            score: final_score,
            iterations,
            elapsed: started.elapsed(),
            time_limit_reached,
            operator_stats,
        }
    }

    /// Restart point after a stall: best-so-far, or a short MIP solve in
    /// hybrid mode
    fn restart_schedule(
        &self,
        view: &ProblemView,
        best: &Option<Schedule>,
    ) -> Option<Schedule> {
        if self.config.hybrid_use_mip {
            if let Some(backend) = &self.mip_backend {
                let built = MipBuilder::build(view);
                let options = SolveOptions {
                    time_limit: Some(self.config.mip_time_limit),
                    warm_start: best.clone(),
                };
                match backend.solve(&built.model, &options) {
                    Ok(solution) => return Some(built.extract_schedule(&solution)),
                    Err(err) => {
                        warn!(error = %err, "hybrid MIP re-seed failed, using best-so-far")
                    }
                }
            }
        }
        best.clone()
    }
}

/// Accumulates per-operator counters across inner phases
fn merge_stats(
    mut into: Vec<crate::application::solvers::OperatorStats>,
    from: Vec<crate::application::solvers::OperatorStats>,
) -> Vec<crate::application::solvers::OperatorStats> {
    if into.is_empty() {
        return from;
    }
    for stat in from {
        match into.iter_mut().find(|s| s.name == stat.name) {
            Some(existing) => {
                existing.proposals += stat.proposals;
                existing.accepted += stat.accepted;
                existing.skipped += stat.skipped;
            }
            None => into.push(stat),
        }
    }
    into
}
