//! Simulated annealing solver
//!
//! Weighted operator draw, Metropolis acceptance, restart-to-best after a
//! stall, and an optional batched mode that samples a set of candidates per
//! iteration and evaluates them on a worker pool. Candidate generation and
//! acceptance draws happen serially on the search thread, so a run is
//! reproducible from its seed at any worker count.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use rand::Rng;
use rayon::prelude::*;
use tracing::{debug, info};

use crate::application::services::ProblemView;
use crate::application::solvers::operators::{OperatorRegistry, OperatorStats};
use crate::application::solvers::repair::repair;
use crate::application::solvers::rng::{rng_from_seed, SolverRng};
use crate::application::solvers::schedule::Schedule;
use crate::application::solvers::score::score;
use crate::application::solvers::seed::greedy_seed;
use crate::application::solvers::{SearchObserver, SolverOutcome, StepEvent};

/// Rolling window length for acceptance statistics
const ACCEPTANCE_WINDOW: usize = 100;

/// Simulated annealing parameters
#[derive(Debug, Clone)]
pub struct SaConfig {
    pub iters: u64,
    pub seed: u64,
    pub temp0: f64,
    pub cooling_rate: f64,
    /// Iterations without improvement before resetting to best-so-far
    pub restart_interval: u64,
    /// Candidates sampled per iteration; `None` disables batching
    pub batch_size: Option<usize>,
    /// Worker threads for batched evaluation; 0 uses the global pool
    pub max_workers: usize,
    pub time_limit: Option<Duration>,
}

impl Default for SaConfig {
    fn default() -> Self {
        Self {
            iters: 2000,
            seed: 0,
            temp0: 10.0,
            cooling_rate: 0.995,
            restart_interval: 250,
            batch_size: None,
            max_workers: 0,
            time_limit: None,
        }
    }
}

/// Simulated annealing over the shared operator registry
pub struct SaSolver {
    config: SaConfig,
    registry: OperatorRegistry,
}

impl SaSolver {
    pub fn new(config: SaConfig) -> Self {
        Self {
            config,
            registry: OperatorRegistry::with_defaults(),
        }
    }

    pub fn with_registry(config: SaConfig, registry: OperatorRegistry) -> Self {
        Self { config, registry }
    }

    pub fn config(&self) -> &SaConfig {
        &self.config
    }

    /// Runs the search from the greedy seed (or the given incumbent)
    ///
    /// # Arguments
    ///
    /// * `view` - Shared problem view
    /// * `incumbent` - Optional warm-start schedule
    /// * `observer` - Step-event sink (telemetry, watcher, or a no-op)
    pub fn solve(
        &self,
        view: &ProblemView,
        incumbent: Option<&Schedule>,
        observer: &dyn SearchObserver,
    ) -> SolverOutcome {
        let started = Instant::now();
        let deadline = self.config.time_limit.map(|limit| started + limit);
        let mut rng = rng_from_seed(self.config.seed);

        let mut stats: Vec<OperatorStats> = (0..self.registry.len())
            .map(|i| {
                let entry = self.registry.entry(i);
                OperatorStats::new(entry.operator.name(), entry.weight)
            })
            .collect();

        let mut current = match incumbent {
            Some(schedule) => repair(view, schedule),
            None => greedy_seed(view),
        };
        let mut current_score = score(view, &current);
        let mut best = current.clone();
        let mut best_score = current_score;

        let mut temperature = self.config.temp0;
        let mut since_improvement: u64 = 0;
        let mut window: VecDeque<bool> = VecDeque::with_capacity(ACCEPTANCE_WINDOW);
        let mut score_window: VecDeque<f64> = VecDeque::with_capacity(ACCEPTANCE_WINDOW);
        let mut time_limit_reached = false;
        let mut iterations = 0;

        info!(
            seed = self.config.seed,
            iters = self.config.iters,
            batch = ?self.config.batch_size,
            "starting simulated annealing"
        );

        for iteration in 0..self.config.iters {
            if let Some(deadline) = deadline {
                if Instant::now() >= deadline {
                    time_limit_reached = true;
                    break;
                }
            }
            iterations = iteration + 1;

            let previous_best = best_score.total;
            let (applied_operator, accepted) = match self.config.batch_size {
                None => self.step_single(
                    view,
                    &mut rng,
                    &mut current,
                    &mut current_score,
                    temperature,
                    &mut stats,
                ),
                Some(batch) => self.step_batched(
                    view,
                    &mut rng,
                    &mut current,
                    &mut current_score,
                    temperature,
                    batch,
                    &mut stats,
                ),
            };

            if current_score.total > best_score.total {
                best = current.clone();
                best_score = current_score;
                since_improvement = 0;
            } else {
                since_improvement += 1;
            }

            if window.len() == ACCEPTANCE_WINDOW {
                window.pop_front();
                score_window.pop_front();
            }
            window.push_back(accepted);
            score_window.push_back(current_score.total);

            let acceptance =
                window.iter().filter(|&&a| a).count() as f64 / window.len().max(1) as f64;
            let rolling_mean =
                score_window.iter().sum::<f64>() / score_window.len().max(1) as f64;
            observer.on_step(&StepEvent {
                iteration,
                best: best_score.total,
                current: current_score.total,
                rolling_mean,
                temperature,
                delta_best: best_score.total - previous_best,
                acceptance_window: acceptance,
                accepted,
                operator: applied_operator,
            });

            temperature = (temperature * self.config.cooling_rate).max(1e-9);

            if self.config.restart_interval > 0 && since_improvement >= self.config.restart_interval
            {
                debug!(iteration, "restarting from best-so-far");
                current = best.clone();
                current_score = best_score;
                temperature = self.config.temp0;
                since_improvement = 0;
            }
        }

        // Final repair before emitting
        let schedule = repair(view, &best);
        let final_score = score(view, &schedule);
        info!(
            objective = final_score.total,
            iterations, time_limit_reached, "simulated annealing finished"
        );

        SolverOutcome {
            schedule,
            score: final_score,
            iterations,
            elapsed: started.elapsed(),
            time_limit_reached,
            operator_stats: stats,
        }
    }

    /// One classic SA step; returns the operator name and acceptance
    fn step_single(
        &self,
        view: &ProblemView,
        rng: &mut SolverRng,
        current: &mut Schedule,
        current_score: &mut crate::application::solvers::ScoreBreakdown,
        temperature: f64,
        stats: &mut [OperatorStats],
    ) -> (&'static str, bool) {
        let op_index = self.registry.pick(rng);
        let entry = self.registry.entry(op_index);
        let name = entry.operator.name();

        let candidate = entry.operator.apply(view, current, rng);
        let draw = rng.gen::<f64>();
        match candidate {
            None => {
                stats[op_index].skipped += 1;
                (name, false)
            }
            Some(candidate) => {
                stats[op_index].proposals += 1;
                let repaired = repair(view, &candidate);
                let candidate_score = score(view, &repaired);
                if metropolis_accepts(
                    candidate_score.total - current_score.total,
                    temperature,
                    draw,
                ) {
                    *current = repaired;
                    *current_score = candidate_score;
                    stats[op_index].accepted += 1;
                    (name, true)
                } else {
                    (name, false)
                }
            }
        }
    }

    /// One batched step: candidates and acceptance draws are generated
    /// serially, evaluation fans out over the pool, and the best accepting
    /// candidate is applied
    #[allow(clippy::too_many_arguments)]
    fn step_batched(
        &self,
        view: &ProblemView,
        rng: &mut SolverRng,
        current: &mut Schedule,
        current_score: &mut crate::application::solvers::ScoreBreakdown,
        temperature: f64,
        batch: usize,
        stats: &mut [OperatorStats],
    ) -> (&'static str, bool) {
        let mut candidates: Vec<(usize, Schedule, f64)> = Vec::with_capacity(batch);
        for _ in 0..batch.max(1) {
            let op_index = self.registry.pick(rng);
            let entry = self.registry.entry(op_index);
            match entry.operator.apply(view, current, rng) {
                None => stats[op_index].skipped += 1,
                Some(candidate) => {
                    stats[op_index].proposals += 1;
                    candidates.push((op_index, candidate, rng.gen::<f64>()));
                }
            }
        }
        if candidates.is_empty() {
            return ("batch", false);
        }

        let evaluate = || {
            candidates
                .par_iter()
                .map(|(op_index, candidate, draw)| {
                    let repaired = repair(view, candidate);
                    let candidate_score = score(view, &repaired);
                    (*op_index, repaired, candidate_score, *draw)
                })
                .collect::<Vec<_>>()
        };
        // Fall back to the global pool if a dedicated one cannot be built
        let evaluated = match self.config.max_workers {
            0 => evaluate(),
            workers => match rayon::ThreadPoolBuilder::new().num_threads(workers).build() {
                Ok(pool) => pool.install(evaluate),
                Err(_) => evaluate(),
            },
        };

        // Best accepting candidate, scanned in generation order
        let mut chosen: Option<(usize, Schedule, crate::application::solvers::ScoreBreakdown)> =
            None;
        for (op_index, repaired, candidate_score, draw) in evaluated {
            if metropolis_accepts(candidate_score.total - current_score.total, temperature, draw) {
                let better = chosen
                    .as_ref()
                    .map(|(_, _, s)| candidate_score.total > s.total)
                    .unwrap_or(true);
                if better {
                    chosen = Some((op_index, repaired, candidate_score));
                }
            }
        }

        match chosen {
            None => ("batch", false),
            Some((op_index, schedule, candidate_score)) => {
                *current = schedule;
                *current_score = candidate_score;
                stats[op_index].accepted += 1;
                (self.registry.entry(op_index).operator.name(), true)
            }
        }
    }
}

/// Metropolis criterion for a maximisation objective
fn metropolis_accepts(delta: f64, temperature: f64, draw: f64) -> bool {
    delta > 0.0 || draw < (delta / temperature.max(1e-9)).exp()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::services::scenario_validator::ScenarioValidator;
    use crate::application::services::ProblemView;
    use crate::application::solvers::NullObserver;
    use crate::domain::entities::definition::*;
    use crate::domain::value_objects::DefaultCosting;
    use std::sync::Arc;

    fn small_view() -> ProblemView {
        let definition = ScenarioDefinition {
            horizon_days: 5,
            landings: vec![LandingRow {
                id: "L1".to_string(),
                daily_capacity: Some(2),
            }],
            machines: vec![
                MachineRow {
                    id: "M1".to_string(),
                    ..Default::default()
                },
                MachineRow {
                    id: "M2".to_string(),
                    ..Default::default()
                },
            ],
            blocks: vec![
                BlockRow {
                    id: "B1".to_string(),
                    landing_id: "L1".to_string(),
                    work_required: Some(6.0),
                    ..Default::default()
                },
                BlockRow {
                    id: "B2".to_string(),
                    landing_id: "L1".to_string(),
                    work_required: Some(4.0),
                    ..Default::default()
                },
            ],
            production_rates: vec![
                RateRow {
                    machine_id: "M1".to_string(),
                    block_id: "B1".to_string(),
                    rate: Some(2.0),
                },
                RateRow {
                    machine_id: "M1".to_string(),
                    block_id: "B2".to_string(),
                    rate: Some(1.0),
                },
                RateRow {
                    machine_id: "M2".to_string(),
                    block_id: "B1".to_string(),
                    rate: Some(1.0),
                },
                RateRow {
                    machine_id: "M2".to_string(),
                    block_id: "B2".to_string(),
                    rate: Some(2.0),
                },
            ],
            ..Default::default()
        };
        let scenario = ScenarioValidator::validate(&definition, &DefaultCosting).unwrap();
        ProblemView::new(Arc::new(scenario))
    }

    #[test]
    fn test_metropolis_always_accepts_improvement() {
        assert!(metropolis_accepts(1.0, 0.001, 0.999));
        assert!(!metropolis_accepts(-100.0, 0.001, 0.5));
    }

    #[test]
    fn test_sa_is_seed_deterministic() {
        let view = small_view();
        let config = SaConfig {
            iters: 200,
            seed: 17,
            ..Default::default()
        };
        let a = SaSolver::new(config.clone()).solve(&view, None, &NullObserver);
        let b = SaSolver::new(config).solve(&view, None, &NullObserver);
        assert_eq!(a.schedule, b.schedule);
        assert_eq!(a.score.total, b.score.total);
    }

    #[test]
    fn test_batched_matches_dimensions_and_finishes() {
        let view = small_view();
        let config = SaConfig {
            iters: 100,
            seed: 3,
            batch_size: Some(4),
            max_workers: 2,
            ..Default::default()
        };
        let outcome = SaSolver::new(config).solve(&view, None, &NullObserver);
        assert_eq!(outcome.iterations, 100);
        // Both blocks are completable in 5 days
        assert_eq!(outcome.score.leftover, 0.0);
    }

    #[test]
    fn test_sa_never_worse_than_seed() {
        let view = small_view();
        let seed_score = score(&view, &greedy_seed(&view));
        let outcome = SaSolver::new(SaConfig {
            iters: 300,
            seed: 5,
            ..Default::default()
        })
        .solve(&view, None, &NullObserver);
        assert!(outcome.score.total >= seed_score.total - 1e-9);
    }

    #[test]
    fn test_time_limit_flag() {
        let view = small_view();
        let config = SaConfig {
            iters: u64::MAX / 2,
            seed: 1,
            time_limit: Some(Duration::from_millis(50)),
            ..Default::default()
        };
        let outcome = SaSolver::new(config).solve(&view, None, &NullObserver);
        assert!(outcome.time_limit_reached);
    }
}
