//! Tabu search
//!
//! Best-improvement selection over a sampled neighbourhood, attribute tabu
//! on `(machine, block, day, shift)` tuples with configurable tenure,
//! aspiration on best-so-far, and a diversification restart after a stall.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use tracing::{debug, info};

use crate::application::services::ProblemView;
use crate::application::solvers::operators::{OperatorRegistry, OperatorStats};
use crate::application::solvers::repair::repair;
use crate::application::solvers::rng::{derive_seed, rng_from_seed};
use crate::application::solvers::schedule::Schedule;
use crate::application::solvers::score::score;
use crate::application::solvers::seed::greedy_seed;
use crate::application::solvers::{SearchObserver, SolverOutcome, StepEvent};

/// Tabu search parameters
#[derive(Debug, Clone)]
pub struct TabuConfig {
    pub iters: u64,
    pub seed: u64,
    /// Tabu tenure in iterations; 0 derives a tenure from the problem size
    pub tenure: u64,
    /// Candidates sampled per iteration
    pub sample_size: usize,
    /// Stalled iterations before a diversification restart
    pub stall_limit: u64,
    pub time_limit: Option<Duration>,
}

impl Default for TabuConfig {
    fn default() -> Self {
        Self {
            iters: 1000,
            seed: 0,
            tenure: 0,
            sample_size: 12,
            stall_limit: 150,
            time_limit: None,
        }
    }
}

/// Attribute key: one slot-assignment of a schedule
type Attribute = (usize, usize, usize, usize);

/// Tabu search over the shared operator registry
pub struct TabuSolver {
    config: TabuConfig,
    registry: OperatorRegistry,
}

impl TabuSolver {
    pub fn new(config: TabuConfig) -> Self {
        Self {
            config,
            registry: OperatorRegistry::with_defaults(),
        }
    }

    pub fn with_registry(config: TabuConfig, registry: OperatorRegistry) -> Self {
        Self { config, registry }
    }

    /// Tenure in effect: configured, or derived from the slot count
    fn effective_tenure(&self, view: &ProblemView) -> u64 {
        if self.config.tenure > 0 {
            return self.config.tenure;
        }
        let slots = view.num_machines() * view.num_days() * view.shifts_per_day();
        ((slots as f64).sqrt().ceil() as u64).max(5)
    }

    pub fn solve(
        &self,
        view: &ProblemView,
        incumbent: Option<&Schedule>,
        observer: &dyn SearchObserver,
    ) -> SolverOutcome {
        let started = Instant::now();
        let deadline = self.config.time_limit.map(|limit| started + limit);
        let tenure = self.effective_tenure(view);
        let mut rng = rng_from_seed(self.config.seed);
        let mut diversify_rng = rng_from_seed(derive_seed(self.config.seed, 1));

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

        // Attribute -> iteration until which it stays tabu
        let mut tabu: HashMap<Attribute, u64> = HashMap::new();
        let mut stall: u64 = 0;
        let mut iterations = 0;
        let mut time_limit_reached = false;

        info!(
            seed = self.config.seed,
            tenure, iters = self.config.iters, "starting tabu search"
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

            // Sample the neighbourhood
            let mut sampled = Vec::with_capacity(self.config.sample_size);
            for _ in 0..self.config.sample_size {
                let op_index = self.registry.pick(&mut rng);
                match self.registry.entry(op_index).operator.apply(view, &current, &mut rng) {
                    None => stats[op_index].skipped += 1,
                    Some(candidate) => {
                        stats[op_index].proposals += 1;
                        let repaired = repair(view, &candidate);
                        let candidate_score = score(view, &repaired);
                        sampled.push((op_index, repaired, candidate_score));
                    }
                }
            }

            // Best admissible candidate: non-tabu, or aspirating
            let mut chosen: Option<(usize, Schedule, crate::application::solvers::ScoreBreakdown)> =
                None;
            for (op_index, candidate, candidate_score) in sampled {
                let attributes = changed_attributes(&current, &candidate);
                let is_tabu = attributes
                    .iter()
                    .any(|attr| tabu.get(attr).map(|&until| until > iteration).unwrap_or(false));
                let aspirates = candidate_score.total > best_score.total;
                if is_tabu && !aspirates {
                    continue;
                }
                let better = chosen
                    .as_ref()
                    .map(|(_, _, s)| candidate_score.total > s.total)
                    .unwrap_or(true);
                if better {
                    chosen = Some((op_index, candidate, candidate_score));
                }
            }

            let mut accepted = true;
            let operator = match chosen {
                None => {
                    accepted = false;
                    "tabu_blocked"
                }
                Some((op_index, candidate, candidate_score)) => {
                    // The move's new assignments become tabu to undo
                    for attr in changed_attributes(&candidate, &current) {
                        tabu.insert(attr, iteration + tenure);
                    }
                    stats[op_index].accepted += 1;
                    current = candidate;
                    current_score = candidate_score;
                    self.registry.entry(op_index).operator.name()
                }
            };

            if current_score.total > best_score.total {
                best = current.clone();
                best_score = current_score;
                stall = 0;
            } else {
                stall += 1;
            }

            observer.on_step(&StepEvent {
                iteration,
                best: best_score.total,
                current: current_score.total,
                rolling_mean: current_score.total,
                temperature: 0.0,
                delta_best: best_score.total - previous_best,
                acceptance_window: 0.0,
                accepted,
                operator,
            });

            if stall >= self.config.stall_limit {
                debug!(iteration, "diversification restart");
                current = best.clone();
                for _ in 0..3 {
                    let op = self.registry.entry(self.registry.pick(&mut diversify_rng));
                    if let Some(next) = op.operator.apply(view, &current, &mut diversify_rng) {
                        current = repair(view, &next);
                    }
                }
                current_score = score(view, &current);
                tabu.clear();
                stall = 0;
            }

            // Drop expired entries occasionally to bound the map
            if iteration % 256 == 255 {
                tabu.retain(|_, &mut until| until > iteration);
            }
        }

        let schedule = repair(view, &best);
        let final_score = score(view, &schedule);
        info!(objective = final_score.total, iterations, "tabu search finished");

        SolverOutcome {
            schedule,
            score: final_score,
            iterations,
            elapsed: started.elapsed(),
            time_limit_reached,
            operator_stats: stats,
        }
    }
}

/// Slot assignments present in `a` but not in `b`
fn changed_attributes(a: &Schedule, b: &Schedule) -> Vec<Attribute> {
    a.assignments()
        .filter(|&(m, d, s, block)| b.get(m, d, s) != Some(block))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::services::scenario_validator::ScenarioValidator;
    use crate::application::solvers::NullObserver;
    use crate::domain::entities::definition::*;
    use crate::domain::value_objects::DefaultCosting;
    use std::sync::Arc;

    fn small_view() -> ProblemView {
        let definition = ScenarioDefinition {
            horizon_days: 4,
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
                    work_required: Some(4.0),
                    ..Default::default()
                },
                BlockRow {
                    id: "B2".to_string(),
                    landing_id: "L1".to_string(),
                    work_required: Some(6.0),
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
                    rate: Some(2.0),
                },
                RateRow {
                    machine_id: "M2".to_string(),
                    block_id: "B1".to_string(),
                    rate: Some(2.0),
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
    fn test_tenure_auto_derived() {
        let view = small_view();
        let solver = TabuSolver::new(TabuConfig::default());
        // 2 machines x 4 days x 1 shift = 8 slots, sqrt rounds to 3, floor 5
        assert_eq!(solver.effective_tenure(&view), 5);
        let solver = TabuSolver::new(TabuConfig {
            tenure: 11,
            ..Default::default()
        });
        assert_eq!(solver.effective_tenure(&view), 11);
    }

    #[test]
    fn test_tabu_deterministic_and_not_worse_than_seed() {
        let view = small_view();
        let seed_total = score(&view, &greedy_seed(&view)).total;
        let config = TabuConfig {
            iters: 120,
            seed: 7,
            ..Default::default()
        };
        let a = TabuSolver::new(config.clone()).solve(&view, None, &NullObserver);
        let b = TabuSolver::new(config).solve(&view, None, &NullObserver);
        assert_eq!(a.schedule, b.schedule);
        assert!(a.score.total >= seed_total - 1e-9);
    }

    #[test]
    fn test_changed_attributes() {
        let mut a = Schedule::empty(1, 2, 1);
        let mut b = Schedule::empty(1, 2, 1);
        a.set(0, 0, 0, Some(1));
        b.set(0, 0, 0, Some(2));
        b.set(0, 1, 0, Some(1));
        assert_eq!(changed_attributes(&a, &b), vec![(0, 0, 0, 1)]);
        assert_eq!(
            changed_attributes(&b, &a),
            vec![(0, 0, 0, 2), (0, 1, 0, 1)]
        );
    }
}
