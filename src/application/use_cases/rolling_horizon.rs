//! Rolling-horizon planning controller
//!
//! Builds long plans from short sub-problem solves: slice the scenario to
//! the active window, solve with the accumulated locks as hard constraints,
//! commit the leading days of the solution as new locks, and advance. A
//! time-limited child contributes its best-known schedule with a warning;
//! infeasibility is a hard fail.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{info, warn};

use crate::application::services::playback::{schedule_to_rows, AssignmentRow};
use crate::application::services::ProblemView;
use crate::application::solvers::SearchObserver;
use crate::application::use_cases::solve_scenario::SolveScenario;
use crate::domain::entities::{Scenario, ScheduleLock};
use crate::domain::errors::SolverError;

/// Rolling-horizon parameters; `lock <= sub <= master <= horizon`
#[derive(Debug, Clone, Copy)]
pub struct RollingHorizonConfig {
    pub master_days: u32,
    pub sub_days: u32,
    pub lock_days: u32,
}

impl RollingHorizonConfig {
    /// Checks the parameter ordering against a scenario horizon
    pub fn validate(&self, horizon_days: u32) -> Result<(), String> {
        if self.lock_days == 0 {
            return Err("lock_days must be at least 1".to_string());
        }
        if !(self.lock_days <= self.sub_days
            && self.sub_days <= self.master_days
            && self.master_days <= horizon_days)
        {
            return Err(format!(
                "expected lock <= sub <= master <= horizon, got {} <= {} <= {} <= {}",
                self.lock_days, self.sub_days, self.master_days, horizon_days
            ));
        }
        Ok(())
    }
}

/// Telemetry for one controller iteration
#[derive(Debug, Clone, serde::Serialize)]
pub struct WindowReport {
    pub start_day: u32,
    pub end_day: u32,
    pub objective: f64,
    pub runtime_ms: u64,
    pub lock_span: u32,
    pub warnings: Vec<String>,
}

/// Aggregated plan produced by the controller
#[derive(Debug, Clone)]
pub struct PlanResult {
    pub assignments: Vec<AssignmentRow>,
    pub windows: Vec<WindowReport>,
    /// Locks accumulated over the run (input locks included)
    pub locks: Vec<ScheduleLock>,
    pub solver: &'static str,
    pub config: RollingHorizonConfig,
}

/// The rolling-horizon loop around a solver
pub struct PlanningController {
    config: RollingHorizonConfig,
    solver: SolveScenario,
    window_time_limit: Option<Duration>,
}

impl PlanningController {
    pub fn new(config: RollingHorizonConfig, solver: SolveScenario) -> Self {
        Self {
            config,
            solver,
            window_time_limit: None,
        }
    }

    /// Caps each window solve with a wall-clock budget
    pub fn with_window_time_limit(mut self, limit: Duration) -> Self {
        self.window_time_limit = Some(limit);
        self
    }

    /// Runs the loop over a validated scenario
    pub fn run(&self, scenario: &Scenario) -> Result<PlanResult, SolverError> {
        self.config
            .validate(scenario.horizon_days)
            .map_err(|message| SolverError::Backend(message))?;

        let mut accumulated: Vec<ScheduleLock> = scenario.locks.clone();
        let mut windows: Vec<WindowReport> = Vec::new();
        let mut assignments: Vec<AssignmentRow> = Vec::new();
        let mut start_day = 1u32;

        while start_day <= self.config.master_days {
            let end_day = (start_day + self.config.sub_days - 1).min(self.config.master_days);
            let sliced = Arc::new(slice_scenario(scenario, end_day, &accumulated));
            let view = ProblemView::new(sliced);

            let mut warnings = Vec::new();
            let solve_started = Instant::now();
            // Rebind with the window budget so cancellation propagates down
            let limited;
            let solver = match self.window_time_limit {
                Some(limit) => {
                    limited = self.solver.clone().with_time_limit(limit);
                    &limited
                }
                None => &self.solver,
            };
            let outcome = match solver.execute(&view, None, &NullWindowObserver) {
                Ok(outcome) => outcome,
                Err(SolverError::TimeLimit) => {
                    warn!(start_day, "window solve hit its time limit with no solution");
                    windows.push(WindowReport {
                        start_day,
                        end_day,
                        objective: f64::NEG_INFINITY,
                        runtime_ms: solve_started.elapsed().as_millis() as u64,
                        lock_span: 0,
                        warnings: vec!["time limit with no feasible solution".to_string()],
                    });
                    break;
                }
                Err(err) => return Err(err),
            };
            if outcome.time_limit_reached {
                warnings.push("child solver returned best-known at time limit".to_string());
            }

            // Commit the leading lock_days of this window's solution
            let lock_end_day = (start_day + self.config.lock_days - 1).min(end_day);
            let mut committed = 0u32;
            for (m, d, s, b) in outcome.schedule.assignments() {
                let day = d as u32 + 1;
                if day >= start_day && day <= lock_end_day && view.locked_block_at(m, d, s).is_none()
                {
                    accumulated.push(ScheduleLock::new(
                        view.machine_id(m),
                        view.block_id(b),
                        day,
                        Some(view.shift_id(s).to_string()),
                    ));
                    committed += 1;
                }
            }

            info!(
                start_day,
                end_day,
                objective = outcome.score.total,
                committed,
                "rolling-horizon window solved"
            );
            windows.push(WindowReport {
                start_day,
                end_day,
                objective: outcome.score.total,
                runtime_ms: solve_started.elapsed().as_millis() as u64,
                lock_span: lock_end_day - start_day + 1,
                warnings,
            });

            assignments = schedule_to_rows(&view, &outcome.schedule);
            start_day += self.config.lock_days;
        }

        Ok(PlanResult {
            assignments,
            windows,
            locks: accumulated,
            solver: self.solver.solver_name(),
            config: self.config,
        })
    }

}

/// Observer used inside windows; step streams attach at the outer layer
struct NullWindowObserver;

impl SearchObserver for NullWindowObserver {}

/// Clips a scenario to `[1, end_day]` with the accumulated locks applied
fn slice_scenario(scenario: &Scenario, end_day: u32, locks: &[ScheduleLock]) -> Scenario {
    let mut sliced = scenario.clone();
    sliced.horizon_days = end_day;
    sliced.blocks.retain(|b| b.earliest_start <= end_day);
    for block in &mut sliced.blocks {
        block.latest_finish = block.latest_finish.min(end_day);
    }
    sliced.locks = locks.to_vec();
    sliced
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::services::scenario_validator::ScenarioValidator;
    use crate::application::solvers::annealing::SaConfig;
    use crate::application::use_cases::solve_scenario::SolverChoice;
    use crate::domain::entities::definition::*;
    use crate::domain::value_objects::DefaultCosting;

    fn scenario(horizon: u32) -> Scenario {
        let definition = ScenarioDefinition {
            horizon_days: horizon,
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
                    work_required: Some(6.0),
                    ..Default::default()
                },
            ],
            production_rates: vec![
                RateRow {
                    machine_id: "M1".to_string(),
                    block_id: "B1".to_string(),
                    rate: Some(1.0),
                },
                RateRow {
                    machine_id: "M2".to_string(),
                    block_id: "B2".to_string(),
                    rate: Some(1.0),
                },
            ],
            ..Default::default()
        };
        ScenarioValidator::validate(&definition, &DefaultCosting).unwrap()
    }

    fn sa_solver(seed: u64) -> SolveScenario {
        SolveScenario::new(SolverChoice::Annealing(SaConfig {
            iters: 150,
            seed,
            ..Default::default()
        }))
    }

    #[test]
    fn test_single_window_matches_direct_solve() {
        let scenario = scenario(12);
        let config = RollingHorizonConfig {
            master_days: 12,
            sub_days: 12,
            lock_days: 12,
        };
        let plan = PlanningController::new(config, sa_solver(5))
            .run(&scenario)
            .unwrap();

        let view = ProblemView::new(Arc::new(scenario));
        let direct = sa_solver(5)
            .execute(&view, None, &crate::application::solvers::NullObserver)
            .unwrap();
        assert_eq!(plan.assignments, schedule_to_rows(&view, &direct.schedule));
        assert_eq!(plan.windows.len(), 1);
    }

    #[test]
    fn test_rolling_windows_lock_leading_days() {
        let scenario = scenario(12);
        let config = RollingHorizonConfig {
            master_days: 12,
            sub_days: 6,
            lock_days: 3,
        };
        let plan = PlanningController::new(config, sa_solver(9))
            .run(&scenario)
            .unwrap();
        assert_eq!(plan.windows.len(), 4);

        // The first window's leading locks survive in the final lock set
        let first_window_locks: Vec<&ScheduleLock> =
            plan.locks.iter().filter(|l| l.day <= 3).collect();
        assert!(!first_window_locks.is_empty());

        // Every lock appears in the final assignment table
        for lock in &plan.locks {
            assert!(
                plan.assignments.iter().any(|row| {
                    row.machine_id == lock.machine_id
                        && row.block_id == lock.block_id
                        && row.day == lock.day
                }),
                "lock {:?} missing from final assignments",
                lock
            );
        }
    }

    #[test]
    fn test_invalid_config_rejected() {
        let scenario = scenario(6);
        let config = RollingHorizonConfig {
            master_days: 8,
            sub_days: 4,
            lock_days: 2,
        };
        assert!(PlanningController::new(config, sa_solver(1))
            .run(&scenario)
            .is_err());
    }
}
