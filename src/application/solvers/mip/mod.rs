//! MIP formulation and backend adapters

pub mod backend;
pub mod builder;
pub mod model;

use std::time::Instant;

use tracing::info;

use crate::application::services::ProblemView;
use crate::application::solvers::score::score;
use crate::application::solvers::SolverOutcome;
use crate::domain::errors::SolverError;

pub use backend::{GoodLpBackend, MipBackend, MipSolution, NoopBackend, SolveOptions};
pub use builder::{BuiltModel, MipBuilder};
pub use model::{Cmp, MipModel, MipVar, VarDomain, VarId};

/// Builds and solves the MIP for a view, mapping the solution back to a
/// scored schedule
///
/// On a time-limit failure with an incumbent supplied, the incumbent is
/// returned as the best known integer solution with the flag set.
pub fn solve_mip(
    view: &ProblemView,
    backend: &dyn MipBackend,
    options: &SolveOptions,
) -> Result<SolverOutcome, SolverError> {
    let started = Instant::now();
    let built = MipBuilder::build(view);
    info!(
        backend = backend.name(),
        vars = built.model.num_vars(),
        constraints = built.model.num_constraints(),
        "solving MIP"
    );

    match backend.solve(&built.model, options) {
        Ok(solution) => {
            let schedule = built.extract_schedule(&solution);
            let outcome_score = score(view, &schedule);
            let elapsed = started.elapsed();
            let time_limit_reached = options
                .time_limit
                .map(|limit| elapsed > limit)
                .unwrap_or(false);
            Ok(SolverOutcome {
                schedule,
                score: outcome_score,
                iterations: 1,
                elapsed,
                time_limit_reached,
                operator_stats: Vec::new(),
            })
        }
        Err(SolverError::TimeLimit) => match &options.warm_start {
            Some(incumbent) => {
                let outcome_score = score(view, incumbent);
                Ok(SolverOutcome {
                    schedule: incumbent.clone(),
                    score: outcome_score,
                    iterations: 1,
                    elapsed: started.elapsed(),
                    time_limit_reached: true,
                    operator_stats: Vec::new(),
                })
            }
            None => Err(SolverError::TimeLimit),
        },
        Err(err) => Err(err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::services::scenario_validator::ScenarioValidator;
    use crate::application::solvers::score;
    use crate::domain::entities::definition::*;
    use crate::domain::value_objects::DefaultCosting;
    use std::sync::Arc;

    fn one_machine_view() -> ProblemView {
        let definition = ScenarioDefinition {
            horizon_days: 3,
            landings: vec![LandingRow {
                id: "L1".to_string(),
                daily_capacity: Some(1),
            }],
            machines: vec![MachineRow {
                id: "M1".to_string(),
                ..Default::default()
            }],
            blocks: vec![BlockRow {
                id: "B1".to_string(),
                landing_id: "L1".to_string(),
                work_required: Some(2.0),
                ..Default::default()
            }],
            production_rates: vec![RateRow {
                machine_id: "M1".to_string(),
                block_id: "B1".to_string(),
                rate: Some(1.0),
            }],
            ..Default::default()
        };
        let scenario = ScenarioValidator::validate(&definition, &DefaultCosting).unwrap();
        ProblemView::new(Arc::new(scenario))
    }

    #[test]
    fn test_exact_solve_completes_block() {
        let view = one_machine_view();
        let outcome = solve_mip(&view, &GoodLpBackend, &SolveOptions::default()).unwrap();
        // Two units at rate one: the block completes
        assert_eq!(outcome.score.completed_blocks, 1);
        assert_eq!(outcome.score.leftover, 0.0);
        // The solver's objective agrees with the shared scoring
        assert!((outcome.score.total - score::score(&view, &outcome.schedule).total).abs() < 1e-6);
    }

    #[test]
    fn test_noop_solve_extracts_empty_schedule() {
        let view = one_machine_view();
        let outcome = solve_mip(&view, &NoopBackend, &SolveOptions::default()).unwrap();
        assert_eq!(outcome.schedule.assigned_count(), 0);
    }

    #[test]
    fn test_time_limit_error_falls_back_to_incumbent() {
        let mut backend = backend::MockMipBackend::new();
        backend.expect_name().return_const("always_times_out");
        backend
            .expect_solve()
            .returning(|_, _| Err(SolverError::TimeLimit));

        let view = one_machine_view();
        let incumbent = crate::application::solvers::seed::greedy_seed(&view);
        let options = SolveOptions {
            warm_start: Some(incumbent.clone()),
            ..Default::default()
        };
        let outcome = solve_mip(&view, &backend, &options).unwrap();
        assert!(outcome.time_limit_reached);
        assert_eq!(outcome.schedule, incumbent);

        let err = solve_mip(&view, &backend, &SolveOptions::default()).unwrap_err();
        assert!(matches!(err, SolverError::TimeLimit));
    }
}
