//! Multi-start harness
//!
//! Launches K independent solver runs with derived seeds in parallel and
//! returns the best outcome by score (lowest run index wins ties, so the
//! result is stable at any worker count).

use rayon::prelude::*;
use tracing::info;

use crate::application::solvers::rng::derive_seed;
use crate::application::solvers::SolverOutcome;

/// Summary of one run within a multi-start sweep
#[derive(Debug, Clone, serde::Serialize)]
pub struct RunSummary {
    pub run_index: usize,
    pub seed: u64,
    pub objective: f64,
    pub iterations: u64,
    pub time_limit_reached: bool,
}

/// Runs `runs` independent solves of `run_fn` with seeds derived from
/// `base_seed`, in parallel, and returns the best outcome with per-run
/// summaries
///
/// # Arguments
///
/// * `base_seed` - Parent seed; run `k` receives `derive_seed(base_seed, k)`
/// * `runs` - Number of independent runs
/// * `max_workers` - Worker threads; 0 uses the global pool
/// * `run_fn` - Solver invocation taking `(child_seed, run_index)`
pub fn multi_start<F>(
    base_seed: u64,
    runs: usize,
    max_workers: usize,
    run_fn: F,
) -> (SolverOutcome, Vec<RunSummary>)
where
    F: Fn(u64, usize) -> SolverOutcome + Sync,
{
    assert!(runs > 0, "multi-start needs at least one run");

    let launch = || {
        (0..runs)
            .into_par_iter()
            .map(|k| {
                let child_seed = derive_seed(base_seed, k as u64);
                (k, child_seed, run_fn(child_seed, k))
            })
            .collect::<Vec<_>>()
    };
    // Fall back to the global pool if a dedicated one cannot be built
    let mut results = match max_workers {
        0 => launch(),
        workers => match rayon::ThreadPoolBuilder::new().num_threads(workers).build() {
            Ok(pool) => pool.install(launch),
            Err(_) => launch(),
        },
    };
    results.sort_by_key(|(k, _, _)| *k);

    let summaries: Vec<RunSummary> = results
        .iter()
        .map(|(k, seed, outcome)| RunSummary {
            run_index: *k,
            seed: *seed,
            objective: outcome.score.total,
            iterations: outcome.iterations,
            time_limit_reached: outcome.time_limit_reached,
        })
        .collect();

    // Strict comparison: the lowest run index wins ties
    let mut best_index = 0;
    for i in 1..results.len() {
        if results[i].2.score.total > results[best_index].2.score.total {
            best_index = i;
        }
    }
    let best = results.swap_remove(best_index).2;

    info!(
        runs,
        best_objective = best.score.total,
        "multi-start sweep finished"
    );
    (best, summaries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::services::scenario_validator::ScenarioValidator;
    use crate::application::services::ProblemView;
    use crate::application::solvers::annealing::{SaConfig, SaSolver};
    use crate::application::solvers::NullObserver;
    use crate::domain::entities::definition::*;
    use crate::domain::value_objects::DefaultCosting;
    use std::sync::Arc;

    fn view() -> ProblemView {
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
                work_required: Some(3.0),
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
    fn test_multi_start_returns_best_and_all_summaries() {
        let view = view();
        let (best, summaries) = multi_start(99, 4, 2, |seed, _| {
            SaSolver::new(SaConfig {
                iters: 50,
                seed,
                ..Default::default()
            })
            .solve(&view, None, &NullObserver)
        });
        assert_eq!(summaries.len(), 4);
        for summary in &summaries {
            assert!(best.score.total >= summary.objective - 1e-9);
        }
        // Seeds are distinct
        assert_ne!(summaries[0].seed, summaries[1].seed);
    }

    #[test]
    fn test_multi_start_deterministic() {
        let view = view();
        let run = |seed: u64, _k: usize| {
            SaSolver::new(SaConfig {
                iters: 40,
                seed,
                ..Default::default()
            })
            .solve(&view, None, &NullObserver)
        };
        let (a, _) = multi_start(7, 3, 2, run);
        let (b, _) = multi_start(7, 3, 1, run);
        assert_eq!(a.schedule, b.schedule);
    }
}
