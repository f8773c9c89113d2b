//! MIP backend adapters
//!
//! The builder's vendor-neutral model is handed to a [`MipBackend`]. Two
//! adapters are bundled: an exact solve through `good_lp` on the pure-Rust
//! `microlp` solver, and a no-op stub for tests. Backend failures map to
//! [`SolverError`].

use std::time::{Duration, Instant};

use good_lp::{constraint, variable, variables, Expression, ResolutionError, Solution, SolverModel};
use tracing::{debug, warn};

use crate::application::solvers::mip::model::{Cmp, MipModel, VarDomain};
use crate::application::solvers::schedule::Schedule;
use crate::domain::errors::SolverError;

/// Options accompanying one backend solve
#[derive(Debug, Clone, Default)]
pub struct SolveOptions {
    /// Wall-clock budget; best-effort for backends without native limits
    pub time_limit: Option<Duration>,
    /// Incumbent schedule for warm-start-capable backends
    pub warm_start: Option<Schedule>,
}

/// A full assignment returned by a backend
#[derive(Debug, Clone)]
pub struct MipSolution {
    /// One value per model variable, indexed by `VarId`
    pub values: Vec<f64>,
    pub objective: f64,
}

/// Dispatch target of the builder's vendor-neutral model
#[cfg_attr(test, mockall::automock)]
pub trait MipBackend: Send + Sync {
    fn name(&self) -> &'static str;

    fn solve(&self, model: &MipModel, options: &SolveOptions) -> Result<MipSolution, SolverError>;
}

/// Exact backend: good_lp over the bundled pure-Rust microlp solver
///
/// microlp has no native time limit and no warm starts; the deadline is
/// checked around the (synchronous) solve and the incumbent is ignored.
#[derive(Debug, Default, Clone, Copy)]
pub struct GoodLpBackend;

impl MipBackend for GoodLpBackend {
    fn name(&self) -> &'static str {
        "good_lp/microlp"
    }

    fn solve(&self, model: &MipModel, options: &SolveOptions) -> Result<MipSolution, SolverError> {
        let started = Instant::now();
        if options.warm_start.is_some() {
            debug!("microlp backend has no warm starts; incumbent ignored");
        }

        let mut vars = variables!();
        let handles: Vec<good_lp::Variable> = model
            .vars
            .iter()
            .map(|var| match var.domain {
                VarDomain::Binary => vars.add(variable().binary()),
                VarDomain::Continuous { min, max } => {
                    if max.is_finite() {
                        vars.add(variable().clamp(min, max))
                    } else {
                        vars.add(variable().min(min))
                    }
                }
            })
            .collect();

        let objective: Expression = model
            .vars
            .iter()
            .zip(&handles)
            .filter(|(var, _)| var.objective != 0.0)
            .map(|(var, handle)| var.objective * *handle)
            .sum();

        let mut problem = vars.maximise(objective.clone()).using(good_lp::microlp);
        for c in &model.constraints {
            let lhs: Expression = c
                .terms
                .iter()
                .map(|(var, coef)| *coef * handles[var.0])
                .sum();
            let constraint = match c.cmp {
                Cmp::Le => constraint::leq(lhs, c.rhs),
                Cmp::Ge => constraint::geq(lhs, c.rhs),
                Cmp::Eq => constraint::eq(lhs, c.rhs),
            };
            problem = problem.with(constraint);
        }

        let solution = problem.solve().map_err(|err| match err {
            ResolutionError::Infeasible => SolverError::Infeasible {
                category: "model".to_string(),
            },
            other => SolverError::Backend(other.to_string()),
        })?;

        if let Some(limit) = options.time_limit {
            if started.elapsed() > limit {
                warn!(
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "MIP solve overran its time budget"
                );
            }
        }

        let values: Vec<f64> = handles.iter().map(|h| solution.value(*h)).collect();
        let objective_value = objective.eval_with(&solution);
        Ok(MipSolution {
            values,
            objective: objective_value,
        })
    }
}

/// Stub backend for tests: returns the all-zero assignment without solving
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopBackend;

impl MipBackend for NoopBackend {
    fn name(&self) -> &'static str {
        "noop"
    }

    fn solve(&self, model: &MipModel, _options: &SolveOptions) -> Result<MipSolution, SolverError> {
        let values = vec![0.0; model.num_vars()];
        let objective = model.evaluate_objective(&values);
        Ok(MipSolution { values, objective })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::solvers::mip::model::{MipModel, VarDomain};

    #[test]
    fn test_good_lp_solves_tiny_binary_model() {
        // max 3a + 2b  s.t.  a + b <= 1
        let mut model = MipModel::new();
        let a = model.add_var("a", VarDomain::Binary, 3.0);
        let b = model.add_var("b", VarDomain::Binary, 2.0);
        model.add_constraint("choose_one", vec![(a, 1.0), (b, 1.0)], Cmp::Le, 1.0);

        let solution = GoodLpBackend
            .solve(&model, &SolveOptions::default())
            .unwrap();
        assert!((solution.objective - 3.0).abs() < 1e-6);
        assert!(solution.values[a.0] > 0.5);
        assert!(solution.values[b.0] < 0.5);
    }

    #[test]
    fn test_good_lp_reports_infeasibility() {
        // a >= 2 with a binary is infeasible
        let mut model = MipModel::new();
        let a = model.add_var("a", VarDomain::Binary, 1.0);
        model.add_constraint("impossible", vec![(a, 1.0)], Cmp::Ge, 2.0);

        let err = GoodLpBackend
            .solve(&model, &SolveOptions::default())
            .unwrap_err();
        assert!(matches!(err, SolverError::Infeasible { .. }));
    }

    #[test]
    fn test_noop_backend_returns_zeroes() {
        let mut model = MipModel::new();
        model.add_var("a", VarDomain::Binary, 5.0);
        let solution = NoopBackend.solve(&model, &SolveOptions::default()).unwrap();
        assert_eq!(solution.values, vec![0.0]);
        assert_eq!(solution.objective, 0.0);
    }
}
