//! Schedule scoring
//!
//! One scoring function shared by every heuristic, algebraically identical
//! to the MIP objective: credited production (capped per block), completion
//! reward, tiered mobilisation cost, transition count, soft landing slack,
//! and the leftover penalty. The heuristic score and the MIP objective must
//! coincide on any shared feasible schedule.

use crate::application::services::ProblemView;
use crate::application::solvers::schedule::Schedule;

/// Itemised score of a schedule
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ScoreBreakdown {
    /// Production credited in the objective: `Σ_b min(required, produced)`
    pub production_credit: f64,
    /// Count of blocks whose production meets their requirement
    pub completed_blocks: usize,
    /// `Σ_b required(b)` over completed blocks
    pub completion_reward: f64,
    /// Tiered mobilisation cost over intra-day transitions
    pub mobilisation_cost: f64,
    /// Count of intra-day inter-block transitions
    pub transition_count: usize,
    /// `Σ_{l,d} max(0, assigned machines − capacity)`
    pub landing_slack: f64,
    /// `Σ_b max(0, required − produced)`
    pub leftover: f64,
    /// Weighted objective value (maximised)
    pub total: f64,
}

/// Per-block production realised by a schedule, uncapped
pub fn block_production(view: &ProblemView, schedule: &Schedule) -> Vec<f64> {
    let mut produced = vec![0.0; view.num_blocks()];
    for (m, _, _, b) in schedule.assignments() {
        produced[b] += view.rate(m, b);
    }
    produced
}

/// Scores a schedule against the view's objective weights
pub fn score(view: &ProblemView, schedule: &Schedule) -> ScoreBreakdown {
    let weights = view.weights();
    let mut breakdown = ScoreBreakdown::default();

    let produced = block_production(view, schedule);
    for b in 0..view.num_blocks() {
        let required = view.work_required(b);
        breakdown.production_credit += produced[b].min(required);
        if required > 0.0 && produced[b] >= required {
            breakdown.completed_blocks += 1;
            breakdown.completion_reward += required;
        }
        breakdown.leftover += (required - produced[b]).max(0.0);
    }

    // Transitions: consecutive assigned shifts within one machine-day
    for m in 0..view.num_machines() {
        for d in 0..view.num_days() {
            let mut prev: Option<usize> = None;
            for s in 0..view.shifts_per_day() {
                if let Some(b) = schedule.get(m, d, s) {
                    if let Some(p) = prev {
                        if p != b {
                            breakdown.transition_count += 1;
                            breakdown.mobilisation_cost += view.transition_cost(m, p, b);
                        }
                    }
                    prev = Some(b);
                }
            }
        }
    }

    // Soft landing slack; with a zero weight the constraint is hard and the
    // slack term contributes nothing
    for d in 0..view.num_days() {
        let mut machines_at: Vec<Vec<bool>> =
            vec![vec![false; view.num_machines()]; view.num_landings()];
        for m in 0..view.num_machines() {
            for s in 0..view.shifts_per_day() {
                if let Some(b) = schedule.get(m, d, s) {
                    machines_at[view.landing_of(b)][m] = true;
                }
            }
        }
        for (l, machines) in machines_at.iter().enumerate() {
            let count = machines.iter().filter(|&&x| x).count() as f64;
            let over = count - view.landing_capacity(l) as f64;
            if over > 0.0 {
                breakdown.landing_slack += over;
            }
        }
    }

    breakdown.total = weights.production * breakdown.production_credit
        + weights.completion_bonus * breakdown.completion_reward
        - weights.mobilisation * breakdown.mobilisation_cost
        - weights.transitions * breakdown.transition_count as f64
        - weights.landing_slack * breakdown.landing_slack
        - weights.leftover_penalty() * breakdown.leftover;

    breakdown
}

/// Counts sequencing violations: days on which a dependent role's cumulative
/// work on a block exceeds a prerequisite role's cumulative work up to the
/// previous day
pub fn sequencing_violations(view: &ProblemView, schedule: &Schedule) -> Vec<usize> {
    let mut violations = vec![0usize; view.num_blocks()];
    for b in 0..view.num_blocks() {
        let edges = view.precedence_edges(b);
        if edges.is_empty() {
            continue;
        }
        // cum[role][day] = cumulative work by that role on b through day d
        let mut cum = vec![vec![0.0; view.num_days() + 1]; view.num_roles()];
        for (m, d, _, block) in schedule.assignments() {
            if block == b {
                if let Some(role) = view.machine_role(m) {
                    cum[role][d + 1] += view.rate(m, b);
                }
            }
        }
        for role_cum in cum.iter_mut() {
            for d in 1..=view.num_days() {
                role_cum[d] += role_cum[d - 1];
            }
        }
        for d in 1..=view.num_days() {
            for &(prereq, dep) in edges {
                if cum[dep][d] > cum[prereq][d - 1] + 1e-9 {
                    violations[b] += 1;
                }
            }
        }
    }
    violations
}
