//! MIP builder
//!
//! Emits the shift-indexed formulation over a problem view: assignment
//! binaries only where feasible (availability, eligibility, window),
//! production credit capped per block, completion indicators, landing
//! activation and capacity (hard or soft), intra-day transition variables
//! with tiered mobilisation coefficients, cumulative role-precedence
//! constraints, and lock-forcing equalities.

use std::collections::HashMap;

use crate::application::services::ProblemView;
use crate::application::solvers::mip::backend::MipSolution;
use crate::application::solvers::mip::model::{Cmp, MipModel, VarDomain, VarId};
use crate::application::solvers::schedule::Schedule;

/// A built model plus the handles needed to extract and evaluate schedules
pub struct BuiltModel {
    pub model: MipModel,
    /// Assignment variables as (machine, block, day, shift, var)
    x: Vec<(usize, usize, usize, usize, VarId)>,
    credit: Vec<Option<VarId>>,
    completed: Vec<Option<VarId>>,
    leftover: Vec<Option<VarId>>,
    surplus: Vec<Option<VarId>>,
    /// Landing activation variables keyed by (machine, landing, day)
    activation: HashMap<(usize, usize, usize), VarId>,
    /// Soft capacity slack keyed by (landing, day)
    slack: HashMap<(usize, usize), VarId>,
    /// Transition variables as (machine, day, from-shift, from-block,
    /// to-shift, to-block, var)
    transitions: Vec<(usize, usize, usize, usize, usize, usize, VarId)>,
    machines: usize,
    days: usize,
    shifts: usize,
}

/// Builds the MIP for a problem view
pub struct MipBuilder;

impl MipBuilder {
    pub fn build(view: &ProblemView) -> BuiltModel {
        let weights = view.weights();
        let mut model = MipModel::new();

        // x[m,b,d,s], defined only where assignment is feasible
        let mut x = Vec::new();
        let mut x_lookup: HashMap<(usize, usize, usize, usize), VarId> = HashMap::new();
        for m in 0..view.num_machines() {
            for b in 0..view.num_blocks() {
                let (start, end) = view.window(b);
                for d in start..=end {
                    for s in 0..view.shifts_per_day() {
                        if view.slot_allows(m, d, s, b) {
                            let var = model.add_var(
                                format!("x_{}_{}_{}_{}", m, b, d, s),
                                VarDomain::Binary,
                                0.0,
                            );
                            x.push((m, b, d, s, var));
                            x_lookup.insert((m, b, d, s), var);
                        }
                    }
                }
            }
        }

        // One block per (machine, day, shift)
        for m in 0..view.num_machines() {
            for d in 0..view.num_days() {
                for s in 0..view.shifts_per_day() {
                    let terms: Vec<(VarId, f64)> = (0..view.num_blocks())
                        .filter_map(|b| x_lookup.get(&(m, b, d, s)).map(|&v| (v, 1.0)))
                        .collect();
                    if terms.len() > 1 {
                        model.add_constraint(
                            format!("one_block_{}_{}_{}", m, d, s),
                            terms,
                            Cmp::Le,
                            1.0,
                        );
                    }
                }
            }
        }

        // Per-block production accounting
        let mut credit = vec![None; view.num_blocks()];
        let mut completed = vec![None; view.num_blocks()];
        let mut leftover = vec![None; view.num_blocks()];
        let mut surplus = vec![None; view.num_blocks()];
        for b in 0..view.num_blocks() {
            let required = view.work_required(b);
            let production_terms: Vec<(VarId, f64)> = x
                .iter()
                .filter(|&&(_, block, _, _, _)| block == b)
                .map(|&(m, _, _, _, var)| (var, view.rate(m, b)))
                .collect();

            let credit_var = model.add_var(
                format!("credit_{}", b),
                VarDomain::Continuous {
                    min: 0.0,
                    max: required,
                },
                weights.production,
            );
            credit[b] = Some(credit_var);
            // credit <= produced
            let mut terms = vec![(credit_var, 1.0)];
            terms.extend(production_terms.iter().map(|&(v, r)| (v, -r)));
            model.add_constraint(format!("credit_cap_{}", b), terms, Cmp::Le, 0.0);

            let completed_var = model.add_var(
                format!("completed_{}", b),
                VarDomain::Binary,
                weights.completion_bonus * required,
            );
            completed[b] = Some(completed_var);
            // produced >= required * completed
            let mut terms: Vec<(VarId, f64)> = production_terms.clone();
            terms.push((completed_var, -required));
            model.add_constraint(format!("completion_{}", b), terms, Cmp::Ge, 0.0);

            // produced - surplus <= required, surplus free with zero cost so
            // the relaxation stays feasible for over-producing schedules
            let surplus_var = model.add_var(
                format!("surplus_{}", b),
                VarDomain::Continuous {
                    min: 0.0,
                    max: f64::INFINITY,
                },
                0.0,
            );
            surplus[b] = Some(surplus_var);
            let mut terms: Vec<(VarId, f64)> = production_terms.clone();
            terms.push((surplus_var, -1.0));
            model.add_constraint(format!("surplus_{}", b), terms, Cmp::Le, required);

            // produced + leftover >= required
            let leftover_var = model.add_var(
                format!("leftover_{}", b),
                VarDomain::Continuous {
                    min: 0.0,
                    max: required,
                },
                -weights.leftover_penalty(),
            );
            leftover[b] = Some(leftover_var);
            let mut terms: Vec<(VarId, f64)> = production_terms;
            terms.push((leftover_var, 1.0));
            model.add_constraint(format!("leftover_{}", b), terms, Cmp::Ge, required);
        }

        // Landing activation and capacity
        let mut activation: HashMap<(usize, usize, usize), VarId> = HashMap::new();
        for &(m, b, d, _, var) in &x {
            let l = view.landing_of(b);
            let z = *activation.entry((m, l, d)).or_insert_with(|| {
                model.add_var(format!("at_{}_{}_{}", m, l, d), VarDomain::Binary, 0.0)
            });
            // z >= x
            model.add_constraint(
                format!("presence_{}_{}_{}", m, l, d),
                vec![(z, 1.0), (var, -1.0)],
                Cmp::Ge,
                0.0,
            );
        }
        let mut slack: HashMap<(usize, usize), VarId> = HashMap::new();
        for l in 0..view.num_landings() {
            for d in 0..view.num_days() {
                let mut terms: Vec<(VarId, f64)> = (0..view.num_machines())
                    .filter_map(|m| activation.get(&(m, l, d)).map(|&z| (z, 1.0)))
                    .collect();
                if terms.is_empty() {
                    continue;
                }
                if !weights.hard_landing_capacity() {
                    let slack_var = model.add_var(
                        format!("slack_{}_{}", l, d),
                        VarDomain::Continuous {
                            min: 0.0,
                            max: f64::INFINITY,
                        },
                        -weights.landing_slack,
                    );
                    slack.insert((l, d), slack_var);
                    terms.push((slack_var, -1.0));
                }
                model.add_constraint(
                    format!("capacity_{}_{}", l, d),
                    terms,
                    Cmp::Le,
                    view.landing_capacity(l) as f64,
                );
            }
        }

        // Intra-day transition chain: y >= x1 + x2 - 1 - (occupancy between)
        let mut transitions = Vec::new();
        let count_transitions = weights.mobilisation > 0.0 || weights.transitions > 0.0;
        if count_transitions && view.shifts_per_day() > 1 {
            for m in 0..view.num_machines() {
                for d in 0..view.num_days() {
                    for s1 in 0..view.shifts_per_day() {
                        for s2 in (s1 + 1)..view.shifts_per_day() {
                            for b1 in 0..view.num_blocks() {
                                for b2 in 0..view.num_blocks() {
                                    if b1 == b2 {
                                        continue;
                                    }
                                    let (x1, x2) = match (
                                        x_lookup.get(&(m, b1, d, s1)),
                                        x_lookup.get(&(m, b2, d, s2)),
                                    ) {
                                        (Some(&x1), Some(&x2)) => (x1, x2),
                                        _ => continue,
                                    };
                                    let cost = weights.mobilisation
                                        * view.transition_cost(m, b1, b2)
                                        + weights.transitions;
                                    let y = model.add_var(
                                        format!("y_{}_{}_{}_{}_{}_{}", m, d, s1, b1, s2, b2),
                                        VarDomain::Binary,
                                        -cost,
                                    );
                                    transitions.push((m, d, s1, b1, s2, b2, y));
                                    // y - x1 - x2 + (middle occupancy) >= -1
                                    let mut terms =
                                        vec![(y, 1.0), (x1, -1.0), (x2, -1.0)];
                                    for s_mid in (s1 + 1)..s2 {
                                        for b_mid in 0..view.num_blocks() {
                                            if let Some(&x_mid) =
                                                x_lookup.get(&(m, b_mid, d, s_mid))
                                            {
                                                terms.push((x_mid, 1.0));
                                            }
                                        }
                                    }
                                    model.add_constraint(
                                        format!(
                                            "chain_{}_{}_{}_{}_{}_{}",
                                            m, d, s1, b1, s2, b2
                                        ),
                                        terms,
                                        Cmp::Ge,
                                        -1.0,
                                    );
                                }
                            }
                        }
                    }
                }
            }
        }

        // Role precedence, cumulative at day granularity: dependent work
        // through day t never exceeds prerequisite work through day t-1
        for b in 0..view.num_blocks() {
            let edges = view.precedence_edges(b);
            if edges.is_empty() {
                continue;
            }
            for (edge_index, &(prereq, dep)) in edges.iter().enumerate() {
                for t in 0..view.num_days() {
                    let mut terms: Vec<(VarId, f64)> = Vec::new();
                    for &(m, block, d, _, var) in &x {
                        if block != b {
                            continue;
                        }
                        match view.machine_role(m) {
                            Some(role) if role == dep && d <= t => {
                                terms.push((var, view.rate(m, b)));
                            }
                            Some(role) if role == prereq && t > 0 && d <= t - 1 => {
                                terms.push((var, -view.rate(m, b)));
                            }
                            _ => {}
                        }
                    }
                    let has_dependent_term = terms.iter().any(|&(_, coef)| coef > 0.0);
                    if has_dependent_term {
                        model.add_constraint(
                            format!("sequence_{}_{}_{}", b, edge_index, t),
                            terms,
                            Cmp::Le,
                            0.0,
                        );
                    }
                }
            }
        }

        // Locks force their assignment variable to one
        for lock in view.locks() {
            if let Some(&var) = x_lookup.get(&(lock.machine, lock.block, lock.day, lock.shift)) {
                model.add_constraint(
                    format!(
                        "lock_{}_{}_{}_{}",
                        lock.machine, lock.block, lock.day, lock.shift
                    ),
                    vec![(var, 1.0)],
                    Cmp::Eq,
                    1.0,
                );
            }
        }

        BuiltModel {
            model,
            x,
            credit,
            completed,
            leftover,
            surplus,
            activation,
            slack,
            transitions,
            machines: view.num_machines(),
            days: view.num_days(),
            shifts: view.shifts_per_day(),
        }
    }
}

impl BuiltModel {
    /// Maps a backend solution back to a schedule (`x > 0.5`)
    pub fn extract_schedule(&self, solution: &MipSolution) -> Schedule {
        let mut schedule = Schedule::empty(self.machines, self.days, self.shifts);
        for &(m, b, d, s, var) in &self.x {
            if solution.values.get(var.0).copied().unwrap_or(0.0) > 0.5 {
                schedule.set(m, d, s, Some(b));
            }
        }
        schedule
    }

    /// Evaluates the model objective at the assignment induced by a
    /// schedule; used to verify scoring equivalence against the heuristics
    pub fn evaluate_schedule(&self, view: &ProblemView, schedule: &Schedule) -> f64 {
        let mut values = vec![0.0; self.model.num_vars()];

        let mut produced = vec![0.0; view.num_blocks()];
        for &(m, b, d, s, var) in &self.x {
            if schedule.get(m, d, s) == Some(b) {
                values[var.0] = 1.0;
                produced[b] += view.rate(m, b);
            }
        }

        for b in 0..view.num_blocks() {
            let required = view.work_required(b);
            if let Some(var) = self.credit[b] {
                values[var.0] = produced[b].min(required);
            }
            if let Some(var) = self.completed[b] {
                values[var.0] = if required > 0.0 && produced[b] >= required {
                    1.0
                } else {
                    0.0
                };
            }
            if let Some(var) = self.leftover[b] {
                values[var.0] = (required - produced[b]).max(0.0);
            }
            if let Some(var) = self.surplus[b] {
                values[var.0] = (produced[b] - required).max(0.0);
            }
        }

        for (&(m, l, d), &var) in &self.activation {
            let present = (0..self.shifts).any(|s| {
                schedule
                    .get(m, d, s)
                    .map(|b| view.landing_of(b) == l)
                    .unwrap_or(false)
            });
            values[var.0] = if present { 1.0 } else { 0.0 };
        }

        for (&(l, d), &var) in &self.slack {
            let count = (0..self.machines)
                .filter(|&m| {
                    (0..self.shifts)
                        .any(|s| schedule.get(m, d, s).map(|b| view.landing_of(b)) == Some(l))
                })
                .count() as f64;
            values[var.0] = (count - view.landing_capacity(l) as f64).max(0.0);
        }

        // A transition variable fires when its two slots hold its two blocks
        // with no assignment in between
        for &(m, d, s1, b1, s2, b2, var) in &self.transitions {
            let ends_match =
                schedule.get(m, d, s1) == Some(b1) && schedule.get(m, d, s2) == Some(b2);
            let gap_empty = ((s1 + 1)..s2).all(|s| schedule.get(m, d, s).is_none());
            values[var.0] = if ends_match && gap_empty { 1.0 } else { 0.0 };
        }

        self.model.evaluate_objective(&values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::services::scenario_validator::ScenarioValidator;
    use crate::application::solvers::score::score;
    use crate::application::solvers::seed::greedy_seed;
    use crate::domain::entities::definition::*;
    use crate::domain::value_objects::DefaultCosting;
    use std::sync::Arc;

    fn definition() -> ScenarioDefinition {
        ScenarioDefinition {
            horizon_days: 3,
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
                    work_required: Some(2.0),
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
                    block_id: "B2".to_string(),
                    rate: Some(2.0),
                },
            ],
            ..Default::default()
        }
    }

    fn view() -> crate::application::services::ProblemView {
        let scenario = ScenarioValidator::validate(&definition(), &DefaultCosting).unwrap();
        crate::application::services::ProblemView::new(Arc::new(scenario))
    }

    #[test]
    fn test_variables_omitted_when_infeasible() {
        let view = view();
        let built = MipBuilder::build(&view);
        // M2 has no rate on B1: no x variable may reference that pairing
        let m2 = view.machine_index("M2").unwrap();
        let b1 = view.block_index("B1").unwrap();
        assert!(!built
            .x
            .iter()
            .any(|&(m, b, _, _, _)| m == m2 && b == b1));
        // M1 is eligible for both blocks over 3 days
        let m1 = view.machine_index("M1").unwrap();
        let m1_vars = built.x.iter().filter(|&&(m, _, _, _, _)| m == m1).count();
        assert_eq!(m1_vars, 6);
    }

    #[test]
    fn test_objective_matches_heuristic_score() {
        let view = view();
        let built = MipBuilder::build(&view);
        let schedule = greedy_seed(&view);
        let heuristic = score(&view, &schedule).total;
        let mip = built.evaluate_schedule(&view, &schedule);
        assert!(
            (heuristic - mip).abs() < 1e-6,
            "heuristic {} != mip {}",
            heuristic,
            mip
        );
    }

    #[test]
    fn test_lock_becomes_equality_constraint() {
        let mut definition = definition();
        definition.locked_assignments = vec![crate::domain::entities::ScheduleLock::new(
            "M1", "B1", 2, None,
        )];
        let scenario = ScenarioValidator::validate(&definition, &DefaultCosting).unwrap();
        let view = crate::application::services::ProblemView::new(Arc::new(scenario));
        let built = MipBuilder::build(&view);
        assert!(built
            .model
            .constraints
            .iter()
            .any(|c| c.name.starts_with("lock_") && c.cmp == Cmp::Eq));
    }
}
