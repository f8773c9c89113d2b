//! Schedule repair sweeps
//!
//! Every candidate schedule passes through repair before scoring, and the
//! final schedule of every heuristic passes through it again before being
//! emitted. The sweep enforces, in order:
//!
//! 1. slot feasibility (window, availability, eligibility) and locks,
//! 2. the finish-the-block policy: a machine that has started a block keeps
//!    its feasible shifts on that block until the block completes or its
//!    window closes,
//! 3. hard landing capacity (when the slack weight is zero),
//! 4. role precedence, removed to a fixpoint.
//!
//! Locked slots are never altered.

use crate::application::services::ProblemView;
use crate::application::solvers::schedule::Schedule;

/// Runs the full repair sweep and returns the repaired schedule
pub fn repair(view: &ProblemView, schedule: &Schedule) -> Schedule {
    let mut repaired = schedule.clone();
    enforce_slots_and_locks(view, &mut repaired);
    enforce_block_completion(view, &mut repaired);
    if view.weights().hard_landing_capacity() {
        enforce_landing_capacity(view, &mut repaired);
    }
    enforce_precedence(view, &mut repaired);
    repaired
}

/// Drops assignments on infeasible slots and reinstates every lock
fn enforce_slots_and_locks(view: &ProblemView, schedule: &mut Schedule) {
    for m in 0..view.num_machines() {
        for d in 0..view.num_days() {
            for s in 0..view.shifts_per_day() {
                if let Some(b) = schedule.get(m, d, s) {
                    if !view.slot_allows(m, d, s, b) {
                        schedule.set(m, d, s, None);
                    }
                }
            }
        }
    }
    for lock in view.locks() {
        schedule.set(lock.machine, lock.day, lock.shift, Some(lock.block));
    }
}

/// Finish-the-block policy
///
/// Walks slots in global chronological order, tracking remaining work per
/// block. While a machine's active block has work left and its window is
/// open, any feasible slot of that machine is retained on the active block.
fn enforce_block_completion(view: &ProblemView, schedule: &mut Schedule) {
    let mut remaining: Vec<f64> = (0..view.num_blocks())
        .map(|b| view.work_required(b))
        .collect();
    let mut active: Vec<Option<usize>> = vec![None; view.num_machines()];

    for d in 0..view.num_days() {
        for s in 0..view.shifts_per_day() {
            for m in 0..view.num_machines() {
                let locked = view.locked_block_at(m, d, s).is_some();

                if let Some(b_act) = active[m] {
                    let (_, window_end) = view.window(b_act);
                    if remaining[b_act] <= 1e-9 || d > window_end {
                        active[m] = None;
                    } else if !locked
                        && schedule.get(m, d, s) != Some(b_act)
                        && view.slot_allows(m, d, s, b_act)
                    {
                        // Retain the machine on its unfinished block
                        schedule.set(m, d, s, Some(b_act));
                    }
                }

                if let Some(b) = schedule.get(m, d, s) {
                    remaining[b] -= view.rate(m, b);
                    if remaining[b] > 1e-9 {
                        active[m] = Some(b);
                    } else if active[m] == Some(b) {
                        active[m] = None;
                    }
                }
            }
        }
    }
}

/// Evicts excess machines per (landing, day), lowest production first;
/// locked machines are never evicted
fn enforce_landing_capacity(view: &ProblemView, schedule: &mut Schedule) {
    for d in 0..view.num_days() {
        for l in 0..view.num_landings() {
            // Machines with any assignment at this landing today
            let mut present: Vec<usize> = (0..view.num_machines())
                .filter(|&m| {
                    (0..view.shifts_per_day())
                        .any(|s| schedule.get(m, d, s).map(|b| view.landing_of(b)) == Some(l))
                })
                .collect();

            let capacity = view.landing_capacity(l) as usize;
            if present.len() <= capacity {
                continue;
            }

            let day_production = |m: usize| -> f64 {
                (0..view.shifts_per_day())
                    .filter_map(|s| schedule.get(m, d, s))
                    .filter(|&b| view.landing_of(b) == l)
                    .map(|b| view.rate(m, b))
                    .sum()
            };
            let is_locked_here = |m: usize| -> bool {
                (0..view.shifts_per_day()).any(|s| {
                    view.locked_block_at(m, d, s)
                        .map(|b| view.landing_of(b) == l)
                        .unwrap_or(false)
                })
            };

            // Evict unlocked machines in ascending production order
            present.sort_by(|&a, &b| {
                day_production(a)
                    .partial_cmp(&day_production(b))
                    .unwrap_or(std::cmp::Ordering::Equal)
                    .then(a.cmp(&b))
            });
            let mut count = present.len();
            for &m in &present {
                if count <= capacity {
                    break;
                }
                if is_locked_here(m) {
                    continue;
                }
                for s in 0..view.shifts_per_day() {
                    if schedule.get(m, d, s).map(|b| view.landing_of(b)) == Some(l)
                        && view.locked_block_at(m, d, s).is_none()
                    {
                        schedule.set(m, d, s, None);
                    }
                }
                count -= 1;
            }
        }
    }
}

/// Removes dependent-role assignments that outrun their prerequisite role,
/// iterating to a fixpoint; one pass per role level suffices, so the loop
/// is bounded by the role count
fn enforce_precedence(view: &ProblemView, schedule: &mut Schedule) {
    let max_passes = view.num_roles().max(1) + 1;
    for _ in 0..max_passes {
        if !precedence_pass(view, schedule) {
            break;
        }
    }
}

/// One precedence sweep; returns whether anything was removed
fn precedence_pass(view: &ProblemView, schedule: &mut Schedule) -> bool {
    let mut changed = false;
    for b in 0..view.num_blocks() {
        let edges = view.precedence_edges(b);
        if edges.is_empty() {
            continue;
        }

        // Cumulative production per role through each day, recomputed as
        // removals happen within the day loop
        let mut cum = vec![0.0; view.num_roles()];
        let mut cum_prev_day = vec![0.0; view.num_roles()];
        for d in 0..view.num_days() {
            for s in 0..view.shifts_per_day() {
                for m in 0..view.num_machines() {
                    if schedule.get(m, d, s) != Some(b) {
                        continue;
                    }
                    let role = match view.machine_role(m) {
                        Some(role) => role,
                        None => continue,
                    };
                    let violates = edges.iter().any(|&(prereq, dep)| {
                        dep == role && cum[dep] + view.rate(m, b) > cum_prev_day[prereq] + 1e-9
                    });
                    if violates && view.locked_block_at(m, d, s).is_none() {
                        schedule.set(m, d, s, None);
                        changed = true;
                    } else {
                        cum[role] += view.rate(m, b);
                    }
                }
            }
            cum_prev_day.copy_from_slice(&cum);
        }
    }
    changed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::services::scenario_validator::ScenarioValidator;
    use crate::application::services::ProblemView;
    use crate::application::solvers::score::sequencing_violations;
    use crate::domain::entities::definition::*;
    use crate::domain::entities::ScheduleLock;
    use crate::domain::value_objects::DefaultCosting;
    use std::sync::Arc;

    fn sequenced_view() -> ProblemView {
        let definition = ScenarioDefinition {
            horizon_days: 4,
            landings: vec![LandingRow {
                id: "L1".to_string(),
                daily_capacity: Some(3),
            }],
            machines: vec![
                MachineRow {
                    id: "FB1".to_string(),
                    role: Some("feller_buncher".to_string()),
                    ..Default::default()
                },
                MachineRow {
                    id: "SK1".to_string(),
                    role: Some("grapple_skidder".to_string()),
                    ..Default::default()
                },
            ],
            blocks: vec![BlockRow {
                id: "B1".to_string(),
                landing_id: "L1".to_string(),
                work_required: Some(8.0),
                harvest_system_id: Some("two_step".to_string()),
                ..Default::default()
            }],
            harvest_systems: vec![HarvestSystemSection {
                id: "two_step".to_string(),
                jobs: vec![
                    HarvestJobSection {
                        name: "fell".to_string(),
                        role: "feller_buncher".to_string(),
                        prerequisites: vec![],
                    },
                    HarvestJobSection {
                        name: "skid".to_string(),
                        role: "grapple_skidder".to_string(),
                        prerequisites: vec!["fell".to_string()],
                    },
                ],
            }],
            production_rates: vec![
                RateRow {
                    machine_id: "FB1".to_string(),
                    block_id: "B1".to_string(),
                    rate: Some(4.0),
                },
                RateRow {
                    machine_id: "SK1".to_string(),
                    block_id: "B1".to_string(),
                    rate: Some(4.0),
                },
            ],
            ..Default::default()
        };
        let scenario = ScenarioValidator::validate(&definition, &DefaultCosting).unwrap();
        ProblemView::new(Arc::new(scenario))
    }

    #[test]
    fn test_repair_removes_premature_dependent_work() {
        let view = sequenced_view();
        let b1 = view.block_index("B1").unwrap();
        let fb = view.machine_index("FB1").unwrap();
        let sk = view.machine_index("SK1").unwrap();

        let mut schedule = Schedule::empty(2, 4, 1);
        // Skidder on day 1 before any felling: must be removed
        schedule.set(sk, 0, 0, Some(b1));
        schedule.set(fb, 0, 0, Some(b1));
        schedule.set(sk, 1, 0, Some(b1));

        let repaired = repair(&view, &schedule);
        assert_eq!(repaired.get(sk, 0, 0), None);
        assert_eq!(repaired.get(sk, 1, 0), Some(b1));
        let violations = sequencing_violations(&view, &repaired);
        assert_eq!(violations.iter().sum::<usize>(), 0);
    }

    #[test]
    fn test_repair_keeps_locks() {
        let definition = ScenarioDefinition {
            horizon_days: 2,
            landings: vec![LandingRow {
                id: "L1".to_string(),
                daily_capacity: Some(2),
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
            locked_assignments: vec![ScheduleLock::new("M1", "B1", 2, None)],
            ..Default::default()
        };
        let scenario = ScenarioValidator::validate(&definition, &DefaultCosting).unwrap();
        let view = ProblemView::new(Arc::new(scenario));

        let empty = Schedule::empty(1, 2, 1);
        let repaired = repair(&view, &empty);
        let b1 = view.block_index("B1").unwrap();
        assert_eq!(repaired.get(0, 1, 0), Some(b1));
    }

    #[test]
    fn test_finish_block_retention() {
        let view = sequenced_view();
        let b1 = view.block_index("B1").unwrap();
        let fb = view.machine_index("FB1").unwrap();

        let mut schedule = Schedule::empty(2, 4, 1);
        // Feller works day 1 then the schedule leaves it idle; the block
        // still has work, so repair keeps it on the block
        schedule.set(fb, 0, 0, Some(b1));
        let repaired = repair(&view, &schedule);
        assert_eq!(repaired.get(fb, 1, 0), Some(b1));
    }
}
