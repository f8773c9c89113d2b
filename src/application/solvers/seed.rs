//! Greedy seed construction
//!
//! Builds the starting schedule every heuristic begins from: blocks sorted
//! by earliest start then remaining work (descending), each filled
//! chronologically with the highest-rate feasible machine. Role precedence
//! is approximated during construction (a dependent role opens once its
//! prerequisite has produced a proportional share) and exact after the
//! repair sweep.

use crate::application::services::ProblemView;
use crate::application::solvers::repair::repair;
use crate::application::solvers::schedule::Schedule;

/// Builds the greedy seed schedule, repaired and lock-complete
pub fn greedy_seed(view: &ProblemView) -> Schedule {
    let mut schedule = Schedule::empty(
        view.num_machines(),
        view.num_days(),
        view.shifts_per_day(),
    );

    // Locks go in first; the greedy fill works around them
    for lock in view.locks() {
        schedule.set(lock.machine, lock.day, lock.shift, Some(lock.block));
    }

    let mut order: Vec<usize> = (0..view.num_blocks()).collect();
    order.sort_by(|&a, &b| {
        let (start_a, _) = view.window(a);
        let (start_b, _) = view.window(b);
        start_a
            .cmp(&start_b)
            .then(
                view.work_required(b)
                    .partial_cmp(&view.work_required(a))
                    .unwrap_or(std::cmp::Ordering::Equal),
            )
            .then(a.cmp(&b))
    });

    let mut produced: Vec<f64> = {
        let mut p = vec![0.0; view.num_blocks()];
        for (m, _, _, b) in schedule.assignments() {
            p[b] += view.rate(m, b);
        }
        p
    };

    for &b in &order {
        let required = view.work_required(b);
        if produced[b] >= required {
            continue;
        }

        // Approximate precedence gate: a dependent role opens once its
        // prerequisite role has produced a 1/roles share of the block
        let edges = view.precedence_edges(b);
        let role_count = {
            let mut roles: Vec<usize> = Vec::new();
            for &(p, d) in edges {
                if !roles.contains(&p) {
                    roles.push(p);
                }
                if !roles.contains(&d) {
                    roles.push(d);
                }
            }
            roles.len().max(1)
        };
        let share = required / role_count as f64;
        let mut role_cum = vec![0.0; view.num_roles()];

        let (start, end) = view.window(b);
        'slots: for d in start..=end {
            for s in 0..view.shifts_per_day() {
                if produced[b] >= required {
                    break 'slots;
                }

                // Highest-rate machine that is free, feasible, and past the
                // precedence gate
                let candidate = (0..view.num_machines())
                    .filter(|&m| schedule.get(m, d, s).is_none())
                    .filter(|&m| view.locked_block_at(m, d, s).is_none())
                    .filter(|&m| view.slot_allows(m, d, s, b))
                    .filter(|&m| match view.machine_role(m) {
                        None => true,
                        Some(role) => edges
                            .iter()
                            .filter(|&&(_, dep)| dep == role)
                            .all(|&(prereq, _)| role_cum[prereq] >= share.min(required)),
                    })
                    .max_by(|&a, &m| {
                        view.rate(a, b)
                            .partial_cmp(&view.rate(m, b))
                            .unwrap_or(std::cmp::Ordering::Equal)
                            .then(m.cmp(&a))
                    });

                if let Some(m) = candidate {
                    schedule.set(m, d, s, Some(b));
                    produced[b] += view.rate(m, b);
                    if let Some(role) = view.machine_role(m) {
                        role_cum[role] += view.rate(m, b);
                    }
                }
            }
        }
    }

    repair(view, &schedule)
}
