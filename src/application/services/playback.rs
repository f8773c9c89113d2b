//! Deterministic playback
//!
//! The canonical replay: consumes the immutable scenario (through its
//! problem view) plus an assignment table and computes shift- and day-level
//! activity and the KPI bundle. Strict mode raises on the first bad row;
//! lenient mode reports rejected rows through the bundle.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::application::services::kpi::{KpiBundle, ShiftRecord};
use crate::application::services::ProblemView;
use crate::application::solvers::schedule::Schedule;
use crate::domain::errors::PlaybackError;

/// One row of the canonical assignment table
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AssignmentRow {
    pub machine_id: String,
    pub block_id: String,
    pub day: u32,
    pub shift_id: String,
    /// `true` when the row denotes an active assignment
    pub assigned: bool,
    /// Explicit production override; computed by playback when blank
    pub production: Option<f64>,
}

/// Converts a solver schedule into canonical assignment rows, stable-sorted
/// by (machine, day, shift, block)
pub fn schedule_to_rows(view: &ProblemView, schedule: &Schedule) -> Vec<AssignmentRow> {
    let mut rows: Vec<AssignmentRow> = schedule
        .assignments()
        .map(|(m, d, s, b)| AssignmentRow {
            machine_id: view.machine_id(m).to_string(),
            block_id: view.block_id(b).to_string(),
            day: d as u32 + 1,
            shift_id: view.shift_id(s).to_string(),
            assigned: true,
            production: None,
        })
        .collect();
    rows.sort_by(|a, b| {
        a.machine_id
            .cmp(&b.machine_id)
            .then(a.day.cmp(&b.day))
            .then(a.shift_id.cmp(&b.shift_id))
            .then(a.block_id.cmp(&b.block_id))
    });
    rows
}

/// Perturbations applied during a replay; identity for deterministic runs
#[derive(Debug, Clone)]
pub(crate) struct PlaybackModifiers {
    /// Weather multiplier per day index
    pub day_factor: Vec<f64>,
    /// Shock multiplier per (landing, day), flattened
    pub landing_factor: Vec<f64>,
    /// Slots lost to downtime
    pub dropped: HashSet<(usize, usize, usize)>,
}

impl PlaybackModifiers {
    pub fn identity(view: &ProblemView) -> Self {
        Self {
            day_factor: vec![1.0; view.num_days()],
            landing_factor: vec![1.0; view.num_landings() * view.num_days()],
            dropped: HashSet::new(),
        }
    }
}

/// Replays an assignment table deterministically
///
/// # Arguments
///
/// * `view` - Problem view of the validated scenario
/// * `rows` - Canonical assignment rows
/// * `strict` - Raise on the first bad row instead of reporting it
pub fn play_deterministic(
    view: &ProblemView,
    rows: &[AssignmentRow],
    strict: bool,
) -> Result<KpiBundle, PlaybackError> {
    play_with_modifiers(view, rows, strict, 0, &PlaybackModifiers::identity(view))
}

pub(crate) fn play_with_modifiers(
    view: &ProblemView,
    rows: &[AssignmentRow],
    strict: bool,
    sample_id: u32,
    modifiers: &PlaybackModifiers,
) -> Result<KpiBundle, PlaybackError> {
    let days = view.num_days();
    let shifts = view.shifts_per_day();
    let machines = view.num_machines();

    // Resolve rows onto the slot grid, collecting violations
    let mut slot: Vec<Option<(usize, Option<f64>)>> = vec![None; machines * days * shifts];
    let mut violations: u32 = 0;
    for (row_index, row) in rows.iter().enumerate() {
        if !row.assigned {
            continue;
        }
        let mut reject = |message: String| -> Result<(), PlaybackError> {
            if strict {
                Err(PlaybackError {
                    row: row_index,
                    message,
                })
            } else {
                debug!(row = row_index, "playback rejected row: {}", message);
                violations += 1;
                Ok(())
            }
        };

        let m = match view.machine_index(&row.machine_id) {
            Some(m) => m,
            None => {
                reject(format!("unknown machine '{}'", row.machine_id))?;
                continue;
            }
        };
        let b = match view.block_index(&row.block_id) {
            Some(b) => b,
            None => {
                reject(format!("unknown block '{}'", row.block_id))?;
                continue;
            }
        };
        let s = match (0..shifts).find(|&s| view.shift_id(s) == row.shift_id) {
            Some(s) => s,
            None => {
                reject(format!("unknown shift '{}'", row.shift_id))?;
                continue;
            }
        };
        if row.day == 0 || row.day as usize > days {
            reject(format!("day {} outside horizon", row.day))?;
            continue;
        }
        let d = row.day as usize - 1;
        let (start, end) = view.window(b);
        if d < start || d > end {
            reject(format!(
                "block '{}' worked outside its window on day {}",
                row.block_id, row.day
            ))?;
            continue;
        }
        if !view.available(m, d, s) {
            reject(format!(
                "machine '{}' unavailable on day {} shift '{}'",
                row.machine_id, row.day, row.shift_id
            ))?;
            continue;
        }
        let idx = (m * days + d) * shifts + s;
        if slot[idx].is_some() {
            reject(format!(
                "machine '{}' double-booked on day {} shift '{}'",
                row.machine_id, row.day, row.shift_id
            ))?;
            continue;
        }
        slot[idx] = Some((b, row.production));
    }

    // Chronological replay
    let mut remaining: Vec<f64> = (0..view.num_blocks())
        .map(|b| view.work_required(b))
        .collect();
    // Cumulative production per (block, role): totals and the snapshot as of
    // the end of the previous day, for sequencing checks
    let mut cum = vec![0.0; view.num_blocks() * view.num_roles().max(1)];
    let mut cum_prev_day = cum.clone();
    let roles = view.num_roles().max(1);

    let mut shift_records: Vec<ShiftRecord> = Vec::with_capacity(machines * days * shifts);
    let mut landing_machines: Vec<HashSet<usize>> =
        vec![HashSet::new(); view.num_landings() * days];

    for d in 0..days {
        for s in 0..shifts {
            for m in 0..machines {
                let idx = (m * days + d) * shifts + s;
                let dropped = modifiers.dropped.contains(&(m, d, s));
                let assignment = if dropped { None } else { slot[idx] };

                let mut record = ShiftRecord {
                    machine_id: view.machine_id(m).to_string(),
                    block_id: None,
                    day: d as u32 + 1,
                    shift_id: view.shift_id(s).to_string(),
                    production: 0.0,
                    worked_hours: 0.0,
                    idle_hours: 0.0,
                    mobilisation_cost: 0.0,
                    sequencing_conflicts: 0,
                    block_completed: false,
                    sample_id,
                };

                match assignment {
                    None => {
                        // Downtime slots count as unavailable, not idle
                        if view.available(m, d, s) && !dropped {
                            record.idle_hours = view.shift_hours(s);
                        }
                    }
                    Some((b, override_production)) => {
                        let l = view.landing_of(b);
                        let factor =
                            modifiers.day_factor[d] * modifiers.landing_factor[l * days + d];
                        let base = override_production.unwrap_or(view.rate(m, b) * factor);
                        let production = base.min(remaining[b]).max(0.0);
                        remaining[b] -= production;

                        record.block_id = Some(view.block_id(b).to_string());
                        record.production = production;
                        record.worked_hours = view.shift_hours(s);
                        if view.work_required(b) > 0.0 && remaining[b] <= 1e-9 && production > 0.0
                        {
                            record.block_completed = true;
                        }

                        // Mobilisation on entry: previous assigned block of
                        // this machine earlier in the same day
                        let prev = (0..s)
                            .rev()
                            .find_map(|sp| if modifiers.dropped.contains(&(m, d, sp)) {
                                None
                            } else {
                                slot[(m * days + d) * shifts + sp].map(|(pb, _)| pb)
                            });
                        if let Some(pb) = prev {
                            if pb != b {
                                record.mobilisation_cost = view.transition_cost(m, pb, b);
                            }
                        }

                        // Sequencing: production attributed to a dependent
                        // role ahead of its prerequisite
                        if let Some(role) = view.machine_role(m) {
                            let conflict =
                                view.precedence_edges(b).iter().any(|&(prereq, dep)| {
                                    dep == role
                                        && cum[b * roles + dep] + production
                                            > cum_prev_day[b * roles + prereq] + 1e-9
                                });
                            if conflict && production > 0.0 {
                                record.sequencing_conflicts = 1;
                            }
                            cum[b * roles + role] += production;
                        }

                        landing_machines[l * days + d].insert(m);
                    }
                }

                shift_records.push(record);
            }
        }
        cum_prev_day.copy_from_slice(&cum);
    }

    let mut bundle = KpiBundle {
        shifts: shift_records,
        playback_violations: violations,
        repair_usage_alert: view
            .scenario()
            .machines
            .iter()
            .any(|m| m.uses_nonstandard_repair()),
        ..Default::default()
    };

    // Landing surplus per (landing, day)
    for l in 0..view.num_landings() {
        for d in 0..days {
            let over =
                landing_machines[l * days + d].len() as f64 - view.landing_capacity(l) as f64;
            if over > 0.0 {
                bundle.landing_surplus += over;
            }
        }
    }

    bundle.completed_blocks = (0..view.num_blocks())
        .filter(|&b| view.work_required(b) > 0.0 && remaining[b] <= 1e-9)
        .count() as u32;

    // Per-block sequencing totals mirror the shift rows
    let mut by_block = std::collections::BTreeMap::new();
    for record in &bundle.shifts {
        if record.sequencing_conflicts > 0 {
            if let Some(block_id) = &record.block_id {
                *by_block.entry(block_id.clone()).or_insert(0u32) += record.sequencing_conflicts;
            }
        }
    }
    bundle.sequencing_violation_by_block = by_block;

    bundle.aggregate_from_shifts();
    Ok(bundle)
}
