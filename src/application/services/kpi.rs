//! KPI bundle and summary records
//!
//! Shift- and day-level activity rows plus the aggregate KPI bundle emitted
//! by playback. Totals reconcile by construction: shift rows aggregate to
//! day rows aggregate to the bundle.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One (machine, day, shift) activity row
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ShiftRecord {
    pub machine_id: String,
    /// Assigned block, if the shift was worked
    pub block_id: Option<String>,
    pub day: u32,
    pub shift_id: String,
    pub production: f64,
    pub worked_hours: f64,
    /// Shift hours when the machine was available but unassigned
    pub idle_hours: f64,
    /// Mobilisation cost incurred on entry to the shift
    pub mobilisation_cost: f64,
    pub sequencing_conflicts: u32,
    /// Set on the shift during which the block's remaining work hit zero
    pub block_completed: bool,
    /// `0` for deterministic playback, the sample index otherwise
    pub sample_id: u32,
}

/// One (machine, day) summary row
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DayRecord {
    pub machine_id: String,
    pub day: u32,
    pub production: f64,
    pub worked_hours: f64,
    pub idle_hours: f64,
    pub mobilisation_cost: f64,
    pub sequencing_conflicts: u32,
    pub completed_blocks: u32,
    /// The day number when any production happened, else zero; the bundle
    /// makespan is the maximum over these
    pub makespan_contribution: u32,
    pub sample_id: u32,
}

/// Aggregate KPI bundle for one playback
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct KpiBundle {
    pub total_production: f64,
    pub completed_blocks: u32,
    pub mobilisation_cost: f64,
    pub mobilisation_cost_by_machine: BTreeMap<String, f64>,
    /// Worked hours over available hours
    pub utilisation_ratio: f64,
    /// Last day with any production
    pub makespan: u32,
    pub sequencing_violation_count: u32,
    pub sequencing_violation_by_block: BTreeMap<String, u32>,
    /// Landing-capacity overage summed over (landing, day)
    pub landing_surplus: f64,
    /// Set when any machine draws from a non-default repair-usage bucket
    pub repair_usage_alert: bool,
    /// Rows rejected (lenient mode) during playback
    pub playback_violations: u32,
    pub shifts: Vec<ShiftRecord>,
    pub days: Vec<DayRecord>,
}

impl KpiBundle {
    /// Re-derives day rows and totals from the shift rows; playback calls
    /// this once after emitting the shift grid
    pub fn aggregate_from_shifts(&mut self) {
        let mut days: BTreeMap<(String, u32), DayRecord> = BTreeMap::new();
        for shift in &self.shifts {
            let entry = days
                .entry((shift.machine_id.clone(), shift.day))
                .or_insert_with(|| DayRecord {
                    machine_id: shift.machine_id.clone(),
                    day: shift.day,
                    production: 0.0,
                    worked_hours: 0.0,
                    idle_hours: 0.0,
                    mobilisation_cost: 0.0,
                    sequencing_conflicts: 0,
                    completed_blocks: 0,
                    makespan_contribution: 0,
                    sample_id: shift.sample_id,
                });
            entry.production += shift.production;
            entry.worked_hours += shift.worked_hours;
            entry.idle_hours += shift.idle_hours;
            entry.mobilisation_cost += shift.mobilisation_cost;
            entry.sequencing_conflicts += shift.sequencing_conflicts;
            if shift.block_completed {
                entry.completed_blocks += 1;
            }
            if shift.production > 0.0 {
                entry.makespan_contribution = entry.makespan_contribution.max(shift.day);
            }
        }
        self.days = days.into_values().collect();

        self.total_production = self.days.iter().map(|d| d.production).sum();
        self.mobilisation_cost = self.days.iter().map(|d| d.mobilisation_cost).sum();
        self.sequencing_violation_count = self.days.iter().map(|d| d.sequencing_conflicts).sum();
        self.makespan = self
            .days
            .iter()
            .map(|d| d.makespan_contribution)
            .max()
            .unwrap_or(0);

        let worked: f64 = self.days.iter().map(|d| d.worked_hours).sum();
        let idle: f64 = self.days.iter().map(|d| d.idle_hours).sum();
        self.utilisation_ratio = if worked + idle > 0.0 {
            worked / (worked + idle)
        } else {
            0.0
        };

        let mut by_machine: BTreeMap<String, f64> = BTreeMap::new();
        for day in &self.days {
            if day.mobilisation_cost > 0.0 {
                *by_machine.entry(day.machine_id.clone()).or_insert(0.0) +=
                    day.mobilisation_cost;
            }
        }
        self.mobilisation_cost_by_machine = by_machine;
    }
}

impl Default for KpiBundle {
    fn default() -> Self {
        Self {
            total_production: 0.0,
            completed_blocks: 0,
            mobilisation_cost: 0.0,
            mobilisation_cost_by_machine: BTreeMap::new(),
            utilisation_ratio: 0.0,
            makespan: 0,
            sequencing_violation_count: 0,
            sequencing_violation_by_block: BTreeMap::new(),
            landing_surplus: 0.0,
            repair_usage_alert: false,
            playback_violations: 0,
            shifts: Vec::new(),
            days: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shift(machine: &str, day: u32, production: f64, worked: f64, idle: f64) -> ShiftRecord {
        ShiftRecord {
            machine_id: machine.to_string(),
            block_id: None,
            day,
            shift_id: "day".to_string(),
            production,
            worked_hours: worked,
            idle_hours: idle,
            mobilisation_cost: 0.0,
            sequencing_conflicts: 0,
            block_completed: false,
            sample_id: 0,
        }
    }

    #[test]
    fn test_aggregation_reconciles() {
        let mut bundle = KpiBundle {
            shifts: vec![
                shift("M1", 1, 3.0, 8.0, 0.0),
                shift("M1", 2, 2.0, 8.0, 0.0),
                shift("M2", 1, 0.0, 0.0, 8.0),
            ],
            ..Default::default()
        };
        bundle.aggregate_from_shifts();

        assert_eq!(bundle.days.len(), 3);
        assert_eq!(bundle.total_production, 5.0);
        assert_eq!(bundle.makespan, 2);
        assert!((bundle.utilisation_ratio - 16.0 / 24.0).abs() < 1e-9);

        // Shift totals equal day totals equal bundle totals
        let shift_total: f64 = bundle.shifts.iter().map(|s| s.production).sum();
        let day_total: f64 = bundle.days.iter().map(|d| d.production).sum();
        assert_eq!(shift_total, day_total);
        assert_eq!(day_total, bundle.total_production);
    }
}
