//! Calendar and timeline entities
//!
//! Day-level machine availability, optional shift-level overrides, and the
//! timeline configuration (ordered shifts, blackout windows). Days are
//! 1-based within the horizon; absent calendar entries mean available.

use serde::{Deserialize, Serialize};

/// Day-level availability entry for one machine
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CalendarEntry {
    pub machine_id: String,
    pub day: u32,
    pub available: bool,
}

/// Shift-level availability entry; overrides the day calendar when present
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ShiftCalendarEntry {
    pub machine_id: String,
    pub day: u32,
    pub shift_id: String,
    pub available: bool,
}

/// One named sub-division of the working day
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ShiftDef {
    pub id: String,
    pub hours: f64,
}

impl ShiftDef {
    pub fn new(id: impl Into<String>, hours: f64) -> Self {
        Self {
            id: id.into(),
            hours,
        }
    }
}

/// Global blackout window: a day range on which the named machines (or all
/// machines when the filter is empty) must have no assignments
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct BlackoutWindow {
    pub start_day: u32,
    pub end_day: u32,
    /// Machines the blackout applies to; empty means every machine
    #[serde(default)]
    pub machine_ids: Vec<String>,
}

impl BlackoutWindow {
    /// Whether the blackout covers a (machine, day)
    pub fn covers(&self, machine_id: &str, day: u32) -> bool {
        day >= self.start_day
            && day <= self.end_day
            && (self.machine_ids.is_empty() || self.machine_ids.iter().any(|m| m == machine_id))
    }
}

/// Timeline configuration: the ordered shift list and global blackouts
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TimelineConfig {
    /// Ordered shifts making up one day
    pub shifts: Vec<ShiftDef>,
    /// Global blackout windows
    #[serde(default)]
    pub blackouts: Vec<BlackoutWindow>,
}

impl TimelineConfig {
    /// Number of shifts per day
    pub fn shifts_per_day(&self) -> usize {
        self.shifts.len()
    }

    /// Total scheduled hours in one day
    pub fn day_hours(&self) -> f64 {
        self.shifts.iter().map(|s| s.hours).sum()
    }

    /// Position of a shift id in the ordered shift list
    pub fn shift_index(&self, shift_id: &str) -> Option<usize> {
        self.shifts.iter().position(|s| s.id == shift_id)
    }
}

impl Default for TimelineConfig {
    /// Single full-day shift, no blackouts
    fn default() -> Self {
        Self {
            shifts: vec![ShiftDef::new("day", 8.0)],
            blackouts: Vec::new(),
        }
    }
}
