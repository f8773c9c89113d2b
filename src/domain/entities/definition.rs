//! Raw scenario definition module
//!
//! The unvalidated shape of a scenario as it comes off disk: string ids,
//! optional numerics, free-form role spellings. The validator turns a
//! `ScenarioDefinition` into an immutable [`super::Scenario`] or a complete
//! list of violations.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::{DistanceMatrix, RoadConstructionJob, ScheduleLock};

/// Raw block row
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct BlockRow {
    pub id: String,
    pub landing_id: String,
    pub work_required: Option<f64>,
    pub earliest_start: Option<u32>,
    pub latest_finish: Option<u32>,
    #[serde(default)]
    pub harvest_system_id: Option<String>,
    #[serde(default)]
    pub salvage_mode: Option<String>,
    #[serde(default)]
    pub stand_attributes: BTreeMap<String, String>,
}

/// Raw machine row
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct MachineRow {
    pub id: String,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub crew: Option<String>,
    #[serde(default)]
    pub daily_hours: Option<f64>,
    #[serde(default)]
    pub operating_cost_per_hour: Option<f64>,
    #[serde(default)]
    pub repair_usage: Option<String>,
}

/// Raw landing row
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct LandingRow {
    pub id: String,
    #[serde(default)]
    pub daily_capacity: Option<u32>,
}

/// Raw day-calendar row
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CalendarRow {
    pub machine_id: String,
    pub day: Option<u32>,
    pub available: Option<u8>,
}

/// Raw shift-calendar row
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ShiftCalendarRow {
    pub machine_id: String,
    pub day: Option<u32>,
    pub shift_id: String,
    pub available: Option<u8>,
}

/// Raw production-rate row
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RateRow {
    pub machine_id: String,
    pub block_id: String,
    pub rate: Option<f64>,
}

/// Raw timeline section
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct TimelineSection {
    /// Explicit shift list; wins over `shifts_per_day` when present
    #[serde(default)]
    pub shifts: Vec<ShiftSection>,
    /// Shorthand: synthesise this many equal shifts when no list is given
    #[serde(default)]
    pub shifts_per_day: Option<u32>,
    #[serde(default)]
    pub blackouts: Vec<BlackoutSection>,
}

/// Raw shift declaration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ShiftSection {
    pub id: String,
    #[serde(default)]
    pub hours: Option<f64>,
}

/// Raw blackout declaration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct BlackoutSection {
    pub start_day: u32,
    pub end_day: u32,
    #[serde(default)]
    pub machine_ids: Vec<String>,
}

/// Raw harvest-system job
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct HarvestJobSection {
    pub name: String,
    pub role: String,
    #[serde(default)]
    pub prerequisites: Vec<String>,
}

/// Raw harvest-system declaration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct HarvestSystemSection {
    pub id: String,
    pub jobs: Vec<HarvestJobSection>,
}

/// Raw mobilisation section
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct MobilisationSection {
    #[serde(default)]
    pub walk_threshold_m: Option<f64>,
    #[serde(default)]
    pub walk_cost: Option<f64>,
    #[serde(default)]
    pub setup_cost: Option<f64>,
    #[serde(default)]
    pub move_cost_per_km: Option<f64>,
    #[serde(default)]
    pub unknown_cost: Option<f64>,
    /// Per-machine overrides keyed by machine id; unset fields inherit the
    /// section defaults
    #[serde(default)]
    pub per_machine: BTreeMap<String, MobilisationOverrideSection>,
}

/// Raw per-machine mobilisation override
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct MobilisationOverrideSection {
    #[serde(default)]
    pub walk_threshold_m: Option<f64>,
    #[serde(default)]
    pub walk_cost: Option<f64>,
    #[serde(default)]
    pub setup_cost: Option<f64>,
    #[serde(default)]
    pub move_cost_per_km: Option<f64>,
    #[serde(default)]
    pub unknown_cost: Option<f64>,
}

/// Raw objective-weight section
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ObjectiveWeightsSection {
    #[serde(default)]
    pub production: Option<f64>,
    #[serde(default)]
    pub mobilisation: Option<f64>,
    #[serde(default)]
    pub transitions: Option<f64>,
    #[serde(default)]
    pub landing_slack: Option<f64>,
    #[serde(default)]
    pub completion_bonus: Option<f64>,
    #[serde(default)]
    pub leftover_penalty: Option<f64>,
}

/// The complete unvalidated scenario definition
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ScenarioDefinition {
    pub horizon_days: u32,
    #[serde(default)]
    pub schema_version: Option<u32>,
    #[serde(default)]
    pub blocks: Vec<BlockRow>,
    #[serde(default)]
    pub machines: Vec<MachineRow>,
    #[serde(default)]
    pub landings: Vec<LandingRow>,
    #[serde(default)]
    pub calendar: Vec<CalendarRow>,
    #[serde(default)]
    pub shift_calendar: Vec<ShiftCalendarRow>,
    #[serde(default)]
    pub production_rates: Vec<RateRow>,
    #[serde(default)]
    pub timeline: Option<TimelineSection>,
    #[serde(default)]
    pub harvest_systems: Vec<HarvestSystemSection>,
    #[serde(default)]
    pub mobilisation: Option<MobilisationSection>,
    #[serde(default)]
    pub distances: Option<DistanceMatrix>,
    #[serde(default)]
    pub locked_assignments: Vec<ScheduleLock>,
    #[serde(default)]
    pub objective_weights: Option<ObjectiveWeightsSection>,
    #[serde(default)]
    pub road_construction: Vec<RoadConstructionJob>,
    /// Crew tag per machine id; wins over the machines table when present
    #[serde(default)]
    pub crew_assignments: BTreeMap<String, String>,
    /// Geo metadata paths, passed through opaquely for external tooling
    #[serde(default)]
    pub geo: BTreeMap<String, String>,
}
