//! Scenario entity module
//!
//! The immutable scenario produced by validation. Downstream code (problem
//! view, solvers, playback) relies on its invariants: every foreign id
//! resolves, every window fits the horizon, every rate and capacity is
//! non-negative, every harvest system is a DAG, and every lock is
//! satisfiable.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::{
    Block, CalendarEntry, DistanceMatrix, HarvestSystem, Landing, Machine, MobilisationConfig,
    ScheduleLock, ShiftCalendarEntry, TimelineConfig,
};

/// Production rate of one (machine, block) pairing: work units produced per
/// full shift assigned
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProductionRate {
    pub machine_id: String,
    pub block_id: String,
    pub rate: f64,
}

/// Road construction metadata passed through opaquely for costing; the core
/// does not schedule roads
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct RoadConstructionJob {
    pub id: String,
    #[serde(default)]
    pub block_id: Option<String>,
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
}

/// Objective weights applied by both the MIP and the heuristics
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ObjectiveWeights {
    /// Reward per credited production unit
    pub production: f64,
    /// Penalty multiplier on mobilisation cost
    pub mobilisation: f64,
    /// Penalty per inter-block transition
    pub transitions: f64,
    /// Penalty per unit of soft landing-capacity slack; zero makes the
    /// capacity constraint hard
    pub landing_slack: f64,
    /// Reward per required unit of every completed block
    pub completion_bonus: f64,
    /// Penalty per unit of unfinished work; defaults to five times the
    /// production weight when unset
    pub leftover_penalty: Option<f64>,
}

impl Default for ObjectiveWeights {
    fn default() -> Self {
        Self {
            production: 1.0,
            mobilisation: 1.0,
            transitions: 0.0,
            landing_slack: 0.0,
            completion_bonus: 0.0,
            leftover_penalty: None,
        }
    }
}

impl ObjectiveWeights {
    /// Effective leftover penalty
    pub fn leftover_penalty(&self) -> f64 {
        self.leftover_penalty.unwrap_or(5.0 * self.production)
    }

    /// Whether landing capacity is a hard constraint
    pub fn hard_landing_capacity(&self) -> bool {
        self.landing_slack == 0.0
    }
}

/// The validated, immutable scheduling scenario
///
/// Built once by the validator and shared read-only for the duration of a
/// solve. Mutating a scenario after validation is a logic error; nothing in
/// the crate does so.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scenario {
    /// Planning horizon in days; all day fields lie in `[1, horizon_days]`
    pub horizon_days: u32,
    pub blocks: Vec<Block>,
    pub machines: Vec<Machine>,
    pub landings: Vec<Landing>,
    pub calendar: Vec<CalendarEntry>,
    pub shift_calendar: Vec<ShiftCalendarEntry>,
    pub timeline: TimelineConfig,
    pub rates: Vec<ProductionRate>,
    pub harvest_systems: BTreeMap<String, HarvestSystem>,
    pub mobilisation: Option<MobilisationConfig>,
    pub distances: Option<DistanceMatrix>,
    pub locks: Vec<ScheduleLock>,
    pub weights: ObjectiveWeights,
    pub roads: Vec<RoadConstructionJob>,
    /// Geo metadata paths, passed through opaquely
    pub geo: BTreeMap<String, String>,
    pub schema_version: u32,
}

impl Scenario {
    /// Looks up a block by id
    pub fn block(&self, id: &str) -> Option<&Block> {
        self.blocks.iter().find(|b| b.id == id)
    }

    /// Looks up a machine by id
    pub fn machine(&self, id: &str) -> Option<&Machine> {
        self.machines.iter().find(|m| m.id == id)
    }

    /// Looks up a landing by id
    pub fn landing(&self, id: &str) -> Option<&Landing> {
        self.landings.iter().find(|l| l.id == id)
    }

    /// Total work required across all blocks
    pub fn total_work_required(&self) -> f64 {
        self.blocks.iter().map(|b| b.work_required).sum()
    }
}
