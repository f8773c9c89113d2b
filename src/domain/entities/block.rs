//! Block entity module
//!
//! A block is the harvest unit of work: a stand of timber at a landing,
//! measured in production units (m³), workable inside a day window.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Represents a timber block to be harvested
///
/// A block belongs to exactly one landing, carries the work required to
/// complete it, and is only workable between its earliest-start and
/// latest-finish days (inclusive, 1-based within the horizon).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Block {
    /// Unique block identifier
    pub id: String,
    /// Landing this block is staged at
    pub landing_id: String,
    /// Work required to complete the block, in production units
    pub work_required: f64,
    /// First day the block may be worked (1-based, inclusive)
    pub earliest_start: u32,
    /// Last day the block may be worked (1-based, inclusive)
    pub latest_finish: u32,
    /// Harvest system governing role precedence on this block, if any
    pub harvest_system_id: Option<String>,
    /// Salvage mode tag, if the block is a salvage operation
    pub salvage_mode: Option<String>,
    /// Stand attributes passed through opaquely for downstream costing
    #[serde(default)]
    pub stand_attributes: BTreeMap<String, String>,
}

impl Block {
    /// Creates a block with the minimal required fields
    pub fn new(id: impl Into<String>, landing_id: impl Into<String>, work_required: f64) -> Self {
        Self {
            id: id.into(),
            landing_id: landing_id.into(),
            work_required,
            earliest_start: 1,
            latest_finish: u32::MAX,
            harvest_system_id: None,
            salvage_mode: None,
            stand_attributes: BTreeMap::new(),
        }
    }

    /// Sets the work window (builder style)
    pub fn with_window(mut self, earliest_start: u32, latest_finish: u32) -> Self {
        self.earliest_start = earliest_start;
        self.latest_finish = latest_finish;
        self
    }

    /// Sets the harvest system (builder style)
    pub fn with_system(mut self, system_id: impl Into<String>) -> Self {
        self.harvest_system_id = Some(system_id.into());
        self
    }

    /// Checks whether a day lies inside the block's work window
    pub fn window_contains(&self, day: u32) -> bool {
        day >= self.earliest_start && day <= self.latest_finish
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_window_contains() {
        let block = Block::new("B1", "L1", 120.0).with_window(3, 10);
        assert!(!block.window_contains(2));
        assert!(block.window_contains(3));
        assert!(block.window_contains(10));
        assert!(!block.window_contains(11));
    }
}
