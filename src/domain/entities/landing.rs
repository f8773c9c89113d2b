//! Landing entity module

use serde::{Deserialize, Serialize};

/// Default number of machines a landing can host concurrently per day
pub const DEFAULT_LANDING_CAPACITY: u32 = 2;

/// Represents a landing: the staging area a set of blocks is served from
///
/// A landing caps how many distinct machines may be assigned to its blocks
/// on any single day.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Landing {
    /// Unique landing identifier
    pub id: String,
    /// Maximum count of concurrently-assigned machines per day
    pub daily_capacity: u32,
}

impl Landing {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            daily_capacity: DEFAULT_LANDING_CAPACITY,
        }
    }

    pub fn with_capacity(mut self, capacity: u32) -> Self {
        self.daily_capacity = capacity;
        self
    }
}
