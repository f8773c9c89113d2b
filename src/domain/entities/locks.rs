//! Schedule lock entity module

use serde::{Deserialize, Serialize};

/// An externally-fixed assignment every solver must honour
///
/// A lock pins a machine to a block on a day; when the shift is omitted the
/// lock resolves to the first available shift of that day.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ScheduleLock {
    pub machine_id: String,
    pub block_id: String,
    pub day: u32,
    #[serde(default)]
    pub shift_id: Option<String>,
}

impl ScheduleLock {
    pub fn new(
        machine_id: impl Into<String>,
        block_id: impl Into<String>,
        day: u32,
        shift_id: Option<String>,
    ) -> Self {
        Self {
            machine_id: machine_id.into(),
            block_id: block_id.into(),
            day,
            shift_id,
        }
    }
}
