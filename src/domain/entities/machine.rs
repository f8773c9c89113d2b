//! Machine entity module

use serde::{Deserialize, Serialize};

use crate::domain::value_objects::MachineRole;

/// Repair-usage bucket a machine draws from; anything other than the
/// default bucket raises the `repair_usage_alert` KPI flag.
pub const DEFAULT_REPAIR_USAGE: &str = "standard";

/// Represents a harvesting machine
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Machine {
    /// Unique machine identifier
    pub id: String,
    /// Canonical functional role, when declared
    pub role: Option<MachineRole>,
    /// Crew tag, when crews are tracked
    pub crew: Option<String>,
    /// Scheduled hours per day; defaults to the full timeline day
    pub daily_hours: f64,
    /// Operating cost per scheduled hour
    pub operating_cost_per_hour: f64,
    /// Repair-usage bucket; `None` means the default bucket
    pub repair_usage: Option<String>,
}

impl Machine {
    /// Creates a machine with the minimal required fields
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            role: None,
            crew: None,
            daily_hours: 0.0,
            operating_cost_per_hour: 0.0,
            repair_usage: None,
        }
    }

    /// Sets the role (builder style)
    pub fn with_role(mut self, role: MachineRole) -> Self {
        self.role = Some(role);
        self
    }

    /// Whether the machine draws from a non-default repair-usage bucket
    pub fn uses_nonstandard_repair(&self) -> bool {
        match &self.repair_usage {
            Some(bucket) => bucket != DEFAULT_REPAIR_USAGE,
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::value_objects::MachineRole;

    #[test]
    fn test_nonstandard_repair() {
        let mut machine = Machine::new("M1").with_role(MachineRole::parse("processor").unwrap());
        assert!(!machine.uses_nonstandard_repair());
        machine.repair_usage = Some("standard".to_string());
        assert!(!machine.uses_nonstandard_repair());
        machine.repair_usage = Some("heavy".to_string());
        assert!(machine.uses_nonstandard_repair());
    }
}
