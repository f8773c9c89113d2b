//! Harvest system entity module
//!
//! A harvest system is an ordered DAG of jobs, each bound to a machine
//! role, expressing operational precedence inside a block: felling before
//! skidding, skidding before processing, and so on. The registry is either
//! the bundled default or overridden wholesale by the scenario.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::domain::value_objects::MachineRole;

/// One job inside a harvest system
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HarvestJob {
    /// Job name, unique within its system
    pub name: String,
    /// Machine role required to perform the job
    pub role: MachineRole,
    /// Names of jobs that must complete before this one starts
    #[serde(default)]
    pub prerequisites: Vec<String>,
}

impl HarvestJob {
    pub fn new(name: impl Into<String>, role: MachineRole, prerequisites: Vec<String>) -> Self {
        Self {
            name: name.into(),
            role,
            prerequisites,
        }
    }
}

/// A harvest system: a named DAG of role-bound jobs
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HarvestSystem {
    pub id: String,
    pub jobs: Vec<HarvestJob>,
}

impl HarvestSystem {
    pub fn new(id: impl Into<String>, jobs: Vec<HarvestJob>) -> Self {
        Self {
            id: id.into(),
            jobs,
        }
    }

    /// Roles required by at least one job of the system
    pub fn roles(&self) -> Vec<&MachineRole> {
        let mut roles: Vec<&MachineRole> = Vec::new();
        for job in &self.jobs {
            if !roles.contains(&&job.role) {
                roles.push(&job.role);
            }
        }
        roles
    }

    /// Whether any job of the system requires the role
    pub fn requires_role(&self, role: &MachineRole) -> bool {
        self.jobs.iter().any(|j| &j.role == role)
    }
}

/// Bundled default harvest-system registry
///
/// Two conventional BC systems: ground-based full-tree and cable yarding.
/// A scenario that supplies its own `harvest_systems` section replaces this
/// registry entirely.
pub fn default_harvest_systems() -> BTreeMap<String, HarvestSystem> {
    let role = |slug: &str| MachineRole::from_canonical(slug);

    let ground = HarvestSystem::new(
        "ground_based",
        vec![
            HarvestJob::new("fell", role("feller_buncher"), vec![]),
            HarvestJob::new("skid", role("grapple_skidder"), vec!["fell".to_string()]),
            HarvestJob::new("process", role("processor"), vec!["skid".to_string()]),
            HarvestJob::new("load", role("loader"), vec!["process".to_string()]),
        ],
    );

    let cable = HarvestSystem::new(
        "cable_yarding",
        vec![
            HarvestJob::new("fell", role("feller_buncher"), vec![]),
            HarvestJob::new("yard", role("skyline_yarder"), vec!["fell".to_string()]),
            HarvestJob::new("process", role("processor"), vec!["yard".to_string()]),
            HarvestJob::new("load", role("loader"), vec!["process".to_string()]),
        ],
    );

    let mut registry = BTreeMap::new();
    registry.insert(ground.id.clone(), ground);
    registry.insert(cable.id.clone(), cable);
    registry
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_registry() {
        let registry = default_harvest_systems();
        assert!(registry.contains_key("ground_based"));
        assert!(registry.contains_key("cable_yarding"));

        let ground = &registry["ground_based"];
        assert_eq!(ground.jobs.len(), 4);
        assert!(ground.requires_role(&MachineRole::from_canonical("feller_buncher")));
        assert!(!ground.requires_role(&MachineRole::from_canonical("skyline_yarder")));
    }

    #[test]
    fn test_roles_deduplicated() {
        let role = |slug: &str| MachineRole::from_canonical(slug);
        let system = HarvestSystem::new(
            "two_pass",
            vec![
                HarvestJob::new("first_pass", role("harvester"), vec![]),
                HarvestJob::new(
                    "second_pass",
                    role("harvester"),
                    vec!["first_pass".to_string()],
                ),
            ],
        );
        assert_eq!(system.roles().len(), 1);
    }
}
