//! Mobilisation entities
//!
//! Mobilisation is the cost of a machine changing blocks: below the walk
//! threshold the machine walks over, at or above it a lowbed move with a
//! setup charge applies. Distances come from a symmetric block-by-block
//! matrix in metres; a missing cell means the distance is unknown and the
//! conservative default penalty applies.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

use crate::domain::value_objects::DistanceTier;

/// Per-machine mobilisation parameters
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MobilisationParams {
    /// Distances below this (metres) are walkable
    pub walk_threshold_m: f64,
    /// Flat cost of a walk-tier transition
    pub walk_cost: f64,
    /// Setup charge on every move-tier transition
    pub setup_cost: f64,
    /// Per-kilometre charge on move-tier transitions
    pub move_cost_per_km: f64,
    /// Flat penalty when the distance is unknown
    pub unknown_cost: f64,
}

impl Default for MobilisationParams {
    fn default() -> Self {
        Self {
            walk_threshold_m: 1000.0,
            walk_cost: 25.0,
            setup_cost: 150.0,
            move_cost_per_km: 2.0,
            unknown_cost: 400.0,
        }
    }
}

impl MobilisationParams {
    /// Cost of one transition, by tier
    ///
    /// # Arguments
    ///
    /// * `tier` - Transition tier
    /// * `distance_m` - Matrix distance in metres, when known
    pub fn transition_cost(&self, tier: DistanceTier, distance_m: Option<f64>) -> f64 {
        match tier {
            DistanceTier::SameBlock => 0.0,
            DistanceTier::Walk => self.walk_cost,
            DistanceTier::Move => {
                self.setup_cost + self.move_cost_per_km * distance_m.unwrap_or(0.0) / 1000.0
            }
            DistanceTier::Unknown => self.unknown_cost,
        }
    }
}

/// Mobilisation configuration: default parameters plus per-machine overrides
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct MobilisationConfig {
    #[serde(default)]
    pub default_params: MobilisationParams,
    /// Per-machine parameter overrides, keyed by machine id
    #[serde(default)]
    pub per_machine: BTreeMap<String, MobilisationParams>,
}

impl MobilisationConfig {
    /// Parameters in effect for a machine
    pub fn params_for(&self, machine_id: &str) -> &MobilisationParams {
        self.per_machine
            .get(machine_id)
            .unwrap_or(&self.default_params)
    }
}

/// Symmetric inter-block distance matrix in metres
///
/// Cells may be missing (unknown distance); the diagonal is zero.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct DistanceMatrix {
    block_ids: Vec<String>,
    #[serde(skip)]
    index: HashMap<String, usize>,
    cells: Vec<Option<f64>>,
}

impl DistanceMatrix {
    /// Builds a matrix over the given block ids with all cells unknown
    pub fn new(block_ids: Vec<String>) -> Self {
        let n = block_ids.len();
        let index = block_ids
            .iter()
            .enumerate()
            .map(|(i, id)| (id.clone(), i))
            .collect();
        let mut cells = vec![None; n * n];
        for i in 0..n {
            cells[i * n + i] = Some(0.0);
        }
        Self {
            block_ids,
            index,
            cells,
        }
    }

    /// Block ids covered by the matrix, in declaration order
    pub fn block_ids(&self) -> &[String] {
        &self.block_ids
    }

    /// Sets a distance symmetrically
    pub fn set(&mut self, a: &str, b: &str, metres: f64) {
        if let (Some(&i), Some(&j)) = (self.index.get(a), self.index.get(b)) {
            let n = self.block_ids.len();
            self.cells[i * n + j] = Some(metres);
            self.cells[j * n + i] = Some(metres);
        }
    }

    /// Distance between two blocks in metres, if known
    pub fn get(&self, a: &str, b: &str) -> Option<f64> {
        let (&i, &j) = (self.index.get(a)?, self.index.get(b)?);
        self.cells[i * self.block_ids.len() + j]
    }

    /// Rebuilds the id lookup after deserialisation
    pub fn rebuild_index(&mut self) {
        self.index = self
            .block_ids
            .iter()
            .enumerate()
            .map(|(i, id)| (id.clone(), i))
            .collect();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_matrix_symmetry_and_diagonal() {
        let mut matrix = DistanceMatrix::new(vec!["B1".to_string(), "B2".to_string()]);
        matrix.set("B1", "B2", 5000.0);

        assert_eq!(matrix.get("B1", "B1"), Some(0.0));
        assert_eq!(matrix.get("B1", "B2"), Some(5000.0));
        assert_eq!(matrix.get("B2", "B1"), Some(5000.0));
        assert_eq!(matrix.get("B1", "B9"), None);
    }

    #[test]
    fn test_transition_cost_by_tier() {
        let params = MobilisationParams {
            walk_threshold_m: 1000.0,
            walk_cost: 25.0,
            setup_cost: 100.0,
            move_cost_per_km: 10.0,
            unknown_cost: 400.0,
        };
        assert_eq!(params.transition_cost(DistanceTier::SameBlock, Some(0.0)), 0.0);
        assert_eq!(params.transition_cost(DistanceTier::Walk, Some(500.0)), 25.0);
        assert_eq!(
            params.transition_cost(DistanceTier::Move, Some(5000.0)),
            100.0 + 50.0
        );
        assert_eq!(params.transition_cost(DistanceTier::Unknown, None), 400.0);
    }

    #[test]
    fn test_params_for_override() {
        let mut config = MobilisationConfig::default();
        config.per_machine.insert(
            "M2".to_string(),
            MobilisationParams {
                walk_threshold_m: 250.0,
                ..MobilisationParams::default()
            },
        );
        assert_eq!(config.params_for("M1").walk_threshold_m, 1000.0);
        assert_eq!(config.params_for("M2").walk_threshold_m, 250.0);
    }
}
