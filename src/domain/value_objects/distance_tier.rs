//! Distance tier value object module
//!
//! Inter-block distances are not used raw: mobilisation costing and the
//! solvers both work on a coarse tier derived from the distance and the
//! machine's walk threshold.

use serde::{Deserialize, Serialize};

/// Tier of a transition between two blocks, by inter-block distance
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum DistanceTier {
    /// Same block on both sides of the transition; no cost
    SameBlock,
    /// Distance below the walk threshold; the machine walks over
    Walk,
    /// Distance at or above the walk threshold; a lowbed move
    Move,
    /// No distance on record; conservative move-style penalty applies
    Unknown,
}

impl DistanceTier {
    /// Classifies a transition between two blocks
    ///
    /// # Arguments
    ///
    /// * `same_block` - Whether both sides of the transition are one block
    /// * `distance_m` - Matrix distance in metres, if present
    /// * `walk_threshold_m` - Walk/move cutoff for the machine
    pub fn classify(same_block: bool, distance_m: Option<f64>, walk_threshold_m: f64) -> Self {
        if same_block {
            return DistanceTier::SameBlock;
        }
        match distance_m {
            Some(d) if d < walk_threshold_m => DistanceTier::Walk,
            Some(_) => DistanceTier::Move,
            None => DistanceTier::Unknown,
        }
    }

    /// Whether the tier incurs any mobilisation cost
    pub fn is_costed(&self) -> bool {
        !matches!(self, DistanceTier::SameBlock)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_tiers() {
        assert_eq!(
            DistanceTier::classify(true, Some(5000.0), 1000.0),
            DistanceTier::SameBlock
        );
        assert_eq!(
            DistanceTier::classify(false, Some(400.0), 1000.0),
            DistanceTier::Walk
        );
        assert_eq!(
            DistanceTier::classify(false, Some(1000.0), 1000.0),
            DistanceTier::Move
        );
        assert_eq!(
            DistanceTier::classify(false, None, 1000.0),
            DistanceTier::Unknown
        );
    }
}
