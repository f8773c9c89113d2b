//! Neighbourhood operators
//!
//! The operator registry maps a name to a weight and an apply function;
//! solvers draw operators by normalised weight. Every operator respects
//! windows, availability, locks, eligibility, and blackouts, and returns
//! `None` when it cannot produce a feasible candidate (counted as skipped
//! by the caller).

use rand::Rng;

use crate::application::services::ProblemView;
use crate::application::solvers::rng::SolverRng;
use crate::application::solvers::schedule::Schedule;

/// A neighbourhood move generator
pub trait NeighbourhoodOperator: Send + Sync {
    fn name(&self) -> &'static str;

    /// Produces a feasible neighbour of `schedule`, or `None` when no
    /// feasible move exists from the sampled starting point
    fn apply(
        &self,
        view: &ProblemView,
        schedule: &Schedule,
        rng: &mut SolverRng,
    ) -> Option<Schedule>;
}

/// Registry entry: operator plus its selection weight
pub struct OperatorEntry {
    pub weight: f64,
    pub operator: Box<dyn NeighbourhoodOperator>,
}

/// Weighted operator registry, constructed per solver call
pub struct OperatorRegistry {
    entries: Vec<OperatorEntry>,
}

impl OperatorRegistry {
    /// Empty registry
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Registry with the five built-in operators at default weights
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(1.0, Box::new(SwapOperator));
        registry.register(1.0, Box::new(MoveOperator));
        registry.register(1.0, Box::new(BlockInsertionOperator));
        registry.register(0.5, Box::new(CrossExchangeOperator));
        registry.register(0.5, Box::new(MobilisationShakeOperator));
        registry
    }

    pub fn register(&mut self, weight: f64, operator: Box<dyn NeighbourhoodOperator>) {
        self.entries.push(OperatorEntry { weight, operator });
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entry(&self, index: usize) -> &OperatorEntry {
        &self.entries[index]
    }

    /// Draws an operator index by normalised weight
    pub fn pick(&self, rng: &mut SolverRng) -> usize {
        let total: f64 = self.entries.iter().map(|e| e.weight).sum();
        if total <= 0.0 {
            return rng.gen_range(0..self.entries.len());
        }
        let mut draw = rng.gen::<f64>() * total;
        for (i, entry) in self.entries.iter().enumerate() {
            draw -= entry.weight;
            if draw <= 0.0 {
                return i;
            }
        }
        self.entries.len() - 1
    }
}

impl Default for OperatorRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

/// Per-operator counters reported through telemetry
#[derive(Debug, Clone, serde::Serialize)]
pub struct OperatorStats {
    pub name: &'static str,
    pub weight: f64,
    pub proposals: u64,
    pub accepted: u64,
    pub skipped: u64,
}

impl OperatorStats {
    pub fn new(name: &'static str, weight: f64) -> Self {
        Self {
            name,
            weight,
            proposals: 0,
            accepted: 0,
            skipped: 0,
        }
    }

    pub fn acceptance_rate(&self) -> f64 {
        if self.proposals == 0 {
            0.0
        } else {
            self.accepted as f64 / self.proposals as f64
        }
    }
}

/// Collects assigned, unlocked slots in stable order
fn unlocked_assignments(view: &ProblemView, schedule: &Schedule) -> Vec<(usize, usize, usize, usize)> {
    schedule
        .assignments()
        .filter(|&(m, d, s, _)| view.locked_block_at(m, d, s).is_none())
        .collect()
}

/// Exchanges the blocks of two machines at one (day, shift) slot
///
/// Both machines must be eligible and available for the other's block, and
/// both blocks' windows must admit the day.
pub struct SwapOperator;

impl NeighbourhoodOperator for SwapOperator {
    fn name(&self) -> &'static str {
        "swap"
    }

    fn apply(
        &self,
        view: &ProblemView,
        schedule: &Schedule,
        rng: &mut SolverRng,
    ) -> Option<Schedule> {
        let slots = unlocked_assignments(view, schedule);
        if slots.is_empty() {
            return None;
        }
        let (m1, d, s, b1) = slots[rng.gen_range(0..slots.len())];

        let partners: Vec<(usize, usize)> = (0..view.num_machines())
            .filter(|&m2| m2 != m1)
            .filter_map(|m2| schedule.get(m2, d, s).map(|b2| (m2, b2)))
            .filter(|&(m2, b2)| {
                b2 != b1
                    && view.locked_block_at(m2, d, s).is_none()
                    && view.slot_allows(m1, d, s, b2)
                    && view.slot_allows(m2, d, s, b1)
            })
            .collect();
        if partners.is_empty() {
            return None;
        }
        let (m2, b2) = partners[rng.gen_range(0..partners.len())];

        let mut neighbour = schedule.clone();
        neighbour.set(m1, d, s, Some(b2));
        neighbour.set(m2, d, s, Some(b1));
        Some(neighbour)
    }
}

/// Re-homes one assignment to a different free (day, shift) of the same
/// machine inside the block's window
pub struct MoveOperator;

impl NeighbourhoodOperator for MoveOperator {
    fn name(&self) -> &'static str {
        "move"
    }

    fn apply(
        &self,
        view: &ProblemView,
        schedule: &Schedule,
        rng: &mut SolverRng,
    ) -> Option<Schedule> {
        let slots = unlocked_assignments(view, schedule);
        if slots.is_empty() {
            return None;
        }
        let (m, d, s, b) = slots[rng.gen_range(0..slots.len())];

        let mut targets = Vec::new();
        let (start, end) = view.window(b);
        for d2 in start..=end {
            for s2 in 0..view.shifts_per_day() {
                if (d2, s2) != (d, s)
                    && schedule.get(m, d2, s2).is_none()
                    && view.locked_block_at(m, d2, s2).is_none()
                    && view.slot_allows(m, d2, s2, b)
                {
                    targets.push((d2, s2));
                }
            }
        }
        if targets.is_empty() {
            return None;
        }
        let (d2, s2) = targets[rng.gen_range(0..targets.len())];

        let mut neighbour = schedule.clone();
        neighbour.set(m, d, s, None);
        neighbour.set(m, d2, s2, Some(b));
        Some(neighbour)
    }
}

/// Inserts a currently-unstarted block into a feasible slot, evicting any
/// previous occupant of the slot
pub struct BlockInsertionOperator;

impl NeighbourhoodOperator for BlockInsertionOperator {
    fn name(&self) -> &'static str {
        "block_insertion"
    }

    fn apply(
        &self,
        view: &ProblemView,
        schedule: &Schedule,
        rng: &mut SolverRng,
    ) -> Option<Schedule> {
        let mut started = vec![false; view.num_blocks()];
        for (_, _, _, b) in schedule.assignments() {
            started[b] = true;
        }
        let unstarted: Vec<usize> = (0..view.num_blocks()).filter(|&b| !started[b]).collect();
        if unstarted.is_empty() {
            return None;
        }
        let b = unstarted[rng.gen_range(0..unstarted.len())];

        let (start, end) = view.window(b);
        let mut slots = Vec::new();
        for m in 0..view.num_machines() {
            for d in start..=end {
                for s in 0..view.shifts_per_day() {
                    if view.locked_block_at(m, d, s).is_none() && view.slot_allows(m, d, s, b) {
                        slots.push((m, d, s));
                    }
                }
            }
        }
        if slots.is_empty() {
            return None;
        }
        let (m, d, s) = slots[rng.gen_range(0..slots.len())];

        let mut neighbour = schedule.clone();
        neighbour.set(m, d, s, Some(b));
        Some(neighbour)
    }
}

/// Swaps two assignments across two different machines at possibly
/// different (day, shift) slots
pub struct CrossExchangeOperator;

impl NeighbourhoodOperator for CrossExchangeOperator {
    fn name(&self) -> &'static str {
        "cross_exchange"
    }

    fn apply(
        &self,
        view: &ProblemView,
        schedule: &Schedule,
        rng: &mut SolverRng,
    ) -> Option<Schedule> {
        let slots = unlocked_assignments(view, schedule);
        if slots.len() < 2 {
            return None;
        }
        let (m1, d1, s1, b1) = slots[rng.gen_range(0..slots.len())];

        let partners: Vec<(usize, usize, usize, usize)> = slots
            .iter()
            .copied()
            .filter(|&(m2, d2, s2, b2)| {
                m2 != m1
                    && b2 != b1
                    && view.slot_allows(m1, d1, s1, b2)
                    && view.slot_allows(m2, d2, s2, b1)
            })
            .collect();
        if partners.is_empty() {
            return None;
        }
        let (m2, d2, s2, b2) = partners[rng.gen_range(0..partners.len())];

        let mut neighbour = schedule.clone();
        neighbour.set(m1, d1, s1, Some(b2));
        neighbour.set(m2, d2, s2, Some(b1));
        Some(neighbour)
    }
}

/// Move biased toward reducing mobilisation: collapses one costed intra-day
/// transition by pulling the later shift onto the earlier block
pub struct MobilisationShakeOperator;

impl NeighbourhoodOperator for MobilisationShakeOperator {
    fn name(&self) -> &'static str {
        "mobilisation_shake"
    }

    fn apply(
        &self,
        view: &ProblemView,
        schedule: &Schedule,
        rng: &mut SolverRng,
    ) -> Option<Schedule> {
        // Costed transitions (m, d, s_prev block, s block)
        let mut transitions = Vec::new();
        for m in 0..view.num_machines() {
            for d in 0..view.num_days() {
                let mut prev: Option<(usize, usize)> = None;
                for s in 0..view.shifts_per_day() {
                    if let Some(b) = schedule.get(m, d, s) {
                        if let Some((_, pb)) = prev {
                            if pb != b && view.transition_cost(m, pb, b) > 0.0 {
                                transitions.push((m, d, s, pb));
                            }
                        }
                        prev = Some((s, b));
                    }
                }
            }
        }

        // Prefer collapsing the transition; fall back to clearing the slot
        while !transitions.is_empty() {
            let idx = rng.gen_range(0..transitions.len());
            let (m, d, s, prev_block) = transitions.swap_remove(idx);
            if view.locked_block_at(m, d, s).is_some() {
                continue;
            }
            let mut neighbour = schedule.clone();
            if view.slot_allows(m, d, s, prev_block) {
                neighbour.set(m, d, s, Some(prev_block));
            } else {
                neighbour.set(m, d, s, None);
            }
            return Some(neighbour);
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::services::scenario_validator::ScenarioValidator;
    use crate::application::solvers::rng::rng_from_seed;
    use crate::domain::entities::definition::*;
    use crate::domain::value_objects::DefaultCosting;
    use std::sync::Arc;

    fn view() -> ProblemView {
        let definition = ScenarioDefinition {
            horizon_days: 3,
            landings: vec![LandingRow {
                id: "L1".to_string(),
                daily_capacity: Some(2),
            }],
            machines: vec![
                MachineRow {
                    id: "M1".to_string(),
                    ..Default::default()
                },
                MachineRow {
                    id: "M2".to_string(),
                    ..Default::default()
                },
            ],
            blocks: vec![
                BlockRow {
                    id: "B1".to_string(),
                    landing_id: "L1".to_string(),
                    work_required: Some(6.0),
                    ..Default::default()
                },
                BlockRow {
                    id: "B2".to_string(),
                    landing_id: "L1".to_string(),
                    work_required: Some(6.0),
                    ..Default::default()
                },
            ],
            production_rates: vec![
                RateRow {
                    machine_id: "M1".to_string(),
                    block_id: "B1".to_string(),
                    rate: Some(2.0),
                },
                RateRow {
                    machine_id: "M1".to_string(),
                    block_id: "B2".to_string(),
                    rate: Some(2.0),
                },
                RateRow {
                    machine_id: "M2".to_string(),
                    block_id: "B1".to_string(),
                    rate: Some(2.0),
                },
                RateRow {
                    machine_id: "M2".to_string(),
                    block_id: "B2".to_string(),
                    rate: Some(2.0),
                },
            ],
            ..Default::default()
        };
        let scenario = ScenarioValidator::validate(&definition, &DefaultCosting).unwrap();
        ProblemView::new(Arc::new(scenario))
    }

    #[test]
    fn test_swap_exchanges_blocks() {
        let view = view();
        let mut schedule = Schedule::empty(2, 3, 1);
        let b1 = view.block_index("B1").unwrap();
        let b2 = view.block_index("B2").unwrap();
        schedule.set(0, 0, 0, Some(b1));
        schedule.set(1, 0, 0, Some(b2));

        let mut rng = rng_from_seed(1);
        let neighbour = SwapOperator.apply(&view, &schedule, &mut rng).unwrap();
        assert_eq!(neighbour.get(0, 0, 0), Some(b2));
        assert_eq!(neighbour.get(1, 0, 0), Some(b1));
    }

    #[test]
    fn test_move_keeps_assignment_count() {
        let view = view();
        let mut schedule = Schedule::empty(2, 3, 1);
        schedule.set(0, 0, 0, Some(0));

        let mut rng = rng_from_seed(3);
        let neighbour = MoveOperator.apply(&view, &schedule, &mut rng).unwrap();
        assert_eq!(neighbour.assigned_count(), 1);
        assert_ne!(neighbour, schedule);
    }

    #[test]
    fn test_block_insertion_requires_unstarted_block() {
        let view = view();
        let mut schedule = Schedule::empty(2, 3, 1);
        schedule.set(0, 0, 0, Some(0));
        schedule.set(1, 0, 0, Some(1));

        let mut rng = rng_from_seed(5);
        // Both blocks started: the operator must skip
        assert!(BlockInsertionOperator
            .apply(&view, &schedule, &mut rng)
            .is_none());

        schedule.set(1, 0, 0, None);
        schedule.set(1, 1, 0, None);
        let cleared = {
            let mut s = Schedule::empty(2, 3, 1);
            s.set(0, 0, 0, Some(0));
            s
        };
        let neighbour = BlockInsertionOperator
            .apply(&view, &cleared, &mut rng)
            .unwrap();
        assert_eq!(neighbour.assigned_count(), 2);
    }

    #[test]
    fn test_registry_pick_is_weighted_and_deterministic() {
        let registry = OperatorRegistry::with_defaults();
        let mut a = rng_from_seed(9);
        let mut b = rng_from_seed(9);
        for _ in 0..50 {
            assert_eq!(registry.pick(&mut a), registry.pick(&mut b));
        }
    }

    #[test]
    fn test_operators_never_touch_locked_slots() {
        let definition = ScenarioDefinition {
            horizon_days: 2,
            landings: vec![LandingRow {
                id: "L1".to_string(),
                daily_capacity: Some(2),
            }],
            machines: vec![MachineRow {
                id: "M1".to_string(),
                ..Default::default()
            }],
            blocks: vec![
                BlockRow {
                    id: "B1".to_string(),
                    landing_id: "L1".to_string(),
                    work_required: Some(2.0),
                    ..Default::default()
                },
                BlockRow {
                    id: "B2".to_string(),
                    landing_id: "L1".to_string(),
                    work_required: Some(2.0),
                    ..Default::default()
                },
            ],
            production_rates: vec![
                RateRow {
                    machine_id: "M1".to_string(),
                    block_id: "B1".to_string(),
                    rate: Some(2.0),
                },
                RateRow {
                    machine_id: "M1".to_string(),
                    block_id: "B2".to_string(),
                    rate: Some(2.0),
                },
            ],
            locked_assignments: vec![crate::domain::entities::ScheduleLock::new(
                "M1", "B1", 1, None,
            )],
            ..Default::default()
        };
        let scenario = ScenarioValidator::validate(&definition, &DefaultCosting).unwrap();
        let view = ProblemView::new(Arc::new(scenario));
        let b1 = view.block_index("B1").unwrap();

        let mut schedule = Schedule::empty(1, 2, 1);
        schedule.set(0, 0, 0, Some(b1));

        let mut rng = rng_from_seed(11);
        for _ in 0..20 {
            if let Some(neighbour) = MoveOperator.apply(&view, &schedule, &mut rng) {
                assert_eq!(neighbour.get(0, 0, 0), Some(b1), "locked slot moved");
            }
        }
    }
}
