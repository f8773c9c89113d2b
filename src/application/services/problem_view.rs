//! Problem view service
//!
//! Materialises the index sets the solvers work on: interned machine, block
//! and landing indices, the flattened availability table (day calendar +
//! shift calendar + blackouts), eligibility, dense rate lookups, distance
//! tiers, resolved lock slots, and role-precedence edges per block.
//!
//! A `ProblemView` is derived once from a validated scenario and shared
//! read-only between the MIP and the heuristics. All internal indices are
//! zero-based; days convert to the 1-based scenario numbering at the edges.

use std::collections::HashMap;
use std::sync::Arc;

use crate::domain::entities::Scenario;
use crate::domain::value_objects::{DistanceTier, MachineRole};

/// A lock resolved to concrete slot indices
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedLock {
    pub machine: usize,
    pub block: usize,
    pub day: usize,
    pub shift: usize,
}

/// Read-only, precomputed view of a validated scenario
#[derive(Debug)]
pub struct ProblemView {
    scenario: Arc<Scenario>,

    machine_ids: Vec<String>,
    machine_index: HashMap<String, usize>,
    block_ids: Vec<String>,
    block_index: HashMap<String, usize>,
    landing_ids: Vec<String>,
    landing_capacity: Vec<u32>,
    block_landing: Vec<usize>,

    days: usize,
    shift_ids: Vec<String>,
    shift_hours: Vec<f64>,

    /// Flattened `[machine][day][shift]` availability
    available: Vec<bool>,
    /// Flattened `[machine][block]` eligibility
    eligible: Vec<bool>,
    /// Flattened `[machine][block]` production per assigned shift
    rate: Vec<f64>,
    /// Flattened `[block][block]` distances in metres
    distance: Vec<Option<f64>>,

    /// Block day windows as 0-based inclusive index ranges
    window: Vec<(usize, usize)>,
    work_required: Vec<f64>,

    /// Interned machine roles; `machine_role[m]` points into `roles`
    roles: Vec<MachineRole>,
    machine_role: Vec<Option<usize>>,
    /// Per-block deduplicated (prerequisite role, dependent role) edges
    precedence: Vec<Vec<(usize, usize)>>,

    locks: Vec<ResolvedLock>,
    /// Dense `[machine][day][shift]` locked block lookup
    locked_slot: Vec<Option<u32>>,
}

impl ProblemView {
    /// Builds the view from a validated scenario
    pub fn new(scenario: Arc<Scenario>) -> Self {
        let machine_ids: Vec<String> = scenario.machines.iter().map(|m| m.id.clone()).collect();
        let machine_index: HashMap<String, usize> = machine_ids
            .iter()
            .enumerate()
            .map(|(i, id)| (id.clone(), i))
            .collect();
        let block_ids: Vec<String> = scenario.blocks.iter().map(|b| b.id.clone()).collect();
        let block_index: HashMap<String, usize> = block_ids
            .iter()
            .enumerate()
            .map(|(i, id)| (id.clone(), i))
            .collect();
        let landing_ids: Vec<String> = scenario.landings.iter().map(|l| l.id.clone()).collect();
        let landing_index: HashMap<String, usize> = landing_ids
            .iter()
            .enumerate()
            .map(|(i, id)| (id.clone(), i))
            .collect();
        let landing_capacity: Vec<u32> = scenario
            .landings
            .iter()
            .map(|l| l.daily_capacity)
            .collect();
        let block_landing: Vec<usize> = scenario
            .blocks
            .iter()
            .map(|b| landing_index[&b.landing_id])
            .collect();

        let days = scenario.horizon_days as usize;
        let shift_ids: Vec<String> = scenario
            .timeline
            .shifts
            .iter()
            .map(|s| s.id.clone())
            .collect();
        let shift_hours: Vec<f64> = scenario.timeline.shifts.iter().map(|s| s.hours).collect();
        let shifts = shift_ids.len();

        let machines = machine_ids.len();
        let blocks = block_ids.len();

        let mut available = vec![true; machines * days * shifts];
        // Day calendar first, then shift-level overrides, then blackouts
        for entry in &scenario.calendar {
            if entry.day == 0 || entry.day as usize > days {
                continue;
            }
            if let Some(&m) = machine_index.get(&entry.machine_id) {
                let d = entry.day as usize - 1;
                for s in 0..shifts {
                    available[(m * days + d) * shifts + s] = entry.available;
                }
            }
        }
        for entry in &scenario.shift_calendar {
            if entry.day == 0 || entry.day as usize > days {
                continue;
            }
            if let (Some(&m), Some(s)) = (
                machine_index.get(&entry.machine_id),
                shift_ids.iter().position(|id| id == &entry.shift_id),
            ) {
                let d = entry.day as usize - 1;
                available[(m * days + d) * shifts + s] = entry.available;
            }
        }
        for blackout in &scenario.timeline.blackouts {
            for (m, machine_id) in machine_ids.iter().enumerate() {
                for day in blackout.start_day..=blackout.end_day.min(days as u32) {
                    if day >= 1 && blackout.covers(machine_id, day) {
                        let d = day as usize - 1;
                        for s in 0..shifts {
                            available[(m * days + d) * shifts + s] = false;
                        }
                    }
                }
            }
        }

        let mut rate = vec![0.0; machines * blocks];
        for r in &scenario.rates {
            if let (Some(&m), Some(&b)) = (
                machine_index.get(&r.machine_id),
                block_index.get(&r.block_id),
            ) {
                rate[m * blocks + b] = r.rate;
            }
        }

        // Intern roles across machines and harvest systems
        let mut roles: Vec<MachineRole> = Vec::new();
        let role_of = |role: &MachineRole, roles: &mut Vec<MachineRole>| -> usize {
            match roles.iter().position(|r| r == role) {
                Some(i) => i,
                None => {
                    roles.push(role.clone());
                    roles.len() - 1
                }
            }
        };
        let machine_role: Vec<Option<usize>> = scenario
            .machines
            .iter()
            .map(|m| m.role.as_ref().map(|r| role_of(r, &mut roles)))
            .collect();

        let mut eligible = vec![false; machines * blocks];
        for (m, machine) in scenario.machines.iter().enumerate() {
            for (b, block) in scenario.blocks.iter().enumerate() {
                let role_ok = match &block.harvest_system_id {
                    Some(system_id) => {
                        let system = &scenario.harvest_systems[system_id];
                        machine
                            .role
                            .as_ref()
                            .map(|role| system.requires_role(role))
                            .unwrap_or(false)
                    }
                    None => true,
                };
                eligible[m * blocks + b] = role_ok && rate[m * blocks + b] > 0.0;
            }
        }

        let mut precedence: Vec<Vec<(usize, usize)>> = Vec::with_capacity(blocks);
        for block in &scenario.blocks {
            let mut edges: Vec<(usize, usize)> = Vec::new();
            if let Some(system_id) = &block.harvest_system_id {
                let system = &scenario.harvest_systems[system_id];
                let job_role: HashMap<&str, usize> = system
                    .jobs
                    .iter()
                    .map(|j| (j.name.as_str(), role_of(&j.role, &mut roles)))
                    .collect();
                for job in &system.jobs {
                    let dep = job_role[job.name.as_str()];
                    for prereq_name in &job.prerequisites {
                        if let Some(&prereq) = job_role.get(prereq_name.as_str()) {
                            if prereq != dep && !edges.contains(&(prereq, dep)) {
                                edges.push((prereq, dep));
                            }
                        }
                    }
                }
            }
            precedence.push(edges);
        }

        let window: Vec<(usize, usize)> = scenario
            .blocks
            .iter()
            .map(|b| {
                (
                    b.earliest_start as usize - 1,
                    (b.latest_finish.min(scenario.horizon_days)) as usize - 1,
                )
            })
            .collect();
        let work_required: Vec<f64> = scenario.blocks.iter().map(|b| b.work_required).collect();

        let mut distance = vec![None; blocks * blocks];
        for b in 0..blocks {
            distance[b * blocks + b] = Some(0.0);
        }
        if let Some(matrix) = &scenario.distances {
            for (i, a) in block_ids.iter().enumerate() {
                for (j, b) in block_ids.iter().enumerate() {
                    distance[i * blocks + j] = matrix.get(a, b);
                }
            }
            // The diagonal is zero by definition even when absent from the file
            for b in 0..blocks {
                distance[b * blocks + b] = Some(0.0);
            }
        }

        // Resolve locks to concrete slots; validation already guaranteed
        // resolvability, so unresolvable entries are simply skipped here.
        let mut locks = Vec::new();
        let mut locked_slot = vec![None; machines * days * shifts];
        for lock in &scenario.locks {
            if lock.day == 0 || lock.day as usize > days {
                continue;
            }
            let (m, b) = match (
                machine_index.get(&lock.machine_id),
                block_index.get(&lock.block_id),
            ) {
                (Some(&m), Some(&b)) => (m, b),
                _ => continue,
            };
            let d = lock.day as usize - 1;
            let s = match &lock.shift_id {
                Some(shift_id) => match shift_ids.iter().position(|id| id == shift_id) {
                    Some(s) => s,
                    None => continue,
                },
                None => match (0..shifts).find(|&s| available[(m * days + d) * shifts + s]) {
                    Some(s) => s,
                    None => continue,
                },
            };
            locks.push(ResolvedLock {
                machine: m,
                block: b,
                day: d,
                shift: s,
            });
            locked_slot[(m * days + d) * shifts + s] = Some(b as u32);
        }

        Self {
            scenario,
            machine_ids,
            machine_index,
            block_ids,
            block_index,
            landing_ids,
            landing_capacity,
            block_landing,
            days,
            shift_ids,
            shift_hours,
            available,
            eligible,
            rate,
            distance,
            window,
            work_required,
            roles,
            machine_role,
            precedence,
            locks,
            locked_slot,
        }
    }

    pub fn scenario(&self) -> &Scenario {
        &self.scenario
    }

    pub fn num_machines(&self) -> usize {
        self.machine_ids.len()
    }

    pub fn num_blocks(&self) -> usize {
        self.block_ids.len()
    }

    pub fn num_landings(&self) -> usize {
        self.landing_ids.len()
    }

    pub fn num_days(&self) -> usize {
        self.days
    }

    pub fn shifts_per_day(&self) -> usize {
        self.shift_ids.len()
    }

    pub fn machine_id(&self, m: usize) -> &str {
        &self.machine_ids[m]
    }

    pub fn block_id(&self, b: usize) -> &str {
        &self.block_ids[b]
    }

    pub fn landing_id(&self, l: usize) -> &str {
        &self.landing_ids[l]
    }

    pub fn shift_id(&self, s: usize) -> &str {
        &self.shift_ids[s]
    }

    pub fn shift_hours(&self, s: usize) -> f64 {
        self.shift_hours[s]
    }

    pub fn machine_index(&self, id: &str) -> Option<usize> {
        self.machine_index.get(id).copied()
    }

    pub fn block_index(&self, id: &str) -> Option<usize> {
        self.block_index.get(id).copied()
    }

    /// Availability of one (machine, day, shift) slot
    pub fn available(&self, m: usize, d: usize, s: usize) -> bool {
        self.available[(m * self.days + d) * self.shift_ids.len() + s]
    }

    /// Whether the machine can ever work the block
    pub fn eligible(&self, m: usize, b: usize) -> bool {
        self.eligible[m * self.block_ids.len() + b]
    }

    /// Production per assigned shift; zero when ineligible
    pub fn rate(&self, m: usize, b: usize) -> f64 {
        if self.eligible(m, b) {
            self.rate[m * self.block_ids.len() + b]
        } else {
            0.0
        }
    }

    pub fn work_required(&self, b: usize) -> f64 {
        self.work_required[b]
    }

    /// Block day window as a 0-based inclusive index range
    pub fn window(&self, b: usize) -> (usize, usize) {
        self.window[b]
    }

    pub fn landing_of(&self, b: usize) -> usize {
        self.block_landing[b]
    }

    pub fn landing_capacity(&self, l: usize) -> u32 {
        self.landing_capacity[l]
    }

    /// Full feasibility of assigning block `b` at slot `(m, d, s)`:
    /// availability, eligibility, and the block's window
    pub fn slot_allows(&self, m: usize, d: usize, s: usize, b: usize) -> bool {
        let (start, end) = self.window[b];
        d >= start && d <= end && self.available(m, d, s) && self.eligible(m, b)
    }

    /// Inter-block distance in metres, if known
    pub fn distance(&self, b1: usize, b2: usize) -> Option<f64> {
        self.distance[b1 * self.block_ids.len() + b2]
    }

    /// Tier of a transition for a machine, honouring its walk threshold
    pub fn transition_tier(&self, m: usize, b1: usize, b2: usize) -> DistanceTier {
        let threshold = self
            .scenario
            .mobilisation
            .as_ref()
            .map(|c| c.params_for(&self.machine_ids[m]).walk_threshold_m)
            .unwrap_or(1000.0);
        DistanceTier::classify(b1 == b2, self.distance(b1, b2), threshold)
    }

    /// Mobilisation cost of a transition; zero without a mobilisation config
    pub fn transition_cost(&self, m: usize, b1: usize, b2: usize) -> f64 {
        match &self.scenario.mobilisation {
            None => 0.0,
            Some(config) => {
                let params = config.params_for(&self.machine_ids[m]);
                let tier =
                    DistanceTier::classify(b1 == b2, self.distance(b1, b2), params.walk_threshold_m);
                params.transition_cost(tier, self.distance(b1, b2))
            }
        }
    }

    /// Interned role index of a machine
    pub fn machine_role(&self, m: usize) -> Option<usize> {
        self.machine_role[m]
    }

    pub fn role_name(&self, role: usize) -> &str {
        self.roles[role].as_str()
    }

    pub fn num_roles(&self) -> usize {
        self.roles.len()
    }

    /// Deduplicated (prerequisite role, dependent role) edges for a block
    pub fn precedence_edges(&self, b: usize) -> &[(usize, usize)] {
        &self.precedence[b]
    }

    /// All resolved lock slots
    pub fn locks(&self) -> &[ResolvedLock] {
        &self.locks
    }

    /// The locked block at a slot, if the slot is locked
    pub fn locked_block_at(&self, m: usize, d: usize, s: usize) -> Option<usize> {
        self.locked_slot[(m * self.days + d) * self.shift_ids.len() + s].map(|b| b as usize)
    }

    pub fn weights(&self) -> &crate::domain::entities::ObjectiveWeights {
        &self.scenario.weights
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::services::scenario_validator::ScenarioValidator;
    use crate::domain::entities::definition::*;
    use crate::domain::entities::ScheduleLock;
    use crate::domain::value_objects::DefaultCosting;

    fn view_for(definition: &ScenarioDefinition) -> ProblemView {
        let scenario = ScenarioValidator::validate(definition, &DefaultCosting).unwrap();
        ProblemView::new(Arc::new(scenario))
    }

    fn two_block_definition() -> ScenarioDefinition {
        ScenarioDefinition {
            horizon_days: 5,
            landings: vec![LandingRow {
                id: "L1".to_string(),
                daily_capacity: Some(2),
            }],
            machines: vec![
                MachineRow {
                    id: "M1".to_string(),
                    role: Some("feller_buncher".to_string()),
                    ..Default::default()
                },
                MachineRow {
                    id: "M2".to_string(),
                    role: Some("processor".to_string()),
                    ..Default::default()
                },
            ],
            blocks: vec![
                BlockRow {
                    id: "B1".to_string(),
                    landing_id: "L1".to_string(),
                    work_required: Some(10.0),
                    ..Default::default()
                },
                BlockRow {
                    id: "B2".to_string(),
                    landing_id: "L1".to_string(),
                    work_required: Some(6.0),
                    earliest_start: Some(2),
                    latest_finish: Some(4),
                    ..Default::default()
                },
            ],
            production_rates: vec![
                RateRow {
                    machine_id: "M1".to_string(),
                    block_id: "B1".to_string(),
                    rate: Some(5.0),
                },
                RateRow {
                    machine_id: "M1".to_string(),
                    block_id: "B2".to_string(),
                    rate: Some(3.0),
                },
                RateRow {
                    machine_id: "M2".to_string(),
                    block_id: "B1".to_string(),
                    rate: Some(4.0),
                },
            ],
            ..Default::default()
        }
    }

    #[test]
    fn test_eligibility_requires_positive_rate() {
        let view = view_for(&two_block_definition());
        let m2 = view.machine_index("M2").unwrap();
        let b2 = view.block_index("B2").unwrap();
        // No rate row for (M2, B2)
        assert!(!view.eligible(m2, b2));
        assert_eq!(view.rate(m2, b2), 0.0);
    }

    #[test]
    fn test_window_indices_are_zero_based() {
        let view = view_for(&two_block_definition());
        let b2 = view.block_index("B2").unwrap();
        assert_eq!(view.window(b2), (1, 3));
        let m1 = view.machine_index("M1").unwrap();
        assert!(!view.slot_allows(m1, 0, 0, b2));
        assert!(view.slot_allows(m1, 1, 0, b2));
    }

    #[test]
    fn test_availability_combines_calendar_and_blackouts() {
        let mut definition = two_block_definition();
        definition.calendar = vec![CalendarRow {
            machine_id: "M1".to_string(),
            day: Some(2),
            available: Some(0),
        }];
        definition.timeline = Some(TimelineSection {
            blackouts: vec![BlackoutSection {
                start_day: 4,
                end_day: 4,
                machine_ids: vec!["M2".to_string()],
            }],
            ..Default::default()
        });
        let view = view_for(&definition);
        let m1 = view.machine_index("M1").unwrap();
        let m2 = view.machine_index("M2").unwrap();
        assert!(!view.available(m1, 1, 0));
        assert!(view.available(m2, 1, 0));
        assert!(!view.available(m2, 3, 0));
        assert!(view.available(m1, 3, 0));
    }

    #[test]
    fn test_shiftless_lock_resolves_to_first_available_shift() {
        let mut definition = two_block_definition();
        definition.timeline = Some(TimelineSection {
            shifts: vec![
                ShiftSection {
                    id: "D".to_string(),
                    hours: Some(10.0),
                },
                ShiftSection {
                    id: "N".to_string(),
                    hours: Some(8.0),
                },
            ],
            ..Default::default()
        });
        definition.shift_calendar = vec![ShiftCalendarRow {
            machine_id: "M1".to_string(),
            day: Some(1),
            shift_id: "D".to_string(),
            available: Some(0),
        }];
        definition.locked_assignments = vec![ScheduleLock::new("M1", "B1", 1, None)];
        let view = view_for(&definition);
        let locks = view.locks();
        assert_eq!(locks.len(), 1);
        // Day shift is blocked, so the lock lands on the night shift
        assert_eq!(locks[0].shift, 1);
        assert_eq!(view.locked_block_at(locks[0].machine, 0, 1), Some(locks[0].block));
    }

    #[test]
    fn test_precedence_edges_from_default_system() {
        let mut definition = two_block_definition();
        definition.blocks[0].harvest_system_id = Some("ground_based".to_string());
        // M2 (processor) keeps eligibility; M1 (feller_buncher) too
        let view = view_for(&definition);
        let b1 = view.block_index("B1").unwrap();
        let edges = view.precedence_edges(b1);
        // fell->skid->process->load yields three role edges
        assert_eq!(edges.len(), 3);
        let b2 = view.block_index("B2").unwrap();
        assert!(view.precedence_edges(b2).is_empty());
    }
}
