//! Scenario validation service
//!
//! Turns a raw [`ScenarioDefinition`] into an immutable [`Scenario`], or a
//! complete list of violations. The validator is strict and total: it keeps
//! going after the first problem so callers can report everything at once.

use std::collections::{BTreeMap, HashMap, HashSet};

use petgraph::algo::toposort;
use petgraph::graph::DiGraph;

use crate::domain::entities::definition::*;
use crate::domain::entities::{
    default_harvest_systems, Block, BlackoutWindow, CalendarEntry, HarvestJob, HarvestSystem,
    Landing, Machine, MobilisationConfig, MobilisationParams, ObjectiveWeights, ProductionRate,
    Scenario, ScheduleLock, ShiftCalendarEntry, ShiftDef, TimelineConfig, DEFAULT_LANDING_CAPACITY,
};
use crate::domain::errors::{ScenarioError, Violation, ViolationRule};
use crate::domain::value_objects::{CostingProvider, MachineRole};

/// Validator for raw scenario definitions
///
/// Cross-reference checks, range checks, role canonicalisation, cost
/// defaulting, harvest-system DAG rejection, and lock-consistency checks all
/// happen here; downstream code relies on the resulting invariants.
pub struct ScenarioValidator;

impl ScenarioValidator {
    /// Validates a definition into an immutable scenario
    ///
    /// # Arguments
    ///
    /// * `definition` - Raw scenario definition from the parsers
    /// * `costing` - Provider of operating-cost fallbacks for machines that
    ///   declare a role but no cost
    ///
    /// # Returns
    ///
    /// The validated scenario, or a [`ScenarioError`] enumerating every
    /// violation found.
    pub fn validate(
        definition: &ScenarioDefinition,
        costing: &dyn CostingProvider,
    ) -> Result<Scenario, ScenarioError> {
        let mut violations = Vec::new();
        let horizon = definition.horizon_days;

        if horizon == 0 {
            violations.push(Violation::new(
                "scenario",
                None,
                "horizon_days",
                ViolationRule::OutOfRange,
                "horizon must be at least one day",
            ));
        }

        let timeline = Self::build_timeline(definition, horizon, &mut violations);
        let landings = Self::build_landings(definition, &mut violations);
        let systems = Self::build_harvest_systems(definition, &mut violations);
        let mut machines =
            Self::build_machines(definition, &timeline, &systems, costing, &mut violations);
        // Inline crew assignments win over the machines table
        for (machine_id, crew) in &definition.crew_assignments {
            match machines.iter_mut().find(|m| &m.id == machine_id) {
                Some(machine) => {
                    machine.crew = Some(crew.clone()).filter(|c| !c.trim().is_empty());
                }
                None => violations.push(Violation::new(
                    "crew_assignments",
                    None,
                    "machine_id",
                    ViolationRule::InvalidReference,
                    format!("crew assignment references unknown machine '{}'", machine_id),
                )),
            }
        }
        let blocks = Self::build_blocks(definition, horizon, &landings, &systems, &mut violations);
        let calendar = Self::build_calendar(definition, horizon, &machines, &mut violations);
        let shift_calendar =
            Self::build_shift_calendar(definition, horizon, &machines, &timeline, &mut violations);
        let rates = Self::build_rates(definition, &machines, &blocks, &mut violations);
        let mobilisation = definition
            .mobilisation
            .as_ref()
            .map(|section| Self::build_mobilisation(section, &machines, &mut violations));
        let distances = Self::check_distances(definition, &blocks, &mut violations);
        let weights = Self::build_weights(definition, &mut violations);

        let scenario = Scenario {
            horizon_days: horizon,
            blocks,
            machines,
            landings,
            calendar,
            shift_calendar,
            timeline,
            rates,
            harvest_systems: systems,
            mobilisation,
            distances,
            locks: definition.locked_assignments.clone(),
            weights,
            roads: definition.road_construction.clone(),
            geo: definition.geo.clone(),
            schema_version: definition.schema_version.unwrap_or(1),
        };

        Self::check_locks(&scenario, &mut violations);

        if violations.is_empty() {
            Ok(scenario)
        } else {
            Err(ScenarioError::new(violations))
        }
    }

    fn build_timeline(
        definition: &ScenarioDefinition,
        horizon: u32,
        violations: &mut Vec<Violation>,
    ) -> TimelineConfig {
        let timeline = match &definition.timeline {
            None => TimelineConfig::default(),
            Some(section) => {
                let shifts = if !section.shifts.is_empty() {
                    section
                        .shifts
                        .iter()
                        .enumerate()
                        .map(|(row, shift)| {
                            let hours = shift.hours.unwrap_or(8.0);
                            if hours <= 0.0 {
                                violations.push(Violation::new(
                                    "timeline",
                                    Some(row),
                                    "hours",
                                    ViolationRule::OutOfRange,
                                    format!("shift '{}' has non-positive hours", shift.id),
                                ));
                            }
                            ShiftDef::new(shift.id.clone(), hours)
                        })
                        .collect()
                } else if let Some(n) = section.shifts_per_day {
                    if n == 0 {
                        violations.push(Violation::new(
                            "timeline",
                            None,
                            "shifts_per_day",
                            ViolationRule::OutOfRange,
                            "shifts_per_day must be at least 1",
                        ));
                    }
                    (1..=n.max(1))
                        .map(|i| ShiftDef::new(format!("s{}", i), 8.0))
                        .collect()
                } else {
                    TimelineConfig::default().shifts
                };

                TimelineConfig {
                    shifts,
                    blackouts: section
                        .blackouts
                        .iter()
                        .map(|b| BlackoutWindow {
                            start_day: b.start_day,
                            end_day: b.end_day,
                            machine_ids: b.machine_ids.clone(),
                        })
                        .collect(),
                }
            }
        };

        // Duplicate shift ids break the shift-calendar lookup
        let mut seen = HashSet::new();
        for shift in &timeline.shifts {
            if !seen.insert(shift.id.clone()) {
                violations.push(Violation::new(
                    "timeline",
                    None,
                    "shifts",
                    ViolationRule::Duplicate,
                    format!("duplicate shift id '{}'", shift.id),
                ));
            }
        }

        for (row, blackout) in timeline.blackouts.iter().enumerate() {
            if blackout.start_day > blackout.end_day {
                violations.push(Violation::new(
                    "timeline",
                    Some(row),
                    "blackouts",
                    ViolationRule::Inconsistent,
                    format!(
                        "blackout start day {} is after end day {}",
                        blackout.start_day, blackout.end_day
                    ),
                ));
            }
            if blackout.start_day == 0 || (horizon > 0 && blackout.end_day > horizon) {
                violations.push(Violation::new(
                    "timeline",
                    Some(row),
                    "blackouts",
                    ViolationRule::OutOfRange,
                    format!(
                        "blackout window [{}, {}] lies outside the horizon",
                        blackout.start_day, blackout.end_day
                    ),
                ));
            }
        }

        timeline
    }

    fn build_landings(
        definition: &ScenarioDefinition,
        violations: &mut Vec<Violation>,
    ) -> Vec<Landing> {
        let mut seen = HashSet::new();
        definition
            .landings
            .iter()
            .enumerate()
            .map(|(row, raw)| {
                if !seen.insert(raw.id.clone()) {
                    violations.push(Violation::new(
                        "landings",
                        Some(row),
                        "id",
                        ViolationRule::Duplicate,
                        format!("duplicate landing id '{}'", raw.id),
                    ));
                }
                Landing {
                    id: raw.id.clone(),
                    daily_capacity: raw.daily_capacity.unwrap_or(DEFAULT_LANDING_CAPACITY),
                }
            })
            .collect()
    }

    fn build_harvest_systems(
        definition: &ScenarioDefinition,
        violations: &mut Vec<Violation>,
    ) -> BTreeMap<String, HarvestSystem> {
        if definition.harvest_systems.is_empty() {
            return default_harvest_systems();
        }

        let mut registry = BTreeMap::new();
        for (row, section) in definition.harvest_systems.iter().enumerate() {
            if registry.contains_key(&section.id) {
                violations.push(Violation::new(
                    "harvest_systems",
                    Some(row),
                    "id",
                    ViolationRule::Duplicate,
                    format!("duplicate harvest system id '{}'", section.id),
                ));
                continue;
            }

            let mut jobs = Vec::new();
            let names: HashSet<&str> = section.jobs.iter().map(|j| j.name.as_str()).collect();
            if names.len() != section.jobs.len() {
                violations.push(Violation::new(
                    "harvest_systems",
                    Some(row),
                    "jobs",
                    ViolationRule::Duplicate,
                    format!("system '{}' repeats a job name", section.id),
                ));
            }
            for job in &section.jobs {
                let role = match MachineRole::parse(&job.role) {
                    Some(role) => role,
                    None => {
                        violations.push(Violation::new(
                            "harvest_systems",
                            Some(row),
                            "role",
                            ViolationRule::MissingField,
                            format!("job '{}' of system '{}' has no role", job.name, section.id),
                        ));
                        continue;
                    }
                };
                for prereq in &job.prerequisites {
                    if !names.contains(prereq.as_str()) {
                        violations.push(Violation::new(
                            "harvest_systems",
                            Some(row),
                            "prerequisites",
                            ViolationRule::InvalidReference,
                            format!(
                                "job '{}' of system '{}' requires unknown job '{}'",
                                job.name, section.id, prereq
                            ),
                        ));
                    }
                }
                jobs.push(HarvestJob::new(
                    job.name.clone(),
                    role,
                    job.prerequisites.clone(),
                ));
            }

            let system = HarvestSystem::new(section.id.clone(), jobs);
            if !Self::is_dag(&system) {
                violations.push(Violation::new(
                    "harvest_systems",
                    Some(row),
                    "jobs",
                    ViolationRule::NotADag,
                    format!("system '{}' has a cyclic job graph", section.id),
                ));
            }
            registry.insert(system.id.clone(), system);
        }
        registry
    }

    /// Checks a system's job graph for cycles via topological sort
    fn is_dag(system: &HarvestSystem) -> bool {
        let mut graph: DiGraph<&str, ()> = DiGraph::new();
        let mut indices = HashMap::new();
        for job in &system.jobs {
            let idx = graph.add_node(job.name.as_str());
            indices.insert(job.name.as_str(), idx);
        }
        for job in &system.jobs {
            for prereq in &job.prerequisites {
                if let (Some(&from), Some(&to)) = (
                    indices.get(prereq.as_str()),
                    indices.get(job.name.as_str()),
                ) {
                    graph.add_edge(from, to, ());
                }
            }
        }
        toposort(&graph, None).is_ok()
    }

    fn build_machines(
        definition: &ScenarioDefinition,
        timeline: &TimelineConfig,
        systems: &BTreeMap<String, HarvestSystem>,
        costing: &dyn CostingProvider,
        violations: &mut Vec<Violation>,
    ) -> Vec<Machine> {
        let mut seen = HashSet::new();
        definition
            .machines
            .iter()
            .enumerate()
            .map(|(row, raw)| {
                if !seen.insert(raw.id.clone()) {
                    violations.push(Violation::new(
                        "machines",
                        Some(row),
                        "id",
                        ViolationRule::Duplicate,
                        format!("duplicate machine id '{}'", raw.id),
                    ));
                }

                let role = raw.role.as_deref().and_then(MachineRole::parse);
                if let Some(role) = &role {
                    let known = role.is_registered()
                        || systems.values().any(|s| s.requires_role(role));
                    if !known {
                        violations.push(Violation::new(
                            "machines",
                            Some(row),
                            "role",
                            ViolationRule::InvalidReference,
                            format!(
                                "role '{}' is neither a registered slug nor required by any harvest system",
                                role
                            ),
                        ));
                    }
                }

                let daily_hours = match raw.daily_hours {
                    Some(h) if h < 0.0 => {
                        violations.push(Violation::new(
                            "machines",
                            Some(row),
                            "daily_hours",
                            ViolationRule::OutOfRange,
                            format!("machine '{}' has negative daily hours", raw.id),
                        ));
                        timeline.day_hours()
                    }
                    Some(h) if h > 0.0 => h,
                    _ => timeline.day_hours(),
                };

                let operating_cost = match raw.operating_cost_per_hour {
                    Some(c) if c < 0.0 => {
                        violations.push(Violation::new(
                            "machines",
                            Some(row),
                            "operating_cost_per_hour",
                            ViolationRule::OutOfRange,
                            format!("machine '{}' has negative operating cost", raw.id),
                        ));
                        0.0
                    }
                    Some(c) if c > 0.0 => c,
                    // Zero or absent: fall back to the role-rate table
                    _ => role
                        .as_ref()
                        .and_then(|r| costing.operating_cost(r))
                        .unwrap_or(0.0),
                };

                Machine {
                    id: raw.id.clone(),
                    role,
                    crew: raw.crew.clone().filter(|c| !c.trim().is_empty()),
                    daily_hours,
                    operating_cost_per_hour: operating_cost,
                    repair_usage: raw.repair_usage.clone().filter(|r| !r.trim().is_empty()),
                }
            })
            .collect()
    }

    fn build_blocks(
        definition: &ScenarioDefinition,
        horizon: u32,
        landings: &[Landing],
        systems: &BTreeMap<String, HarvestSystem>,
        violations: &mut Vec<Violation>,
    ) -> Vec<Block> {
        let landing_ids: HashSet<&str> = landings.iter().map(|l| l.id.as_str()).collect();
        let mut seen = HashSet::new();

        definition
            .blocks
            .iter()
            .enumerate()
            .map(|(row, raw)| {
                if !seen.insert(raw.id.clone()) {
                    violations.push(Violation::new(
                        "blocks",
                        Some(row),
                        "id",
                        ViolationRule::Duplicate,
                        format!("duplicate block id '{}'", raw.id),
                    ));
                }
                if !landing_ids.contains(raw.landing_id.as_str()) {
                    violations.push(Violation::new(
                        "blocks",
                        Some(row),
                        "landing_id",
                        ViolationRule::InvalidReference,
                        format!(
                            "block '{}' references unknown landing '{}'",
                            raw.id, raw.landing_id
                        ),
                    ));
                }

                let work_required = match raw.work_required {
                    Some(w) if w >= 0.0 => w,
                    Some(_) => {
                        violations.push(Violation::new(
                            "blocks",
                            Some(row),
                            "work_required",
                            ViolationRule::OutOfRange,
                            format!("block '{}' has negative work_required", raw.id),
                        ));
                        0.0
                    }
                    None => {
                        violations.push(Violation::new(
                            "blocks",
                            Some(row),
                            "work_required",
                            ViolationRule::MissingField,
                            format!("block '{}' is missing work_required", raw.id),
                        ));
                        0.0
                    }
                };

                let earliest = raw.earliest_start.unwrap_or(1);
                let latest = raw.latest_finish.unwrap_or(horizon);
                if earliest == 0 || earliest > latest || (horizon > 0 && latest > horizon) {
                    violations.push(Violation::new(
                        "blocks",
                        Some(row),
                        "earliest_start",
                        ViolationRule::OutOfRange,
                        format!(
                            "block '{}' window [{}, {}] violates 1 <= start <= finish <= {}",
                            raw.id, earliest, latest, horizon
                        ),
                    ));
                }

                if let Some(system_id) = &raw.harvest_system_id {
                    if !system_id.trim().is_empty() && !systems.contains_key(system_id) {
                        violations.push(Violation::new(
                            "blocks",
                            Some(row),
                            "harvest_system_id",
                            ViolationRule::InvalidReference,
                            format!(
                                "block '{}' references unknown harvest system '{}'",
                                raw.id, system_id
                            ),
                        ));
                    }
                }

                Block {
                    id: raw.id.clone(),
                    landing_id: raw.landing_id.clone(),
                    work_required,
                    earliest_start: earliest,
                    latest_finish: latest,
                    harvest_system_id: raw
                        .harvest_system_id
                        .clone()
                        .filter(|s| !s.trim().is_empty()),
                    salvage_mode: raw.salvage_mode.clone().filter(|s| !s.trim().is_empty()),
                    stand_attributes: raw.stand_attributes.clone(),
                }
            })
            .collect()
    }

    fn build_calendar(
        definition: &ScenarioDefinition,
        horizon: u32,
        machines: &[Machine],
        violations: &mut Vec<Violation>,
    ) -> Vec<CalendarEntry> {
        let machine_ids: HashSet<&str> = machines.iter().map(|m| m.id.as_str()).collect();
        definition
            .calendar
            .iter()
            .enumerate()
            .map(|(row, raw)| {
                if !machine_ids.contains(raw.machine_id.as_str()) {
                    violations.push(Violation::new(
                        "calendar",
                        Some(row),
                        "machine_id",
                        ViolationRule::InvalidReference,
                        format!("calendar references unknown machine '{}'", raw.machine_id),
                    ));
                }
                let day = raw.day.unwrap_or(0);
                if day == 0 || (horizon > 0 && day > horizon) {
                    violations.push(Violation::new(
                        "calendar",
                        Some(row),
                        "day",
                        ViolationRule::OutOfRange,
                        format!("calendar day {} outside [1, {}]", day, horizon),
                    ));
                }
                let available = Self::parse_flag("calendar", row, raw.available, violations);
                CalendarEntry {
                    machine_id: raw.machine_id.clone(),
                    day,
                    available,
                }
            })
            .collect()
    }

    fn build_shift_calendar(
        definition: &ScenarioDefinition,
        horizon: u32,
        machines: &[Machine],
        timeline: &TimelineConfig,
        violations: &mut Vec<Violation>,
    ) -> Vec<ShiftCalendarEntry> {
        let machine_ids: HashSet<&str> = machines.iter().map(|m| m.id.as_str()).collect();
        definition
            .shift_calendar
            .iter()
            .enumerate()
            .map(|(row, raw)| {
                if !machine_ids.contains(raw.machine_id.as_str()) {
                    violations.push(Violation::new(
                        "shift_calendar",
                        Some(row),
                        "machine_id",
                        ViolationRule::InvalidReference,
                        format!(
                            "shift calendar references unknown machine '{}'",
                            raw.machine_id
                        ),
                    ));
                }
                let day = raw.day.unwrap_or(0);
                if day == 0 || (horizon > 0 && day > horizon) {
                    violations.push(Violation::new(
                        "shift_calendar",
                        Some(row),
                        "day",
                        ViolationRule::OutOfRange,
                        format!("shift calendar day {} outside [1, {}]", day, horizon),
                    ));
                }
                if timeline.shift_index(&raw.shift_id).is_none() {
                    violations.push(Violation::new(
                        "shift_calendar",
                        Some(row),
                        "shift_id",
                        ViolationRule::UnknownShift,
                        format!("shift '{}' is not declared in the timeline", raw.shift_id),
                    ));
                }
                let available = Self::parse_flag("shift_calendar", row, raw.available, violations);
                ShiftCalendarEntry {
                    machine_id: raw.machine_id.clone(),
                    day,
                    shift_id: raw.shift_id.clone(),
                    available,
                }
            })
            .collect()
    }

    fn parse_flag(
        table: &str,
        row: usize,
        raw: Option<u8>,
        violations: &mut Vec<Violation>,
    ) -> bool {
        match raw {
            Some(0) => false,
            Some(1) | None => true,
            Some(other) => {
                violations.push(Violation::new(
                    table,
                    Some(row),
                    "available",
                    ViolationRule::OutOfRange,
                    format!("availability flag must be 0 or 1, got {}", other),
                ));
                true
            }
        }
    }

    fn build_rates(
        definition: &ScenarioDefinition,
        machines: &[Machine],
        blocks: &[Block],
        violations: &mut Vec<Violation>,
    ) -> Vec<ProductionRate> {
        let machine_ids: HashSet<&str> = machines.iter().map(|m| m.id.as_str()).collect();
        let block_ids: HashSet<&str> = blocks.iter().map(|b| b.id.as_str()).collect();
        definition
            .production_rates
            .iter()
            .enumerate()
            .map(|(row, raw)| {
                if !machine_ids.contains(raw.machine_id.as_str()) {
                    violations.push(Violation::new(
                        "production_rates",
                        Some(row),
                        "machine_id",
                        ViolationRule::InvalidReference,
                        format!("rate references unknown machine '{}'", raw.machine_id),
                    ));
                }
                if !block_ids.contains(raw.block_id.as_str()) {
                    violations.push(Violation::new(
                        "production_rates",
                        Some(row),
                        "block_id",
                        ViolationRule::InvalidReference,
                        format!("rate references unknown block '{}'", raw.block_id),
                    ));
                }
                let rate = match raw.rate {
                    Some(r) if r >= 0.0 => r,
                    Some(_) => {
                        violations.push(Violation::new(
                            "production_rates",
                            Some(row),
                            "rate",
                            ViolationRule::OutOfRange,
                            format!(
                                "rate for ('{}', '{}') is negative",
                                raw.machine_id, raw.block_id
                            ),
                        ));
                        0.0
                    }
                    None => {
                        violations.push(Violation::new(
                            "production_rates",
                            Some(row),
                            "rate",
                            ViolationRule::MissingField,
                            format!(
                                "rate for ('{}', '{}') is missing",
                                raw.machine_id, raw.block_id
                            ),
                        ));
                        0.0
                    }
                };
                ProductionRate {
                    machine_id: raw.machine_id.clone(),
                    block_id: raw.block_id.clone(),
                    rate,
                }
            })
            .collect()
    }

    fn build_mobilisation(
        section: &MobilisationSection,
        machines: &[Machine],
        violations: &mut Vec<Violation>,
    ) -> MobilisationConfig {
        let defaults = MobilisationParams::default();
        let base = MobilisationParams {
            walk_threshold_m: section.walk_threshold_m.unwrap_or(defaults.walk_threshold_m),
            walk_cost: section.walk_cost.unwrap_or(defaults.walk_cost),
            setup_cost: section.setup_cost.unwrap_or(defaults.setup_cost),
            move_cost_per_km: section.move_cost_per_km.unwrap_or(defaults.move_cost_per_km),
            unknown_cost: section.unknown_cost.unwrap_or(defaults.unknown_cost),
        };

        for value in [
            base.walk_threshold_m,
            base.walk_cost,
            base.setup_cost,
            base.move_cost_per_km,
            base.unknown_cost,
        ] {
            if value < 0.0 {
                violations.push(Violation::new(
                    "mobilisation",
                    None,
                    "params",
                    ViolationRule::OutOfRange,
                    "mobilisation parameters must be non-negative",
                ));
                break;
            }
        }

        let machine_ids: HashSet<&str> = machines.iter().map(|m| m.id.as_str()).collect();
        let mut per_machine = BTreeMap::new();
        for (machine_id, over) in &section.per_machine {
            if !machine_ids.contains(machine_id.as_str()) {
                violations.push(Violation::new(
                    "mobilisation",
                    None,
                    "per_machine",
                    ViolationRule::InvalidReference,
                    format!("override references unknown machine '{}'", machine_id),
                ));
            }
            per_machine.insert(
                machine_id.clone(),
                MobilisationParams {
                    walk_threshold_m: over.walk_threshold_m.unwrap_or(base.walk_threshold_m),
                    walk_cost: over.walk_cost.unwrap_or(base.walk_cost),
                    setup_cost: over.setup_cost.unwrap_or(base.setup_cost),
                    move_cost_per_km: over.move_cost_per_km.unwrap_or(base.move_cost_per_km),
                    unknown_cost: over.unknown_cost.unwrap_or(base.unknown_cost),
                },
            );
        }

        MobilisationConfig {
            default_params: base,
            per_machine,
        }
    }

    fn check_distances(
        definition: &ScenarioDefinition,
        blocks: &[Block],
        violations: &mut Vec<Violation>,
    ) -> Option<crate::domain::entities::DistanceMatrix> {
        let mut matrix = definition.distances.clone()?;
        matrix.rebuild_index();

        let block_ids: HashSet<&str> = blocks.iter().map(|b| b.id.as_str()).collect();
        for id in matrix.block_ids() {
            if !block_ids.contains(id.as_str()) {
                violations.push(Violation::new(
                    "distances",
                    None,
                    "block_id",
                    ViolationRule::InvalidReference,
                    format!("distance matrix references unknown block '{}'", id),
                ));
            }
        }

        let ids: Vec<String> = matrix.block_ids().to_vec();
        for a in &ids {
            if matrix.get(a, a) != Some(0.0) {
                violations.push(Violation::new(
                    "distances",
                    None,
                    a.clone(),
                    ViolationRule::OutOfRange,
                    format!("distance matrix diagonal for '{}' must be zero", a),
                ));
            }
            for b in &ids {
                match matrix.get(a, b) {
                    Some(d) if d < 0.0 => {
                        violations.push(Violation::new(
                            "distances",
                            None,
                            a.clone(),
                            ViolationRule::OutOfRange,
                            format!("negative distance between '{}' and '{}'", a, b),
                        ));
                    }
                    d if d != matrix.get(b, a) => {
                        violations.push(Violation::new(
                            "distances",
                            None,
                            a.clone(),
                            ViolationRule::Inconsistent,
                            format!("distance between '{}' and '{}' is asymmetric", a, b),
                        ));
                    }
                    _ => {}
                }
            }
        }

        Some(matrix)
    }

    fn build_weights(
        definition: &ScenarioDefinition,
        violations: &mut Vec<Violation>,
    ) -> ObjectiveWeights {
        let defaults = ObjectiveWeights::default();
        let weights = match &definition.objective_weights {
            None => defaults,
            Some(section) => ObjectiveWeights {
                production: section.production.unwrap_or(defaults.production),
                mobilisation: section.mobilisation.unwrap_or(defaults.mobilisation),
                transitions: section.transitions.unwrap_or(defaults.transitions),
                landing_slack: section.landing_slack.unwrap_or(defaults.landing_slack),
                completion_bonus: section.completion_bonus.unwrap_or(defaults.completion_bonus),
                leftover_penalty: section.leftover_penalty,
            },
        };
        for (field, value) in [
            ("production", weights.production),
            ("mobilisation", weights.mobilisation),
            ("transitions", weights.transitions),
            ("landing_slack", weights.landing_slack),
            ("completion_bonus", weights.completion_bonus),
            ("leftover_penalty", weights.leftover_penalty()),
        ] {
            if value < 0.0 {
                violations.push(Violation::new(
                    "objective_weights",
                    None,
                    field,
                    ViolationRule::OutOfRange,
                    format!("objective weight '{}' must be non-negative", field),
                ));
            }
        }
        weights
    }

    /// Lock consistency: ids resolve, the machine is eligible and available,
    /// the day sits in the block's window, no two locks collide on one
    /// (machine, day, shift), and the landing still admits the lock.
    fn check_locks(scenario: &Scenario, violations: &mut Vec<Violation>) {
        let mut occupied: HashSet<(String, u32, usize)> = HashSet::new();
        let mut landing_day_machines: HashMap<(String, u32), HashSet<String>> = HashMap::new();

        for (row, lock) in scenario.locks.iter().enumerate() {
            let machine = scenario.machine(&lock.machine_id);
            let block = scenario.block(&lock.block_id);
            if machine.is_none() {
                violations.push(Violation::new(
                    "locked_assignments",
                    Some(row),
                    "machine_id",
                    ViolationRule::InvalidReference,
                    format!("lock references unknown machine '{}'", lock.machine_id),
                ));
            }
            if block.is_none() {
                violations.push(Violation::new(
                    "locked_assignments",
                    Some(row),
                    "block_id",
                    ViolationRule::InvalidReference,
                    format!("lock references unknown block '{}'", lock.block_id),
                ));
            }
            let (machine, block) = match (machine, block) {
                (Some(m), Some(b)) => (m, b),
                _ => continue,
            };

            if lock.day == 0 || lock.day > scenario.horizon_days {
                violations.push(Violation::new(
                    "locked_assignments",
                    Some(row),
                    "day",
                    ViolationRule::OutOfRange,
                    format!("lock day {} outside [1, {}]", lock.day, scenario.horizon_days),
                ));
                continue;
            }
            if !block.window_contains(lock.day) {
                violations.push(Violation::new(
                    "locked_assignments",
                    Some(row),
                    "day",
                    ViolationRule::LockConflict,
                    format!(
                        "lock day {} outside block '{}' window [{}, {}]",
                        lock.day, block.id, block.earliest_start, block.latest_finish
                    ),
                ));
            }

            if !Self::lock_machine_eligible(scenario, machine, block) {
                violations.push(Violation::new(
                    "locked_assignments",
                    Some(row),
                    "machine_id",
                    ViolationRule::LockConflict,
                    format!(
                        "machine '{}' is not eligible for block '{}'",
                        machine.id, block.id
                    ),
                ));
            }

            let shift_index = match &lock.shift_id {
                Some(shift_id) => match scenario.timeline.shift_index(shift_id) {
                    Some(s) => {
                        if !Self::slot_available(scenario, &machine.id, lock.day, s) {
                            violations.push(Violation::new(
                                "locked_assignments",
                                Some(row),
                                "shift_id",
                                ViolationRule::LockConflict,
                                format!(
                                    "machine '{}' is unavailable on day {} shift '{}'",
                                    machine.id, lock.day, shift_id
                                ),
                            ));
                        }
                        Some(s)
                    }
                    None => {
                        violations.push(Violation::new(
                            "locked_assignments",
                            Some(row),
                            "shift_id",
                            ViolationRule::UnknownShift,
                            format!("shift '{}' is not declared in the timeline", shift_id),
                        ));
                        None
                    }
                },
                // Shiftless locks resolve to the first available shift
                None => {
                    let resolved = (0..scenario.timeline.shifts_per_day())
                        .find(|&s| Self::slot_available(scenario, &machine.id, lock.day, s));
                    if resolved.is_none() {
                        violations.push(Violation::new(
                            "locked_assignments",
                            Some(row),
                            "day",
                            ViolationRule::LockConflict,
                            format!(
                                "machine '{}' has no available shift on day {}",
                                machine.id, lock.day
                            ),
                        ));
                    }
                    resolved
                }
            };

            if let Some(s) = shift_index {
                if !occupied.insert((machine.id.clone(), lock.day, s)) {
                    violations.push(Violation::new(
                        "locked_assignments",
                        Some(row),
                        "shift_id",
                        ViolationRule::LockConflict,
                        format!(
                            "two locks collide on machine '{}' day {} shift index {}",
                            machine.id, lock.day, s
                        ),
                    ));
                }
            }

            landing_day_machines
                .entry((block.landing_id.clone(), lock.day))
                .or_default()
                .insert(machine.id.clone());
        }

        // Locked machines alone must not exceed a landing's daily capacity
        for ((landing_id, day), machines) in &landing_day_machines {
            if let Some(landing) = scenario.landing(landing_id) {
                if machines.len() as u32 > landing.daily_capacity {
                    violations.push(Violation::new(
                        "locked_assignments",
                        None,
                        "block_id",
                        ViolationRule::LockConflict,
                        format!(
                            "locks place {} machines at landing '{}' on day {}, capacity {}",
                            machines.len(),
                            landing_id,
                            day,
                            landing.daily_capacity
                        ),
                    ));
                }
            }
        }
    }

    /// Eligibility as the problem view defines it: the block's harvest
    /// system (if any) requires the machine's role, and a positive rate
    /// exists for the pairing.
    fn lock_machine_eligible(scenario: &Scenario, machine: &Machine, block: &Block) -> bool {
        if let Some(system_id) = &block.harvest_system_id {
            let required = scenario
                .harvest_systems
                .get(system_id)
                .map(|system| {
                    machine
                        .role
                        .as_ref()
                        .map(|role| system.requires_role(role))
                        .unwrap_or(false)
                })
                .unwrap_or(false);
            if !required {
                return false;
            }
        }
        scenario
            .rates
            .iter()
            .any(|r| r.machine_id == machine.id && r.block_id == block.id && r.rate > 0.0)
    }

    /// Availability of one (machine, day, shift): shift calendar wins over
    /// the day calendar, blackouts win over both.
    fn slot_available(scenario: &Scenario, machine_id: &str, day: u32, shift: usize) -> bool {
        if scenario
            .timeline
            .blackouts
            .iter()
            .any(|b| b.covers(machine_id, day))
        {
            return false;
        }
        let shift_id = &scenario.timeline.shifts[shift].id;
        if let Some(entry) = scenario
            .shift_calendar
            .iter()
            .find(|e| e.machine_id == machine_id && e.day == day && &e.shift_id == shift_id)
        {
            return entry.available;
        }
        scenario
            .calendar
            .iter()
            .find(|e| e.machine_id == machine_id && e.day == day)
            .map(|e| e.available)
            .unwrap_or(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::value_objects::DefaultCosting;

    fn minimal_definition() -> ScenarioDefinition {
        ScenarioDefinition {
            horizon_days: 7,
            landings: vec![LandingRow {
                id: "L1".to_string(),
                daily_capacity: Some(2),
            }],
            machines: vec![MachineRow {
                id: "M1".to_string(),
                role: Some("Feller-Buncher".to_string()),
                ..Default::default()
            }],
            blocks: vec![BlockRow {
                id: "B1".to_string(),
                landing_id: "L1".to_string(),
                work_required: Some(10.0),
                ..Default::default()
            }],
            production_rates: vec![RateRow {
                machine_id: "M1".to_string(),
                block_id: "B1".to_string(),
                rate: Some(5.0),
            }],
            ..Default::default()
        }
    }

    #[test]
    fn test_minimal_scenario_validates() {
        let scenario =
            ScenarioValidator::validate(&minimal_definition(), &DefaultCosting).unwrap();
        assert_eq!(scenario.horizon_days, 7);
        assert_eq!(scenario.blocks[0].latest_finish, 7);
        assert_eq!(scenario.timeline.shifts_per_day(), 1);
        // Role was canonicalised and operating cost defaulted from the table
        assert_eq!(scenario.machines[0].role.as_ref().unwrap().as_str(), "feller_buncher");
        assert!(scenario.machines[0].operating_cost_per_hour > 0.0);
    }

    #[test]
    fn test_unknown_landing_is_invalid_reference() {
        let mut definition = minimal_definition();
        definition.blocks[0].landing_id = "L9".to_string();
        let err = ScenarioValidator::validate(&definition, &DefaultCosting).unwrap_err();
        assert!(err
            .violations
            .iter()
            .any(|v| v.rule == ViolationRule::InvalidReference && v.table == "blocks"));
    }

    #[test]
    fn test_validator_accumulates_all_violations() {
        let mut definition = minimal_definition();
        definition.blocks[0].landing_id = "L9".to_string();
        definition.blocks[0].earliest_start = Some(9);
        definition.blocks[0].latest_finish = Some(3);
        definition.production_rates[0].rate = Some(-1.0);
        let err = ScenarioValidator::validate(&definition, &DefaultCosting).unwrap_err();
        assert!(err.violations.len() >= 3);
    }

    #[test]
    fn test_cyclic_harvest_system_rejected() {
        let mut definition = minimal_definition();
        definition.harvest_systems = vec![HarvestSystemSection {
            id: "loop".to_string(),
            jobs: vec![
                HarvestJobSection {
                    name: "a".to_string(),
                    role: "feller_buncher".to_string(),
                    prerequisites: vec!["b".to_string()],
                },
                HarvestJobSection {
                    name: "b".to_string(),
                    role: "processor".to_string(),
                    prerequisites: vec!["a".to_string()],
                },
            ],
        }];
        let err = ScenarioValidator::validate(&definition, &DefaultCosting).unwrap_err();
        assert!(err
            .violations
            .iter()
            .any(|v| v.rule == ViolationRule::NotADag));
    }

    #[test]
    fn test_lock_on_unavailable_day_is_conflict() {
        let mut definition = minimal_definition();
        definition.calendar = vec![CalendarRow {
            machine_id: "M1".to_string(),
            day: Some(3),
            available: Some(0),
        }];
        definition.locked_assignments = vec![ScheduleLock::new("M1", "B1", 3, None)];
        let err = ScenarioValidator::validate(&definition, &DefaultCosting).unwrap_err();
        assert!(err.has_lock_conflict());
    }

    #[test]
    fn test_colliding_locks_rejected() {
        let mut definition = minimal_definition();
        definition.blocks.push(BlockRow {
            id: "B2".to_string(),
            landing_id: "L1".to_string(),
            work_required: Some(4.0),
            ..Default::default()
        });
        definition.production_rates.push(RateRow {
            machine_id: "M1".to_string(),
            block_id: "B2".to_string(),
            rate: Some(2.0),
        });
        definition.locked_assignments = vec![
            ScheduleLock::new("M1", "B1", 2, None),
            ScheduleLock::new("M1", "B2", 2, None),
        ];
        let err = ScenarioValidator::validate(&definition, &DefaultCosting).unwrap_err();
        assert!(err.has_lock_conflict());
    }

    #[test]
    fn test_ineligible_lock_rejected() {
        let mut definition = minimal_definition();
        // No rate for the pairing means the machine is not eligible
        definition.production_rates.clear();
        definition.locked_assignments = vec![ScheduleLock::new("M1", "B1", 2, None)];
        let err = ScenarioValidator::validate(&definition, &DefaultCosting).unwrap_err();
        assert!(err.has_lock_conflict());
    }

    #[test]
    fn test_crew_assignment_overrides_table() {
        let mut definition = minimal_definition();
        definition
            .crew_assignments
            .insert("M1".to_string(), "night_crew".to_string());
        let scenario = ScenarioValidator::validate(&definition, &DefaultCosting).unwrap();
        assert_eq!(scenario.machines[0].crew.as_deref(), Some("night_crew"));

        definition
            .crew_assignments
            .insert("M9".to_string(), "ghost_crew".to_string());
        let err = ScenarioValidator::validate(&definition, &DefaultCosting).unwrap_err();
        assert!(err
            .violations
            .iter()
            .any(|v| v.table == "crew_assignments"));
    }

    #[test]
    fn test_shift_calendar_unknown_shift() {
        let mut definition = minimal_definition();
        definition.shift_calendar = vec![ShiftCalendarRow {
            machine_id: "M1".to_string(),
            day: Some(1),
            shift_id: "night".to_string(),
            available: Some(0),
        }];
        let err = ScenarioValidator::validate(&definition, &DefaultCosting).unwrap_err();
        assert!(err
            .violations
            .iter()
            .any(|v| v.rule == ViolationRule::UnknownShift));
    }
}
