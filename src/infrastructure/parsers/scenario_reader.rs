//! Scenario document reader
//!
//! Reads the YAML/JSON scenario document naming the CSV tables (blocks,
//! machines, landings, calendar, production rates, optional shift calendar
//! and road table) plus the inline sections, and assembles the raw
//! [`ScenarioDefinition`] handed to the validator. Numeric cells are
//! coerced; blank or NaN optionals become unset rather than fabricated
//! defaults.

use anyhow::{bail, Context, Result};
use csv::Reader;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs::File;
use std::path::{Path, PathBuf};

use crate::domain::entities::definition::*;
use crate::domain::entities::{RoadConstructionJob, ScheduleLock};
use crate::infrastructure::parsers::distance_matrix::DistanceMatrixParser;

/// Table file paths named by the scenario document
#[derive(Debug, Clone, Deserialize, Default)]
struct TablePaths {
    blocks: Option<String>,
    machines: Option<String>,
    landings: Option<String>,
    calendar: Option<String>,
    production_rates: Option<String>,
    shift_calendar: Option<String>,
    road_construction: Option<String>,
    distance_matrix: Option<String>,
}

/// The scenario document as it appears on disk
#[derive(Debug, Clone, Deserialize)]
struct ScenarioDoc {
    horizon_days: u32,
    #[serde(default)]
    schema_version: Option<u32>,
    #[serde(default)]
    tables: TablePaths,
    #[serde(default)]
    timeline: Option<TimelineSection>,
    #[serde(default)]
    mobilisation: Option<MobilisationSection>,
    #[serde(default)]
    harvest_systems: Vec<HarvestSystemSection>,
    #[serde(default)]
    locked_assignments: Vec<ScheduleLock>,
    #[serde(default)]
    objective_weights: Option<ObjectiveWeightsSection>,
    #[serde(default)]
    crew_assignments: BTreeMap<String, String>,
    #[serde(default)]
    geo: BTreeMap<String, String>,
}

/// All-string block row; extra columns pass through as stand attributes
#[derive(Debug, Deserialize)]
struct BlockCsvRow {
    id: String,
    landing_id: String,
    #[serde(default)]
    work_required: String,
    #[serde(default)]
    earliest_start: String,
    #[serde(default)]
    latest_finish: String,
    #[serde(default)]
    harvest_system_id: String,
    #[serde(default)]
    salvage_mode: String,
    #[serde(flatten)]
    stand_attributes: BTreeMap<String, String>,
}

#[derive(Debug, Deserialize)]
struct MachineCsvRow {
    id: String,
    #[serde(default)]
    role: Option<String>,
    #[serde(default)]
    crew: Option<String>,
    #[serde(default)]
    daily_hours: Option<f64>,
    #[serde(default)]
    operating_cost_per_hour: Option<f64>,
    #[serde(default)]
    repair_usage: Option<String>,
}

#[derive(Debug, Deserialize)]
struct LandingCsvRow {
    id: String,
    #[serde(default)]
    daily_capacity: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct CalendarCsvRow {
    machine_id: String,
    #[serde(default)]
    day: Option<u32>,
    #[serde(default)]
    available: Option<u8>,
}

#[derive(Debug, Deserialize)]
struct ShiftCalendarCsvRow {
    machine_id: String,
    #[serde(default)]
    day: Option<u32>,
    shift_id: String,
    #[serde(default)]
    available: Option<u8>,
}

#[derive(Debug, Deserialize)]
struct RateCsvRow {
    machine_id: String,
    block_id: String,
    #[serde(default)]
    rate: Option<f64>,
}

/// All-string road row; extra columns pass through as attributes
#[derive(Debug, Deserialize)]
struct RoadCsvRow {
    id: String,
    #[serde(default)]
    block_id: String,
    #[serde(flatten)]
    attributes: BTreeMap<String, String>,
}

/// Reader for scenario documents and their CSV tables
pub struct ScenarioReader;

impl ScenarioReader {
    /// Reads a scenario document (`.yaml`/`.yml` or `.json`) and every table
    /// it names; paths are resolved relative to the document
    pub fn read_definition<P: AsRef<Path>>(path: P) -> Result<ScenarioDefinition> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let doc: ScenarioDoc = match path.extension().and_then(|e| e.to_str()) {
            Some("json") => serde_json::from_str(&text)
                .with_context(|| format!("bad JSON scenario document {}", path.display()))?,
            Some("yaml") | Some("yml") => serde_yaml::from_str(&text)
                .with_context(|| format!("bad YAML scenario document {}", path.display()))?,
            other => bail!(
                "unsupported scenario document extension {:?} for {}",
                other,
                path.display()
            ),
        };
        let base_dir = path.parent().unwrap_or_else(|| Path::new("."));
        Self::assemble(doc, base_dir)
    }

    fn assemble(doc: ScenarioDoc, base_dir: &Path) -> Result<ScenarioDefinition> {
        let resolve = |name: &Option<String>| -> Option<PathBuf> {
            name.as_ref().map(|n| base_dir.join(n))
        };

        let blocks = match resolve(&doc.tables.blocks) {
            Some(path) => Self::read_blocks(&path)?,
            None => Vec::new(),
        };
        let machines = match resolve(&doc.tables.machines) {
            Some(path) => Self::read_machines(&path)?,
            None => Vec::new(),
        };
        let landings = match resolve(&doc.tables.landings) {
            Some(path) => Self::read_landings(&path)?,
            None => Vec::new(),
        };
        let calendar = match resolve(&doc.tables.calendar) {
            Some(path) => Self::read_calendar(&path)?,
            None => Vec::new(),
        };
        let shift_calendar = match resolve(&doc.tables.shift_calendar) {
            Some(path) => Self::read_shift_calendar(&path)?,
            None => Vec::new(),
        };
        let production_rates = match resolve(&doc.tables.production_rates) {
            Some(path) => Self::read_rates(&path)?,
            None => Vec::new(),
        };
        let road_construction = match resolve(&doc.tables.road_construction) {
            Some(path) => Self::read_roads(&path)?,
            None => Vec::new(),
        };
        let distances = match resolve(&doc.tables.distance_matrix) {
            Some(path) => Some(DistanceMatrixParser::parse_file(&path)?),
            None => None,
        };

        Ok(ScenarioDefinition {
            horizon_days: doc.horizon_days,
            schema_version: doc.schema_version,
            blocks,
            machines,
            landings,
            calendar,
            shift_calendar,
            production_rates,
            timeline: doc.timeline,
            harvest_systems: doc.harvest_systems,
            mobilisation: doc.mobilisation,
            distances,
            locked_assignments: doc.locked_assignments,
            objective_weights: doc.objective_weights,
            road_construction,
            crew_assignments: doc.crew_assignments,
            geo: doc.geo,
        })
    }

    fn open_csv(path: &Path) -> Result<Reader<File>> {
        let file =
            File::open(path).with_context(|| format!("failed to open {}", path.display()))?;
        Ok(Reader::from_reader(file))
    }

    fn read_blocks(path: &Path) -> Result<Vec<BlockRow>> {
        let mut rows = Vec::new();
        for (index, record) in Self::open_csv(path)?.deserialize::<BlockCsvRow>().enumerate() {
            let raw =
                record.with_context(|| format!("bad block row {} in {}", index, path.display()))?;
            rows.push(BlockRow {
                id: raw.id.trim().to_string(),
                landing_id: raw.landing_id.trim().to_string(),
                work_required: parse_optional_f64(&raw.work_required),
                earliest_start: parse_optional_u32(&raw.earliest_start),
                latest_finish: parse_optional_u32(&raw.latest_finish),
                harvest_system_id: non_blank(&raw.harvest_system_id),
                salvage_mode: non_blank(&raw.salvage_mode),
                stand_attributes: raw.stand_attributes,
            });
        }
        Ok(rows)
    }

    fn read_machines(path: &Path) -> Result<Vec<MachineRow>> {
        let mut rows = Vec::new();
        for (index, record) in Self::open_csv(path)?
            .deserialize::<MachineCsvRow>()
            .enumerate()
        {
            let raw = record
                .with_context(|| format!("bad machine row {} in {}", index, path.display()))?;
            rows.push(MachineRow {
                id: raw.id.trim().to_string(),
                role: raw.role.filter(|r| !r.trim().is_empty()),
                crew: raw.crew.filter(|c| !c.trim().is_empty()),
                daily_hours: sanitize_f64(raw.daily_hours),
                operating_cost_per_hour: sanitize_f64(raw.operating_cost_per_hour),
                repair_usage: raw.repair_usage.filter(|r| !r.trim().is_empty()),
            });
        }
        Ok(rows)
    }

    fn read_landings(path: &Path) -> Result<Vec<LandingRow>> {
        let mut rows = Vec::new();
        for (index, record) in Self::open_csv(path)?
            .deserialize::<LandingCsvRow>()
            .enumerate()
        {
            let raw = record
                .with_context(|| format!("bad landing row {} in {}", index, path.display()))?;
            rows.push(LandingRow {
                id: raw.id.trim().to_string(),
                daily_capacity: raw.daily_capacity,
            });
        }
        Ok(rows)
    }

    fn read_calendar(path: &Path) -> Result<Vec<CalendarRow>> {
        let mut rows = Vec::new();
        for (index, record) in Self::open_csv(path)?
            .deserialize::<CalendarCsvRow>()
            .enumerate()
        {
            let raw = record
                .with_context(|| format!("bad calendar row {} in {}", index, path.display()))?;
            rows.push(CalendarRow {
                machine_id: raw.machine_id.trim().to_string(),
                day: raw.day,
                available: raw.available,
            });
        }
        Ok(rows)
    }

    fn read_shift_calendar(path: &Path) -> Result<Vec<ShiftCalendarRow>> {
        let mut rows = Vec::new();
        for (index, record) in Self::open_csv(path)?
            .deserialize::<ShiftCalendarCsvRow>()
            .enumerate()
        {
            let raw = record.with_context(|| {
                format!("bad shift calendar row {} in {}", index, path.display())
            })?;
            rows.push(ShiftCalendarRow {
                machine_id: raw.machine_id.trim().to_string(),
                day: raw.day,
                shift_id: raw.shift_id.trim().to_string(),
                available: raw.available,
            });
        }
        Ok(rows)
    }

    fn read_rates(path: &Path) -> Result<Vec<RateRow>> {
        let mut rows = Vec::new();
        for (index, record) in Self::open_csv(path)?.deserialize::<RateCsvRow>().enumerate() {
            let raw =
                record.with_context(|| format!("bad rate row {} in {}", index, path.display()))?;
            rows.push(RateRow {
                machine_id: raw.machine_id.trim().to_string(),
                block_id: raw.block_id.trim().to_string(),
                rate: sanitize_f64(raw.rate),
            });
        }
        Ok(rows)
    }

    fn read_roads(path: &Path) -> Result<Vec<RoadConstructionJob>> {
        let mut rows = Vec::new();
        for (index, record) in Self::open_csv(path)?.deserialize::<RoadCsvRow>().enumerate() {
            let raw =
                record.with_context(|| format!("bad road row {} in {}", index, path.display()))?;
            rows.push(RoadConstructionJob {
                id: raw.id.trim().to_string(),
                block_id: non_blank(&raw.block_id),
                attributes: raw.attributes,
            });
        }
        Ok(rows)
    }
}

/// Blank and NaN cells are unset, not zero
fn parse_optional_f64(raw: &str) -> Option<f64> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    trimmed.parse::<f64>().ok().filter(|v| !v.is_nan())
}

fn parse_optional_u32(raw: &str) -> Option<u32> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        None
    } else {
        trimmed.parse().ok()
    }
}

fn non_blank(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("nan") {
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn sanitize_f64(value: Option<f64>) -> Option<f64> {
    value.filter(|v| !v.is_nan())
}
