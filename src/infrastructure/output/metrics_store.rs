//! SQLite metrics mirror
//!
//! Optional relational mirror of the telemetry feed with a normalized
//! schema (`runs`, `run_metrics`, `run_kpis`, `tuner_summaries`). The JSONL
//! log stays canonical; this store exists for ad-hoc querying.

use anyhow::{Context, Result};
use rusqlite::{params, Connection};
use std::path::Path;

use crate::application::services::kpi::KpiBundle;
use crate::infrastructure::output::telemetry::{RunRecord, SummaryRecord};

/// SQLite mirror of run and summary telemetry
pub struct MetricsStore {
    conn: Connection,
}

impl MetricsStore {
    /// Opens (or creates) the store and its schema
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or the schema
    /// cannot be created.
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let conn = Connection::open(db_path).context("Failed to open metrics database")?;

        // WAL keeps concurrent readers cheap while one writer appends
        conn.execute_batch(
            r#"
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            "#,
        )?;

        let store = Self { conn };
        store.create_schema()?;
        Ok(store)
    }

    fn create_schema(&self) -> Result<()> {
        self.conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS runs (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                timestamp TEXT NOT NULL,
                source TEXT NOT NULL,
                scenario TEXT NOT NULL,
                solver TEXT NOT NULL,
                seed INTEGER NOT NULL,
                iterations INTEGER NOT NULL,
                objective REAL NOT NULL
            );
            CREATE TABLE IF NOT EXISTS run_metrics (
                run_id INTEGER NOT NULL REFERENCES runs(id),
                name TEXT NOT NULL,
                value REAL NOT NULL
            );
            CREATE TABLE IF NOT EXISTS run_kpis (
                run_id INTEGER NOT NULL REFERENCES runs(id),
                name TEXT NOT NULL,
                value REAL NOT NULL
            );
            CREATE TABLE IF NOT EXISTS tuner_summaries (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                timestamp TEXT NOT NULL,
                algorithm TEXT NOT NULL,
                scenario TEXT NOT NULL,
                best_objective REAL NOT NULL,
                runs INTEGER NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_runs_scenario ON runs(scenario);
            CREATE INDEX IF NOT EXISTS idx_run_kpis_run ON run_kpis(run_id);
            "#,
        )?;
        Ok(())
    }

    /// Mirrors one run record, returning the row id
    pub fn insert_run(&self, record: &RunRecord) -> Result<i64> {
        self.conn
            .execute(
                "INSERT INTO runs (timestamp, source, scenario, solver, seed, iterations, objective)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    record.timestamp,
                    record.source,
                    record.scenario,
                    record.solver,
                    record.seed as i64,
                    record.iterations as i64,
                    record.objective,
                ],
            )
            .context("Failed to insert run")?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Mirrors the headline KPIs of a bundle under a run
    pub fn insert_run_kpis(&self, run_id: i64, kpis: &KpiBundle) -> Result<()> {
        let rows: [(&str, f64); 7] = [
            ("total_production", kpis.total_production),
            ("completed_blocks", kpis.completed_blocks as f64),
            ("mobilisation_cost", kpis.mobilisation_cost),
            ("utilisation_ratio", kpis.utilisation_ratio),
            ("makespan", kpis.makespan as f64),
            (
                "sequencing_violation_count",
                kpis.sequencing_violation_count as f64,
            ),
            ("landing_surplus", kpis.landing_surplus),
        ];
        for (name, value) in rows {
            self.conn
                .execute(
                    "INSERT INTO run_kpis (run_id, name, value) VALUES (?1, ?2, ?3)",
                    params![run_id, name, value],
                )
                .context("Failed to insert run KPI")?;
        }
        Ok(())
    }

    /// Mirrors an arbitrary named metric under a run
    pub fn insert_run_metric(&self, run_id: i64, name: &str, value: f64) -> Result<()> {
        self.conn
            .execute(
                "INSERT INTO run_metrics (run_id, name, value) VALUES (?1, ?2, ?3)",
                params![run_id, name, value],
            )
            .context("Failed to insert run metric")?;
        Ok(())
    }

    /// Mirrors a sweep summary
    pub fn insert_summary(&self, record: &SummaryRecord) -> Result<i64> {
        self.conn
            .execute(
                "INSERT INTO tuner_summaries (timestamp, algorithm, scenario, best_objective, runs)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    record.timestamp,
                    record.algorithm,
                    record.scenario,
                    record.best_objective,
                    record.runs,
                ],
            )
            .context("Failed to insert summary")?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Count helper used by tests and health checks
    pub fn run_count(&self) -> Result<i64> {
        let count = self
            .conn
            .query_row("SELECT COUNT(*) FROM runs", [], |row| row.get(0))?;
        Ok(count)
    }
}
