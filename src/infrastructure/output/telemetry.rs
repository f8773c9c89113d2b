//! Telemetry JSONL feed
//!
//! Append-only log of newline-delimited JSON records, one writer thread per
//! file. Solvers submit records through a buffered channel; the owner
//! flushes after every record. Telemetry is best-effort: a write failure
//! logs a warning and never aborts a solve.

use std::fs::OpenOptions;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::thread::JoinHandle;

use anyhow::{Context, Result};
use chrono::Utc;
use crossbeam_channel::{unbounded, Sender};
use serde::Serialize;
use tracing::warn;

use crate::application::solvers::{OperatorStats, SearchObserver, StepEvent};

/// Schema version stamped into every record
pub const TELEMETRY_SCHEMA_VERSION: u32 = 1;

/// Run-level record appended once per solver run
#[derive(Debug, Clone, Serialize)]
pub struct RunRecord {
    pub schema_version: u32,
    pub timestamp: String,
    pub source: String,
    pub scenario: String,
    pub solver: String,
    pub seed: u64,
    pub iterations: u64,
    pub config: serde_json::Value,
    pub objective: f64,
    pub kpis: serde_json::Value,
    pub operators_config: serde_json::Value,
    pub operators_stats: serde_json::Value,
}

impl RunRecord {
    /// Assembles a run record with the current timestamp
    pub fn new(
        source: impl Into<String>,
        scenario: impl Into<String>,
        solver: impl Into<String>,
        seed: u64,
        iterations: u64,
        objective: f64,
    ) -> Self {
        Self {
            schema_version: TELEMETRY_SCHEMA_VERSION,
            timestamp: Utc::now().to_rfc3339(),
            source: source.into(),
            scenario: scenario.into(),
            solver: solver.into(),
            seed,
            iterations,
            config: serde_json::Value::Null,
            objective,
            kpis: serde_json::Value::Null,
            operators_config: serde_json::Value::Null,
            operators_stats: serde_json::Value::Null,
        }
    }

    pub fn with_operator_stats(mut self, stats: &[OperatorStats]) -> Self {
        self.operators_config = serde_json::to_value(
            stats
                .iter()
                .map(|s| (s.name, s.weight))
                .collect::<Vec<_>>(),
        )
        .unwrap_or(serde_json::Value::Null);
        self.operators_stats = serde_json::to_value(stats).unwrap_or(serde_json::Value::Null);
        self
    }

    pub fn with_kpis(mut self, kpis: &impl Serialize) -> Self {
        self.kpis = serde_json::to_value(kpis).unwrap_or(serde_json::Value::Null);
        self
    }

    pub fn with_config(mut self, config: &impl Serialize) -> Self {
        self.config = serde_json::to_value(config).unwrap_or(serde_json::Value::Null);
        self
    }
}

/// Per-iteration record streamed to a sibling file keyed by run id
#[derive(Debug, Clone, Serialize)]
pub struct StepRecord {
    pub schema_version: u32,
    pub run_id: String,
    pub iteration: u64,
    pub best: f64,
    pub current: f64,
    pub rolling_mean: f64,
    pub temperature: f64,
    pub delta_best: f64,
    pub acceptance_window: f64,
    pub operator: String,
}

/// Sweep-level aggregate record
#[derive(Debug, Clone, Serialize)]
pub struct SummaryRecord {
    pub schema_version: u32,
    pub timestamp: String,
    pub algorithm: String,
    pub scenario: String,
    pub best_objective: f64,
    pub runs: u32,
}

impl SummaryRecord {
    pub fn new(
        algorithm: impl Into<String>,
        scenario: impl Into<String>,
        best_objective: f64,
        runs: u32,
    ) -> Self {
        Self {
            schema_version: TELEMETRY_SCHEMA_VERSION,
            timestamp: Utc::now().to_rfc3339(),
            algorithm: algorithm.into(),
            scenario: scenario.into(),
            best_objective,
            runs,
        }
    }
}

/// Append-only JSONL log with a single owning writer thread
pub struct TelemetryLog {
    sender: Option<Sender<String>>,
    handle: Option<JoinHandle<()>>,
    path: PathBuf,
}

impl TelemetryLog {
    /// Opens (or creates) the log and spawns its writer thread
    ///
    /// # Arguments
    ///
    /// * `path` - Log file; records are appended, never rewritten
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("failed to open telemetry log {}", path.display()))?;

        let (sender, receiver) = unbounded::<String>();
        let thread_path = path.clone();
        let handle = std::thread::spawn(move || {
            let mut writer = BufWriter::new(file);
            for line in receiver {
                if writeln!(writer, "{}", line).and_then(|_| writer.flush()).is_err() {
                    warn!(path = %thread_path.display(), "telemetry write failed");
                }
            }
            let _ = writer.flush();
        });

        Ok(Self {
            sender: Some(sender),
            handle: Some(handle),
            path,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Appends one record; best-effort, never fails the caller
    pub fn append<T: Serialize>(&self, record: &T) {
        let line = match serde_json::to_string(record) {
            Ok(line) => line,
            Err(err) => {
                warn!(error = %err, "telemetry record serialisation failed");
                return;
            }
        };
        if let Some(sender) = &self.sender {
            if sender.send(line).is_err() {
                warn!("telemetry writer is gone; record dropped");
            }
        }
    }

    /// The conventional sibling path for step records
    pub fn step_log_path(&self) -> PathBuf {
        self.path.with_extension("steps.jsonl")
    }
}

impl Drop for TelemetryLog {
    fn drop(&mut self) {
        // Close the channel, then let the writer drain
        self.sender.take();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

/// Observer streaming step records into a telemetry log
pub struct StepStream {
    log: TelemetryLog,
    run_id: String,
}

impl StepStream {
    pub fn new(log: TelemetryLog, run_id: impl Into<String>) -> Self {
        Self {
            log,
            run_id: run_id.into(),
        }
    }
}

impl SearchObserver for StepStream {
    fn on_step(&self, event: &StepEvent) {
        self.log.append(&StepRecord {
            schema_version: TELEMETRY_SCHEMA_VERSION,
            run_id: self.run_id.clone(),
            iteration: event.iteration,
            best: event.best,
            current: event.current,
            rolling_mean: event.rolling_mean,
            temperature: event.temperature,
            delta_best: event.delta_best,
            acceptance_window: event.acceptance_window,
            operator: event.operator.to_string(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_records_are_appended_as_json_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("runs.jsonl");
        {
            let log = TelemetryLog::open(&path).unwrap();
            log.append(&RunRecord::new("test", "minitoy", "sa", 7, 100, 12.0));
            log.append(&SummaryRecord::new("sa", "minitoy", 12.0, 1));
        } // drop joins the writer

        let contents = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 2);
        for line in lines {
            let value: serde_json::Value = serde_json::from_str(line).unwrap();
            assert_eq!(value["schema_version"], TELEMETRY_SCHEMA_VERSION);
        }
    }

    #[test]
    fn test_step_stream_preserves_iteration_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("steps.jsonl");
        {
            let stream = StepStream::new(TelemetryLog::open(&path).unwrap(), "run-1");
            for iteration in 0..5 {
                stream.on_step(&StepEvent {
                    iteration,
                    best: 1.0,
                    current: 0.5,
                    rolling_mean: 0.5,
                    temperature: 1.0,
                    delta_best: 0.0,
                    acceptance_window: 0.0,
                    accepted: false,
                    operator: "swap",
                });
            }
        }

        let contents = std::fs::read_to_string(&path).unwrap();
        let iterations: Vec<u64> = contents
            .lines()
            .map(|line| serde_json::from_str::<serde_json::Value>(line).unwrap()["iteration"]
                .as_u64()
                .unwrap())
            .collect();
        assert_eq!(iterations, vec![0, 1, 2, 3, 4]);
    }
}
