pub mod assignment_csv;
pub mod kpi_json;
pub mod metrics_store;
pub mod telemetry;
pub mod watcher;

pub use assignment_csv::AssignmentCsv;
pub use kpi_json::KpiJsonGenerator;
pub use metrics_store::MetricsStore;
pub use telemetry::{
    RunRecord, StepRecord, StepStream, SummaryRecord, TelemetryLog, TELEMETRY_SCHEMA_VERSION,
};
pub use watcher::{watcher_channel, Snapshot, WatcherFeed};
