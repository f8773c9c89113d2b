//! KPI JSON export

use anyhow::{Context, Result};
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use crate::application::services::kpi::KpiBundle;

pub struct KpiJsonGenerator;

impl KpiJsonGenerator {
    /// Writes a KPI bundle (headline keys plus the `shifts` and `days`
    /// arrays) as pretty-printed JSON
    pub fn generate<P: AsRef<Path>>(bundle: &KpiBundle, path: P) -> Result<()> {
        let file = File::create(path.as_ref())
            .with_context(|| format!("failed to create {}", path.as_ref().display()))?;
        serde_json::to_writer_pretty(BufWriter::new(file), bundle)
            .context("failed to serialise KPI bundle")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kpi_json_has_expected_keys() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("kpis.json");
        KpiJsonGenerator::generate(&KpiBundle::default(), &path).unwrap();

        let value: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        for key in [
            "total_production",
            "completed_blocks",
            "mobilisation_cost",
            "mobilisation_cost_by_machine",
            "utilisation_ratio",
            "makespan",
            "sequencing_violation_count",
            "sequencing_violation_by_block",
            "landing_surplus",
            "repair_usage_alert",
            "shifts",
            "days",
        ] {
            assert!(value.get(key).is_some(), "missing KPI key {}", key);
        }
    }
}
