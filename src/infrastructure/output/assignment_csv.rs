//! Assignment CSV export and import
//!
//! The canonical assignment table: columns `machine_id, block_id, day,
//! shift_id, assigned, production`, stable-sorted by (machine, day, shift,
//! block) so regression runs can diff files byte-exactly.

use anyhow::{Context, Result};
use csv::{Reader, Writer};
use std::fs::File;
use std::path::Path;

use crate::application::services::playback::AssignmentRow;

pub struct AssignmentCsv;

impl AssignmentCsv {
    /// Writes assignment rows in the canonical column order
    pub fn write<P: AsRef<Path>>(rows: &[AssignmentRow], path: P) -> Result<()> {
        let file = File::create(path.as_ref())
            .with_context(|| format!("failed to create {}", path.as_ref().display()))?;
        let mut wtr = Writer::from_writer(file);

        wtr.write_record([
            "machine_id",
            "block_id",
            "day",
            "shift_id",
            "assigned",
            "production",
        ])?;

        let mut sorted: Vec<&AssignmentRow> = rows.iter().collect();
        sorted.sort_by(|a, b| {
            a.machine_id
                .cmp(&b.machine_id)
                .then(a.day.cmp(&b.day))
                .then(a.shift_id.cmp(&b.shift_id))
                .then(a.block_id.cmp(&b.block_id))
        });

        for row in sorted {
            wtr.write_record([
                row.machine_id.as_str(),
                row.block_id.as_str(),
                &row.day.to_string(),
                row.shift_id.as_str(),
                if row.assigned { "1" } else { "0" },
                &row.production.map(|p| p.to_string()).unwrap_or_default(),
            ])?;
        }

        wtr.flush()?;
        Ok(())
    }

    /// Reads an assignment table back from disk
    pub fn read<P: AsRef<Path>>(path: P) -> Result<Vec<AssignmentRow>> {
        let file = File::open(path.as_ref())
            .with_context(|| format!("failed to open {}", path.as_ref().display()))?;
        let mut rdr = Reader::from_reader(file);

        let mut rows = Vec::new();
        for (index, record) in rdr.records().enumerate() {
            let record = record.with_context(|| format!("bad CSV record at row {}", index))?;
            let get = |i: usize| record.get(i).unwrap_or("").trim().to_string();
            rows.push(AssignmentRow {
                machine_id: get(0),
                block_id: get(1),
                day: get(2)
                    .parse()
                    .with_context(|| format!("bad day at row {}", index))?,
                shift_id: get(3),
                assigned: get(4) == "1",
                production: {
                    let raw = get(5);
                    if raw.is_empty() {
                        None
                    } else {
                        Some(
                            raw.parse()
                                .with_context(|| format!("bad production at row {}", index))?,
                        )
                    }
                },
            });
        }
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(machine: &str, block: &str, day: u32) -> AssignmentRow {
        AssignmentRow {
            machine_id: machine.to_string(),
            block_id: block.to_string(),
            day,
            shift_id: "day".to_string(),
            assigned: true,
            production: None,
        }
    }

    #[test]
    fn test_write_read_roundtrip_and_stable_sort() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("assignments.csv");

        let rows = vec![row("M2", "B1", 1), row("M1", "B2", 2), row("M1", "B1", 1)];
        AssignmentCsv::write(&rows, &path).unwrap();
        let read = AssignmentCsv::read(&path).unwrap();

        assert_eq!(read.len(), 3);
        assert_eq!(read[0].machine_id, "M1");
        assert_eq!(read[0].day, 1);
        assert_eq!(read[2].machine_id, "M2");

        // Byte-exact stability across rewrites
        let second = dir.path().join("again.csv");
        AssignmentCsv::write(&read, &second).unwrap();
        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            std::fs::read_to_string(&second).unwrap()
        );
    }
}
