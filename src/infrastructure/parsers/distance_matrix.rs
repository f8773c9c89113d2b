//! Distance matrix CSV parser
//!
//! Square CSV with block ids as both the first column and the header; cells
//! in metres; blank cells mean the distance is unknown (the move-tier
//! default penalty applies downstream).

use anyhow::{bail, Context, Result};
use csv::ReaderBuilder;
use std::fs::File;
use std::path::Path;

use crate::domain::entities::DistanceMatrix;

pub struct DistanceMatrixParser;

impl DistanceMatrixParser {
    /// Parses a square distance CSV into a [`DistanceMatrix`]
    ///
    /// # Errors
    ///
    /// Returns an error when the file cannot be read, a row's id column is
    /// missing, or a cell fails to parse as a number.
    pub fn parse_file<P: AsRef<Path>>(path: P) -> Result<DistanceMatrix> {
        let file = File::open(path.as_ref())
            .with_context(|| format!("failed to open {}", path.as_ref().display()))?;
        let mut rdr = ReaderBuilder::new().has_headers(true).from_reader(file);

        let header_ids: Vec<String> = rdr
            .headers()
            .context("distance matrix has no header")?
            .iter()
            .skip(1)
            .map(|s| s.trim().to_string())
            .collect();
        if header_ids.is_empty() {
            bail!("distance matrix header names no blocks");
        }

        let mut matrix = DistanceMatrix::new(header_ids.clone());
        for (row_index, record) in rdr.records().enumerate() {
            let record =
                record.with_context(|| format!("bad distance record at row {}", row_index))?;
            let row_id = match record.get(0) {
                Some(id) if !id.trim().is_empty() => id.trim().to_string(),
                _ => bail!("distance matrix row {} is missing its block id", row_index),
            };
            for (col, cell) in record.iter().skip(1).enumerate() {
                let cell = cell.trim();
                if cell.is_empty() {
                    continue;
                }
                let metres: f64 = cell.parse().with_context(|| {
                    format!(
                        "bad distance for ('{}', '{}'): '{}'",
                        row_id, header_ids[col], cell
                    )
                })?;
                if let Some(col_id) = header_ids.get(col) {
                    matrix.set(&row_id, col_id, metres);
                }
            }
        }

        Ok(matrix)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_parse_square_matrix_with_blanks() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("distances.csv");
        let mut file = File::create(&path).unwrap();
        writeln!(file, "block_id,B1,B2,B3").unwrap();
        writeln!(file, "B1,0,5000,").unwrap();
        writeln!(file, "B2,5000,0,800").unwrap();
        writeln!(file, "B3,,800,0").unwrap();
        drop(file);

        let matrix = DistanceMatrixParser::parse_file(&path).unwrap();
        assert_eq!(matrix.get("B1", "B2"), Some(5000.0));
        assert_eq!(matrix.get("B2", "B3"), Some(800.0));
        // Blank cells stay unknown
        assert_eq!(matrix.get("B1", "B3"), None);
        assert_eq!(matrix.get("B1", "B1"), Some(0.0));
    }

    #[test]
    fn test_bad_cell_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("distances.csv");
        let mut file = File::create(&path).unwrap();
        writeln!(file, "block_id,B1").unwrap();
        writeln!(file, "B1,not_a_number").unwrap();
        drop(file);

        assert!(DistanceMatrixParser::parse_file(&path).is_err());
    }
}
