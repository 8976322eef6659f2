//! Raw, unvalidated tabular input.

use crate::error::{Result, TelemetryError};
use std::io::Read;
use std::path::Path;
use tracing::debug;

/// A raw table of string cells as read from a dataset file.
///
/// Empty cells are represented by empty strings. Rows may be shorter than
/// the header; missing trailing cells read as empty.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawTable {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl RawTable {
    pub fn new(headers: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        Self { headers, rows }
    }

    /// Build a table from string slices, convenient in tests and examples.
    pub fn from_rows(headers: &[&str], rows: &[Vec<&str>]) -> Self {
        Self {
            headers: headers.iter().map(|h| h.to_string()).collect(),
            rows: rows
                .iter()
                .map(|r| r.iter().map(|c| c.to_string()).collect())
                .collect(),
        }
    }

    /// Read a CSV file with a header row.
    pub fn from_csv_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(TelemetryError::Io(format!(
                "dataset not found: {}",
                path.display()
            )));
        }
        let reader = csv::ReaderBuilder::new()
            .flexible(true)
            .trim(csv::Trim::All)
            .from_path(path)?;
        let table = Self::from_csv(reader)?;
        debug!(
            path = %path.display(),
            rows = table.len(),
            columns = table.headers.len(),
            "read raw dataset"
        );
        Ok(table)
    }

    /// Read CSV data with a header row from any reader.
    pub fn from_csv_reader<R: Read>(reader: R) -> Result<Self> {
        let reader = csv::ReaderBuilder::new()
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(reader);
        Self::from_csv(reader)
    }

    fn from_csv<R: Read>(mut reader: csv::Reader<R>) -> Result<Self> {
        let headers: Vec<String> = reader.headers()?.iter().map(|h| h.to_string()).collect();
        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record?;
            rows.push(record.iter().map(|c| c.to_string()).collect());
        }
        Ok(Self { headers, rows })
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Cell at (row, column), `None` when absent or blank.
    pub fn cell(&self, row: usize, column: usize) -> Option<&str> {
        self.rows
            .get(row)
            .and_then(|r| r.get(column))
            .map(|c| c.trim())
            .filter(|c| !c.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn reads_csv_with_ragged_rows() {
        let data = "Timestamp,Locality,Latency (ms)\n2023-01-01 10:00:00,Austin,20\n2023-01-01 10:10:00,Dallas\n";
        let table = RawTable::from_csv_reader(data.as_bytes()).unwrap();

        assert_eq!(table.headers(), &["Timestamp", "Locality", "Latency (ms)"]);
        assert_eq!(table.len(), 2);
        assert_eq!(table.cell(0, 2), Some("20"));
        assert_eq!(table.cell(1, 2), None);
    }

    #[test]
    fn blank_cells_are_missing() {
        let table = RawTable::from_rows(&["a", "b"], &[vec!["1", "  "]]);
        assert_eq!(table.cell(0, 0), Some("1"));
        assert_eq!(table.cell(0, 1), None);
    }

    #[test]
    fn reads_csv_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "timestamp,throughput").unwrap();
        writeln!(file, "2023-01-01 10:00:00,12.5").unwrap();
        file.flush().unwrap();

        let table = RawTable::from_csv_path(file.path()).unwrap();
        assert_eq!(table.len(), 1);
        assert_eq!(table.cell(0, 1), Some("12.5"));
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = RawTable::from_csv_path("/nonexistent/telemetry.csv").unwrap_err();
        assert_eq!(err.code(), "IO_ERROR");
    }
}
