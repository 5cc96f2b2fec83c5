//! Output formatting and persistence for position history.
//!
//! Supports pretty-printing, JSON serialization, and CSV append.

use anyhow::Result;
use tracing::{debug, info};

use crate::record::PositionRecord;
use csv::WriterBuilder;
use std::fs::OpenOptions;
use std::path::Path;

/// Logs records using Rust's debug pretty-print format.
pub fn print_pretty(records: &[PositionRecord]) {
    for record in records {
        debug!("{:#?}", record);
    }
}

/// Logs records as pretty-printed JSON.
pub fn print_json(records: &[PositionRecord]) -> Result<()> {
    info!("{}", serde_json::to_string_pretty(records)?);
    Ok(())
}

/// Appends records as rows to a CSV file.
///
/// Creates the file with headers if it does not already exist.
pub fn append_records(path: &str, records: &[PositionRecord]) -> Result<usize> {
    let file_exists = Path::new(path).exists();
    debug!(path, file_exists, rows = records.len(), "Appending CSV records");

    let file = OpenOptions::new().append(true).create(true).open(path)?;

    let mut writer = WriterBuilder::new()
        .has_headers(!file_exists) // IMPORTANT when appending
        .from_writer(file);

    for record in records {
        writer.serialize(record)?;
    }
    writer.flush()?;

    Ok(records.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::fs;

    fn temp_path(name: &str) -> String {
        format!("{}/{}", env::temp_dir().display(), name)
    }

    fn record(timestamp: i64) -> PositionRecord {
        PositionRecord {
            vehicle_id: "10A".to_string(),
            timestamp,
            latitude: 17.4376,
            longitude: 78.4483,
            speed_kmph: 21.5,
            status: "ACTIVE".to_string(),
            route_label: "Secunderabad → Mehdipatnam".to_string(),
            next_stop_name: "Ameerpet".to_string(),
            distance_to_stop_km: 0.011,
        }
    }

    #[test]
    fn test_print_pretty_does_not_panic() {
        print_pretty(&[record(1)]);
    }

    #[test]
    fn test_print_json_does_not_panic() {
        print_json(&[record(1), record(2)]).unwrap();
    }

    #[test]
    fn test_append_records_creates_file() {
        let path = temp_path("routewise_test_create.csv");
        let _ = fs::remove_file(&path); // clean up any prior run

        assert_eq!(append_records(&path, &[record(1)]).unwrap(), 1);

        assert!(Path::new(&path).exists());
        let content = fs::read_to_string(&path).unwrap();
        assert!(content.starts_with("BusID,TimeStamp,"));

        fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_append_records_writes_header_once() {
        let path = temp_path("routewise_test_header.csv");
        let _ = fs::remove_file(&path);

        append_records(&path, &[record(1)]).unwrap();
        append_records(&path, &[record(2), record(3)]).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        let header_count = content.lines().filter(|l| l.contains("TimeStamp")).count();
        assert_eq!(header_count, 1);
        // 1 header + 3 data rows
        assert_eq!(content.lines().count(), 4);

        fs::remove_file(&path).unwrap();
    }
}
