//! Dataset and reliability table loading.
//!
//! Reads rows with named fields from CSV (header row required) or JSON
//! (an array of objects). Header names are trimmed, and empty cells or
//! JSON nulls are treated as absent fields.

use crate::config::ReliabilityConfig;
use crate::models::{Dataset, ParticipantId, Record, ReliabilityRecord};
use anyhow::{bail, Context, Result};
use serde_json::Value;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::{debug, info};

/// Input file format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputFormat {
    Csv,
    Json,
}

impl InputFormat {
    /// Pick the format from the file extension; anything but `.json` is CSV.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => InputFormat::Json,
            _ => InputFormat::Csv,
        }
    }
}

/// Load a dataset from a file.
pub fn load_dataset(path: &Path) -> Result<Dataset> {
    let file =
        File::open(path).with_context(|| format!("Failed to open dataset: {}", path.display()))?;

    let records = read_records(file, InputFormat::from_path(path))
        .with_context(|| format!("Failed to parse dataset: {}", path.display()))?;

    info!("Loaded {} records from {}", records.len(), path.display());
    Ok(Dataset::new(records))
}

/// Load a reliability table from a file.
pub fn load_reliability(path: &Path, columns: &ReliabilityConfig) -> Result<Vec<ReliabilityRecord>> {
    let file = File::open(path)
        .with_context(|| format!("Failed to open reliability table: {}", path.display()))?;

    let rows = read_records(file, InputFormat::from_path(path))
        .with_context(|| format!("Failed to parse reliability table: {}", path.display()))?;

    let table = rows
        .iter()
        .enumerate()
        .map(|(i, row)| reliability_from_row(row, columns).with_context(|| format!("row {}", i + 1)))
        .collect::<Result<Vec<_>>>()
        .with_context(|| format!("Invalid reliability table: {}", path.display()))?;

    info!(
        "Loaded {} reliability records from {}",
        table.len(),
        path.display()
    );
    Ok(table)
}

/// Parse rows from a reader in the given format.
pub fn read_records<R: Read>(reader: R, format: InputFormat) -> Result<Vec<Record>> {
    match format {
        InputFormat::Csv => read_csv(reader),
        InputFormat::Json => read_json(reader),
    }
}

fn read_csv<R: Read>(reader: R) -> Result<Vec<Record>> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(reader);

    let headers: Vec<String> = csv_reader
        .headers()
        .context("Failed to read CSV header")?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();
    debug!("CSV columns: {:?}", headers);

    let mut records = Vec::new();
    for row in csv_reader.records() {
        let row = row.context("Failed to read CSV row")?;
        let mut record = Record::default();
        for (header, value) in headers.iter().zip(row.iter()) {
            if !value.trim().is_empty() {
                record.insert(header.clone(), value);
            }
        }
        records.push(record);
    }

    Ok(records)
}

fn read_json<R: Read>(reader: R) -> Result<Vec<Record>> {
    let rows: Vec<serde_json::Map<String, Value>> =
        serde_json::from_reader(reader).context("Expected a JSON array of objects")?;

    Ok(rows
        .into_iter()
        .map(|row| {
            let mut record = Record::default();
            for (key, value) in row {
                let text = match value {
                    Value::Null => continue,
                    Value::String(s) => s,
                    other => other.to_string(),
                };
                record.insert(key.trim(), text);
            }
            record
        })
        .collect())
}

fn reliability_from_row(row: &Record, columns: &ReliabilityConfig) -> Result<ReliabilityRecord> {
    let participant = field(row, &columns.client_column)?;
    let participant: ParticipantId = participant
        .trim()
        .parse()
        .with_context(|| format!("Invalid participant id `{}`", participant))?;

    Ok(ReliabilityRecord {
        participant,
        received: counter(row, &columns.received_column)?,
        sent: counter(row, &columns.sent_column)?,
    })
}

fn field<'r>(row: &'r Record, name: &str) -> Result<&'r str> {
    match row.get(name) {
        Some(value) => Ok(value),
        None => bail!("Missing column `{}`", name),
    }
}

/// Packet counters are integers, but simulators sometimes write `12.0`.
fn counter(row: &Record, name: &str) -> Result<u64> {
    let raw = field(row, name)?.trim();
    if let Ok(value) = raw.parse::<u64>() {
        return Ok(value);
    }
    match raw.parse::<f64>() {
        Ok(value) if value.is_finite() && value >= 0.0 && value.fract() == 0.0 => Ok(value as u64),
        _ => bail!("Invalid counter `{}` in column `{}`", raw, name),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_read_csv_trims_headers_and_skips_blanks() {
        let data = "track_name , track_popularity\nSong A,71\nSong B,\n";
        let records = read_records(data.as_bytes(), InputFormat::Csv).unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].get("track_name"), Some("Song A"));
        assert_eq!(records[0].get("track_popularity"), Some("71"));
        assert_eq!(records[1].get("track_popularity"), None);
    }

    #[test]
    fn test_read_json_rows() {
        let data = r#"[{"item": "a", "score": 3}, {"item": "b", "score": null}]"#;
        let records = read_records(data.as_bytes(), InputFormat::Json).unwrap();

        assert_eq!(records[0].get("score"), Some("3"));
        assert_eq!(records[1].get("item"), Some("b"));
        assert!(!records[1].has("score"));
    }

    #[test]
    fn test_read_json_rejects_non_array() {
        assert!(read_records(r#"{"item": "a"}"#.as_bytes(), InputFormat::Json).is_err());
    }

    #[test]
    fn test_format_from_path() {
        assert_eq!(InputFormat::from_path(Path::new("x.json")), InputFormat::Json);
        assert_eq!(InputFormat::from_path(Path::new("x.JSON")), InputFormat::Json);
        assert_eq!(InputFormat::from_path(Path::new("x.csv")), InputFormat::Csv);
        assert_eq!(InputFormat::from_path(Path::new("x")), InputFormat::Csv);
    }

    #[test]
    fn test_load_reliability_table() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("0.5_fa_ns3_results.csv");
        std::fs::write(
            &path,
            "Client, Tx_Packets,Rx_Packets,Throughput_(Mbps)\n1,100,90,1.2\n2,100,40.0,0.5\n",
        )
        .unwrap();

        let table = load_reliability(&path, &ReliabilityConfig::default()).unwrap();
        assert_eq!(
            table,
            vec![
                ReliabilityRecord::new(1, 90, 100),
                ReliabilityRecord::new(2, 40, 100)
            ]
        );
    }

    #[test]
    fn test_load_reliability_missing_column() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("results.csv");
        std::fs::write(&path, "Client,Tx_Packets\n1,100\n").unwrap();

        let err = load_reliability(&path, &ReliabilityConfig::default()).unwrap_err();
        assert!(format!("{:#}", err).contains("Rx_Packets"));
    }

    #[test]
    fn test_load_dataset_from_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("items.json");
        std::fs::write(&path, r#"[{"item": "a"}, {"item": "b"}]"#).unwrap();

        let dataset = load_dataset(&path).unwrap();
        assert_eq!(dataset.len(), 2);
    }
}
