use anyhow::{Context, Result};
use log::{info, warn};
use std::fs::File;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::{location, DecodedRecord, RawRecord, RowError, RunSummary};

/// Find chunk files directly under `dir` whose file name matches `pattern`.
/// The pattern holds at most one `*` wildcard, e.g. `measurements_*.csv`.
/// Files come back sorted by name so runs are deterministic.
pub fn find_chunk_files(dir: &Path, pattern: &str) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
    {
        let entry = entry.with_context(|| format!("Failed to scan {}", dir.display()))?;
        if entry.file_type().is_file()
            && matches_pattern(&entry.file_name().to_string_lossy(), pattern)
        {
            files.push(entry.into_path());
        }
    }
    Ok(files)
}

fn matches_pattern(name: &str, pattern: &str) -> bool {
    match pattern.split_once('*') {
        Some((prefix, suffix)) => {
            name.len() >= prefix.len() + suffix.len()
                && name.starts_with(prefix)
                && name.ends_with(suffix)
        }
        None => name == pattern,
    }
}

/// Read one chunk file. Rows that do not parse against the column contract
/// are skipped and counted; an unreadable file is the caller's problem.
pub fn read_chunk(path: &Path, summary: &mut RunSummary) -> Result<Vec<RawRecord>> {
    let file = File::open(path)
        .with_context(|| format!("Failed to open chunk file: {}", path.display()))?;
    let mut reader = csv::Reader::from_reader(file);
    let mut records = Vec::new();

    for result in reader.deserialize() {
        summary.rows_read += 1;
        match result {
            Ok(record) => records.push(record),
            Err(e) => {
                summary.rows_dropped_malformed += 1;
                warn!("Skipping malformed row in {}: {}", path.display(), e);
            }
        }
    }
    Ok(records)
}

/// Validate and decode raw records. Rows whose location cannot be decoded or
/// whose device id is missing are dropped and logged, never forwarded with
/// placeholder coordinates.
pub fn decode_records(records: Vec<RawRecord>, summary: &mut RunSummary) -> Vec<DecodedRecord> {
    let mut decoded = Vec::with_capacity(records.len());
    for record in records {
        match decode_record(&record) {
            Ok(row) => decoded.push(row),
            Err(RowError::InvalidKey) => {
                summary.rows_dropped_key += 1;
                warn!(
                    "Dropping row on {} with missing device id",
                    record.measurement_day
                );
            }
            Err(err) => {
                summary.rows_dropped_decode += 1;
                warn!(
                    "Dropping row for device {:?} on {}: {}",
                    record.device_id, record.measurement_day, err
                );
            }
        }
    }
    if decoded.is_empty() {
        info!("No rows left after decoding and validation.");
    }
    decoded
}

fn decode_record(record: &RawRecord) -> Result<DecodedRecord, RowError> {
    let device_id = record.device_id.ok_or(RowError::InvalidKey)?;
    let (latitude, longitude) = location::decode_point_hex(&record.location)?;
    Ok(DecodedRecord {
        device_id,
        unit: record.unit.clone(),
        latitude,
        longitude,
        height: record.height,
        measurement_day: record.measurement_day,
        average_value: record.average_value,
    })
}
