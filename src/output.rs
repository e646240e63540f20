use anyhow::{Context, Result};
use log::info;
use std::fs::{self, File, OpenOptions};
use std::path::Path;

use crate::{ClassifiedRecord, ConsolidatedRecord, RawRecord};

const CONSOLIDATED_HEADER: [&str; 7] = [
    "ID",
    "Unit",
    "Latitude",
    "Longitude",
    "Height",
    "Measurement Day",
    "Average Value",
];

const CHUNK_HEADER: [&str; 6] = [
    "Device ID",
    "Unit",
    "Location",
    "Height",
    "Measurement Day",
    "Average Value",
];

fn format_height(height: Option<f64>) -> String {
    height.map(|h| h.to_string()).unwrap_or_default()
}

fn ensure_parent_dir(path: &Path) -> Result<()> {
    if let Some(dir) = path.parent() {
        if !dir.as_os_str().is_empty() {
            fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create directory: {}", dir.display()))?;
        }
    }
    Ok(())
}

/// Append consolidated rows to the output file, sorted by measurement day
/// within the batch. The header line is written exactly once per file,
/// decided by whether the file already has content rather than by any flag
/// held across calls.
pub fn append_consolidated(path: &Path, records: &[ConsolidatedRecord]) -> Result<()> {
    let mut sorted: Vec<&ConsolidatedRecord> = records.iter().collect();
    sorted.sort_by_key(|r| r.measurement_day);

    ensure_parent_dir(path)?;
    let needs_header = fs::metadata(path).map(|m| m.len() == 0).unwrap_or(true);
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("Failed to open output file: {}", path.display()))?;
    let mut writer = csv::Writer::from_writer(file);

    if needs_header {
        writer.write_record(&CONSOLIDATED_HEADER)?;
    }
    for record in &sorted {
        writer.write_record(&[
            record.device_id.to_string(),
            record.unit.clone(),
            record.latitude.to_string(),
            record.longitude.to_string(),
            format_height(record.height),
            record.measurement_day.to_string(),
            record.average_value.to_string(),
        ])?;
    }
    writer.flush()?;
    info!("Saved {} records to output.", sorted.len());
    Ok(())
}

/// Write the classified table, replacing any previous output. Rows are
/// sorted by measurement day; the sort is stable, so each device's day
/// order from the classifier survives within equal days.
pub fn write_classified(path: &Path, records: &[ClassifiedRecord]) -> Result<()> {
    let mut sorted: Vec<&ClassifiedRecord> = records.iter().collect();
    sorted.sort_by_key(|r| r.measurement_day);

    ensure_parent_dir(path)?;
    let file = File::create(path)
        .with_context(|| format!("Failed to create output file: {}", path.display()))?;
    let mut writer = csv::Writer::from_writer(file);

    let mut header = CONSOLIDATED_HEADER.to_vec();
    header.push("Status");
    writer.write_record(&header)?;

    for record in &sorted {
        writer.write_record(&[
            record.device_id.to_string(),
            record.unit.clone(),
            record.latitude.to_string(),
            record.longitude.to_string(),
            format_height(record.height),
            record.measurement_day.to_string(),
            record.average_value.to_string(),
            format!("{:?}", record.status),
        ])?;
    }
    writer.flush()?;
    info!("Saved {} records to {}.", sorted.len(), path.display());
    Ok(())
}

/// Write one extraction batch as a chunk file, replacing any previous file
/// of the same name. Missing device ids and heights become empty fields,
/// matching what the upstream producers emit for SQL nulls.
pub fn write_chunk(path: &Path, records: &[RawRecord]) -> Result<()> {
    ensure_parent_dir(path)?;
    let file = File::create(path)
        .with_context(|| format!("Failed to create file: {}", path.display()))?;
    let mut writer = csv::Writer::from_writer(file);

    writer.write_record(&CHUNK_HEADER)?;
    for record in records {
        writer.write_record(&[
            record
                .device_id
                .map(|id| id.to_string())
                .unwrap_or_default(),
            record.unit.clone(),
            record.location.clone(),
            format_height(record.height),
            record.measurement_day.to_string(),
            record.average_value.to_string(),
        ])?;
    }
    writer.flush()?;
    Ok(())
}
