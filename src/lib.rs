pub mod aggregation;
pub mod clustering;
pub mod config;
pub mod data_loading;
pub mod fetching;
pub mod heights;
pub mod location;
pub mod motion;
pub mod output;

use chrono::NaiveDate;
use motion::MobilityStatus;
use serde::Deserialize;
use thiserror::Error;

/// Why a single input row was dropped from the pipeline.
#[derive(Debug, Error)]
pub enum RowError {
    #[error("failed to decode location: {0}")]
    Decode(String),
    #[error("missing device id")]
    InvalidKey,
}

/// One row of a chunk file, as produced by the extraction service.
/// Column names are the fixed contract with the upstream producers.
#[derive(Debug, Clone, Deserialize)]
pub struct RawRecord {
    #[serde(rename = "Device ID")]
    pub device_id: Option<i64>,
    #[serde(rename = "Unit")]
    pub unit: String,
    #[serde(rename = "Location")]
    pub location: String,
    #[serde(rename = "Height")]
    pub height: Option<f64>,
    #[serde(rename = "Measurement Day")]
    pub measurement_day: NaiveDate,
    #[serde(rename = "Average Value")]
    pub average_value: f64,
}

/// A raw record whose location has been decoded and whose device id has been
/// validated. Rows that fail either check never reach this type.
#[derive(Debug, Clone)]
pub struct DecodedRecord {
    pub device_id: i64,
    pub unit: String,
    pub latitude: f64,
    pub longitude: f64,
    pub height: Option<f64>,
    pub measurement_day: NaiveDate,
    pub average_value: f64,
}

/// One merged cluster of near-duplicate readings within a
/// (device, day, height) partition.
#[derive(Debug, Clone, PartialEq)]
pub struct ConsolidatedRecord {
    pub device_id: i64,
    pub unit: String,
    pub latitude: f64,
    pub longitude: f64,
    pub height: Option<f64>,
    pub measurement_day: NaiveDate,
    pub average_value: f64,
}

/// One row per (device, day).
#[derive(Debug, Clone, PartialEq)]
pub struct DailyAggregate {
    pub device_id: i64,
    pub unit: String,
    pub latitude: f64,
    pub longitude: f64,
    pub height: Option<f64>,
    pub measurement_day: NaiveDate,
    pub average_value: f64,
}

/// A daily aggregate labelled with the device's mobility status for that day.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassifiedRecord {
    pub device_id: i64,
    pub unit: String,
    pub latitude: f64,
    pub longitude: f64,
    pub height: Option<f64>,
    pub measurement_day: NaiveDate,
    pub average_value: f64,
    pub status: MobilityStatus,
}

/// Counters for the end-of-run report of rows processed vs dropped.
#[derive(Debug, Default)]
pub struct RunSummary {
    pub files_read: usize,
    pub files_skipped: usize,
    pub rows_read: usize,
    pub rows_dropped_malformed: usize,
    pub rows_dropped_decode: usize,
    pub rows_dropped_key: usize,
    pub rows_written: usize,
}

impl RunSummary {
    pub fn rows_dropped(&self) -> usize {
        self.rows_dropped_malformed + self.rows_dropped_decode + self.rows_dropped_key
    }
}
