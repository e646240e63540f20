//! End-to-end runs of the consolidation pipeline over small chunk files,
//! from CSV parsing through clustering, aggregation, classification and
//! smoothing to the written output.

use chrono::NaiveDate;
use std::fs;
use std::path::PathBuf;

use measurement_consolidator::motion::{MobilityStatus, MotionThresholds};
use measurement_consolidator::{aggregation, clustering, data_loading, motion, output, RunSummary};

// SRID-less little-endian point payloads
const POINT_A: &str = "0101000000000000000000F03F0000000000000040"; // POINT(1 2)
const POINT_B: &str = "01010000000AD7A3703D0AF13F0000000000000040"; // POINT(1.065 2), ~7.2 km east
const LINESTRING: &str = "010200000000000000";

fn temp_path(name: &str) -> PathBuf {
    let path = std::env::temp_dir().join(format!(
        "measurement-consolidator-e2e-{}-{}",
        std::process::id(),
        name
    ));
    let _ = fs::remove_file(&path);
    path
}

fn write_chunk_file(name: &str, rows: &[&str]) -> PathBuf {
    let path = temp_path(name);
    let mut contents =
        String::from("Device ID,Unit,Location,Height,Measurement Day,Average Value\n");
    for row in rows {
        contents.push_str(row);
        contents.push('\n');
    }
    fs::write(&path, contents).unwrap();
    path
}

#[test]
fn batch_pipeline_produces_one_classified_row_per_device_day() {
    let chunk = write_chunk_file(
        "batch-input.csv",
        &[
            // Two same-day readings of device 7 within GPS jitter of each
            // other, then a relocated reading two days later, then a return.
            &format!("7,hPa,{POINT_A},12.5,2015-06-04,3.0"),
            &format!("7,hPa,{POINT_A},12.5,2015-06-04,5.0"),
            &format!("7,hPa,{POINT_B},12.5,2015-06-05,4.0"),
            &format!("7,hPa,{POINT_A},12.5,2015-06-06,4.0"),
            // A row with no device id and a row with a non-point location
            // must both disappear before aggregation.
            &format!(",hPa,{POINT_A},12.5,2015-06-04,9.0"),
            &format!("8,hPa,{LINESTRING},12.5,2015-06-04,9.0"),
        ],
    );

    let mut summary = RunSummary::default();
    let raw = data_loading::read_chunk(&chunk, &mut summary).unwrap();
    let decoded = data_loading::decode_records(raw, &mut summary);

    assert_eq!(summary.rows_read, 6);
    assert_eq!(summary.rows_dropped_key, 1);
    assert_eq!(summary.rows_dropped_decode, 1);
    assert_eq!(decoded.len(), 4);

    let consolidated = clustering::cluster_records(&decoded, 1000.0);
    let aggregates = aggregation::aggregate_daily(&consolidated);
    let mut classified = motion::classify_daily(aggregates, &MotionThresholds::default());

    // One row per device-day, in (device, day) order
    assert_eq!(classified.len(), 3);
    assert_eq!(
        classified
            .iter()
            .map(|r| r.status)
            .collect::<Vec<MobilityStatus>>(),
        vec![
            MobilityStatus::Stationary,
            MobilityStatus::Moving,
            MobilityStatus::Moving
        ]
    );
    // The jittery pair collapsed to their mean value
    assert_eq!(classified[0].average_value, 4.0);

    motion::smooth_statuses(&mut classified);

    let out = temp_path("batch-output.csv");
    output::write_classified(&out, &classified).unwrap();
    let contents = fs::read_to_string(&out).unwrap();
    let _ = fs::remove_file(&chunk);
    let _ = fs::remove_file(&out);

    // Dropped rows never surface in the output
    assert!(!contents.contains(",9,"));
    let mut lines = contents.lines();
    assert_eq!(
        lines.next().unwrap(),
        "ID,Unit,Latitude,Longitude,Height,Measurement Day,Average Value,Status"
    );
    assert_eq!(lines.count(), 3);
}

#[test]
fn streaming_appends_keep_a_single_header() {
    let first = write_chunk_file(
        "stream-1.csv",
        &[&format!("7,hPa,{POINT_A},,2015-06-04,3.0")],
    );
    let second = write_chunk_file(
        "stream-2.csv",
        &[&format!("7,hPa,{POINT_A},,2015-06-05,4.0")],
    );

    let out = temp_path("stream-output.csv");
    let mut summary = RunSummary::default();
    for chunk in [&first, &second] {
        let raw = data_loading::read_chunk(chunk, &mut summary).unwrap();
        let decoded = data_loading::decode_records(raw, &mut summary);
        let consolidated = clustering::cluster_records(&decoded, 1000.0);
        output::append_consolidated(&out, &consolidated).unwrap();
    }

    let contents = fs::read_to_string(&out).unwrap();
    let _ = fs::remove_file(&first);
    let _ = fs::remove_file(&second);
    let _ = fs::remove_file(&out);

    let headers = contents
        .lines()
        .filter(|line| line.starts_with("ID,Unit"))
        .count();
    assert_eq!(headers, 1);
    assert_eq!(contents.lines().count(), 3);

    // Heights were missing throughout, so the height field stays empty
    let mut reader = csv::Reader::from_reader(contents.as_bytes());
    for record in reader.records() {
        assert_eq!(record.unwrap().get(4), Some(""));
    }
}

#[test]
fn out_and_back_relocation_survives_smoothing() {
    let days: Vec<NaiveDate> = (4..=8)
        .map(|d| NaiveDate::from_ymd_opt(2015, 6, d).unwrap())
        .collect();

    // Stationary except one day at a displaced position
    let aggregates = days
        .iter()
        .enumerate()
        .map(|(i, day)| measurement_consolidator::DailyAggregate {
            device_id: 3,
            unit: "hPa".to_string(),
            latitude: 0.0,
            longitude: if i == 2 { 0.01 } else { 0.0 },
            height: None,
            measurement_day: *day,
            average_value: 1.0,
        })
        .collect::<Vec<_>>();

    let mut classified = motion::classify_daily(aggregates, &MotionThresholds::default());
    use measurement_consolidator::motion::MobilityStatus::{Moving, Stationary};
    assert_eq!(
        classified.iter().map(|r| r.status).collect::<Vec<_>>(),
        vec![Stationary, Stationary, Moving, Moving, Stationary]
    );

    motion::smooth_statuses(&mut classified);
    // The two-day Moving run is not an isolated flip and survives intact
    assert_eq!(
        classified.iter().map(|r| r.status).collect::<Vec<_>>(),
        vec![Stationary, Stationary, Moving, Moving, Stationary]
    );
}
