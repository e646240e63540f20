use chrono::NaiveDate;
use geo::{Distance, Geodesic, Point};
use log::debug;
use std::collections::HashMap;

use crate::{ConsolidatedRecord, DecodedRecord};

/// Geodesic distance between two (latitude, longitude) pairs, in meters.
pub fn distance_meters(a: (f64, f64), b: (f64, f64)) -> f64 {
    Geodesic::distance(Point::new(a.1, a.0), Point::new(b.1, b.0))
}

/// Grouping key for the nullable height. Missing heights map to the bit
/// pattern of negative infinity so they form their own partition; the value
/// never participates in arithmetic and is mapped back to None on output.
fn height_key(height: Option<f64>) -> u64 {
    height.unwrap_or(f64::NEG_INFINITY).to_bits()
}

/// Partition decoded readings by (device, day, height) and merge readings
/// that sit within `distance_threshold_m` of each other into one averaged
/// row per cluster.
pub fn cluster_records(
    records: &[DecodedRecord],
    distance_threshold_m: f64,
) -> Vec<ConsolidatedRecord> {
    let mut partitions: HashMap<(i64, NaiveDate, u64), Vec<&DecodedRecord>> = HashMap::new();
    for record in records {
        partitions
            .entry((
                record.device_id,
                record.measurement_day,
                height_key(record.height),
            ))
            .or_default()
            .push(record);
    }

    let mut keys: Vec<(i64, NaiveDate, u64)> = partitions.keys().copied().collect();
    keys.sort_by(|a, b| {
        a.0.cmp(&b.0)
            .then(a.1.cmp(&b.1))
            .then(f64::from_bits(a.2).total_cmp(&f64::from_bits(b.2)))
    });

    let mut consolidated = Vec::new();
    for key in keys {
        let group = &partitions[&key];
        debug!(
            "Clustering {} readings for device {} on {}",
            group.len(),
            key.0,
            key.1
        );
        merge_close_readings(group, distance_threshold_m, &mut consolidated);
    }
    consolidated
}

/// Greedy anchor merge: walk the partition in input order, take the first
/// unvisited reading as anchor, and pull in every remaining unvisited
/// reading within the threshold of that anchor. The relation is deliberately
/// not transitive across chains; membership depends on the anchor alone, so
/// results are deterministic for a given row order.
fn merge_close_readings(
    group: &[&DecodedRecord],
    distance_threshold_m: f64,
    out: &mut Vec<ConsolidatedRecord>,
) {
    let mut visited = vec![false; group.len()];

    for i in 0..group.len() {
        if visited[i] {
            continue;
        }
        visited[i] = true;
        let anchor = group[i];
        let mut members = vec![anchor];

        for j in (i + 1)..group.len() {
            if visited[j] {
                continue;
            }
            let dist = distance_meters(
                (anchor.latitude, anchor.longitude),
                (group[j].latitude, group[j].longitude),
            );
            if dist < distance_threshold_m {
                visited[j] = true;
                members.push(group[j]);
            }
        }

        let n = members.len() as f64;
        out.push(ConsolidatedRecord {
            device_id: anchor.device_id,
            unit: anchor.unit.clone(),
            latitude: members.iter().map(|r| r.latitude).sum::<f64>() / n,
            longitude: members.iter().map(|r| r.longitude).sum::<f64>() / n,
            height: anchor.height,
            measurement_day: anchor.measurement_day,
            average_value: members.iter().map(|r| r.average_value).sum::<f64>() / n,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2015, 6, d).unwrap()
    }

    fn record(device_id: i64, lat: f64, lon: f64, height: Option<f64>, value: f64) -> DecodedRecord {
        DecodedRecord {
            device_id,
            unit: "hPa".to_string(),
            latitude: lat,
            longitude: lon,
            height,
            measurement_day: day(4),
            average_value: value,
        }
    }

    #[test]
    fn geodesic_distance_sanity() {
        // One degree of longitude on the equator is ~111.3 km
        let d = distance_meters((0.0, 0.0), (0.0, 1.0));
        assert!(d > 111_000.0 && d < 112_000.0);

        // 0.0001 degrees is ~11 m
        let d = distance_meters((0.0, 0.0), (0.0, 0.0001));
        assert!(d > 10.0 && d < 12.0);
    }

    #[test]
    fn merges_gps_jitter_and_splits_distant_readings() {
        let records = vec![
            record(7, 0.0, 0.0, Some(12.0), 4.0),
            record(7, 0.0, 0.0001, Some(12.0), 6.0),
            record(7, 0.0, 1.0, Some(12.0), 9.0),
        ];

        let consolidated = cluster_records(&records, 1000.0);
        assert_eq!(consolidated.len(), 2);

        let merged = &consolidated[0];
        assert_eq!(merged.device_id, 7);
        assert!((merged.latitude - 0.0).abs() < 1e-12);
        assert!((merged.longitude - 0.00005).abs() < 1e-12);
        assert!((merged.average_value - 5.0).abs() < 1e-12);

        let lone = &consolidated[1];
        assert_eq!(lone.longitude, 1.0);
        assert_eq!(lone.average_value, 9.0);
    }

    #[test]
    fn anchor_based_merge_is_not_transitive() {
        // B is within 1000 m of anchor A; C is within 1000 m of B but ~1780 m
        // from A, so C starts its own cluster.
        let records = vec![
            record(1, 0.0, 0.0, None, 1.0),
            record(1, 0.0, 0.008, None, 2.0),
            record(1, 0.0, 0.016, None, 3.0),
        ];

        let consolidated = cluster_records(&records, 1000.0);
        assert_eq!(consolidated.len(), 2);
        assert!((consolidated[0].longitude - 0.004).abs() < 1e-12);
        assert_eq!(consolidated[1].longitude, 0.016);
    }

    #[test]
    fn never_mixes_heights() {
        let records = vec![
            record(1, 0.0, 0.0, Some(10.0), 1.0),
            record(1, 0.0, 0.0, Some(30.0), 2.0),
            record(1, 0.0, 0.0, None, 3.0),
        ];

        let mut consolidated = cluster_records(&records, 1000.0);
        assert_eq!(consolidated.len(), 3);
        consolidated.sort_by(|a, b| {
            a.height
                .unwrap_or(f64::NEG_INFINITY)
                .total_cmp(&b.height.unwrap_or(f64::NEG_INFINITY))
        });
        assert_eq!(consolidated[0].height, None);
        assert_eq!(consolidated[1].height, Some(10.0));
        assert_eq!(consolidated[2].height, Some(30.0));
    }

    #[test]
    fn singleton_cluster_keeps_member_values() {
        let records = vec![record(5, 47.25, 8.5, Some(440.0), 3.5)];
        let consolidated = cluster_records(&records, 1000.0);
        assert_eq!(consolidated.len(), 1);
        assert_eq!(consolidated[0].latitude, 47.25);
        assert_eq!(consolidated[0].longitude, 8.5);
        assert_eq!(consolidated[0].height, Some(440.0));
        assert_eq!(consolidated[0].average_value, 3.5);
        assert_eq!(consolidated[0].unit, "hPa");
    }

    #[test]
    fn devices_and_days_stay_separate() {
        let mut other_day = record(1, 0.0, 0.0, None, 2.0);
        other_day.measurement_day = day(5);
        let records = vec![
            record(1, 0.0, 0.0, None, 1.0),
            other_day,
            record(2, 0.0, 0.0, None, 3.0),
        ];

        let consolidated = cluster_records(&records, 1000.0);
        assert_eq!(consolidated.len(), 3);
    }
}
