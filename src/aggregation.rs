use chrono::NaiveDate;
use log::debug;
use std::collections::HashMap;

use crate::{ConsolidatedRecord, DailyAggregate};

/// Collapse consolidated rows into one row per (device, day).
///
/// Position and height take the median across the group so a single jittery
/// cluster cannot drag the representative location; the measured value keeps
/// the arithmetic mean. Unit is the first occurrence. Output is sorted by
/// device id, then day, which is the order the motion classifier expects.
pub fn aggregate_daily(records: &[ConsolidatedRecord]) -> Vec<DailyAggregate> {
    let mut groups: HashMap<(i64, NaiveDate), Vec<&ConsolidatedRecord>> = HashMap::new();
    for record in records {
        groups
            .entry((record.device_id, record.measurement_day))
            .or_default()
            .push(record);
    }

    let mut keys: Vec<(i64, NaiveDate)> = groups.keys().copied().collect();
    keys.sort();

    let mut aggregates = Vec::with_capacity(keys.len());
    for key in keys {
        let members = &groups[&key];
        debug!(
            "Aggregating {} rows for device {} on {}",
            members.len(),
            key.0,
            key.1
        );

        let latitudes: Vec<f64> = members.iter().map(|r| r.latitude).collect();
        let longitudes: Vec<f64> = members.iter().map(|r| r.longitude).collect();
        let heights: Vec<f64> = members.iter().filter_map(|r| r.height).collect();

        aggregates.push(DailyAggregate {
            device_id: key.0,
            unit: members[0].unit.clone(),
            latitude: median(&latitudes),
            longitude: median(&longitudes),
            height: if heights.is_empty() {
                None
            } else {
                Some(median(&heights))
            },
            measurement_day: key.1,
            average_value: members.iter().map(|r| r.average_value).sum::<f64>()
                / members.len() as f64,
        });
    }
    aggregates
}

fn median(values: &[f64]) -> f64 {
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap());
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}
