use log::debug;

use crate::clustering::distance_meters;
use crate::{ClassifiedRecord, DailyAggregate};

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum MobilityStatus {
    Stationary,
    Moving,
}

/// Movement thresholds, injected by the driver so the classifier stays
/// tunable without recompiling.
#[derive(Debug, Clone, Copy)]
pub struct MotionThresholds {
    /// Displacement below this is indistinguishable from GPS noise (meters).
    pub gps_accuracy_m: f64,
    /// Height change above this counts as a move even without displacement
    /// (meters).
    pub height_movement_m: f64,
}

impl Default for MotionThresholds {
    fn default() -> Self {
        Self {
            gps_accuracy_m: 20.0,
            height_movement_m: 5.0,
        }
    }
}

/// Label each daily aggregate Stationary or Moving by comparing it to the
/// device's previous aggregate in day order. The first day of a device has
/// no prior reference and is always Stationary. Calendar gaps are fine; the
/// comparison is simply against the last available prior row.
pub fn classify_daily(
    mut aggregates: Vec<DailyAggregate>,
    thresholds: &MotionThresholds,
) -> Vec<ClassifiedRecord> {
    aggregates.sort_by(|a, b| {
        (a.device_id, a.measurement_day).cmp(&(b.device_id, b.measurement_day))
    });

    let mut classified = Vec::with_capacity(aggregates.len());
    let mut previous: Option<(i64, f64, f64, Option<f64>)> = None;

    for aggregate in aggregates {
        let status = match previous {
            Some((device_id, lat, lon, height)) if device_id == aggregate.device_id => {
                let movement_m =
                    distance_meters((lat, lon), (aggregate.latitude, aggregate.longitude));
                let height_delta = match (height, aggregate.height) {
                    (Some(prev), Some(curr)) => Some((curr - prev).abs()),
                    _ => None,
                };
                debug!(
                    "Device {} on {}: moved {:.1} m, height delta {:?}",
                    aggregate.device_id, aggregate.measurement_day, movement_m, height_delta
                );
                if movement_m > thresholds.gps_accuracy_m
                    || height_delta.map_or(false, |d| d > thresholds.height_movement_m)
                {
                    MobilityStatus::Moving
                } else {
                    MobilityStatus::Stationary
                }
            }
            _ => MobilityStatus::Stationary,
        };

        previous = Some((
            aggregate.device_id,
            aggregate.latitude,
            aggregate.longitude,
            aggregate.height,
        ));
        classified.push(ClassifiedRecord {
            device_id: aggregate.device_id,
            unit: aggregate.unit,
            latitude: aggregate.latitude,
            longitude: aggregate.longitude,
            height: aggregate.height,
            measurement_day: aggregate.measurement_day,
            average_value: aggregate.average_value,
            status,
        });
    }
    classified
}

/// Remove single-day status flips: one left-to-right pass per device that
/// rewrites an interior status to match its neighbors when both neighbors
/// agree with each other and disagree with it. The first and last day of a
/// device are never rewritten, and a run of two or more consecutive
/// anomalies survives — this is a median-of-3 filter, not iterative
/// smoothing to a fixed point.
///
/// Records must be sorted by (device, day), which is how `classify_daily`
/// returns them.
pub fn smooth_statuses(records: &mut [ClassifiedRecord]) {
    let mut start = 0;
    while start < records.len() {
        let device_id = records[start].device_id;
        let mut end = start + 1;
        while end < records.len() && records[end].device_id == device_id {
            end += 1;
        }

        let run = &mut records[start..end];
        for i in 1..run.len().saturating_sub(1) {
            if run[i - 1].status == run[i + 1].status && run[i].status != run[i - 1].status {
                run[i].status = run[i - 1].status;
            }
        }

        start = end;
    }
}
