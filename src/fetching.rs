use anyhow::Result;
use chrono::{Duration, NaiveDate, Utc};
use log::{error, info, warn};
use std::path::{Path, PathBuf};

use crate::{output, RawRecord};

pub const RETRY_LIMIT: u32 = 3;
pub const DECREASE_FACTOR: i64 = 2;
pub const MIN_INCREMENT_DAYS: i64 = 1;
pub const INITIAL_INCREMENT_DAYS: i64 = 180;

/// Supplies raw measurement batches. The backing store (and any
/// connection/reconnect handling) lives behind this trait; the pipeline only
/// relies on each batch being a well-formed table.
pub trait MeasurementSource {
    /// Rows captured within `[start, end)`, pre-averaged per
    /// (device, unit, location, height, day) bucket.
    fn fetch_range(&mut self, start: NaiveDate, end: NaiveDate) -> Result<Vec<RawRecord>>;

    /// Every row captured before `cutoff`.
    fn fetch_before(&mut self, cutoff: NaiveDate) -> Result<Vec<RawRecord>>;
}

/// How to walk the archive: window size, retry budget and how aggressively
/// to shrink windows that keep failing.
#[derive(Debug, Clone, Copy)]
pub struct FetchPlan {
    pub start_date: NaiveDate,
    pub initial_increment_days: i64,
    pub retry_limit: u32,
    pub decrease_factor: i64,
    pub min_increment_days: i64,
}

impl FetchPlan {
    pub fn new(start_date: NaiveDate) -> Self {
        Self {
            start_date,
            initial_increment_days: INITIAL_INCREMENT_DAYS,
            retry_limit: RETRY_LIMIT,
            decrease_factor: DECREASE_FACTOR,
            min_increment_days: MIN_INCREMENT_DAYS,
        }
    }
}

/// Walk date windows from the plan's start date up to today, writing each
/// non-empty batch as a chunk file under `out_dir`. A window that exhausts
/// its retries shrinks the interval for another attempt; once the interval
/// is already at its minimum the window is skipped so the walk always
/// terminates. Returns the number of chunk files written.
pub fn fetch_chunks(
    source: &mut dyn MeasurementSource,
    plan: &FetchPlan,
    out_dir: &Path,
) -> Result<usize> {
    let today = Utc::now().date_naive();
    let mut interval = plan.initial_increment_days.max(plan.min_increment_days);
    let mut current = plan.start_date;
    let mut written = 0;

    while current < today {
        let mut retries = plan.retry_limit;
        loop {
            let next = current + Duration::days(interval);
            match source.fetch_range(current, next) {
                Ok(batch) => {
                    if batch.is_empty() {
                        info!("No data found for {} to {}.", current, next);
                    } else {
                        let file_name = format!("measurements_{}_to_{}.csv", current, next);
                        output::write_chunk(&out_dir.join(&file_name), &batch)?;
                        info!("Results saved to {}.", file_name);
                        written += 1;
                    }
                    current = next;
                    break;
                }
                Err(err) => {
                    retries = retries.saturating_sub(1);
                    warn!(
                        "Fetch failed for {} to {}: {}. Retrying... {} retries left.",
                        current, next, err, retries
                    );
                    if retries > 0 {
                        continue;
                    }
                    if interval > plan.min_increment_days {
                        interval = (interval / plan.decrease_factor).max(plan.min_increment_days);
                        retries = plan.retry_limit;
                        warn!("Reducing interval due to errors. New interval: {} days", interval);
                    } else {
                        error!(
                            "Skipping window starting {} after repeated failures.",
                            current
                        );
                        current = next;
                        break;
                    }
                }
            }
        }
    }
    Ok(written)
}

/// One-shot fetch of everything captured before `cutoff`, for seeding a new
/// chunk directory. Returns the path of the written chunk file, if any rows
/// came back.
pub fn fetch_backlog(
    source: &mut dyn MeasurementSource,
    cutoff: NaiveDate,
    out_dir: &Path,
) -> Result<Option<PathBuf>> {
    let batch = source.fetch_before(cutoff)?;
    if batch.is_empty() {
        info!("Query returned no data.");
        return Ok(None);
    }
    let path = out_dir.join(format!("measurements_before_{}.csv", cutoff));
    output::write_chunk(&path, &batch)?;
    info!("Results saved to {}.", path.display());
    Ok(Some(path))
}
