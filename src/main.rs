use anyhow::{bail, Context, Result};
use clap::Parser;
use log::{info, warn};

use measurement_consolidator::config::{Args, PipelineMode};
use measurement_consolidator::heights::{HeightCache, HttpElevationProvider};
use measurement_consolidator::motion::MotionThresholds;
use measurement_consolidator::{
    aggregation, clustering, data_loading, heights, motion, output, RunSummary,
};

fn main() -> Result<()> {
    env_logger::init();

    let args = Args::parse();
    let thresholds = MotionThresholds {
        gps_accuracy_m: args.gps_accuracy_threshold,
        height_movement_m: args.height_movement_threshold,
    };

    let files = data_loading::find_chunk_files(&args.input_dir, &args.file_pattern)?;
    if files.is_empty() {
        bail!(
            "No chunk files matching {} found in {}",
            args.file_pattern,
            args.input_dir.display()
        );
    }
    println!("Found {} chunk files", files.len());

    let provider = if args.fill_heights {
        match (&args.api_url, &args.api_key) {
            (Some(url), Some(key)) => Some(HttpElevationProvider::new(url.clone(), key.clone())),
            _ => bail!("--fill-heights needs API_URL and API_KEY (flag or environment)"),
        }
    } else {
        None
    };
    let mut height_cache = HeightCache::new();

    // Each run starts from a clean output file; the append path decides on
    // the header line by file size alone.
    if args.output.exists() {
        std::fs::remove_file(&args.output)
            .with_context(|| format!("Failed to remove old output: {}", args.output.display()))?;
    }

    let mut summary = RunSummary::default();
    let mut all_decoded = Vec::new();

    for file in &files {
        info!("Reading file: {}", file.display());
        let raw = match data_loading::read_chunk(file, &mut summary) {
            Ok(raw) => raw,
            Err(err) => {
                warn!("Skipping unreadable chunk file {}: {}", file.display(), err);
                summary.files_skipped += 1;
                continue;
            }
        };
        summary.files_read += 1;
        info!("Read {} records", raw.len());

        let mut decoded = data_loading::decode_records(raw, &mut summary);
        if let Some(provider) = &provider {
            heights::fill_missing_heights(&mut decoded, provider, &mut height_cache);
        }

        match args.mode {
            PipelineMode::Streaming => {
                let consolidated = clustering::cluster_records(&decoded, args.distance_threshold);
                if consolidated.is_empty() {
                    info!("No data to process after grouping for {}.", file.display());
                }
                summary.rows_written += consolidated.len();
                output::append_consolidated(&args.output, &consolidated)?;
            }
            PipelineMode::Batch => all_decoded.append(&mut decoded),
        }
    }

    if summary.files_read == 0 {
        bail!("All {} chunk files failed to read", files.len());
    }

    if args.mode == PipelineMode::Batch {
        let consolidated = clustering::cluster_records(&all_decoded, args.distance_threshold);
        let aggregates = aggregation::aggregate_daily(&consolidated);
        let mut classified = motion::classify_daily(aggregates, &thresholds);
        motion::smooth_statuses(&mut classified);
        summary.rows_written = classified.len();
        output::write_classified(&args.output, &classified)?;
    }

    println!(
        "Processed {} rows from {} files ({} skipped), dropped {} ({} malformed, {} bad locations, {} missing device ids)",
        summary.rows_read,
        summary.files_read,
        summary.files_skipped,
        summary.rows_dropped(),
        summary.rows_dropped_malformed,
        summary.rows_dropped_decode,
        summary.rows_dropped_key,
    );
    println!(
        "Wrote {} rows to {}",
        summary.rows_written,
        args.output.display()
    );

    Ok(())
}
