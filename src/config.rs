use clap::Parser;
use std::path::PathBuf;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineMode {
    /// Read every chunk, then aggregate, classify and smooth once (default).
    Batch,
    /// Cluster each chunk file and append its rows to the output as we go.
    Streaming,
}

impl FromStr for PipelineMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "batch" => Ok(PipelineMode::Batch),
            "streaming" => Ok(PipelineMode::Streaming),
            _ => Err(format!(
                "Invalid pipeline mode: {}. Use \"batch\" for the full classified table (default) or \"streaming\" to append clustered rows per chunk file",
                s
            )),
        }
    }
}

/// Consolidate daily measurement chunks into one row per device and day
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Directory containing measurement chunk CSV files
    #[arg(help = "Directory containing measurement chunk CSV files")]
    pub input_dir: PathBuf,

    /// Chunk file name pattern with a single `*` wildcard
    #[arg(long, default_value = "measurements_*.csv")]
    pub file_pattern: String,

    /// Output CSV path (replaced at the start of each run)
    #[arg(long, default_value = "measurements_daily.csv")]
    pub output: PathBuf,

    /// Pipeline mode ("batch" or "streaming")
    #[arg(long, default_value = "batch")]
    pub mode: PipelineMode,

    /// Distance below which same-day readings merge into one cluster, in
    /// meters. GPS accuracy is 10-20 meters; the default keeps a margin in
    /// case the sensor was moved within its site.
    #[arg(long, default_value = "1000.0")]
    pub distance_threshold: f64,

    /// Day-to-day displacement above which a device counts as moving (meters)
    #[arg(long, default_value = "20.0")]
    pub gps_accuracy_threshold: f64,

    /// Day-to-day height change above which a device counts as moving (meters)
    #[arg(long, default_value = "5.0")]
    pub height_movement_threshold: f64,

    /// Backfill missing heights from the elevation API before clustering
    #[arg(long)]
    pub fill_heights: bool,

    /// Elevation API base URL
    #[arg(long, env = "API_URL")]
    pub api_url: Option<String>,

    /// Elevation API key
    #[arg(long, env = "API_KEY")]
    pub api_key: Option<String>,
}
