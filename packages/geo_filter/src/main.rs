#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! CLI entry point for the geo filter stage.
//!
//! ```text
//! cargo geo-filter [--input <raw.parquet>] [--output <city.parquet>] [--bbox lon_min,lat_min,lon_max,lat_max]
//! ```

use std::path::PathBuf;

use clap::Parser;
use tile_anomaly_cli_utils::IndicatifProgress;
use tile_anomaly_config::PipelineConfig;
use tile_anomaly_io::paths;
use tile_anomaly_tile_models::BoundingBox;

#[derive(Parser)]
#[command(
    name = "tile_anomaly_geo_filter",
    about = "Keep performance tiles whose centroid lies inside a bounding box"
)]
struct Cli {
    /// Raw tile dataset (.parquet or .csv)
    #[arg(long, default_value_os_t = paths::raw_tiles_path())]
    input: PathBuf,
    /// Output snapshot (.parquet or .csv)
    #[arg(long, default_value_os_t = paths::city_tiles_path())]
    output: PathBuf,
    /// Pipeline config override (TOML)
    #[arg(long)]
    config: Option<PathBuf>,
    /// Bounding box as `lon_min,lat_min,lon_max,lat_max` (overrides config)
    #[arg(long, allow_hyphen_values = true)]
    bbox: Option<BoundingBox>,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let multi = tile_anomaly_cli_utils::init_logger();
    let cli = Cli::parse();

    let config = PipelineConfig::load(cli.config.as_deref())?;
    let bbox = cli.bbox.unwrap_or(config.bbox);

    let progress = IndicatifProgress::centroids(&multi);
    let summary = tile_anomaly_geo_filter::run(&cli.input, &cli.output, &bbox, &progress)?;

    println!(
        "Kept {} of {} tiles -> {}",
        summary.kept,
        summary.read,
        cli.output.display()
    );

    Ok(())
}
