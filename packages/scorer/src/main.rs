#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! CLI entry point for the outlier scorer stage.
//!
//! ```text
//! cargo score [--input <city.parquet>] [--output <ranked.csv>] [--contamination 0.02] [--seed 42]
//! ```

use std::path::PathBuf;

use clap::Parser;
use tile_anomaly_cli_utils::IndicatifProgress;
use tile_anomaly_config::{NullPolicy, PipelineConfig};
use tile_anomaly_io::paths;

#[derive(Parser)]
#[command(
    name = "tile_anomaly_scorer",
    about = "Rank city tiles by isolation-forest anomaly score"
)]
struct Cli {
    /// Located tile snapshot (.parquet or .csv)
    #[arg(long, default_value_os_t = paths::city_tiles_path())]
    input: PathBuf,
    /// Ranked CSV output
    #[arg(long, default_value_os_t = paths::anomalies_ranked_path())]
    output: PathBuf,
    /// Pipeline config override (TOML)
    #[arg(long)]
    config: Option<PathBuf>,
    /// Expected fraction of anomalous tiles, in (0, 0.5]
    #[arg(long)]
    contamination: Option<f64>,
    /// Number of trees
    #[arg(long)]
    n_estimators: Option<usize>,
    /// RNG seed
    #[arg(long)]
    seed: Option<u64>,
    /// Missing feature handling: `reject` or `impute-median`
    #[arg(long)]
    null_policy: Option<NullPolicy>,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let multi = tile_anomaly_cli_utils::init_logger();
    let cli = Cli::parse();

    let mut config = PipelineConfig::load(cli.config.as_deref())?;
    if let Some(contamination) = cli.contamination {
        config.scorer.contamination = contamination;
    }
    if let Some(n_estimators) = cli.n_estimators {
        config.scorer.n_estimators = n_estimators;
    }
    if let Some(seed) = cli.seed {
        config.scorer.seed = seed;
    }
    if let Some(null_policy) = cli.null_policy {
        config.scorer.null_policy = null_policy;
    }
    config.validate()?;

    let progress = IndicatifProgress::trees(&multi, config.scorer.n_estimators);
    let outcome = tile_anomaly_scorer::run(&cli.input, &cli.output, &config.scorer, &progress)?;

    println!(
        "Flagged {} of {} tiles -> {}",
        outcome.flagged(),
        outcome.tiles.len(),
        cli.output.display()
    );

    Ok(())
}
