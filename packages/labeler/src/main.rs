#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! CLI entry point for the indicator labeler stage.
//!
//! ```text
//! cargo label --mode snapshot --input data/anomalies_ranked.csv --output data/indicators.csv
//! ```

use std::path::PathBuf;

use clap::Parser;
use tile_anomaly_config::PipelineConfig;
use tile_anomaly_labeler::LabelMode;

#[derive(Parser)]
#[command(
    name = "tile_anomaly_labeler",
    about = "Attach indicator text and severity tiers to scored tiles"
)]
struct Cli {
    /// Which scorer output is being labeled: `snapshot` or `degradation`
    #[arg(long)]
    mode: LabelMode,
    /// Scored CSV
    #[arg(long)]
    input: PathBuf,
    /// Labeled CSV output
    #[arg(long)]
    output: PathBuf,
    /// Pipeline config override (TOML)
    #[arg(long)]
    config: Option<PathBuf>,
}

fn main() {
    pretty_env_logger::init();
    let cli = Cli::parse();

    let config = match PipelineConfig::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    };

    if let Err(e) = tile_anomaly_labeler::run(cli.mode, &cli.input, &cli.output, &config) {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }

    println!("Wrote: {}", cli.output.display());
    println!("Columns now include: indicator_text");
}
