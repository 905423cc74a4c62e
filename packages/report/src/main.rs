#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Prints the top labeled tiles from `data/indicators.csv`.

use tile_anomaly_io::paths;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    pretty_env_logger::init();

    let path = paths::indicators_path();
    let top_n = tile_anomaly_config::embedded().report.top_n;
    let report = tile_anomaly_report::run(&path, top_n)?;

    print!("{}", report.table);
    if report.rows == 0 {
        println!("\nNo labeled tiles in {}", path.display());
    }

    Ok(())
}
