#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Interactive CLI orchestrator for the tile anomaly pipeline.
//!
//! Provides a single entry point (`cargo tile-anomaly`) that lets users run
//! the whole pipeline or any one stage against the canonical files under
//! `data/`.
//!
//! Uses `indicatif-log-bridge` (via [`tile_anomaly_cli_utils::init_logger`])
//! so that log lines and progress bars never fight for the terminal.

mod pipeline;

use dialoguer::Select;

use crate::pipeline::Stage;

/// Top-level selection.
enum Tool {
    RunPipeline,
    Stage(Stage),
}

impl Tool {
    const ALL: &[Self] = &[
        Self::RunPipeline,
        Self::Stage(Stage::GeoFilter),
        Self::Stage(Stage::Score),
        Self::Stage(Stage::Label),
        Self::Stage(Stage::Report),
    ];

    #[must_use]
    const fn label(&self) -> &'static str {
        match self {
            Self::RunPipeline => "Run full pipeline",
            Self::Stage(stage) => stage.label(),
        }
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let multi = tile_anomaly_cli_utils::init_logger();

    println!("Tile Anomaly Pipeline");
    println!();

    let labels: Vec<&str> = Tool::ALL.iter().map(Tool::label).collect();

    let idx = Select::new()
        .with_prompt("What would you like to do?")
        .items(&labels)
        .default(0)
        .interact()?;

    match &Tool::ALL[idx] {
        Tool::RunPipeline => pipeline::run(&multi)?,
        Tool::Stage(stage) => pipeline::run_stage(*stage, &multi)?,
    }

    Ok(())
}
