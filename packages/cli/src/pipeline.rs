//! Pipeline orchestrator.
//!
//! Chains geo filter -> score -> label -> report over the canonical files
//! in `data/`, prompting for which stages to run and, optionally, for the
//! scorer parameters.

use std::time::Instant;

use dialoguer::{Confirm, Input, MultiSelect, Select};
use tile_anomaly_cli_utils::{IndicatifProgress, MultiProgress};
use tile_anomaly_config::{NullPolicy, PipelineConfig};
use tile_anomaly_io::paths;
use tile_anomaly_labeler::LabelMode;

/// Pipeline stages, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    GeoFilter,
    Score,
    Label,
    Report,
}

impl Stage {
    pub const ALL: &[Self] = &[Self::GeoFilter, Self::Score, Self::Label, Self::Report];

    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::GeoFilter => "Filter tiles to city bounding box",
            Self::Score => "Score tiles (isolation forest)",
            Self::Label => "Label indicators",
            Self::Report => "Print top anomalies",
        }
    }
}

/// Runs the full pipeline orchestrator.
///
/// Prompts for the stages to run and optional scorer overrides, then runs
/// each selected stage in order. A failed stage asks whether to continue.
///
/// The `multi` parameter is the shared [`MultiProgress`] that is also
/// registered with the log bridge.
///
/// # Errors
///
/// Returns an error if a prompt fails or the configuration is invalid.
pub fn run(multi: &MultiProgress) -> Result<(), Box<dyn std::error::Error>> {
    let pipeline_start = Instant::now();

    let step_labels: Vec<&str> = Stage::ALL.iter().map(Stage::label).collect();
    let defaults = vec![true; Stage::ALL.len()];

    let selected = MultiSelect::new()
        .with_prompt("Pipeline stages (space=toggle, a=all, enter=confirm)")
        .items(&step_labels)
        .defaults(&defaults)
        .interact()?;

    if selected.is_empty() {
        println!("No stages selected.");
        return Ok(());
    }

    let mut config = tile_anomaly_config::embedded();
    let has_score = selected
        .iter()
        .any(|&i| matches!(Stage::ALL[i], Stage::Score));

    if has_score
        && Confirm::new()
            .with_prompt("Configure scorer options?")
            .default(false)
            .interact()?
    {
        prompt_scorer_options(&mut config)?;
    }

    let total_steps = selected.len();
    for (n, &i) in selected.iter().enumerate() {
        let stage = Stage::ALL[i];
        log::info!("[{}/{total_steps}] {}...", n + 1, stage.label());

        if let Err(e) = execute(stage, &config, multi) {
            log::error!("{} failed: {e}", stage.label());
            if !ask_continue()? {
                return Ok(());
            }
        }
    }

    let elapsed = pipeline_start.elapsed();
    log::info!("Pipeline complete in {:.1}s", elapsed.as_secs_f64());

    Ok(())
}

/// Runs a single stage with the default configuration.
///
/// # Errors
///
/// Returns an error if the stage fails.
pub fn run_stage(stage: Stage, multi: &MultiProgress) -> Result<(), Box<dyn std::error::Error>> {
    execute(stage, &tile_anomaly_config::embedded(), multi)
}

fn execute(
    stage: Stage,
    config: &PipelineConfig,
    multi: &MultiProgress,
) -> Result<(), Box<dyn std::error::Error>> {
    match stage {
        Stage::GeoFilter => {
            let output = paths::city_tiles_path();
            let progress = IndicatifProgress::centroids(multi);
            let summary = tile_anomaly_geo_filter::run(
                &paths::raw_tiles_path(),
                &output,
                &config.bbox,
                &progress,
            )?;
            println!(
                "Kept {} of {} tiles -> {}",
                summary.kept,
                summary.read,
                output.display()
            );
        }
        Stage::Score => {
            let output = paths::anomalies_ranked_path();
            let progress = IndicatifProgress::trees(multi, config.scorer.n_estimators);
            let outcome = tile_anomaly_scorer::run(
                &paths::city_tiles_path(),
                &output,
                &config.scorer,
                &progress,
            )?;
            println!(
                "Flagged {} of {} tiles -> {}",
                outcome.flagged(),
                outcome.tiles.len(),
                output.display()
            );
        }
        Stage::Label => {
            let output = paths::indicators_path();
            tile_anomaly_labeler::run(
                LabelMode::Snapshot,
                &paths::anomalies_ranked_path(),
                &output,
                config,
            )?;
            println!("Wrote: {}", output.display());
        }
        Stage::Report => {
            let report = tile_anomaly_report::run(&paths::indicators_path(), config.report.top_n)?;
            print!("{}", report.table);
        }
    }

    Ok(())
}

fn prompt_scorer_options(config: &mut PipelineConfig) -> Result<(), Box<dyn std::error::Error>> {
    let contamination: String = Input::new()
        .with_prompt("Contamination (0, 0.5]")
        .default(config.scorer.contamination.to_string())
        .interact_text()?;
    config.scorer.contamination = contamination.trim().parse()?;

    let trees: String = Input::new()
        .with_prompt("Number of trees")
        .default(config.scorer.n_estimators.to_string())
        .interact_text()?;
    config.scorer.n_estimators = trees.trim().parse()?;

    let seed: String = Input::new()
        .with_prompt("Random seed")
        .default(config.scorer.seed.to_string())
        .interact_text()?;
    config.scorer.seed = seed.trim().parse()?;

    let policies = [NullPolicy::Reject, NullPolicy::ImputeMedian];
    let policy_labels = ["Reject rows with missing KPIs", "Impute column median"];
    let idx = Select::new()
        .with_prompt("Missing feature handling")
        .items(&policy_labels)
        .default(0)
        .interact()?;
    config.scorer.null_policy = policies[idx];

    config.validate()?;
    Ok(())
}

/// Asks the user whether to continue after an error.
fn ask_continue() -> Result<bool, Box<dyn std::error::Error>> {
    Ok(Confirm::new()
        .with_prompt("Continue to next stage?")
        .default(true)
        .interact()?)
}
