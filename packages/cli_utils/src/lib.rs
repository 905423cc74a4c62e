#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Shared CLI utilities for the tile anomaly pipeline.
//!
//! Provides `indicatif`-backed progress bars behind the [`ProgressCallback`]
//! trait, plus [`init_logger`] which sets up `indicatif-log-bridge` so that
//! `log::info!` and friends are suspended while progress bars redraw.

use std::sync::Arc;
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use tile_anomaly_io::progress::ProgressCallback;

pub use indicatif::MultiProgress;

/// Which stage a progress bar belongs to. Each stage has its own layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageBar {
    /// Geo filter: tile rows whose centroid has been computed. The row
    /// count is only known once the scan returns.
    Centroids,
    /// Scorer: isolation trees grown. Known up front.
    Trees,
}

impl StageBar {
    const fn message(self) -> &'static str {
        match self {
            Self::Centroids => "centroids",
            Self::Trees => "isolation forest",
        }
    }

    const fn template(self) -> &'static str {
        match self {
            Self::Centroids => {
                "  {msg:>16} {wide_bar:.cyan/dim} {human_pos}/{human_len} tiles ({per_sec}, {eta})"
            }
            Self::Trees => "  {msg:>16} {wide_bar:.green/dim} {pos}/{len} trees [{elapsed_precise}]",
        }
    }

    fn style(self) -> ProgressStyle {
        ProgressStyle::with_template(self.template())
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=> ")
    }
}

/// An `indicatif` [`ProgressBar`] that implements [`ProgressCallback`].
pub struct IndicatifProgress {
    bar: ProgressBar,
    stage: StageBar,
}

impl IndicatifProgress {
    /// Progress for the geo filter. Spins while the tile file is scanned and
    /// becomes a bar once [`ProgressCallback::set_total()`] is called.
    #[must_use]
    pub fn centroids(multi: &MultiProgress) -> Arc<dyn ProgressCallback> {
        let bar = multi.add(ProgressBar::new_spinner());
        bar.enable_steady_tick(Duration::from_millis(100));
        bar.set_style(
            ProgressStyle::with_template("{spinner:.cyan} Scanning tiles...")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );

        Arc::new(Self::wrap(bar, StageBar::Centroids))
    }

    /// Progress for the scorer, one tick per tree grown.
    #[must_use]
    pub fn trees(multi: &MultiProgress, n_trees: usize) -> Arc<dyn ProgressCallback> {
        let bar = multi.add(ProgressBar::new(n_trees as u64));
        bar.set_style(StageBar::Trees.style());

        Arc::new(Self::wrap(bar, StageBar::Trees))
    }

    fn wrap(bar: ProgressBar, stage: StageBar) -> Self {
        bar.set_message(stage.message());
        Self { bar, stage }
    }
}

impl ProgressCallback for IndicatifProgress {
    fn set_total(&self, total: u64) {
        self.bar.disable_steady_tick();
        self.bar.set_length(total);
        self.bar.set_position(0);
        self.bar.set_style(self.stage.style());
    }

    fn inc(&self, delta: u64) {
        self.bar.inc(delta);
    }

    fn set_message(&self, msg: String) {
        self.bar.set_message(msg);
    }

    fn finish(&self, msg: String) {
        if let Some(total) = self.bar.length() {
            self.bar.set_position(total);
        }
        self.bar.finish_with_message(msg);
    }
}

/// Initializes the global logger wrapped in `indicatif-log-bridge` so that
/// `log::info!` and friends are suspended while progress bars redraw.
///
/// Returns the [`MultiProgress`] that all progress bars must be added to.
#[must_use]
pub fn init_logger() -> MultiProgress {
    let multi = MultiProgress::new();

    let logger = pretty_env_logger::formatted_builder()
        .parse_env("RUST_LOG")
        .build();
    let level = logger.filter();

    indicatif_log_bridge::LogWrapper::new(multi.clone(), logger)
        .try_init()
        .ok(); // Ignore error if logger was already set (e.g., in tests)

    log::set_max_level(level);

    multi
}
