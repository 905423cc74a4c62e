#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Pipeline configuration.
//!
//! The defaults live in `pipeline.toml`, which is baked into the binaries
//! via [`include_str!`]. Each stage accepts an optional override file with
//! the same layout; any section or key it omits keeps its default value.

use std::path::Path;

use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};
use tile_anomaly_tile_models::{BoundingBox, InvalidBoundingBoxError};

/// Default configuration embedded at compile time.
const DEFAULT_PIPELINE_TOML: &str = include_str!("../pipeline.toml");

/// Approximate Madrid city area.
pub const DEFAULT_BBOX: BoundingBox = BoundingBox {
    lon_min: -3.90,
    lat_min: 40.30,
    lon_max: -3.50,
    lat_max: 40.55,
};

pub const DEFAULT_CONTAMINATION: f64 = 0.02;
pub const DEFAULT_N_ESTIMATORS: usize = 400;
pub const DEFAULT_MAX_SAMPLES: usize = 256;
pub const DEFAULT_SEED: u64 = 42;

pub const LATENCY_HIGH_MS: f64 = 80.0;
pub const DOWNLINK_LOW_KBPS: f64 = 5_000.0;
pub const UPLINK_LOW_KBPS: f64 = 1_000.0;
pub const TESTS_LOW: f64 = 5.0;

pub const LATENCY_DEGRADATION_MS: f64 = 20.0;
pub const DOWNLINK_DEGRADATION_KBPS: f64 = -5_000.0;
pub const UPLINK_DEGRADATION_KBPS: f64 = -1_000.0;

pub const DEFAULT_REPORT_TOP_N: usize = 15;

/// Errors that can occur while loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Reading the override file failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The override file is not valid TOML for [`PipelineConfig`].
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// The configured bounding box is unusable.
    #[error(transparent)]
    BoundingBox(#[from] InvalidBoundingBoxError),

    /// A value is outside its allowed range.
    #[error("Invalid config value for {key}: {message}")]
    Invalid {
        /// Dotted key path (e.g. `scorer.contamination`).
        key: &'static str,
        /// Description of what went wrong.
        message: String,
    },
}

/// How the scorer handles a missing feature value.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum NullPolicy {
    /// Drop the row from the batch (logged).
    #[default]
    Reject,
    /// Replace the missing value with the feature's batch median.
    ImputeMedian,
}

/// Isolation forest parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScorerConfig {
    /// Expected fraction of anomalous rows, in `(0, 0.5]`.
    pub contamination: f64,
    /// Number of trees in the ensemble.
    pub n_estimators: usize,
    /// Rows sub-sampled per tree (capped at the batch size).
    pub max_samples: usize,
    pub seed: u64,
    pub null_policy: NullPolicy,
}

impl Default for ScorerConfig {
    fn default() -> Self {
        Self {
            contamination: DEFAULT_CONTAMINATION,
            n_estimators: DEFAULT_N_ESTIMATORS,
            max_samples: DEFAULT_MAX_SAMPLES,
            seed: DEFAULT_SEED,
            null_policy: NullPolicy::Reject,
        }
    }
}

/// Absolute KPI cutoffs for snapshot indicators.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SnapshotThresholds {
    /// Latency at or above this is "high".
    pub latency_high_ms: f64,
    /// Downlink at or below this is "low".
    pub downlink_low_kbps: f64,
    /// Uplink at or below this is "low".
    pub uplink_low_kbps: f64,
    /// Test counts strictly below this are "low".
    pub tests_low: f64,
}

impl Default for SnapshotThresholds {
    fn default() -> Self {
        Self {
            latency_high_ms: LATENCY_HIGH_MS,
            downlink_low_kbps: DOWNLINK_LOW_KBPS,
            uplink_low_kbps: UPLINK_LOW_KBPS,
            tests_low: TESTS_LOW,
        }
    }
}

/// Period-over-period delta cutoffs for degradation indicators.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DegradationThresholds {
    /// Latency increase at or above this is a degradation.
    pub latency_delta_ms: f64,
    /// Downlink change at or below this (negative) is a degradation.
    pub downlink_delta_kbps: f64,
    /// Uplink change at or below this (negative) is a degradation.
    pub uplink_delta_kbps: f64,
}

impl Default for DegradationThresholds {
    fn default() -> Self {
        Self {
            latency_delta_ms: LATENCY_DEGRADATION_MS,
            downlink_delta_kbps: DOWNLINK_DEGRADATION_KBPS,
            uplink_delta_kbps: UPLINK_DEGRADATION_KBPS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    /// Number of rows rendered.
    pub top_n: usize,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            top_n: DEFAULT_REPORT_TOP_N,
        }
    }
}

/// Complete configuration for all pipeline stages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub bbox: BoundingBox,
    pub scorer: ScorerConfig,
    pub snapshot: SnapshotThresholds,
    pub degradation: DegradationThresholds,
    pub report: ReportConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            bbox: DEFAULT_BBOX,
            scorer: ScorerConfig::default(),
            snapshot: SnapshotThresholds::default(),
            degradation: DegradationThresholds::default(),
            report: ReportConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Parses and validates a TOML document.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the TOML is malformed or a value is out of
    /// range.
    pub fn from_toml_str(toml_str: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::de::from_str(toml_str)?;
        config.validate()?;
        Ok(config)
    }

    /// Loads the override file at `path`, or the embedded defaults when
    /// `path` is `None`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file cannot be read or is invalid.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let Some(path) = path else {
            return Ok(embedded());
        };

        log::info!("Loading pipeline config from {}", path.display());
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    /// Checks value ranges that serde cannot express.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] naming the first offending key.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.bbox.validate()?;

        let contamination = self.scorer.contamination;
        if !(contamination > 0.0 && contamination <= 0.5) {
            return Err(ConfigError::Invalid {
                key: "scorer.contamination",
                message: format!("{contamination} is outside (0, 0.5]"),
            });
        }
        if self.scorer.n_estimators == 0 {
            return Err(ConfigError::Invalid {
                key: "scorer.n_estimators",
                message: "must be at least 1".to_string(),
            });
        }
        if self.scorer.max_samples == 0 {
            return Err(ConfigError::Invalid {
                key: "scorer.max_samples",
                message: "must be at least 1".to_string(),
            });
        }
        if self.report.top_n == 0 {
            return Err(ConfigError::Invalid {
                key: "report.top_n",
                message: "must be at least 1".to_string(),
            });
        }

        Ok(())
    }
}

/// Returns the configuration embedded at compile time.
///
/// # Panics
///
/// Panics if the embedded `pipeline.toml` is malformed (this is a
/// compile-time guarantee since the file is embedded and covered by tests).
#[must_use]
pub fn embedded() -> PipelineConfig {
    PipelineConfig::from_toml_str(DEFAULT_PIPELINE_TOML)
        .unwrap_or_else(|e| panic!("Failed to parse embedded pipeline.toml: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embedded_matches_named_defaults() {
        assert_eq!(embedded(), PipelineConfig::default());
    }

    #[test]
    fn partial_override_keeps_other_defaults() {
        let config = PipelineConfig::from_toml_str(
            "[scorer]\ncontamination = 0.05\n\n[snapshot]\nlatency_high_ms = 100.0\n",
        )
        .unwrap();
        assert!((config.scorer.contamination - 0.05).abs() < f64::EPSILON);
        assert_eq!(config.scorer.n_estimators, DEFAULT_N_ESTIMATORS);
        assert!((config.snapshot.latency_high_ms - 100.0).abs() < f64::EPSILON);
        assert!((config.snapshot.tests_low - TESTS_LOW).abs() < f64::EPSILON);
        assert_eq!(config.bbox, DEFAULT_BBOX);
    }

    #[test]
    fn parses_null_policy() {
        let config =
            PipelineConfig::from_toml_str("[scorer]\nnull_policy = \"impute-median\"\n").unwrap();
        assert_eq!(config.scorer.null_policy, NullPolicy::ImputeMedian);
        assert_eq!("reject".parse::<NullPolicy>().unwrap(), NullPolicy::Reject);
        assert_eq!(NullPolicy::ImputeMedian.to_string(), "impute-median");
    }

    #[test]
    fn rejects_out_of_range_contamination() {
        let err = PipelineConfig::from_toml_str("[scorer]\ncontamination = 0.7\n").unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid {
                key: "scorer.contamination",
                ..
            }
        ));
    }

    #[test]
    fn rejects_inverted_bbox() {
        let err = PipelineConfig::from_toml_str(
            "[bbox]\nlon_min = 1.0\nlat_min = 0.0\nlon_max = 0.0\nlat_max = 1.0\n",
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::BoundingBox(_)));
    }

    #[test]
    fn loads_override_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pipeline.toml");
        std::fs::write(&path, "[report]\ntop_n = 5\n").unwrap();

        let config = PipelineConfig::load(Some(&path)).unwrap();
        assert_eq!(config.report.top_n, 5);
        assert_eq!(PipelineConfig::load(None).unwrap(), PipelineConfig::default());
    }
}
