//! Threshold rules for KPI indicators.
//!
//! Both labeling modes are expressed as an ordered list of
//! [`ThresholdRule`]s; the order of the list is the order in which issues
//! appear in the indicator text.

use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};
use tile_anomaly_config::{DegradationThresholds, SnapshotThresholds};
use tile_anomaly_tile_models::{
    COL_ANOMALY_SCORE, COL_AVG_D_KBPS, COL_AVG_LAT_MS, COL_AVG_U_KBPS, COL_D_AVG_D_KBPS,
    COL_D_AVG_LAT_MS, COL_D_AVG_U_KBPS, COL_DEGRADATION_SCORE, COL_TESTS,
};

/// How a KPI value is compared against its threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    /// `value >= threshold`
    AtLeast,
    /// `value <= threshold`
    AtMost,
    /// `value < threshold`
    LessThan,
}

impl Comparison {
    #[must_use]
    pub fn holds(self, value: f64, threshold: f64) -> bool {
        match self {
            Self::AtLeast => value >= threshold,
            Self::AtMost => value <= threshold,
            Self::LessThan => value < threshold,
        }
    }
}

/// One KPI check: if `column` compares true against `threshold`, the tile
/// gets `label`.
#[derive(Debug, Clone, PartialEq)]
pub struct ThresholdRule {
    pub column: &'static str,
    pub comparison: Comparison,
    pub threshold: f64,
    pub label: String,
}

impl ThresholdRule {
    /// Whether the rule fires for `value`. A missing value never fires.
    #[must_use]
    pub fn fires(&self, value: Option<f64>) -> bool {
        value.is_some_and(|v| self.comparison.holds(v, self.threshold))
    }
}

/// Which scorer output is being labeled.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum LabelMode {
    /// Absolute KPIs from a single period, scored by `anomaly_score`.
    #[default]
    Snapshot,
    /// Period-over-period KPI deltas, scored by `degradation_score`.
    Degradation,
}

impl LabelMode {
    /// Column whose quantiles drive the severity tier.
    #[must_use]
    pub const fn score_column(self) -> &'static str {
        match self {
            Self::Snapshot => COL_ANOMALY_SCORE,
            Self::Degradation => COL_DEGRADATION_SCORE,
        }
    }
}

/// Snapshot checks, in output order: latency, downlink, uplink, tests.
#[must_use]
pub fn snapshot_rules(t: &SnapshotThresholds) -> Vec<ThresholdRule> {
    vec![
        ThresholdRule {
            column: COL_AVG_LAT_MS,
            comparison: Comparison::AtLeast,
            threshold: t.latency_high_ms,
            label: format!("High latency (>= {}ms)", t.latency_high_ms),
        },
        ThresholdRule {
            column: COL_AVG_D_KBPS,
            comparison: Comparison::AtMost,
            threshold: t.downlink_low_kbps,
            label: format!("Low downlink (<= {:.1}Mbps)", t.downlink_low_kbps / 1000.0),
        },
        ThresholdRule {
            column: COL_AVG_U_KBPS,
            comparison: Comparison::AtMost,
            threshold: t.uplink_low_kbps,
            label: format!("Low uplink (<= {:.1}Mbps)", t.uplink_low_kbps / 1000.0),
        },
        ThresholdRule {
            column: COL_TESTS,
            comparison: Comparison::LessThan,
            threshold: t.tests_low,
            label: format!("Low sample count (tests < {})", t.tests_low),
        },
    ]
}

/// Degradation checks, in output order: latency, downlink, uplink deltas.
#[must_use]
pub fn degradation_rules(t: &DegradationThresholds) -> Vec<ThresholdRule> {
    vec![
        ThresholdRule {
            column: COL_D_AVG_LAT_MS,
            comparison: Comparison::AtLeast,
            threshold: t.latency_delta_ms,
            label: format!("Latency degradation (>= +{}ms)", t.latency_delta_ms),
        },
        ThresholdRule {
            column: COL_D_AVG_D_KBPS,
            comparison: Comparison::AtMost,
            threshold: t.downlink_delta_kbps,
            label: format!(
                "Downlink degradation (<= {}Mbps)",
                t.downlink_delta_kbps / 1000.0
            ),
        },
        ThresholdRule {
            column: COL_D_AVG_U_KBPS,
            comparison: Comparison::AtMost,
            threshold: t.uplink_delta_kbps,
            label: format!("Uplink degradation (<= {}Mbps)", t.uplink_delta_kbps / 1000.0),
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_labels_use_configured_thresholds() {
        let labels: Vec<String> = snapshot_rules(&SnapshotThresholds::default())
            .into_iter()
            .map(|r| r.label)
            .collect();
        assert_eq!(
            labels,
            [
                "High latency (>= 80ms)",
                "Low downlink (<= 5.0Mbps)",
                "Low uplink (<= 1.0Mbps)",
                "Low sample count (tests < 5)",
            ]
        );
    }

    #[test]
    fn degradation_labels_use_configured_thresholds() {
        let labels: Vec<String> = degradation_rules(&DegradationThresholds::default())
            .into_iter()
            .map(|r| r.label)
            .collect();
        assert_eq!(
            labels,
            [
                "Latency degradation (>= +20ms)",
                "Downlink degradation (<= -5Mbps)",
                "Uplink degradation (<= -1Mbps)",
            ]
        );
    }

    #[test]
    fn comparisons_are_inclusive_where_expected() {
        let rules = snapshot_rules(&SnapshotThresholds::default());
        assert!(rules[0].fires(Some(80.0)));
        assert!(!rules[0].fires(Some(79.9)));
        assert!(rules[1].fires(Some(5_000.0)));
        assert!(!rules[1].fires(Some(5_000.1)));
        assert!(!rules[3].fires(Some(5.0)));
        assert!(rules[3].fires(Some(4.0)));
        assert!(!rules[0].fires(None));
    }

    #[test]
    fn mode_parses_and_names_its_score_column() {
        assert_eq!("snapshot".parse::<LabelMode>().unwrap(), LabelMode::Snapshot);
        assert_eq!(
            "degradation".parse::<LabelMode>().unwrap(),
            LabelMode::Degradation
        );
        assert!("weekly".parse::<LabelMode>().is_err());
        assert_eq!(LabelMode::Degradation.score_column(), "degradation_score");
        assert_eq!(LabelMode::Snapshot.to_string(), "snapshot");
    }
}
