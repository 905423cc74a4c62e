//! Score-based severity tiers.
//!
//! Tiers are relative to the batch: the 90th, 95th, and 99th percentiles of
//! the score column are computed once per file, so the top percent of any
//! input is always CRITICAL.

use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// Severity of a tile relative to the rest of its batch.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum Severity {
    /// Below the 90th percentile, or no score.
    Low,
    /// At or above the 90th percentile.
    Medium,
    /// At or above the 95th percentile.
    High,
    /// At or above the 99th percentile.
    Critical,
}

impl Severity {
    /// Indicator text for this tier.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Low => "Severity: LOW",
            Self::Medium => "Severity: MEDIUM (top 10%)",
            Self::High => "Severity: HIGH (top 5%)",
            Self::Critical => "Severity: CRITICAL (top 1%)",
        }
    }
}

/// Percentile cutoffs for one batch of scores.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SeverityTiers {
    pub p90: f64,
    pub p95: f64,
    pub p99: f64,
}

impl SeverityTiers {
    /// Computes the cutoffs from every present score in the batch.
    ///
    /// Returns `None` when no score is present.
    #[must_use]
    pub fn from_scores(scores: &[Option<f64>]) -> Option<Self> {
        let present: Vec<f64> = scores.iter().flatten().copied().collect();
        let cutoffs = tile_anomaly_stats::quantiles(&present, &[0.90, 0.95, 0.99])?;

        Some(Self {
            p90: cutoffs[0],
            p95: cutoffs[1],
            p99: cutoffs[2],
        })
    }

    /// Tier for a single score. A missing score is [`Severity::Low`].
    #[must_use]
    pub fn classify(&self, score: Option<f64>) -> Severity {
        match score {
            Some(s) if s >= self.p99 => Severity::Critical,
            Some(s) if s >= self.p95 => Severity::High,
            Some(s) if s >= self.p90 => Severity::Medium,
            _ => Severity::Low,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[allow(clippy::cast_precision_loss)]
    fn ramp(n: usize) -> Vec<Option<f64>> {
        (0..n).map(|i| Some(i as f64)).collect()
    }

    #[test]
    fn cutoffs_are_linear_percentiles() {
        let tiers = SeverityTiers::from_scores(&ramp(101)).unwrap();
        assert!((tiers.p90 - 90.0).abs() < 1e-9);
        assert!((tiers.p95 - 95.0).abs() < 1e-9);
        assert!((tiers.p99 - 99.0).abs() < 1e-9);
    }

    #[test]
    fn classify_boundaries_are_inclusive() {
        let tiers = SeverityTiers {
            p90: 0.1,
            p95: 0.2,
            p99: 0.3,
        };
        assert_eq!(tiers.classify(Some(0.3)), Severity::Critical);
        assert_eq!(tiers.classify(Some(0.2)), Severity::High);
        assert_eq!(tiers.classify(Some(0.1)), Severity::Medium);
        assert_eq!(tiers.classify(Some(0.099)), Severity::Low);
        assert_eq!(tiers.classify(None), Severity::Low);
    }

    #[test]
    fn severity_is_monotonic_in_score() {
        let scores = ramp(500);
        let tiers = SeverityTiers::from_scores(&scores).unwrap();
        let ranks: Vec<Severity> = scores.iter().map(|s| tiers.classify(*s)).collect();
        assert!(ranks.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(ranks[0], Severity::Low);
        assert_eq!(ranks[499], Severity::Critical);
    }

    #[test]
    fn missing_scores_are_ignored_for_cutoffs() {
        let mut scores = ramp(101);
        scores.push(None);
        let tiers = SeverityTiers::from_scores(&scores).unwrap();
        assert!((tiers.p99 - 99.0).abs() < 1e-9);
        assert_eq!(SeverityTiers::from_scores(&[None, None]), None);
    }

    #[test]
    fn labels() {
        assert_eq!(Severity::Critical.label(), "Severity: CRITICAL (top 1%)");
        assert_eq!(Severity::Low.label(), "Severity: LOW");
        assert_eq!(Severity::High.to_string(), "HIGH");
    }
}
