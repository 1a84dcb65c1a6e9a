//! Territory alert classification.

use serde::{Deserialize, Serialize};

#[cfg(feature = "typescript")]
use ts_rs::TS;

/// Stability below this value is critical.
pub const DEFAULT_CRITICAL_THRESHOLD: f64 = 30.0;

/// Alert state of a territory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AlertState {
    Normal,
    Critical,
}

impl AlertState {
    pub fn is_critical(&self) -> bool {
        matches!(self, Self::Critical)
    }
}

/// Classify a stability score against the default threshold.
pub fn classify(stability_score: f64) -> AlertState {
    classify_with_threshold(stability_score, DEFAULT_CRITICAL_THRESHOLD)
}

/// Classify a stability score: `score < threshold` is critical.
///
/// A NaN score is treated as critical.
pub fn classify_with_threshold(stability_score: f64, threshold: f64) -> AlertState {
    if stability_score >= threshold {
        AlertState::Normal
    } else {
        AlertState::Critical
    }
}

/// Display value for the circular health gauge, clamped to 0..=100.
pub fn gauge_value(health_score: f64) -> f64 {
    if health_score.is_nan() {
        return 0.0;
    }
    health_score.clamp(0.0, 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_threshold_boundary() {
        assert_eq!(classify(29.0), AlertState::Critical);
        assert_eq!(classify(29.999), AlertState::Critical);
        assert_eq!(classify(30.0), AlertState::Normal);
        assert_eq!(classify(100.0), AlertState::Normal);
        assert_eq!(classify(0.0), AlertState::Critical);
    }

    #[test]
    fn test_custom_threshold() {
        assert_eq!(classify_with_threshold(35.0, 40.0), AlertState::Critical);
        assert_eq!(classify_with_threshold(40.0, 40.0), AlertState::Normal);
    }

    #[test]
    fn test_nan_is_critical() {
        assert!(classify(f64::NAN).is_critical());
    }

    #[test]
    fn test_gauge_clamps() {
        assert_eq!(gauge_value(-5.0), 0.0);
        assert_eq!(gauge_value(42.5), 42.5);
        assert_eq!(gauge_value(180.0), 100.0);
        assert_eq!(gauge_value(f64::NAN), 0.0);
    }
}
