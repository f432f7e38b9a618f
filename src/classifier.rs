//! Time-in-range classification
//!
//! Upstream statistics are cumulative ("below X", "above Y", "between X and
//! Y"), so the five exclusive bands are derived by subtraction:
//!
//! - veryLow  = below(low.min)
//! - low      = below(inRange.min) - veryLow
//! - inRange  = between(inRange.min, inRange.max)
//! - high     = above(inRange.max) - above(high.max)
//! - veryHigh = above(high.max)
//!
//! The cumulative fields are not recomputed against the resolved thresholds,
//! so the five bands can sum to more or less than 100%. That is reported
//! as-is; `ClassificationResult::total_percentage` exposes the sum.

use tracing::debug;

use crate::models::{
    BandClassification, BandKind, ClassificationResult, PatientStatistics, RangeThresholds,
    MINUTES_PER_DAY,
};

/// Converts cumulative statistics into five named bands
pub struct RangeClassifier;

impl RangeClassifier {
    pub fn classify(stats: &PatientStatistics, thresholds: &RangeThresholds) -> ClassificationResult {
        let percentages = Self::band_percentages(stats, thresholds);

        let bands = BandKind::ALL.map(|kind| {
            let percentage = percentages[kind.index()];
            BandClassification {
                label: thresholds.label(kind).to_string(),
                percentage,
                minutes_per_day: Self::minutes_per_day(stats, kind, percentage),
            }
        });

        let result = ClassificationResult::new(bands);
        debug!(
            bands = ?result.percentages(),
            total = result.total_percentage(),
            "classified time in range"
        );
        result
    }

    /// Band percentages in band order, each clamped to `>= 0`; missing
    /// cumulative fields count as 0
    pub fn band_percentages(stats: &PatientStatistics, thresholds: &RangeThresholds) -> [f64; 5] {
        let low_min = thresholds.band(BandKind::Low).min;
        let in_range = thresholds.band(BandKind::InRange);
        let in_range_max = in_range.max.unwrap_or(f64::INFINITY);
        let high_max = thresholds.band(BandKind::High).max.unwrap_or(f64::INFINITY);

        let very_low = percent(stats.percent_below(low_min));
        let low = percent(stats.percent_below(in_range.min)) - very_low;
        let middle = percent(stats.percent_between(in_range.min, in_range_max));
        let very_high = percent(stats.percent_above(high_max));
        let high = percent(stats.percent_above(in_range_max)) - very_high;

        [very_low, low, middle, high, very_high].map(clamp_non_negative)
    }

    /// Authoritative per-band minutes when supplied, else derived from the percentage
    fn minutes_per_day(stats: &PatientStatistics, kind: BandKind, percentage: f64) -> f64 {
        match stats.minutes_for(kind) {
            Some(minutes) if minutes.is_finite() && minutes >= 0.0 => minutes,
            _ => percentage * MINUTES_PER_DAY / 100.0,
        }
    }
}

fn percent(value: Option<f64>) -> f64 {
    value.filter(|v| v.is_finite()).unwrap_or(0.0)
}

fn clamp_non_negative(value: f64) -> f64 {
    if value.is_finite() && value > 0.0 {
        value
    } else {
        0.0
    }
}
