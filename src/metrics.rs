use chrono::{DateTime, Duration, Utc};
use tracing::debug;

use crate::error::DataQualityIssue;
use crate::models::{BiomarkerType, MetricValue, PatientStatistics, MINUTES_PER_DAY};

/// Scalars derived from, or passed through from, upstream statistics
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DerivedMetrics {
    pub cgm_active_percent: MetricValue,
    pub average: MetricValue,
    pub standard_deviation: MetricValue,
    pub coefficient_of_variation_percentage: MetricValue,
    pub a1c: Option<MetricValue>,
    pub gmi: Option<MetricValue>,
}

/// Range rule applied to an externally computed scalar
#[derive(Debug, Clone, Copy, PartialEq)]
enum ScalarRule {
    /// Finite and `>= 0`
    NonNegative,
    /// Finite, `> 0` and `<= 100`
    Percentage,
}

impl ScalarRule {
    fn accepts(&self, value: f64) -> bool {
        match self {
            ScalarRule::NonNegative => value.is_finite() && value >= 0.0,
            ScalarRule::Percentage => value.is_finite() && value > 0.0 && value <= 100.0,
        }
    }
}

/// Wear-time coverage and pass-through metric validation
pub struct MetricsCalculator;

impl MetricsCalculator {
    /// Number of calendar days the window spans, rounded up
    pub fn period_days(start_at: DateTime<Utc>, end_at: DateTime<Utc>) -> Option<i64> {
        let span = end_at - start_at;
        if span <= Duration::zero() {
            return None;
        }
        let whole = span.num_days();
        Some(if span > Duration::days(whole) { whole + 1 } else { whole })
    }

    /// `totalWearTimeMinutes / (ceil(days) × 1440) × 100`, rounded and capped at 100
    ///
    /// Unavailable when the window is empty or inverted, or when wear time is
    /// NaN or negative.
    pub fn active_percent(
        start_at: DateTime<Utc>,
        end_at: DateTime<Utc>,
        total_wear_time_minutes: f64,
    ) -> MetricValue {
        let Some(days) = Self::period_days(start_at, end_at) else {
            return MetricValue::Unavailable;
        };
        if !ScalarRule::NonNegative.accepts(total_wear_time_minutes) {
            return MetricValue::Unavailable;
        }

        let denominator = days as f64 * MINUTES_PER_DAY;
        if denominator <= 0.0 {
            return MetricValue::Unavailable;
        }
        let percent = (total_wear_time_minutes / denominator * 100.0).round();
        MetricValue::Available(percent.min(100.0))
    }

    /// Derive every scalar for one report, collecting data-quality issues
    pub fn compute(
        biomarker: BiomarkerType,
        start_at: Option<DateTime<Utc>>,
        end_at: Option<DateTime<Utc>>,
        stats: &PatientStatistics,
    ) -> (DerivedMetrics, Vec<DataQualityIssue>) {
        let mut issues = Vec::new();

        let cgm_active_percent = match (start_at, end_at) {
            (Some(start), Some(end)) if end > start => {
                match stats.total_wear_time_minutes {
                    // no wear time reported means no coverage
                    None => MetricValue::Available(0.0),
                    Some(minutes) => {
                        let value = Self::active_percent(start, end, minutes);
                        if !value.is_available() {
                            issues.push(invalid_scalar("totalWearTimeMinutes", minutes));
                        }
                        value
                    }
                }
            }
            (start, end) => {
                issues.push(DataQualityIssue::TemporalInconsistency {
                    start_at: describe_instant(start),
                    end_at: describe_instant(end),
                });
                MetricValue::Unavailable
            }
        };

        let mut checked = |field: &str, value: Option<f64>, rule: ScalarRule| match value {
            None => MetricValue::Unavailable,
            Some(v) if rule.accepts(v) => MetricValue::Available(v),
            Some(v) => {
                issues.push(invalid_scalar(field, v));
                MetricValue::Unavailable
            }
        };

        let average = checked("average", stats.average, ScalarRule::NonNegative);
        let standard_deviation = checked(
            "standardDeviation",
            stats.standard_deviation,
            ScalarRule::NonNegative,
        );
        let coefficient_of_variation_percentage = checked(
            "coefficientOfVariationPercentage",
            stats.coefficient_of_variation_percentage,
            ScalarRule::NonNegative,
        );
        let (a1c, gmi) = if biomarker.has_glycemic_estimates() {
            (
                Some(checked("a1c", stats.a1c, ScalarRule::Percentage)),
                Some(checked("gmi", stats.gmi, ScalarRule::Percentage)),
            )
        } else {
            (None, None)
        };

        let metrics = DerivedMetrics {
            cgm_active_percent,
            average,
            standard_deviation,
            coefficient_of_variation_percentage,
            a1c,
            gmi,
        };
        debug!(?metrics, "derived metrics");
        (metrics, issues)
    }
}

fn invalid_scalar(field: &str, value: f64) -> DataQualityIssue {
    DataQualityIssue::InvalidScalar {
        field: field.to_string(),
        value: value.to_string(),
    }
}

fn describe_instant(instant: Option<DateTime<Utc>>) -> String {
    instant
        .map(|t| t.to_rfc3339())
        .unwrap_or_else(|| "missing".to_string())
}
