//! Payloads supplied by the external data-access collaborator
//!
//! The statistics section carries dynamically named cumulative fields
//! (`percentBelow54`, `percentBetween70And180`, `percentAbove250`, ...) and
//! per-band minute fields (`timeVeryLowMinutes`, ...). They are parsed into
//! `PatientStatistics` here so the rest of the pipeline never touches raw JSON.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use crate::error::{AgpError, ContractError, DataQualityIssue, Result};
use crate::models::{BandKind, CumulativeStat, PatientStatistics, PercentileCurve, PercentileTrack, Percentile};

/// Statistics and percentile curves for one patient and biomarker
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatientBiomarkerPayload {
    #[serde(default)]
    pub start_at: Option<DateTime<Utc>>,

    #[serde(default)]
    pub end_at: Option<DateTime<Utc>>,

    /// Kept as raw JSON because its cumulative keys are data-dependent
    #[serde(default)]
    pub statistics: Option<Value>,

    #[serde(default)]
    pub percentages: Option<PercentagesPayload>,
}

/// Raw hourly percentile arrays
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PercentagesPayload {
    #[serde(rename = "percentile_5", default)]
    pub p5: Option<Vec<Option<f64>>>,
    #[serde(rename = "percentile_25", default)]
    pub p25: Option<Vec<Option<f64>>>,
    #[serde(rename = "percentile_50", default)]
    pub p50: Option<Vec<Option<f64>>>,
    #[serde(rename = "percentile_75", default)]
    pub p75: Option<Vec<Option<f64>>>,
    #[serde(rename = "percentile_95", default)]
    pub p95: Option<Vec<Option<f64>>>,
}

impl PercentagesPayload {
    fn raw(&self, percentile: Percentile) -> Option<&Vec<Option<f64>>> {
        match percentile {
            Percentile::P5 => self.p5.as_ref(),
            Percentile::P25 => self.p25.as_ref(),
            Percentile::P50 => self.p50.as_ref(),
            Percentile::P75 => self.p75.as_ref(),
            Percentile::P95 => self.p95.as_ref(),
        }
    }

    /// Convert to a curve; a missing track is all-null, a wrong-length track is fatal
    pub fn to_curve(&self) -> Result<PercentileCurve> {
        let mut curve = PercentileCurve::default();
        for percentile in Percentile::ALL {
            if let Some(values) = self.raw(percentile) {
                *curve.track_mut(percentile) = PercentileTrack::from_slice(percentile.label(), values)?;
            }
        }
        Ok(curve)
    }
}

impl PatientBiomarkerPayload {
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn curve(&self) -> Result<PercentileCurve> {
        match &self.percentages {
            Some(percentages) => percentages.to_curve(),
            None => Ok(PercentileCurve::default()),
        }
    }

    /// Parse the statistics section, collecting per-field data-quality issues
    pub fn parse_statistics(&self) -> Result<(PatientStatistics, Vec<DataQualityIssue>)> {
        match &self.statistics {
            None | Some(Value::Null) => Ok((PatientStatistics::default(), Vec::new())),
            Some(Value::Object(map)) => Ok(statistics_from_map(map)),
            Some(_) => Err(AgpError::Contract(ContractError::WrongType {
                field: "statistics".to_string(),
                expected: "object".to_string(),
            })),
        }
    }
}

/// Threshold configuration from the external range service
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RangeConfigPayload {
    #[serde(default)]
    pub use_default: bool,

    /// Unvalidated band map; validated by the range resolver
    #[serde(default)]
    pub ranges: Option<Value>,

    #[serde(default)]
    pub configs_used: Option<Vec<String>>,

    #[serde(default)]
    pub message: Option<String>,
}

impl RangeConfigPayload {
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Custom ranges to try, unless the service asked for defaults
    pub fn custom_ranges(&self) -> Option<&Value> {
        if self.use_default {
            return None;
        }
        self.ranges.as_ref().filter(|value| !value.is_null())
    }

    pub fn conditions(&self) -> &[String] {
        self.configs_used.as_deref().unwrap_or(&[])
    }
}

const SCALAR_FIELDS: [&str; 6] = [
    "average",
    "standardDeviation",
    "coefficientOfVariationPercentage",
    "a1c",
    "gmi",
    "totalWearTimeMinutes",
];

fn statistics_from_map(map: &Map<String, Value>) -> (PatientStatistics, Vec<DataQualityIssue>) {
    let mut stats = PatientStatistics::default();
    let mut issues = Vec::new();

    for (key, value) in map {
        let number = match value {
            Value::Null => continue,
            Value::Number(n) => n.as_f64(),
            _ => None,
        };
        let Some(number) = number else {
            if SCALAR_FIELDS.contains(&key.as_str())
                || parse_cumulative_key(key, 0.0).is_some()
                || band_minutes_key(key).is_some()
            {
                issues.push(DataQualityIssue::InvalidScalar {
                    field: key.clone(),
                    value: value.to_string(),
                });
            }
            continue;
        };

        match key.as_str() {
            "average" => stats.average = Some(number),
            "standardDeviation" => stats.standard_deviation = Some(number),
            "coefficientOfVariationPercentage" => {
                stats.coefficient_of_variation_percentage = Some(number)
            }
            "a1c" => stats.a1c = Some(number),
            "gmi" => stats.gmi = Some(number),
            "totalWearTimeMinutes" => stats.total_wear_time_minutes = Some(number),
            other => {
                if let Some(stat) = parse_cumulative_key(other, number) {
                    stats.cumulative.push(stat);
                } else if let Some(kind) = band_minutes_key(other) {
                    stats.band_minutes.insert(kind, number);
                } else {
                    debug!(field = other, "ignoring unrecognised statistics field");
                }
            }
        }
    }

    (stats, issues)
}

fn parse_threshold(text: &str) -> Option<f64> {
    let value: f64 = text.replace('_', ".").parse().ok()?;
    value.is_finite().then_some(value)
}

/// Parse `percentBelow<T>`, `percentAbove<T>` and `percentBetween<T1>And<T2>`
pub fn parse_cumulative_key(key: &str, percent: f64) -> Option<CumulativeStat> {
    if let Some(rest) = key.strip_prefix("percentBelow") {
        return Some(CumulativeStat::Below {
            threshold: parse_threshold(rest)?,
            percent,
        });
    }
    if let Some(rest) = key.strip_prefix("percentAbove") {
        return Some(CumulativeStat::Above {
            threshold: parse_threshold(rest)?,
            percent,
        });
    }
    if let Some(rest) = key.strip_prefix("percentBetween") {
        let (lower, upper) = rest.split_once("And")?;
        return Some(CumulativeStat::Between {
            lower: parse_threshold(lower)?,
            upper: parse_threshold(upper)?,
            percent,
        });
    }
    None
}

/// Map `time<Band>Minutes` to its band
pub fn band_minutes_key(key: &str) -> Option<BandKind> {
    let band = key.strip_prefix("time")?.strip_suffix("Minutes")?;
    match band {
        "VeryLow" => Some(BandKind::VeryLow),
        "Low" => Some(BandKind::Low),
        "Target" | "Normal" | "InRange" => Some(BandKind::InRange),
        "High" => Some(BandKind::High),
        "VeryHigh" => Some(BandKind::VeryHigh),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_cumulative_key_parsing() {
        assert_eq!(
            parse_cumulative_key("percentBelow54", 2.0),
            Some(CumulativeStat::Below {
                threshold: 54.0,
                percent: 2.0
            })
        );
        assert_eq!(
            parse_cumulative_key("percentBetween70And180", 80.0),
            Some(CumulativeStat::Between {
                lower: 70.0,
                upper: 180.0,
                percent: 80.0
            })
        );
        assert_eq!(
            parse_cumulative_key("percentAbove2_5", 1.0),
            Some(CumulativeStat::Above {
                threshold: 2.5,
                percent: 1.0
            })
        );
        assert_eq!(parse_cumulative_key("percentBelow", 1.0), None);
        assert_eq!(parse_cumulative_key("percentBelowNaN", 1.0), None);
        assert_eq!(parse_cumulative_key("averageBelow54", 1.0), None);
    }

    #[test]
    fn test_band_minutes_keys() {
        assert_eq!(band_minutes_key("timeVeryLowMinutes"), Some(BandKind::VeryLow));
        assert_eq!(band_minutes_key("timeNormalMinutes"), Some(BandKind::InRange));
        assert_eq!(band_minutes_key("timeTargetMinutes"), Some(BandKind::InRange));
        assert_eq!(band_minutes_key("totalWearTimeMinutes"), None);
    }

    #[test]
    fn test_statistics_parsing() {
        let payload = PatientBiomarkerPayload {
            statistics: Some(json!({
                "average": 142.5,
                "standardDeviation": 40.1,
                "a1c": null,
                "gmi": "n/a",
                "totalWearTimeMinutes": 20000,
                "percentBelow54": 1.5,
                "percentBetween70And180": 72,
                "timeHighMinutes": 300,
                "patientName": "ignored"
            })),
            ..Default::default()
        };

        let (stats, issues) = payload.parse_statistics().unwrap();
        assert_eq!(stats.average, Some(142.5));
        assert_eq!(stats.a1c, None);
        assert_eq!(stats.gmi, None);
        assert_eq!(stats.total_wear_time_minutes, Some(20000.0));
        assert_eq!(stats.percent_below(54.0), Some(1.5));
        assert_eq!(stats.percent_between(70.0, 180.0), Some(72.0));
        assert_eq!(stats.minutes_for(BandKind::High), Some(300.0));
        assert_eq!(issues.len(), 1);
        assert!(matches!(
            &issues[0],
            DataQualityIssue::InvalidScalar { field, .. } if field == "gmi"
        ));
    }

    #[test]
    fn test_statistics_wrong_shape_is_contract_error() {
        let payload = PatientBiomarkerPayload {
            statistics: Some(json!([1, 2, 3])),
            ..Default::default()
        };
        assert!(matches!(
            payload.parse_statistics(),
            Err(AgpError::Contract(ContractError::WrongType { .. }))
        ));
    }

    #[test]
    fn test_payload_from_json() {
        let json = r#"{
            "startAt": "2024-01-01T00:00:00Z",
            "endAt": "2024-01-03T00:00:00Z",
            "statistics": {"average": 120},
            "percentages": {
                "percentile_50": [100,100,100,100,100,100,100,100,100,100,100,100,
                                  100,100,100,100,100,100,100,100,100,100,100,null]
            }
        }"#;
        let payload = PatientBiomarkerPayload::from_json_str(json).unwrap();
        let curve = payload.curve().unwrap();
        assert_eq!(curve.p50.present_count(), 23);
        assert!(curve.p5.is_empty());
    }

    #[test]
    fn test_short_track_is_contract_error() {
        let payload = PatientBiomarkerPayload {
            percentages: Some(PercentagesPayload {
                p95: Some(vec![Some(1.0); 12]),
                ..Default::default()
            }),
            ..Default::default()
        };
        assert!(matches!(
            payload.curve(),
            Err(AgpError::Contract(ContractError::TrackLength { actual: 12, .. }))
        ));
    }

    #[test]
    fn test_range_config_use_default_hides_ranges() {
        let config = RangeConfigPayload::from_json_str(
            r#"{"useDefault": true, "ranges": {"low": {"min": 0, "max": 70}}, "configsUsed": ["pregnancy"]}"#,
        )
        .unwrap();
        assert!(config.custom_ranges().is_none());
        assert_eq!(config.conditions(), ["pregnancy".to_string()]);

        let config = RangeConfigPayload::from_json_str(r#"{"useDefault": false, "ranges": null}"#).unwrap();
        assert!(config.custom_ranges().is_none());
        assert!(config.conditions().is_empty());
    }
}
