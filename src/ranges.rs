//! Threshold resolution
//!
//! Tiers are tried in a fixed order: custom ranges, then the first detected
//! condition in configured priority order, then the biomarker default. A
//! tier that fails validation is skipped as a whole and recorded as a
//! data-quality issue; it is never partially applied.

use serde_json::Value;
use std::collections::BTreeMap;
use tracing::debug;

use crate::config::BiomarkerConfig;
use crate::error::DataQualityIssue;
use crate::models::{RangeBand, RangeThresholds, ThresholdError, ThresholdSource};

const BAND_KEYS: [&str; 6] = ["veryLow", "low", "target", "normal", "high", "veryHigh"];

/// Thresholds chosen for one request, with provenance
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedRanges {
    pub thresholds: RangeThresholds,
    pub source: ThresholdSource,
    pub issues: Vec<DataQualityIssue>,
}

/// Picks the active threshold set for a biomarker and patient
pub struct RangeResolver<'a> {
    config: &'a BiomarkerConfig,
}

impl<'a> RangeResolver<'a> {
    pub fn new(config: &'a BiomarkerConfig) -> Self {
        Self { config }
    }

    pub fn resolve(&self, custom_ranges: Option<&Value>, detected_conditions: &[String]) -> ResolvedRanges {
        let mut issues = Vec::new();

        if let Some(payload) = custom_ranges {
            match parse_custom_ranges(payload) {
                Ok(thresholds) => {
                    debug!("using custom ranges");
                    return ResolvedRanges {
                        thresholds,
                        source: ThresholdSource::Custom,
                        issues,
                    };
                }
                Err(reason) => {
                    debug!(%reason, "custom ranges rejected");
                    issues.push(DataQualityIssue::InvalidThresholdConfig {
                        tier: "custom".to_string(),
                        reason: reason.to_string(),
                    });
                }
            }
        }

        let matched = self.matched_conditions(detected_conditions);
        if let Some(first) = matched.first() {
            if let Some((_, thresholds)) = self.config.condition(first) {
                debug!(condition = %first, matched = ?matched, "using condition ranges");
                return ResolvedRanges {
                    thresholds: thresholds.clone(),
                    source: ThresholdSource::ConditionAutoDetected { conditions: matched },
                    issues,
                };
            }
        }

        debug!("using default ranges");
        ResolvedRanges {
            thresholds: self.config.default_ranges.clone(),
            source: ThresholdSource::Default,
            issues,
        }
    }

    /// Detected conditions that have thresholds, in configured priority order
    pub fn matched_conditions(&self, detected: &[String]) -> Vec<String> {
        let is_detected =
            |name: &str| detected.iter().any(|d| d.trim().eq_ignore_ascii_case(name));

        for name in detected {
            let known = self
                .config
                .condition_priority
                .iter()
                .any(|p| p.eq_ignore_ascii_case(name.trim()));
            if !known {
                debug!(condition = %name, "detected condition has no configured priority, ignoring");
            }
        }

        self.config
            .condition_priority
            .iter()
            .filter(|name| is_detected(name.as_str()))
            .filter_map(|name| self.config.condition(name).map(|(key, _)| key.to_string()))
            .collect()
    }
}

/// Validate a custom range payload into a full threshold set
pub fn parse_custom_ranges(payload: &Value) -> Result<RangeThresholds, ThresholdError> {
    let object = payload.as_object().ok_or(ThresholdError::NotAnObject)?;
    if object.is_empty() {
        return Err(ThresholdError::Empty);
    }

    let mut bands = BTreeMap::new();
    for key in BAND_KEYS {
        let Some(band) = object.get(key) else {
            continue;
        };
        let bound = |field: &'static str| -> Result<Option<f64>, ThresholdError> {
            match band.get(field) {
                None | Some(Value::Null) => Ok(None),
                Some(Value::Number(n)) => Ok(n.as_f64()),
                Some(_) => Err(ThresholdError::NonNumeric {
                    band: key.to_string(),
                    field,
                }),
            }
        };
        let min = bound("min")?.ok_or(ThresholdError::NonNumeric {
            band: key.to_string(),
            field: "min",
        })?;
        let max = bound("max")?;
        bands.insert(key.to_string(), RangeBand { min, max });
    }

    RangeThresholds::try_from(bands)
}
