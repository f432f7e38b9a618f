use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;

use crate::error::{AgpError, ContractError, DataQualityIssue};

/// Hourly slots in an ambulatory profile day
pub const HOURS_PER_DAY: usize = 24;

/// Minutes in one day, used for wear-time and time-in-range conversions
pub const MINUTES_PER_DAY: f64 = 1440.0;

/// Biomarkers the profile engine understands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BiomarkerType {
    Glucose,
    Cortisol,
}

impl BiomarkerType {
    pub const ALL: [BiomarkerType; 2] = [BiomarkerType::Glucose, BiomarkerType::Cortisol];

    /// A1C and GMI only exist for glucose
    pub fn has_glycemic_estimates(&self) -> bool {
        matches!(self, BiomarkerType::Glucose)
    }
}

impl fmt::Display for BiomarkerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BiomarkerType::Glucose => write!(f, "glucose"),
            BiomarkerType::Cortisol => write!(f, "cortisol"),
        }
    }
}

impl std::str::FromStr for BiomarkerType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "glucose" | "cgm" => Ok(BiomarkerType::Glucose),
            "cortisol" | "acm" => Ok(BiomarkerType::Cortisol),
            _ => Err(format!("Invalid biomarker type: {}", s)),
        }
    }
}

/// Raw instantaneous sensor measurement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reading {
    pub timestamp: DateTime<Utc>,
    pub value: f64,
    pub sensor_id: String,
}

/// Percentile tracks of an ambulatory profile
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Percentile {
    P5,
    P25,
    P50,
    P75,
    P95,
}

impl Percentile {
    pub const ALL: [Percentile; 5] = [
        Percentile::P5,
        Percentile::P25,
        Percentile::P50,
        Percentile::P75,
        Percentile::P95,
    ];

    pub fn rank(&self) -> usize {
        match self {
            Percentile::P5 => 5,
            Percentile::P25 => 25,
            Percentile::P50 => 50,
            Percentile::P75 => 75,
            Percentile::P95 => 95,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Percentile::P5 => "p5",
            Percentile::P25 => "p25",
            Percentile::P50 => "p50",
            Percentile::P75 => "p75",
            Percentile::P95 => "p95",
        }
    }
}

/// One 24-hour percentile track; `None` means no reliable value for that hour
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PercentileTrack([Option<f64>; HOURS_PER_DAY]);

impl PercentileTrack {
    pub fn new(values: [Option<f64>; HOURS_PER_DAY]) -> Self {
        Self(values)
    }

    /// Track with no data in any hour
    pub fn empty() -> Self {
        Self([None; HOURS_PER_DAY])
    }

    /// Build from a caller-supplied slice; any length but 24 breaks the contract
    pub fn from_slice(name: &str, values: &[Option<f64>]) -> Result<Self, AgpError> {
        let array: [Option<f64>; HOURS_PER_DAY] =
            values.try_into().map_err(|_| ContractError::TrackLength {
                track: name.to_string(),
                expected: HOURS_PER_DAY,
                actual: values.len(),
            })?;
        Ok(Self(array))
    }

    pub fn values(&self) -> &[Option<f64>; HOURS_PER_DAY] {
        &self.0
    }

    pub fn get(&self, hour: usize) -> Option<f64> {
        self.0.get(hour).copied().flatten()
    }

    pub fn present_count(&self) -> usize {
        self.0.iter().filter(|v| v.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.present_count() == 0
    }
}

impl Default for PercentileTrack {
    fn default() -> Self {
        Self::empty()
    }
}

/// Five parallel hourly percentile tracks
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PercentileCurve {
    pub p5: PercentileTrack,
    pub p25: PercentileTrack,
    pub p50: PercentileTrack,
    pub p75: PercentileTrack,
    pub p95: PercentileTrack,
}

impl PercentileCurve {
    pub fn track(&self, percentile: Percentile) -> &PercentileTrack {
        match percentile {
            Percentile::P5 => &self.p5,
            Percentile::P25 => &self.p25,
            Percentile::P50 => &self.p50,
            Percentile::P75 => &self.p75,
            Percentile::P95 => &self.p95,
        }
    }

    pub fn track_mut(&mut self, percentile: Percentile) -> &mut PercentileTrack {
        match percentile {
            Percentile::P5 => &mut self.p5,
            Percentile::P25 => &mut self.p25,
            Percentile::P50 => &mut self.p50,
            Percentile::P75 => &mut self.p75,
            Percentile::P95 => &mut self.p95,
        }
    }
}

/// Named clinical bands, lowest to highest
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BandKind {
    VeryLow,
    Low,
    InRange,
    High,
    VeryHigh,
}

impl BandKind {
    pub const ALL: [BandKind; 5] = [
        BandKind::VeryLow,
        BandKind::Low,
        BandKind::InRange,
        BandKind::High,
        BandKind::VeryHigh,
    ];

    pub fn index(&self) -> usize {
        match self {
            BandKind::VeryLow => 0,
            BandKind::Low => 1,
            BandKind::InRange => 2,
            BandKind::High => 3,
            BandKind::VeryHigh => 4,
        }
    }
}

/// Name of the middle band: glucose uses "target", cortisol "normal"
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MiddleLabel {
    Target,
    Normal,
}

impl MiddleLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            MiddleLabel::Target => "target",
            MiddleLabel::Normal => "normal",
        }
    }
}

/// Half-open band `[min, max)`; `max == None` is unbounded
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RangeBand {
    pub min: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
}

impl RangeBand {
    pub fn new(min: f64, max: f64) -> Self {
        Self { min, max: Some(max) }
    }

    pub fn unbounded(min: f64) -> Self {
        Self { min, max: None }
    }

    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && self.max.map_or(true, |max| value < max)
    }
}

/// Reasons a threshold set is rejected
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ThresholdError {
    #[error("range payload is empty")]
    Empty,
    #[error("range payload is not an object")]
    NotAnObject,
    #[error("missing band {0}")]
    MissingBand(&'static str),
    #[error("both target and normal bands are present")]
    AmbiguousMiddle,
    #[error("band {band} has non-numeric {field}")]
    NonNumeric { band: String, field: &'static str },
    #[error("band {band} has non-finite bound")]
    NonFinite { band: String },
    #[error("band {band} has min {min} >= max {max}")]
    Inverted { band: String, min: f64, max: f64 },
    #[error("lowest band starts at {0}, expected 0")]
    FloorNotZero(f64),
    #[error("band {0} must have an upper bound")]
    Unbounded(String),
    #[error("gap or overlap between {lower} (max {max}) and {upper} (min {min})")]
    NotContiguous {
        lower: String,
        upper: String,
        max: f64,
        min: f64,
    },
}

/// Validated five-band threshold set that partitions `[0, ∞)`
///
/// Construction always validates, so a value of this type is always a
/// contiguous, gap-free partition.
#[derive(Debug, Clone, PartialEq)]
pub struct RangeThresholds {
    bands: [RangeBand; 5],
    middle_label: MiddleLabel,
}

impl RangeThresholds {
    pub fn new(bands: [RangeBand; 5], middle_label: MiddleLabel) -> Result<Self, ThresholdError> {
        let thresholds = Self {
            bands,
            middle_label,
        };
        thresholds.validate()?;
        Ok(thresholds)
    }

    fn validate(&self) -> Result<(), ThresholdError> {
        let first = &self.bands[0];
        if !first.min.is_finite() {
            return Err(ThresholdError::NonFinite {
                band: self.label(BandKind::VeryLow).to_string(),
            });
        }
        if first.min != 0.0 {
            return Err(ThresholdError::FloorNotZero(first.min));
        }

        for kind in BandKind::ALL {
            let band = self.band(kind);
            let label = self.label(kind).to_string();
            if !band.min.is_finite() || band.max.is_some_and(|max| !max.is_finite()) {
                return Err(ThresholdError::NonFinite { band: label });
            }
            match band.max {
                Some(max) if band.min >= max => {
                    return Err(ThresholdError::Inverted {
                        band: label,
                        min: band.min,
                        max,
                    })
                }
                None if kind != BandKind::VeryHigh => return Err(ThresholdError::Unbounded(label)),
                _ => {}
            }
        }

        for pair in BandKind::ALL.windows(2) {
            let (lower, upper) = (self.band(pair[0]), self.band(pair[1]));
            // max is Some for every band below veryHigh, checked above
            let max = lower.max.unwrap_or(f64::INFINITY);
            if max != upper.min {
                return Err(ThresholdError::NotContiguous {
                    lower: self.label(pair[0]).to_string(),
                    upper: self.label(pair[1]).to_string(),
                    max,
                    min: upper.min,
                });
            }
        }
        Ok(())
    }

    pub fn band(&self, kind: BandKind) -> &RangeBand {
        &self.bands[kind.index()]
    }

    pub fn bands(&self) -> impl Iterator<Item = (BandKind, &RangeBand)> {
        BandKind::ALL.into_iter().zip(self.bands.iter())
    }

    pub fn middle_label(&self) -> MiddleLabel {
        self.middle_label
    }

    /// Payload/display label of a band
    pub fn label(&self, kind: BandKind) -> &'static str {
        match kind {
            BandKind::VeryLow => "veryLow",
            BandKind::Low => "low",
            BandKind::InRange => self.middle_label.as_str(),
            BandKind::High => "high",
            BandKind::VeryHigh => "veryHigh",
        }
    }

    /// Band a single value falls into
    pub fn classify_value(&self, value: f64) -> Option<BandKind> {
        self.bands()
            .find(|(kind, band)| band.contains(value) || (*kind == BandKind::VeryHigh && value >= band.min))
            .map(|(kind, _)| kind)
    }

    pub fn is_contiguous(&self) -> bool {
        self.bands
            .windows(2)
            .all(|pair| pair[0].max == Some(pair[1].min))
    }
}

impl TryFrom<BTreeMap<String, RangeBand>> for RangeThresholds {
    type Error = ThresholdError;

    fn try_from(mut map: BTreeMap<String, RangeBand>) -> Result<Self, Self::Error> {
        if map.is_empty() {
            return Err(ThresholdError::Empty);
        }
        let middle_label = match (map.contains_key("target"), map.contains_key("normal")) {
            (true, true) => return Err(ThresholdError::AmbiguousMiddle),
            (false, true) => MiddleLabel::Normal,
            _ => MiddleLabel::Target,
        };
        let mut take = |key: &'static str| map.remove(key).ok_or(ThresholdError::MissingBand(key));
        let bands = [
            take("veryLow")?,
            take("low")?,
            take(middle_label.as_str())?,
            take("high")?,
            take("veryHigh")?,
        ];
        RangeThresholds::new(bands, middle_label)
    }
}

impl From<&RangeThresholds> for BTreeMap<String, RangeBand> {
    fn from(thresholds: &RangeThresholds) -> Self {
        thresholds
            .bands()
            .map(|(kind, band)| (thresholds.label(kind).to_string(), *band))
            .collect()
    }
}

impl Serialize for RangeThresholds {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        BTreeMap::<String, RangeBand>::from(self).serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for RangeThresholds {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let map = BTreeMap::<String, RangeBand>::deserialize(deserializer)?;
        RangeThresholds::try_from(map).map_err(serde::de::Error::custom)
    }
}

/// Provenance of the thresholds a report was computed against
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ThresholdSource {
    Default,
    Custom,
    /// Matched conditions in priority order; the first one supplied the thresholds
    ConditionAutoDetected { conditions: Vec<String> },
}

/// One cumulative statistic as delivered upstream
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum CumulativeStat {
    Below { threshold: f64, percent: f64 },
    Between { lower: f64, upper: f64, percent: f64 },
    Above { threshold: f64, percent: f64 },
}

/// Per-patient statistics computed upstream over the report window
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatientStatistics {
    pub average: Option<f64>,
    pub standard_deviation: Option<f64>,
    pub coefficient_of_variation_percentage: Option<f64>,
    pub a1c: Option<f64>,
    pub gmi: Option<f64>,
    pub total_wear_time_minutes: Option<f64>,
    pub cumulative: Vec<CumulativeStat>,
    pub band_minutes: BTreeMap<BandKind, f64>,
}

fn same_threshold(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-9
}

impl PatientStatistics {
    pub fn is_empty(&self) -> bool {
        self.average.is_none()
            && self.standard_deviation.is_none()
            && self.coefficient_of_variation_percentage.is_none()
            && self.a1c.is_none()
            && self.gmi.is_none()
            && self.total_wear_time_minutes.is_none()
            && self.cumulative.is_empty()
            && self.band_minutes.is_empty()
    }

    pub fn percent_below(&self, threshold: f64) -> Option<f64> {
        self.cumulative.iter().find_map(|stat| match *stat {
            CumulativeStat::Below { threshold: t, percent } if same_threshold(t, threshold) => {
                Some(percent)
            }
            _ => None,
        })
    }

    pub fn percent_above(&self, threshold: f64) -> Option<f64> {
        self.cumulative.iter().find_map(|stat| match *stat {
            CumulativeStat::Above { threshold: t, percent } if same_threshold(t, threshold) => {
                Some(percent)
            }
            _ => None,
        })
    }

    pub fn percent_between(&self, lower: f64, upper: f64) -> Option<f64> {
        self.cumulative.iter().find_map(|stat| match *stat {
            CumulativeStat::Between {
                lower: l,
                upper: u,
                percent,
            } if same_threshold(l, lower) && same_threshold(u, upper) => Some(percent),
            _ => None,
        })
    }

    pub fn minutes_for(&self, kind: BandKind) -> Option<f64> {
        self.band_minutes.get(&kind).copied()
    }
}

/// One classified band
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BandClassification {
    pub label: String,
    pub percentage: f64,
    pub minutes_per_day: f64,
}

impl BandClassification {
    /// Minutes per day as "1h 12m" / "45m"
    pub fn formatted_duration(&self) -> String {
        let total = self.minutes_per_day.max(0.0).round() as u64;
        let (hours, minutes) = (total / 60, total % 60);
        if hours == 0 {
            format!("{}m", minutes)
        } else {
            format!("{}h {}m", hours, minutes)
        }
    }
}

/// Five bands ordered from lowest to highest
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClassificationResult([BandClassification; 5]);

impl ClassificationResult {
    pub fn new(bands: [BandClassification; 5]) -> Self {
        Self(bands)
    }

    pub fn bands(&self) -> &[BandClassification; 5] {
        &self.0
    }

    pub fn band(&self, kind: BandKind) -> &BandClassification {
        &self.0[kind.index()]
    }

    pub fn percentages(&self) -> [f64; 5] {
        std::array::from_fn(|i| self.0[i].percentage)
    }

    /// Sum of band percentages; may differ from 100 when upstream cumulative
    /// statistics were computed against other thresholds
    pub fn total_percentage(&self) -> f64 {
        self.0.iter().map(|band| band.percentage).sum()
    }
}

/// Scalar that is either a usable number or explicitly unavailable
///
/// Serializes as a JSON number, or as the string `"unavailable"`.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum MetricValue {
    Available(f64),
    #[default]
    Unavailable,
}

impl MetricValue {
    pub const UNAVAILABLE_LABEL: &'static str = "unavailable";

    pub fn value(&self) -> Option<f64> {
        match self {
            MetricValue::Available(v) => Some(*v),
            MetricValue::Unavailable => None,
        }
    }

    pub fn is_available(&self) -> bool {
        matches!(self, MetricValue::Available(_))
    }
}

impl fmt::Display for MetricValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetricValue::Available(v) => match f.precision() {
                Some(p) => write!(f, "{:.*}", p, v),
                None => write!(f, "{}", v),
            },
            MetricValue::Unavailable => f.write_str(Self::UNAVAILABLE_LABEL),
        }
    }
}

impl Serialize for MetricValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            MetricValue::Available(v) => serializer.serialize_f64(*v),
            MetricValue::Unavailable => serializer.serialize_str(Self::UNAVAILABLE_LABEL),
        }
    }
}

impl<'de> Deserialize<'de> for MetricValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Number(f64),
            Text(String),
            Null(()),
        }

        match Repr::deserialize(deserializer)? {
            Repr::Number(v) => Ok(MetricValue::Available(v)),
            Repr::Text(s) if s == Self::UNAVAILABLE_LABEL => Ok(MetricValue::Unavailable),
            Repr::Text(s) => Err(serde::de::Error::custom(format!(
                "expected number or \"unavailable\", got {:?}",
                s
            ))),
            Repr::Null(()) => Ok(MetricValue::Unavailable),
        }
    }
}

/// Immutable ambulatory profile analytics for one request
///
/// Built only by the report assembler; exposes read-only accessors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsResult {
    pub(crate) biomarker: BiomarkerType,
    pub(crate) threshold_source: ThresholdSource,
    pub(crate) thresholds: RangeThresholds,
    pub(crate) range_bands: ClassificationResult,
    pub(crate) cleaned_percentiles: PercentileCurve,
    pub(crate) cgm_active_percent: MetricValue,
    pub(crate) average: MetricValue,
    pub(crate) standard_deviation: MetricValue,
    pub(crate) coefficient_of_variation_percentage: MetricValue,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) a1c: Option<MetricValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) gmi: Option<MetricValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) message: Option<String>,
    #[serde(default)]
    pub(crate) data_quality: Vec<DataQualityIssue>,
}

impl AnalyticsResult {
    pub fn biomarker(&self) -> BiomarkerType {
        self.biomarker
    }

    pub fn threshold_source(&self) -> &ThresholdSource {
        &self.threshold_source
    }

    pub fn thresholds(&self) -> &RangeThresholds {
        &self.thresholds
    }

    pub fn range_bands(&self) -> &ClassificationResult {
        &self.range_bands
    }

    pub fn cleaned_percentiles(&self) -> &PercentileCurve {
        &self.cleaned_percentiles
    }

    /// Sensor wear-time coverage; named after CGM but used for every biomarker
    pub fn cgm_active_percent(&self) -> MetricValue {
        self.cgm_active_percent
    }

    pub fn average(&self) -> MetricValue {
        self.average
    }

    pub fn standard_deviation(&self) -> MetricValue {
        self.standard_deviation
    }

    pub fn coefficient_of_variation_percentage(&self) -> MetricValue {
        self.coefficient_of_variation_percentage
    }

    pub fn a1c(&self) -> Option<MetricValue> {
        self.a1c
    }

    pub fn gmi(&self) -> Option<MetricValue> {
        self.gmi
    }

    /// Message passed through from the range configuration service
    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    pub fn data_quality(&self) -> &[DataQualityIssue] {
        &self.data_quality
    }
}
