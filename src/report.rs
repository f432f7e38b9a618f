//! Report assembly and the end-to-end pipeline
//!
//! `AmbulatoryProfileEngine::analyze` runs RangeResolver → ArtifactFilter →
//! RangeClassifier → MetricsCalculator → ReportAssembler. It is pure and
//! holds no per-request state, so one engine can serve many threads.

use tracing::{info, instrument};

use crate::artifact::{ArtifactFilter, FilterStats};
use crate::classifier::RangeClassifier;
use crate::config::EngineConfig;
use crate::error::{DataQualityIssue, Result};
use crate::metrics::{DerivedMetrics, MetricsCalculator};
use crate::models::{
    AnalyticsResult, BiomarkerType, ClassificationResult, Percentile, PercentileCurve,
};
use crate::payload::{PatientBiomarkerPayload, RangeConfigPayload};
use crate::ranges::{RangeResolver, ResolvedRanges};

/// Everything needed to build one report
#[derive(Debug, Clone, PartialEq)]
pub struct AnalyticsRequest {
    pub biomarker: BiomarkerType,
    pub payload: PatientBiomarkerPayload,
    pub range_config: Option<RangeConfigPayload>,
    pub detected_conditions: Vec<String>,
}

impl AnalyticsRequest {
    pub fn new(biomarker: BiomarkerType, payload: PatientBiomarkerPayload) -> Self {
        Self {
            biomarker,
            payload,
            range_config: None,
            detected_conditions: Vec::new(),
        }
    }

    pub fn with_range_config(mut self, range_config: RangeConfigPayload) -> Self {
        self.range_config = Some(range_config);
        self
    }

    pub fn with_conditions<I, S>(mut self, conditions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.detected_conditions.extend(conditions.into_iter().map(Into::into));
        self
    }

    /// Caller-detected conditions followed by those the range service used,
    /// first occurrence wins
    pub fn all_conditions(&self) -> Vec<String> {
        let from_service = self
            .range_config
            .as_ref()
            .map(|config| config.conditions())
            .unwrap_or(&[]);

        let mut merged: Vec<String> = Vec::new();
        for name in self.detected_conditions.iter().chain(from_service) {
            if !merged.iter().any(|m| m.eq_ignore_ascii_case(name)) {
                merged.push(name.clone());
            }
        }
        merged
    }
}

/// Outputs of the individual pipeline stages
#[derive(Debug, Clone)]
pub struct ReportParts {
    pub biomarker: BiomarkerType,
    pub resolved: ResolvedRanges,
    pub cleaned: PercentileCurve,
    pub filter_stats: Vec<(Percentile, FilterStats)>,
    pub classification: ClassificationResult,
    pub metrics: DerivedMetrics,
    pub statistics_missing: bool,
    pub message: Option<String>,
    pub issues: Vec<DataQualityIssue>,
}

/// Merges stage outputs into one immutable result
pub struct ReportAssembler;

impl ReportAssembler {
    pub fn assemble(parts: ReportParts) -> AnalyticsResult {
        let ReportParts {
            biomarker,
            resolved,
            cleaned,
            filter_stats,
            classification,
            metrics,
            statistics_missing,
            message,
            issues: stage_issues,
        } = parts;

        let mut data_quality = Vec::new();
        if statistics_missing {
            data_quality.push(DataQualityIssue::MissingStatistics);
        }
        data_quality.extend(resolved.issues);
        data_quality.extend(stage_issues);
        data_quality.extend(
            filter_stats
                .iter()
                .filter(|(_, stats)| stats.total() > 0)
                .map(|(percentile, stats)| DataQualityIssue::ArtifactAmbiguity {
                    track: percentile.label().to_string(),
                    below_floor: stats.below_floor,
                    flat_line: stats.flat_line,
                }),
        );

        for issue in &data_quality {
            issue.log(biomarker);
        }

        AnalyticsResult {
            biomarker,
            threshold_source: resolved.source,
            thresholds: resolved.thresholds,
            range_bands: classification,
            cleaned_percentiles: cleaned,
            cgm_active_percent: metrics.cgm_active_percent,
            average: metrics.average,
            standard_deviation: metrics.standard_deviation,
            coefficient_of_variation_percentage: metrics.coefficient_of_variation_percentage,
            a1c: metrics.a1c,
            gmi: metrics.gmi,
            message,
            data_quality,
        }
    }
}

/// The ambulatory profile pipeline bound to one configuration
#[derive(Debug, Clone, Copy)]
pub struct AmbulatoryProfileEngine<'a> {
    config: &'a EngineConfig,
}

impl AmbulatoryProfileEngine<'static> {
    /// Engine over the process-wide configuration
    pub fn global() -> Self {
        Self::new(EngineConfig::global())
    }
}

impl<'a> AmbulatoryProfileEngine<'a> {
    pub fn new(config: &'a EngineConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &'a EngineConfig {
        self.config
    }

    /// Build a report; only contract violations are returned as errors
    #[instrument(skip_all, fields(biomarker = %request.biomarker))]
    pub fn analyze(&self, request: &AnalyticsRequest) -> Result<AnalyticsResult> {
        let biomarker_config = self.config.biomarker(request.biomarker);

        let curve = request.payload.curve()?;
        let (statistics, parse_issues) = request.payload.parse_statistics()?;

        let custom_ranges = request
            .range_config
            .as_ref()
            .and_then(|config| config.custom_ranges());
        let resolved = RangeResolver::new(biomarker_config).resolve(custom_ranges, &request.all_conditions());

        let (cleaned, filter_stats) = ArtifactFilter::for_biomarker(biomarker_config).clean_curve(&curve);

        let classification = RangeClassifier::classify(&statistics, &resolved.thresholds);

        let (metrics, metric_issues) = MetricsCalculator::compute(
            request.biomarker,
            request.payload.start_at,
            request.payload.end_at,
            &statistics,
        );

        let mut issues = parse_issues;
        issues.extend(metric_issues);

        let result = ReportAssembler::assemble(ReportParts {
            biomarker: request.biomarker,
            resolved,
            cleaned,
            filter_stats,
            classification,
            metrics,
            statistics_missing: statistics.is_empty(),
            message: request
                .range_config
                .as_ref()
                .and_then(|config| config.message.clone()),
            issues,
        });

        info!(
            source = ?result.threshold_source(),
            active_percent = %result.cgm_active_percent(),
            issues = result.data_quality().len(),
            "ambulatory profile assembled"
        );
        Ok(result)
    }

    /// Convenience entry point over raw JSON payloads
    pub fn analyze_json(
        &self,
        biomarker: BiomarkerType,
        payload_json: &str,
        range_config_json: Option<&str>,
    ) -> Result<AnalyticsResult> {
        let mut request = AnalyticsRequest::new(biomarker, PatientBiomarkerPayload::from_json_str(payload_json)?);
        if let Some(json) = range_config_json {
            request = request.with_range_config(RangeConfigPayload::from_json_str(json)?);
        }
        self.analyze(&request)
    }
}
