use colored::*;
use tabled::settings::Style;
use tabled::{Table, Tabled};

use crate::models::{AnalyticsResult, BandKind, MetricValue, ThresholdSource};

#[derive(Tabled)]
struct BandRow {
    #[tabled(rename = "Band")]
    band: String,
    #[tabled(rename = "Range")]
    range: String,
    #[tabled(rename = "% Time")]
    percentage: String,
    #[tabled(rename = "Per Day")]
    per_day: String,
}

#[derive(Tabled)]
struct MetricRow {
    #[tabled(rename = "Metric")]
    metric: &'static str,
    #[tabled(rename = "Value")]
    value: String,
}

fn describe_source(source: &ThresholdSource) -> String {
    match source {
        ThresholdSource::Default => "default".to_string(),
        ThresholdSource::Custom => "custom".to_string(),
        ThresholdSource::ConditionAutoDetected { conditions } => {
            format!("condition ({})", conditions.join(", "))
        }
    }
}

fn format_range(min: f64, max: Option<f64>) -> String {
    match max {
        Some(max) => format!("{}-{}", min, max),
        None => format!(">= {}", min),
    }
}

/// Human-readable report: band table, metric table, then any data-quality issues
pub fn render_report(result: &AnalyticsResult, unit: &str) -> String {
    let band_rows: Vec<BandRow> = BandKind::ALL
        .iter()
        .map(|kind| {
            let classification = result.range_bands().band(*kind);
            let band = result.thresholds().band(*kind);
            BandRow {
                band: classification.label.clone(),
                range: format!("{} {}", format_range(band.min, band.max), unit),
                percentage: format!("{:.1}%", classification.percentage),
                per_day: classification.formatted_duration(),
            }
        })
        .collect();

    let mut metric_rows = vec![
        MetricRow {
            metric: "Active",
            value: result
                .cgm_active_percent()
                .value()
                .map(|v| format!("{:.0}%", v))
                .unwrap_or_else(|| MetricValue::UNAVAILABLE_LABEL.to_string()),
        },
        MetricRow {
            metric: "Average",
            value: format!("{:.1}", result.average()),
        },
        MetricRow {
            metric: "Std Dev",
            value: format!("{:.1}", result.standard_deviation()),
        },
        MetricRow {
            metric: "CV %",
            value: format!("{:.1}", result.coefficient_of_variation_percentage()),
        },
    ];
    if let Some(a1c) = result.a1c() {
        metric_rows.push(MetricRow {
            metric: "A1c",
            value: format!("{:.1}", a1c),
        });
    }
    if let Some(gmi) = result.gmi() {
        metric_rows.push(MetricRow {
            metric: "GMI",
            value: format!("{:.1}", gmi),
        });
    }

    let mut out = String::new();
    out.push_str(&format!(
        "{} {}\n",
        format!("Ambulatory profile: {}", result.biomarker()).bold(),
        format!("[ranges: {}]", describe_source(result.threshold_source())).dimmed()
    ));
    if let Some(message) = result.message() {
        out.push_str(&format!("{}\n", message.italic()));
    }
    out.push_str(&Table::new(band_rows).with(Style::rounded()).to_string());
    out.push('\n');
    out.push_str(&Table::new(metric_rows).with(Style::rounded()).to_string());
    out.push('\n');

    if !result.data_quality().is_empty() {
        out.push_str(&format!("{}\n", "Data quality:".yellow().bold()));
        for issue in result.data_quality() {
            out.push_str(&format!("  • {}\n", issue));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::models::BiomarkerType;
    use crate::payload::PatientBiomarkerPayload;
    use crate::report::{AmbulatoryProfileEngine, AnalyticsRequest};

    #[test]
    fn test_render_lists_every_band() {
        colored::control::set_override(false);
        let config = EngineConfig::default();
        let result = AmbulatoryProfileEngine::new(&config)
            .analyze(&AnalyticsRequest::new(
                BiomarkerType::Cortisol,
                PatientBiomarkerPayload::default(),
            ))
            .unwrap();

        let rendered = render_report(&result, "µg/dL");

        for label in ["veryLow", "low", "normal", "high", "veryHigh"] {
            assert!(rendered.contains(label), "missing {label}");
        }
        assert!(rendered.contains("unavailable"));
        assert!(rendered.contains("ranges: default"));
        assert!(!rendered.contains("A1c"));
        assert!(rendered.contains("Data quality:"));
    }
}
