use agprs::{
    AgpError, AmbulatoryProfileEngine, BandKind, BiomarkerType, ContractError, DataQualityIssue,
    EngineConfig, MetricValue, ThresholdSource,
};
use serde_json::{json, Value};

/// End-to-end tests over JSON payloads as the data-access layer delivers them

#[cfg(test)]
mod pipeline_tests {
    use super::*;

    fn flat_then_rising() -> Value {
        let track: Vec<Value> = (0..24)
            .map(|hour| if hour < 7 { json!(50) } else { json!(90 + hour) })
            .collect();
        Value::Array(track)
    }

    fn glucose_payload(start: &str, end: &str, wear_minutes: f64) -> String {
        json!({
            "startAt": start,
            "endAt": end,
            "statistics": {
                "average": 148.5,
                "standardDeviation": 50.1,
                "coefficientOfVariationPercentage": 33.7,
                "a1c": 6.8,
                "gmi": 7.1,
                "totalWearTimeMinutes": wear_minutes,
                "percentBelow54": 2,
                "percentBelow70": 6,
                "percentBetween70And180": 80,
                "percentAbove180": 20,
                "percentAbove250": 5,
                "timeTargetMinutes": 1152
            },
            "percentages": {
                "percentile_5": flat_then_rising(),
                "percentile_50": flat_then_rising(),
                "percentile_95": vec![Value::Null; 24]
            }
        })
        .to_string()
    }

    fn analyze(biomarker: BiomarkerType, payload: &str, ranges: Option<&str>) -> agprs::Result<agprs::AnalyticsResult> {
        let config = EngineConfig::default();
        AmbulatoryProfileEngine::new(&config).analyze_json(biomarker, payload, ranges)
    }

    #[test]
    fn test_default_glucose_report() {
        let payload = glucose_payload("2024-01-01T00:00:00Z", "2024-01-03T00:00:00Z", 1440.0);
        let result = analyze(BiomarkerType::Glucose, &payload, None).unwrap();

        assert_eq!(result.threshold_source(), &ThresholdSource::Default);
        assert_eq!(result.range_bands().percentages(), [2.0, 4.0, 80.0, 15.0, 5.0]);
        assert_eq!(result.range_bands().total_percentage(), 106.0);
        assert_eq!(result.range_bands().band(BandKind::InRange).minutes_per_day, 1152.0);
        assert_eq!(result.cgm_active_percent(), MetricValue::Available(50.0));
        assert_eq!(result.coefficient_of_variation_percentage(), MetricValue::Available(33.7));
        assert_eq!(result.gmi(), Some(MetricValue::Available(7.1)));
    }

    #[test]
    fn test_full_wear_time() {
        let payload = glucose_payload("2024-01-01T00:00:00Z", "2024-01-03T00:00:00Z", 2880.0);
        let result = analyze(BiomarkerType::Glucose, &payload, None).unwrap();
        assert_eq!(result.cgm_active_percent(), MetricValue::Available(100.0));
    }

    #[test]
    fn test_flat_line_cleaned_in_report() {
        let payload = glucose_payload("2024-01-01T00:00:00Z", "2024-01-03T00:00:00Z", 1440.0);
        let result = analyze(BiomarkerType::Glucose, &payload, None).unwrap();

        let p50 = &result.cleaned_percentiles().p50;
        assert_eq!(p50.get(0), Some(50.0));
        assert_eq!(p50.get(6), Some(50.0));
        assert!((1..=5).all(|hour| p50.values()[hour].is_none()));
        assert_eq!(p50.get(7), Some(97.0));
        assert!(result.cleaned_percentiles().p95.is_empty());

        let artifact_tracks: Vec<&str> = result
            .data_quality()
            .iter()
            .filter_map(|issue| match issue {
                DataQualityIssue::ArtifactAmbiguity { track, .. } => Some(track.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(artifact_tracks, ["p5", "p50"]);
    }

    #[test]
    fn test_unvalidated_run_length_still_analyzes() {
        let mut config = EngineConfig::default();
        config.glucose.flat_line_min_run = 1;
        let payload = glucose_payload("2024-01-01T00:00:00Z", "2024-01-03T00:00:00Z", 1440.0);

        let result = AmbulatoryProfileEngine::new(&config)
            .analyze_json(BiomarkerType::Glucose, &payload, None)
            .unwrap();

        let p50 = &result.cleaned_percentiles().p50;
        assert_eq!(p50.get(0), Some(50.0));
        assert_eq!(p50.get(6), Some(50.0));
        assert_eq!(p50.get(7), Some(97.0));
        assert_eq!(p50.get(23), Some(113.0));
    }

    #[test]
    fn test_millisecond_window_rounds_up_a_day() {
        let payload = glucose_payload("2024-01-01T00:00:00.000Z", "2024-01-02T00:00:00.500Z", 1440.0);
        let result = analyze(BiomarkerType::Glucose, &payload, None).unwrap();

        assert_eq!(result.cgm_active_percent(), MetricValue::Available(50.0));
        assert!(!result
            .data_quality()
            .iter()
            .any(|issue| matches!(issue, DataQualityIssue::InvalidScalar { .. })));
    }

    #[test]
    fn test_cortisol_plausibility_floor() {
        let mut track = vec![json!(4.2); 24];
        for (hour, slot) in track.iter_mut().enumerate() {
            *slot = json!(4.0 + hour as f64 * 0.5);
        }
        track[3] = json!(0.3);
        let payload = json!({
            "startAt": "2024-02-01T00:00:00Z",
            "endAt": "2024-02-02T00:00:00Z",
            "statistics": { "totalWearTimeMinutes": 1440 },
            "percentages": { "percentile_50": track }
        })
        .to_string();

        let result = analyze(BiomarkerType::Cortisol, &payload, None).unwrap();

        assert_eq!(result.cleaned_percentiles().p50.values()[3], None);
        assert_eq!(result.cleaned_percentiles().p50.present_count(), 23);
        assert_eq!(result.a1c(), None);
        assert_eq!(result.range_bands().band(BandKind::InRange).label, "normal");
    }

    #[test]
    fn test_custom_ranges_beat_conditions() {
        let payload = glucose_payload("2024-01-01T00:00:00Z", "2024-01-03T00:00:00Z", 1440.0);
        let ranges = json!({
            "useDefault": false,
            "ranges": {
                "veryLow": {"min": 0, "max": 54},
                "low": {"min": 54, "max": 70},
                "target": {"min": 70, "max": 180},
                "high": {"min": 180, "max": 250},
                "veryHigh": {"min": 250, "max": null}
            },
            "configsUsed": ["pregnancy"],
            "message": "Clinician override"
        })
        .to_string();

        let result = analyze(BiomarkerType::Glucose, &payload, Some(&ranges)).unwrap();
        assert_eq!(result.threshold_source(), &ThresholdSource::Custom);
        assert_eq!(result.message(), Some("Clinician override"));
    }

    #[test]
    fn test_use_default_flag_skips_custom_ranges() {
        let payload = glucose_payload("2024-01-01T00:00:00Z", "2024-01-03T00:00:00Z", 1440.0);
        let ranges = json!({
            "useDefault": true,
            "ranges": { "veryLow": {"min": 0, "max": 40} },
            "configsUsed": ["pregnancy"]
        })
        .to_string();

        let result = analyze(BiomarkerType::Glucose, &payload, Some(&ranges)).unwrap();
        assert_eq!(
            result.threshold_source(),
            &ThresholdSource::ConditionAutoDetected {
                conditions: vec!["pregnancy".to_string()]
            }
        );
        assert!(result.data_quality().iter().all(|issue| !matches!(
            issue,
            DataQualityIssue::InvalidThresholdConfig { .. }
        )));
    }

    #[test]
    fn test_inverted_window_only_affects_active_percent() {
        let payload = glucose_payload("2024-01-03T00:00:00Z", "2024-01-01T00:00:00Z", 1440.0);
        let result = analyze(BiomarkerType::Glucose, &payload, None).unwrap();

        assert_eq!(result.cgm_active_percent(), MetricValue::Unavailable);
        assert_eq!(result.average(), MetricValue::Available(148.5));
        assert_eq!(result.range_bands().percentages(), [2.0, 4.0, 80.0, 15.0, 5.0]);
        assert!(result
            .data_quality()
            .iter()
            .any(|issue| matches!(issue, DataQualityIssue::TemporalInconsistency { .. })));
    }

    #[test]
    fn test_missing_statistics_never_fails() {
        let payload = json!({
            "startAt": "2024-01-01T00:00:00Z",
            "endAt": "2024-01-08T00:00:00Z"
        })
        .to_string();
        let result = analyze(BiomarkerType::Glucose, &payload, None).unwrap();

        assert_eq!(result.range_bands().percentages(), [0.0; 5]);
        assert_eq!(result.average(), MetricValue::Unavailable);
        assert_eq!(result.a1c(), Some(MetricValue::Unavailable));
        assert_eq!(result.data_quality()[0], DataQualityIssue::MissingStatistics);

        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["average"], "unavailable");
        assert_eq!(json["rangeBands"].as_array().map(Vec::len), Some(5));
        assert_eq!(json["cleanedPercentiles"]["p50"].as_array().map(Vec::len), Some(24));
    }

    #[test]
    fn test_invalid_scalars_are_unavailable() {
        let payload = json!({
            "startAt": "2024-01-01T00:00:00Z",
            "endAt": "2024-01-02T00:00:00Z",
            "statistics": {
                "average": -12,
                "standardDeviation": "n/a",
                "a1c": 0,
                "totalWearTimeMinutes": 720
            }
        })
        .to_string();
        let result = analyze(BiomarkerType::Glucose, &payload, None).unwrap();

        assert_eq!(result.average(), MetricValue::Unavailable);
        assert_eq!(result.standard_deviation(), MetricValue::Unavailable);
        assert_eq!(result.a1c(), Some(MetricValue::Unavailable));
        assert_eq!(result.cgm_active_percent(), MetricValue::Available(50.0));
    }

    #[test]
    fn test_short_track_is_contract_violation() {
        let payload = json!({
            "percentages": { "percentile_25": vec![json!(100); 23] }
        })
        .to_string();
        let err = analyze(BiomarkerType::Glucose, &payload, None).unwrap_err();
        assert!(matches!(
            err,
            AgpError::Contract(ContractError::TrackLength { actual: 23, .. })
        ));
    }

    #[test]
    fn test_statistics_must_be_an_object() {
        let payload = json!({ "statistics": [1, 2, 3] }).to_string();
        let err = analyze(BiomarkerType::Glucose, &payload, None).unwrap_err();
        assert!(matches!(err, AgpError::Contract(ContractError::WrongType { .. })));
    }
}
