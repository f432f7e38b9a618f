use agprs::{
    AmbulatoryProfileEngine, AnalyticsRequest, BandKind, BiomarkerType, EngineConfig, MiddleLabel,
    PatientBiomarkerPayload, RangeBand, RangeThresholds, ThresholdSource,
};
use tempfile::tempdir;

/// Configuration files driving the pipeline end to end

#[cfg(test)]
mod config_tests {
    use super::*;

    fn pediatric_thresholds() -> RangeThresholds {
        RangeThresholds::new(
            [
                RangeBand::new(0.0, 60.0),
                RangeBand::new(60.0, 80.0),
                RangeBand::new(80.0, 200.0),
                RangeBand::new(200.0, 300.0),
                RangeBand::unbounded(300.0),
            ],
            MiddleLabel::Target,
        )
        .unwrap()
    }

    #[test]
    fn test_saved_condition_ranges_are_used() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = EngineConfig::default();
        config
            .glucose
            .conditions
            .insert("pediatric".to_string(), pediatric_thresholds());
        config.glucose.condition_priority.insert(0, "pediatric".to_string());
        config.save_to_file(&path).unwrap();

        let loaded = EngineConfig::load_from_file(&path).unwrap();
        assert_eq!(loaded, config);

        let request = AnalyticsRequest::new(BiomarkerType::Glucose, PatientBiomarkerPayload::default())
            .with_conditions(["Pregnancy", "PEDIATRIC"]);
        let result = AmbulatoryProfileEngine::new(&loaded).analyze(&request).unwrap();

        assert_eq!(
            result.threshold_source(),
            &ThresholdSource::ConditionAutoDetected {
                conditions: vec!["pediatric".to_string(), "pregnancy".to_string()]
            }
        );
        assert_eq!(result.thresholds().band(BandKind::InRange).max, Some(200.0));
    }

    #[test]
    fn test_gap_in_configured_ranges_is_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");

        let content = toml::to_string(&EngineConfig::default())
            .unwrap()
            .replacen("max = 180.0", "max = 175.0", 1);
        std::fs::write(&path, content).unwrap();

        let err = EngineConfig::load_from_file(&path).unwrap_err();
        assert!(format!("{:#}", err).contains("TOML"));
    }

    #[test]
    fn test_logging_section_is_optional() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");

        let mut value = toml::Value::try_from(EngineConfig::default()).unwrap();
        value.as_table_mut().unwrap().remove("logging");
        std::fs::write(&path, toml::to_string(&value).unwrap()).unwrap();

        let loaded = EngineConfig::load_from_file(&path).unwrap();
        assert_eq!(loaded.logging, agprs::LogConfig::default());
    }
}
