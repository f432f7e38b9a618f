use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use crate::error::AgpError;
use crate::logging::LogConfig;
use crate::models::{BiomarkerType, MiddleLabel, RangeBand, RangeThresholds};

static GLOBAL_CONFIG: OnceLock<EngineConfig> = OnceLock::new();

/// Process-wide engine configuration
///
/// Holds every clinical threshold the engine knows about, so no component
/// carries its own literals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Configuration metadata
    pub metadata: ConfigMetadata,

    /// Glucose (CGM) settings
    pub glucose: BiomarkerConfig,

    /// Cortisol (ACM) settings
    pub cortisol: BiomarkerConfig,

    /// Logging setup used by the binary
    #[serde(default)]
    pub logging: LogConfig,
}

/// Configuration metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigMetadata {
    /// Configuration format version
    pub version: String,
}

/// Per-biomarker thresholds and filter parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BiomarkerConfig {
    /// Display unit, e.g. mg/dL
    pub unit: String,

    /// Values below this are physiologically implausible
    pub plausibility_floor: f64,

    /// Minimum run of identical values treated as a flat-line artifact
    pub flat_line_min_run: usize,

    /// Hours with fewer readings than this get no percentile value
    #[serde(default = "default_min_readings_per_hour")]
    pub min_readings_per_hour: usize,

    /// Condition precedence; the first detected entry wins
    #[serde(default)]
    pub condition_priority: Vec<String>,

    /// Thresholds used when nothing else applies
    pub default_ranges: RangeThresholds,

    /// Threshold sets keyed by condition name
    #[serde(default)]
    pub conditions: BTreeMap<String, RangeThresholds>,
}

fn default_min_readings_per_hour() -> usize {
    3
}

impl BiomarkerConfig {
    /// Condition thresholds, matched case-insensitively
    pub fn condition(&self, name: &str) -> Option<(&str, &RangeThresholds)> {
        self.conditions
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name.trim()))
            .map(|(key, thresholds)| (key.as_str(), thresholds))
    }

    fn validate(&self, biomarker: BiomarkerType) -> crate::error::Result<()> {
        if !self.plausibility_floor.is_finite() || self.plausibility_floor < 0.0 {
            return Err(AgpError::Configuration(format!(
                "{}: plausibility_floor must be a non-negative number, got {}",
                biomarker, self.plausibility_floor
            )));
        }
        if self.flat_line_min_run < 2 {
            return Err(AgpError::Configuration(format!(
                "{}: flat_line_min_run must be at least 2, got {}",
                biomarker, self.flat_line_min_run
            )));
        }
        for name in &self.condition_priority {
            if self.condition(name).is_none() {
                return Err(AgpError::Configuration(format!(
                    "{}: condition_priority names unknown condition '{}'",
                    biomarker, name
                )));
            }
        }
        Ok(())
    }
}

/// Built-in literal bands; panics if the edges are not ascending
fn thresholds(edges: [f64; 4], middle: MiddleLabel) -> RangeThresholds {
    let [a, b, c, d] = edges;
    RangeThresholds::new(
        [
            RangeBand::new(0.0, a),
            RangeBand::new(a, b),
            RangeBand::new(b, c),
            RangeBand::new(c, d),
            RangeBand::unbounded(d),
        ],
        middle,
    )
    .expect("built-in thresholds are a valid partition")
}

impl BiomarkerConfig {
    /// Glucose in mg/dL (international consensus time-in-range targets)
    pub fn glucose_default() -> Self {
        let pregnancy = thresholds([54.0, 63.0, 140.0, 250.0], MiddleLabel::Target);
        let mut conditions = BTreeMap::new();
        conditions.insert("pregnancy".to_string(), pregnancy.clone());
        conditions.insert("gestationalDiabetes".to_string(), pregnancy);
        conditions.insert(
            "olderAdult".to_string(),
            thresholds([54.0, 70.0, 180.0, 250.0], MiddleLabel::Target),
        );

        Self {
            unit: "mg/dL".to_string(),
            plausibility_floor: 20.0,
            flat_line_min_run: 6,
            min_readings_per_hour: default_min_readings_per_hour(),
            default_ranges: thresholds([54.0, 70.0, 180.0, 250.0], MiddleLabel::Target),
            conditions,
            condition_priority: vec![
                "pregnancy".to_string(),
                "gestationalDiabetes".to_string(),
                "olderAdult".to_string(),
            ],
        }
    }

    /// Cortisol in µg/dL
    pub fn cortisol_default() -> Self {
        let mut conditions = BTreeMap::new();
        conditions.insert(
            "pregnancy".to_string(),
            thresholds([2.0, 5.0, 25.0, 35.0], MiddleLabel::Normal),
        );

        Self {
            unit: "µg/dL".to_string(),
            plausibility_floor: 0.5,
            flat_line_min_run: 6,
            min_readings_per_hour: default_min_readings_per_hour(),
            default_ranges: thresholds([2.0, 5.0, 15.0, 25.0], MiddleLabel::Normal),
            conditions,
            condition_priority: vec!["pregnancy".to_string()],
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            metadata: ConfigMetadata {
                version: "1.0".to_string(),
            },
            glucose: BiomarkerConfig::glucose_default(),
            cortisol: BiomarkerConfig::cortisol_default(),
            logging: LogConfig::default(),
        }
    }
}

impl EngineConfig {
    pub fn biomarker(&self, biomarker: BiomarkerType) -> &BiomarkerConfig {
        match biomarker {
            BiomarkerType::Glucose => &self.glucose,
            BiomarkerType::Cortisol => &self.cortisol,
        }
    }

    /// Check everything serde cannot; threshold partitions are already
    /// enforced while deserializing
    pub fn validate(&self) -> crate::error::Result<()> {
        for biomarker in BiomarkerType::ALL {
            self.biomarker(biomarker).validate(biomarker)?;
        }
        Ok(())
    }

    /// Load configuration from TOML file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        let config: EngineConfig =
            toml::from_str(&content).with_context(|| "Failed to parse TOML configuration")?;

        config
            .validate()
            .with_context(|| format!("Invalid configuration in {}", path.as_ref().display()))?;

        Ok(config)
    }

    /// Save configuration to TOML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        if let Some(parent) = path.as_ref().parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory: {}", parent.display()))?;
        }

        let toml_content = toml::to_string_pretty(self)
            .with_context(|| "Failed to serialize configuration to TOML")?;

        fs::write(&path, toml_content)
            .with_context(|| format!("Failed to write config file: {}", path.as_ref().display()))?;

        Ok(())
    }

    /// Get default configuration file path
    pub fn default_config_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".agprs")
            .join("config.toml")
    }

    /// Load configuration with fallback to defaults
    pub fn load_or_default() -> Self {
        let config_path = Self::default_config_path();

        match Self::load_from_file(&config_path) {
            Ok(config) => config,
            Err(err) => {
                tracing::warn!(
                    path = %config_path.display(),
                    error = %err,
                    "config not loaded, using built-in defaults"
                );
                Self::default()
            }
        }
    }

    /// Install as the process-wide configuration; only the first call wins
    pub fn install(self) -> crate::error::Result<&'static EngineConfig> {
        self.validate()?;
        GLOBAL_CONFIG
            .set(self)
            .map_err(|_| AgpError::Configuration("engine configuration already installed".to_string()))?;
        Ok(Self::global())
    }

    /// Process-wide configuration, built-in defaults if nothing was installed
    pub fn global() -> &'static EngineConfig {
        GLOBAL_CONFIG.get_or_init(EngineConfig::default)
    }
}
