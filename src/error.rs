//! Unified error hierarchy for agprs
//!
//! Two families live here. `AgpError` is the fatal kind: contract violations
//! by the caller (wrong track length, malformed payload shape), bad startup
//! configuration, and I/O. `DataQualityIssue` is the non-fatal kind: it is
//! recorded on the assembled `AnalyticsResult` and never returned as an error.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

use crate::models::BiomarkerType;

/// Top-level error type for all agprs operations
#[derive(Debug, Error)]
pub enum AgpError {
    /// Caller broke the input contract
    #[error("Contract violation: {0}")]
    Contract(#[from] ContractError),

    /// Configuration errors (startup only)
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// JSON (de)serialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Programmer-error inputs
#[derive(Debug, Error)]
pub enum ContractError {
    /// A percentile track does not have one value per hour
    #[error("Track {track} has {actual} values, expected {expected}")]
    TrackLength {
        track: String,
        expected: usize,
        actual: usize,
    },

    /// A payload field has the wrong JSON type
    #[error("Field {field} has wrong type: expected {expected}")]
    WrongType { field: String, expected: String },

    /// Export target could not be written
    #[error("Cannot write export to {path}")]
    ExportTarget { path: PathBuf },
}

/// Result type alias for agprs operations
pub type Result<T> = std::result::Result<T, AgpError>;

impl AgpError {
    /// Get error severity level
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            AgpError::Contract(_) => ErrorSeverity::Error,
            AgpError::Configuration(_) => ErrorSeverity::Critical,
            AgpError::Serialization(_) => ErrorSeverity::Error,
            AgpError::Io(_) => ErrorSeverity::Error,
        }
    }

    /// Get user-friendly error message
    pub fn user_message(&self) -> String {
        match self {
            AgpError::Contract(ContractError::TrackLength { track, actual, .. }) => {
                format!(
                    "Percentile data for {} is malformed ({} hourly values instead of 24).",
                    track, actual
                )
            }
            AgpError::Contract(ContractError::WrongType { field, .. }) => {
                format!("The {} section of the payload has the wrong shape.", field)
            }
            AgpError::Configuration(_) => {
                "Range configuration is invalid. Please check the configuration file.".to_string()
            }
            _ => self.to_string(),
        }
    }
}

/// Error severity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSeverity {
    /// Critical system error requiring immediate attention
    Critical,
    /// Error that prevents operation but system can continue
    Error,
    /// Warning that doesn't prevent operation
    Warning,
    /// Informational message
    Info,
}

impl ErrorSeverity {
    /// Convert to tracing level
    pub fn to_tracing_level(&self) -> tracing::Level {
        match self {
            ErrorSeverity::Critical => tracing::Level::ERROR,
            ErrorSeverity::Error => tracing::Level::ERROR,
            ErrorSeverity::Warning => tracing::Level::WARN,
            ErrorSeverity::Info => tracing::Level::INFO,
        }
    }
}

/// Non-fatal data problems recorded on a report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum DataQualityIssue {
    /// Statistics payload absent or empty
    MissingStatistics,

    /// A threshold tier was rejected and resolution fell through
    #[serde(rename_all = "camelCase")]
    InvalidThresholdConfig { tier: String, reason: String },

    /// Report window ends at or before it starts
    #[serde(rename_all = "camelCase")]
    TemporalInconsistency { start_at: String, end_at: String },

    /// Points were nulled from a percentile track
    #[serde(rename_all = "camelCase")]
    ArtifactAmbiguity {
        track: String,
        below_floor: usize,
        flat_line: usize,
    },

    /// A pass-through scalar was NaN, infinite, or impossible
    #[serde(rename_all = "camelCase")]
    InvalidScalar { field: String, value: String },
}

impl std::fmt::Display for DataQualityIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DataQualityIssue::MissingStatistics => write!(f, "No statistics supplied; bands reported as 0%"),
            DataQualityIssue::InvalidThresholdConfig { tier, reason } => {
                write!(f, "Ignored {} ranges: {}", tier, reason)
            }
            DataQualityIssue::TemporalInconsistency { start_at, end_at } => {
                write!(f, "Report window {} to {} is empty or inverted", start_at, end_at)
            }
            DataQualityIssue::ArtifactAmbiguity {
                track,
                below_floor,
                flat_line,
            } => write!(
                f,
                "Track {}: {} implausible and {} flat-line points removed",
                track, below_floor, flat_line
            ),
            DataQualityIssue::InvalidScalar { field, value } => {
                write!(f, "Field {} has unusable value {}", field, value)
            }
        }
    }
}

impl DataQualityIssue {
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            DataQualityIssue::MissingStatistics => ErrorSeverity::Warning,
            DataQualityIssue::InvalidThresholdConfig { .. } => ErrorSeverity::Warning,
            DataQualityIssue::TemporalInconsistency { .. } => ErrorSeverity::Warning,
            DataQualityIssue::ArtifactAmbiguity { .. } => ErrorSeverity::Info,
            DataQualityIssue::InvalidScalar { .. } => ErrorSeverity::Warning,
        }
    }

    /// Emit the issue through tracing at its severity
    pub fn log(&self, biomarker: BiomarkerType) {
        match self.severity() {
            ErrorSeverity::Info => tracing::info!(%biomarker, issue = ?self, "data quality note"),
            _ => tracing::warn!(%biomarker, issue = ?self, "data quality issue"),
        }
    }
}
