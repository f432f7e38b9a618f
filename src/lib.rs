// Library interface for agprs modules
// Ambulatory profile analytics: range resolution, artifact filtering,
// time-in-range classification and derived metrics for CGM and cortisol data.

pub mod aggregate;
pub mod artifact;
pub mod batch;
pub mod classifier;
pub mod config;
pub mod error;
pub mod export;
pub mod logging;
pub mod metrics;
pub mod models;
pub mod payload;
pub mod ranges;
pub mod report;

// Re-export commonly used types for convenience
pub use models::*;
pub use aggregate::HourlyPercentileBuilder;
pub use artifact::{ArtifactFilter, FilterStats};
pub use batch::{BatchAnalyzer, BatchConfig, BatchOutcome};
pub use classifier::RangeClassifier;
pub use config::{BiomarkerConfig, EngineConfig};
pub use metrics::{DerivedMetrics, MetricsCalculator};
pub use payload::{PatientBiomarkerPayload, PercentagesPayload, RangeConfigPayload};
pub use ranges::{RangeResolver, ResolvedRanges};
pub use report::{AmbulatoryProfileEngine, AnalyticsRequest, ReportAssembler};
pub use error::{AgpError, ContractError, DataQualityIssue, Result};
pub use logging::{LogConfig, LogLevel, LogFormat};
