//! Report output formats

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::AgpError;

pub mod json;
pub mod table;

pub use json::{export_json, to_json_string};
pub use table::render_report;

/// Output format for an assembled report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    #[default]
    Table,
    Json,
}

impl std::str::FromStr for ExportFormat {
    type Err = AgpError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "table" | "text" => Ok(ExportFormat::Table),
            "json" => Ok(ExportFormat::Json),
            _ => Err(AgpError::Configuration(format!("Unsupported output format: {}", s))),
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExportFormat::Table => write!(f, "table"),
            ExportFormat::Json => write!(f, "json"),
        }
    }
}
