//! Common utility functions for lens modules

use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::error;

/// Placeholder shown for metadata the lookup service did not provide
pub const UNKNOWN: &str = "Unknown";

/// Unified output format for all lens commands
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
pub enum OutputFormat {
    /// Human-readable `Key: value` lines (default)
    #[default]
    Text,
    /// Compact JSON (single line per object)
    Json,
    /// Pretty-printed JSON with indentation
    JsonPretty,
}

impl OutputFormat {
    /// Render a serializable value as JSON, or `None` for non-JSON formats.
    ///
    /// A value that fails to serialize renders as `{"error": "..."}`.
    pub fn to_json<T: Serialize>(&self, value: &T) -> Option<String> {
        let rendered = match self {
            Self::Json => serde_json::to_string(value),
            Self::JsonPretty => serde_json::to_string_pretty(value),
            Self::Text => return None,
        };
        Some(rendered.unwrap_or_else(|e| {
            error!("Failed to serialize output as JSON: {}", e);
            serde_json::json!({ "error": e.to_string() }).to_string()
        }))
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text => write!(f, "text"),
            Self::Json => write!(f, "json"),
            Self::JsonPretty => write!(f, "json-pretty"),
        }
    }
}

/// Return the value, or [`UNKNOWN`] if absent or blank
pub fn or_unknown(value: Option<&str>) -> String {
    match value.map(str::trim) {
        Some(v) if !v.is_empty() => v.to_string(),
        _ => UNKNOWN.to_string(),
    }
}
