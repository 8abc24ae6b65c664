// Export Module
// Standalone JSON documents for sharing workspaces and snippet collections

pub mod json;

pub use json::JsonExporter;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Version written into snippet bundles
pub const BUNDLE_VERSION: u32 = 1;

/// Export options for customizing output
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportOptions {
    /// Pretty print JSON output
    pub pretty_print: bool,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self { pretty_print: true }
    }
}

/// Export errors
#[derive(Error, Debug)]
pub enum ExportError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Unsupported bundle version {0}")]
    UnsupportedVersion(u32),

    #[error("No data to export")]
    NoData,
}

impl From<serde_json::Error> for ExportError {
    fn from(e: serde_json::Error) -> Self {
        ExportError::SerializationError(e.to_string())
    }
}
