//! Logging configuration from TOML (`[logging]` section)

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Where diagnostic logs and the execution transcript go
///
/// # Example
///
/// ```toml
/// [logging]
/// transcript_path = "runs/transcript.jsonl"
/// log_file = "logs/orchestra.log"
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileLoggingConfig {
    /// JSONL execution transcript; disabled when unset
    pub transcript_path: Option<PathBuf>,
    /// Daily-rolling diagnostic log file, in addition to stderr
    pub log_file: Option<PathBuf>,
}
