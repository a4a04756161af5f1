//! Artifact scanners: BA2 archives and INI/TOML configuration files.

pub mod archive;
pub mod ini;
pub mod toml_cfg;

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::core::analyzer::Severity;

/// One configuration finding, shared by the INI and TOML validators.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigIssue {
    /// File the issue was found in.
    pub file_path: PathBuf,
    /// File name without directories.
    pub file_name: String,
    /// Section (INI) or table path (TOML).
    pub section: String,
    /// Offending key.
    pub key: String,
    /// Value as found.
    pub current_value: String,
    /// Recommended replacement value, when one exists.
    pub recommended_value: Option<String>,
    /// Human-readable explanation.
    pub description: String,
    /// How serious the finding is.
    pub severity: Severity,
}

/// Progress callback invoked by the scanners: `(files_done, total_files)`.
pub type ProgressCallback = Box<dyn Fn(usize, usize) + Send + Sync>;
