//! Crash-generator TOML validation.
//!
//! Buffout 4 reads its configuration from either
//! `<plugins>/Buffout4/config.toml` or `<plugins>/Buffout4.toml`; both
//! existing at once is itself a finding. The validator parses whichever is
//! present with fault isolation (a malformed file is recorded, never fatal)
//! and cross-references the native plugins in the directory against a
//! conflict matrix: certain DLLs demand certain crash-generator patches be
//! toggled.

use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::concurrency::cancel::CancelToken;
use crate::core::analyzer::Severity;
use crate::core::errors::Result;
use crate::core::Game;
use crate::scanners::{ConfigIssue, ProgressCallback};

#[cfg(test)]
#[path = "toml_cfg_tests.rs"]
mod tests;

/// A TOML file that failed to parse. The scan records it and continues.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TomlParseFailure {
    /// File the failure occurred in.
    pub file_path: PathBuf,
    /// Parser error text.
    pub message: String,
}

/// Aggregate TOML scan outcome.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TomlScanResult {
    /// True when at least one config location exists.
    pub config_file_found: bool,
    /// True when both conventional locations exist. No merge is attempted;
    /// both paths are listed and settings are read from the first probe
    /// location only.
    pub has_duplicate_configs: bool,
    /// Every config path that exists, in probe order.
    pub config_paths: Vec<PathBuf>,
    /// Settings conflicts against the plugin matrix.
    pub issues: Vec<ConfigIssue>,
    /// Files that failed to parse.
    pub parse_failures: Vec<TomlParseFailure>,
    /// Parsed settings from the primary config, when it parsed.
    pub settings: Option<toml::Value>,
}

impl TomlScanResult {
    /// True when any category holds a finding.
    pub fn has_issues(&self) -> bool {
        !self.issues.is_empty() || !self.parse_failures.is_empty() || self.has_duplicate_configs
    }
}

/// One row of the plugin-conflict matrix: when `dll` is installed, the
/// crash-generator setting at `[table] key` must equal `required`.
#[derive(Debug, Clone, Copy)]
pub struct PluginConflictRule {
    /// Native plugin file name, lowercase.
    pub dll: &'static str,
    /// TOML table holding the setting.
    pub table: &'static str,
    /// Setting key.
    pub key: &'static str,
    /// Value the setting must have while the plugin is installed.
    pub required: bool,
    /// Explanation shown in the report.
    pub description: &'static str,
}

/// The built-in conflict matrix for Buffout 4.
pub const PLUGIN_CONFLICT_MATRIX: &[PluginConflictRule] = &[
    PluginConflictRule {
        dll: "achievements.dll",
        table: "Patches",
        key: "Achievements",
        required: false,
        description: "the Achievements mod already unlocks achievements; the \
                      crash generator's own patch must be disabled",
    },
    PluginConflictRule {
        dll: "x-cell-fo4.dll",
        table: "Patches",
        key: "MemoryManager",
        required: false,
        description: "X-Cell replaces the engine memory manager; the crash \
                      generator's MemoryManager patch must be disabled",
    },
    PluginConflictRule {
        dll: "x-cell-fo4.dll",
        table: "Patches",
        key: "HavokMemorySystem",
        required: false,
        description: "X-Cell replaces the Havok memory system; the crash \
                      generator's HavokMemorySystem patch must be disabled",
    },
    PluginConflictRule {
        dll: "x-cell-ng2.dll",
        table: "Patches",
        key: "BSTextureStreamerLocalHeap",
        required: false,
        description: "X-Cell NG2 manages the texture streamer heap; the crash \
                      generator's BSTextureStreamerLocalHeap patch must be \
                      disabled",
    },
    PluginConflictRule {
        dll: "f4ee.dll",
        table: "Compatibility",
        key: "F4EE",
        required: true,
        description: "LooksMenu is installed; the crash generator's F4EE \
                      compatibility patch must be enabled",
    },
];

const XCELL_DLLS: &[&str] = &["x-cell-fo4.dll", "x-cell-ng2.dll"];
const BAKA_SCRAP_HEAP_DLL: &str = "bakascrapheap.dll";

fn bool_display(value: bool) -> &'static str {
    if value {
        "True"
    } else {
        "False"
    }
}

/// Crash-generator configuration scanner.
#[derive(Debug, Default)]
pub struct TomlScanner;

impl TomlScanner {
    /// Scan the script-extender plugins directory for crash-generator
    /// configuration problems. Non-Fallout-4 targets skip the
    /// settings-conflict check entirely.
    pub async fn scan(
        &self,
        plugins_dir: impl AsRef<Path>,
        game: Game,
        cancel: &CancelToken,
        progress: Option<ProgressCallback>,
    ) -> Result<TomlScanResult> {
        let plugins_dir = plugins_dir.as_ref();
        cancel.check()?;

        let crash_gen = game.spec().crash_gen_name;
        let candidates = [
            plugins_dir.join(crash_gen).join("config.toml"),
            plugins_dir.join(format!("{crash_gen}.toml")),
        ];

        let mut result = TomlScanResult::default();
        for candidate in &candidates {
            if candidate.is_file() {
                result.config_paths.push(candidate.clone());
            }
        }
        result.config_file_found = !result.config_paths.is_empty();
        result.has_duplicate_configs = result.config_paths.len() > 1;
        if result.has_duplicate_configs {
            debug!(
                crash_gen,
                "both conventional config locations exist; settings read from \
                 the first probe location"
            );
        }

        if let Some(primary) = result.config_paths.first().cloned() {
            cancel.check()?;
            match std::fs::read_to_string(&primary) {
                Ok(text) => match toml::from_str::<toml::Value>(&text) {
                    Ok(settings) => result.settings = Some(settings),
                    Err(e) => {
                        warn!(file = %primary.display(), error = %e, "config.toml failed to parse");
                        result.parse_failures.push(TomlParseFailure {
                            file_path: primary,
                            message: e.to_string(),
                        });
                    }
                },
                Err(e) => {
                    result.parse_failures.push(TomlParseFailure {
                        file_path: primary,
                        message: e.to_string(),
                    });
                }
            }
        }

        let is_fallout4 = matches!(game, Game::Fallout4 | Game::Fallout4Vr);
        if !is_fallout4 {
            debug!(game = %game, "settings-conflict check applies to Fallout 4 only");
            return Ok(result);
        }

        let dlls = enumerate_plugin_dlls(plugins_dir);
        let total = dlls.len();
        for (done, _) in dlls.iter().enumerate() {
            if let Some(ref progress) = progress {
                progress(done + 1, total);
            }
        }

        if let Some(settings) = result.settings.clone() {
            for rule in PLUGIN_CONFLICT_MATRIX {
                cancel.check()?;
                if !dlls.iter().any(|dll| dll == rule.dll) {
                    continue;
                }
                let Some(actual) = settings
                    .get(rule.table)
                    .and_then(|table| table.get(rule.key))
                    .and_then(toml::Value::as_bool)
                else {
                    continue;
                };
                if actual != rule.required {
                    result.issues.push(ConfigIssue {
                        file_path: result
                            .config_paths
                            .first()
                            .cloned()
                            .unwrap_or_default(),
                        file_name: "config.toml".to_string(),
                        section: rule.table.to_string(),
                        key: rule.key.to_string(),
                        current_value: bool_display(actual).to_string(),
                        recommended_value: Some(bool_display(rule.required).to_string()),
                        description: rule.description.to_string(),
                        severity: Severity::Warning,
                    });
                }
            }
        }

        // Baka ScrapHeap duplicates X-Cell's allocator takeover; running both
        // corrupts the heap.
        let has_xcell = dlls.iter().any(|dll| XCELL_DLLS.contains(&dll.as_str()));
        if has_xcell && dlls.iter().any(|dll| dll == BAKA_SCRAP_HEAP_DLL) {
            result.issues.push(ConfigIssue {
                file_path: plugins_dir.join(BAKA_SCRAP_HEAP_DLL),
                file_name: BAKA_SCRAP_HEAP_DLL.to_string(),
                section: String::new(),
                key: String::new(),
                current_value: "installed".to_string(),
                recommended_value: Some("remove the mod".to_string()),
                description: "Baka ScrapHeap is redundant with X-Cell and the \
                              two corrupt each other's memory management"
                    .to_string(),
                severity: Severity::Error,
            });
        }

        Ok(result)
    }
}

fn enumerate_plugin_dlls(plugins_dir: &Path) -> Vec<String> {
    let Ok(entries) = std::fs::read_dir(plugins_dir) else {
        return Vec::new();
    };
    let mut dlls: Vec<String> = entries
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.path().is_file())
        .map(|entry| entry.file_name().to_string_lossy().to_lowercase())
        .filter(|name| name.ends_with(".dll"))
        .collect();
    dlls.sort();
    dlls
}
