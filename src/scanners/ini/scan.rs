//! Rule-driven INI scanning.

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

use dashmap::DashMap;
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::concurrency::cancel::CancelToken;
use crate::core::errors::{Result, ScannerError};
use crate::core::Game;
use crate::scanners::{ConfigIssue, ProgressCallback};

use super::parser::IniDocument;
use super::rules::{builtin_rules, file_matches, IniRule, IniRuleOptions, IssueCategory};

#[cfg(test)]
#[path = "scan_tests.rs"]
mod tests;

/// Default hotkey recommended when ESP Explorer's activation key was
/// commented out.
const ESP_EXPLORER_DEFAULT_HOTKEY: &str = "0x79";

/// A file whose content could not be read. The scan records it and moves
/// on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IniParseFailure {
    /// File the failure occurred in.
    pub file_path: PathBuf,
    /// File name without directories.
    pub file_name: String,
    /// What went wrong.
    pub message: String,
}

/// Aggregate INI scan outcome.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IniScanResult {
    /// General configuration findings.
    pub issues: Vec<ConfigIssue>,
    /// Startup console commands found.
    pub console_command_issues: Vec<ConfigIssue>,
    /// VSync-forcing settings found.
    pub vsync_issues: Vec<ConfigIssue>,
    /// Files that could not be read.
    pub parse_failures: Vec<IniParseFailure>,
    /// Number of ini files inspected.
    pub files_scanned: usize,
}

impl IniScanResult {
    /// True when any category holds a finding.
    pub fn has_issues(&self) -> bool {
        !self.issues.is_empty()
            || !self.console_command_issues.is_empty()
            || !self.vsync_issues.is_empty()
            || !self.parse_failures.is_empty()
    }
}

/// Rule-driven INI scanner with a per-file parse cache.
pub struct IniScanner {
    cache: DashMap<PathBuf, Arc<IniDocument>>,
    rules: Vec<IniRule>,
}

impl Default for IniScanner {
    fn default() -> Self {
        Self::new(IniRuleOptions::default())
    }
}

impl IniScanner {
    /// Create a scanner with the built-in rule table.
    pub fn new(options: IniRuleOptions) -> Self {
        Self {
            cache: DashMap::new(),
            rules: builtin_rules(&options),
        }
    }

    /// Replace the rule table.
    #[must_use]
    pub fn with_rules(mut self, rules: Vec<IniRule>) -> Self {
        self.rules = rules;
        self
    }

    /// Scan every `*.ini` under `dir` against the rule table. Parse and
    /// read failures are recorded per file; the scan always continues.
    pub async fn scan(
        &self,
        dir: impl AsRef<Path>,
        game: Game,
        cancel: &CancelToken,
        progress: Option<ProgressCallback>,
    ) -> Result<IniScanResult> {
        let dir = dir.as_ref();
        let files = discover_ini_files(dir);
        let total = files.len();
        debug!(dir = %dir.display(), total, game = %game, "scanning ini files");

        let mut result = IniScanResult::default();
        for (done, path) in files.into_iter().enumerate() {
            cancel.check()?;
            self.scan_file(&path, &mut result);
            if let Some(ref progress) = progress {
                progress(done + 1, total);
            }
        }
        Ok(result)
    }

    fn scan_file(&self, path: &Path, result: &mut IniScanResult) {
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let lower_name = file_name.to_lowercase();

        result.files_scanned += 1;

        let raw = match std::fs::read(path) {
            Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
            Err(e) => {
                warn!(file = %path.display(), error = %e, "ini file unreadable");
                result.parse_failures.push(IniParseFailure {
                    file_path: path.to_path_buf(),
                    file_name,
                    message: e.to_string(),
                });
                return;
            }
        };

        let document = self.cache_or_parse(path, &raw);

        for rule in &self.rules {
            if !file_matches(rule.file_pattern, &lower_name) {
                continue;
            }
            let Some(value) = document.get(rule.section, rule.key) else {
                continue;
            };
            if !rule.check.triggers(value) {
                continue;
            }

            let issue = ConfigIssue {
                file_path: path.to_path_buf(),
                file_name: file_name.clone(),
                section: rule.section.to_string(),
                key: rule.key.to_string(),
                current_value: value.to_string(),
                recommended_value: rule.recommended.clone(),
                description: rule.description.clone(),
                severity: rule.severity,
            };
            match rule.category {
                IssueCategory::ConsoleCommand => result.console_command_issues.push(issue),
                IssueCategory::VSync => result.vsync_issues.push(issue),
                IssueCategory::General => result.issues.push(issue),
            }
        }

        if lower_name == "espexplorer.ini" {
            self.check_commented_hotkey(path, &file_name, &raw, &document, result);
        }
    }

    /// ESP Explorer ships with its hotkey commented out; the mod silently
    /// does nothing until one is set.
    fn check_commented_hotkey(
        &self,
        path: &Path,
        file_name: &str,
        raw: &str,
        document: &IniDocument,
        result: &mut IniScanResult,
    ) {
        if document.has("Main", "HotKey") {
            return;
        }
        let commented = raw.lines().any(|line| {
            let line = line.trim_start();
            line.starts_with(';') && line[1..].trim_start().to_lowercase().starts_with("hotkey")
        });
        if commented {
            result.issues.push(ConfigIssue {
                file_path: path.to_path_buf(),
                file_name: file_name.to_string(),
                section: "Main".to_string(),
                key: "HotKey".to_string(),
                current_value: String::new(),
                recommended_value: Some(ESP_EXPLORER_DEFAULT_HOTKEY.to_string()),
                description: "the activation hotkey is commented out, so the mod \
                              cannot be opened in game"
                    .to_string(),
                severity: crate::core::analyzer::Severity::Info,
            });
        }
    }

    fn cache_or_parse(&self, path: &Path, raw: &str) -> Arc<IniDocument> {
        if let Some(cached) = self.cache.get(path) {
            return Arc::clone(cached.value());
        }
        let document = Arc::new(IniDocument::parse(raw));
        self.cache.insert(path.to_path_buf(), Arc::clone(&document));
        document
    }

    fn load(&self, path: &Path) -> Result<Arc<IniDocument>> {
        if let Some(cached) = self.cache.get(path) {
            return Ok(Arc::clone(cached.value()));
        }
        let bytes = std::fs::read(path)
            .map_err(|e| ScannerError::io(format!("failed to read {}", path.display()), e))?;
        let document = Arc::new(IniDocument::parse(&String::from_utf8_lossy(&bytes)));
        self.cache.insert(path.to_path_buf(), Arc::clone(&document));
        Ok(document)
    }

    /// Typed value lookup in one file.
    pub fn get_value<T: FromStr>(
        &self,
        file: &Path,
        section: &str,
        key: &str,
    ) -> Result<Option<T>> {
        let document = self.load(file)?;
        match document.get(section, key) {
            Some(value) => value.trim().parse::<T>().map(Some).map_err(|_| {
                ScannerError::parse(
                    file.display().to_string(),
                    format!("value {value:?} of [{section}] {key} does not parse"),
                )
            }),
            None => Ok(None),
        }
    }

    /// String value lookup in one file.
    pub fn get_string_value(
        &self,
        file: &Path,
        section: &str,
        key: &str,
    ) -> Result<Option<String>> {
        let document = self.load(file)?;
        Ok(document.get(section, key).map(str::to_string))
    }

    /// True when the setting exists in the file.
    pub fn has_setting(&self, file: &Path, section: &str, key: &str) -> Result<bool> {
        Ok(self.load(file)?.has(section, key))
    }

    /// Drop every cached parsed file.
    pub fn clear_cache(&self) {
        self.cache.clear();
    }

    /// Number of cached parsed files.
    pub fn cached_count(&self) -> usize {
        self.cache.len()
    }
}

fn discover_ini_files(dir: &Path) -> Vec<PathBuf> {
    if !dir.is_dir() {
        return Vec::new();
    }
    let mut files: Vec<PathBuf> = WalkDir::new(dir)
        .follow_links(false)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .filter(|entry| {
            entry
                .file_name()
                .to_string_lossy()
                .to_lowercase()
                .ends_with(".ini")
        })
        .map(|entry| entry.into_path())
        .collect();
    files.sort();
    files
}
