//! Archive discovery and bulk scanning.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::concurrency::cancel::CancelToken;
use crate::core::errors::{Result, ScannerError};
use crate::scanners::ProgressCallback;

use super::header::{self, Ba2HeaderInfo, BA2_HEADER_LEN};

#[cfg(test)]
#[path = "scan_tests.rs"]
mod tests;

/// A previs-repair archive whose intentionally odd layout would flood the
/// scan with false positives; always excluded from discovery.
const EXCLUDED_ARCHIVE: &str = "prp - main.ba2";

/// One problem found in one archive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchiveIssue {
    /// Archive path.
    pub archive_path: PathBuf,
    /// Archive file name.
    pub archive_name: String,
    /// What is wrong.
    pub description: String,
}

/// Aggregate scan outcome.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Ba2ScanResult {
    /// Archives whose header failed validation.
    pub format_issues: Vec<ArchiveIssue>,
    /// Texture archives with invalid dimensions (from content analyzers).
    pub texture_dimension_issues: Vec<ArchiveIssue>,
    /// Archives with unplayable sound formats (from content analyzers).
    pub sound_format_issues: Vec<ArchiveIssue>,
    /// Archives carrying script-extender plugin files (from content
    /// analyzers).
    pub xse_file_issues: Vec<ArchiveIssue>,
    /// Number of archives examined.
    pub total_files_scanned: usize,
}

impl Ba2ScanResult {
    /// True when any category holds at least one issue.
    pub fn has_issues(&self) -> bool {
        !self.format_issues.is_empty()
            || !self.texture_dimension_issues.is_empty()
            || !self.sound_format_issues.is_empty()
            || !self.xse_file_issues.is_empty()
    }
}

/// Issue categories a content analyzer can contribute to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveIssueKind {
    /// Goes into [`Ba2ScanResult::texture_dimension_issues`].
    TextureDimension,
    /// Goes into [`Ba2ScanResult::sound_format_issues`].
    SoundFormat,
    /// Goes into [`Ba2ScanResult::xse_file_issues`].
    XseFile,
}

/// Pluggable analyzer over archive contents. The core guarantees only the
/// discovery and header protocol; content analysis (texture dimensions,
/// packed XSE plugins) is supplied through this seam.
pub trait ArchiveContentAnalyzer: Send + Sync {
    /// Analyzer name for logging.
    fn name(&self) -> &str;

    /// Which result category this analyzer's findings land in.
    fn kind(&self) -> ArchiveIssueKind;

    /// Inspect one archive with a validated header.
    fn inspect(&self, path: &Path, header: &Ba2HeaderInfo) -> Vec<ArchiveIssue>;
}

/// Scan tuning.
#[derive(Debug, Clone)]
pub struct Ba2ScanOptions {
    /// Maximum archives inspected concurrently.
    pub max_parallelism: usize,
}

impl Default for Ba2ScanOptions {
    fn default() -> Self {
        Self { max_parallelism: 8 }
    }
}

/// Recursively discover `*.ba2` files under `root`, case-insensitively,
/// excluding the known previs-repair archive in any casing. A non-existent
/// root yields an empty list, never an error.
pub fn find_ba2_files(root: impl AsRef<Path>) -> Vec<PathBuf> {
    let root = root.as_ref();
    if !root.is_dir() {
        return Vec::new();
    }

    let mut archives: Vec<PathBuf> = WalkDir::new(root)
        .follow_links(false)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .filter(|entry| {
            let name = entry.file_name().to_string_lossy().to_lowercase();
            name.ends_with(".ba2") && name != EXCLUDED_ARCHIVE
        })
        .map(|entry| entry.into_path())
        .collect();
    archives.sort();
    archives
}

/// Bulk archive scanner with pluggable content analyzers.
#[derive(Default)]
pub struct Ba2Scanner {
    options: Ba2ScanOptions,
    content_analyzers: Vec<Arc<dyn ArchiveContentAnalyzer>>,
}

impl Ba2Scanner {
    /// Create a scanner with default options and no content analyzers.
    pub fn new(options: Ba2ScanOptions) -> Self {
        Self {
            options,
            content_analyzers: Vec::new(),
        }
    }

    /// Register a content analyzer.
    #[must_use]
    pub fn with_content_analyzer(mut self, analyzer: Arc<dyn ArchiveContentAnalyzer>) -> Self {
        self.content_analyzers.push(analyzer);
        self
    }

    /// Discover and scan every archive under `root`. Header checks run in
    /// parallel up to the configured bound; cancellation is observed between
    /// files.
    pub async fn scan_directory(
        &self,
        root: impl AsRef<Path>,
        cancel: &CancelToken,
        progress: Option<ProgressCallback>,
    ) -> Result<Ba2ScanResult> {
        let root = root.as_ref();
        if root.as_os_str().is_empty() {
            return Err(ScannerError::invalid_input("archive scan root is empty"));
        }

        let archives = find_ba2_files(root);
        let total = archives.len();
        debug!(root = %root.display(), total, "scanning archives");

        let gate = Arc::new(Semaphore::new(self.options.max_parallelism.max(1)));
        let mut handles = Vec::with_capacity(total);

        for path in archives {
            cancel.check()?;
            let gate = Arc::clone(&gate);
            let analyzers = self.content_analyzers.clone();
            handles.push(tokio::spawn(async move {
                let _permit = gate.acquire_owned().await.ok();
                tokio::task::spawn_blocking(move || Self::scan_one(&path, &analyzers))
                    .await
                    .unwrap_or_else(|e| {
                        Err(ScannerError::concurrency(format!(
                            "archive worker panicked: {e}"
                        )))
                    })
            }));
        }

        let mut result = Ba2ScanResult::default();
        for (done, handle) in handles.into_iter().enumerate() {
            let scanned = tokio::select! {
                joined = handle => joined
                    .map_err(|e| ScannerError::concurrency(format!("archive task lost: {e}")))?,
                () = cancel.cancelled() => return Err(ScannerError::Cancelled),
            };

            match scanned {
                Ok(outcome) => {
                    result.total_files_scanned += 1;
                    result.format_issues.extend(outcome.format);
                    result.texture_dimension_issues.extend(outcome.texture);
                    result.sound_format_issues.extend(outcome.sound);
                    result.xse_file_issues.extend(outcome.xse);
                }
                Err(err) => {
                    // One unreadable archive must not abort the scan.
                    warn!(error = %err, "archive scan item failed");
                    result.total_files_scanned += 1;
                }
            }

            if let Some(ref progress) = progress {
                progress(done + 1, total);
            }
        }

        Ok(result)
    }

    fn scan_one(
        path: &Path,
        analyzers: &[Arc<dyn ArchiveContentAnalyzer>],
    ) -> Result<ScannedArchive> {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        let mut outcome = ScannedArchive::default();
        let info = header::read_header(path)?;

        if !info.is_valid {
            let raw = std::fs::File::open(path)
                .and_then(|mut f| {
                    use std::io::Read as _;
                    let mut buf = [0u8; BA2_HEADER_LEN];
                    let n = f.read(&mut buf)?;
                    Ok(buf[..n].to_vec())
                })
                .unwrap_or_default();
            outcome.format.push(ArchiveIssue {
                archive_path: path.to_path_buf(),
                archive_name: name,
                description: format!(
                    "invalid BA2 header: {}",
                    header::header_bytes_display(&raw)
                ),
            });
            return Ok(outcome);
        }

        for analyzer in analyzers {
            let issues = analyzer.inspect(path, &info);
            match analyzer.kind() {
                ArchiveIssueKind::TextureDimension => outcome.texture.extend(issues),
                ArchiveIssueKind::SoundFormat => outcome.sound.extend(issues),
                ArchiveIssueKind::XseFile => outcome.xse.extend(issues),
            }
        }
        Ok(outcome)
    }
}

#[derive(Default)]
struct ScannedArchive {
    format: Vec<ArchiveIssue>,
    texture: Vec<ArchiveIssue>,
    sound: Vec<ArchiveIssue>,
    xse: Vec<ArchiveIssue>,
}
