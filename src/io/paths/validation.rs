//! Filesystem path validation with a TTL cache.
//!
//! Validation probes are real filesystem operations (open-for-read, first
//! directory entry, temp-file create-and-delete), so results are cached by
//! normalised path for a short TTL and the number of concurrent probes is
//! bounded by a counting semaphore.

use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use tokio::sync::Semaphore;
use tracing::trace;
use uuid::Uuid;

use crate::core::errors::{Result, ScannerError};

#[cfg(test)]
#[path = "validation_tests.rs"]
mod tests;

/// Default cache TTL for validation results.
pub const DEFAULT_VALIDATION_TTL: Duration = Duration::from_secs(120);

/// Probe concurrency bound.
const MAX_CONCURRENT_VALIDATIONS: usize = 10;

/// Outcome of validating one path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathValidationResult {
    /// The path as supplied by the caller.
    pub path: PathBuf,
    /// True when the path exists and every requested access probe passed.
    pub is_valid: bool,
    /// True when the path exists.
    pub exists: bool,
    /// Outcome of the read probe (true when not requested).
    pub can_read: bool,
    /// Outcome of the write probe (true when not requested).
    pub can_write: bool,
    /// Top-level failure description, if any.
    pub error_message: Option<String>,
    /// Individual probe findings.
    pub issues: Vec<String>,
}

impl PathValidationResult {
    fn invalid(path: PathBuf, message: impl Into<String>) -> Self {
        let message = message.into();
        Self {
            path,
            is_valid: false,
            exists: false,
            can_read: false,
            can_write: false,
            error_message: Some(message.clone()),
            issues: vec![message],
        }
    }
}

/// Collapse `.` components and platform separators into a canonical-ish
/// textual form without touching the filesystem. Idempotent:
/// `normalize_path(normalize_path(p)) == normalize_path(p)`.
pub fn normalize_path(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Characters never valid in a path component on the platforms the games
/// ship on.
const INVALID_COMPONENT_CHARS: &[char] = &['<', '>', ':', '"', '|', '?', '*'];

/// True when `path` contains no traversal (`..`), no invalid characters, and
/// (when `base` is given) stays inside `base` after normalisation.
pub fn is_path_safe(path: &Path, base: Option<&Path>) -> bool {
    for component in path.components() {
        match component {
            Component::ParentDir => return false,
            Component::Normal(part) => {
                let text = part.to_string_lossy();
                if text
                    .chars()
                    .any(|c| c.is_control() || INVALID_COMPONENT_CHARS.contains(&c))
                {
                    return false;
                }
            }
            _ => {}
        }
    }

    if let Some(base) = base {
        let normalized = normalize_path(path);
        let base = normalize_path(base);
        if !normalized.starts_with(&base) {
            return false;
        }
    }

    true
}

struct CachedValidation {
    result: PathValidationResult,
    inserted_at: Instant,
}

/// Thread-safe validation service with an ordinal-case-insensitive cache.
pub struct PathValidationService {
    cache: DashMap<String, CachedValidation>,
    ttl: Duration,
    gate: Arc<Semaphore>,
}

impl Default for PathValidationService {
    fn default() -> Self {
        Self::new(DEFAULT_VALIDATION_TTL)
    }
}

impl PathValidationService {
    /// Create a service with the given cache TTL. A zero TTL disables
    /// caching.
    pub fn new(ttl: Duration) -> Self {
        Self {
            cache: DashMap::new(),
            ttl,
            gate: Arc::new(Semaphore::new(MAX_CONCURRENT_VALIDATIONS)),
        }
    }

    fn cache_key(path: &Path, check_read: bool, check_write: bool) -> String {
        format!(
            "{}|r{}w{}",
            normalize_path(path).to_string_lossy().to_lowercase(),
            u8::from(check_read),
            u8::from(check_write)
        )
    }

    /// Validate `path`, probing read and/or write access as requested.
    pub async fn validate_path(
        &self,
        path: impl AsRef<Path>,
        check_read: bool,
        check_write: bool,
    ) -> Result<PathValidationResult> {
        let path = path.as_ref().to_path_buf();
        if path.as_os_str().is_empty() {
            return Ok(PathValidationResult::invalid(path, "path is empty"));
        }

        let key = Self::cache_key(&path, check_read, check_write);
        if !self.ttl.is_zero() {
            if let Some(entry) = self.cache.get(&key) {
                if entry.inserted_at.elapsed() < self.ttl {
                    trace!(path = %path.display(), "validation cache hit");
                    return Ok(entry.result.clone());
                }
            }
        }

        let _permit = self
            .gate
            .acquire()
            .await
            .map_err(|_| ScannerError::concurrency("validation gate closed"))?;

        let probe_path = path.clone();
        let result = tokio::task::spawn_blocking(move || {
            probe(&probe_path, check_read, check_write)
        })
        .await
        .map_err(|e| ScannerError::concurrency(format!("validation probe panicked: {e}")))?;

        if !self.ttl.is_zero() {
            self.cache.insert(
                key,
                CachedValidation {
                    result: result.clone(),
                    inserted_at: Instant::now(),
                },
            );
        }
        Ok(result)
    }

    /// Drop every cached result.
    pub fn clear_cache(&self) {
        self.cache.clear();
    }

    /// Number of cached validation results.
    pub fn cached_count(&self) -> usize {
        self.cache.len()
    }
}

fn probe(path: &Path, check_read: bool, check_write: bool) -> PathValidationResult {
    let exists = path.exists();
    if !exists {
        return PathValidationResult::invalid(path.to_path_buf(), "path does not exist");
    }

    let mut issues = Vec::new();
    let is_dir = path.is_dir();

    let can_read = if check_read {
        match probe_read(path, is_dir) {
            Ok(()) => true,
            Err(e) if access_denied(&e) => {
                issues.push(format!("no read access: {e}"));
                false
            }
            Err(e) => {
                // A busy file (sharing violation, transient IO) is still
                // considered readable for validation purposes.
                issues.push(format!("file busy but readable: {e}"));
                true
            }
        }
    } else {
        true
    };

    let can_write = if check_write {
        match probe_write(path, is_dir) {
            Ok(()) => true,
            Err(e) => {
                issues.push(format!("no write access: {e}"));
                false
            }
        }
    } else {
        true
    };

    let is_valid = can_read && can_write;
    PathValidationResult {
        path: path.to_path_buf(),
        is_valid,
        exists,
        can_read,
        can_write,
        error_message: if is_valid {
            None
        } else {
            Some("access checks failed".to_string())
        },
        issues,
    }
}

fn access_denied(err: &io::Error) -> bool {
    err.kind() == io::ErrorKind::PermissionDenied
}

fn probe_read(path: &Path, is_dir: bool) -> io::Result<()> {
    if is_dir {
        let mut entries = fs::read_dir(path)?;
        // Enumerating the first entry proves listability; an empty directory
        // is readable.
        if let Some(entry) = entries.next() {
            entry?;
        }
        Ok(())
    } else {
        File::open(path).map(|_| ())
    }
}

fn probe_write(path: &Path, is_dir: bool) -> io::Result<()> {
    if is_dir {
        let probe_name = format!(".scanner111-probe-{}", Uuid::new_v4());
        let probe_path = path.join(probe_name);
        File::create(&probe_path)?;
        fs::remove_file(&probe_path)
    } else {
        OpenOptions::new().write(true).open(path).map(|_| ())
    }
}
