//! Mod and plugin integrity checks.
//!
//! Small, file-level validations used by the FCX analyzer: archive
//! invalidation in the custom ini, script-extender loader presence, Address
//! Library presence, and semantic version ordering for loader/plugin
//! version comparisons.

use std::cmp::Ordering;
use std::path::Path;

use tracing::info;

use crate::core::errors::{Result, ScannerError};
use crate::core::GameSpec;
use crate::scanners::ini::IniDocument;

const ARCHIVE_SECTION: &str = "Archive";
const INVALIDATION_KEY: &str = "bInvalidateOlderFiles";

/// True when the custom ini already enables archive invalidation.
pub fn archive_invalidation_enabled(custom_ini: &Path) -> Result<bool> {
    if !custom_ini.is_file() {
        return Ok(false);
    }
    let text = std::fs::read_to_string(custom_ini)
        .map_err(|e| ScannerError::io(format!("failed to read {}", custom_ini.display()), e))?;
    let document = IniDocument::parse(&text);
    Ok(document
        .get(ARCHIVE_SECTION, INVALIDATION_KEY)
        .map(|v| v.trim() == "1")
        .unwrap_or(false))
}

/// Ensure `bInvalidateOlderFiles=1` is present under `[Archive]` in the
/// custom ini, creating the file when missing. Returns true when the file
/// was modified.
pub fn ensure_archive_invalidation(custom_ini: &Path) -> Result<bool> {
    let text = if custom_ini.is_file() {
        std::fs::read_to_string(custom_ini)
            .map_err(|e| ScannerError::io(format!("failed to read {}", custom_ini.display()), e))?
    } else {
        String::new()
    };

    let mut document = IniDocument::parse(&text);
    if document
        .get(ARCHIVE_SECTION, INVALIDATION_KEY)
        .map(|v| v.trim() == "1")
        .unwrap_or(false)
    {
        return Ok(false);
    }

    document.set(ARCHIVE_SECTION, INVALIDATION_KEY, "1");
    document.set(ARCHIVE_SECTION, "sResourceDataDirsFinal", "");
    std::fs::write(custom_ini, document.to_ini_string())
        .map_err(|e| ScannerError::io(format!("failed to write {}", custom_ini.display()), e))?;
    info!(file = %custom_ini.display(), "enabled archive invalidation");
    Ok(true)
}

/// True when the script-extender loader sits beside the game executable.
pub fn xse_installed(game_root: &Path, spec: &GameSpec) -> bool {
    game_root.join(spec.xse_loader).is_file()
}

/// True when an Address Library binary is present under the
/// script-extender plugins directory. The library ships as
/// `<prefix><game-version>.bin` (for example `version-1-10-163-0.bin`).
pub fn address_library_present(game_root: &Path, spec: &GameSpec) -> bool {
    let plugins = game_root.join("Data").join(spec.xse_base).join("Plugins");
    let Ok(entries) = std::fs::read_dir(&plugins) else {
        return false;
    };
    entries.filter_map(|entry| entry.ok()).any(|entry| {
        let name = entry.file_name().to_string_lossy().to_lowercase();
        name.starts_with(spec.address_library_prefix) && name.ends_with(".bin")
    })
}

/// Compare dotted version strings by numeric components. Unparseable
/// versions order below any parseable one; two unparseable versions are
/// equal.
pub fn compare_versions(a: &str, b: &str) -> Ordering {
    match (parse_version(a), parse_version(b)) {
        (Some(a), Some(b)) => a.cmp(&b),
        (Some(_), None) => Ordering::Greater,
        (None, Some(_)) => Ordering::Less,
        (None, None) => Ordering::Equal,
    }
}

/// Parse a dotted version such as `1.10.163` or `v1.26.2`, tolerating a
/// leading `v` and trailing junk on the last component.
pub fn parse_version(text: &str) -> Option<Vec<u64>> {
    let text = text.trim().trim_start_matches(['v', 'V']);
    if text.is_empty() {
        return None;
    }
    let mut components = Vec::new();
    for part in text.split('.') {
        let digits: String = part.chars().take_while(char::is_ascii_digit).collect();
        if digits.is_empty() {
            return if components.is_empty() {
                None
            } else {
                Some(components)
            };
        }
        components.push(digits.parse::<u64>().ok()?);
    }
    Some(components)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::FALLOUT4;

    #[test]
    fn version_ordering_is_numeric() {
        assert_eq!(compare_versions("1.10.163", "1.9.4"), Ordering::Greater);
        assert_eq!(compare_versions("1.10.163", "1.10.163"), Ordering::Equal);
        assert_eq!(compare_versions("0.6.23", "0.6.21"), Ordering::Greater);
        assert_eq!(compare_versions("v1.26.2", "1.26.2"), Ordering::Equal);
    }

    #[test]
    fn unparseable_sorts_below_parseable() {
        assert_eq!(compare_versions("garbage", "0.0.1"), Ordering::Less);
        assert_eq!(compare_versions("1.0", "garbage"), Ordering::Greater);
        assert_eq!(compare_versions("???", "garbage"), Ordering::Equal);
    }

    #[test]
    fn shorter_versions_compare_lexicographically() {
        assert_eq!(compare_versions("1.10", "1.10.0"), Ordering::Less);
        assert_eq!(compare_versions("2", "1.99.99"), Ordering::Greater);
    }

    #[test]
    fn invalidation_is_inserted_once() {
        let dir = tempfile::tempdir().expect("tempdir");
        let ini = dir.path().join("Fallout4Custom.ini");
        std::fs::write(&ini, "[Display]\niSize W=2560\n").expect("seed");

        assert!(!archive_invalidation_enabled(&ini).expect("check"));
        assert!(ensure_archive_invalidation(&ini).expect("insert"));
        assert!(archive_invalidation_enabled(&ini).expect("now enabled"));
        assert!(
            !ensure_archive_invalidation(&ini).expect("idempotent"),
            "second call must not modify"
        );

        let text = std::fs::read_to_string(&ini).expect("read back");
        assert!(text.contains("[Display]"), "existing sections survive");
        assert!(text.contains("bInvalidateOlderFiles=1"));
    }

    #[test]
    fn invalidation_creates_missing_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let ini = dir.path().join("Fallout4Custom.ini");
        assert!(ensure_archive_invalidation(&ini).expect("create"));
        assert!(ini.is_file());
        assert!(archive_invalidation_enabled(&ini).expect("enabled"));
    }

    #[test]
    fn xse_and_address_library_presence() {
        let dir = tempfile::tempdir().expect("tempdir");
        assert!(!xse_installed(dir.path(), &FALLOUT4));
        assert!(!address_library_present(dir.path(), &FALLOUT4));

        std::fs::write(dir.path().join(FALLOUT4.xse_loader), b"MZ").expect("loader");
        let plugins = dir.path().join("Data").join("F4SE").join("Plugins");
        std::fs::create_dir_all(&plugins).expect("plugins dir");
        std::fs::write(plugins.join("version-1-10-163-0.bin"), b"lib").expect("lib");

        assert!(xse_installed(dir.path(), &FALLOUT4));
        assert!(address_library_present(dir.path(), &FALLOUT4));
    }
}
