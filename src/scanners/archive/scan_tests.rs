use super::*;
use crate::scanners::archive::header::Ba2Format;

fn valid_header(version: u32, tag: &[u8; 4]) -> Vec<u8> {
    let mut bytes = Vec::new();
    bytes.extend_from_slice(b"BTDX");
    bytes.extend_from_slice(&version.to_le_bytes());
    bytes.extend_from_slice(tag);
    bytes
}

fn write_archive(dir: &Path, name: &str, bytes: &[u8]) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, bytes).expect("write archive");
    path
}

#[test]
fn discovery_matches_case_insensitively() {
    let dir = tempfile::tempdir().expect("tempdir");
    write_archive(dir.path(), "Mod - Main.BA2", &valid_header(1, b"GNRL"));
    write_archive(dir.path(), "textures.ba2", &valid_header(1, b"DX10"));
    write_archive(dir.path(), "readme.txt", b"not an archive");

    let found = find_ba2_files(dir.path());
    assert_eq!(found.len(), 2);
}

#[test]
fn discovery_excludes_prp_main_in_any_case() {
    let dir = tempfile::tempdir().expect("tempdir");
    write_archive(dir.path(), "mod.ba2", &valid_header(1, b"GNRL"));
    write_archive(dir.path(), "PRP - Main.BA2", &valid_header(1, b"GNRL"));
    write_archive(dir.path(), "prp - main.ba2", &valid_header(1, b"GNRL"));

    let found = find_ba2_files(dir.path());
    assert_eq!(found.len(), 1);
    assert!(found[0].to_string_lossy().ends_with("mod.ba2"));
}

#[test]
fn discovery_recurses_subdirectories() {
    let dir = tempfile::tempdir().expect("tempdir");
    let nested = dir.path().join("Data").join("sub");
    std::fs::create_dir_all(&nested).expect("dirs");
    write_archive(&nested, "deep.ba2", &valid_header(1, b"GNRL"));

    let found = find_ba2_files(dir.path());
    assert_eq!(found.len(), 1);
}

#[test]
fn missing_root_yields_empty_list() {
    assert!(find_ba2_files("/no/such/dir/scanner111").is_empty());
}

#[tokio::test]
async fn empty_directory_scan_has_no_issues() {
    let dir = tempfile::tempdir().expect("tempdir");
    let scanner = Ba2Scanner::default();
    let result = scanner
        .scan_directory(dir.path(), &CancelToken::never(), None)
        .await
        .expect("scan");

    assert_eq!(result.total_files_scanned, 0);
    assert!(!result.has_issues());
}

#[tokio::test]
async fn invalid_header_becomes_format_issue() {
    let dir = tempfile::tempdir().expect("tempdir");
    write_archive(dir.path(), "good.ba2", &valid_header(1, b"GNRL"));
    write_archive(dir.path(), "bad.ba2", b"BSA!nothdr??");
    write_archive(dir.path(), "short.ba2", b"BTDX");

    let scanner = Ba2Scanner::default();
    let result = scanner
        .scan_directory(dir.path(), &CancelToken::never(), None)
        .await
        .expect("scan");

    assert_eq!(result.total_files_scanned, 3);
    assert_eq!(result.format_issues.len(), 2);
    assert!(result.has_issues());

    let names: Vec<&str> = result
        .format_issues
        .iter()
        .map(|i| i.archive_name.as_str())
        .collect();
    assert!(names.contains(&"bad.ba2"));
    assert!(names.contains(&"short.ba2"));
}

#[tokio::test]
async fn empty_root_path_fails_fast() {
    let scanner = Ba2Scanner::default();
    let err = scanner
        .scan_directory("", &CancelToken::never(), None)
        .await
        .expect_err("invalid input");
    assert!(matches!(err, crate::core::errors::ScannerError::InvalidInput { .. }));
}

#[tokio::test]
async fn cancellation_stops_the_scan() {
    let dir = tempfile::tempdir().expect("tempdir");
    for n in 0..16 {
        write_archive(dir.path(), &format!("mod{n}.ba2"), &valid_header(1, b"GNRL"));
    }

    let source = crate::concurrency::cancel::CancelSource::new();
    source.cancel();
    let scanner = Ba2Scanner::default();
    let result = scanner
        .scan_directory(dir.path(), &source.token(), None)
        .await;
    assert!(matches!(
        result,
        Err(crate::core::errors::ScannerError::Cancelled)
    ));
}

struct XseProbe;

impl ArchiveContentAnalyzer for XseProbe {
    fn name(&self) -> &str {
        "xse-probe"
    }

    fn kind(&self) -> ArchiveIssueKind {
        ArchiveIssueKind::XseFile
    }

    fn inspect(&self, path: &Path, header: &Ba2HeaderInfo) -> Vec<ArchiveIssue> {
        assert!(header.is_valid);
        if header.format == Ba2Format::General {
            vec![ArchiveIssue {
                archive_path: path.to_path_buf(),
                archive_name: path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default(),
                description: "archive contains script-extender plugin files".to_string(),
            }]
        } else {
            Vec::new()
        }
    }
}

#[tokio::test]
async fn content_analyzers_feed_their_category() {
    let dir = tempfile::tempdir().expect("tempdir");
    write_archive(dir.path(), "general.ba2", &valid_header(1, b"GNRL"));
    write_archive(dir.path(), "textures.ba2", &valid_header(1, b"DX10"));

    let scanner = Ba2Scanner::default().with_content_analyzer(Arc::new(XseProbe));
    let result = scanner
        .scan_directory(dir.path(), &CancelToken::never(), None)
        .await
        .expect("scan");

    assert_eq!(result.xse_file_issues.len(), 1);
    assert_eq!(result.xse_file_issues[0].archive_name, "general.ba2");
    assert!(result.texture_dimension_issues.is_empty());
}

#[tokio::test]
async fn progress_callback_reports_each_file() {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc as StdArc;

    let dir = tempfile::tempdir().expect("tempdir");
    for n in 0..4 {
        write_archive(dir.path(), &format!("m{n}.ba2"), &valid_header(1, b"GNRL"));
    }

    let ticks = StdArc::new(AtomicUsize::new(0));
    let counted = StdArc::clone(&ticks);
    let scanner = Ba2Scanner::default();
    scanner
        .scan_directory(
            dir.path(),
            &CancelToken::never(),
            Some(Box::new(move |done, total| {
                assert!(done <= total);
                counted.fetch_add(1, Ordering::SeqCst);
            })),
        )
        .await
        .expect("scan");

    assert_eq!(ticks.load(Ordering::SeqCst), 4);
}
