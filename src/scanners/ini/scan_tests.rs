use super::*;
use crate::core::analyzer::Severity;

fn write_ini(dir: &Path, name: &str, content: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, content).expect("write ini");
    path
}

async fn scan_dir(scanner: &IniScanner, dir: &Path) -> IniScanResult {
    scanner
        .scan(dir, Game::Fallout4, &CancelToken::never(), None)
        .await
        .expect("scan")
}

#[tokio::test]
async fn console_command_in_custom_ini_is_flagged() {
    let dir = tempfile::tempdir().expect("tempdir");
    write_ini(
        dir.path(),
        "fallout4custom.ini",
        "[General]\nsStartingConsoleCommand=help\n",
    );

    let scanner = IniScanner::default();
    let result = scan_dir(&scanner, dir.path()).await;

    assert_eq!(result.console_command_issues.len(), 1);
    let issue = &result.console_command_issues[0];
    assert_eq!(issue.current_value, "help");
    assert_eq!(issue.key, "sStartingConsoleCommand");
    assert_eq!(issue.severity, Severity::Warning);
}

#[tokio::test]
async fn vsync_rules_cover_enb_and_physics_fix() {
    let dir = tempfile::tempdir().expect("tempdir");
    write_ini(dir.path(), "enblocal.ini", "[ENGINE]\nForceVSync=true\n");
    write_ini(
        dir.path(),
        "HighFPSPhysicsFix.ini",
        "[Main]\nEnableVSync=1\nLoadingScreenFPS=350\n",
    );

    let scanner = IniScanner::default();
    let result = scan_dir(&scanner, dir.path()).await;

    assert_eq!(result.vsync_issues.len(), 2);
    assert!(result
        .vsync_issues
        .iter()
        .any(|i| i.file_name.eq_ignore_ascii_case("enblocal.ini")));
}

#[tokio::test]
async fn loading_screen_fps_below_floor_is_flagged() {
    let dir = tempfile::tempdir().expect("tempdir");
    write_ini(
        dir.path(),
        "highfpsphysicsfix.ini",
        "[Main]\nLoadingScreenFPS=30\n",
    );

    let scanner = IniScanner::default();
    let result = scan_dir(&scanner, dir.path()).await;
    assert_eq!(result.issues.len(), 1);
    assert_eq!(result.issues[0].key, "LoadingScreenFPS");
    assert_eq!(result.issues[0].recommended_value.as_deref(), Some("60.0"));
}

#[tokio::test]
async fn particle_count_above_cap_recommends_cap() {
    let dir = tempfile::tempdir().expect("tempdir");
    write_ini(dir.path(), "epo.ini", "[Particles]\niMaxDesired=9000\n");

    let scanner = IniScanner::default();
    let result = scan_dir(&scanner, dir.path()).await;
    assert_eq!(result.issues.len(), 1);
    assert_eq!(result.issues[0].recommended_value.as_deref(), Some("5000"));
}

#[tokio::test]
async fn f4ee_locked_parts_are_flagged() {
    let dir = tempfile::tempdir().expect("tempdir");
    write_ini(
        dir.path(),
        "f4ee.ini",
        "[CharGen]\nbUnlockHeadParts=0\nbUnlockTints=0\n",
    );

    let scanner = IniScanner::default();
    let result = scan_dir(&scanner, dir.path()).await;
    assert_eq!(result.issues.len(), 2);
    assert!(result.issues.iter().all(|i| i.recommended_value.as_deref() == Some("1")));
}

#[tokio::test]
async fn commented_hotkey_recommends_default() {
    let dir = tempfile::tempdir().expect("tempdir");
    write_ini(
        dir.path(),
        "espexplorer.ini",
        "[Main]\n; HotKey = 0x79\n",
    );

    let scanner = IniScanner::default();
    let result = scan_dir(&scanner, dir.path()).await;
    assert_eq!(result.issues.len(), 1);
    assert_eq!(result.issues[0].recommended_value.as_deref(), Some("0x79"));

    // An uncommented hotkey is fine.
    let dir2 = tempfile::tempdir().expect("tempdir");
    write_ini(dir2.path(), "espexplorer.ini", "[Main]\nHotKey=0x79\n");
    let clean = scan_dir(&scanner, dir2.path()).await;
    assert!(clean.issues.is_empty());
}

#[tokio::test]
async fn clean_files_produce_no_issues() {
    let dir = tempfile::tempdir().expect("tempdir");
    write_ini(
        dir.path(),
        "fallout4.ini",
        "[General]\nuGridsToLoad=5\n[Display]\niSize W=2560\n",
    );

    let scanner = IniScanner::default();
    let result = scan_dir(&scanner, dir.path()).await;
    assert!(!result.has_issues());
    assert_eq!(result.files_scanned, 1);
}

#[tokio::test]
async fn malformed_bytes_degrade_and_scan_continues() {
    let dir = tempfile::tempdir().expect("tempdir");
    // Not valid UTF-8; the scanner decodes lossily and keeps going.
    std::fs::write(
        dir.path().join("a_mangled.ini"),
        [0xff, 0xfe, b'[', b'X', b']', b'\n'],
    )
    .expect("write mangled");
    write_ini(
        dir.path(),
        "fallout4custom.ini",
        "[General]\nsStartingConsoleCommand=cqf\n",
    );

    let scanner = IniScanner::default();
    let result = scan_dir(&scanner, dir.path()).await;

    assert_eq!(result.files_scanned, 2, "mangled file is still visited");
    assert!(result.parse_failures.is_empty(), "lossy decode is tolerated");
    assert_eq!(
        result.console_command_issues.len(),
        1,
        "later files still scan"
    );
}

#[tokio::test]
async fn typed_lookups_and_cache() {
    let dir = tempfile::tempdir().expect("tempdir");
    let file = write_ini(
        dir.path(),
        "fallout4.ini",
        "[General]\nuGridsToLoad=5\nsIntroSequence=\n",
    );

    let scanner = IniScanner::default();
    let grids: Option<u32> = scanner
        .get_value(&file, "General", "uGridsToLoad")
        .expect("parses");
    assert_eq!(grids, Some(5));

    let missing: Option<u32> = scanner
        .get_value(&file, "General", "NoSuchKey")
        .expect("absent is ok");
    assert_eq!(missing, None);

    let bad: Result<Option<u32>> = scanner.get_value(&file, "General", "sIntroSequence");
    assert!(bad.is_err(), "non-numeric value must be a parse error");

    assert!(scanner
        .has_setting(&file, "general", "ugridstoload")
        .expect("case-insensitive"));
    assert_eq!(
        scanner
            .get_string_value(&file, "General", "uGridsToLoad")
            .expect("string"),
        Some("5".to_string())
    );

    assert_eq!(scanner.cached_count(), 1);
    scanner.clear_cache();
    assert_eq!(scanner.cached_count(), 0);
}
