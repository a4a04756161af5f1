//! Scanning a synthetic game installation: archives, ini files, and the
//! crash-generator TOML together.

use std::path::{Path, PathBuf};

use scanner111::concurrency::CancelToken;
use scanner111::core::Game;
use scanner111::scanners::archive::{find_ba2_files, read_header, Ba2Format, Ba2Scanner};
use scanner111::scanners::ini::IniScanner;
use scanner111::scanners::toml_cfg::TomlScanner;

fn ba2_bytes(version: u32, tag: &[u8; 4]) -> Vec<u8> {
    let mut bytes = Vec::new();
    bytes.extend_from_slice(b"BTDX");
    bytes.extend_from_slice(&version.to_le_bytes());
    bytes.extend_from_slice(tag);
    bytes
}

struct FakeInstall {
    root: tempfile::TempDir,
}

impl FakeInstall {
    fn new() -> Self {
        let root = tempfile::tempdir().expect("tempdir");
        let data = root.path().join("Data");
        std::fs::create_dir_all(data.join("F4SE").join("Plugins")).expect("dirs");

        std::fs::write(data.join("Mod - Main.ba2"), ba2_bytes(1, b"GNRL")).expect("ba2");
        std::fs::write(data.join("Mod - Textures.ba2"), ba2_bytes(1, b"DX10")).expect("ba2");
        std::fs::write(data.join("Broken - Main.ba2"), b"JUNKJUNKJUNK").expect("ba2");
        std::fs::write(data.join("prp - main.ba2"), ba2_bytes(1, b"GNRL")).expect("ba2");

        Self { root }
    }

    fn data(&self) -> PathBuf {
        self.root.path().join("Data")
    }

    fn plugins(&self) -> PathBuf {
        self.data().join("F4SE").join("Plugins")
    }

    fn docs(&self) -> &Path {
        self.root.path()
    }
}

#[tokio::test]
async fn archive_sweep_finds_the_broken_header_and_skips_prp() -> anyhow::Result<()> {
    scanner111::init_tracing();
    let install = FakeInstall::new();

    let archives = find_ba2_files(install.data());
    assert_eq!(archives.len(), 3, "prp - main.ba2 is excluded");

    let result = Ba2Scanner::default()
        .scan_directory(install.data(), &CancelToken::never(), None)
        .await?;

    assert_eq!(result.total_files_scanned, 3);
    assert_eq!(result.format_issues.len(), 1);
    assert_eq!(result.format_issues[0].archive_name, "Broken - Main.ba2");

    let texture = read_header(install.data().join("Mod - Textures.ba2"))?;
    assert!(texture.is_valid);
    assert_eq!(texture.format, Ba2Format::Texture);
    Ok(())
}

#[tokio::test]
async fn ini_sweep_reports_console_command_and_vsync_together() {
    let install = FakeInstall::new();
    std::fs::write(
        install.docs().join("Fallout4Custom.ini"),
        "[General]\nsStartingConsoleCommand=help\n\n[Archive]\nbInvalidateOlderFiles=1\n",
    )
    .expect("ini");
    std::fs::write(
        install.docs().join("enblocal.ini"),
        "[ENGINE]\nForceVSync=true\n",
    )
    .expect("ini");

    let scanner = IniScanner::default();
    let result = scanner
        .scan(install.docs(), Game::Fallout4, &CancelToken::never(), None)
        .await
        .expect("scan");

    assert_eq!(result.console_command_issues.len(), 1);
    assert_eq!(result.console_command_issues[0].current_value, "help");
    assert_eq!(result.vsync_issues.len(), 1);
    assert!(result.has_issues());
}

#[tokio::test]
async fn toml_sweep_cross_references_installed_dlls() {
    let install = FakeInstall::new();
    let plugins = install.plugins();

    std::fs::write(plugins.join("f4ee.dll"), b"MZ").expect("dll");
    let buffout = plugins.join("Buffout4");
    std::fs::create_dir_all(&buffout).expect("dir");
    std::fs::write(
        buffout.join("config.toml"),
        "[Compatibility]\nF4EE = false\n\n[Patches]\nAchievements = true\n",
    )
    .expect("config");

    let result = TomlScanner
        .scan(&plugins, Game::Fallout4, &CancelToken::never(), None)
        .await
        .expect("scan");

    assert!(result.config_file_found);
    assert!(!result.has_duplicate_configs);
    // Only f4ee.dll is installed, so only the F4EE row of the matrix fires.
    assert_eq!(result.issues.len(), 1);
    assert_eq!(result.issues[0].key, "F4EE");
    assert_eq!(result.issues[0].recommended_value.as_deref(), Some("True"));
}

#[tokio::test]
async fn progress_callbacks_fire_across_scanners() {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    let install = FakeInstall::new();
    let ticks = Arc::new(AtomicUsize::new(0));

    let counted = Arc::clone(&ticks);
    Ba2Scanner::default()
        .scan_directory(
            install.data(),
            &CancelToken::never(),
            Some(Box::new(move |_, _| {
                counted.fetch_add(1, Ordering::SeqCst);
            })),
        )
        .await
        .expect("scan");

    assert_eq!(ticks.load(Ordering::SeqCst), 3, "one tick per archive");
}
