use super::*;
use crate::core::context::SettingsProvider;
use std::sync::atomic::{AtomicU32, Ordering};

struct CountingSettings {
    reads: AtomicU32,
    game_root: PathBuf,
}

impl SettingsProvider for CountingSettings {
    fn get_string(&self, key: &str) -> Option<String> {
        if key.starts_with("game_path:") {
            self.reads.fetch_add(1, Ordering::SeqCst);
            Some(self.game_root.to_string_lossy().into_owned())
        } else {
            None
        }
    }
}

fn fake_install(game: Game) -> tempfile::TempDir {
    let dir = tempfile::tempdir().expect("tempdir");
    std::fs::write(dir.path().join(game.spec().executable), b"MZ").expect("exe");
    std::fs::create_dir_all(
        dir.path()
            .join("Data")
            .join(game.spec().xse_base)
            .join("Plugins"),
    )
    .expect("plugins dir");
    dir
}

#[tokio::test]
async fn configured_path_wins_first() {
    let install = fake_install(Game::Fallout4);
    let settings = Arc::new(CountingSettings {
        reads: AtomicU32::new(0),
        game_root: install.path().to_path_buf(),
    });
    let discovery = GamePathDiscovery::new(settings).with_steam_roots(Vec::new());

    let result = discovery.discover_game_path(Game::Fallout4).await;
    assert!(result.is_success);
    assert_eq!(result.method, DiscoveryMethod::ConfiguredPath);

    let paths = result.paths.expect("paths");
    assert_eq!(paths.game_root.as_deref(), Some(install.path()));
    assert!(paths.executable.is_some());
    assert!(paths.script_extender_plugins_path.is_some());
}

#[tokio::test]
async fn concurrent_discoveries_coalesce_to_one_run() {
    let install = fake_install(Game::Fallout4);
    let settings = Arc::new(CountingSettings {
        reads: AtomicU32::new(0),
        game_root: install.path().to_path_buf(),
    });
    let reads = Arc::clone(&settings);
    let discovery =
        Arc::new(GamePathDiscovery::new(settings).with_steam_roots(Vec::new()));

    let mut handles = Vec::new();
    for _ in 0..6 {
        let discovery = Arc::clone(&discovery);
        handles.push(tokio::spawn(async move {
            discovery.discover_game_path(Game::Fallout4).await
        }));
    }

    let mut results = Vec::new();
    for handle in handles {
        results.push(handle.await.expect("join"));
    }

    assert!(results.iter().all(|r| r.is_success));
    let first_paths = results[0].paths.clone();
    assert!(
        results.iter().all(|r| r.paths == first_paths),
        "all coalesced calls must agree"
    );
    assert_eq!(
        reads.reads.load(Ordering::SeqCst),
        1,
        "settings must be read exactly once"
    );
}

#[tokio::test]
async fn steam_library_probe_finds_install() {
    let library = tempfile::tempdir().expect("library");
    let game_dir = library
        .path()
        .join("steamapps")
        .join("common")
        .join(Game::SkyrimSe.spec().name);
    std::fs::create_dir_all(&game_dir).expect("dirs");
    std::fs::write(game_dir.join(Game::SkyrimSe.spec().executable), b"MZ").expect("exe");

    let settings = Arc::new(crate::core::context::InMemorySettings::new());
    let discovery = GamePathDiscovery::new(settings)
        .with_steam_roots(vec![library.path().to_path_buf()]);

    let result = discovery.discover_game_path(Game::SkyrimSe).await;
    assert!(result.is_success);
    assert_eq!(result.method, DiscoveryMethod::SteamLibrary);
}

#[tokio::test]
async fn failed_discovery_reports_unknown_method() {
    let settings = Arc::new(crate::core::context::InMemorySettings::new());
    let discovery = GamePathDiscovery::new(settings).with_steam_roots(Vec::new());

    let result = discovery.discover_game_path(Game::Fallout4Vr).await;
    assert!(!result.is_success);
    assert_eq!(result.method, DiscoveryMethod::Unknown);
    assert!(result.error_message.is_some());
    assert!(result.paths.is_none());
}

#[tokio::test]
async fn xse_log_source_extracts_and_validates_root() {
    let install = fake_install(Game::Fallout4);
    let log_dir = tempfile::tempdir().expect("logdir");
    let log = log_dir.path().join("f4se.log");
    std::fs::write(
        &log,
        format!(
            "F4SE runtime: initialize\nplugin directory = {}{}Data{}F4SE{}Plugins\n",
            install.path().display(),
            std::path::MAIN_SEPARATOR,
            std::path::MAIN_SEPARATOR,
            std::path::MAIN_SEPARATOR,
        ),
    )
    .expect("log");

    let settings = Arc::new(crate::core::context::InMemorySettings::new());
    let discovery = GamePathDiscovery::new(settings)
        .with_steam_roots(Vec::new())
        .with_xse_log(log);

    let result = discovery.discover_game_path(Game::Fallout4).await;
    assert!(result.is_success);
    assert_eq!(result.method, DiscoveryMethod::ScriptExtenderLog);
}

#[test]
fn xse_log_extraction_handles_windows_paths() {
    let content = r"plugin directory = C:\Games\Fallout 4\Data\F4SE\Plugins";
    let root = extract_game_root_from_xse_log(content).expect("match");
    assert_eq!(root, PathBuf::from(r"C:\Games\Fallout 4"));

    assert!(extract_game_root_from_xse_log("no such line").is_none());
}

#[test]
fn proton_documents_path_joins_compatdata() {
    let path = proton_documents_path(Path::new("/data/Steam"), Game::Fallout4.spec());
    let text = path.to_string_lossy();
    assert!(text.contains("compatdata/377160"));
    assert!(text.ends_with("My Games/Fallout4"));
}
