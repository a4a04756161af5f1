//! Multi-source game-installation discovery.
//!
//! Sources are tried in a fixed order — configured path, OS registry,
//! script-extender log, Steam library probing — and the first candidate that
//! passes [`GamePathDiscovery::validate_game_path`] wins. Successful results
//! are cached per `(game, vr)` for five minutes, and concurrent discoveries
//! of the same game are coalesced behind one guard so the source sequence
//! runs at most once.
//!
//! The configured-path source reads `game_path:<GameName>` from the settings
//! provider. Registry reads go through the [`RegistryAccess`] seam; the
//! default implementation answers nothing on every platform, keeping the
//! Windows key templates visible without a registry dependency in the core.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::core::context::SettingsProvider;
use crate::core::{Game, GameSpec};

#[cfg(test)]
#[path = "discovery_tests.rs"]
mod tests;

/// Cache TTL for discovery results.
pub const DISCOVERY_TTL: Duration = Duration::from_secs(300);

/// Registry key template for Bethesda-published installs (Windows only).
/// `{game}` is the game name, with `VR` appended for VR editions.
pub const BETHESDA_KEY_TEMPLATE: &str =
    r"HKLM\SOFTWARE\WOW6432Node\Bethesda Softworks\{game}";

/// Registry key template for GOG installs (Windows only).
pub const GOG_KEY_TEMPLATE: &str = r"HKLM\SOFTWARE\WOW6432Node\GOG.com\Games\{gog_id}";

/// Registry value holding the user's documents folder (Windows only).
pub const SHELL_FOLDERS_KEY: &str =
    r"HKCU\Software\Microsoft\Windows\CurrentVersion\Explorer\Shell Folders";

/// Fixed Steam roots probed on Windows installs.
const WINDOWS_STEAM_ROOTS: &[&str] = &[
    r"C:\Program Files (x86)\Steam",
    r"C:\Program Files\Steam",
    r"D:\Steam",
    r"E:\Steam",
];

static XSE_PLUGIN_DIR_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)plugin directory\s*=\s*(.+?)[\\/]+Data[\\/]+[A-Z0-9]+[\\/]+Plugins")
        .expect("static regex")
});

/// How a game installation was located.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DiscoveryMethod {
    /// The caller configured the path explicitly.
    ConfiguredPath,
    /// OS registry lookup.
    Registry,
    /// Extracted from the script-extender log.
    ScriptExtenderLog,
    /// Probed under a Steam library.
    SteamLibrary,
    /// No source produced a valid path.
    Unknown,
}

/// The set of well-known paths derived from a discovered installation.
/// Everything is optional: a path is present only when the file or
/// directory actually exists.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GamePaths {
    /// Install root.
    pub game_root: Option<PathBuf>,
    /// Main game executable.
    pub executable: Option<PathBuf>,
    /// Script-extender native plugins directory under `Data`.
    pub script_extender_plugins_path: Option<PathBuf>,
    /// `My Games/<game>` documents directory.
    pub documents_path: Option<PathBuf>,
    /// Main game ini in documents.
    pub game_ini: Option<PathBuf>,
    /// Custom-override ini in documents.
    pub game_custom_ini: Option<PathBuf>,
    /// Script-extender log in documents.
    pub script_extender_log: Option<PathBuf>,
    /// Papyrus script log in documents.
    pub papyrus_log: Option<PathBuf>,
    /// `steam_api.ini` beside the executable, when present.
    pub steam_api_ini: Option<PathBuf>,
}

/// Outcome of one discovery run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathDiscoveryResult {
    /// True when a validated installation was found.
    pub is_success: bool,
    /// Derived paths on success.
    pub paths: Option<GamePaths>,
    /// Source that produced the result.
    pub method: DiscoveryMethod,
    /// Failure description when unsuccessful.
    pub error_message: Option<String>,
    /// Wall-clock time the discovery run took.
    pub elapsed: Duration,
}

/// Read access to the OS registry. The core ships [`NoRegistry`]; a Windows
/// host application injects a real implementation.
pub trait RegistryAccess: Send + Sync {
    /// Read a string value under a key path such as
    /// [`BETHESDA_KEY_TEMPLATE`] (with placeholders substituted).
    fn read_string(&self, key: &str, value: &str) -> Option<String>;
}

/// Registry access that answers nothing; the default off Windows.
#[derive(Debug, Default)]
pub struct NoRegistry;

impl RegistryAccess for NoRegistry {
    fn read_string(&self, _key: &str, _value: &str) -> Option<String> {
        None
    }
}

struct CachedDiscovery {
    result: PathDiscoveryResult,
    inserted_at: Instant,
}

/// Multi-source discovery service with per-game result caching.
pub struct GamePathDiscovery {
    settings: Arc<dyn SettingsProvider>,
    registry: Arc<dyn RegistryAccess>,
    cache: DashMap<(String, bool), CachedDiscovery>,
    coalesce: Mutex<()>,
    ttl: Duration,
    steam_roots: Vec<PathBuf>,
    xse_log_override: Option<PathBuf>,
}

impl GamePathDiscovery {
    /// Create a discovery service over the given settings provider.
    pub fn new(settings: Arc<dyn SettingsProvider>) -> Self {
        Self {
            settings,
            registry: Arc::new(NoRegistry),
            cache: DashMap::new(),
            coalesce: Mutex::new(()),
            ttl: DISCOVERY_TTL,
            steam_roots: default_steam_roots(),
            xse_log_override: None,
        }
    }

    /// Inject a registry reader (Windows host applications).
    #[must_use]
    pub fn with_registry(mut self, registry: Arc<dyn RegistryAccess>) -> Self {
        self.registry = registry;
        self
    }

    /// Replace the probed Steam roots.
    #[must_use]
    pub fn with_steam_roots(mut self, roots: Vec<PathBuf>) -> Self {
        self.steam_roots = roots;
        self
    }

    /// Point the script-extender-log source at an explicit log file.
    #[must_use]
    pub fn with_xse_log(mut self, log: PathBuf) -> Self {
        self.xse_log_override = Some(log);
        self
    }

    /// Override the cache TTL.
    #[must_use]
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Settings key consulted by the configured-path source.
    pub fn configured_path_key(game: Game) -> String {
        format!("game_path:{}", game.spec().name)
    }

    /// Discover the installation of `game`. Concurrent calls for the same
    /// game are coalesced; a successful result is cached for the TTL.
    pub async fn discover_game_path(&self, game: Game) -> PathDiscoveryResult {
        let key = (game.spec().name.to_string(), game.is_vr());
        if let Some(hit) = self.cache_lookup(&key) {
            return hit;
        }

        let _guard = self.coalesce.lock().await;
        if let Some(hit) = self.cache_lookup(&key) {
            return hit;
        }

        let started = Instant::now();
        let spec = game.spec();

        let sources: [(DiscoveryMethod, Option<PathBuf>); 4] = [
            (DiscoveryMethod::ConfiguredPath, self.from_settings(game)),
            (DiscoveryMethod::Registry, self.from_registry(game)),
            (DiscoveryMethod::ScriptExtenderLog, self.from_xse_log()),
            (DiscoveryMethod::SteamLibrary, self.from_steam_libraries(spec)),
        ];

        for (method, candidate) in sources {
            let Some(root) = candidate else { continue };
            if self.validate_game_path(&root, spec) {
                info!(game = %game, method = ?method, root = %root.display(), "game path discovered");
                let result = PathDiscoveryResult {
                    is_success: true,
                    paths: Some(self.build_game_paths(&root, game)),
                    method,
                    error_message: None,
                    elapsed: started.elapsed(),
                };
                self.cache.insert(
                    key,
                    CachedDiscovery {
                        result: result.clone(),
                        inserted_at: Instant::now(),
                    },
                );
                return result;
            }
            debug!(game = %game, method = ?method, root = %root.display(), "candidate failed validation");
        }

        PathDiscoveryResult {
            is_success: false,
            paths: None,
            method: DiscoveryMethod::Unknown,
            error_message: Some(format!("no source produced a valid {} install", spec.name)),
            elapsed: started.elapsed(),
        }
    }

    /// Confirm that `root` is a directory containing the game executable.
    pub fn validate_game_path(&self, root: &Path, spec: &GameSpec) -> bool {
        root.is_dir() && root.join(spec.executable).is_file()
    }

    /// Drop every cached discovery.
    pub fn clear_cache(&self) {
        self.cache.clear();
    }

    fn cache_lookup(&self, key: &(String, bool)) -> Option<PathDiscoveryResult> {
        let entry = self.cache.get(key)?;
        if entry.inserted_at.elapsed() < self.ttl {
            Some(entry.result.clone())
        } else {
            None
        }
    }

    fn from_settings(&self, game: Game) -> Option<PathBuf> {
        self.settings.get_path(&Self::configured_path_key(game))
    }

    fn from_registry(&self, game: Game) -> Option<PathBuf> {
        let spec = game.spec();
        let mut game_key_name = spec.name.to_string();
        if game.is_vr() && !game_key_name.ends_with("VR") {
            game_key_name.push_str("VR");
        }
        let bethesda_key = BETHESDA_KEY_TEMPLATE.replace("{game}", &game_key_name);
        if let Some(path) = self.registry.read_string(&bethesda_key, "installed path") {
            return Some(PathBuf::from(path));
        }
        let gog_id = spec.gog_id?;
        let gog_key = GOG_KEY_TEMPLATE.replace("{gog_id}", &gog_id.to_string());
        self.registry
            .read_string(&gog_key, "path")
            .map(PathBuf::from)
    }

    fn from_xse_log(&self) -> Option<PathBuf> {
        let log = self.xse_log_override.as_ref()?;
        let content = std::fs::read_to_string(log).ok()?;
        extract_game_root_from_xse_log(&content)
    }

    fn from_steam_libraries(&self, spec: &GameSpec) -> Option<PathBuf> {
        self.steam_roots
            .iter()
            .map(|root| root.join("steamapps").join("common").join(spec.name))
            .find(|candidate| candidate.is_dir())
    }

    fn build_game_paths(&self, root: &Path, game: Game) -> GamePaths {
        let spec = game.spec();
        let existing = |p: PathBuf| if p.exists() { Some(p) } else { None };

        let documents_path = self
            .documents_path(game)
            .filter(|docs| docs.is_dir());

        let in_docs = |name: String| {
            documents_path
                .as_ref()
                .and_then(|docs| existing(docs.join(name)))
        };

        GamePaths {
            game_root: Some(root.to_path_buf()),
            executable: existing(root.join(spec.executable)),
            script_extender_plugins_path: existing(
                root.join("Data").join(spec.xse_base).join("Plugins"),
            ),
            game_ini: in_docs(format!("{}.ini", spec.docs_folder)),
            game_custom_ini: in_docs(format!("{}Custom.ini", spec.docs_folder)),
            script_extender_log: documents_path.as_ref().and_then(|docs| {
                existing(docs.join(spec.xse_base).join(spec.xse_log))
            }),
            papyrus_log: documents_path.as_ref().and_then(|docs| {
                existing(docs.join("Logs").join("Script").join("Papyrus.0.log"))
            }),
            steam_api_ini: existing(root.join("steam_api.ini")),
            documents_path,
        }
    }

    /// Platform-specific documents directory for `game`. Windows resolves
    /// the registry shell-folder value; elsewhere the home directory is the
    /// base. Returns the path whether or not it exists.
    pub fn documents_path(&self, game: Game) -> Option<PathBuf> {
        let spec = game.spec();
        let personal = self
            .registry
            .read_string(SHELL_FOLDERS_KEY, "Personal")
            .map(PathBuf::from)
            .or_else(|| dirs::document_dir())
            .or_else(|| dirs::home_dir().map(|home| home.join("Documents")))?;
        Some(personal.join("My Games").join(spec.docs_folder))
    }
}

/// Documents directory for a Proton-run game inside a Steam library.
pub fn proton_documents_path(steam_library: &Path, spec: &GameSpec) -> PathBuf {
    steam_library
        .join("steamapps")
        .join("compatdata")
        .join(spec.steam_id.to_string())
        .join("pfx/drive_c/users/steamuser/My Documents/My Games")
        .join(spec.docs_folder)
}

/// Pull the game root out of a script-extender log. The log states its
/// plugin directory as `plugin directory = <root>\Data\F4SE\Plugins`.
pub fn extract_game_root_from_xse_log(content: &str) -> Option<PathBuf> {
    XSE_PLUGIN_DIR_RE
        .captures(content)
        .map(|captures| PathBuf::from(captures[1].trim()))
}

fn default_steam_roots() -> Vec<PathBuf> {
    let mut roots: Vec<PathBuf> = WINDOWS_STEAM_ROOTS.iter().map(PathBuf::from).collect();
    if let Some(home) = dirs::home_dir() {
        roots.push(home.join(".local/share/Steam"));
        roots.push(home.join(".steam/steam"));
    }
    roots
}
