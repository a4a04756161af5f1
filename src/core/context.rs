//! Per-request analysis context and the settings-provider seam.
//!
//! The [`AnalysisContext`] is the mutable bag shared by every analyzer
//! working on one request. Earlier priority groups publish facts (parsed
//! crash header, plugin list, detected game) into the shared-data map;
//! later groups read them back with typed lookups. The map is concurrent,
//! so analyzers inside one priority group may write simultaneously —
//! visibility inside a group is best-effort and callers must not rely on
//! intra-group ordering.

use std::any::Any;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use dashmap::DashMap;

use crate::core::Game;

/// Well-known shared-data keys published by the built-in analyzers.
pub mod keys {
    /// Full decoded text of the crash log (`String`), published by the load
    /// stage.
    pub const LOG_CONTENT: &str = "log.content";
    /// Parsed crash header (`CrashHeader`), published by the crash-header
    /// analyzer.
    pub const CRASH_HEADER: &str = "crash.header";
    /// Ordered plugin load list (`PluginList`), published by the plugin
    /// analyzer.
    pub const PLUGIN_LIST: &str = "plugins.list";
    /// Crash-generator TOML scan result (`TomlScanResult`), published by the
    /// settings analyzer.
    pub const CRASH_GEN_SETTINGS: &str = "crashgen.settings";
    /// Detected game (`Game`), published by whichever analyzer resolves it
    /// first.
    pub const DETECTED_GAME: &str = "game.detected";
}

/// Read-only access to caller configuration from heterogeneous stores
/// (in-memory, YAML-backed, registry-backed). The core consumes only this
/// trait; persistence lives with the caller.
pub trait SettingsProvider: Send + Sync {
    /// Fetch a string setting.
    fn get_string(&self, key: &str) -> Option<String>;

    /// Fetch a boolean setting.
    fn get_bool(&self, key: &str) -> Option<bool> {
        self.get_string(key)
            .and_then(|v| v.trim().parse::<bool>().ok())
    }

    /// Fetch a path setting.
    fn get_path(&self, key: &str) -> Option<PathBuf> {
        self.get_string(key).map(PathBuf::from)
    }
}

/// In-memory settings provider. The default for tests and for callers that
/// resolve their configuration up front.
#[derive(Debug, Default)]
pub struct InMemorySettings {
    values: DashMap<String, String>,
}

impl InMemorySettings {
    /// Create an empty provider.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a setting.
    pub fn set(&self, key: impl Into<String>, value: impl Into<String>) {
        self.values.insert(key.into(), value.into());
    }
}

impl SettingsProvider for InMemorySettings {
    fn get_string(&self, key: &str) -> Option<String> {
        self.values.get(key).map(|entry| entry.value().clone())
    }
}

type SharedValue = Arc<dyn Any + Send + Sync>;

/// Per-request shared state handed to every analyzer.
///
/// Created when a request enters the analyze stage and dropped after
/// compose. Cloning is cheap; all clones observe the same shared data.
#[derive(Clone)]
pub struct AnalysisContext {
    inner: Arc<ContextInner>,
}

struct ContextInner {
    input_path: PathBuf,
    game_hint: Option<Game>,
    settings: Arc<dyn SettingsProvider>,
    shared: DashMap<String, SharedValue>,
}

impl AnalysisContext {
    /// Create a context for one request.
    pub fn new(
        input_path: impl Into<PathBuf>,
        game_hint: Option<Game>,
        settings: Arc<dyn SettingsProvider>,
    ) -> Self {
        Self {
            inner: Arc::new(ContextInner {
                input_path: input_path.into(),
                game_hint,
                settings,
                shared: DashMap::new(),
            }),
        }
    }

    /// Path of the artifact under analysis.
    pub fn input_path(&self) -> &Path {
        &self.inner.input_path
    }

    /// The caller-supplied target game, if any. Analyzers may refine this via
    /// [`keys::DETECTED_GAME`].
    pub fn game_hint(&self) -> Option<Game> {
        self.inner.game_hint
    }

    /// The game to analyze for: the detected game when published, else the
    /// caller hint, else Fallout 4.
    pub fn game(&self) -> Game {
        self.get::<Game>(keys::DETECTED_GAME)
            .map(|g| *g)
            .or(self.inner.game_hint)
            .unwrap_or(Game::Fallout4)
    }

    /// Settings provider for this request.
    pub fn settings(&self) -> &Arc<dyn SettingsProvider> {
        &self.inner.settings
    }

    /// Publish a typed fact under a stable key. Later priority groups are
    /// guaranteed to observe it.
    pub fn set<T: Any + Send + Sync>(&self, key: impl Into<String>, value: T) {
        self.inner.shared.insert(key.into(), Arc::new(value));
    }

    /// Typed lookup of a published fact. Returns `None` when the key is
    /// absent or holds a different type.
    pub fn get<T: Any + Send + Sync>(&self, key: &str) -> Option<Arc<T>> {
        self.inner
            .shared
            .get(key)
            .and_then(|entry| Arc::clone(entry.value()).downcast::<T>().ok())
    }

    /// True when a fact has been published under `key`.
    pub fn contains(&self, key: &str) -> bool {
        self.inner.shared.contains_key(key)
    }
}

impl std::fmt::Debug for AnalysisContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnalysisContext")
            .field("input_path", &self.inner.input_path)
            .field("game_hint", &self.inner.game_hint)
            .field("shared_keys", &self.inner.shared.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context() -> AnalysisContext {
        AnalysisContext::new("crash.log", None, Arc::new(InMemorySettings::new()))
    }

    #[test]
    fn typed_get_set_round_trip() {
        let ctx = context();
        ctx.set(keys::LOG_CONTENT, String::from("Unhandled exception"));

        let content = ctx.get::<String>(keys::LOG_CONTENT).expect("published");
        assert_eq!(content.as_str(), "Unhandled exception");
    }

    #[test]
    fn type_mismatch_returns_none() {
        let ctx = context();
        ctx.set("answer", 42_u32);
        assert!(ctx.get::<String>("answer").is_none());
        assert_eq!(*ctx.get::<u32>("answer").expect("typed hit"), 42);
    }

    #[test]
    fn detected_game_overrides_hint() {
        let ctx = AnalysisContext::new(
            "crash.log",
            Some(Game::SkyrimSe),
            Arc::new(InMemorySettings::new()),
        );
        assert_eq!(ctx.game(), Game::SkyrimSe);

        ctx.set(keys::DETECTED_GAME, Game::Fallout4);
        assert_eq!(ctx.game(), Game::Fallout4);
    }

    #[test]
    fn clones_share_state() {
        let ctx = context();
        let twin = ctx.clone();
        ctx.set("k", String::from("v"));
        assert!(twin.contains("k"));
    }
}
