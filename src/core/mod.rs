//! Core analysis engine: errors, analyzer protocol, fragments, and pipeline.

pub mod analyzer;
pub mod context;
pub mod errors;
pub mod fragment;
pub mod pipeline;

use serde::{Deserialize, Serialize};

/// Games supported by the diagnostics engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Game {
    /// Fallout 4 (2015).
    Fallout4,
    /// Fallout 4 VR.
    Fallout4Vr,
    /// Skyrim Special Edition.
    SkyrimSe,
    /// Skyrim VR.
    SkyrimVr,
}

impl Game {
    /// Static descriptor for this game: executable names, folder names, and
    /// crash-generator identity used throughout discovery and scanning.
    pub fn spec(self) -> &'static GameSpec {
        match self {
            Game::Fallout4 => &FALLOUT4,
            Game::Fallout4Vr => &FALLOUT4_VR,
            Game::SkyrimSe => &SKYRIM_SE,
            Game::SkyrimVr => &SKYRIM_VR,
        }
    }

    /// True for the VR editions, which use separate registry keys and
    /// documents folders.
    pub fn is_vr(self) -> bool {
        matches!(self, Game::Fallout4Vr | Game::SkyrimVr)
    }
}

impl std::fmt::Display for Game {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.spec().name)
    }
}

/// Per-game constants consumed by path discovery, integrity checks, and the
/// config scanners.
#[derive(Debug, Clone)]
pub struct GameSpec {
    /// Install-folder name as it appears under `steamapps/common`.
    pub name: &'static str,
    /// Main game executable inside the install root.
    pub executable: &'static str,
    /// Folder name under `My Games` in the user's documents directory.
    pub docs_folder: &'static str,
    /// Steam application id (used for Proton compatdata paths).
    pub steam_id: u32,
    /// GOG product id, for installs registered under the GOG registry key.
    pub gog_id: Option<u64>,
    /// Script-extender base name (`F4SE`, `SKSE64`); also the directory name
    /// under `Data` that holds native plugins.
    pub xse_base: &'static str,
    /// Script-extender loader executable expected beside the game executable.
    pub xse_loader: &'static str,
    /// Script-extender log file name inside the documents folder.
    pub xse_log: &'static str,
    /// Crash-generator plugin name (`Buffout4`, `CrashLogger`).
    pub crash_gen_name: &'static str,
    /// File-name pattern prefix of the Address Library binary under the
    /// script-extender plugins directory.
    pub address_library_prefix: &'static str,
}

/// Fallout 4 descriptor.
pub static FALLOUT4: GameSpec = GameSpec {
    name: "Fallout4",
    executable: "Fallout4.exe",
    docs_folder: "Fallout4",
    steam_id: 377_160,
    gog_id: Some(1_998_527_297),
    xse_base: "F4SE",
    xse_loader: "f4se_loader.exe",
    xse_log: "f4se.log",
    crash_gen_name: "Buffout4",
    address_library_prefix: "version-",
};

/// Fallout 4 VR descriptor.
pub static FALLOUT4_VR: GameSpec = GameSpec {
    name: "Fallout4VR",
    executable: "Fallout4VR.exe",
    docs_folder: "Fallout4VR",
    steam_id: 611_660,
    gog_id: None,
    xse_base: "F4SE",
    xse_loader: "f4sevr_loader.exe",
    xse_log: "f4sevr.log",
    crash_gen_name: "Buffout4",
    address_library_prefix: "version-",
};

/// Skyrim Special Edition descriptor.
pub static SKYRIM_SE: GameSpec = GameSpec {
    name: "Skyrim Special Edition",
    executable: "SkyrimSE.exe",
    docs_folder: "Skyrim Special Edition",
    steam_id: 489_830,
    gog_id: Some(1_711_448_296),
    xse_base: "SKSE",
    xse_loader: "skse64_loader.exe",
    xse_log: "skse64.log",
    crash_gen_name: "CrashLogger",
    address_library_prefix: "versionlib-",
};

/// Skyrim VR descriptor.
pub static SKYRIM_VR: GameSpec = GameSpec {
    name: "SkyrimVR",
    executable: "SkyrimVR.exe",
    docs_folder: "Skyrim VR",
    steam_id: 611_670,
    gog_id: None,
    xse_base: "SKSE",
    xse_loader: "sksevr_loader.exe",
    xse_log: "sksevr.log",
    crash_gen_name: "CrashLogger",
    address_library_prefix: "versionlib-",
};
