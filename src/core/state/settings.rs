use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::core::downloader::manager::{DEFAULT_CONCURRENCY, DEFAULT_MAX_ATTEMPTS};
use crate::core::downloader::write_atomic;
use crate::core::error::MinepkgResult;
use crate::core::provider::{modrinth, registry};

pub const APP_DIR_NAME: &str = "minepkg";
pub const DATA_DIR_ENV: &str = "MINEPKG_DATA_DIR";
pub const SETTINGS_FILE: &str = "settings.json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub use_system_java: bool,
    pub include_dev_dependencies: bool,
    pub accept_minecraft_eula: bool,
    pub max_concurrent_downloads: usize,
    pub max_download_attempts: u32,
    pub api_url: String,
    pub modrinth_api_url: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            use_system_java: false,
            include_dev_dependencies: false,
            accept_minecraft_eula: false,
            max_concurrent_downloads: DEFAULT_CONCURRENCY,
            max_download_attempts: DEFAULT_MAX_ATTEMPTS,
            api_url: registry::DEFAULT_API_URL.to_string(),
            modrinth_api_url: modrinth::DEFAULT_API_URL.to_string(),
        }
    }
}

impl Settings {
    /// Missing or unreadable settings fall back to the defaults.
    pub async fn load(data_dir: &Path) -> Self {
        let path = data_dir.join(SETTINGS_FILE);
        let Ok(raw) = tokio::fs::read_to_string(&path).await else {
            debug!("No settings at {:?}, using defaults", path);
            return Self::default();
        };
        match serde_json::from_str(&raw) {
            Ok(settings) => settings,
            Err(err) => {
                warn!("Ignoring invalid settings {:?}: {}", path, err);
                Self::default()
            }
        }
    }

    pub async fn save(&self, data_dir: &Path) -> MinepkgResult<()> {
        let json = serde_json::to_string_pretty(self)?;
        write_atomic(&data_dir.join(SETTINGS_FILE), json).await
    }
}

/// `$MINEPKG_DATA_DIR`, or `{platform data dir}/minepkg`.
pub fn default_data_dir() -> PathBuf {
    if let Some(dir) = std::env::var_os(DATA_DIR_ENV).filter(|v| !v.is_empty()) {
        return PathBuf::from(dir);
    }
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR_NAME)
}
