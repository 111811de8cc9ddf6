use std::path::PathBuf;

use reqwest::Client;
use tokio_util::sync::CancellationToken;

use crate::core::downloader::DownloadManager;
use crate::core::error::MinepkgResult;
use crate::core::http::build_http_client;
use crate::core::java::JavaManager;
use crate::core::loaders::RequirementsResolver;
use crate::core::provider::store::ProviderStore;

use super::settings::{default_data_dir, Settings};

/// Everything shared between instances: the data dir layout, settings, the
/// one HTTP client and the provider registry built on it.
#[derive(Clone)]
pub struct AppState {
    pub data_dir: PathBuf,
    pub settings: Settings,
    pub http_client: Client,
    pub providers: ProviderStore,
}

impl AppState {
    pub async fn load() -> MinepkgResult<Self> {
        Self::load_from(default_data_dir()).await
    }

    pub async fn load_from(data_dir: PathBuf) -> MinepkgResult<Self> {
        let settings = Settings::load(&data_dir).await;
        let http_client = build_http_client()?;
        Ok(Self::new(data_dir, settings, http_client))
    }

    pub fn new(data_dir: PathBuf, settings: Settings, http_client: Client) -> Self {
        let providers = ProviderStore::with_defaults(
            http_client.clone(),
            &settings.api_url,
            &settings.modrinth_api_url,
        );
        Self {
            data_dir,
            settings,
            http_client,
            providers,
        }
    }

    /// Downloaded package artifacts, `{name}/{version}{ext}`.
    pub fn cache_dir(&self) -> PathBuf {
        self.data_dir.join("cache")
    }

    pub fn libraries_dir(&self) -> PathBuf {
        self.data_dir.join("libraries")
    }

    pub fn assets_dir(&self) -> PathBuf {
        self.data_dir.join("assets")
    }

    pub fn versions_dir(&self) -> PathBuf {
        self.data_dir.join("versions")
    }

    pub fn java_dir(&self) -> PathBuf {
        self.data_dir.join("java")
    }

    pub fn download_manager(&self, cancel: CancellationToken) -> DownloadManager {
        DownloadManager::new(cancel)
            .with_concurrency(self.settings.max_concurrent_downloads)
            .with_max_attempts(self.settings.max_download_attempts)
    }

    pub fn java_manager(&self, downloads: DownloadManager) -> JavaManager {
        JavaManager::new(self.http_client.clone(), self.java_dir())
            .with_system_java(self.settings.use_system_java)
            .with_downloads(downloads)
    }

    pub fn requirements_resolver(&self) -> RequirementsResolver {
        RequirementsResolver::new(self.http_client.clone())
    }
}
