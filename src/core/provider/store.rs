use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use reqwest::Client;
use tracing::debug;

use crate::core::downloader::Downloadable;
use crate::core::error::{MinepkgError, MinepkgResult};
use crate::core::manifest::DependencyLock;
use crate::core::pkgid::PackageId;

use super::{
    DummyProvider, HttpsProvider, ModrinthProvider, Provider, RegistryProvider, Resolution,
    ResolutionRequest,
};

/// Name-keyed provider registry.
#[derive(Clone, Default)]
pub struct ProviderStore {
    providers: BTreeMap<String, Arc<dyn Provider>>,
}

impl ProviderStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// `minepkg`, `modrinth`, `https` and `dummy`, all sharing `client`.
    pub fn with_defaults(client: Client, api_url: &str, modrinth_api_url: &str) -> Self {
        let mut store = Self::new();
        store.add(Arc::new(RegistryProvider::with_api_url(client.clone(), api_url)));
        store.add(Arc::new(ModrinthProvider::with_api_url(
            client.clone(),
            modrinth_api_url,
        )));
        store.add(Arc::new(HttpsProvider::new(client)));
        store.add(Arc::new(DummyProvider));
        store
    }

    pub fn add(&mut self, provider: Arc<dyn Provider>) {
        self.providers.insert(provider.name().to_string(), provider);
    }

    pub fn has(&self, name: &str) -> bool {
        self.providers.contains_key(name)
    }

    pub fn get(&self, name: &str) -> MinepkgResult<&Arc<dyn Provider>> {
        self.providers
            .get(name)
            .ok_or_else(|| MinepkgError::ProviderNotFound(name.to_string()))
    }

    pub async fn resolve(&self, request: &ResolutionRequest) -> MinepkgResult<Resolution> {
        let provider = self.get(&request.dependency.provider)?;
        debug!("Resolving {} via {}", request.dependency, provider.name());

        provider
            .resolve(request)
            .await
            .map_err(|source| MinepkgError::Resolve {
                provider: provider.name().to_string(),
                id: request.dependency.legacy_id(),
                source,
            })
    }

    pub async fn resolve_latest(&self, request: &ResolutionRequest) -> MinepkgResult<Resolution> {
        let provider = self.get(&request.dependency.provider)?;
        let latest = provider
            .as_latest_resolver()
            .ok_or_else(|| MinepkgError::ProviderUnsupported {
                provider: provider.name().to_string(),
                operation: "resolving the latest version",
            })?;

        latest
            .resolve_latest(request)
            .await
            .map_err(|source| MinepkgError::Resolve {
                provider: provider.name().to_string(),
                id: request.dependency.legacy_id(),
                source,
            })
    }

    /// First provider that recognises `url` wins.
    pub async fn convert_url(&self, url: &str) -> MinepkgResult<PackageId> {
        for provider in self.providers.values() {
            let Some(converter) = provider.as_url_converter() else {
                continue;
            };
            if !converter.can_convert_url(url) {
                continue;
            }
            return converter
                .convert_url(url)
                .await
                .map_err(|source| MinepkgError::Resolve {
                    provider: provider.name().to_string(),
                    id: url.to_string(),
                    source,
                });
        }
        Err(MinepkgError::UrlNotConvertible(url.to_string()))
    }

    /// Download for `lock`, dispatched to the provider that produced it.
    pub fn fetch_item(
        &self,
        lock: &DependencyLock,
        target: PathBuf,
    ) -> MinepkgResult<Box<dyn Downloadable>> {
        self.get(&lock.provider)?.fetch_item(lock, target)
    }
}
