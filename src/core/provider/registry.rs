use std::collections::BTreeMap;
use std::path::PathBuf;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tracing::debug;

use crate::core::downloader::Downloadable;
use crate::core::error::MinepkgResult;
use crate::core::manifest::{DependencyLock, DependencyType, InterpretedDependency, PackageType};
use crate::core::pkgid::DEFAULT_PROVIDER;

use super::{
    http_fetch_item, LatestResolver, Provider, ProviderError, Resolution, ResolutionRequest,
};

pub const DEFAULT_API_URL: &str = "https://api.preview.minepkg.io/v1";

/// First-party registry. The server does all constraint matching; this side
/// only shapes the query and interprets the answer.
pub struct RegistryProvider {
    client: Client,
    api_url: String,
}

// ─── Wire Types ───

#[derive(Debug, Clone, Deserialize)]
pub struct Release {
    pub package: ReleasePackage,
    #[serde(default)]
    pub dependencies: BTreeMap<String, String>,
    #[serde(default)]
    pub meta: ReleaseMeta,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReleasePackage {
    pub name: String,
    pub version: String,
    #[serde(rename = "type", default)]
    pub package_type: PackageType,
    #[serde(default)]
    pub platform: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReleaseMeta {
    #[serde(default)]
    pub sha256: Option<String>,
    #[serde(default)]
    pub ipfs_hash: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RegistryErrorBody {
    #[serde(default)]
    resolve_error: String,
}

impl RegistryProvider {
    pub fn new(client: Client) -> Self {
        Self::with_api_url(client, DEFAULT_API_URL)
    }

    pub fn with_api_url(client: Client, api_url: &str) -> Self {
        Self {
            client,
            api_url: api_url.trim_end_matches('/').to_string(),
        }
    }

    /// `None` when the release has no artifact (meta-packages).
    fn download_url(&self, release: &Release) -> Option<String> {
        release
            .meta
            .sha256
            .as_ref()
            .filter(|sha| !sha.is_empty())
            .map(|_| {
                format!(
                    "{}/releases/{}/{}@{}/download",
                    self.api_url, release.package.platform, release.package.name, release.package.version
                )
            })
    }

    pub async fn query_release(
        &self,
        name: &str,
        version_range: &str,
        minecraft: &str,
        platform: &str,
    ) -> Result<Release, ProviderError> {
        let minecraft = match minecraft {
            "*" | "latest" => "",
            other => other,
        };
        let url = format!("{}/releases/_query", self.api_url);

        let mut query = vec![("platform", platform), ("name", name)];
        if !minecraft.is_empty() {
            query.push(("minecraft", minecraft));
        }
        query.push(("versionRange", version_range));

        debug!(
            "Querying registry: {}@{} (platform {}, minecraft {})",
            name, version_range, platform, minecraft
        );
        let response = self.client.get(&url).query(&query).send().await?;

        if response.status() == StatusCode::NOT_FOUND {
            // Proxies answer 404 with HTML; that still means "not found".
            let body = response.text().await?;
            let code = serde_json::from_str::<RegistryErrorBody>(&body)
                .map(|body| body.resolve_error)
                .unwrap_or_default();
            return Err(map_resolve_error(&code, name, version_range, minecraft, platform));
        }
        if !response.status().is_success() {
            return Err(ProviderError::UnexpectedStatus {
                url,
                status: response.status().as_u16(),
            });
        }

        Ok(response.json().await?)
    }

    fn resolution(&self, release: Release) -> Resolution {
        let lock = DependencyLock {
            name: release.package.name.clone(),
            version: release.package.version.clone(),
            provider: DEFAULT_PROVIDER.to_string(),
            dependency_type: match release.package.package_type {
                PackageType::Modpack => DependencyType::Modpack,
                PackageType::Mod => DependencyType::Mod,
            },
            url: self.download_url(&release),
            sha256: release.meta.sha256.clone().filter(|s| !s.is_empty()),
            ipfs_hash: release.meta.ipfs_hash.clone().filter(|s| !s.is_empty()),
            ..Default::default()
        };
        let dependencies = release
            .dependencies
            .iter()
            .map(|(key, value)| InterpretedDependency::from_entry(key, value, false))
            .collect();

        Resolution { lock, dependencies }
    }
}

fn map_resolve_error(
    code: &str,
    name: &str,
    version: &str,
    minecraft: &str,
    platform: &str,
) -> ProviderError {
    let name = name.to_string();
    match code {
        "minecraft_req_not_satisfiable" => ProviderError::NoReleaseForMinecraft {
            name,
            minecraft: if minecraft.is_empty() { "*".into() } else { minecraft.into() },
        },
        "version_req_not_satisfiable" => ProviderError::NoReleaseForVersion {
            name,
            version: version.to_string(),
        },
        "project_does_not_exist" => ProviderError::ProjectNotFound(name),
        "no_releases_for_platform" => ProviderError::NoReleasesForPlatform {
            name,
            platform: platform.to_string(),
        },
        "all_reqs_not_satisfiable" => ProviderError::NoReleaseWithConstraints { name },
        _ => ProviderError::NotFound(name),
    }
}

#[async_trait]
impl Provider for RegistryProvider {
    fn name(&self) -> &'static str {
        DEFAULT_PROVIDER
    }

    async fn resolve(&self, request: &ResolutionRequest) -> Result<Resolution, ProviderError> {
        let release = self
            .query_release(
                &request.dependency.name,
                &request.dependency.version,
                request.minecraft_version(),
                request.platform_name(),
            )
            .await?;
        Ok(self.resolution(release))
    }

    fn fetch_item(
        &self,
        lock: &DependencyLock,
        target: PathBuf,
    ) -> MinepkgResult<Box<dyn Downloadable>> {
        http_fetch_item(&self.client, DEFAULT_PROVIDER, lock, target)
    }

    fn as_latest_resolver(&self) -> Option<&dyn LatestResolver> {
        Some(self)
    }
}

#[async_trait]
impl LatestResolver for RegistryProvider {
    async fn resolve_latest(
        &self,
        request: &ResolutionRequest,
    ) -> Result<Resolution, ProviderError> {
        let mut request = request.clone();
        request.dependency.version = "*".to_string();
        self.resolve(&request).await
    }
}
