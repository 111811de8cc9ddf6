use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;

use crate::core::downloader::Downloadable;
use crate::core::error::MinepkgResult;
use crate::core::manifest::{DependencyLock, DependencyType};
use crate::core::pkgid::PackageId;

use super::{
    http_fetch_item, LatestResolver, Provider, ProviderError, Resolution, ResolutionRequest,
    UrlConverter,
};

pub const PROVIDER_NAME: &str = "modrinth";
pub const DEFAULT_API_URL: &str = "https://api.modrinth.com";
const CDN_PREFIX: &str = "https://cdn.modrinth.com/data/";

/// 5 requests per second.
const MIN_REQUEST_INTERVAL: Duration = Duration::from_millis(200);

// ─── Wire Types ───

#[derive(Debug, Clone, Deserialize)]
pub struct Version {
    pub id: String,
    pub project_id: String,
    #[serde(default)]
    pub version_number: String,
    #[serde(default)]
    pub date_published: Option<DateTime<Utc>>,
    #[serde(default)]
    pub files: Vec<VersionFile>,
    #[serde(default)]
    pub game_versions: Vec<String>,
    #[serde(default)]
    pub loaders: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VersionFile {
    #[serde(default)]
    pub hashes: FileHashes,
    pub url: String,
    #[serde(default)]
    pub filename: String,
    #[serde(default)]
    pub primary: bool,
    #[serde(default)]
    pub size: u64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FileHashes {
    #[serde(default)]
    pub sha512: Option<String>,
    #[serde(default)]
    pub sha1: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Project {
    pub id: String,
    pub slug: String,
}

impl Version {
    /// The primary file, or the first one.
    pub fn main_file(&self) -> Option<&VersionFile> {
        self.files
            .iter()
            .find(|f| f.primary)
            .or_else(|| self.files.first())
    }
}

// ─── Provider ───

/// Third-party mod index. Version tokens are either "latest" or an opaque
/// version id / file hash; ranges are not supported.
pub struct ModrinthProvider {
    client: Client,
    api_url: String,
    last_request: Mutex<Option<Instant>>,
}

impl ModrinthProvider {
    pub fn new(client: Client) -> Self {
        Self::with_api_url(client, DEFAULT_API_URL)
    }

    pub fn with_api_url(client: Client, api_url: &str) -> Self {
        Self {
            client,
            api_url: api_url.trim_end_matches('/').to_string(),
            last_request: Mutex::new(None),
        }
    }

    async fn throttle(&self) {
        let mut last = self.last_request.lock().await;
        if let Some(at) = *last {
            let next = at + MIN_REQUEST_INTERVAL;
            if next > Instant::now() {
                tokio::time::sleep_until(next).await;
            }
        }
        *last = Some(Instant::now());
    }

    /// GET + decode. A 404 becomes `not_found`.
    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
        not_found: impl FnOnce() -> ProviderError,
    ) -> Result<T, ProviderError> {
        self.throttle().await;
        let url = format!("{}/{}", self.api_url, path);
        debug!("GET {}", url);

        let response = self.client.get(&url).query(query).send().await?;
        match response.status() {
            StatusCode::OK => Ok(response.json().await?),
            StatusCode::NOT_FOUND => Err(not_found()),
            status => Err(ProviderError::UnexpectedStatus {
                url,
                status: status.as_u16(),
            }),
        }
    }

    pub async fn list_project_versions(
        &self,
        project: &str,
        loaders: &[&str],
        game_versions: &[&str],
    ) -> Result<Vec<Version>, ProviderError> {
        let mut query = Vec::new();
        // The API takes JSON arrays inside the query string.
        if !loaders.is_empty() {
            query.push(("loaders", serde_json::to_string(loaders).unwrap_or_default()));
        }
        if !game_versions.is_empty() {
            query.push((
                "game_versions",
                serde_json::to_string(game_versions).unwrap_or_default(),
            ));
        }
        let path = format!("v2/project/{project}/version");
        self.get_json(&path, &query, || ProviderError::ProjectNotFound(project.to_string()))
            .await
    }

    pub async fn get_version(&self, id: &str) -> Result<Version, ProviderError> {
        self.get_json(&format!("v2/version/{id}"), &[], || {
            ProviderError::VersionNotFound(id.to_string())
        })
        .await
    }

    pub async fn get_version_by_hash(&self, hash: &str) -> Result<Version, ProviderError> {
        let algorithm = if hash.len() == 128 { "sha512" } else { "sha1" };
        self.get_json(
            &format!("v2/version_file/{hash}"),
            &[("algorithm", algorithm.to_string())],
            || ProviderError::VersionNotFound(hash.to_string()),
        )
        .await
    }

    pub async fn get_project(&self, id: &str) -> Result<Project, ProviderError> {
        self.get_json(&format!("v2/project/{id}"), &[], || {
            ProviderError::ProjectNotFound(id.to_string())
        })
        .await
    }

    async fn latest_version(&self, request: &ResolutionRequest) -> Result<Version, ProviderError> {
        let minecraft = request.minecraft_version();
        let versions = self
            .list_project_versions(
                &request.dependency.name,
                &[request.platform_name()],
                &[minecraft],
            )
            .await?;

        newest_published(versions).ok_or_else(|| ProviderError::NoReleaseForMinecraft {
            name: request.dependency.name.clone(),
            minecraft: minecraft.to_string(),
        })
    }

    fn resolution(name: &str, version: Version) -> Result<Resolution, ProviderError> {
        let file = version
            .main_file()
            .ok_or_else(|| ProviderError::NoFiles(version.id.clone()))?;

        Ok(Resolution::leaf(DependencyLock {
            name: name.to_string(),
            version: version.id.clone(),
            version_name: Some(version.version_number.clone()).filter(|v| !v.is_empty()),
            provider: PROVIDER_NAME.to_string(),
            dependency_type: DependencyType::Mod,
            url: Some(file.url.clone()),
            sha512: file.hashes.sha512.clone(),
            ..Default::default()
        }))
    }
}

#[async_trait]
impl Provider for ModrinthProvider {
    fn name(&self) -> &'static str {
        PROVIDER_NAME
    }

    async fn resolve(&self, request: &ResolutionRequest) -> Result<Resolution, ProviderError> {
        let token = request.dependency.version.as_str();
        let version = match token {
            "" | "*" | "latest" => self.latest_version(request).await?,
            _ => match token.len() {
                8 => self.get_version(token).await?,
                40 | 128 => self.get_version_by_hash(token).await?,
                _ => return Err(ProviderError::UnsupportedVersionToken(token.to_string())),
            },
        };
        Self::resolution(&request.dependency.name, version)
    }

    fn fetch_item(
        &self,
        lock: &DependencyLock,
        target: PathBuf,
    ) -> MinepkgResult<Box<dyn Downloadable>> {
        http_fetch_item(&self.client, PROVIDER_NAME, lock, target)
    }

    fn as_latest_resolver(&self) -> Option<&dyn LatestResolver> {
        Some(self)
    }

    fn as_url_converter(&self) -> Option<&dyn UrlConverter> {
        Some(self)
    }
}

#[async_trait]
impl LatestResolver for ModrinthProvider {
    async fn resolve_latest(
        &self,
        request: &ResolutionRequest,
    ) -> Result<Resolution, ProviderError> {
        let version = self.latest_version(request).await?;
        Self::resolution(&request.dependency.name, version)
    }
}

/// Most recently published version. Listing order breaks ties, and the API
/// lists newest first.
fn newest_published(versions: Vec<Version>) -> Option<Version> {
    versions.into_iter().reduce(|best, candidate| {
        if candidate.date_published > best.date_published {
            candidate
        } else {
            best
        }
    })
}

/// `https://cdn.modrinth.com/data/{project}/versions/{version}/{file}` →
/// `(project, version)`.
fn split_cdn_url(url: &str) -> Option<(&str, &str)> {
    let rest = url.strip_prefix(CDN_PREFIX)?;
    let mut segments = rest.split('/');
    let project = segments.next().filter(|s| !s.is_empty())?;
    if segments.next()? != "versions" {
        return None;
    }
    let version = segments.next().filter(|s| !s.is_empty())?;
    Some((project, version))
}

#[async_trait]
impl UrlConverter for ModrinthProvider {
    fn can_convert_url(&self, url: &str) -> bool {
        url.starts_with(CDN_PREFIX)
    }

    async fn convert_url(&self, url: &str) -> Result<PackageId, ProviderError> {
        let (project, version) =
            split_cdn_url(url).ok_or_else(|| ProviderError::InvalidUrl(url.to_string()))?;

        let versions = self.list_project_versions(project, &[], &[]).await?;
        let wanted = versions
            .iter()
            .find(|v| v.version_number == version || v.id == version)
            .ok_or_else(|| ProviderError::VersionNotFound(version.to_string()))?;

        let project = self.get_project(project).await?;
        Ok(PackageId::new(PROVIDER_NAME, &project.slug, &wanted.id))
    }
}
