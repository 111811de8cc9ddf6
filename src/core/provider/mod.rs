// ─── Providers ───
// A provider turns a package id into a concrete, downloadable artifact.
// `Provider` is the required capability; resolving "newest regardless of
// requested version" and converting CDN URLs back into ids are optional and
// discovered at runtime through the `as_*` accessors.

pub mod dummy;
pub mod error;
pub mod https;
pub mod modrinth;
pub mod registry;
pub mod store;

use std::path::PathBuf;

use async_trait::async_trait;
use reqwest::Client;

use crate::core::downloader::{Checksum, Downloadable, HttpItem};
use crate::core::error::{MinepkgError, MinepkgResult};
use crate::core::manifest::{DependencyLock, InterpretedDependency, PlatformLock};
use crate::core::pkgid::PackageId;

pub use dummy::DummyProvider;
pub use error::{ErrorKind, ProviderError};
pub use https::HttpsProvider;
pub use modrinth::ModrinthProvider;
pub use registry::RegistryProvider;
pub use store::ProviderStore;

/// What to resolve and against which platform.
#[derive(Debug, Clone)]
pub struct ResolutionRequest {
    pub dependency: PackageId,
    pub platform: PlatformLock,
    /// Lock of the package that introduced this dependency, `None` at the
    /// top level.
    pub parent: Option<DependencyLock>,
}

impl ResolutionRequest {
    pub fn new(dependency: PackageId, platform: PlatformLock) -> Self {
        Self {
            dependency,
            platform,
            parent: None,
        }
    }

    pub fn minecraft_version(&self) -> &str {
        self.platform.minecraft_version()
    }

    pub fn platform_name(&self) -> &'static str {
        self.platform.platform_name()
    }
}

/// A resolved artifact plus the dependencies it brings along.
#[derive(Debug, Clone)]
pub struct Resolution {
    pub lock: DependencyLock,
    pub dependencies: Vec<InterpretedDependency>,
}

impl Resolution {
    pub fn leaf(lock: DependencyLock) -> Self {
        Self {
            lock,
            dependencies: Vec::new(),
        }
    }
}

#[async_trait]
pub trait Provider: Send + Sync {
    fn name(&self) -> &'static str;

    async fn resolve(&self, request: &ResolutionRequest) -> Result<Resolution, ProviderError>;

    /// Build the download for a lock this provider produced.
    fn fetch_item(
        &self,
        lock: &DependencyLock,
        target: PathBuf,
    ) -> MinepkgResult<Box<dyn Downloadable>>;

    fn as_latest_resolver(&self) -> Option<&dyn LatestResolver> {
        None
    }

    fn as_url_converter(&self) -> Option<&dyn UrlConverter> {
        None
    }
}

/// Resolve the newest release, ignoring the requested version.
#[async_trait]
pub trait LatestResolver: Send + Sync {
    async fn resolve_latest(
        &self,
        request: &ResolutionRequest,
    ) -> Result<Resolution, ProviderError>;
}

/// Map a raw download URL back to a package id.
#[async_trait]
pub trait UrlConverter: Send + Sync {
    fn can_convert_url(&self, url: &str) -> bool;

    async fn convert_url(&self, url: &str) -> Result<PackageId, ProviderError>;
}

/// Plain GET of `lock.url`, verified with the strongest hash the lock has.
pub(crate) fn http_fetch_item(
    client: &Client,
    provider: &str,
    lock: &DependencyLock,
    target: PathBuf,
) -> MinepkgResult<Box<dyn Downloadable>> {
    let url = lock.download_url().ok_or_else(|| {
        MinepkgError::Other(format!(
            "{provider} lock for {}@{} has no download url",
            lock.name, lock.version
        ))
    })?;

    let checksum = match (&lock.sha256, &lock.sha512) {
        (Some(sha256), _) if !sha256.is_empty() => Some(Checksum::Sha256(sha256.clone())),
        (_, Some(sha512)) if !sha512.is_empty() => Some(Checksum::Sha512(sha512.clone())),
        _ => None,
    };

    Ok(Box::new(
        HttpItem::new(client.clone(), url, target).with_checksum(checksum),
    ))
}
