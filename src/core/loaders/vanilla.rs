use std::path::Path;

use reqwest::Client;
use tracing::info;

use crate::core::error::{MinepkgError, MinepkgResult};
use crate::core::manifest::VanillaLock;
use crate::core::version::{LaunchManifest, VersionManifest, VERSION_MANIFEST_URL};

/// Resolves Minecraft requirements and launch manifests against Mojang's
/// version list.
#[derive(Clone)]
pub struct VanillaMeta {
    client: Client,
    manifest_url: String,
}

impl VanillaMeta {
    pub fn new(client: Client) -> Self {
        Self::with_url(client, VERSION_MANIFEST_URL)
    }

    pub fn with_url(client: Client, manifest_url: &str) -> Self {
        Self {
            client,
            manifest_url: manifest_url.to_string(),
        }
    }

    pub async fn resolve_lock(&self, requirement: &str) -> MinepkgResult<VanillaLock> {
        let manifest = VersionManifest::fetch(&self.client, &self.manifest_url).await?;
        let entry = manifest.newest_matching(requirement)?;
        info!("Resolved Minecraft {} for \"{}\"", entry.id, requirement);
        Ok(VanillaLock {
            minecraft: entry.id.clone(),
        })
    }

    /// Launch manifest for `minecraft`, cached at `path`. The version list is
    /// only consulted when nothing is cached yet.
    pub async fn launch_manifest(&self, minecraft: &str, path: &Path) -> MinepkgResult<LaunchManifest> {
        if path.exists() {
            return LaunchManifest::load(path).await;
        }

        let manifest = VersionManifest::fetch(&self.client, &self.manifest_url).await?;
        let entry = manifest
            .find_version(minecraft)
            .ok_or_else(|| MinepkgError::NoMinecraftRelease(minecraft.to_string()))?;

        LaunchManifest::load_or_fetch(&self.client, &entry.url, path).await
    }
}
