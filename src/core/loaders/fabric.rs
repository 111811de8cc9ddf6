use std::path::Path;

use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, info};

use crate::core::constraint::Constraint;
use crate::core::error::{MinepkgError, MinepkgResult};
use crate::core::manifest::FabricLock;
use crate::core::version::LaunchManifest;

pub const FABRIC_META_BASE: &str = "https://meta.fabricmc.net";

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FabricMapping {
    pub game_version: String,
    #[serde(default)]
    pub separator: String,
    #[serde(default)]
    pub build: u32,
    #[serde(default)]
    pub maven: String,
    pub version: String,
    #[serde(default)]
    pub stable: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FabricLoader {
    #[serde(default)]
    pub separator: String,
    #[serde(default)]
    pub build: u32,
    #[serde(default)]
    pub maven: String,
    pub version: String,
    #[serde(default)]
    pub stable: bool,
}

/// Client for the fabric meta API. Lists are returned newest first.
#[derive(Clone)]
pub struct FabricMeta {
    client: Client,
    base: String,
}

impl FabricMeta {
    pub fn new(client: Client) -> Self {
        Self::with_base(client, FABRIC_META_BASE)
    }

    pub fn with_base(client: Client, base: &str) -> Self {
        Self {
            client,
            base: base.trim_end_matches('/').to_string(),
        }
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> MinepkgResult<T> {
        debug!("GET {}", url);
        let resp = self.client.get(url).send().await?;

        if !resp.status().is_success() {
            return Err(MinepkgError::DownloadFailed {
                url: url.to_string(),
                status: resp.status().as_u16(),
            });
        }

        Ok(resp.json::<T>().await?)
    }

    pub async fn fetch_mappings(&self) -> MinepkgResult<Vec<FabricMapping>> {
        self.get_json(&format!("{}/v1/versions/mappings", self.base))
            .await
    }

    pub async fn fetch_loaders(&self) -> MinepkgResult<Vec<FabricLoader>> {
        self.get_json(&format!("{}/v1/versions/loader", self.base))
            .await
    }

    pub fn profile_url(&self, minecraft: &str, loader: &str) -> String {
        format!(
            "{}/v2/versions/loader/{}/{}/profile/json",
            self.base, minecraft, loader
        )
    }

    /// Pin the newest mapping whose game version satisfies `minecraft` and
    /// the newest loader satisfying `loader`.
    pub async fn resolve_lock(&self, minecraft: &str, loader: &str) -> MinepkgResult<FabricLock> {
        let mc_constraint = Constraint::parse(minecraft)
            .ok_or_else(|| MinepkgError::InvalidRequirement(minecraft.to_string()))?;
        let loader_constraint = Constraint::parse(loader)
            .ok_or_else(|| MinepkgError::InvalidRequirement(loader.to_string()))?;

        let mappings = self.fetch_mappings().await?;
        let mapping = mappings
            .into_iter()
            .find(|m| mc_constraint.matches_str(&m.game_version))
            .ok_or_else(|| MinepkgError::NoFabricMapping(minecraft.to_string()))?;

        let loaders = self.fetch_loaders().await?;
        let fabric_loader = loaders
            .into_iter()
            .find(|l| loader_constraint.matches_str(&l.version))
            .ok_or_else(|| MinepkgError::NoFabricLoader(loader.to_string()))?;

        info!(
            "Resolved fabric {} for Minecraft {} (mapping {})",
            fabric_loader.version, mapping.game_version, mapping.version
        );

        Ok(FabricLock {
            minecraft: mapping.game_version,
            fabric_loader: fabric_loader.version,
            mapping: mapping.version,
        })
    }

    /// The loader profile, cached at `path`. Still needs merging onto the
    /// vanilla manifest it inherits from.
    pub async fn profile(&self, lock: &FabricLock, path: &Path) -> MinepkgResult<LaunchManifest> {
        let url = self.profile_url(&lock.minecraft, &lock.fabric_loader);
        LaunchManifest::load_or_fetch(&self.client, &url, path).await
    }
}
