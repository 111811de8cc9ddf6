use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::core::downloader::write_atomic;
use crate::core::error::{MinepkgError, MinepkgResult};

use super::Platform;

pub const LOCKFILE_FILE: &str = "minepkg-lock.toml";
pub const LOCKFILE_VERSION: u32 = 1;
const LOCKFILE_HEADER: &str = "# You should not edit this file.\n# It was generated by minepkg.\n\n";

/// `dependent` value for packages listed directly in the manifest.
pub const ROOT_DEPENDENT: &str = "_root";

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Lockfile {
    pub lockfile_version: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fabric: Option<FabricLock>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub forge: Option<ForgeLock>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vanilla: Option<VanillaLock>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub dependencies: BTreeMap<String, DependencyLock>,
}

// ─── Platform Locks ───

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct FabricLock {
    pub minecraft: String,
    pub fabric_loader: String,
    pub mapping: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ForgeLock {
    pub minecraft: String,
    pub forge_loader: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct VanillaLock {
    pub minecraft: String,
}

/// The pinned Minecraft + loader pair every dependency resolves against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlatformLock {
    Fabric(FabricLock),
    Forge(ForgeLock),
    Vanilla(VanillaLock),
}

impl PlatformLock {
    pub fn platform(&self) -> Platform {
        match self {
            PlatformLock::Fabric(_) => Platform::Fabric,
            PlatformLock::Forge(_) => Platform::Forge,
            PlatformLock::Vanilla(_) => Platform::Vanilla,
        }
    }

    pub fn platform_name(&self) -> &'static str {
        self.platform().as_str()
    }

    pub fn minecraft_version(&self) -> &str {
        match self {
            PlatformLock::Fabric(lock) => &lock.minecraft,
            PlatformLock::Forge(lock) => &lock.minecraft,
            PlatformLock::Vanilla(lock) => &lock.minecraft,
        }
    }

    /// Loader version, empty for vanilla.
    pub fn platform_version(&self) -> &str {
        match self {
            PlatformLock::Fabric(lock) => &lock.fabric_loader,
            PlatformLock::Forge(lock) => &lock.forge_loader,
            PlatformLock::Vanilla(_) => "",
        }
    }

    /// Name of the launch manifest under `versions/`.
    pub fn launch_manifest_name(&self) -> String {
        match self {
            PlatformLock::Fabric(lock) => {
                format!("{}-fabric-{}", lock.minecraft, lock.fabric_loader)
            }
            PlatformLock::Forge(lock) => format!("{}-forge-{}", lock.minecraft, lock.forge_loader),
            PlatformLock::Vanilla(lock) => lock.minecraft.clone(),
        }
    }
}

// ─── Dependency Locks ───

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DependencyType {
    #[default]
    Mod,
    Modpack,
    Generic,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DependencyLock {
    pub name: String,
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version_name: Option<String>,
    pub provider: String,
    #[serde(rename = "type", default)]
    pub dependency_type: DependencyType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sha256: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sha512: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ipfs_hash: Option<String>,
    #[serde(default)]
    pub dependent: String,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_dev: bool,
}

impl DependencyLock {
    /// `.zip` for modpacks, `.jar` for everything else.
    pub fn file_ext(&self) -> &'static str {
        match self.dependency_type {
            DependencyType::Modpack => ".zip",
            _ => ".jar",
        }
    }

    /// Only locks with a download URL have an artifact to fetch or link.
    pub fn download_url(&self) -> Option<&str> {
        self.url.as_deref().filter(|url| !url.is_empty())
    }

    /// `{cache}/{name}/{version}{ext}`
    pub fn cache_path(&self, cache_dir: &Path) -> PathBuf {
        cache_dir
            .join(path_safe(&self.name))
            .join(format!("{}{}", path_safe(&self.version), self.file_ext()))
    }

    /// File name used inside the instance's `mods/` directory.
    pub fn link_name(&self) -> String {
        format!(
            "{}-{}{}",
            path_safe(&self.name),
            path_safe(&self.version),
            self.file_ext()
        )
    }
}

/// Pseudo-versions (ETags, base64 dates) may contain path separators.
fn path_safe(raw: &str) -> String {
    raw.chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c => c,
        })
        .collect()
}

impl Lockfile {
    pub fn new() -> Self {
        Self {
            lockfile_version: LOCKFILE_VERSION,
            ..Default::default()
        }
    }

    /// `None` when the instance has never been resolved.
    pub async fn load(path: &Path) -> MinepkgResult<Option<Self>> {
        if !path.exists() {
            return Ok(None);
        }
        let raw = tokio::fs::read_to_string(path)
            .await
            .map_err(MinepkgError::io(path))?;
        Ok(Some(toml::from_str(&raw)?))
    }

    pub fn to_toml_string(&self) -> MinepkgResult<String> {
        Ok(format!("{}{}", LOCKFILE_HEADER, toml::to_string(self)?))
    }

    pub async fn save(&self, path: &Path) -> MinepkgResult<()> {
        write_atomic(path, self.to_toml_string()?).await
    }

    pub fn platform_lock(&self) -> Option<PlatformLock> {
        if let Some(lock) = &self.fabric {
            return Some(PlatformLock::Fabric(lock.clone()));
        }
        if let Some(lock) = &self.forge {
            return Some(PlatformLock::Forge(lock.clone()));
        }
        self.vanilla.clone().map(PlatformLock::Vanilla)
    }

    /// Replaces whichever platform section was set before.
    pub fn set_platform_lock(&mut self, lock: PlatformLock) {
        self.fabric = None;
        self.forge = None;
        self.vanilla = None;
        match lock {
            PlatformLock::Fabric(lock) => self.fabric = Some(lock),
            PlatformLock::Forge(lock) => self.forge = Some(lock),
            PlatformLock::Vanilla(lock) => self.vanilla = Some(lock),
        }
    }

    pub fn has_requirements(&self) -> bool {
        self.fabric.is_some() || self.forge.is_some() || self.vanilla.is_some()
    }

    pub fn minecraft_version(&self) -> Option<String> {
        self.platform_lock()
            .map(|lock| lock.minecraft_version().to_string())
    }

    pub fn add_dependency(&mut self, lock: DependencyLock) {
        self.dependencies.insert(lock.name.clone(), lock);
    }

    pub fn clear_dependencies(&mut self) {
        self.dependencies.clear();
    }
}
