use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::core::downloader::write_atomic;
use crate::core::error::{MinepkgError, MinepkgResult};
use crate::core::pkgid::PackageId;

pub const MANIFEST_FILE: &str = "minepkg.toml";

/// Supported platforms. Quilt/NeoForge instances are not part of the
/// manifest format.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Vanilla,
    Fabric,
    Forge,
}

impl Platform {
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Vanilla => "vanilla",
            Platform::Fabric => "fabric",
            Platform::Forge => "forge",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PackageType {
    #[default]
    Mod,
    Modpack,
}

/// User-authored `minepkg.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    #[serde(default)]
    pub manifest_version: u32,
    pub package: PackageSection,
    #[serde(default)]
    pub requirements: Requirements,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub dependencies: BTreeMap<String, String>,
    #[serde(default)]
    pub dev: DevSection,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageSection {
    #[serde(rename = "type", default)]
    pub package_type: PackageType,
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platform: Option<Platform>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub license: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Requirements {
    #[serde(default)]
    pub minecraft: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fabric_loader: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub forge_loader: Option<String>,
    /// Version of the companion mod injected into fabric instances; `none`
    /// turns it off.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minepkg_companion: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DevSection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub build_command: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jar: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub dependencies: BTreeMap<String, String>,
}

/// A manifest dependency after its value string went through
/// [`PackageId::parse`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterpretedDependency {
    pub id: PackageId,
    pub is_dev: bool,
}

impl InterpretedDependency {
    /// Interpret `key = "value"`. The key is always the dependency name; the
    /// value only contributes provider, platform and version.
    pub fn from_entry(key: &str, value: &str, is_dev: bool) -> Self {
        let mut id = PackageId::parse(value);
        id.name = key.to_string();
        Self { id, is_dev }
    }

    pub fn name(&self) -> &str {
        &self.id.name
    }
}

impl Manifest {
    pub fn new(name: &str, package_type: PackageType) -> Self {
        Self {
            manifest_version: 0,
            package: PackageSection {
                package_type,
                name: name.to_string(),
                ..Default::default()
            },
            requirements: Requirements {
                minecraft: "*".into(),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    pub async fn load(path: &Path) -> MinepkgResult<Self> {
        if !path.exists() {
            return Err(MinepkgError::ManifestNotFound(path.to_path_buf()));
        }
        let raw = tokio::fs::read_to_string(path)
            .await
            .map_err(MinepkgError::io(path))?;
        Ok(toml::from_str(&raw)?)
    }

    pub async fn save(&self, path: &Path) -> MinepkgResult<()> {
        write_atomic(path, toml::to_string(self)?).await
    }

    /// fabric if a fabric loader is required, forge if a forge loader is,
    /// vanilla otherwise.
    pub fn platform(&self) -> Platform {
        if self.requirements.fabric_loader.as_deref().is_some_and(|v| !v.is_empty()) {
            Platform::Fabric
        } else if self.requirements.forge_loader.as_deref().is_some_and(|v| !v.is_empty()) {
            Platform::Forge
        } else {
            Platform::Vanilla
        }
    }

    pub fn platform_version(&self) -> Option<&str> {
        match self.platform() {
            Platform::Fabric => self.requirements.fabric_loader.as_deref(),
            Platform::Forge => self.requirements.forge_loader.as_deref(),
            Platform::Vanilla => None,
        }
    }

    /// Dependencies in key order, dev dependencies last when requested.
    /// Every id gets the manifest's platform unless it names its own.
    pub fn interpreted_dependencies(&self, include_dev: bool) -> Vec<InterpretedDependency> {
        let platform = self.platform().as_str();
        let regular = self
            .dependencies
            .iter()
            .map(|(key, value)| InterpretedDependency::from_entry(key, value, false));
        let dev = self
            .dev
            .dependencies
            .iter()
            .filter(|_| include_dev)
            .map(|(key, value)| InterpretedDependency::from_entry(key, value, true));

        regular
            .chain(dev)
            .map(|mut dep| {
                if dep.id.platform.is_empty() {
                    dep.id.platform = platform.to_string();
                }
                dep
            })
            .collect()
    }

    pub fn add_dependency(&mut self, name: &str, version: &str) {
        self.dependencies.insert(name.to_string(), version.to_string());
    }

    pub fn remove_dependency(&mut self, name: &str) -> Option<String> {
        self.dependencies.remove(name)
    }
}
