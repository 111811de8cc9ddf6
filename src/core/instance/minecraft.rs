// ─── Game Files ───
// Launch manifest, libraries, main jar and assets shared by all instances.

use std::collections::HashSet;
use std::path::PathBuf;

use tracing::{debug, info, instrument};

use crate::core::assets::{AssetIndex, RESOURCES_URL};
use crate::core::downloader::{Checksum, Downloadable, HttpItem};
use crate::core::error::{MinepkgError, MinepkgResult};
use crate::core::loaders::RequirementsResolver;
use crate::core::version::{Environment, LaunchManifest};

use super::Instance;

impl Instance {
    /// Merged launch manifest for the locked platform, cached under the
    /// global versions dir.
    pub async fn launch_manifest(
        &self,
        resolver: &RequirementsResolver,
    ) -> MinepkgResult<LaunchManifest> {
        let lock = self
            .platform_lock()
            .ok_or(MinepkgError::RequirementsNotLocked)?;
        resolver
            .launch_manifest(&lock, &self.global.versions_dir())
            .await
    }

    /// Absolute paths of every library `env` needs, in manifest order.
    pub fn library_paths(
        &self,
        manifest: &LaunchManifest,
        env: &Environment,
    ) -> MinepkgResult<Vec<PathBuf>> {
        let libraries_dir = self.global.libraries_dir();
        let mut seen = HashSet::new();
        let mut paths = Vec::new();
        for library in manifest.required_libraries(env) {
            let path = libraries_dir.join(library.filepath(env)?);
            if seen.insert(path.clone()) {
                paths.push(path);
            }
        }
        Ok(paths)
    }

    pub fn missing_libraries(
        &self,
        manifest: &LaunchManifest,
        env: &Environment,
    ) -> MinepkgResult<Vec<Box<dyn Downloadable>>> {
        let libraries_dir = self.global.libraries_dir();
        let client = &self.global.http_client;
        let mut seen = HashSet::new();
        let mut items: Vec<Box<dyn Downloadable>> = Vec::new();

        for library in manifest.required_libraries(env) {
            let filepath = library.filepath(env)?;
            let target = libraries_dir.join(&filepath);
            if target.exists() || !seen.insert(filepath) {
                continue;
            }
            let item = HttpItem::new(client.clone(), library.download_url(env)?, target)
                .with_checksum(library.sha1(env).map(Checksum::Sha1));
            items.push(Box::new(item));
        }

        debug!("{} libraries missing", items.len());
        Ok(items)
    }

    /// `versions/{mc}/{mc}.jar`, or `{mc}-server.jar` for servers.
    pub fn main_jar_path(&self, manifest: &LaunchManifest, server: bool) -> PathBuf {
        let minecraft = manifest.minecraft_version();
        let name = if server {
            format!("{minecraft}-server.jar")
        } else {
            manifest.jar_name()
        };
        self.global.versions_dir().join(minecraft).join(name)
    }

    /// Download for the main jar, `None` if it is already there.
    pub fn main_jar_item(
        &self,
        manifest: &LaunchManifest,
        server: bool,
    ) -> MinepkgResult<Option<Box<dyn Downloadable>>> {
        let target = self.main_jar_path(manifest, server);
        if target.exists() {
            return Ok(None);
        }

        let downloads = manifest.downloads.as_ref();
        let artifact = if server {
            downloads.and_then(|d| d.server.as_ref())
        } else {
            downloads.and_then(|d| d.client.as_ref())
        };
        let artifact = artifact.filter(|a| !a.url.is_empty()).ok_or_else(|| {
            MinepkgError::Other(format!(
                "Minecraft {} has no {} download",
                manifest.minecraft_version(),
                if server { "server" } else { "client" }
            ))
        })?;

        let item = HttpItem::new(self.global.http_client.clone(), artifact.url.clone(), target)
            .with_checksum(artifact.sha1.clone().map(Checksum::Sha1));
        Ok(Some(Box::new(item)))
    }

    /// Asset objects not in the shared object store yet. Fetches the asset
    /// index on first use.
    #[instrument(skip_all)]
    pub async fn missing_assets(
        &self,
        manifest: &LaunchManifest,
    ) -> MinepkgResult<Vec<Box<dyn Downloadable>>> {
        let Some(index_ref) = &manifest.asset_index else {
            info!("Launch manifest has no asset index");
            return Ok(Vec::new());
        };

        let client = &self.global.http_client;
        let assets_dir = self.global.assets_dir();
        let index = AssetIndex::load_or_fetch(client, index_ref, &assets_dir).await?;
        Ok(index.missing_items(client, &assets_dir.join("objects"), RESOURCES_URL))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::instance::model::tests::global;
    use crate::core::manifest::{Manifest, PackageType};
    use serde_json::json;

    fn manifest() -> LaunchManifest {
        serde_json::from_value(json!({
            "id": "1.16.5",
            "mainClass": "net.minecraft.client.main.Main",
            "downloads": {
                "client": { "sha1": "abc", "size": 1, "url": "https://example.com/client.jar" }
            },
            "libraries": [
                {
                    "name": "com.mojang:brigadier:1.0.17",
                    "downloads": { "artifact": {
                        "path": "com/mojang/brigadier/1.0.17/brigadier-1.0.17.jar",
                        "sha1": "def",
                        "url": "https://libraries.minecraft.net/com/mojang/brigadier/1.0.17/brigadier-1.0.17.jar"
                    } }
                },
                { "name": "net.fabricmc:fabric-loader:0.11.6", "url": "https://maven.fabricmc.net/" },
                {
                    "name": "ca.weblite:java-objc-bridge:1.0.0",
                    "rules": [{ "action": "allow", "os": { "name": "osx" } }]
                }
            ]
        }))
        .unwrap()
    }

    async fn instance(root: &std::path::Path) -> Instance {
        Instance::create(
            global(root),
            root.join("pack"),
            Manifest::new("pack", PackageType::Modpack),
        )
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn libraries_follow_rules_and_skip_present_files() {
        let dir = tempfile::tempdir().unwrap();
        let instance = instance(dir.path()).await;
        let env = Environment::new("linux", "x64");
        let manifest = manifest();

        let paths = instance.library_paths(&manifest, &env).unwrap();
        assert_eq!(paths.len(), 2);
        assert!(paths[1].ends_with("net/fabricmc/fabric-loader/0.11.6/fabric-loader-0.11.6.jar"));

        assert_eq!(instance.missing_libraries(&manifest, &env).unwrap().len(), 2);
        std::fs::create_dir_all(paths[0].parent().unwrap()).unwrap();
        std::fs::write(&paths[0], b"jar").unwrap();
        assert_eq!(instance.missing_libraries(&manifest, &env).unwrap().len(), 1);

        let mac = Environment::new("osx", "arm64");
        assert_eq!(instance.missing_libraries(&manifest, &mac).unwrap().len(), 2);
    }

    #[tokio::test]
    async fn main_jar_paths_and_server_download() {
        let dir = tempfile::tempdir().unwrap();
        let instance = instance(dir.path()).await;
        let manifest = manifest();

        let versions = instance.global.versions_dir().join("1.16.5");
        assert_eq!(instance.main_jar_path(&manifest, false), versions.join("1.16.5.jar"));
        assert_eq!(
            instance.main_jar_path(&manifest, true),
            versions.join("1.16.5-server.jar")
        );

        assert!(instance.main_jar_item(&manifest, false).unwrap().is_some());
        assert!(instance.main_jar_item(&manifest, true).is_err());

        std::fs::create_dir_all(&versions).unwrap();
        std::fs::write(versions.join("1.16.5.jar"), b"jar").unwrap();
        assert!(instance.main_jar_item(&manifest, false).unwrap().is_none());
    }

    #[tokio::test]
    async fn no_asset_index_means_no_assets() {
        let dir = tempfile::tempdir().unwrap();
        let instance = instance(dir.path()).await;
        assert!(instance.missing_assets(&manifest()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn unlocked_instance_has_no_launch_manifest() {
        let dir = tempfile::tempdir().unwrap();
        let instance = instance(dir.path()).await;
        let resolver = instance.global.requirements_resolver();
        assert!(matches!(
            instance.launch_manifest(&resolver).await,
            Err(MinepkgError::RequirementsNotLocked)
        ));
    }
}
