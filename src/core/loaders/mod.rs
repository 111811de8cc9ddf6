// ─── Platform Requirements ───
// Pins `requirements.minecraft` and the loader range to concrete versions and
// produces the merged launch manifest for a pinned platform.

pub mod fabric;
pub mod vanilla;

use std::path::{Path, PathBuf};

use reqwest::Client;
use tracing::{debug, info, instrument};

use crate::core::constraint::Constraint;
use crate::core::error::{MinepkgError, MinepkgResult};
use crate::core::manifest::{ForgeLock, Lockfile, Manifest, Platform, PlatformLock};
use crate::core::version::{LaunchManifest, VERSION_MANIFEST_URL};

pub use fabric::{FabricMeta, FABRIC_META_BASE};
pub use vanilla::VanillaMeta;

#[derive(Clone)]
pub struct RequirementsResolver {
    vanilla: VanillaMeta,
    fabric: FabricMeta,
}

impl RequirementsResolver {
    pub fn new(client: Client) -> Self {
        Self::with_endpoints(client, VERSION_MANIFEST_URL, FABRIC_META_BASE)
    }

    pub fn with_endpoints(client: Client, version_manifest_url: &str, fabric_meta: &str) -> Self {
        Self {
            vanilla: VanillaMeta::with_url(client.clone(), version_manifest_url),
            fabric: FabricMeta::with_base(client, fabric_meta),
        }
    }

    #[instrument(skip_all, fields(platform = %manifest.platform()))]
    pub async fn resolve(&self, manifest: &Manifest) -> MinepkgResult<PlatformLock> {
        let minecraft = manifest.requirements.minecraft.as_str();

        match manifest.platform() {
            Platform::Vanilla => Ok(PlatformLock::Vanilla(
                self.vanilla.resolve_lock(minecraft).await?,
            )),
            Platform::Fabric => {
                let loader = manifest.requirements.fabric_loader.as_deref().unwrap_or("*");
                Ok(PlatformLock::Fabric(
                    self.fabric.resolve_lock(minecraft, loader).await?,
                ))
            }
            Platform::Forge => {
                let vanilla = self.vanilla.resolve_lock(minecraft).await?;
                let forge_loader = manifest
                    .requirements
                    .forge_loader
                    .clone()
                    .unwrap_or_default();
                Ok(PlatformLock::Forge(ForgeLock {
                    minecraft: vanilla.minecraft,
                    forge_loader,
                }))
            }
        }
    }

    /// The launch manifest for `lock`, loader profiles merged onto their
    /// vanilla parent. JSON files are cached under `versions_dir`.
    pub async fn launch_manifest(
        &self,
        lock: &PlatformLock,
        versions_dir: &Path,
    ) -> MinepkgResult<LaunchManifest> {
        let minecraft = lock.minecraft_version();
        let mut manifest = self
            .vanilla
            .launch_manifest(minecraft, &version_json_path(versions_dir, minecraft))
            .await?;

        match lock {
            PlatformLock::Vanilla(_) => {}
            PlatformLock::Fabric(fabric) => {
                let name = lock.launch_manifest_name();
                let profile = self
                    .fabric
                    .profile(fabric, &version_json_path(versions_dir, &name))
                    .await?;
                debug!("Merging {} onto {}", name, minecraft);
                manifest.merge(profile);
            }
            PlatformLock::Forge(_) => {
                return Err(MinepkgError::UnsupportedPlatform(
                    Platform::Forge.to_string(),
                ))
            }
        }

        Ok(manifest)
    }
}

/// `versions/{name}/{name}.json`
pub fn version_json_path(versions_dir: &Path, name: &str) -> PathBuf {
    versions_dir.join(name).join(format!("{name}.json"))
}

/// True when the lockfile has to be re-pinned: nothing is locked yet, the
/// platform changed, or a locked version no longer satisfies its range.
pub fn requirements_outdated(manifest: &Manifest, lockfile: Option<&Lockfile>) -> bool {
    let Some(lock) = lockfile.and_then(Lockfile::platform_lock) else {
        return true;
    };
    if lock.platform() != manifest.platform() {
        info!(
            "Platform changed from {} to {}",
            lock.platform(),
            manifest.platform()
        );
        return true;
    }

    if !satisfies(&manifest.requirements.minecraft, lock.minecraft_version()) {
        return true;
    }

    match &lock {
        PlatformLock::Vanilla(_) => false,
        PlatformLock::Fabric(fabric) => !satisfies(
            manifest.requirements.fabric_loader.as_deref().unwrap_or("*"),
            &fabric.fabric_loader,
        ),
        PlatformLock::Forge(forge) => {
            manifest.requirements.forge_loader.as_deref() != Some(forge.forge_loader.as_str())
        }
    }
}

/// An unparseable range never counts as satisfied, so resolution runs and
/// reports it.
fn satisfies(requirement: &str, locked: &str) -> bool {
    Constraint::parse(requirement).is_some_and(|c| c.matches_str(locked))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::manifest::{FabricLock, PackageType, VanillaLock};
    use crate::core::test_support::serve;
    use axum::{extract::Path as UrlPath, routing::get, Json, Router};
    use serde_json::json;

    fn fabric_manifest(minecraft: &str, loader: &str) -> Manifest {
        let mut manifest = Manifest::new("pack", PackageType::Modpack);
        manifest.requirements.minecraft = minecraft.into();
        manifest.requirements.fabric_loader = Some(loader.into());
        manifest
    }

    fn locked(lock: PlatformLock) -> Lockfile {
        let mut lockfile = Lockfile::new();
        lockfile.set_platform_lock(lock);
        lockfile
    }

    fn fabric_lock() -> PlatformLock {
        PlatformLock::Fabric(FabricLock {
            minecraft: "1.16.5".into(),
            fabric_loader: "0.11.6".into(),
            mapping: "1.16.5+build.10".into(),
        })
    }

    #[test]
    fn missing_lock_is_outdated() {
        assert!(requirements_outdated(&fabric_manifest("~1.16.0", "^0.11.0"), None));
        assert!(requirements_outdated(
            &fabric_manifest("~1.16.0", "^0.11.0"),
            Some(&Lockfile::new())
        ));
    }

    #[test]
    fn satisfied_lock_is_current() {
        let lockfile = locked(fabric_lock());
        assert!(!requirements_outdated(&fabric_manifest("~1.16.0", "^0.11.0"), Some(&lockfile)));
        assert!(requirements_outdated(&fabric_manifest("1.17", "^0.11.0"), Some(&lockfile)));
        assert!(requirements_outdated(&fabric_manifest("~1.16.0", "^0.12.0"), Some(&lockfile)));
    }

    #[test]
    fn platform_change_is_outdated() {
        let mut manifest = Manifest::new("pack", PackageType::Modpack);
        manifest.requirements.minecraft = "1.16.5".into();
        assert!(requirements_outdated(&manifest, Some(&locked(fabric_lock()))));

        let vanilla = locked(PlatformLock::Vanilla(VanillaLock {
            minecraft: "1.16.5".into(),
        }));
        assert!(!requirements_outdated(&manifest, Some(&vanilla)));
    }

    #[test]
    fn forge_loader_is_compared_verbatim() {
        let mut manifest = Manifest::new("pack", PackageType::Modpack);
        manifest.requirements.minecraft = "1.12.2".into();
        manifest.requirements.forge_loader = Some("14.23.5.2855".into());
        let lockfile = locked(PlatformLock::Forge(ForgeLock {
            minecraft: "1.12.2".into(),
            forge_loader: "14.23.5.2855".into(),
        }));
        assert!(!requirements_outdated(&manifest, Some(&lockfile)));

        manifest.requirements.forge_loader = Some("14.23.5.2860".into());
        assert!(requirements_outdated(&manifest, Some(&lockfile)));
    }

    async fn fixture() -> String {
        let router = Router::new()
            .route(
                "/v1/versions/mappings",
                get(|| async {
                    Json(json!([{ "gameVersion": "1.16.5", "version": "1.16.5+build.10" }]))
                }),
            )
            .route(
                "/v1/versions/loader",
                get(|| async { Json(json!([{ "version": "0.11.6" }])) }),
            )
            .route(
                "/v2/versions/loader/:mc/:loader/profile/json",
                get(|UrlPath((mc, loader)): UrlPath<(String, String)>| async move {
                    Json(json!({
                        "id": format!("fabric-loader-{loader}-{mc}"),
                        "inheritsFrom": mc,
                        "mainClass": "net.fabricmc.loader.launch.knot.KnotClient",
                        "libraries": [{ "name": format!("net.fabricmc:fabric-loader:{loader}"), "url": "https://maven.fabricmc.net/" }]
                    }))
                }),
            );
        serve(router).await
    }

    #[tokio::test]
    async fn fabric_manifest_is_merged_onto_cached_vanilla() {
        let base = fixture().await;
        let resolver = RequirementsResolver::with_endpoints(
            Client::new(),
            "http://127.0.0.1:9/version_manifest.json",
            &base,
        );

        let lock = resolver
            .resolve(&fabric_manifest("1.16.5", "*"))
            .await
            .unwrap();
        assert_eq!(lock, fabric_lock());

        let versions = tempfile::tempdir().unwrap();
        let vanilla_path = version_json_path(versions.path(), "1.16.5");
        tokio::fs::create_dir_all(vanilla_path.parent().unwrap())
            .await
            .unwrap();
        tokio::fs::write(
            &vanilla_path,
            json!({
                "id": "1.16.5",
                "mainClass": "net.minecraft.client.main.Main",
                "libraries": [{ "name": "com.mojang:brigadier:1.0.17" }]
            })
            .to_string(),
        )
        .await
        .unwrap();

        let merged = resolver.launch_manifest(&lock, versions.path()).await.unwrap();
        assert_eq!(merged.main_class, "net.fabricmc.loader.launch.knot.KnotClient");
        assert_eq!(merged.minecraft_version(), "1.16.5");
        assert_eq!(merged.libraries.len(), 2);
        assert!(version_json_path(versions.path(), "1.16.5-fabric-0.11.6").exists());
    }

    #[tokio::test]
    async fn forge_launch_manifest_is_unsupported() {
        let versions = tempfile::tempdir().unwrap();
        let vanilla_path = version_json_path(versions.path(), "1.12.2");
        tokio::fs::create_dir_all(vanilla_path.parent().unwrap())
            .await
            .unwrap();
        tokio::fs::write(&vanilla_path, r#"{ "id": "1.12.2", "mainClass": "M" }"#)
            .await
            .unwrap();

        let resolver = RequirementsResolver::new(Client::new());
        let lock = PlatformLock::Forge(ForgeLock {
            minecraft: "1.12.2".into(),
            forge_loader: "14.23.5.2855".into(),
        });
        assert!(matches!(
            resolver.launch_manifest(&lock, versions.path()).await,
            Err(MinepkgError::UnsupportedPlatform(_))
        ));
    }
}
