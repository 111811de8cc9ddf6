use tracing::{debug, info, instrument};

use crate::core::error::MinepkgResult;
use crate::core::loaders::{requirements_outdated, RequirementsResolver};

use super::Instance;

impl Instance {
    pub fn requirements_outdated(&self) -> bool {
        requirements_outdated(&self.manifest, self.lockfile.as_ref())
    }

    /// Re-pin the platform when the lock no longer fits the manifest (or
    /// always with `force`). The lockfile is saved right away. Returns
    /// whether anything was re-pinned.
    #[instrument(skip_all, fields(instance = %self.manifest.package.name))]
    pub async fn update_requirements(
        &mut self,
        resolver: &RequirementsResolver,
        force: bool,
    ) -> MinepkgResult<bool> {
        if !force && !self.requirements_outdated() {
            debug!("Requirements are up to date");
            return Ok(false);
        }

        let lock = resolver.resolve(&self.manifest).await?;
        info!(
            "Pinned {} {} (Minecraft {})",
            lock.platform_name(),
            lock.platform_version(),
            lock.minecraft_version()
        );
        self.lockfile_mut().set_platform_lock(lock);
        self.save_lockfile().await?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::instance::model::tests::global;
    use crate::core::manifest::{Lockfile, Manifest, PackageType, PlatformLock, VanillaLock};
    use crate::core::test_support::serve;
    use axum::{routing::get, Json, Router};
    use reqwest::Client;
    use serde_json::json;

    async fn instance(root: &std::path::Path, minecraft: &str) -> Instance {
        let mut manifest = Manifest::new("pack", PackageType::Modpack);
        manifest.requirements.minecraft = minecraft.into();
        Instance::create(global(root), root.join("pack"), manifest)
            .await
            .unwrap()
    }

    async fn resolver() -> RequirementsResolver {
        let base = serve(Router::new().route(
            "/version_manifest.json",
            get(|| async {
                Json(json!({
                    "latest": { "release": "1.17.1", "snapshot": "1.17.1" },
                    "versions": [
                        { "id": "1.17.1", "type": "release", "url": "http://127.0.0.1:9/1.17.1.json" },
                        { "id": "1.16.5", "type": "release", "url": "http://127.0.0.1:9/1.16.5.json" }
                    ]
                }))
            }),
        ))
        .await;
        RequirementsResolver::with_endpoints(
            Client::new(),
            &format!("{base}/version_manifest.json"),
            &base,
        )
    }

    #[tokio::test]
    async fn pins_and_persists_when_unlocked() {
        let dir = tempfile::tempdir().unwrap();
        let mut instance = instance(dir.path(), "~1.16.0").await;
        let resolver = resolver().await;

        assert!(instance.update_requirements(&resolver, false).await.unwrap());
        assert_eq!(
            instance.platform_lock(),
            Some(PlatformLock::Vanilla(VanillaLock {
                minecraft: "1.16.5".into()
            }))
        );

        let saved = Lockfile::load(&instance.lockfile_path()).await.unwrap().unwrap();
        assert_eq!(saved.minecraft_version().as_deref(), Some("1.16.5"));

        assert!(!instance.update_requirements(&resolver, false).await.unwrap());
    }

    #[tokio::test]
    async fn changed_range_repins() {
        let dir = tempfile::tempdir().unwrap();
        let mut instance = instance(dir.path(), "~1.16.0").await;
        let resolver = resolver().await;
        instance.update_requirements(&resolver, false).await.unwrap();

        instance.manifest.requirements.minecraft = "1.17".into();
        assert!(instance.requirements_outdated());
        assert!(instance.update_requirements(&resolver, false).await.unwrap());
        assert_eq!(
            instance.lockfile.as_ref().unwrap().minecraft_version().as_deref(),
            Some("1.17.1")
        );
    }
}
