use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::core::error::{MinepkgError, MinepkgResult};
use crate::core::manifest::{Lockfile, Manifest, PlatformLock, LOCKFILE_FILE, MANIFEST_FILE};
use crate::core::state::AppState;

/// A directory holding a `minepkg.toml`, plus everything it shares with
/// other instances through [`AppState`].
///
/// Each instance folder looks like:
/// - `minepkg.toml`: the manifest
/// - `minepkg-lock.toml`: resolved versions, written by minepkg
/// - `saves/`: local worlds, copied into the game dir
/// - `overwrites/`: files copied over the game dir on every launch
/// - `minecraft/`: game working directory (`.minecraft` equivalent)
#[derive(Clone)]
pub struct Instance {
    pub directory: PathBuf,
    pub manifest: Manifest,
    pub lockfile: Option<Lockfile>,
    pub global: AppState,
}

impl Instance {
    /// Load the instance rooted at `directory`.
    pub async fn load(global: AppState, directory: impl Into<PathBuf>) -> MinepkgResult<Self> {
        let directory = directory.into();
        let manifest = Manifest::load(&directory.join(MANIFEST_FILE)).await?;
        let lockfile = Lockfile::load(&directory.join(LOCKFILE_FILE)).await?;
        debug!(
            "Loaded instance {} (locked: {})",
            manifest.package.name,
            lockfile.is_some()
        );

        Ok(Self {
            directory,
            manifest,
            lockfile,
            global,
        })
    }

    /// Write `manifest` into a fresh instance directory.
    pub async fn create(
        global: AppState,
        directory: impl Into<PathBuf>,
        manifest: Manifest,
    ) -> MinepkgResult<Self> {
        let directory = directory.into();
        create_dir(&directory).await?;
        manifest.save(&directory.join(MANIFEST_FILE)).await?;
        info!("Created instance {} at {:?}", manifest.package.name, directory);

        Ok(Self {
            directory,
            manifest,
            lockfile: None,
            global,
        })
    }

    // ── Paths ───────────────────────────────────────────

    pub fn manifest_path(&self) -> PathBuf {
        self.directory.join(MANIFEST_FILE)
    }

    pub fn lockfile_path(&self) -> PathBuf {
        self.directory.join(LOCKFILE_FILE)
    }

    pub fn minecraft_dir(&self) -> PathBuf {
        self.directory.join("minecraft")
    }

    pub fn mods_dir(&self) -> PathBuf {
        self.minecraft_dir().join("mods")
    }

    pub fn local_saves_dir(&self) -> PathBuf {
        self.directory.join("saves")
    }

    pub fn overwrites_dir(&self) -> PathBuf {
        self.directory.join("overwrites")
    }

    // ── Persistence ─────────────────────────────────────

    pub async fn save_manifest(&self) -> MinepkgResult<()> {
        self.manifest.save(&self.manifest_path()).await
    }

    pub async fn save_lockfile(&self) -> MinepkgResult<()> {
        match &self.lockfile {
            Some(lockfile) => lockfile.save(&self.lockfile_path()).await,
            None => Ok(()),
        }
    }

    pub fn platform_lock(&self) -> Option<PlatformLock> {
        self.lockfile.as_ref().and_then(Lockfile::platform_lock)
    }

    pub fn lockfile_mut(&mut self) -> &mut Lockfile {
        self.lockfile.get_or_insert_with(Lockfile::new)
    }
}

pub(crate) async fn create_dir(path: &Path) -> MinepkgResult<()> {
    tokio::fs::create_dir_all(path)
        .await
        .map_err(MinepkgError::io(path))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::core::manifest::PackageType;
    use crate::core::state::Settings;
    use reqwest::Client;

    pub(crate) fn global(data_dir: &Path) -> AppState {
        AppState::new(data_dir.to_path_buf(), Settings::default(), Client::new())
    }

    #[tokio::test]
    async fn create_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("pack");
        let mut manifest = Manifest::new("pack", PackageType::Modpack);
        manifest.requirements.minecraft = "1.16.5".into();

        let created = Instance::create(global(dir.path()), &root, manifest)
            .await
            .unwrap();
        assert_eq!(created.mods_dir(), root.join("minecraft").join("mods"));

        let loaded = Instance::load(global(dir.path()), &root).await.unwrap();
        assert_eq!(loaded.manifest.package.name, "pack");
        assert!(loaded.lockfile.is_none());
        assert!(loaded.platform_lock().is_none());
    }

    #[tokio::test]
    async fn missing_manifest_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            Instance::load(global(dir.path()), dir.path()).await,
            Err(MinepkgError::ManifestNotFound(_))
        ));
    }
}
