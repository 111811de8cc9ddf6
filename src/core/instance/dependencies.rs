use std::collections::{BTreeSet, HashMap};
use std::path::{Component, Path, PathBuf};

use tracing::{debug, info, instrument, warn};

use crate::core::constraint::{parse_version, Constraint};
use crate::core::downloader::Downloadable;
use crate::core::error::{MinepkgError, MinepkgResult};
use crate::core::manifest::{
    DependencyLock, DependencyType, InterpretedDependency, Platform, ROOT_DEPENDENT,
};
use crate::core::pkgid::{PackageId, DEFAULT_PROVIDER, DISABLED, DUMMY_PROVIDER};
use crate::core::resolver::Resolver;

use super::Instance;

pub const COMPANION_NAME: &str = "minepkg-companion";

/// Whether the lock for `id` has to be re-resolved.
///
/// Anything outside the first-party registry is always treated as possibly
/// stale, since its artifacts can change without a version bump.
pub fn needs_updating(id: &PackageId, lock: Option<&DependencyLock>) -> bool {
    if id.provider == DUMMY_PROVIDER {
        return false;
    }
    if id.provider != DEFAULT_PROVIDER {
        return true;
    }
    let Some(lock) = lock else {
        return true;
    };
    if lock.version == id.version {
        return false;
    }
    let Some(constraint) = Constraint::parse(&id.version) else {
        return false;
    };
    let Some(locked) = parse_version(&lock.version) else {
        return true;
    };
    !constraint.matches(&locked)
}

impl Instance {
    /// Manifest dependencies plus the companion mod for fabric instances.
    pub fn resolution_set(&self) -> Vec<InterpretedDependency> {
        let include_dev = self.global.settings.include_dev_dependencies;
        let mut dependencies = self.manifest.interpreted_dependencies(include_dev);

        let companion = self
            .manifest
            .requirements
            .minepkg_companion
            .as_deref()
            .filter(|v| !v.is_empty())
            .unwrap_or("latest");
        let declared = dependencies.iter().any(|d| d.name() == COMPANION_NAME);
        if self.manifest.platform() == Platform::Fabric && companion != DISABLED && !declared {
            dependencies.push(InterpretedDependency::from_entry(
                COMPANION_NAME,
                companion,
                false,
            ));
        }
        dependencies
    }

    /// True if any dependency is stale, missing from the lockfile, or a
    /// top-level lock has no manifest entry anymore.
    pub fn dependencies_outdated(&self) -> bool {
        let Some(lockfile) = &self.lockfile else {
            return true;
        };

        let wanted = self.resolution_set();
        for dependency in &wanted {
            let lock = lockfile.dependencies.get(dependency.name());
            if needs_updating(&dependency.id, lock) {
                debug!("{} needs updating", dependency.name());
                return true;
            }
        }

        let names: BTreeSet<&str> = wanted.iter().map(InterpretedDependency::name).collect();
        lockfile
            .dependencies
            .values()
            .filter(|lock| lock.dependent == ROOT_DEPENDENT)
            .any(|lock| !names.contains(lock.name.as_str()))
    }

    /// Resolve the whole resolution set and replace the lockfile's
    /// dependencies with the result. Nothing is written if any dependency
    /// fails.
    ///
    /// # Panics
    /// When requirements have not been pinned yet.
    #[instrument(skip_all, fields(instance = %self.manifest.package.name))]
    pub async fn update_dependencies(&mut self, force: bool) -> MinepkgResult<bool> {
        if !force && !self.dependencies_outdated() {
            debug!("Dependencies are up to date");
            return Ok(false);
        }

        let wanted = self.resolution_set();
        let locks = Resolver::new(&self.global.providers, self.platform_lock())
            .resolve(&wanted)
            .await?;

        let lockfile = self.lockfile_mut();
        lockfile.clear_dependencies();
        for lock in locks.into_values() {
            lockfile.add_dependency(lock);
        }
        self.save_lockfile().await?;
        Ok(true)
    }

    /// Locked artifacts not yet in the package cache.
    pub fn missing_dependencies(&self) -> Vec<&DependencyLock> {
        let cache_dir = self.global.cache_dir();
        self.lockfile
            .iter()
            .flat_map(|lockfile| lockfile.dependencies.values())
            .filter(|lock| lock.download_url().is_some())
            .filter(|lock| !lock.cache_path(&cache_dir).exists())
            .collect()
    }

    pub fn missing_dependency_items(&self) -> MinepkgResult<Vec<Box<dyn Downloadable>>> {
        let cache_dir = self.global.cache_dir();
        self.missing_dependencies()
            .into_iter()
            .map(|lock| {
                self.global
                    .providers
                    .fetch_item(lock, lock.cache_path(&cache_dir))
            })
            .collect()
    }

    /// Rebuild `mods/` from the cache. Modpacks are extracted into the game
    /// dir instead of being linked.
    #[instrument(skip_all)]
    pub async fn link_dependencies(&self) -> MinepkgResult<()> {
        let mods_dir = self.mods_dir();
        clear_dir(&mods_dir).await?;

        let Some(lockfile) = &self.lockfile else {
            return Ok(());
        };
        let cache_dir = self.global.cache_dir();

        let mut linked = 0;
        for lock in lockfile.dependencies.values() {
            if lock.download_url().is_none() {
                continue;
            }
            let from = lock.cache_path(&cache_dir);

            if lock.dependency_type == DependencyType::Modpack {
                let minecraft_dir = self.minecraft_dir();
                info!("Extracting modpack {}@{}", lock.name, lock.version);
                tokio::task::spawn_blocking(move || extract_modpack(&from, &minecraft_dir))
                    .await
                    .map_err(|e| MinepkgError::Other(format!("modpack extraction failed: {e}")))??;
                continue;
            }

            link_file(&from, &mods_dir.join(lock.link_name())).await?;
            linked += 1;
        }

        info!("Linked {} mods into {:?}", linked, mods_dir);
        Ok(())
    }
}

/// Empty `dir`, creating it if needed.
async fn clear_dir(dir: &Path) -> MinepkgResult<()> {
    tokio::fs::create_dir_all(dir)
        .await
        .map_err(MinepkgError::io(dir))?;

    let mut entries = tokio::fs::read_dir(dir).await.map_err(MinepkgError::io(dir))?;
    while let Some(entry) = entries.next_entry().await.map_err(MinepkgError::io(dir))? {
        let path = entry.path();
        let file_type = entry.file_type().await.map_err(MinepkgError::io(&path))?;
        if file_type.is_dir() {
            tokio::fs::remove_dir_all(&path).await
        } else {
            tokio::fs::remove_file(&path).await
        }
        .map_err(MinepkgError::io(&path))?;
    }
    Ok(())
}

async fn link_file(from: &Path, to: &Path) -> MinepkgResult<()> {
    #[cfg(unix)]
    {
        tokio::fs::symlink(from, to)
            .await
            .map_err(MinepkgError::io(to))
    }

    // Symlinks need elevated rights on windows.
    #[cfg(not(unix))]
    {
        if let Err(err) = tokio::fs::hard_link(from, to).await {
            warn!("Hard link failed for {:?} ({}), copying", to, err);
            tokio::fs::copy(from, to)
                .await
                .map_err(MinepkgError::io(to))?;
        }
        Ok(())
    }
}

/// Extract a modpack archive into `minecraft_dir`. Worlds under `saves/`
/// that already exist are left alone.
pub fn extract_modpack(archive: &Path, minecraft_dir: &Path) -> MinepkgResult<()> {
    let file = std::fs::File::open(archive).map_err(MinepkgError::io(archive))?;
    let mut zip = zip::ZipArchive::new(file)?;

    // world dir -> existed before extraction
    let mut worlds: HashMap<PathBuf, bool> = HashMap::new();

    for index in 0..zip.len() {
        let mut entry = zip.by_index(index)?;
        let rel = entry
            .enclosed_name()
            .ok_or_else(|| MinepkgError::IllegalArchivePath(entry.name().to_string()))?;

        if let Some(world) = save_world(&rel) {
            let existed = *worlds
                .entry(world.clone())
                .or_insert_with(|| minecraft_dir.join(&world).exists());
            if existed {
                debug!("Keeping existing world {:?}", world);
                continue;
            }
        }

        let out_path = minecraft_dir.join(&rel);
        if entry.is_dir() {
            std::fs::create_dir_all(&out_path).map_err(MinepkgError::io(&out_path))?;
            continue;
        }
        if let Some(parent) = out_path.parent() {
            std::fs::create_dir_all(parent).map_err(MinepkgError::io(parent))?;
        }
        let mut out = std::fs::File::create(&out_path).map_err(MinepkgError::io(&out_path))?;
        std::io::copy(&mut entry, &mut out).map_err(MinepkgError::io(&out_path))?;
    }

    if worlds.values().any(|existed| *existed) {
        warn!("Some worlds were already present and have not been overwritten");
    }
    Ok(())
}

/// `saves/<world>` for paths inside a world.
fn save_world(rel: &Path) -> Option<PathBuf> {
    let mut components = rel.components();
    match (components.next(), components.next(), components.next()) {
        (Some(Component::Normal(saves)), Some(Component::Normal(world)), Some(_))
            if saves == "saves" =>
        {
            Some(Path::new(saves).join(world))
        }
        _ => None,
    }
}
