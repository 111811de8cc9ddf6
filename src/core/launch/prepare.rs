// ─── Launch Preparation ───
// Brings an instance from "just a manifest" to a running game:
//   requirements → java (background) → dependencies → downloads →
//   materialize → launch
// Every step can be re-run on its own and does nothing when up to date.

use std::path::PathBuf;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::core::downloader::{DownloadManager, Downloadable};
use crate::core::error::{MinepkgError, MinepkgResult};
use crate::core::instance::{create_dir, Instance};
use crate::core::java::{required_java_for_minecraft_version, JavaManager};
use crate::core::loaders::RequirementsResolver;
use crate::core::version::{Environment, LaunchManifest};

use super::classpath::{build_classpath, cleanup_natives, extract_natives, native_jars};
use super::task::{build_args, run, GameCommand, LaunchOptions, LaunchOutcome, LaunchPaths};

const EULA: &str = "# accepted through minepkg\n# https://account.mojang.com/documents/minecraft_eula\neula=true\n";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LaunchState {
    Fresh,
    RequirementsChecked,
    DependenciesChecked,
    MinecraftAssetsReady,
    Running,
    Exited(LaunchOutcome),
}

pub struct Launcher {
    pub instance: Instance,
    resolver: RequirementsResolver,
    downloads: DownloadManager,
    java: JavaManager,
    env: Environment,
    options: LaunchOptions,
    force_update: bool,
    state: LaunchState,
    requirements_changed: bool,
    launch_manifest: Option<LaunchManifest>,
    java_task: Option<JoinHandle<MinepkgResult<PathBuf>>>,
}

impl Launcher {
    pub fn new(instance: Instance, cancel: CancellationToken, options: LaunchOptions) -> Self {
        let downloads = instance.global.download_manager(cancel);
        let java = instance.global.java_manager(downloads.clone());
        let resolver = instance.global.requirements_resolver();
        Self {
            instance,
            resolver,
            downloads,
            java,
            env: Environment::current(),
            options,
            force_update: false,
            state: LaunchState::Fresh,
            requirements_changed: false,
            launch_manifest: None,
            java_task: None,
        }
    }

    pub fn with_resolver(mut self, resolver: RequirementsResolver) -> Self {
        self.resolver = resolver;
        self
    }

    pub fn with_java(mut self, java: JavaManager) -> Self {
        self.java = java;
        self
    }

    pub fn with_downloads(mut self, downloads: DownloadManager) -> Self {
        self.downloads = downloads;
        self
    }

    pub fn with_environment(mut self, env: Environment) -> Self {
        self.env = env;
        self
    }

    /// Re-resolve requirements and dependencies even when the lockfile
    /// still satisfies the manifest.
    pub fn with_force_update(mut self, force: bool) -> Self {
        self.force_update = force;
        self
    }

    pub fn state(&self) -> LaunchState {
        self.state
    }

    pub fn launch_manifest(&self) -> Option<&LaunchManifest> {
        self.launch_manifest.as_ref()
    }

    // ── Steps ───────────────────────────────────────────

    /// Pin the platform. The lockfile is written right away.
    pub async fn check_requirements(&mut self) -> MinepkgResult<bool> {
        let changed = self
            .instance
            .update_requirements(&self.resolver, self.force_update)
            .await?;
        self.requirements_changed |= changed;
        self.state = LaunchState::RequirementsChecked;
        Ok(changed)
    }

    /// Load the merged launch manifest and start fetching java for it.
    pub async fn load_launch_manifest(&mut self) -> MinepkgResult<&LaunchManifest> {
        let manifest = self.instance.launch_manifest(&self.resolver).await?;

        let major = manifest
            .java_major()
            .unwrap_or_else(|| required_java_for_minecraft_version(manifest.minecraft_version()));
        self.start_java(major);

        Ok(self.launch_manifest.insert(manifest))
    }

    fn start_java(&mut self, major: u32) {
        if self.java_task.is_some() {
            return;
        }
        debug!("Fetching java {} in the background", major);
        let java = self.java.clone();
        self.java_task = Some(tokio::spawn(async move { java.ensure(major).await }));
    }

    /// Re-resolve dependencies when stale. A re-pinned platform always
    /// forces a full pass.
    pub async fn check_dependencies(&mut self) -> MinepkgResult<bool> {
        let force = self.force_update || self.requirements_changed;
        let changed = self.instance.update_dependencies(force).await?;
        self.state = LaunchState::DependenciesChecked;
        Ok(changed)
    }

    /// Download the main jar, libraries, assets (clients only) and
    /// dependency artifacts that are not cached yet.
    pub async fn fetch_missing(&mut self) -> MinepkgResult<()> {
        let manifest = match self.launch_manifest.take() {
            Some(manifest) => manifest,
            None => self.load_launch_manifest().await?.clone(),
        };
        let server = self.options.server;

        let mut items: Vec<Box<dyn Downloadable>> = Vec::new();
        items.extend(self.instance.main_jar_item(&manifest, server)?);
        items.extend(self.instance.missing_libraries(&manifest, &self.env)?);
        if !server {
            items.extend(self.instance.missing_assets(&manifest).await?);
        }
        items.extend(self.instance.missing_dependency_items()?);

        self.launch_manifest = Some(manifest);
        info!("{} files to download", items.len());
        self.downloads.run(items).await?;
        self.state = LaunchState::MinecraftAssetsReady;
        Ok(())
    }

    /// Lay out the game dir: local saves, mods, overwrites, and the eula
    /// for servers.
    pub async fn materialize(&self) -> MinepkgResult<()> {
        create_dir(&self.instance.minecraft_dir()).await?;
        self.instance.copy_local_saves().await?;
        self.instance.link_dependencies().await?;
        self.instance.copy_overwrites().await?;

        if self.options.server {
            if self.instance.global.settings.accept_minecraft_eula {
                let path = self.instance.minecraft_dir().join("eula.txt");
                tokio::fs::write(&path, EULA)
                    .await
                    .map_err(MinepkgError::io(&path))?;
            } else {
                warn!("The Minecraft EULA has not been accepted in the settings");
            }
        }
        Ok(())
    }

    /// Every step up to a launchable game dir.
    #[instrument(skip_all, fields(instance = %self.instance.manifest.package.name))]
    pub async fn prepare(&mut self) -> MinepkgResult<()> {
        self.check_requirements().await?;
        self.load_launch_manifest().await?;
        self.check_dependencies().await?;
        self.fetch_missing().await?;
        self.materialize().await?;
        info!("Instance is ready to launch");
        Ok(())
    }

    /// Wait for the background java fetch.
    pub async fn java_binary(&mut self) -> MinepkgResult<PathBuf> {
        if self.java_task.is_none() {
            let manifest = self
                .launch_manifest
                .as_ref()
                .ok_or_else(|| MinepkgError::Other("launch manifest not loaded".into()))?;
            let major = manifest
                .java_major()
                .unwrap_or_else(|| required_java_for_minecraft_version(manifest.minecraft_version()));
            self.start_java(major);
        }

        let Some(task) = self.java_task.take() else {
            return Err(MinepkgError::Other("java fetch did not start".into()));
        };
        task.await
            .map_err(|e| MinepkgError::Other(format!("Task join error: {}", e)))?
    }

    /// Java, arguments and working dir for the prepared game. Natives are
    /// extracted into a fresh temp dir.
    pub async fn build_command(&mut self) -> MinepkgResult<GameCommand> {
        let java = self.java_binary().await?;
        let manifest = self
            .launch_manifest
            .as_ref()
            .ok_or_else(|| MinepkgError::Other("launch manifest not loaded".into()))?;

        let global = &self.instance.global;
        let natives_dir =
            extract_natives(native_jars(manifest, &self.env, &global.libraries_dir())?).await?;
        let libraries = self.instance.library_paths(manifest, &self.env)?;
        let main_jar = self.instance.main_jar_path(manifest, self.options.server);

        let paths = LaunchPaths {
            game_dir: self.instance.minecraft_dir(),
            assets_dir: global.assets_dir(),
            libraries_dir: global.libraries_dir(),
            natives_dir: natives_dir.clone(),
            classpath: build_classpath(&libraries, &main_jar),
        };

        Ok(GameCommand {
            java,
            args: build_args(manifest, &self.env, &paths, &self.options),
            working_dir: self.instance.minecraft_dir(),
            natives_dir,
        })
    }

    /// Prepare if needed, then run the game until it exits.
    pub async fn launch(&mut self) -> MinepkgResult<LaunchOutcome> {
        if self.state != LaunchState::MinecraftAssetsReady {
            self.prepare().await?;
        }

        let command = self.build_command().await?;
        self.state = LaunchState::Running;
        let result = run(&command).await;
        cleanup_natives(&command.natives_dir).await;

        let outcome = result?;
        if let LaunchOutcome::Crashed(code) = outcome {
            warn!("Minecraft crashed (exit code {:?})", code);
        }
        self.state = LaunchState::Exited(outcome);
        Ok(outcome)
    }
}
