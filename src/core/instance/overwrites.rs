use std::path::{Path, PathBuf};

use tracing::{debug, info, instrument};

use crate::core::error::{MinepkgError, MinepkgResult};
use crate::core::manifest::{LOCKFILE_FILE, MANIFEST_FILE};

use super::Instance;

impl Instance {
    /// Copy worlds from `saves/` into the game dir. Worlds already present
    /// in the game dir are never touched.
    #[instrument(skip_all)]
    pub async fn copy_local_saves(&self) -> MinepkgResult<usize> {
        let from = self.local_saves_dir();
        let to = self.minecraft_dir().join("saves");
        run_blocking(move || copy_new_worlds(&from, &to)).await
    }

    /// Copy everything in `overwrites/` over the game dir.
    #[instrument(skip_all)]
    pub async fn copy_overwrites(&self) -> MinepkgResult<usize> {
        let from = self.overwrites_dir();
        let to = self.minecraft_dir();
        run_blocking(move || copy_overwrite_entries(&from, &to)).await
    }
}

async fn run_blocking<F>(job: F) -> MinepkgResult<usize>
where
    F: FnOnce() -> MinepkgResult<usize> + Send + 'static,
{
    tokio::task::spawn_blocking(job)
        .await
        .map_err(|e| MinepkgError::Other(format!("copy task failed: {e}")))?
}

fn copy_new_worlds(from: &Path, to: &Path) -> MinepkgResult<usize> {
    if !from.is_dir() {
        return Ok(0);
    }

    let mut copied = 0;
    for entry in std::fs::read_dir(from).map_err(MinepkgError::io(from))? {
        let entry = entry.map_err(MinepkgError::io(from))?;
        let world = entry.path();
        if !world.is_dir() {
            continue;
        }
        let target = to.join(entry.file_name());
        if target.exists() {
            debug!("World {:?} already exists, skipping", entry.file_name());
            continue;
        }
        copy_tree(&world, &target)?;
        copied += 1;
    }

    if copied > 0 {
        info!("Copied {} local worlds", copied);
    }
    Ok(copied)
}

/// Entries in the overwrites dir that never reach the game dir.
fn is_skipped(name: &str) -> bool {
    let lower = name.to_ascii_lowercase();
    name.starts_with('.')
        || lower.starts_with("excluded")
        || lower.starts_with("readme")
        || matches!(name, "minecraft" | "saves" | MANIFEST_FILE | LOCKFILE_FILE)
}

fn copy_overwrite_entries(from: &Path, to: &Path) -> MinepkgResult<usize> {
    if !from.is_dir() {
        return Ok(0);
    }

    let mut copied = 0;
    for entry in std::fs::read_dir(from).map_err(MinepkgError::io(from))? {
        let entry = entry.map_err(MinepkgError::io(from))?;
        let name = entry.file_name();
        if is_skipped(&name.to_string_lossy()) {
            continue;
        }
        let source = entry.path();
        let target = to.join(&name);
        if source.is_dir() {
            copied += copy_tree(&source, &target)?;
        } else {
            copy_file(&source, &target)?;
            copied += 1;
        }
    }

    debug!("Copied {} overwrite files", copied);
    Ok(copied)
}

/// Recursive copy, replacing existing files. Returns the number of files.
fn copy_tree(from: &Path, to: &Path) -> MinepkgResult<usize> {
    let mut copied = 0;
    let mut stack: Vec<(PathBuf, PathBuf)> = vec![(from.to_path_buf(), to.to_path_buf())];

    while let Some((source_dir, target_dir)) = stack.pop() {
        std::fs::create_dir_all(&target_dir).map_err(MinepkgError::io(&target_dir))?;
        for entry in std::fs::read_dir(&source_dir).map_err(MinepkgError::io(&source_dir))? {
            let entry = entry.map_err(MinepkgError::io(&source_dir))?;
            let source = entry.path();
            let target = target_dir.join(entry.file_name());
            if source.is_dir() {
                stack.push((source, target));
            } else {
                copy_file(&source, &target)?;
                copied += 1;
            }
        }
    }
    Ok(copied)
}

fn copy_file(from: &Path, to: &Path) -> MinepkgResult<()> {
    if let Some(parent) = to.parent() {
        std::fs::create_dir_all(parent).map_err(MinepkgError::io(parent))?;
    }
    std::fs::copy(from, to).map_err(MinepkgError::io(to))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::instance::model::tests::global;
    use crate::core::manifest::{Manifest, PackageType};

    fn write(path: &Path, contents: &str) {
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, contents).unwrap();
    }

    async fn instance(root: &Path) -> Instance {
        Instance::create(
            global(root),
            root.join("pack"),
            Manifest::new("pack", PackageType::Modpack),
        )
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn local_saves_never_replace_worlds() {
        let dir = tempfile::tempdir().unwrap();
        let instance = instance(dir.path()).await;
        write(&instance.local_saves_dir().join("hub/level.dat"), "template");
        write(&instance.local_saves_dir().join("arena/level.dat"), "template");
        write(&instance.minecraft_dir().join("saves/hub/level.dat"), "played");

        assert_eq!(instance.copy_local_saves().await.unwrap(), 1);
        let saves = instance.minecraft_dir().join("saves");
        assert_eq!(std::fs::read_to_string(saves.join("hub/level.dat")).unwrap(), "played");
        assert_eq!(std::fs::read_to_string(saves.join("arena/level.dat")).unwrap(), "template");
    }

    #[tokio::test]
    async fn overwrites_replace_files_and_skip_reserved_names() {
        let dir = tempfile::tempdir().unwrap();
        let instance = instance(dir.path()).await;
        let overwrites = instance.overwrites_dir();
        write(&overwrites.join("config/sodium.json"), "new");
        write(&overwrites.join("options.txt"), "fov:90");
        write(&overwrites.join("README.md"), "docs");
        write(&overwrites.join("excluded-notes/a.txt"), "x");
        write(&overwrites.join(".git/HEAD"), "ref");
        write(&overwrites.join(MANIFEST_FILE), "");
        write(&instance.minecraft_dir().join("config/sodium.json"), "old");

        assert_eq!(instance.copy_overwrites().await.unwrap(), 2);
        let game = instance.minecraft_dir();
        assert_eq!(std::fs::read_to_string(game.join("config/sodium.json")).unwrap(), "new");
        assert!(game.join("options.txt").exists());
        assert!(!game.join("README.md").exists());
        assert!(!game.join("excluded-notes").exists());
        assert!(!game.join(".git").exists());
        assert!(!game.join(MANIFEST_FILE).exists());
    }

    #[tokio::test]
    async fn missing_dirs_copy_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let instance = instance(dir.path()).await;
        assert_eq!(instance.copy_local_saves().await.unwrap(), 0);
        assert_eq!(instance.copy_overwrites().await.unwrap(), 0);
    }
}
