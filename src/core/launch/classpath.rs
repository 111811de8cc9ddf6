// ─── Classpath Builder ───
// Joins library jars into the `-cp` value and unpacks native libraries for a
// single game run.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::core::error::{MinepkgError, MinepkgResult};
use crate::core::version::{Environment, LaunchManifest};

pub fn classpath_separator() -> &'static str {
    if cfg!(target_os = "windows") {
        ";"
    } else {
        ":"
    }
}

/// Libraries in order, then the main jar. Duplicate paths are kept once.
pub fn build_classpath(libraries: &[PathBuf], main_jar: &Path) -> String {
    let mut seen = HashSet::new();
    libraries
        .iter()
        .map(PathBuf::as_path)
        .chain(std::iter::once(main_jar))
        .filter(|path| seen.insert(path.to_path_buf()))
        .map(safe_path_str)
        .collect::<Vec<_>>()
        .join(classpath_separator())
}

/// Native-classifier jars `env` needs, relative to `libraries_dir`.
pub fn native_jars(
    manifest: &LaunchManifest,
    env: &Environment,
    libraries_dir: &Path,
) -> MinepkgResult<Vec<PathBuf>> {
    manifest
        .required_libraries(env)
        .into_iter()
        .filter(|lib| lib.native_classifier(env).is_some())
        .map(|lib| -> MinepkgResult<PathBuf> { Ok(libraries_dir.join(lib.filepath(env)?)) })
        .collect()
}

/// Unpack every jar in `jars` into a fresh per-launch directory under the
/// system temp dir. `META-INF` is skipped.
pub async fn extract_natives(jars: Vec<PathBuf>) -> MinepkgResult<PathBuf> {
    let natives_dir = std::env::temp_dir().join(format!("minepkg-natives-{}", uuid::Uuid::new_v4()));
    let dest = natives_dir.clone();

    tokio::task::spawn_blocking(move || -> MinepkgResult<()> {
        std::fs::create_dir_all(&dest).map_err(MinepkgError::io(&dest))?;
        for jar in &jars {
            if !jar.exists() {
                warn!("Native jar {:?} is missing", jar);
                continue;
            }
            extract_jar(jar, &dest)?;
        }
        Ok(())
    })
    .await
    .map_err(|e| MinepkgError::Other(format!("Task join error: {}", e)))??;

    Ok(natives_dir)
}

fn extract_jar(jar: &Path, dest: &Path) -> MinepkgResult<()> {
    let file = std::fs::File::open(jar).map_err(MinepkgError::io(jar))?;
    let mut archive = zip::ZipArchive::new(file)?;

    for i in 0..archive.len() {
        let mut entry = archive.by_index(i)?;
        let Some(rel) = entry.enclosed_name() else {
            continue;
        };
        if rel.starts_with("META-INF") || entry.is_dir() {
            continue;
        }

        let out_path = dest.join(&rel);
        if let Some(parent) = out_path.parent() {
            std::fs::create_dir_all(parent).map_err(MinepkgError::io(parent))?;
        }
        let mut out = std::fs::File::create(&out_path).map_err(MinepkgError::io(&out_path))?;
        std::io::copy(&mut entry, &mut out).map_err(MinepkgError::io(&out_path))?;
        debug!("Extracted native: {:?}", rel);
    }
    Ok(())
}

/// Remove the natives directory once the game exited.
pub async fn cleanup_natives(natives_dir: &Path) {
    if natives_dir.exists() {
        if let Err(e) = tokio::fs::remove_dir_all(natives_dir).await {
            warn!("Could not remove {:?}: {}", natives_dir, e);
        }
    }
}

/// Path as a launch argument. Canonicalized when it exists.
pub fn safe_path_str(path: &Path) -> String {
    let resolved = std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
    let text = resolved.to_string_lossy().to_string();

    #[cfg(target_os = "windows")]
    {
        // Java rejects `\\?\` extended-length paths on the classpath.
        if let Some(stripped) = text.strip_prefix(r"\\?\") {
            return stripped.to_string();
        }
    }

    text
}
