use std::path::{Component, Path, PathBuf};

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};
use uuid::Uuid;

use crate::core::constraint::parse_version;
use crate::core::downloader::{Checksum, Downloadable, DownloadManager, HttpItem};
use crate::core::error::{MinepkgError, MinepkgResult};

pub const ADOPTIUM_API_BASE: &str = "https://api.adoptium.net/v3/assets/latest";
const ASSET_MARKER: &str = "asset.json";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdoptiumRelease {
    pub binary: AdoptiumBinary,
    pub version: AdoptiumVersion,
    #[serde(default)]
    pub release_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdoptiumBinary {
    pub package: AdoptiumPackage,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdoptiumPackage {
    pub checksum: String,
    pub link: String,
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdoptiumVersion {
    pub openjdk_version: String,
}

/// Java feature release needed by a Minecraft version.
pub fn required_java_for_minecraft_version(minecraft_version: &str) -> u32 {
    if let Some(version) = parse_version(minecraft_version) {
        let (minor, patch) = (version.minor, version.patch);
        return if version.major > 1 || minor >= 21 || (minor == 20 && patch >= 5) {
            21
        } else if minor >= 17 {
            17
        } else {
            8
        };
    }

    // Snapshots (`21w03a`) carry their year up front.
    let lower = minecraft_version.to_ascii_lowercase();
    let year = lower
        .split_once('w')
        .and_then(|(year, _)| year.parse::<u32>().ok());
    match year {
        Some(year) if year >= 24 => 21,
        Some(year) if year >= 21 => 17,
        Some(_) => 8,
        None => 17,
    }
}

fn platform_os() -> &'static str {
    match std::env::consts::OS {
        "windows" => "windows",
        "macos" => "mac",
        _ => "linux",
    }
}

fn platform_arch() -> &'static str {
    match std::env::consts::ARCH {
        "x86_64" => "x64",
        "aarch64" => "aarch64",
        "x86" => "x32",
        "arm" => "arm",
        other => other,
    }
}

fn java_exe() -> &'static str {
    if cfg!(windows) {
        "java.exe"
    } else {
        "java"
    }
}

/// Installs Adoptium JREs under `{java_dir}/{major}-jre` and hands out the
/// `java` binary to launch with.
#[derive(Clone)]
pub struct JavaManager {
    client: Client,
    java_dir: PathBuf,
    api_base: String,
    use_system_java: bool,
    downloads: DownloadManager,
}

impl JavaManager {
    pub fn new(client: Client, java_dir: impl Into<PathBuf>) -> Self {
        Self {
            client,
            java_dir: java_dir.into(),
            api_base: ADOPTIUM_API_BASE.to_string(),
            use_system_java: false,
            downloads: DownloadManager::default(),
        }
    }

    pub fn with_api_base(mut self, api_base: &str) -> Self {
        self.api_base = api_base.trim_end_matches('/').to_string();
        self
    }

    pub fn with_system_java(mut self, use_system_java: bool) -> Self {
        self.use_system_java = use_system_java;
        self
    }

    pub fn with_downloads(mut self, downloads: DownloadManager) -> Self {
        self.downloads = downloads;
        self
    }

    pub fn runtime_dir(&self, major: u32) -> PathBuf {
        self.java_dir.join(format!("{major}-jre"))
    }

    /// The release recorded when `major` was installed.
    pub async fn installed_release(&self, major: u32) -> Option<AdoptiumRelease> {
        let marker = self.runtime_dir(major).join(ASSET_MARKER);
        let raw = tokio::fs::read_to_string(&marker).await.ok()?;
        serde_json::from_str(&raw).ok()
    }

    /// Path of a usable `java` for `major`, installing it first if needed.
    #[instrument(skip(self))]
    pub async fn ensure(&self, major: u32) -> MinepkgResult<PathBuf> {
        if self.use_system_java {
            debug!("Using system java");
            return Ok(PathBuf::from(java_exe()));
        }

        let root = self.runtime_dir(major);
        if self.installed_release(major).await.is_some() {
            let java_bin = locate_java_binary(&root);
            if java_bin.exists() {
                debug!("Java {} already installed at {:?}", major, java_bin);
                return Ok(java_bin);
            }
        }

        let release = self.fetch_release(major).await?;
        self.install(major, &release).await?;

        let java_bin = locate_java_binary(&root);
        if !java_bin.exists() {
            return Err(MinepkgError::JavaNotFound(major));
        }
        Ok(java_bin)
    }

    async fn fetch_release(&self, major: u32) -> MinepkgResult<AdoptiumRelease> {
        let url = format!(
            "{}/{}/hotspot?architecture={}&image_type=jre&os={}",
            self.api_base,
            major,
            platform_arch(),
            platform_os()
        );
        debug!("Querying {}", url);

        let resp = self.client.get(&url).send().await?;
        if !resp.status().is_success() {
            return Err(MinepkgError::DownloadFailed {
                url,
                status: resp.status().as_u16(),
            });
        }

        let releases: Vec<AdoptiumRelease> = resp.json().await?;
        releases
            .into_iter()
            .next()
            .ok_or(MinepkgError::JavaNotFound(major))
    }

    async fn install(&self, major: u32, release: &AdoptiumRelease) -> MinepkgResult<()> {
        let package = &release.binary.package;
        let archive_name = if package.name.is_empty() {
            package.link.rsplit('/').next().unwrap_or("jre.zip")
        } else {
            package.name.as_str()
        };

        tokio::fs::create_dir_all(&self.java_dir)
            .await
            .map_err(MinepkgError::io(&self.java_dir))?;

        let staging_id = Uuid::new_v4().simple().to_string();
        let archive = self.java_dir.join(format!(".{staging_id}-{archive_name}"));
        let staging = self.java_dir.join(format!(".{staging_id}"));

        info!(
            "Downloading Java {} ({})",
            major, release.version.openjdk_version
        );
        let item = HttpItem::new(self.client.clone(), &package.link, &archive)
            .with_checksum(Some(Checksum::Sha256(package.checksum.clone())));
        self.downloads
            .run(vec![Box::new(item) as Box<dyn Downloadable>])
            .await?;

        let result = self
            .unpack_into_place(&archive, &staging, major, release)
            .await;
        let _ = tokio::fs::remove_file(&archive).await;
        if result.is_err() {
            let _ = tokio::fs::remove_dir_all(&staging).await;
        }
        result
    }

    async fn unpack_into_place(
        &self,
        archive: &Path,
        staging: &Path,
        major: u32,
        release: &AdoptiumRelease,
    ) -> MinepkgResult<()> {
        let (archive_owned, staging_owned) = (archive.to_path_buf(), staging.to_path_buf());
        tokio::task::spawn_blocking(move || extract_archive(&archive_owned, &staging_owned))
            .await
            .map_err(|e| MinepkgError::Other(format!("Java extraction task failed: {e}")))??;

        make_executable(&locate_java_binary(staging))?;

        let marker = staging.join(ASSET_MARKER);
        tokio::fs::write(&marker, serde_json::to_vec_pretty(release)?)
            .await
            .map_err(MinepkgError::io(&marker))?;

        let root = self.runtime_dir(major);
        if root.exists() {
            tokio::fs::remove_dir_all(&root)
                .await
                .map_err(MinepkgError::io(&root))?;
        }
        tokio::fs::rename(staging, &root)
            .await
            .map_err(MinepkgError::io(&root))?;

        info!("Java {} installed at {:?}", major, root);
        Ok(())
    }
}

fn locate_java_binary(runtime_root: &Path) -> PathBuf {
    let primary = runtime_root.join("bin").join(java_exe());
    if primary.exists() {
        return primary;
    }

    let mac_layout = runtime_root
        .join("Contents")
        .join("Home")
        .join("bin")
        .join(java_exe());
    if mac_layout.exists() {
        return mac_layout;
    }

    primary
}

fn make_executable(java_bin: &Path) -> MinepkgResult<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        if java_bin.exists() {
            let mut perms = std::fs::metadata(java_bin)
                .map_err(MinepkgError::io(java_bin))?
                .permissions();
            perms.set_mode(0o755);
            std::fs::set_permissions(java_bin, perms).map_err(MinepkgError::io(java_bin))?;
        }
    }
    #[cfg(not(unix))]
    let _ = java_bin;
    Ok(())
}

// ─── Extraction ───

/// Unpack a `.zip` or `.tar.gz` JRE into `dest`, dropping the archive's
/// top-level directory.
pub fn extract_archive(archive: &Path, dest: &Path) -> MinepkgResult<()> {
    std::fs::create_dir_all(dest).map_err(MinepkgError::io(dest))?;

    let name = archive.to_string_lossy();
    if name.ends_with(".zip") {
        extract_zip(archive, dest)
    } else {
        extract_tar_gz(archive, dest)
    }
}

/// Archive entry path without its first component. `None` for the root
/// itself; an error for anything escaping `dest`.
fn stripped_path(path: &Path) -> MinepkgResult<Option<PathBuf>> {
    let mut rel = PathBuf::new();
    for component in path.components().skip(1) {
        match component {
            Component::Normal(part) => rel.push(part),
            Component::CurDir => {}
            _ => {
                return Err(MinepkgError::IllegalArchivePath(
                    path.to_string_lossy().to_string(),
                ))
            }
        }
    }
    Ok((!rel.as_os_str().is_empty()).then_some(rel))
}

fn extract_zip(archive: &Path, dest: &Path) -> MinepkgResult<()> {
    let file = std::fs::File::open(archive).map_err(MinepkgError::io(archive))?;
    let mut zip = zip::ZipArchive::new(file)?;

    for index in 0..zip.len() {
        let mut entry = zip.by_index(index)?;
        let enclosed = entry
            .enclosed_name()
            .ok_or_else(|| MinepkgError::IllegalArchivePath(entry.name().to_string()))?;
        let Some(rel) = stripped_path(&enclosed)? else {
            continue;
        };

        let out_path = dest.join(rel);
        if entry.is_dir() {
            std::fs::create_dir_all(&out_path).map_err(MinepkgError::io(&out_path))?;
            continue;
        }
        if let Some(parent) = out_path.parent() {
            std::fs::create_dir_all(parent).map_err(MinepkgError::io(parent))?;
        }
        let mut out = std::fs::File::create(&out_path).map_err(MinepkgError::io(&out_path))?;
        std::io::copy(&mut entry, &mut out).map_err(MinepkgError::io(&out_path))?;

        #[cfg(unix)]
        if let Some(mode) = entry.unix_mode() {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&out_path, std::fs::Permissions::from_mode(mode))
                .map_err(MinepkgError::io(&out_path))?;
        }
    }
    Ok(())
}

fn extract_tar_gz(archive: &Path, dest: &Path) -> MinepkgResult<()> {
    let file = std::fs::File::open(archive).map_err(MinepkgError::io(archive))?;
    let mut tar = tar::Archive::new(flate2::read::GzDecoder::new(file));

    for entry in tar.entries().map_err(MinepkgError::io(archive))? {
        let mut entry = entry.map_err(MinepkgError::io(archive))?;
        let path = entry.path().map_err(MinepkgError::io(archive))?.into_owned();
        let Some(rel) = stripped_path(&path)? else {
            continue;
        };

        let out_path = dest.join(rel);
        if let Some(parent) = out_path.parent() {
            std::fs::create_dir_all(parent).map_err(MinepkgError::io(parent))?;
        }
        entry.unpack(&out_path).map_err(MinepkgError::io(&out_path))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::test_support::sha256_hex;
    use axum::extract::State;
    use axum::routing::get;
    use axum::{Json, Router};
    use serde_json::json;
    use std::io::Write;

    fn tar_gz(entries: &[(&str, &str)]) -> Vec<u8> {
        let encoder = flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
        let mut builder = tar::Builder::new(encoder);
        for (path, contents) in entries {
            let mut header = tar::Header::new_gnu();
            header.set_path(path).unwrap();
            header.set_size(contents.len() as u64);
            header.set_mode(0o755);
            header.set_cksum();
            builder.append(&header, contents.as_bytes()).unwrap();
        }
        builder.into_inner().unwrap().finish().unwrap()
    }

    #[test]
    fn java_version_follows_minecraft() {
        assert_eq!(required_java_for_minecraft_version("1.12.2"), 8);
        assert_eq!(required_java_for_minecraft_version("1.16.5"), 8);
        assert_eq!(required_java_for_minecraft_version("1.17"), 17);
        assert_eq!(required_java_for_minecraft_version("1.20.4"), 17);
        assert_eq!(required_java_for_minecraft_version("1.20.5"), 21);
        assert_eq!(required_java_for_minecraft_version("1.21.1"), 21);
        assert_eq!(required_java_for_minecraft_version("21w03a"), 17);
        assert_eq!(required_java_for_minecraft_version("24w14a"), 21);
    }

    #[test]
    fn tar_gz_is_extracted_without_top_level_dir() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("jre.tar.gz");
        std::fs::write(
            &archive,
            tar_gz(&[
                ("jdk-17.0.2+8-jre/bin/java", "#!/bin/sh\n"),
                ("jdk-17.0.2+8-jre/release", "JAVA_VERSION=17"),
            ]),
        )
        .unwrap();

        let dest = dir.path().join("out");
        extract_archive(&archive, &dest).unwrap();
        assert!(dest.join("bin").join("java").exists());
        assert!(dest.join("release").exists());
    }

    #[test]
    fn zip_is_extracted_without_top_level_dir() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("jre.zip");
        let mut writer = zip::ZipWriter::new(std::fs::File::create(&archive).unwrap());
        writer
            .start_file("jdk-17-jre/bin/java.exe", zip::write::SimpleFileOptions::default())
            .unwrap();
        writer.write_all(b"MZ").unwrap();
        writer.finish().unwrap();

        let dest = dir.path().join("out");
        extract_archive(&archive, &dest).unwrap();
        assert_eq!(std::fs::read(dest.join("bin/java.exe")).unwrap(), b"MZ");
    }

    #[test]
    fn escaping_entries_are_rejected() {
        assert!(matches!(
            stripped_path(Path::new("jre/../../etc/passwd")),
            Err(MinepkgError::IllegalArchivePath(_))
        ));
        assert_eq!(stripped_path(Path::new("jre")).unwrap(), None);
    }

    #[tokio::test]
    async fn installs_once_and_reuses_marker() {
        let java_entry = format!("jdk-17-jre/bin/{}", java_exe());
        let archive = tar_gz(&[(java_entry.as_str(), "#!/bin/sh\n")]);
        let checksum = sha256_hex(&archive);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());
        let router = Router::new()
            .route(
                "/v3/assets/latest/:major/hotspot",
                get(|State((base, checksum)): State<(String, String)>| async move {
                    Json(json!([{
                        "binary": { "package": {
                            "checksum": checksum,
                            "link": format!("{base}/files/jre.tar.gz"),
                            "name": "jre.tar.gz"
                        } },
                        "version": { "openjdk_version": "17.0.2+8" },
                        "release_name": "jdk-17.0.2+8"
                    }]))
                }),
            )
            .route(
                "/files/jre.tar.gz",
                get(move || {
                    let body = archive.clone();
                    async move { body }
                }),
            )
            .with_state((base.clone(), checksum));
        tokio::spawn(async move { axum::serve(listener, router).await.unwrap() });

        let data = tempfile::tempdir().unwrap();
        let manager = JavaManager::new(Client::new(), data.path().join("java"))
            .with_api_base(&format!("{base}/v3/assets/latest"));

        let java = manager.ensure(17).await.unwrap();
        assert_eq!(java, data.path().join("java/17-jre/bin").join(java_exe()));
        let release = manager.installed_release(17).await.unwrap();
        assert_eq!(release.version.openjdk_version, "17.0.2+8");

        let offline = JavaManager::new(Client::new(), data.path().join("java"))
            .with_api_base("http://127.0.0.1:9/v3/assets/latest");
        assert_eq!(offline.ensure(17).await.unwrap(), java);
    }

    #[tokio::test]
    async fn system_java_skips_install() {
        let data = tempfile::tempdir().unwrap();
        let manager = JavaManager::new(Client::new(), data.path()).with_system_java(true);
        assert_eq!(manager.ensure(21).await.unwrap(), PathBuf::from(java_exe()));
    }
}
