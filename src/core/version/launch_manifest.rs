// ─── Launch Manifest ───
// The versioned launcher JSON (vanilla or loader profile). Loader profiles
// inherit from a vanilla manifest and are merged onto it.

use std::collections::HashMap;
use std::path::Path;

use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::core::downloader::write_atomic;
use crate::core::error::{MinepkgError, MinepkgResult};
use crate::core::maven::{MavenArtifact, MOJANG_LIBRARIES};

use super::rules::{all_apply, Environment, Rule};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LaunchManifest {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub inherits_from: Option<String>,
    #[serde(default)]
    pub jar: Option<String>,
    #[serde(default, rename = "type")]
    pub release_type: Option<String>,
    #[serde(default)]
    pub main_class: String,
    /// Space separated game arguments, used before 1.13.
    #[serde(default)]
    pub minecraft_arguments: Option<String>,
    #[serde(default)]
    pub arguments: Option<Arguments>,
    #[serde(default)]
    pub downloads: Option<Downloads>,
    #[serde(default)]
    pub libraries: Vec<Library>,
    #[serde(default)]
    pub java_version: Option<JavaVersion>,
    #[serde(default)]
    pub assets: Option<String>,
    #[serde(default)]
    pub asset_index: Option<AssetIndexRef>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JavaVersion {
    #[serde(default)]
    pub component: Option<String>,
    pub major_version: u32,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetIndexRef {
    pub id: String,
    #[serde(default)]
    pub sha1: Option<String>,
    pub url: String,
    #[serde(default)]
    pub total_size: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Downloads {
    #[serde(default)]
    pub client: Option<Artifact>,
    #[serde(default)]
    pub server: Option<Artifact>,
}

/// Something downloadable: the client/server jar or a library file.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Artifact {
    /// Relative to the libraries dir; absent for client/server jars.
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub sha1: Option<String>,
    #[serde(default)]
    pub size: Option<u64>,
    #[serde(default)]
    pub url: String,
}

// ─── Arguments ───

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Arguments {
    #[serde(default)]
    pub game: Vec<Argument>,
    #[serde(default)]
    pub jvm: Vec<Argument>,
}

/// Either a bare string or `{ "rules": [...], "value": "x" | ["x", "y"] }`.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum Argument {
    Plain(String),
    Conditional {
        #[serde(default)]
        rules: Vec<Rule>,
        value: ArgumentValue,
    },
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ArgumentValue {
    One(String),
    Many(Vec<String>),
}

impl Argument {
    fn values_for(&self, env: &Environment) -> Vec<String> {
        match self {
            Argument::Plain(value) => vec![value.clone()],
            Argument::Conditional { rules, .. } if !all_apply(rules, env) => Vec::new(),
            Argument::Conditional { value, .. } => match value {
                ArgumentValue::One(v) => vec![v.clone()],
                ArgumentValue::Many(vs) => vs.clone(),
            },
        }
    }
}

// ─── Libraries ───

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Library {
    pub name: String,
    #[serde(default)]
    pub downloads: LibraryDownloads,
    /// Maven repository base for loader libraries without explicit downloads.
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub rules: Vec<Rule>,
    /// OS name → classifier key, e.g. `"linux": "natives-linux"`.
    #[serde(default)]
    pub natives: HashMap<String, String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LibraryDownloads {
    #[serde(default)]
    pub artifact: Option<Artifact>,
    #[serde(default)]
    pub classifiers: HashMap<String, Artifact>,
}

impl Library {
    /// Classifier key for `env`, `${arch}` substituted.
    pub fn native_classifier(&self, env: &Environment) -> Option<String> {
        self.natives
            .get(&env.os)
            .map(|c| c.replace("${arch}", env.bitness()))
    }

    pub fn is_native(&self) -> bool {
        !self.natives.is_empty()
    }

    fn native_artifact(&self, env: &Environment) -> Option<&Artifact> {
        self.native_classifier(env)
            .and_then(|c| self.downloads.classifiers.get(&c))
    }

    /// Path relative to the libraries dir, `/`-separated.
    pub fn filepath(&self, env: &Environment) -> MinepkgResult<String> {
        if let Some(path) = self.native_artifact(env).and_then(|a| a.path.clone()) {
            return Ok(path);
        }
        if let Some(path) = self.downloads.artifact.as_ref().and_then(|a| a.path.clone()) {
            if !path.is_empty() {
                return Ok(path);
            }
        }
        Ok(MavenArtifact::parse(&self.name)?.path())
    }

    pub fn download_url(&self, env: &Environment) -> MinepkgResult<String> {
        if let Some(native) = self.native_artifact(env).filter(|a| !a.url.is_empty()) {
            return Ok(native.url.clone());
        }
        if let Some(artifact) = self.downloads.artifact.as_ref().filter(|a| !a.url.is_empty()) {
            return Ok(artifact.url.clone());
        }
        let base = self
            .url
            .as_deref()
            .filter(|u| !u.is_empty())
            .unwrap_or(MOJANG_LIBRARIES);
        let base = if base.ends_with('/') {
            base.to_string()
        } else {
            format!("{base}/")
        };
        Ok(format!("{}{}", base, self.filepath(env)?))
    }

    pub fn sha1(&self, env: &Environment) -> Option<String> {
        self.native_artifact(env)
            .or(self.downloads.artifact.as_ref())
            .and_then(|a| a.sha1.clone())
    }
}

// ─── Manifest ───

impl LaunchManifest {
    /// Version of the underlying Minecraft jar.
    pub fn minecraft_version(&self) -> &str {
        self.jar
            .as_deref()
            .filter(|v| !v.is_empty())
            .or(self.inherits_from.as_deref().filter(|v| !v.is_empty()))
            .unwrap_or(&self.id)
    }

    pub fn jar_name(&self) -> String {
        format!("{}.jar", self.minecraft_version())
    }

    pub fn java_major(&self) -> Option<u32> {
        self.java_version.as_ref().map(|j| j.major_version)
    }

    /// Libraries that apply to `env`. Native-only libraries need a
    /// classifier for the OS.
    pub fn required_libraries(&self, env: &Environment) -> Vec<&Library> {
        self.libraries
            .iter()
            .filter(|lib| all_apply(&lib.rules, env))
            .filter(|lib| !lib.is_native() || lib.natives.contains_key(&env.os))
            .collect()
    }

    pub fn jvm_args(&self, env: &Environment) -> Vec<String> {
        self.arguments
            .iter()
            .flat_map(|a| &a.jvm)
            .flat_map(|arg| arg.values_for(env))
            .collect()
    }

    pub fn game_args(&self, env: &Environment) -> Vec<String> {
        if let Some(legacy) = self.minecraft_arguments.as_deref().filter(|a| !a.is_empty()) {
            return legacy.split_whitespace().map(str::to_string).collect();
        }
        self.arguments
            .iter()
            .flat_map(|a| &a.game)
            .flat_map(|arg| arg.values_for(env))
            .collect()
    }

    /// JVM args (or the fallback set), main class, then game args. Still
    /// contains `${...}` placeholders.
    pub fn full_args(&self, env: &Environment) -> Vec<String> {
        let mut args = self.jvm_args(env);
        if args.is_empty() {
            args = fallback_jvm_args(&env.os);
        }
        args.push(self.main_class.clone());
        args.extend(self.game_args(env));
        args
    }

    /// Merge `child` onto `self`: non-empty child fields win, libraries and
    /// arguments are appended.
    pub fn merge(&mut self, child: LaunchManifest) {
        self.libraries.extend(child.libraries);

        if !child.id.is_empty() {
            self.id = child.id;
        }
        if !child.main_class.is_empty() {
            self.main_class = child.main_class;
        }
        if child.release_type.is_some() {
            self.release_type = child.release_type;
        }
        if child.jar.is_some() {
            self.jar = child.jar;
        }
        if child.assets.is_some() {
            self.assets = child.assets;
        }
        if child.asset_index.is_some() {
            self.asset_index = child.asset_index;
        }
        if child.java_version.is_some() {
            self.java_version = child.java_version;
        }
        if child.downloads.is_some() {
            self.downloads = child.downloads;
        }
        if child.minecraft_arguments.as_deref().is_some_and(|a| !a.is_empty()) {
            self.minecraft_arguments = child.minecraft_arguments;
        }
        if let Some(child_args) = child.arguments {
            let args = self.arguments.get_or_insert_with(Arguments::default);
            args.game.extend(child_args.game);
            args.jvm.extend(child_args.jvm);
        }
        // The merged manifest keeps pointing at the vanilla jar.
        if self.inherits_from.is_none() {
            self.inherits_from = child.inherits_from;
        }
    }

    pub async fn load(path: &Path) -> MinepkgResult<Self> {
        debug!("Using cached launch manifest {:?}", path);
        let raw = tokio::fs::read_to_string(path)
            .await
            .map_err(MinepkgError::io(path))?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Read `path`, or download `url` into it first. A cached copy that no
    /// longer parses is downloaded again.
    pub async fn load_or_fetch(client: &Client, url: &str, path: &Path) -> MinepkgResult<Self> {
        if path.exists() {
            match Self::load(path).await {
                Err(MinepkgError::Json(e)) => {
                    warn!("Cached launch manifest {:?} is unreadable: {}", path, e)
                }
                result => return result,
            }
        }

        info!("Fetching launch manifest {}", url);
        let response = client.get(url).send().await?;
        if !response.status().is_success() {
            return Err(MinepkgError::DownloadFailed {
                url: url.to_string(),
                status: response.status().as_u16(),
            });
        }
        let raw = response.text().await?;
        let manifest: LaunchManifest = serde_json::from_str(&raw)?;
        write_atomic(path, &raw).await?;
        Ok(manifest)
    }
}

/// Used when a manifest defines no JVM arguments (1.12 and older).
pub fn fallback_jvm_args(os: &str) -> Vec<String> {
    let mut args = vec![
        "-Xss1M".to_string(),
        "-Djava.library.path=${natives_directory}".to_string(),
        "-Dminecraft.launcher.brand=${launcher_name}".to_string(),
        "-Dminecraft.launcher.version=${launcher_version}".to_string(),
    ];
    match os {
        "windows" => args.push(
            "-XX:HeapDumpPath=MojangTricksIntelDriversForPerformance_javaw.exe_minecraft.exe.heapdump"
                .to_string(),
        ),
        "osx" => args.push("-XstartOnFirstThread".to_string()),
        _ => {}
    }
    args.push("-cp".to_string());
    args.push("${classpath}".to_string());
    args
}
