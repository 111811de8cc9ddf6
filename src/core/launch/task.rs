// ─── Launch Task ───
// Turns a merged launch manifest into a java invocation and runs it.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use tracing::{debug, info, warn};

use crate::core::error::{MinepkgError, MinepkgResult};
use crate::core::version::{Environment, LaunchManifest};

use super::classpath::{classpath_separator, safe_path_str};

pub const LAUNCHER_NAME: &str = "minepkg";
pub const LAUNCHER_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Exit code the dedicated server returns after a regular `stop`.
const SERVER_STOP_CODE: i32 = 130;

/// Player identity and extra flags for one run. Authentication happens
/// elsewhere; these are passed through as given.
#[derive(Debug, Clone)]
pub struct LaunchOptions {
    pub server: bool,
    pub player_name: String,
    pub player_uuid: String,
    pub access_token: String,
    pub user_type: String,
    pub extra_jvm_args: Vec<String>,
}

impl Default for LaunchOptions {
    fn default() -> Self {
        Self {
            server: false,
            player_name: "Player".into(),
            player_uuid: uuid::Uuid::nil().simple().to_string(),
            access_token: "null".into(),
            user_type: "legacy".into(),
            extra_jvm_args: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LaunchOutcome {
    Clean,
    /// Any other exit. `None` when the process was killed by a signal.
    Crashed(Option<i32>),
}

impl LaunchOutcome {
    pub fn from_exit_code(code: Option<i32>) -> Self {
        match code {
            Some(0) | Some(SERVER_STOP_CODE) => LaunchOutcome::Clean,
            other => LaunchOutcome::Crashed(other),
        }
    }
}

/// Directories and the joined classpath the placeholders point at.
#[derive(Debug, Clone)]
pub struct LaunchPaths {
    pub game_dir: PathBuf,
    pub assets_dir: PathBuf,
    pub libraries_dir: PathBuf,
    pub natives_dir: PathBuf,
    pub classpath: String,
}

#[derive(Debug, Clone)]
pub struct GameCommand {
    pub java: PathBuf,
    pub args: Vec<String>,
    pub working_dir: PathBuf,
    pub natives_dir: PathBuf,
}

/// Full argument list after `java`.
///
/// Clients get the manifest's JVM and game arguments with every known
/// placeholder filled in. Servers get a plain classpath launch of the
/// server main class with `nogui`.
pub fn build_args(
    manifest: &LaunchManifest,
    env: &Environment,
    paths: &LaunchPaths,
    options: &LaunchOptions,
) -> Vec<String> {
    let mut args = options.extra_jvm_args.clone();

    if options.server {
        args.push("-cp".into());
        args.push(paths.classpath.clone());
        args.push(server_main_class(&manifest.main_class));
        args.push("nogui".into());
        return args;
    }

    let values = placeholder_values(manifest, paths, options);
    args.extend(
        manifest
            .full_args(env)
            .iter()
            .map(|arg| replace_placeholders(arg, &values)),
    );
    args
}

pub fn server_main_class(main_class: &str) -> String {
    main_class.replace("Client", "Server")
}

fn placeholder_values(
    manifest: &LaunchManifest,
    paths: &LaunchPaths,
    options: &LaunchOptions,
) -> HashMap<&'static str, String> {
    let assets_root = safe_path_str(&paths.assets_dir);
    let index_name = manifest
        .assets
        .clone()
        .or_else(|| manifest.asset_index.as_ref().map(|i| i.id.clone()))
        .unwrap_or_default();

    HashMap::from([
        ("natives_directory", safe_path_str(&paths.natives_dir)),
        ("library_directory", safe_path_str(&paths.libraries_dir)),
        ("classpath", paths.classpath.clone()),
        ("classpath_separator", classpath_separator().to_string()),
        ("launcher_name", LAUNCHER_NAME.to_string()),
        ("launcher_version", LAUNCHER_VERSION.to_string()),
        ("game_directory", safe_path_str(&paths.game_dir)),
        ("game_assets", assets_root.clone()),
        ("assets_root", assets_root),
        ("assets_index_name", index_name),
        ("version_name", manifest.id.clone()),
        (
            "version_type",
            manifest.release_type.clone().unwrap_or_else(|| "release".into()),
        ),
        ("auth_player_name", options.player_name.clone()),
        ("auth_uuid", options.player_uuid.clone()),
        ("auth_access_token", options.access_token.clone()),
        ("auth_session", options.access_token.clone()),
        ("user_type", options.user_type.clone()),
        ("user_properties", "{}".to_string()),
        ("clientid", String::new()),
        ("auth_xuid", String::new()),
    ])
}

/// Replace every `${name}` with its value. Unknown placeholders stay.
pub fn replace_placeholders(arg: &str, values: &HashMap<&'static str, String>) -> String {
    let mut out = String::with_capacity(arg.len());
    let mut rest = arg;

    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let Some(end) = after.find('}') else {
            out.push_str(&rest[start..]);
            return out;
        };
        let key = &after[..end];
        match values.get(key) {
            Some(value) => out.push_str(value),
            None => {
                warn!("Unknown launch placeholder ${{{}}}", key);
                out.push_str(&rest[start..start + 3 + end]);
            }
        }
        rest = &after[end + 1..];
    }
    out.push_str(rest);
    out
}

/// Run the game and wait for it. Output is inherited from the parent.
pub async fn run(command: &GameCommand) -> MinepkgResult<LaunchOutcome> {
    let mut cmd = tokio::process::Command::new(&command.java);
    cmd.args(&command.args)
        .current_dir(&command.working_dir)
        .stdin(Stdio::inherit())
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit());
    configure_native_library_env(&mut cmd, &command.natives_dir);

    info!("Launching Minecraft with Java: {:?}", command.java);
    debug!("Command (copy/paste): {}", format_command_for_logs(command));

    let status = cmd
        .status()
        .await
        .map_err(|e| MinepkgError::LaunchFailed(e.to_string()))?;

    let outcome = LaunchOutcome::from_exit_code(status.code());
    match outcome {
        LaunchOutcome::Clean => info!("Minecraft was stopped normally ({})", status),
        LaunchOutcome::Crashed(_) => warn!("Minecraft exited with {}", status),
    }
    Ok(outcome)
}

fn configure_native_library_env(cmd: &mut tokio::process::Command, natives_dir: &Path) {
    let native_path = safe_path_str(natives_dir);

    if cfg!(target_os = "windows") {
        cmd.env("PATH", append_env_path("PATH", &native_path));
    } else if cfg!(target_os = "linux") {
        cmd.env("LD_LIBRARY_PATH", append_env_path("LD_LIBRARY_PATH", &native_path));
    } else if cfg!(target_os = "macos") {
        cmd.env("DYLD_LIBRARY_PATH", append_env_path("DYLD_LIBRARY_PATH", &native_path));
    }
}

fn append_env_path(var_name: &str, value: &str) -> String {
    let separator = classpath_separator();
    match std::env::var(var_name) {
        Ok(existing) if !existing.trim().is_empty() => {
            format!("{}{}{}", value, separator, existing)
        }
        _ => value.to_string(),
    }
}

fn format_command_for_logs(command: &GameCommand) -> String {
    std::iter::once(command.java.to_string_lossy().to_string())
        .chain(command.args.iter().cloned())
        .map(|arg| shell_escape(&arg))
        .collect::<Vec<_>>()
        .join(" ")
}

fn shell_escape(raw: &str) -> String {
    if raw.is_empty() {
        return "\"\"".to_string();
    }

    if raw.chars().all(|ch| {
        ch.is_ascii_alphanumeric() || matches!(ch, '-' | '_' | '.' | '/' | ':' | '\\' | '=')
    }) {
        return raw.to_string();
    }

    format!("\"{}\"", raw.replace('"', "\\\""))
}
