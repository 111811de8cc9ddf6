use std::path::PathBuf;
use thiserror::Error;

use crate::core::provider::ProviderError;

/// Central error type for the package manager and launch pipeline.
/// Every module returns `Result<T, MinepkgError>`.
#[derive(Debug, Error)]
pub enum MinepkgError {
    // ── IO ──────────────────────────────────────────────
    #[error("IO error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    // ── Network ─────────────────────────────────────────
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Download failed for {url}: HTTP {status}")]
    DownloadFailed { url: String, status: u16 },

    #[error("Operation cancelled")]
    Cancelled,

    // ── Integrity ───────────────────────────────────────
    #[error("Corrupted download {path:?}: expected hash {expected}, got {actual}")]
    CorruptedDownload {
        path: PathBuf,
        expected: String,
        actual: String,
    },

    // ── Serialization ───────────────────────────────────
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlDe(#[from] toml::de::Error),

    #[error("TOML write error: {0}")]
    TomlSer(#[from] toml::ser::Error),

    // ── Providers ───────────────────────────────────────
    #[error("Provider \"{0}\" not found")]
    ProviderNotFound(String),

    #[error("Provider \"{provider}\" does not support {operation}")]
    ProviderUnsupported {
        provider: String,
        operation: &'static str,
    },

    #[error("{provider} could not resolve {id}: {source}")]
    Resolve {
        provider: String,
        id: String,
        #[source]
        source: ProviderError,
    },

    #[error("No provider can convert URL {0}")]
    UrlNotConvertible(String),

    // ── Requirements ────────────────────────────────────
    #[error("Invalid version requirement \"{0}\"")]
    InvalidRequirement(String),

    #[error("No Minecraft release matches \"{0}\"")]
    NoMinecraftRelease(String),

    #[error("No fabric mapping matches Minecraft \"{0}\"")]
    NoFabricMapping(String),

    #[error("No fabric loader matches \"{0}\"")]
    NoFabricLoader(String),

    #[error("Platform {0} is not supported for this operation")]
    UnsupportedPlatform(String),

    // ── Instance ────────────────────────────────────────
    #[error("No manifest found at {0:?}")]
    ManifestNotFound(PathBuf),

    #[error("Requirements have not been resolved yet")]
    RequirementsNotLocked,

    #[error("Invalid Maven coordinate: {0}")]
    InvalidMavenCoordinate(String),

    // ── Launch ──────────────────────────────────────────
    #[error("Could not start Minecraft: {0}")]
    LaunchFailed(String),

    // ── Java ────────────────────────────────────────────
    #[error("No Java runtime available for major version {0}")]
    JavaNotFound(u32),

    #[error("Java execution failed: {0}")]
    JavaExecution(String),

    // ── Archive ─────────────────────────────────────────
    #[error("Zip extraction error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("{0}: illegal file path in archive")]
    IllegalArchivePath(String),

    // ── Generic ─────────────────────────────────────────
    #[error("{0}")]
    Other(String),
}

/// Convenience alias used throughout the crate.
pub type MinepkgResult<T> = Result<T, MinepkgError>;

impl From<std::io::Error> for MinepkgError {
    fn from(source: std::io::Error) -> Self {
        MinepkgError::Io {
            path: PathBuf::new(),
            source,
        }
    }
}

impl MinepkgError {
    /// Attach a path to an io error.
    pub fn io(path: impl Into<PathBuf>) -> impl FnOnce(std::io::Error) -> Self {
        let path = path.into();
        move |source| MinepkgError::Io { path, source }
    }
}
