use thiserror::Error;

/// Broad classes a caller can branch on without matching every variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Project, version or platform does not exist.
    NotFound,
    /// The package exists but nothing satisfies the requested constraints.
    Unsatisfiable,
    /// Network, status or decoding failure.
    Transport,
    /// The request cannot be expressed for this provider.
    Unsupported,
}

#[derive(Debug, Error)]
pub enum ProviderError {
    // ── Not found ───────────────────────────────────────
    #[error("project \"{0}\" does not exist")]
    ProjectNotFound(String),

    #[error("version \"{0}\" does not exist")]
    VersionNotFound(String),

    #[error("\"{name}\" has no releases for platform {platform}")]
    NoReleasesForPlatform { name: String, platform: String },

    #[error("\"{0}\" was not found")]
    NotFound(String),

    // ── Unsatisfiable ───────────────────────────────────
    #[error("\"{name}\" has no release for Minecraft {minecraft}")]
    NoReleaseForMinecraft { name: String, minecraft: String },

    #[error("\"{name}\" has no release matching {version}")]
    NoReleaseForVersion { name: String, version: String },

    #[error("\"{name}\" has no release satisfying all requirements")]
    NoReleaseWithConstraints { name: String },

    // ── Transport ───────────────────────────────────────
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("unexpected status code {status} from {url}")]
    UnexpectedStatus { url: String, status: u16 },

    #[error(
        "the server of {0} sets neither an \"ETag\" nor a \"Last-Modified\" header, one is required"
    )]
    MissingCacheKey(String),

    #[error("version {0} has no files")]
    NoFiles(String),

    // ── Unsupported ─────────────────────────────────────
    #[error("unsupported version \"{0}\", expected '*', 'latest', a version id, sha1 or sha512")]
    UnsupportedVersionToken(String),

    #[error("refusing to resolve non https url {0}")]
    NotHttps(String),

    #[error("{0} is not a supported URL")]
    InvalidUrl(String),
}

impl ProviderError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ProviderError::ProjectNotFound(_)
            | ProviderError::VersionNotFound(_)
            | ProviderError::NoReleasesForPlatform { .. }
            | ProviderError::NotFound(_) => ErrorKind::NotFound,
            ProviderError::NoReleaseForMinecraft { .. }
            | ProviderError::NoReleaseForVersion { .. }
            | ProviderError::NoReleaseWithConstraints { .. } => ErrorKind::Unsatisfiable,
            ProviderError::Http(_)
            | ProviderError::UnexpectedStatus { .. }
            | ProviderError::MissingCacheKey(_)
            | ProviderError::NoFiles(_) => ErrorKind::Transport,
            ProviderError::UnsupportedVersionToken(_)
            | ProviderError::NotHttps(_)
            | ProviderError::InvalidUrl(_) => ErrorKind::Unsupported,
        }
    }
}
