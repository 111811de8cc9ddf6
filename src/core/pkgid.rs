// ─── Package Identifier ───
// `[provider":"][platform"/"]name["@"version]`, plus the `none` and bare
// `https://` shorthands used in manifest dependency values.

use std::fmt;

use serde::{Deserialize, Serialize};

pub const DEFAULT_PROVIDER: &str = "minepkg";
pub const DUMMY_PROVIDER: &str = "dummy";
pub const HTTPS_PROVIDER: &str = "https";

/// Value that disables a dependency.
pub const DISABLED: &str = "none";

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PackageId {
    pub provider: String,
    pub platform: String,
    pub name: String,
    pub version: String,
}

impl PackageId {
    pub fn new(provider: &str, name: &str, version: &str) -> Self {
        Self {
            provider: provider.to_string(),
            platform: String::new(),
            name: name.to_string(),
            version: version.to_string(),
        }
    }

    /// Parse a dependency string. Never fails: anything that is not a
    /// recognisable `name@version` form is treated as a bare version.
    pub fn parse(raw: &str) -> Self {
        parse_id(raw, false)
    }

    /// Like [`PackageId::parse`], but a token without `@` is always read as
    /// the version, so `modrinth:AANobbMI` pins a version rather than naming
    /// a project.
    pub fn parse_like_version(raw: &str) -> Self {
        parse_id(raw, true)
    }

    /// `name@version`, the form the registry understands.
    pub fn legacy_id(&self) -> String {
        if self.version.is_empty() {
            self.name.clone()
        } else {
            format!("{}@{}", self.name, self.version)
        }
    }

    pub fn is_disabled(&self) -> bool {
        self.provider == DUMMY_PROVIDER
    }

    /// Empty, `*` and `latest` all mean "newest available".
    pub fn wants_latest(&self) -> bool {
        matches!(self.version.as_str(), "" | "*" | "latest")
    }
}

fn parse_id(raw: &str, like_version: bool) -> PackageId {
    let mut id = PackageId::new(DEFAULT_PROVIDER, "", "");

    if raw == DISABLED {
        id.provider = DUMMY_PROVIDER.to_string();
        id.version = DISABLED.to_string();
        return id;
    }

    if raw.starts_with("https://") {
        id.provider = HTTPS_PROVIDER.to_string();
        id.version = raw.to_string();
        return id;
    }

    let mut rest = raw;
    let mut has_prefix = false;

    if let Some((provider, tail)) = rest.split_once(':') {
        id.provider = provider.to_string();
        rest = tail;
        has_prefix = true;
    }

    if let Some((platform, tail)) = rest.split_once('/') {
        id.platform = platform.to_string();
        rest = tail;
        has_prefix = true;
    }

    match rest.split_once('@') {
        Some((name, version)) => {
            id.name = name.to_string();
            id.version = version.to_string();
        }
        None if like_version || !has_prefix => id.version = rest.to_string(),
        None => id.name = rest.to_string(),
    }

    id
}

impl fmt::Display for PackageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:", self.provider)?;
        if !self.platform.is_empty() {
            write!(f, "{}/", self.platform)?;
        }
        write!(f, "{}", self.legacy_id())
    }
}
