// ─── Version Manifest ───
// Mojang's list of every Minecraft version, newest first.

use reqwest::Client;
use serde::Deserialize;
use tracing::info;

use crate::core::constraint::{parse_version, Constraint};
use crate::core::error::{MinepkgError, MinepkgResult};

pub const VERSION_MANIFEST_URL: &str =
    "https://launchermeta.mojang.com/mc/game/version_manifest.json";

#[derive(Debug, Clone, Deserialize)]
pub struct VersionManifest {
    pub latest: LatestVersions,
    pub versions: Vec<VersionEntry>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LatestVersions {
    pub release: String,
    pub snapshot: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionEntry {
    pub id: String,
    #[serde(rename = "type")]
    pub version_type: String,
    pub url: String,
    #[serde(default)]
    pub release_time: Option<String>,
}

impl VersionManifest {
    pub async fn fetch(client: &Client, url: &str) -> MinepkgResult<Self> {
        info!("Fetching Minecraft version manifest...");
        let response = client.get(url).send().await?;
        if !response.status().is_success() {
            return Err(MinepkgError::DownloadFailed {
                url: url.to_string(),
                status: response.status().as_u16(),
            });
        }
        let manifest: VersionManifest = response.json().await?;
        info!("Loaded {} versions from manifest", manifest.versions.len());
        Ok(manifest)
    }

    pub fn find_version(&self, id: &str) -> Option<&VersionEntry> {
        self.versions.iter().find(|v| v.id == id)
    }

    /// `latest`/`*` pick the latest release; anything else picks the newest
    /// entry whose id satisfies the constraint.
    pub fn newest_matching(&self, requirement: &str) -> MinepkgResult<&VersionEntry> {
        let no_match = || MinepkgError::NoMinecraftRelease(requirement.to_string());

        if matches!(requirement.trim(), "" | "*" | "latest") {
            return self.find_version(&self.latest.release).ok_or_else(no_match);
        }

        let constraint = Constraint::parse(requirement)
            .ok_or_else(|| MinepkgError::InvalidRequirement(requirement.to_string()))?;

        self.versions
            .iter()
            .find(|entry| parse_version(&entry.id).is_some_and(|v| constraint.matches(&v)))
            .ok_or_else(no_match)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn manifest() -> VersionManifest {
        serde_json::from_value(json!({
            "latest": { "release": "1.17.1", "snapshot": "21w38a" },
            "versions": [
                { "id": "21w38a", "type": "snapshot", "url": "https://example.com/21w38a.json" },
                { "id": "1.17.1", "type": "release", "url": "https://example.com/1.17.1.json" },
                { "id": "1.17", "type": "release", "url": "https://example.com/1.17.json" },
                { "id": "1.16.5", "type": "release", "url": "https://example.com/1.16.5.json", "releaseTime": "2021-01-14T16:05:32+00:00" },
                { "id": "1.16.4", "type": "release", "url": "https://example.com/1.16.4.json" }
            ]
        }))
        .unwrap()
    }

    #[test]
    fn latest_is_latest_release() {
        assert_eq!(manifest().newest_matching("latest").unwrap().id, "1.17.1");
        assert_eq!(manifest().newest_matching("*").unwrap().id, "1.17.1");
    }

    #[test]
    fn newest_satisfying_entry_wins() {
        let m = manifest();
        assert_eq!(m.newest_matching("~1.16.0").unwrap().id, "1.16.5");
        assert_eq!(m.newest_matching("1.17").unwrap().id, "1.17.1");
        assert_eq!(m.newest_matching("1.16.4").unwrap().id, "1.16.4");
    }

    #[test]
    fn unsatisfiable_and_invalid() {
        let m = manifest();
        assert!(matches!(
            m.newest_matching("^2.0.0"),
            Err(MinepkgError::NoMinecraftRelease(_))
        ));
        assert!(matches!(
            m.newest_matching("what"),
            Err(MinepkgError::InvalidRequirement(_))
        ));
    }
}
