use std::collections::HashMap;
use std::path::{Path, PathBuf};

use reqwest::Client;
use serde::Deserialize;
use sha1::{Digest, Sha1};
use tracing::{debug, info, warn};

use crate::core::downloader::{write_atomic, Checksum, Downloadable, HttpItem};
use crate::core::error::{MinepkgError, MinepkgResult};
use crate::core::version::AssetIndexRef;

pub const RESOURCES_URL: &str = "https://resources.download.minecraft.net";

/// Top-level asset index JSON structure.
#[derive(Debug, Deserialize)]
pub struct AssetIndex {
    pub objects: HashMap<String, AssetObject>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AssetObject {
    pub hash: String,
    pub size: u64,
}

impl AssetObject {
    fn shard(&self) -> &str {
        self.hash.get(..2).unwrap_or("")
    }

    /// `{hash[0:2]}/{hash}`, relative to `assets/objects` and the
    /// resources host.
    pub fn unix_path(&self) -> String {
        format!("{}/{}", self.shard(), self.hash)
    }

    pub fn local_path(&self, objects_dir: &Path) -> PathBuf {
        objects_dir.join(self.shard()).join(&self.hash)
    }

    pub fn url(&self, base: &str) -> String {
        format!("{}/{}", base.trim_end_matches('/'), self.unix_path())
    }
}

impl AssetIndex {
    /// Read `assets/indexes/{id}.json`, downloading it on first use. A cached
    /// index that no longer parses is fetched again.
    pub async fn load_or_fetch(
        client: &Client,
        index: &AssetIndexRef,
        assets_dir: &Path,
    ) -> MinepkgResult<Self> {
        let index_path = assets_dir.join("indexes").join(format!("{}.json", index.id));

        if index_path.exists() {
            let raw = tokio::fs::read_to_string(&index_path)
                .await
                .map_err(MinepkgError::io(&index_path))?;
            match serde_json::from_str(&raw) {
                Ok(parsed) => {
                    debug!("Using cached asset index {:?}", index_path);
                    return Ok(parsed);
                }
                Err(e) => warn!("Cached asset index {:?} is unreadable: {}", index_path, e),
            }
        }

        let url = index.url.as_str();

        info!("Fetching asset index {}", index.id);
        let resp = client.get(url).send().await?;
        if !resp.status().is_success() {
            return Err(MinepkgError::DownloadFailed {
                url: url.to_string(),
                status: resp.status().as_u16(),
            });
        }
        let raw = resp.bytes().await?;

        if let Some(expected) = index.sha1.as_deref() {
            let actual = hex::encode(Sha1::digest(&raw));
            if !actual.eq_ignore_ascii_case(expected) {
                return Err(MinepkgError::CorruptedDownload {
                    path: index_path,
                    expected: expected.to_string(),
                    actual,
                });
            }
        }

        let parsed: AssetIndex = serde_json::from_slice(&raw)?;
        write_atomic(&index_path, &raw).await?;

        Ok(parsed)
    }

    /// Objects not yet present under `objects_dir`, one per hash.
    pub fn missing_objects(&self, objects_dir: &Path) -> Vec<&AssetObject> {
        let mut seen = std::collections::HashSet::new();
        self.objects
            .values()
            .filter(|obj| seen.insert(obj.hash.as_str()))
            .filter(|obj| !obj.local_path(objects_dir).exists())
            .collect()
    }

    /// Download items for every missing object, verified by SHA-1.
    pub fn missing_items(
        &self,
        client: &Client,
        objects_dir: &Path,
        base: &str,
    ) -> Vec<Box<dyn Downloadable>> {
        let missing = self.missing_objects(objects_dir);
        info!(
            "{} asset objects missing ({} referenced)",
            missing.len(),
            self.objects.len()
        );

        missing
            .into_iter()
            .map(|obj| {
                Box::new(
                    HttpItem::new(client.clone(), obj.url(base), obj.local_path(objects_dir))
                        .with_checksum(Some(Checksum::Sha1(obj.hash.clone()))),
                ) as Box<dyn Downloadable>
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::test_support::serve;
    use axum::{routing::get, Json, Router};
    use serde_json::json;

    fn index() -> AssetIndex {
        serde_json::from_value(json!({
            "objects": {
                "minecraft/sounds/a.ogg": { "hash": "bdf48ef6b5d0d23bbb02e17d04865216179f510a", "size": 3 },
                "minecraft/sounds/b.ogg": { "hash": "bdf48ef6b5d0d23bbb02e17d04865216179f510a", "size": 3 },
                "icons/icon_16x16.png": { "hash": "0123456789abcdef0123456789abcdef01234567", "size": 9 }
            }
        }))
        .unwrap()
    }

    #[test]
    fn objects_are_sharded_by_hash_prefix() {
        let obj = AssetObject {
            hash: "bdf48ef6b5d0d23bbb02e17d04865216179f510a".into(),
            size: 3,
        };
        assert_eq!(
            obj.local_path(Path::new("/assets/objects")),
            PathBuf::from("/assets/objects/bd/bdf48ef6b5d0d23bbb02e17d04865216179f510a")
        );
        assert_eq!(
            obj.url(RESOURCES_URL),
            "https://resources.download.minecraft.net/bd/bdf48ef6b5d0d23bbb02e17d04865216179f510a"
        );
    }

    #[test]
    fn present_and_duplicate_objects_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let present = dir.path().join("01").join("0123456789abcdef0123456789abcdef01234567");
        std::fs::create_dir_all(present.parent().unwrap()).unwrap();
        std::fs::write(&present, b"icon").unwrap();

        let index = index();
        let missing = index.missing_objects(dir.path());
        assert_eq!(missing.len(), 1);
        assert_eq!(missing[0].hash, "bdf48ef6b5d0d23bbb02e17d04865216179f510a");

        let items = index.missing_items(&Client::new(), dir.path(), RESOURCES_URL);
        assert_eq!(items.len(), 1);
    }

    #[tokio::test]
    async fn index_is_downloaded_once() {
        let base = serve(Router::new().route(
            "/indexes/1.16.json",
            get(|| async { Json(json!({ "objects": { "a": { "hash": "aa11", "size": 1 } } })) }),
        ))
        .await;
        let assets = tempfile::tempdir().unwrap();
        let reference = AssetIndexRef {
            id: "1.16".into(),
            sha1: None,
            url: format!("{base}/indexes/1.16.json"),
            total_size: None,
        };

        let index = AssetIndex::load_or_fetch(&Client::new(), &reference, assets.path())
            .await
            .unwrap();
        assert_eq!(index.objects.len(), 1);
        assert!(assets.path().join("indexes/1.16.json").exists());

        let offline = AssetIndexRef {
            url: "http://127.0.0.1:9/indexes/1.16.json".into(),
            ..reference
        };
        let cached = AssetIndex::load_or_fetch(&Client::new(), &offline, assets.path())
            .await
            .unwrap();
        assert_eq!(cached.objects["a"].hash, "aa11");
    }

    const INDEX_BODY: &str = r#"{"objects":{"a":{"hash":"aa11","size":1}}}"#;

    fn index_ref(base: &str, sha1: Option<String>) -> AssetIndexRef {
        AssetIndexRef {
            id: "1.16".into(),
            sha1,
            url: format!("{base}/indexes/1.16.json"),
            total_size: None,
        }
    }

    #[tokio::test]
    async fn truncated_cache_is_fetched_again() {
        let base = serve(Router::new().route("/indexes/1.16.json", get(|| async { INDEX_BODY })))
            .await;
        let assets = tempfile::tempdir().unwrap();
        let cached = assets.path().join("indexes/1.16.json");
        std::fs::create_dir_all(cached.parent().unwrap()).unwrap();
        std::fs::write(&cached, r#"{"objects":{"#).unwrap();

        let index = AssetIndex::load_or_fetch(&Client::new(), &index_ref(&base, None), assets.path())
            .await
            .unwrap();
        assert_eq!(index.objects["a"].hash, "aa11");
        assert_eq!(std::fs::read_to_string(&cached).unwrap(), INDEX_BODY);
    }

    #[tokio::test]
    async fn index_with_wrong_sha1_is_rejected() {
        let base = serve(Router::new().route("/indexes/1.16.json", get(|| async { INDEX_BODY })))
            .await;
        let assets = tempfile::tempdir().unwrap();
        let good = hex::encode(Sha1::digest(INDEX_BODY.as_bytes()));

        let err = AssetIndex::load_or_fetch(
            &Client::new(),
            &index_ref(&base, Some("0".repeat(40))),
            assets.path(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, MinepkgError::CorruptedDownload { .. }));
        assert!(!assets.path().join("indexes/1.16.json").exists());

        let index = AssetIndex::load_or_fetch(&Client::new(), &index_ref(&base, Some(good)), assets.path())
            .await
            .unwrap();
        assert_eq!(index.objects.len(), 1);
    }

    #[test]
    fn short_or_non_ascii_hash_does_not_panic() {
        let obj = AssetObject {
            hash: "aé".into(),
            size: 0,
        };
        assert_eq!(obj.unix_path(), "/aé");
    }
}
