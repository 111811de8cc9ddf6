use std::path::{Path, PathBuf};

use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::Client;
use sha1::Sha1;
use sha2::{Digest, Sha256, Sha512};
use tokio::io::AsyncWriteExt;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::core::error::{MinepkgError, MinepkgResult};

use super::manager::{AttemptError, Downloadable};

/// Expected content hash, hex encoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Checksum {
    Sha1(String),
    Sha256(String),
    Sha512(String),
}

impl Checksum {
    fn expected(&self) -> &str {
        match self {
            Checksum::Sha1(h) | Checksum::Sha256(h) | Checksum::Sha512(h) => h,
        }
    }

    fn hasher(&self) -> Hasher {
        match self {
            Checksum::Sha1(_) => Hasher::Sha1(Sha1::new()),
            Checksum::Sha256(_) => Hasher::Sha256(Sha256::new()),
            Checksum::Sha512(_) => Hasher::Sha512(Sha512::new()),
        }
    }
}

enum Hasher {
    Sha1(Sha1),
    Sha256(Sha256),
    Sha512(Sha512),
}

impl Hasher {
    fn update(&mut self, bytes: &[u8]) {
        match self {
            Hasher::Sha1(h) => h.update(bytes),
            Hasher::Sha256(h) => h.update(bytes),
            Hasher::Sha512(h) => h.update(bytes),
        }
    }

    fn finish(self) -> String {
        match self {
            Hasher::Sha1(h) => hex::encode(h.finalize()),
            Hasher::Sha256(h) => hex::encode(h.finalize()),
            Hasher::Sha512(h) => hex::encode(h.finalize()),
        }
    }
}

/// A single URL streamed to `target`.
///
/// The body is written to a sibling temp file and renamed into place only
/// after the checksum (if any) matched, so concurrent readers never see a
/// partial artifact.
#[derive(Debug, Clone)]
pub struct HttpItem {
    client: Client,
    pub url: String,
    pub target: PathBuf,
    pub checksum: Option<Checksum>,
}

impl HttpItem {
    pub fn new(client: Client, url: impl Into<String>, target: impl Into<PathBuf>) -> Self {
        Self {
            client,
            url: url.into(),
            target: target.into(),
            checksum: None,
        }
    }

    pub fn with_checksum(mut self, checksum: Option<Checksum>) -> Self {
        self.checksum = checksum;
        self
    }

    async fn fetch_to(&self, tmp: &Path, cancel: &CancellationToken) -> Result<(), AttemptError> {
        let response = tokio::select! {
            _ = cancel.cancelled() => return Err(AttemptError::Fatal(MinepkgError::Cancelled)),
            response = self.client.get(&self.url).send() => {
                response.map_err(|e| AttemptError::Transient(e.into()))?
            }
        };

        let status = response.status();
        if !status.is_success() {
            let err = MinepkgError::DownloadFailed {
                url: self.url.clone(),
                status: status.as_u16(),
            };
            // 4xx other than timeouts and rate limits will not fix themselves.
            return Err(
                if status.is_client_error() && status.as_u16() != 408 && status.as_u16() != 429 {
                    AttemptError::Fatal(err)
                } else {
                    AttemptError::Transient(err)
                },
            );
        }

        let mut file = tokio::fs::File::create(tmp)
            .await
            .map_err(|e| AttemptError::Fatal(MinepkgError::io(tmp)(e)))?;
        let mut hasher = self.checksum.as_ref().map(Checksum::hasher);
        let mut body = response.bytes_stream();

        loop {
            let chunk = tokio::select! {
                _ = cancel.cancelled() => return Err(AttemptError::Fatal(MinepkgError::Cancelled)),
                chunk = body.next() => chunk,
            };
            let Some(chunk) = chunk else { break };
            let chunk = chunk.map_err(|e| AttemptError::Transient(e.into()))?;
            if let Some(hasher) = hasher.as_mut() {
                hasher.update(&chunk);
            }
            file.write_all(&chunk)
                .await
                .map_err(|e| AttemptError::Transient(MinepkgError::io(tmp)(e)))?;
        }
        file.flush()
            .await
            .map_err(|e| AttemptError::Transient(MinepkgError::io(tmp)(e)))?;
        drop(file);

        if let (Some(checksum), Some(hasher)) = (&self.checksum, hasher) {
            let actual = hasher.finish();
            if !actual.eq_ignore_ascii_case(checksum.expected()) {
                return Err(AttemptError::Transient(MinepkgError::CorruptedDownload {
                    path: self.target.clone(),
                    expected: checksum.expected().to_string(),
                    actual,
                }));
            }
        }

        Ok(())
    }
}

/// Sibling `.part-<uuid>` file that `target` is written through.
pub fn part_path(target: &Path) -> PathBuf {
    target.with_extension(format!("part-{}", uuid::Uuid::new_v4().simple()))
}

/// Write `contents` next to `path` and rename it into place, so an
/// interrupted write never leaves a truncated file behind.
pub async fn write_atomic(path: &Path, contents: impl AsRef<[u8]>) -> MinepkgResult<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(MinepkgError::io(parent))?;
    }

    let tmp = part_path(path);
    if let Err(e) = tokio::fs::write(&tmp, contents).await {
        let _ = tokio::fs::remove_file(&tmp).await;
        return Err(MinepkgError::io(&tmp)(e));
    }
    if let Err(e) = tokio::fs::rename(&tmp, path).await {
        let _ = tokio::fs::remove_file(&tmp).await;
        return Err(MinepkgError::io(path)(e));
    }
    Ok(())
}

#[async_trait]
impl Downloadable for HttpItem {
    fn label(&self) -> String {
        self.target
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| self.url.clone())
    }

    async fn download(&self, cancel: &CancellationToken) -> Result<(), AttemptError> {
        if let Some(parent) = self.target.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| AttemptError::Fatal(MinepkgError::io(parent)(e)))?;
        }

        let tmp = part_path(&self.target);

        let result = self.fetch_to(&tmp, cancel).await;
        if result.is_err() {
            let _ = tokio::fs::remove_file(&tmp).await;
            return result;
        }

        tokio::fs::rename(&tmp, &self.target)
            .await
            .map_err(|e| AttemptError::Transient(MinepkgError::io(&self.target)(e)))?;

        debug!("Downloaded: {} -> {:?}", self.url, self.target);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::downloader::manager::DownloadManager;
    use crate::core::test_support::{serve, sha256_hex};
    use axum::routing::get;
    use axum::Router;
    use std::time::Duration;

    const BODY: &[u8] = b"fabric-api jar bytes";

    async fn fixture() -> String {
        serve(Router::new().route("/mod.jar", get(|| async { BODY }))).await
    }

    fn manager() -> DownloadManager {
        DownloadManager::default()
            .with_max_attempts(2)
            .with_backoff_unit(Duration::ZERO)
    }

    #[tokio::test]
    async fn verified_download_lands_at_target() {
        let base = fixture().await;
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("cache/fabric-api/1.0.0.jar");

        let item = HttpItem::new(Client::new(), format!("{base}/mod.jar"), &target)
            .with_checksum(Some(Checksum::Sha256(sha256_hex(BODY))));
        manager().run(vec![Box::new(item)]).await.unwrap();

        assert_eq!(std::fs::read(&target).unwrap(), BODY);
        let leftovers: Vec<_> = std::fs::read_dir(target.parent().unwrap())
            .unwrap()
            .collect();
        assert_eq!(leftovers.len(), 1);
    }

    #[tokio::test]
    async fn checksum_mismatch_leaves_no_file() {
        let base = fixture().await;
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("mod.jar");

        let item = HttpItem::new(Client::new(), format!("{base}/mod.jar"), &target)
            .with_checksum(Some(Checksum::Sha256("00".repeat(32))));
        let err = manager().run(vec![Box::new(item)]).await.unwrap_err();

        assert!(matches!(err, MinepkgError::CorruptedDownload { .. }));
        assert!(!target.exists());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn not_found_is_fatal() {
        let base = fixture().await;
        let dir = tempfile::tempdir().unwrap();
        let item = HttpItem::new(
            Client::new(),
            format!("{base}/missing.jar"),
            dir.path().join("missing.jar"),
        );

        let err = item
            .download(&CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            AttemptError::Fatal(MinepkgError::DownloadFailed { status: 404, .. })
        ));
    }

    #[tokio::test]
    async fn atomic_write_replaces_file_without_leftovers() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("indexes").join("1.16.json");

        write_atomic(&path, b"{}").await.unwrap();
        write_atomic(&path, b"{\"objects\":{}}").await.unwrap();

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "{\"objects\":{}}");
        assert_eq!(std::fs::read_dir(path.parent().unwrap()).unwrap().count(), 1);
    }
}
