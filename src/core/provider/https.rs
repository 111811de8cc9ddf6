use std::path::PathBuf;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use reqwest::header::{HeaderName, ETAG, LAST_MODIFIED};
use reqwest::Client;
use tracing::debug;

use crate::core::downloader::Downloadable;
use crate::core::error::MinepkgResult;
use crate::core::manifest::{DependencyLock, DependencyType};
use crate::core::pkgid::HTTPS_PROVIDER;

use super::{http_fetch_item, Provider, ProviderError, Resolution, ResolutionRequest};

/// Plain `https://` URLs. The server's `ETag` (or `Last-Modified`) stands in
/// for a version so the lockfile stays stable while the file does.
pub struct HttpsProvider {
    client: Client,
}

impl HttpsProvider {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Resolve without the `https://` guard; fixtures run over plain http.
    async fn resolve_url(&self, url: &str, name: &str) -> Result<Resolution, ProviderError> {
        let response = self.client.head(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ProviderError::UnexpectedStatus {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let header = |name: HeaderName| {
            response
                .headers()
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        };
        let etag = header(ETAG);
        let last_modified = header(LAST_MODIFIED);
        let cache_key = cache_key_from_headers(etag.as_deref(), last_modified.as_deref())
            .ok_or_else(|| ProviderError::MissingCacheKey(url.to_string()))?;

        debug!("{} resolved to cache key {}", url, cache_key);
        Ok(Resolution::leaf(DependencyLock {
            name: name.to_string(),
            version: cache_key,
            provider: HTTPS_PROVIDER.to_string(),
            dependency_type: DependencyType::Mod,
            url: Some(url.to_string()),
            ..Default::default()
        }))
    }
}

/// The unquoted ETag, or base64 of Last-Modified when there is no ETag.
pub fn cache_key_from_headers(etag: Option<&str>, last_modified: Option<&str>) -> Option<String> {
    if let Some(etag) = etag.filter(|e| !e.is_empty()) {
        let key = etag.trim_start_matches('"').trim_end_matches('"');
        return Some(key.to_string()).filter(|k| !k.is_empty());
    }
    last_modified
        .filter(|lm| !lm.is_empty())
        .map(|lm| STANDARD.encode(lm))
}

#[async_trait]
impl Provider for HttpsProvider {
    fn name(&self) -> &'static str {
        HTTPS_PROVIDER
    }

    async fn resolve(&self, request: &ResolutionRequest) -> Result<Resolution, ProviderError> {
        let url = &request.dependency.version;
        if !url.starts_with("https://") {
            return Err(ProviderError::NotHttps(url.clone()));
        }
        self.resolve_url(url, &request.dependency.name).await
    }

    fn fetch_item(
        &self,
        lock: &DependencyLock,
        target: PathBuf,
    ) -> MinepkgResult<Box<dyn Downloadable>> {
        http_fetch_item(&self.client, HTTPS_PROVIDER, lock, target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::manifest::{PlatformLock, VanillaLock};
    use crate::core::pkgid::PackageId;
    use crate::core::test_support::serve;
    use axum::http::header;
    use axum::routing::get;
    use axum::Router;

    #[test]
    fn etag_quotes_are_stripped() {
        assert_eq!(
            cache_key_from_headers(Some("\"abc123\""), None).as_deref(),
            Some("abc123")
        );
        assert_eq!(
            cache_key_from_headers(Some("W/\"abc\""), Some("ignored")).as_deref(),
            Some("W/\"abc")
        );
    }

    #[test]
    fn last_modified_fallback_is_base64() {
        let key = cache_key_from_headers(None, Some("Wed, 21 Oct 2015 07:28:00 GMT")).unwrap();
        assert_eq!(STANDARD.decode(key).unwrap(), b"Wed, 21 Oct 2015 07:28:00 GMT");
        assert!(cache_key_from_headers(None, None).is_none());
    }

    async fn fixture() -> String {
        serve(
            Router::new()
                .route(
                    "/tagged.jar",
                    get(|| async { ([(header::ETAG, "\"abc123\"")], "jar") }),
                )
                .route("/untagged.jar", get(|| async { "jar" })),
        )
        .await
    }

    fn request(url: &str) -> ResolutionRequest {
        let mut id = PackageId::parse(url);
        id.name = "direct".into();
        ResolutionRequest::new(
            id,
            PlatformLock::Vanilla(VanillaLock {
                minecraft: "1.20.4".into(),
            }),
        )
    }

    #[tokio::test]
    async fn etag_becomes_lock_version() {
        let base = fixture().await;
        let url = format!("{base}/tagged.jar");
        let provider = HttpsProvider::new(Client::new());

        let resolution = provider.resolve_url(&url, "direct").await.unwrap();
        assert_eq!(resolution.lock.provider, "https");
        assert_eq!(resolution.lock.version, "abc123");
        assert_eq!(resolution.lock.url.as_deref(), Some(url.as_str()));
        assert!(resolution.dependencies.is_empty());
    }

    #[tokio::test]
    async fn missing_headers_are_a_hard_error() {
        let base = fixture().await;
        let provider = HttpsProvider::new(Client::new());

        let err = provider
            .resolve_url(&format!("{base}/untagged.jar"), "direct")
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::MissingCacheKey(_)));
    }

    #[tokio::test]
    async fn plain_http_is_refused() {
        let provider = HttpsProvider::new(Client::new());
        let mut req = request("https://example.invalid/x.jar");
        req.dependency.version = "http://example.invalid/x.jar".into();
        let err = provider.resolve(&req).await.unwrap_err();
        assert!(matches!(err, ProviderError::NotHttps(_)));
    }
}
