//! Local HTTP fixtures for provider and download tests.

use axum::Router;

/// Serve `router` on an ephemeral localhost port and return its base URL
/// (no trailing slash).
pub async fn serve(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind test listener");
    let addr = listener.local_addr().expect("listener address");
    tokio::spawn(async move {
        axum::serve(listener, router).await.expect("test server");
    });
    format!("http://{addr}")
}

/// Like [`serve`], for routers whose handlers need the server's own base
/// URL (e.g. version lists pointing back at the fixture).
pub async fn serve_with_base(router: Router<String>) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind test listener");
    let base = format!("http://{}", listener.local_addr().expect("listener address"));
    let app = router.with_state(base.clone());
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("test server");
    });
    base
}

pub fn sha256_hex(bytes: &[u8]) -> String {
    use sha2::{Digest, Sha256};
    hex::encode(Sha256::digest(bytes))
}
