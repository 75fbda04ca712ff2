//! Category loading over HTTP against a local static server.

mod common;

use affnav::loader::{
    CategoryLoader, FileStore, HttpSource, LoadError, LoaderSettings, PanelView,
};
use common::{TestServer, optimized_site};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

fn loader(server: &TestServer) -> CategoryLoader<HttpSource> {
    CategoryLoader::new(HttpSource::new(&server.url()))
}

#[tokio::test]
async fn loads_chunk_and_serves_repeat_from_cache() {
    let site = optimized_site();
    let server = TestServer::start(site.path().to_path_buf(), Duration::ZERO);
    let loader = loader(&server);

    let data = loader.load_category(0).await.unwrap();
    assert_eq!(data.category_name, "追踪器");
    assert_eq!(data.sites.len(), 5);
    assert_eq!(server.requests(), 1);

    let again = loader.load_category(0).await.unwrap();
    assert!(Arc::ptr_eq(&data, &again));
    assert_eq!(server.requests(), 1);
}

#[tokio::test]
async fn concurrent_loads_share_one_request() {
    let site = optimized_site();
    let server = TestServer::start(site.path().to_path_buf(), Duration::from_millis(100));
    let loader = loader(&server);

    let (a, b, c) = tokio::join!(
        loader.load_category(1),
        loader.load_category(1),
        loader.load_category(1)
    );
    assert_eq!(a.unwrap().sites.len(), 3);
    assert!(b.is_ok() && c.is_ok());
    assert_eq!(server.requests(), 1);
}

#[tokio::test]
async fn missing_chunk_is_a_status_error() {
    let site = optimized_site();
    let server = TestServer::start(site.path().to_path_buf(), Duration::ZERO);
    let loader = loader(&server);

    let err = loader.load_category(42).await.unwrap_err();
    assert!(
        matches!(err, LoadError::Status { index: 42, status: 404, .. }),
        "{err:?}"
    );
    assert!(err.is_network());
}

#[tokio::test]
async fn malformed_chunk_is_a_format_error() {
    let site = optimized_site();
    std::fs::write(site.path().join("categories/3.json"), "{ nope").unwrap();
    let server = TestServer::start(site.path().to_path_buf(), Duration::ZERO);

    let err = loader(&server).load_category(3).await.unwrap_err();
    assert!(matches!(err, LoadError::Format { index: 3, .. }), "{err:?}");
}

#[tokio::test]
async fn slow_server_times_out() {
    let site = optimized_site();
    let server = TestServer::start(site.path().to_path_buf(), Duration::from_millis(500));
    let loader = CategoryLoader::builder(HttpSource::new(&server.url()))
        .settings(LoaderSettings {
            timeout: Duration::from_millis(50),
            ..LoaderSettings::default()
        })
        .build();

    let err = loader.load_category(0).await.unwrap_err();
    assert_eq!(err, LoadError::Timeout { index: 0, timeout_ms: 50 });
}

#[tokio::test]
async fn persisted_cache_survives_restart() {
    let site = optimized_site();
    let cache = TempDir::new().unwrap();
    let server = TestServer::start(site.path().to_path_buf(), Duration::ZERO);

    let first = CategoryLoader::builder(HttpSource::new(&server.url()))
        .store(FileStore::new(cache.path()))
        .build();
    first.load_category(2).await.unwrap();
    drop(first);

    let second = CategoryLoader::builder(HttpSource::new(&server.url()))
        .store(FileStore::new(cache.path()))
        .build();
    assert_eq!(second.cached_indices(), vec![2]);
    let data = second.load_category(2).await.unwrap();
    assert_eq!(data.category_name, "PoP");
    assert_eq!(server.requests(), 1);
}

#[tokio::test]
async fn panel_shows_loaded_sites() {
    let site = optimized_site();
    let server = TestServer::start(site.path().to_path_buf(), Duration::ZERO);
    let view = Arc::new(PanelView::with_panels([0]));
    let loader = CategoryLoader::builder(HttpSource::new(&server.url()))
        .view(view.clone())
        .build();

    loader.preload_first().await.unwrap().unwrap();
    let html = view.render(0).unwrap().into_string();
    assert!(html.contains("Binom"));
    assert!(html.contains("BeMob"));
    assert!(html.contains(r#"data-category-index="0""#));
}
