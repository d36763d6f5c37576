use std::io::Cursor;
use std::sync::Arc;

use emacache::{
    AudioClip, Catalog, ImageEntry, LoadStatus, MediaCache, MediaKind, MediaLoader, Preloader,
    SourceFetcher,
};
use emastore::{FileBackend, KvStore};
use image::{DynamicImage, ImageBuffer, ImageFormat, Rgba};
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn png_bytes(shade: u8) -> Vec<u8> {
    let img = ImageBuffer::from_pixel(4, 4, Rgba([shade, shade, 255, 255]));
    let mut out = Cursor::new(Vec::new());
    DynamicImage::ImageRgba8(img)
        .write_to(&mut out, ImageFormat::Png)
        .unwrap();
    out.into_inner()
}

async fn serve_png(server: &MockServer, route: &str, shade: u8) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "image/png")
                .set_body_bytes(png_bytes(shade)),
        )
        .mount(server)
        .await;
}

async fn mock_assets() -> (MockServer, TempDir) {
    let server = MockServer::start().await;
    serve_png(&server, "/idle-1.png", 10).await;
    serve_png(&server, "/held-1.png", 20).await;
    serve_png(&server, "/idle-2.png", 30).await;
    serve_png(&server, "/held-2.png", 40).await;
    Mock::given(method("GET"))
        .and(path("/kya.ogg"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "audio/ogg")
                .set_body_bytes(b"OggS-kya".to_vec()),
        )
        .mount(&server)
        .await;

    let assets = TempDir::new().unwrap();
    std::fs::create_dir_all(assets.path().join("ogg")).unwrap();
    std::fs::write(assets.path().join("ogg/hiro.mp3"), b"ID3-hiro").unwrap();

    (server, assets)
}

fn catalog(base: &str) -> Catalog {
    let url = |name: &str| format!("{}/{}", base, name);
    Catalog {
        images: vec![
            ImageEntry::two_state(1, (&url("idle-1.png"), ">_<"), (&url("held-1.png"), ">U<"), ">U<"),
            ImageEntry::two_state(2, (&url("idle-2.png"), "O^O"), (&url("held-2.png"), "O^O"), "O^O"),
            ImageEntry::single(3, &url("missing.png"), "doro"),
        ],
        audio: vec![
            AudioClip {
                src: url("kya.ogg"),
                offset_ms: 50,
                name: "Kya".to_string(),
            },
            AudioClip {
                src: "ogg/hiro.mp3".to_string(),
                offset_ms: 0,
                name: "Hiro酱".to_string(),
            },
        ],
        artists: Vec::new(),
    }
}

fn preloader(store: KvStore, assets: &TempDir) -> Preloader {
    let cache = Arc::new(MediaCache::new(store));
    let fetcher = Arc::new(SourceFetcher::new(assets.path()));
    Preloader::new(MediaLoader::new(cache, fetcher))
}

#[tokio::test]
async fn test_preload_all_settles_every_asset() {
    let (server, assets) = mock_assets().await;
    let catalog = catalog(&server.uri());
    let preloader = preloader(KvStore::memory(), &assets);

    let report = preloader.preload_all(&catalog).await;
    let summary = report.summary();

    assert_eq!(report.images.len(), 5);
    assert_eq!(summary.fresh, 6);
    assert_eq!(summary.fallback, 1);
    assert_eq!(summary.failed, 0);

    let missing = format!("{}/missing.png", server.uri());
    let outcome = report.images.iter().find(|o| o.url == missing).unwrap();
    let loaded = outcome.result.as_ref().unwrap();
    assert_eq!(loaded.status, LoadStatus::Fallback);
    assert_eq!(loaded.value, missing);

    let cache = preloader.loader().cache();
    assert_eq!(cache.sources(MediaKind::Image).len(), 4);
    assert_eq!(cache.sources(MediaKind::Audio).len(), 2);
    assert!(cache.lookup(MediaKind::Image, &missing).is_none());

    assert_eq!(
        report.resolve_audio("ogg/hiro.mp3"),
        "data:audio/mpeg;base64,SUQzLWhpcm8="
    );
    assert!(report
        .resolve_audio(&format!("{}/kya.ogg", server.uri()))
        .starts_with("data:audio/ogg;base64,"));
}

#[tokio::test]
async fn test_second_preload_is_served_from_cache() {
    let (server, assets) = mock_assets().await;
    let catalog = catalog(&server.uri());
    let preloader = preloader(KvStore::memory(), &assets);

    preloader.preload_all(&catalog).await;
    let summary = preloader.preload_all(&catalog).await.summary();

    assert_eq!(summary.cached, 6);
    assert_eq!(summary.fallback, 1);
    assert_eq!(summary.fresh, 0);
}

#[tokio::test]
async fn test_cache_survives_reopen() {
    let (server, assets) = mock_assets().await;
    let catalog = catalog(&server.uri());
    let data = TempDir::new().unwrap();

    {
        let backend = FileBackend::open(data.path()).unwrap();
        let preloader = preloader(KvStore::new(backend), &assets);
        preloader.preload_all(&catalog).await;
    }

    let preloader = preloader(KvStore::new(FileBackend::open(data.path()).unwrap()), &assets);
    let entry = preloader
        .loader()
        .cache()
        .lookup(MediaKind::Image, &format!("{}/idle-1.png", server.uri()))
        .unwrap();

    assert!(entry.data.starts_with("data:image/png;base64,"));
    assert_eq!(entry.alt.as_deref(), Some(">_<"));
}

#[tokio::test]
async fn test_preload_selected_loads_both_states() {
    let (server, assets) = mock_assets().await;
    let catalog = catalog(&server.uri());
    let preloader = preloader(KvStore::memory(), &assets);

    let selected = preloader.preload_selected(&catalog.images[0]).await;
    assert_eq!(selected.default.unwrap().status, LoadStatus::Fresh);
    assert_eq!(selected.pressed.unwrap().unwrap().status, LoadStatus::Fresh);

    let single = preloader.preload_selected(&catalog.images[2]).await;
    assert!(single.default.unwrap().is_fallback());
    assert!(single.pressed.is_none());
}
