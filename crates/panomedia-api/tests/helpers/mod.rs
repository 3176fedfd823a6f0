//! Test helpers: a worker app over a temporary local store and in-memory records.
//!
//! Run from workspace root: `cargo test -p panomedia-api`.

#![allow(dead_code)]

use axum_test::TestServer;
use bytes::Bytes;
use image::codecs::jpeg::JpegEncoder;
use image::{ExtendedColorType, ImageEncoder, Rgb, RgbImage};
use panomedia_api::setup::initialize_app;
use panomedia_api::state::AppState;
use panomedia_core::models::{MediaRecord, MediaStatus};
use panomedia_core::Config;
use panomedia_services::{ImageUpload, ThumbnailUpload, UploadRequest, MIME_JPEG};
use std::time::Duration;
use tempfile::TempDir;

pub struct TestApp {
    pub server: TestServer,
    pub state: AppState,
    pub _temp_dir: TempDir,
}

pub fn test_config(temp_dir: &TempDir) -> Config {
    Config {
        local_storage_path: Some(temp_dir.path().to_string_lossy().into_owned()),
        local_storage_base_url: Some("http://store.test/media".to_string()),
        ffmpeg_path: "/nonexistent/ffmpeg".to_string(),
        job_timeout_seconds: 120,
        mobile_width: 256,
        mobile_height: 128,
        ..Config::default()
    }
}

pub async fn setup_app() -> TestApp {
    let temp_dir = tempfile::tempdir().unwrap();
    let (state, router) = initialize_app(test_config(&temp_dir)).await.unwrap();
    let server = TestServer::new(router).expect("Failed to create test server");
    TestApp {
        server,
        state,
        _temp_dir: temp_dir,
    }
}

/// Serves a worker on an ephemeral port; returns its base URL.
pub async fn spawn_worker(config: Config) -> (String, AppState) {
    let (state, router) = initialize_app(config).await.unwrap();
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    (format!("http://{}", addr), state)
}

pub fn jpeg(width: u32, height: u32) -> Bytes {
    let img = RgbImage::from_pixel(width, height, Rgb([200, 90, 30]));
    let mut buffer = Vec::new();
    JpegEncoder::new_with_quality(&mut buffer, 80)
        .write_image(img.as_raw(), width, height, ExtendedColorType::Rgb8)
        .unwrap();
    Bytes::from(buffer)
}

pub fn pano_upload(width: u32, height: u32) -> UploadRequest {
    UploadRequest {
        owner_id: "user-1".to_string(),
        image: ImageUpload {
            buffer: Some(jpeg(width, height)),
            mimetype: Some(MIME_JPEG.to_string()),
            width: Some(width),
            height: Some(height),
            ..Default::default()
        },
        thumbnail: ThumbnailUpload {
            buffer: Some(jpeg(32, 16)),
            mimetype: Some(MIME_JPEG.to_string()),
            lat: Some(-33.86),
            lng: Some(151.21),
        },
        ..Default::default()
    }
}

/// Polls until the record leaves `pending`.
pub async fn wait_until_terminal(state: &AppState, media_id: &str) -> MediaRecord {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(120);
    loop {
        let record = state.orchestrator.find_media(media_id).await.unwrap();
        if record.status != MediaStatus::Pending {
            return record;
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "media {} still pending",
            media_id
        );
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}
