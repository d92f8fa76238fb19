#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::{Arc, Once};

use mediastore::api::create_router;
use mediastore::config::{Config, StorageBackend};
use mediastore::utils::db::connect_pool;
use mediastore::utils::state::AppState;
use reqwest::header::RANGE;
use reqwest::multipart::{Form, Part};
use serde_json::Value;
use tempfile::TempDir;
use tokio::net::TcpListener;

pub const MAX_AUDIO_SIZE: u64 = 64 * 1024;
pub const MAX_IMAGE_SIZE: u64 = 16 * 1024;

static INIT: Once = Once::new();

fn init_logging() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("mediastore=debug")),
            )
            .with_test_writer()
            .init();
    });
}

pub struct TestApp {
    pub addr: SocketAddr,
    pub client: reqwest::Client,
    pub state: Arc<AppState>,
    pub root: TempDir,
}

impl TestApp {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub async fn upload(&self, path: &str, form: Form) -> reqwest::Response {
        self.client
            .post(self.url(path))
            .multipart(form)
            .send()
            .await
            .unwrap()
    }

    /// Uploads `data` as `track.mp3` and returns the JSON body.
    pub async fn upload_audio(&self, data: Vec<u8>) -> Value {
        let resp = self.upload("/api/media/audio", audio_form(data)).await;
        resp.json().await.unwrap()
    }

    pub async fn get(&self, path: &str) -> reqwest::Response {
        self.client.get(self.url(path)).send().await.unwrap()
    }

    pub async fn get_range(&self, path: &str, range: &str) -> reqwest::Response {
        self.client
            .get(self.url(path))
            .header(RANGE, range)
            .send()
            .await
            .unwrap()
    }
}

/// Boots the router on an ephemeral port over a filesystem store in a
/// fresh temp dir and an in-memory catalog.
pub async fn spawn_app(chunk_size: u32) -> TestApp {
    spawn_app_with(StorageBackend::Filesystem, chunk_size).await
}

pub async fn spawn_app_with(storage: StorageBackend, chunk_size: u32) -> TestApp {
    init_logging();
    let root = tempfile::tempdir().unwrap();
    let config = Config {
        host: "127.0.0.1".to_string(),
        port: 0,
        storage,
        root_dir: root.path().to_string_lossy().into_owned(),
        db_url: "sqlite::memory:".to_string(),
        chunk_size,
        upload_concurrency: 4,
        max_audio_size: MAX_AUDIO_SIZE,
        max_image_size: MAX_IMAGE_SIZE,
    };
    let pool = connect_pool(&config.db_url).await.unwrap();
    let state = Arc::new(AppState::new(config, Arc::new(pool)));
    let app = create_router(state.clone());

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    TestApp {
        addr,
        client: reqwest::Client::new(),
        state,
        root,
    }
}

pub fn payload(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i * 7 % 256) as u8).collect()
}

pub fn file_part(data: Vec<u8>, file_name: &str, mime: &str) -> Part {
    Part::bytes(data)
        .file_name(file_name.to_string())
        .mime_str(mime)
        .unwrap()
}

pub fn audio_form(data: Vec<u8>) -> Form {
    Form::new().part("audioFile", file_part(data, "track.mp3", "audio/mpeg"))
}
