#![allow(dead_code)]

use anyhow::{Result, anyhow, bail};
use async_trait::async_trait;
use bytes::Bytes;
use image::{DynamicImage, ImageFormat, RgbImage};
use rust_media_backend::AppState;
use rust_media_backend::config::MediaConfig;
use rust_media_backend::entities::media_items;
use rust_media_backend::infrastructure::database;
use rust_media_backend::services::media_registry::NewMediaItem;
use rust_media_backend::services::storage::{BlobStore, Disks};
use rust_media_backend::services::thumbnail_service::{
    DerivedImage, ImageTransformer, TransformRequest,
};
use std::collections::HashMap;
use std::io::Cursor;
use std::sync::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

pub const BASE_URL: &str = "http://cdn.test/storage";

/// In-memory blob store that records every write and delete
#[derive(Default)]
pub struct MockBlobStore {
    files: Mutex<HashMap<String, Vec<u8>>>,
    puts: Mutex<Vec<String>>,
    deletes: Mutex<Vec<String>>,
    fail_puts: AtomicBool,
    fail_deletes: AtomicBool,
}

impl MockBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_puts(&self, fail: bool) {
        self.fail_puts.store(fail, Ordering::SeqCst);
    }

    pub fn fail_deletes(&self, fail: bool) {
        self.fail_deletes.store(fail, Ordering::SeqCst);
    }

    pub fn puts(&self) -> Vec<String> {
        self.puts.lock().unwrap().clone()
    }

    pub fn deletes(&self) -> Vec<String> {
        self.deletes.lock().unwrap().clone()
    }

    pub fn contains(&self, path: &str) -> bool {
        self.files.lock().unwrap().contains_key(path)
    }

    pub fn get_bytes(&self, path: &str) -> Vec<u8> {
        self.files
            .lock()
            .unwrap()
            .get(path)
            .cloned()
            .unwrap_or_default()
    }

    pub fn file_count(&self) -> usize {
        self.files.lock().unwrap().len()
    }

    /// Place a file without recording it as a put
    pub fn seed(&self, path: &str, data: Vec<u8>) {
        self.files.lock().unwrap().insert(path.to_string(), data);
    }
}

#[async_trait]
impl BlobStore for MockBlobStore {
    async fn put(&self, path: &str, data: Bytes) -> Result<String> {
        if self.fail_puts.load(Ordering::SeqCst) {
            bail!("disk full");
        }
        self.puts.lock().unwrap().push(path.to_string());
        self.files
            .lock()
            .unwrap()
            .insert(path.to_string(), data.to_vec());
        Ok(path.to_string())
    }

    async fn get(&self, path: &str) -> Result<Vec<u8>> {
        self.files
            .lock()
            .unwrap()
            .get(path)
            .cloned()
            .ok_or_else(|| anyhow!("no such file: {}", path))
    }

    async fn exists(&self, path: &str) -> Result<bool> {
        Ok(self.contains(path))
    }

    async fn delete(&self, path: &str) -> Result<bool> {
        if self.fail_deletes.load(Ordering::SeqCst) {
            bail!("permission denied");
        }
        self.deletes.lock().unwrap().push(path.to_string());
        Ok(self.files.lock().unwrap().remove(path).is_some())
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", BASE_URL, path)
    }
}

/// Image transformer whose outcome and latency are fixed up front
pub struct ScriptedTransformer {
    calls: AtomicUsize,
    fail: bool,
    delay: Duration,
}

impl ScriptedTransformer {
    pub fn succeeding() -> Self {
        Self {
            calls: AtomicUsize::new(0),
            fail: false,
            delay: Duration::ZERO,
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::succeeding()
        }
    }

    pub fn slow(delay: Duration) -> Self {
        Self {
            delay,
            ..Self::succeeding()
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ImageTransformer for ScriptedTransformer {
    async fn transform(
        &self,
        source: &dyn BlobStore,
        source_path: &str,
        request: &TransformRequest,
    ) -> Result<DerivedImage> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if self.fail {
            bail!("transform unavailable");
        }
        source.get(source_path).await?;
        Ok(DerivedImage {
            data: format!("{}x{}", request.width, request.height).into_bytes(),
            extension: "jpg",
        })
    }
}

pub struct TestHarness {
    pub state: AppState,
    pub store: Arc<MockBlobStore>,
    pub transformer: Arc<ScriptedTransformer>,
}

pub async fn harness() -> TestHarness {
    harness_with(MediaConfig::default(), ScriptedTransformer::succeeding()).await
}

pub async fn harness_with(config: MediaConfig, transformer: ScriptedTransformer) -> TestHarness {
    let db = database::connect_in_memory().await.unwrap();
    let store = Arc::new(MockBlobStore::new());
    let transformer = Arc::new(transformer);
    let disks = Disks::new().with_disk("public", store.clone());
    let state = AppState::new(db, disks, config, transformer.clone());

    TestHarness {
        state,
        store,
        transformer,
    }
}

impl TestHarness {
    /// Register an item whose file already sits in the mock store
    pub async fn seed_item(&self, name: &str, mime_type: &str) -> media_items::Model {
        let path = format!("media/seed/{}", name);
        self.store.seed(&path, b"original".to_vec());
        self.state
            .registry
            .create(NewMediaItem {
                disk: "public".to_string(),
                path,
                original_name: name.to_string(),
                mime_type: mime_type.to_string(),
                size: 8,
                ..Default::default()
            })
            .await
            .unwrap()
    }

    pub async fn seed_image(&self, name: &str) -> media_items::Model {
        self.seed_item(name, "image/png").await
    }

    pub async fn seed_images(&self, names: &[&str]) -> Vec<media_items::Model> {
        let mut items = Vec::new();
        for name in names {
            items.push(self.seed_image(name).await);
        }
        items
    }
}

pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let img = DynamicImage::ImageRgb8(RgbImage::new(width, height));
    let mut out = Vec::new();
    img.write_to(&mut Cursor::new(&mut out), ImageFormat::Png)
        .unwrap();
    out
}

pub fn ids(items: &[media_items::Model]) -> Vec<String> {
    items.iter().map(|i| i.id.clone()).collect()
}

/// Build a multipart/form-data body holding `files` as `file` parts
pub fn multipart_body(boundary: &str, files: &[(&str, &str, &[u8])]) -> Vec<u8> {
    let mut body = Vec::new();
    for (filename, content_type, data) in files {
        body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{}\"\r\nContent-Type: {}\r\n\r\n",
                boundary, filename, content_type
            )
            .as_bytes(),
        );
        body.extend_from_slice(data);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{}--\r\n", boundary).as_bytes());
    body
}
