use crate::error::{MediaError, MediaResult};
use anyhow::{Result, anyhow};
use async_trait::async_trait;
use aws_sdk_s3::Client;
use aws_sdk_s3::primitives::ByteStream;
use bytes::Bytes;
use percent_encoding::{AsciiSet, CONTROLS, utf8_percent_encode};
use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

/// Characters escaped inside a single path segment of a public URL
const PATH_SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}');

/// Key-addressed blob storage backing one disk
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Stores `data` under `path` and returns the stored path.
    async fn put(&self, path: &str, data: Bytes) -> Result<String>;
    async fn get(&self, path: &str) -> Result<Vec<u8>>;
    async fn exists(&self, path: &str) -> Result<bool>;
    /// Returns false when nothing was stored under `path`.
    async fn delete(&self, path: &str) -> Result<bool>;
    fn url(&self, path: &str) -> String;
}

fn join_url(base: &str, path: &str) -> String {
    let encoded: Vec<String> = path
        .split('/')
        .filter(|s| !s.is_empty())
        .map(|s| utf8_percent_encode(s, PATH_SEGMENT).to_string())
        .collect();
    format!("{}/{}", base.trim_end_matches('/'), encoded.join("/"))
}

/// Blob store on the local filesystem, served publicly under `base_url`
pub struct LocalDiskStore {
    root: PathBuf,
    base_url: String,
}

impl LocalDiskStore {
    pub fn new(root: impl Into<PathBuf>, base_url: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            base_url: base_url.into(),
        }
    }

    fn resolve(&self, path: &str) -> Result<PathBuf> {
        let relative = Path::new(path);
        let escapes = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_)));
        if path.is_empty() || escapes {
            return Err(anyhow!("Refusing storage path outside disk root: {}", path));
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl BlobStore for LocalDiskStore {
    async fn put(&self, path: &str, data: Bytes) -> Result<String> {
        let target = self.resolve(path)?;
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        // Write-then-rename so readers never observe a partial file
        let staging = target.with_extension(format!("part-{}", uuid::Uuid::new_v4()));
        tokio::fs::write(&staging, &data).await?;
        if let Err(e) = tokio::fs::rename(&staging, &target).await {
            let _ = tokio::fs::remove_file(&staging).await;
            return Err(e.into());
        }

        tracing::debug!("Stored {} bytes at {}", data.len(), target.display());
        Ok(path.to_string())
    }

    async fn get(&self, path: &str) -> Result<Vec<u8>> {
        let target = self.resolve(path)?;
        Ok(tokio::fs::read(&target).await?)
    }

    async fn exists(&self, path: &str) -> Result<bool> {
        let target = self.resolve(path)?;
        Ok(tokio::fs::try_exists(&target).await?)
    }

    async fn delete(&self, path: &str) -> Result<bool> {
        let target = self.resolve(path)?;
        match tokio::fs::remove_file(&target).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    fn url(&self, path: &str) -> String {
        join_url(&self.base_url, path)
    }
}

pub struct S3BlobStore {
    client: Client,
    bucket: String,
    public_url: String,
}

impl S3BlobStore {
    pub fn new(client: Client, bucket: String, public_url: String) -> Self {
        Self {
            client,
            bucket,
            public_url,
        }
    }
}

#[async_trait]
impl BlobStore for S3BlobStore {
    async fn put(&self, path: &str, data: Bytes) -> Result<String> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(path)
            .body(ByteStream::from(data))
            .send()
            .await?;
        Ok(path.to_string())
    }

    async fn get(&self, path: &str) -> Result<Vec<u8>> {
        let res = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(path)
            .send()
            .await?;
        let data = res.body.collect().await?.to_vec();
        Ok(data)
    }

    async fn exists(&self, path: &str) -> Result<bool> {
        let res = self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(path)
            .send()
            .await;

        match res {
            Ok(_) => Ok(true),
            Err(e) => {
                let service_error = e.into_service_error();
                if service_error.is_not_found() {
                    Ok(false)
                } else {
                    Err(anyhow!(service_error))
                }
            }
        }
    }

    async fn delete(&self, path: &str) -> Result<bool> {
        // S3 deletes are idempotent, so check existence first to report whether anything was removed
        if !self.exists(path).await? {
            return Ok(false);
        }

        let res = self
            .client
            .delete_object()
            .bucket(&self.bucket)
            .key(path)
            .send()
            .await;

        if let Err(e) = res {
            tracing::error!(
                "S3 delete_object failed: bucket={}, key={}, error={:?}",
                self.bucket,
                path,
                e
            );
            return Err(anyhow!(e));
        }
        Ok(true)
    }

    fn url(&self, path: &str) -> String {
        join_url(&format!("{}/{}", self.public_url.trim_end_matches('/'), self.bucket), path)
    }
}

/// Named blob stores ("disks") that media items can live on
#[derive(Clone, Default)]
pub struct Disks {
    stores: HashMap<String, Arc<dyn BlobStore>>,
}

impl Disks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_disk(mut self, name: impl Into<String>, store: Arc<dyn BlobStore>) -> Self {
        self.stores.insert(name.into(), store);
        self
    }

    pub fn get(&self, name: &str) -> MediaResult<Arc<dyn BlobStore>> {
        self.stores
            .get(name)
            .cloned()
            .ok_or_else(|| MediaError::StorageIo(format!("Disk '{}' is not configured", name)))
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.stores.keys().cloned().collect();
        names.sort();
        names
    }
}
