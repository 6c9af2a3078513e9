use anyhow::{Result, anyhow};
use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use dashmap::DashMap;
use image::GenericImageView;
use image::codecs::jpeg::JpegEncoder;
use sea_orm::ActiveValue::Set;
use sea_orm::{ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter};
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::{MediaConfig, ThumbnailConfig};
use crate::entities::{prelude::*, *};
use crate::error::{MediaError, MediaResult};
use crate::services::asset::AssetLike;
use crate::services::storage::{BlobStore, Disks};
use crate::utils::keyed_mutex::KeyedMutex;

/// Target box for a conversion. The result fits inside the box, keeps its
/// aspect ratio and is never scaled up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransformRequest {
    pub width: u32,
    pub height: u32,
    pub quality: u8,
}

pub struct DerivedImage {
    pub data: Vec<u8>,
    pub extension: &'static str,
}

/// External image processing step used to produce conversions
#[async_trait]
pub trait ImageTransformer: Send + Sync {
    async fn transform(
        &self,
        source: &dyn BlobStore,
        source_path: &str,
        request: &TransformRequest,
    ) -> Result<DerivedImage>;
}

/// Renders conversions in-process with the `image` crate, encoding JPEG
pub struct RasterTransformer;

impl RasterTransformer {
    fn render(data: &[u8], request: TransformRequest) -> Result<Vec<u8>> {
        let img =
            image::load_from_memory(data).map_err(|e| anyhow!("Failed to load image: {}", e))?;

        let fitted = if img.width() <= request.width && img.height() <= request.height {
            img
        } else {
            img.thumbnail(request.width, request.height)
        };

        // JPEG has no alpha channel
        let rgb = fitted.to_rgb8();
        let mut out = Vec::new();
        JpegEncoder::new_with_quality(&mut out, request.quality.clamp(1, 100))
            .encode(
                rgb.as_raw(),
                rgb.width(),
                rgb.height(),
                image::ColorType::Rgb8,
            )
            .map_err(|e| anyhow!("Failed to encode thumbnail: {}", e))?;
        Ok(out)
    }
}

#[async_trait]
impl ImageTransformer for RasterTransformer {
    async fn transform(
        &self,
        source: &dyn BlobStore,
        source_path: &str,
        request: &TransformRequest,
    ) -> Result<DerivedImage> {
        let data = source.get(source_path).await?;
        let request = *request;
        let rendered = tokio::task::spawn_blocking(move || Self::render(&data, request)).await??;
        Ok(DerivedImage {
            data: rendered,
            extension: "jpg",
        })
    }
}

struct CachedUrl {
    url: String,
    expires_at: Instant,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct GenerationReport {
    pub generated: usize,
    pub skipped: usize,
    pub failed: usize,
}

/// Resolves display URLs for conversions of image assets.
///
/// Lookup order: in-memory cache, stored conversion, on-demand generation,
/// and finally the original file's URL. Resolution never fails.
pub struct ThumbnailResolver {
    db: DatabaseConnection,
    disks: Disks,
    config: Arc<MediaConfig>,
    transformer: Arc<dyn ImageTransformer>,
    cache: DashMap<(String, String), CachedUrl>,
    in_flight: KeyedMutex,
}

impl ThumbnailResolver {
    pub fn new(
        db: DatabaseConnection,
        disks: Disks,
        config: Arc<MediaConfig>,
        transformer: Arc<dyn ImageTransformer>,
    ) -> Self {
        Self {
            db,
            disks,
            config,
            transformer,
            cache: DashMap::new(),
            in_flight: KeyedMutex::new(),
        }
    }

    pub async fn thumbnail_url<A: AssetLike + ?Sized>(&self, asset: &A) -> Option<String> {
        self.conversion_url(asset, ThumbnailConfig::THUMB).await
    }

    pub async fn conversion_url<A: AssetLike + ?Sized>(
        &self,
        asset: &A,
        conversion: &str,
    ) -> Option<String> {
        if !asset.is_image(&self.config.upload.allowed_mimes) {
            return None;
        }

        let original = match self.disks.get(asset.disk()) {
            Ok(store) => store.url(asset.path()),
            Err(e) => {
                warn!("No URL for media item {}: {}", asset.id(), e);
                return None;
            }
        };

        let key = (asset.id().to_string(), conversion.to_string());
        if let Some(url) = self.cached(&key) {
            return Some(url);
        }

        // One generation per (asset, conversion) at a time; latecomers reuse its result
        let _guard = self
            .in_flight
            .lock(&format!("{}:{}", asset.id(), conversion))
            .await;
        if let Some(url) = self.cached(&key) {
            return Some(url);
        }

        match self.stored_conversion_url(asset.id(), conversion).await {
            Ok(Some(url)) => {
                self.remember(key, &url);
                return Some(url);
            }
            Ok(None) => {}
            Err(e) => warn!(
                "Conversion lookup failed for media item {}: {}",
                asset.id(),
                e
            ),
        }

        if !self.config.thumbnails.enabled {
            return Some(original);
        }

        match self.generate(asset, conversion).await {
            Ok(url) => {
                self.remember(key, &url);
                Some(url)
            }
            Err(e) => {
                warn!(
                    "Falling back to original for media item {} ({}): {}",
                    asset.id(),
                    conversion,
                    e
                );
                Some(original)
            }
        }
    }

    /// Render the conversion and record it, replacing any previous rendition
    pub async fn generate<A: AssetLike + ?Sized>(
        &self,
        asset: &A,
        conversion: &str,
    ) -> MediaResult<String> {
        let (width, height) = self.config.thumbnails.size_for(conversion).ok_or_else(|| {
            MediaError::Transform(format!("Unknown conversion '{}'", conversion))
        })?;
        let request = TransformRequest {
            width,
            height,
            quality: self.config.thumbnails.quality,
        };

        let source = self.disks.get(asset.disk())?;
        let derived = tokio::time::timeout(
            self.config.thumbnails.timeout,
            self.transformer
                .transform(source.as_ref(), asset.path(), &request),
        )
        .await
        .map_err(|_| {
            MediaError::Transform(format!(
                "Timed out after {:?}",
                self.config.thumbnails.timeout
            ))
        })?
        .map_err(|e| MediaError::Transform(format!("{:#}", e)))?;

        let disk = self.config.default_disk.clone();
        let target = self.disks.get(&disk)?;
        let path = format!(
            "{}/{}/{}.{}",
            self.config.paths.thumbnails.trim_end_matches('/'),
            conversion,
            asset.id(),
            derived.extension
        );
        target
            .put(&path, Bytes::from(derived.data))
            .await
            .map_err(MediaError::storage)?;

        if let Err(e) = self.record_conversion(asset.id(), conversion, &disk, &path).await {
            let _ = target.delete(&path).await;
            return Err(e);
        }

        info!(
            "Generated '{}' conversion for media item {} at {}:{}",
            conversion,
            asset.id(),
            disk,
            path
        );
        self.forget(asset.id());
        Ok(target.url(&path))
    }

    /// Generate the `thumb` conversion for every live image asset
    pub async fn generate_all(&self, force: bool) -> MediaResult<GenerationReport> {
        let images = MediaItems::find()
            .filter(media_items::Column::DeletedAt.is_null())
            .filter(
                media_items::Column::MimeType
                    .is_in(self.config.upload.allowed_mimes.image.clone()),
            )
            .all(&self.db)
            .await?;

        let mut report = GenerationReport::default();
        for item in images {
            if !force
                && self
                    .stored_conversion_url(&item.id, ThumbnailConfig::THUMB)
                    .await?
                    .is_some()
            {
                report.skipped += 1;
                continue;
            }

            match self.generate(&item, ThumbnailConfig::THUMB).await {
                Ok(_) => report.generated += 1,
                Err(e) => {
                    warn!(
                        "Failed to generate thumbnail for {} ({}): {}",
                        item.original_name, item.id, e
                    );
                    report.failed += 1;
                }
            }
        }

        info!(
            "Thumbnail generation complete: generated={}, skipped={}, failed={}",
            report.generated, report.skipped, report.failed
        );
        Ok(report)
    }

    /// Drop cached URLs for an asset
    pub fn forget(&self, media_item_id: &str) {
        self.cache.retain(|(id, _), _| id != media_item_id);
    }

    fn cached(&self, key: &(String, String)) -> Option<String> {
        if !self.config.cache.enabled {
            return None;
        }
        let entry = self.cache.get(key)?;
        if entry.expires_at > Instant::now() {
            Some(entry.url.clone())
        } else {
            drop(entry);
            self.cache.remove(key);
            None
        }
    }

    fn remember(&self, key: (String, String), url: &str) {
        if self.config.cache.enabled {
            let now = Instant::now();
            self.cache.retain(|_, entry| entry.expires_at > now);
            self.cache.insert(
                key,
                CachedUrl {
                    url: url.to_string(),
                    expires_at: now + self.config.cache.ttl(),
                },
            );
        }
    }

    async fn stored_conversion_url(
        &self,
        media_item_id: &str,
        conversion: &str,
    ) -> MediaResult<Option<String>> {
        let stored = MediaConversions::find()
            .filter(media_conversions::Column::MediaItemId.eq(media_item_id))
            .filter(media_conversions::Column::Name.eq(conversion))
            .one(&self.db)
            .await?;

        match stored {
            Some(c) => Ok(Some(self.disks.get(&c.disk)?.url(&c.path))),
            None => Ok(None),
        }
    }

    async fn record_conversion(
        &self,
        media_item_id: &str,
        conversion: &str,
        disk: &str,
        path: &str,
    ) -> MediaResult<()> {
        MediaConversions::delete_many()
            .filter(media_conversions::Column::MediaItemId.eq(media_item_id))
            .filter(media_conversions::Column::Name.eq(conversion))
            .exec(&self.db)
            .await?;

        media_conversions::ActiveModel {
            id: Set(Uuid::now_v7().to_string()),
            media_item_id: Set(media_item_id.to_string()),
            name: Set(conversion.to_string()),
            disk: Set(disk.to_string()),
            path: Set(path.to_string()),
            created_at: Set(Utc::now()),
        }
        .insert(&self.db)
        .await?;
        Ok(())
    }
}
