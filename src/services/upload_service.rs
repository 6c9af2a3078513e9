use crate::config::MediaConfig;
use crate::entities::media_items;
use crate::error::{MediaError, MediaResult};
use crate::services::asset::Classification;
use crate::services::media_registry::{MediaRegistry, NewMediaItem};
use crate::services::storage::Disks;
use crate::utils::validation::{
    detect_mime, file_extension, sanitize_filename, validate_file_size, validate_mime_type,
};
use bytes::Bytes;
use chrono::Utc;
use std::io::Cursor;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

/// A file received from a client, fully buffered
#[derive(Debug, Clone)]
pub struct IncomingFile {
    pub original_name: String,
    pub declared_mime: Option<String>,
    pub data: Bytes,
}

pub struct UploadService {
    registry: Arc<MediaRegistry>,
    disks: Disks,
    config: Arc<MediaConfig>,
}

impl UploadService {
    pub fn new(registry: Arc<MediaRegistry>, disks: Disks, config: Arc<MediaConfig>) -> Self {
        Self {
            registry,
            disks,
            config,
        }
    }

    /// Rejects batches larger than the configured multi-upload limit
    pub fn check_batch(&self, files: usize) -> MediaResult<()> {
        if files == 0 {
            return Err(MediaError::Validation("No file provided".to_string()));
        }
        if files > self.config.upload.max_files {
            return Err(MediaError::Validation(format!(
                "At most {} files can be uploaded at once (got {})",
                self.config.upload.max_files, files
            )));
        }
        Ok(())
    }

    /// Validate, store and register one file. Nothing is written to storage
    /// unless validation passes, and no record exists without its file.
    pub async fn upload(
        &self,
        file: IncomingFile,
        created_by: Option<String>,
    ) -> MediaResult<media_items::Model> {
        let original_name = sanitize_filename(&file.original_name)?;
        validate_file_size(
            file.data.len() as u64,
            self.config.upload.max_file_size_bytes(),
        )?;

        let mime_type = detect_mime(file.declared_mime.as_deref(), &file.data);
        validate_mime_type(&mime_type, &self.config.upload.allowed_mimes)?;

        let classification = Classification::of(&mime_type, &self.config.upload.allowed_mimes);
        let path = self.storage_path(classification, &original_name, &mime_type);
        let (width, height) = if classification == Classification::Image {
            read_dimensions(&file.data)
        } else {
            (None, None)
        };

        let disk = self.config.default_disk.clone();
        let store = self.disks.get(&disk)?;
        let size = file.data.len() as i64;
        let stored_path = store
            .put(&path, file.data)
            .await
            .map_err(MediaError::storage)?;

        let created = self
            .registry
            .create(NewMediaItem {
                disk: disk.clone(),
                path: stored_path.clone(),
                original_name,
                mime_type,
                size,
                width,
                height,
                meta: None,
                created_by,
            })
            .await;

        match created {
            Ok(item) => {
                info!(
                    "Uploaded {} as media item {} ({})",
                    item.original_name,
                    item.id,
                    classification.as_str()
                );
                Ok(item)
            }
            Err(e) => {
                if let Err(cleanup) = store.delete(&stored_path).await {
                    warn!(
                        "Could not remove orphaned upload {}:{}: {:#}",
                        disk, stored_path, cleanup
                    );
                }
                Err(e)
            }
        }
    }

    /// `{category prefix}/{YYYY}/{MM}/{DD}/{uuid}.{ext}`
    fn storage_path(
        &self,
        classification: Classification,
        original_name: &str,
        mime_type: &str,
    ) -> String {
        let paths = &self.config.paths;
        let prefix = match classification {
            Classification::Image => &paths.images,
            Classification::Video => &paths.videos,
            Classification::Document | Classification::Other => &paths.documents,
        };
        format!(
            "{}/{}/{}.{}",
            prefix.trim_end_matches('/'),
            Utc::now().format("%Y/%m/%d"),
            Uuid::new_v4(),
            file_extension(original_name, mime_type)
        )
    }
}

/// Pixel dimensions from the image header, if the format is decodable
fn read_dimensions(data: &[u8]) -> (Option<i32>, Option<i32>) {
    let dims = image::io::Reader::new(Cursor::new(data))
        .with_guessed_format()
        .ok()
        .and_then(|reader| reader.into_dimensions().ok());

    match dims {
        Some((w, h)) => (i32::try_from(w).ok(), i32::try_from(h).ok()),
        None => (None, None),
    }
}
