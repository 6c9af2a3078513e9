use crate::config::MediaConfig;
use crate::entities::{prelude::*, *};
use crate::error::{MediaError, MediaResult};
use crate::services::asset::{AssetLike, Classification};
use crate::services::storage::{BlobStore, Disks};
use crate::utils::validation::{
    MAX_ALT_LENGTH, MAX_CAPTION_LENGTH, MAX_TITLE_LENGTH, validate_length,
};
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, EntityTrait, ModelTrait,
    PaginatorTrait, QueryFilter, QueryOrder, Set, TransactionTrait,
};
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

/// Everything needed to register a freshly stored file
#[derive(Debug, Clone, Default)]
pub struct NewMediaItem {
    pub disk: String,
    pub path: String,
    pub original_name: String,
    pub mime_type: String,
    pub size: i64,
    pub width: Option<i32>,
    pub height: Option<i32>,
    pub meta: Option<serde_json::Value>,
    pub created_by: Option<String>,
}

/// Editable descriptive fields. `None` leaves a field untouched, an empty
/// string clears it.
#[derive(Debug, Clone, Default)]
pub struct MediaDetails {
    pub alt: Option<String>,
    pub title: Option<String>,
    pub caption: Option<String>,
}

/// What happened to the stored file when a record was deleted
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "reason", rename_all = "snake_case")]
pub enum BlobCleanup {
    Removed,
    Missing,
    Failed(String),
}

#[derive(Debug, Clone, Serialize)]
pub struct DeleteOutcome {
    pub id: String,
    pub usages_removed: u64,
    pub blob: BlobCleanup,
}

#[derive(Debug, Clone)]
pub struct MediaPage {
    pub items: Vec<media_items::Model>,
    pub total: u64,
    pub page: u64,
    pub per_page: u64,
}

/// Owns media item records and the lifecycle of their stored files
pub struct MediaRegistry {
    db: DatabaseConnection,
    disks: Disks,
    config: Arc<MediaConfig>,
}

impl MediaRegistry {
    pub fn new(db: DatabaseConnection, disks: Disks, config: Arc<MediaConfig>) -> Self {
        Self { db, disks, config }
    }

    pub async fn create(&self, new: NewMediaItem) -> MediaResult<media_items::Model> {
        if new.mime_type.trim().is_empty() {
            return Err(MediaError::Validation("MIME type is required".to_string()));
        }
        if new.size < 0 {
            return Err(MediaError::Validation(format!(
                "Size must be non-negative (got {})",
                new.size
            )));
        }
        if new.width.is_some_and(|w| w < 0) || new.height.is_some_and(|h| h < 0) {
            return Err(MediaError::Validation(
                "Dimensions must be non-negative".to_string(),
            ));
        }
        if new.path.trim().is_empty() {
            return Err(MediaError::Validation("Storage path is required".to_string()));
        }
        self.disks.get(&new.disk).map_err(|_| {
            MediaError::Validation(format!("Disk '{}' is not configured", new.disk))
        })?;

        let now = Utc::now();
        let item = media_items::ActiveModel {
            id: Set(Uuid::now_v7().to_string()),
            disk: Set(new.disk),
            path: Set(new.path),
            original_name: Set(new.original_name),
            mime_type: Set(new.mime_type),
            size: Set(new.size),
            width: Set(new.width),
            height: Set(new.height),
            alt: Set(None),
            title: Set(None),
            caption: Set(None),
            meta: Set(new.meta),
            created_by: Set(new.created_by),
            created_at: Set(now),
            updated_at: Set(now),
            deleted_at: Set(None),
        };

        let model = item.insert(&self.db).await?;
        info!(
            "Registered media item {} ({}, {} bytes) at {}:{}",
            model.id, model.mime_type, model.size, model.disk, model.path
        );
        Ok(model)
    }

    pub async fn find(&self, id: &str) -> MediaResult<media_items::Model> {
        MediaItems::find_by_id(id)
            .filter(media_items::Column::DeletedAt.is_null())
            .one(&self.db)
            .await?
            .ok_or_else(|| MediaError::NotFound(format!("Media item {} not found", id)))
    }

    pub async fn find_with_trashed(&self, id: &str) -> MediaResult<media_items::Model> {
        MediaItems::find_by_id(id)
            .one(&self.db)
            .await?
            .ok_or_else(|| MediaError::NotFound(format!("Media item {} not found", id)))
    }

    /// Newest first, optionally restricted to one classification
    pub async fn list(
        &self,
        page: u64,
        classification: Option<Classification>,
    ) -> MediaResult<MediaPage> {
        let per_page = self.config.per_page;
        let page = page.max(1);

        let mut query = MediaItems::find().filter(media_items::Column::DeletedAt.is_null());
        if let Some(class) = classification {
            query = query.filter(self.classification_condition(class));
        }

        let paginator = query
            .order_by_desc(media_items::Column::Id)
            .paginate(&self.db, per_page);
        let total = paginator.num_items().await?;
        let items = paginator.fetch_page(page - 1).await?;

        Ok(MediaPage {
            items,
            total,
            page,
            per_page,
        })
    }

    fn classification_condition(&self, class: Classification) -> Condition {
        let allowed = &self.config.upload.allowed_mimes;
        match class {
            Classification::Image => {
                Condition::all().add(media_items::Column::MimeType.is_in(allowed.image.clone()))
            }
            Classification::Video => {
                Condition::all().add(media_items::Column::MimeType.is_in(allowed.video.clone()))
            }
            Classification::Document => Condition::all()
                .add(media_items::Column::MimeType.is_in(allowed.document.clone())),
            Classification::Other => {
                Condition::all().add(media_items::Column::MimeType.is_not_in(allowed.all()))
            }
        }
    }

    pub async fn update_details(
        &self,
        id: &str,
        details: MediaDetails,
    ) -> MediaResult<media_items::Model> {
        validate_length("alt", details.alt.as_deref(), MAX_ALT_LENGTH)?;
        validate_length("title", details.title.as_deref(), MAX_TITLE_LENGTH)?;
        validate_length("caption", details.caption.as_deref(), MAX_CAPTION_LENGTH)?;

        let item = self.find(id).await?;
        let mut active: media_items::ActiveModel = item.into();

        let normalize = |v: String| if v.is_empty() { None } else { Some(v) };
        if let Some(alt) = details.alt {
            active.alt = Set(normalize(alt));
        }
        if let Some(title) = details.title {
            active.title = Set(normalize(title));
        }
        if let Some(caption) = details.caption {
            active.caption = Set(normalize(caption));
        }
        active.updated_at = Set(Utc::now());

        Ok(active.update(&self.db).await?)
    }

    /// Soft-delete the record, drop its usages and conversions, then remove the
    /// stored file. A storage failure is reported in the outcome but never undoes
    /// the record deletion.
    pub async fn delete(&self, id: &str) -> MediaResult<DeleteOutcome> {
        let item = self.find(id).await?;

        let txn = self.db.begin().await?;
        let now = Utc::now();
        let mut active: media_items::ActiveModel = item.clone().into();
        active.deleted_at = Set(Some(now));
        active.updated_at = Set(now);
        active.update(&txn).await?;

        let usages_removed = MediaUsages::delete_many()
            .filter(media_usages::Column::MediaItemId.eq(&item.id))
            .exec(&txn)
            .await?
            .rows_affected;

        let conversions = MediaConversions::find()
            .filter(media_conversions::Column::MediaItemId.eq(&item.id))
            .all(&txn)
            .await?;
        MediaConversions::delete_many()
            .filter(media_conversions::Column::MediaItemId.eq(&item.id))
            .exec(&txn)
            .await?;
        txn.commit().await?;

        info!(
            "Soft deleted media item {} ({} usages removed)",
            item.id, usages_removed
        );

        self.remove_conversion_blobs(&conversions).await;
        let blob = self.remove_blob(&item).await;

        Ok(DeleteOutcome {
            id: item.id,
            usages_removed,
            blob,
        })
    }

    /// Bring a soft-deleted record back. Its file, usages and conversions stay gone.
    pub async fn restore(&self, id: &str) -> MediaResult<media_items::Model> {
        let item = self.find_with_trashed(id).await?;
        if item.deleted_at.is_none() {
            return Ok(item);
        }

        warn!(
            "Restoring media item {}; its file at {}:{} was removed on delete",
            item.id, item.disk, item.path
        );

        let mut active: media_items::ActiveModel = item.into();
        active.deleted_at = Set(None);
        active.updated_at = Set(Utc::now());
        Ok(active.update(&self.db).await?)
    }

    /// Permanently remove the record. Usages and conversion rows cascade in the database.
    pub async fn force_delete(&self, id: &str) -> MediaResult<DeleteOutcome> {
        let item = self.find_with_trashed(id).await?;

        let conversions = MediaConversions::find()
            .filter(media_conversions::Column::MediaItemId.eq(&item.id))
            .all(&self.db)
            .await?;
        let usages_removed = MediaUsages::find()
            .filter(media_usages::Column::MediaItemId.eq(&item.id))
            .count(&self.db)
            .await?;

        item.clone().delete(&self.db).await?;
        info!("Permanently deleted media item {}", item.id);

        self.remove_conversion_blobs(&conversions).await;
        let blob = if item.deleted_at.is_some() {
            BlobCleanup::Missing
        } else {
            self.remove_blob(&item).await
        };

        Ok(DeleteOutcome {
            id: item.id,
            usages_removed,
            blob,
        })
    }

    pub fn url<A: AssetLike + ?Sized>(&self, asset: &A) -> MediaResult<String> {
        Ok(self.disks.get(asset.disk())?.url(asset.path()))
    }

    pub fn store(&self, disk: &str) -> MediaResult<Arc<dyn BlobStore>> {
        self.disks.get(disk)
    }

    pub fn config(&self) -> &MediaConfig {
        &self.config
    }

    async fn remove_blob(&self, item: &media_items::Model) -> BlobCleanup {
        let store = match self.disks.get(&item.disk) {
            Ok(store) => store,
            Err(e) => {
                warn!("File for media item {} leaked: {}", item.id, e);
                return BlobCleanup::Failed(e.to_string());
            }
        };

        match store.delete(&item.path).await {
            Ok(true) => BlobCleanup::Removed,
            Ok(false) => {
                warn!(
                    "File for media item {} was already missing at {}:{}",
                    item.id, item.disk, item.path
                );
                BlobCleanup::Missing
            }
            Err(e) => {
                warn!(
                    "File for media item {} leaked at {}:{}: {:#}",
                    item.id, item.disk, item.path, e
                );
                BlobCleanup::Failed(format!("{:#}", e))
            }
        }
    }

    async fn remove_conversion_blobs(&self, conversions: &[media_conversions::Model]) {
        for conversion in conversions {
            let result = match self.disks.get(&conversion.disk) {
                Ok(store) => store.delete(&conversion.path).await.map(|_| ()),
                Err(e) => Err(anyhow::anyhow!(e)),
            };
            if let Err(e) = result {
                warn!(
                    "Conversion '{}' of media item {} leaked at {}:{}: {:#}",
                    conversion.name, conversion.media_item_id, conversion.disk, conversion.path, e
                );
            }
        }
    }
}
