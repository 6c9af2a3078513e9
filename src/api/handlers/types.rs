use crate::AppState;
use crate::api::error::AppError;
use crate::entities::{media_items, media_usages};
use crate::services::asset::{AssetLike, Classification};
use crate::services::media_registry::{BlobCleanup, DeleteOutcome};
use chrono::Utc;
use futures::future::try_join_all;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

#[derive(Serialize, ToSchema)]
pub struct MediaItemResponse {
    pub id: String,
    pub url: String,
    pub thumbnail_url: Option<String>,
    pub name: String,
    pub mime_type: String,
    pub size: i64,
    pub formatted_size: String,
    pub width: Option<i32>,
    pub height: Option<i32>,
    pub dimensions: Option<String>,
    pub classification: Classification,
    pub is_image: bool,
    pub is_video: bool,
    pub is_document: bool,
    pub alt: Option<String>,
    pub title: Option<String>,
    pub caption: Option<String>,
    #[schema(value_type = Option<Object>)]
    pub meta: Option<serde_json::Value>,
    pub created_by: Option<String>,
    pub created_at: chrono::DateTime<Utc>,
    pub updated_at: chrono::DateTime<Utc>,
    pub deleted_at: Option<chrono::DateTime<Utc>>,
}

impl MediaItemResponse {
    pub async fn build(state: &AppState, item: media_items::Model) -> Result<Self, AppError> {
        let allowed = &state.config.upload.allowed_mimes;
        let url = state.registry.url(&item)?;
        let thumbnail_url = if item.deleted_at.is_none() {
            state.thumbnails.thumbnail_url(&item).await
        } else {
            None
        };

        Ok(Self {
            url,
            thumbnail_url,
            formatted_size: item.formatted_size(),
            dimensions: item.dimensions(),
            classification: item.classification(allowed),
            is_image: item.is_image(allowed),
            is_video: item.is_video(allowed),
            is_document: item.is_document(allowed),
            id: item.id,
            name: item.original_name,
            mime_type: item.mime_type,
            size: item.size,
            width: item.width,
            height: item.height,
            alt: item.alt,
            title: item.title,
            caption: item.caption,
            meta: item.meta,
            created_by: item.created_by,
            created_at: item.created_at,
            updated_at: item.updated_at,
            deleted_at: item.deleted_at,
        })
    }

    pub async fn build_all(
        state: &AppState,
        items: Vec<media_items::Model>,
    ) -> Result<Vec<Self>, AppError> {
        try_join_all(items.into_iter().map(|item| Self::build(state, item))).await
    }
}

#[derive(Serialize, ToSchema)]
pub struct UploadFailure {
    pub filename: String,
    pub error: String,
}

#[derive(Serialize, ToSchema)]
pub struct UploadResponse {
    pub uploaded: Vec<MediaItemResponse>,
    pub failed: Vec<UploadFailure>,
    pub allowed_types: Vec<String>,
}

#[derive(Serialize, ToSchema)]
pub struct MediaListResponse {
    pub items: Vec<MediaItemResponse>,
    pub total: u64,
    pub page: u64,
    pub per_page: u64,
}

#[derive(Deserialize)]
pub struct ListMediaQuery {
    pub page: Option<u64>,
    /// image, video, document or other
    pub kind: Option<String>,
}

#[derive(Deserialize, ToSchema, Validate)]
pub struct UpdateMediaRequest {
    #[validate(length(max = 255, message = "Alt text must be at most 255 characters"))]
    pub alt: Option<String>,
    #[validate(length(max = 255, message = "Title must be at most 255 characters"))]
    pub title: Option<String>,
    #[validate(length(max = 1000, message = "Caption must be at most 1000 characters"))]
    pub caption: Option<String>,
}

#[derive(Deserialize)]
pub struct DeleteMediaQuery {
    pub force: Option<bool>,
}

#[derive(Serialize, ToSchema)]
pub struct DeleteResponse {
    pub id: String,
    pub usages_removed: u64,
    /// removed, missing or failed
    pub blob_status: String,
    pub blob_error: Option<String>,
}

impl From<DeleteOutcome> for DeleteResponse {
    fn from(outcome: DeleteOutcome) -> Self {
        let (blob_status, blob_error) = match outcome.blob {
            BlobCleanup::Removed => ("removed", None),
            BlobCleanup::Missing => ("missing", None),
            BlobCleanup::Failed(reason) => ("failed", Some(reason)),
        };
        Self {
            id: outcome.id,
            usages_removed: outcome.usages_removed,
            blob_status: blob_status.to_string(),
            blob_error,
        }
    }
}

#[derive(Deserialize)]
pub struct ThumbnailQuery {
    pub conversion: Option<String>,
}

#[derive(Serialize, ToSchema)]
pub struct ThumbnailResponse {
    pub url: Option<String>,
}

#[derive(Deserialize)]
pub struct GroupQuery {
    pub group: Option<String>,
}

#[derive(Deserialize, ToSchema)]
pub struct SyncRequest {
    pub media_ids: Vec<String>,
}

#[derive(Deserialize, ToSchema)]
pub struct AttachRequest {
    pub media_ids: Vec<String>,
    pub start_position: Option<i32>,
}

#[derive(Deserialize, ToSchema)]
pub struct ReorderRequest {
    pub from: usize,
    pub to: usize,
}

#[derive(Serialize, ToSchema)]
pub struct UsageResponse {
    pub id: String,
    pub media_item_id: String,
    pub field_key: String,
    pub group: Option<String>,
    pub position: i32,
}

impl From<media_usages::Model> for UsageResponse {
    fn from(usage: media_usages::Model) -> Self {
        Self {
            id: usage.id,
            media_item_id: usage.media_item_id,
            field_key: usage.field_key,
            group: usage.group_name,
            position: usage.position,
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct DetachResponse {
    pub removed: u64,
}

#[derive(Serialize, ToSchema)]
pub struct SlotSummaryResponse {
    pub count: u64,
    pub exists: bool,
    pub first: Option<MediaItemResponse>,
}
