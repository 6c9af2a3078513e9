use crate::AppState;
use crate::api::error::AppError;
use crate::error::MediaError;
use crate::services::asset::Classification;
use crate::services::media_registry::MediaDetails;
use crate::services::upload_service::IncomingFile;
use axum::{
    Json,
    extract::{Multipart, Path, Query, State, multipart::MultipartError},
    http::StatusCode,
};
use validator::Validate;

use super::types::*;

fn multipart_error(e: MultipartError) -> AppError {
    let err_msg = e.to_string();
    if err_msg.contains("length limit exceeded") {
        AppError::PayloadTooLarge("Request body exceeds the maximum allowed limit".to_string())
    } else {
        AppError::BadRequest(err_msg)
    }
}

#[utoipa::path(
    post,
    path = "/media",
    request_body(content = Multipart, description = "One or more `file` parts and an optional `created_by` field"),
    responses(
        (status = 201, description = "At least one file stored", body = UploadResponse),
        (status = 413, description = "Request body too large"),
        (status = 422, description = "Every file was rejected")
    ),
    tag = "media"
)]
pub async fn upload_media(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<UploadResponse>), AppError> {
    let mut files = Vec::new();
    let mut created_by: Option<String> = None;

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().unwrap_or_default().to_string();

        match name.as_str() {
            "file" | "files" | "files[]" => {
                state.uploads.check_batch(files.len() + 1)?;
                let original_name = field.file_name().unwrap_or("unnamed").to_string();
                let declared_mime = field.content_type().map(|s| s.to_string());
                let data = field.bytes().await.map_err(multipart_error)?;
                files.push(IncomingFile {
                    original_name,
                    declared_mime,
                    data,
                });
            }
            "created_by" => {
                let text = field.text().await.map_err(multipart_error)?;
                if !text.trim().is_empty() {
                    created_by = Some(text.trim().to_string());
                }
            }
            _ => {}
        }
    }

    state.uploads.check_batch(files.len())?;

    let allowed_types = state.config.upload.allowed_mimes.all();
    let mut uploaded = Vec::new();
    let mut failed = Vec::new();
    let mut first_error: Option<MediaError> = None;

    for file in files {
        let filename = file.original_name.clone();
        match state.uploads.upload(file, created_by.clone()).await {
            Ok(item) => uploaded.push(MediaItemResponse::build(&state, item).await?),
            Err(e) => {
                failed.push(UploadFailure {
                    filename,
                    error: e.to_string(),
                });
                first_error.get_or_insert(e);
            }
        }
    }

    if uploaded.is_empty() {
        if let Some(e) = first_error {
            return Err(match e {
                MediaError::Validation(message) => AppError::Rejected {
                    message,
                    allowed_types,
                },
                other => AppError::Media(other),
            });
        }
    }

    Ok((
        StatusCode::CREATED,
        Json(UploadResponse {
            uploaded,
            failed,
            allowed_types,
        }),
    ))
}

#[utoipa::path(
    get,
    path = "/media",
    params(
        ("page" = Option<u64>, Query, description = "1-based page number"),
        ("kind" = Option<String>, Query, description = "image, video, document or other")
    ),
    responses(
        (status = 200, description = "Newest media items first", body = MediaListResponse),
        (status = 400, description = "Unknown kind")
    ),
    tag = "media"
)]
pub async fn list_media(
    State(state): State<AppState>,
    Query(query): Query<ListMediaQuery>,
) -> Result<Json<MediaListResponse>, AppError> {
    let kind = query
        .kind
        .filter(|k| !k.is_empty())
        .map(|k| k.parse::<Classification>())
        .transpose()
        .map_err(AppError::BadRequest)?;

    let page = state.registry.list(query.page.unwrap_or(1), kind).await?;

    Ok(Json(MediaListResponse {
        items: MediaItemResponse::build_all(&state, page.items).await?,
        total: page.total,
        page: page.page,
        per_page: page.per_page,
    }))
}

#[utoipa::path(
    get,
    path = "/media/{id}",
    params(("id" = String, Path, description = "Media item id")),
    responses(
        (status = 200, description = "Media item", body = MediaItemResponse),
        (status = 404, description = "Not found or deleted")
    ),
    tag = "media"
)]
pub async fn get_media(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<MediaItemResponse>, AppError> {
    let item = state.registry.find(&id).await?;
    Ok(Json(MediaItemResponse::build(&state, item).await?))
}

#[utoipa::path(
    patch,
    path = "/media/{id}",
    params(("id" = String, Path, description = "Media item id")),
    request_body = UpdateMediaRequest,
    responses(
        (status = 200, description = "Updated media item", body = MediaItemResponse),
        (status = 404, description = "Not found"),
        (status = 422, description = "Field too long")
    ),
    tag = "media"
)]
pub async fn update_media(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<UpdateMediaRequest>,
) -> Result<Json<MediaItemResponse>, AppError> {
    req.validate()
        .map_err(|e| MediaError::Validation(e.to_string()))?;

    let item = state
        .registry
        .update_details(
            &id,
            MediaDetails {
                alt: req.alt,
                title: req.title,
                caption: req.caption,
            },
        )
        .await?;

    Ok(Json(MediaItemResponse::build(&state, item).await?))
}

#[utoipa::path(
    delete,
    path = "/media/{id}",
    params(
        ("id" = String, Path, description = "Media item id"),
        ("force" = Option<bool>, Query, description = "Permanently remove the record")
    ),
    responses(
        (status = 200, description = "Deleted; blob_status reports what happened to the file", body = DeleteResponse),
        (status = 404, description = "Not found"),
        (status = 500, description = "Deletion failed")
    ),
    tag = "media"
)]
pub async fn delete_media(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<DeleteMediaQuery>,
) -> Result<Json<DeleteResponse>, AppError> {
    let outcome = if query.force.unwrap_or(false) {
        state.registry.force_delete(&id).await?
    } else {
        state.registry.delete(&id).await?
    };
    state.thumbnails.forget(&id);

    Ok(Json(outcome.into()))
}

#[utoipa::path(
    post,
    path = "/media/{id}/restore",
    params(("id" = String, Path, description = "Media item id")),
    responses(
        (status = 200, description = "Restored record (its file stays deleted)", body = MediaItemResponse),
        (status = 404, description = "Not found")
    ),
    tag = "media"
)]
pub async fn restore_media(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<MediaItemResponse>, AppError> {
    let item = state.registry.restore(&id).await?;
    Ok(Json(MediaItemResponse::build(&state, item).await?))
}

#[utoipa::path(
    get,
    path = "/media/{id}/thumbnail",
    params(
        ("id" = String, Path, description = "Media item id"),
        ("conversion" = Option<String>, Query, description = "Conversion name, defaults to thumb")
    ),
    responses(
        (status = 200, description = "Thumbnail URL, null for non-images", body = ThumbnailResponse),
        (status = 404, description = "Not found")
    ),
    tag = "media"
)]
pub async fn get_thumbnail(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<ThumbnailQuery>,
) -> Result<Json<ThumbnailResponse>, AppError> {
    let item = state.registry.find(&id).await?;
    let url = match query.conversion.as_deref().filter(|c| !c.is_empty()) {
        Some(conversion) => state.thumbnails.conversion_url(&item, conversion).await,
        None => state.thumbnails.thumbnail_url(&item).await,
    };
    Ok(Json(ThumbnailResponse { url }))
}
