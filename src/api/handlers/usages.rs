use crate::AppState;
use crate::api::error::AppError;
use crate::error::MediaError;
use crate::services::usage_ledger::{OwnerRef, Slot};
use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use std::collections::BTreeMap;

use super::types::*;

fn slot_of(owner_type: String, owner_id: String, field_key: String, query: GroupQuery) -> Slot {
    Slot::new(owner_type, owner_id, field_key).with_group(query.group)
}

#[utoipa::path(
    get,
    path = "/usages/{owner_type}/{owner_id}/{field_key}",
    params(
        ("owner_type" = String, Path, description = "Owner entity type"),
        ("owner_id" = String, Path, description = "Owner entity id"),
        ("field_key" = String, Path, description = "Attachment point on the owner"),
        ("group" = Option<String>, Query, description = "Restrict to one group")
    ),
    responses((status = 200, description = "Attached media in position order", body = Vec<MediaItemResponse>)),
    tag = "usages"
)]
pub async fn query_slot(
    State(state): State<AppState>,
    Path((owner_type, owner_id, field_key)): Path<(String, String, String)>,
    Query(group): Query<GroupQuery>,
) -> Result<Json<Vec<MediaItemResponse>>, AppError> {
    let slot = slot_of(owner_type, owner_id, field_key, group);
    let items = state.ledger.query(&slot).await?;
    Ok(Json(MediaItemResponse::build_all(&state, items).await?))
}

#[utoipa::path(
    get,
    path = "/usages/{owner_type}/{owner_id}/{field_key}/summary",
    params(
        ("owner_type" = String, Path, description = "Owner entity type"),
        ("owner_id" = String, Path, description = "Owner entity id"),
        ("field_key" = String, Path, description = "Attachment point on the owner"),
        ("group" = Option<String>, Query, description = "Restrict to one group")
    ),
    responses((status = 200, description = "Count, existence and first item of the slot", body = SlotSummaryResponse)),
    tag = "usages"
)]
pub async fn slot_summary(
    State(state): State<AppState>,
    Path((owner_type, owner_id, field_key)): Path<(String, String, String)>,
    Query(group): Query<GroupQuery>,
) -> Result<Json<SlotSummaryResponse>, AppError> {
    let slot = slot_of(owner_type, owner_id, field_key, group);
    let count = state.ledger.count(&slot).await?;
    let exists = state.ledger.exists(&slot).await?;
    let first = match state.ledger.first(&slot).await? {
        Some(item) => Some(MediaItemResponse::build(&state, item).await?),
        None => None,
    };

    Ok(Json(SlotSummaryResponse {
        count,
        exists,
        first,
    }))
}

#[utoipa::path(
    get,
    path = "/usages/{owner_type}/{owner_id}",
    params(
        ("owner_type" = String, Path, description = "Owner entity type"),
        ("owner_id" = String, Path, description = "Owner entity id"),
        ("group" = Option<String>, Query, description = "Restrict to one group")
    ),
    responses((status = 200, description = "Owner's media keyed by field")),
    tag = "usages"
)]
pub async fn owner_media(
    State(state): State<AppState>,
    Path((owner_type, owner_id)): Path<(String, String)>,
    Query(group): Query<GroupQuery>,
) -> Result<Json<BTreeMap<String, Vec<MediaItemResponse>>>, AppError> {
    let owner = OwnerRef::new(owner_type, owner_id);
    let group = group.group.filter(|g| !g.is_empty());
    let fields = state.ledger.by_field(&owner, group.as_deref()).await?;

    let mut out = BTreeMap::new();
    for (field, items) in fields {
        out.insert(field, MediaItemResponse::build_all(&state, items).await?);
    }
    Ok(Json(out))
}

#[utoipa::path(
    put,
    path = "/usages/{owner_type}/{owner_id}/{field_key}",
    params(
        ("owner_type" = String, Path, description = "Owner entity type"),
        ("owner_id" = String, Path, description = "Owner entity id"),
        ("field_key" = String, Path, description = "Attachment point on the owner"),
        ("group" = Option<String>, Query, description = "Group to replace")
    ),
    request_body = SyncRequest,
    responses(
        (status = 200, description = "Slot contents after replacement", body = Vec<MediaItemResponse>),
        (status = 404, description = "A media id does not exist; nothing changed")
    ),
    tag = "usages"
)]
pub async fn sync_slot(
    State(state): State<AppState>,
    Path((owner_type, owner_id, field_key)): Path<(String, String, String)>,
    Query(group): Query<GroupQuery>,
    Json(req): Json<SyncRequest>,
) -> Result<Json<Vec<MediaItemResponse>>, AppError> {
    let slot = slot_of(owner_type, owner_id, field_key, group);
    state.ledger.sync(&slot, &req.media_ids).await?;
    let items = state.ledger.query(&slot).await?;
    Ok(Json(MediaItemResponse::build_all(&state, items).await?))
}

#[utoipa::path(
    post,
    path = "/usages/{owner_type}/{owner_id}/{field_key}/attach",
    params(
        ("owner_type" = String, Path, description = "Owner entity type"),
        ("owner_id" = String, Path, description = "Owner entity id"),
        ("field_key" = String, Path, description = "Attachment point on the owner"),
        ("group" = Option<String>, Query, description = "Group for the new links")
    ),
    request_body = AttachRequest,
    responses(
        (status = 201, description = "Created usages", body = Vec<UsageResponse>),
        (status = 404, description = "A media id does not exist"),
        (status = 409, description = "A target position is already occupied")
    ),
    tag = "usages"
)]
pub async fn attach_media(
    State(state): State<AppState>,
    Path((owner_type, owner_id, field_key)): Path<(String, String, String)>,
    Query(group): Query<GroupQuery>,
    Json(req): Json<AttachRequest>,
) -> Result<(StatusCode, Json<Vec<UsageResponse>>), AppError> {
    let slot = slot_of(owner_type, owner_id, field_key, group);

    let mut items = Vec::with_capacity(req.media_ids.len());
    for id in &req.media_ids {
        items.push(state.registry.find(id).await?);
    }

    let created = state
        .ledger
        .attach(&slot, &items, req.start_position)
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(created.into_iter().map(UsageResponse::from).collect()),
    ))
}

#[utoipa::path(
    post,
    path = "/usages/{owner_type}/{owner_id}/{field_key}/reorder",
    params(
        ("owner_type" = String, Path, description = "Owner entity type"),
        ("owner_id" = String, Path, description = "Owner entity id"),
        ("field_key" = String, Path, description = "Attachment point on the owner"),
        ("group" = Option<String>, Query, description = "Group to reorder")
    ),
    request_body = ReorderRequest,
    responses(
        (status = 200, description = "Slot contents after the move", body = Vec<MediaItemResponse>),
        (status = 400, description = "Index out of range")
    ),
    tag = "usages"
)]
pub async fn reorder_slot(
    State(state): State<AppState>,
    Path((owner_type, owner_id, field_key)): Path<(String, String, String)>,
    Query(group): Query<GroupQuery>,
    Json(req): Json<ReorderRequest>,
) -> Result<Json<Vec<MediaItemResponse>>, AppError> {
    let slot = slot_of(owner_type, owner_id, field_key, group);
    let items = state.ledger.reorder(&slot, req.from, req.to).await?;
    Ok(Json(MediaItemResponse::build_all(&state, items).await?))
}

#[utoipa::path(
    post,
    path = "/usages/{owner_type}/{owner_id}/{field_key}/items/{media_id}/move-up",
    params(
        ("owner_type" = String, Path, description = "Owner entity type"),
        ("owner_id" = String, Path, description = "Owner entity id"),
        ("field_key" = String, Path, description = "Attachment point on the owner"),
        ("media_id" = String, Path, description = "Media item to move"),
        ("group" = Option<String>, Query, description = "Group to reorder")
    ),
    responses(
        (status = 200, description = "Slot contents after the move", body = Vec<MediaItemResponse>),
        (status = 404, description = "Media item is not in the slot")
    ),
    tag = "usages"
)]
pub async fn move_up(
    State(state): State<AppState>,
    Path((owner_type, owner_id, field_key, media_id)): Path<(String, String, String, String)>,
    Query(group): Query<GroupQuery>,
) -> Result<Json<Vec<MediaItemResponse>>, AppError> {
    let slot = slot_of(owner_type, owner_id, field_key, group);
    let items = state.ledger.move_up(&slot, &media_id).await?;
    Ok(Json(MediaItemResponse::build_all(&state, items).await?))
}

#[utoipa::path(
    post,
    path = "/usages/{owner_type}/{owner_id}/{field_key}/items/{media_id}/move-down",
    params(
        ("owner_type" = String, Path, description = "Owner entity type"),
        ("owner_id" = String, Path, description = "Owner entity id"),
        ("field_key" = String, Path, description = "Attachment point on the owner"),
        ("media_id" = String, Path, description = "Media item to move"),
        ("group" = Option<String>, Query, description = "Group to reorder")
    ),
    responses(
        (status = 200, description = "Slot contents after the move", body = Vec<MediaItemResponse>),
        (status = 404, description = "Media item is not in the slot")
    ),
    tag = "usages"
)]
pub async fn move_down(
    State(state): State<AppState>,
    Path((owner_type, owner_id, field_key, media_id)): Path<(String, String, String, String)>,
    Query(group): Query<GroupQuery>,
) -> Result<Json<Vec<MediaItemResponse>>, AppError> {
    let slot = slot_of(owner_type, owner_id, field_key, group);
    let items = state.ledger.move_down(&slot, &media_id).await?;
    Ok(Json(MediaItemResponse::build_all(&state, items).await?))
}

#[utoipa::path(
    delete,
    path = "/usages/{owner_type}/{owner_id}/{field_key}",
    params(
        ("owner_type" = String, Path, description = "Owner entity type"),
        ("owner_id" = String, Path, description = "Owner entity id"),
        ("field_key" = String, Path, description = "Attachment point on the owner"),
        ("group" = Option<String>, Query, description = "Only clear this group")
    ),
    responses((status = 200, description = "Number of usages removed", body = DetachResponse)),
    tag = "usages"
)]
pub async fn detach_slot(
    State(state): State<AppState>,
    Path((owner_type, owner_id, field_key)): Path<(String, String, String)>,
    Query(group): Query<GroupQuery>,
) -> Result<Json<DetachResponse>, AppError> {
    let slot = slot_of(owner_type, owner_id, field_key, group);
    let removed = state.ledger.detach(&slot).await?;
    Ok(Json(DetachResponse { removed }))
}

#[utoipa::path(
    delete,
    path = "/usages/{owner_type}/{owner_id}/{field_key}/items/{media_id}",
    params(
        ("owner_type" = String, Path, description = "Owner entity type"),
        ("owner_id" = String, Path, description = "Owner entity id"),
        ("field_key" = String, Path, description = "Attachment point on the owner"),
        ("media_id" = String, Path, description = "Media item to detach"),
        ("group" = Option<String>, Query, description = "Only detach from this group")
    ),
    responses(
        (status = 200, description = "Usage removed", body = DetachResponse),
        (status = 404, description = "Media item is not in the slot")
    ),
    tag = "usages"
)]
pub async fn detach_media(
    State(state): State<AppState>,
    Path((owner_type, owner_id, field_key, media_id)): Path<(String, String, String, String)>,
    Query(group): Query<GroupQuery>,
) -> Result<Json<DetachResponse>, AppError> {
    let slot = slot_of(owner_type, owner_id, field_key, group);
    let removed = state.ledger.detach_one(&slot, &media_id).await?;
    if removed == 0 {
        return Err(MediaError::NotFound(format!(
            "Media item {} is not attached to this slot",
            media_id
        ))
        .into());
    }
    Ok(Json(DetachResponse { removed }))
}
