use crate::AppState;
use crate::services::storage::BlobStore;
use axum::{Json, extract::State, http::StatusCode};
use serde::Serialize;
use utoipa::ToSchema;

#[derive(Serialize, ToSchema)]
pub struct DiskStatus {
    pub name: String,
    pub default: bool,
    pub reachable: bool,
}

#[derive(Serialize, ToSchema)]
pub struct HealthResponse {
    /// ok, or degraded when the database or the default disk is unavailable
    pub status: String,
    pub database: String,
    pub disks: Vec<DiskStatus>,
    /// Live (not deleted) media items, absent when the database is down
    pub media_items: Option<u64>,
    pub thumbnails_enabled: bool,
    pub version: String,
}

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Media library is serving", body = HealthResponse),
        (status = 503, description = "Database or default disk unavailable", body = HealthResponse)
    ),
    tag = "system"
)]
pub async fn health_check(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let db_up = state.db.ping().await.is_ok();
    let media_items = if db_up {
        state.registry.list(1, None).await.ok().map(|page| page.total)
    } else {
        None
    };

    let mut disks = Vec::new();
    for name in state.disks.names() {
        // A missing marker object is fine; only transport errors count
        let reachable = match state.disks.get(&name) {
            Ok(store) => store.exists(".health").await.is_ok(),
            Err(_) => false,
        };
        disks.push(DiskStatus {
            default: name == state.config.default_disk,
            name,
            reachable,
        });
    }

    let default_ok = disks.iter().any(|d| d.default && d.reachable);
    let healthy = db_up && default_ok;

    let status = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status,
        Json(HealthResponse {
            status: if healthy { "ok" } else { "degraded" }.to_string(),
            database: if db_up { "connected" } else { "disconnected" }.to_string(),
            disks,
            media_items,
            thumbnails_enabled: state.config.thumbnails.enabled,
            version: env!("CARGO_PKG_VERSION").to_string(),
        }),
    )
}
