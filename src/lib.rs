pub mod api;
pub mod config;
pub mod entities;
pub mod error;
pub mod infrastructure;
pub mod services;
pub mod utils;

use crate::config::MediaConfig;
use crate::services::media_registry::MediaRegistry;
use crate::services::storage::Disks;
use crate::services::thumbnail_service::{ImageTransformer, ThumbnailResolver};
use crate::services::upload_service::UploadService;
use crate::services::usage_ledger::UsageLedger;
use axum::{
    Router,
    middleware::from_fn,
    routing::{delete, get, post},
};
use sea_orm::DatabaseConnection;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    paths(
        api::handlers::health::health_check,
        api::handlers::media::upload_media,
        api::handlers::media::list_media,
        api::handlers::media::get_media,
        api::handlers::media::update_media,
        api::handlers::media::delete_media,
        api::handlers::media::restore_media,
        api::handlers::media::get_thumbnail,
        api::handlers::usages::query_slot,
        api::handlers::usages::slot_summary,
        api::handlers::usages::owner_media,
        api::handlers::usages::sync_slot,
        api::handlers::usages::attach_media,
        api::handlers::usages::reorder_slot,
        api::handlers::usages::move_up,
        api::handlers::usages::move_down,
        api::handlers::usages::detach_slot,
        api::handlers::usages::detach_media,
    ),
    components(
        schemas(
            api::handlers::health::HealthResponse,
            api::handlers::health::DiskStatus,
            api::handlers::types::MediaItemResponse,
            api::handlers::types::UploadResponse,
            api::handlers::types::UploadFailure,
            api::handlers::types::MediaListResponse,
            api::handlers::types::UpdateMediaRequest,
            api::handlers::types::DeleteResponse,
            api::handlers::types::ThumbnailResponse,
            api::handlers::types::SyncRequest,
            api::handlers::types::AttachRequest,
            api::handlers::types::ReorderRequest,
            api::handlers::types::UsageResponse,
            api::handlers::types::DetachResponse,
            api::handlers::types::SlotSummaryResponse,
            services::asset::Classification,
            error::ErrorKind,
        )
    ),
    tags(
        (name = "media", description = "Media library endpoints"),
        (name = "usages", description = "Attaching media to owner entities"),
        (name = "system", description = "Service health")
    )
)]
pub struct ApiDoc;

#[derive(Clone)]
pub struct AppState {
    pub db: DatabaseConnection,
    pub disks: Disks,
    pub config: Arc<MediaConfig>,
    pub registry: Arc<MediaRegistry>,
    pub ledger: Arc<UsageLedger>,
    pub thumbnails: Arc<ThumbnailResolver>,
    pub uploads: Arc<UploadService>,
}

impl AppState {
    /// Wire every service from one connection, disk set and configuration
    pub fn new(
        db: DatabaseConnection,
        disks: Disks,
        config: MediaConfig,
        transformer: Arc<dyn ImageTransformer>,
    ) -> Self {
        let config = Arc::new(config);
        let registry = Arc::new(MediaRegistry::new(
            db.clone(),
            disks.clone(),
            config.clone(),
        ));
        let ledger = Arc::new(UsageLedger::new(db.clone()));
        let thumbnails = Arc::new(ThumbnailResolver::new(
            db.clone(),
            disks.clone(),
            config.clone(),
            transformer,
        ));
        let uploads = Arc::new(UploadService::new(
            registry.clone(),
            disks.clone(),
            config.clone(),
        ));

        Self {
            db,
            disks,
            config,
            registry,
            ledger,
            thumbnails,
            uploads,
        }
    }
}

pub fn create_app(state: AppState) -> Router {
    let upload = &state.config.upload;
    let body_limit = (upload.max_file_size_bytes() as usize)
        .saturating_mul(upload.max_files.max(1))
        .saturating_add(10 * 1024 * 1024); // multipart overhead

    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .route("/health", get(api::handlers::health::health_check))
        .route(
            "/media",
            get(api::handlers::media::list_media).post(api::handlers::media::upload_media),
        )
        .route(
            "/media/:id",
            get(api::handlers::media::get_media)
                .patch(api::handlers::media::update_media)
                .delete(api::handlers::media::delete_media),
        )
        .route(
            "/media/:id/restore",
            post(api::handlers::media::restore_media),
        )
        .route(
            "/media/:id/thumbnail",
            get(api::handlers::media::get_thumbnail),
        )
        .route(
            "/usages/:owner_type/:owner_id",
            get(api::handlers::usages::owner_media),
        )
        .route(
            "/usages/:owner_type/:owner_id/:field_key",
            get(api::handlers::usages::query_slot)
                .put(api::handlers::usages::sync_slot)
                .delete(api::handlers::usages::detach_slot),
        )
        .route(
            "/usages/:owner_type/:owner_id/:field_key/summary",
            get(api::handlers::usages::slot_summary),
        )
        .route(
            "/usages/:owner_type/:owner_id/:field_key/attach",
            post(api::handlers::usages::attach_media),
        )
        .route(
            "/usages/:owner_type/:owner_id/:field_key/reorder",
            post(api::handlers::usages::reorder_slot),
        )
        .route(
            "/usages/:owner_type/:owner_id/:field_key/items/:media_id",
            delete(api::handlers::usages::detach_media),
        )
        .route(
            "/usages/:owner_type/:owner_id/:field_key/items/:media_id/move-up",
            post(api::handlers::usages::move_up),
        )
        .route(
            "/usages/:owner_type/:owner_id/:field_key/items/:media_id/move-down",
            post(api::handlers::usages::move_down),
        )
        .layer(from_fn(api::middleware::request_id::request_id_middleware))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any)
                .expose_headers(Any),
        )
        .layer(axum::extract::DefaultBodyLimit::max(body_limit))
        .with_state(state)
}
