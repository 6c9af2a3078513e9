use clap::Parser;
use dotenvy::dotenv;
use rust_media_backend::config::MediaConfig;
use rust_media_backend::infrastructure::{database, storage};
use rust_media_backend::services::thumbnail_service::RasterTransformer;
use rust_media_backend::{AppState, create_app};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// What to run (serve, generate-thumbnails)
    #[arg(short, long, default_value = "serve")]
    mode: String,

    /// Port for the API server
    #[arg(short, long, default_value_t = 3000)]
    port: u16,

    /// Regenerate conversions that already exist (generate-thumbnails)
    #[arg(long)]
    force: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Environment & logging
    dotenv().ok();
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "rust_media_backend=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("🚀 Starting Rust Media Backend [Mode: {}]...", args.mode);

    // 2. Common infrastructure
    let config = MediaConfig::from_env();
    info!(
        "🖼️  Media Config: Disk={}, Max Size={}KB, Max Files={}, Thumbnails={}, Cache={}",
        config.default_disk,
        config.upload.max_file_size_kb,
        config.upload.max_files,
        config.thumbnails.enabled,
        config.cache.enabled
    );

    let db = database::setup_database().await?;
    let disks = storage::setup_disks(&config).await;
    let state = AppState::new(db, disks, config, Arc::new(RasterTransformer));

    match args.mode.as_str() {
        "generate-thumbnails" => {
            let report = state.thumbnails.generate_all(args.force).await?;
            info!(
                "✅ Thumbnails: {} generated, {} skipped, {} failed",
                report.generated, report.skipped, report.failed
            );
            Ok(())
        }
        "serve" => serve(state, args.port).await,
        other => anyhow::bail!("Unknown mode '{}' (expected serve or generate-thumbnails)", other),
    }
}

async fn serve(state: AppState, port: u16) -> anyhow::Result<()> {
    let trace_layer = TraceLayer::new_for_http()
        .make_span_with(|request: &axum::http::Request<_>| {
            let request_id = request
                .headers()
                .get("x-request-id")
                .and_then(|v| v.to_str().ok())
                .unwrap_or("unknown");
            tracing::info_span!(
                "http_request",
                method = %request.method(),
                uri = %request.uri(),
                request_id = %request_id,
            )
        })
        .on_request(|request: &axum::http::Request<_>, _span: &tracing::Span| {
            info!("📥 {} {}", request.method(), request.uri());
        })
        .on_response(
            |response: &axum::http::Response<_>,
             latency: std::time::Duration,
             _span: &tracing::Span| {
                info!(
                    "📤 Finished in {:?} with status {}",
                    latency,
                    response.status()
                );
            },
        );

    let (local_root, _) = storage::local_disk_settings();
    let app = create_app(state)
        .nest_service("/storage", ServeDir::new(local_root))
        .layer(trace_layer);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;

    info!("✅ API Server listening on: http://0.0.0.0:{}", port);
    info!("📖 Swagger UI documentation: http://localhost:{}/swagger-ui", port);

    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        error!("❌ Server runtime error: {}", e);
    }

    info!("👋 Backend exited cleanly.");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("⌨️  Ctrl+C received, initiating graceful shutdown...");
        },
        _ = terminate => {
            info!("💤 SIGTERM received, initiating graceful shutdown...");
        },
    }
}
