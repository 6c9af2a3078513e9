use crate::config::MediaConfig;
use crate::services::storage::{Disks, LocalDiskStore, S3BlobStore};
use aws_sdk_s3::config::Region;
use std::env;
use std::sync::Arc;
use tracing::{info, warn};

/// Root directory and public base URL of the local `public` disk
pub fn local_disk_settings() -> (String, String) {
    let root = env::var("MEDIA_LOCAL_ROOT").unwrap_or_else(|_| "./storage".to_string());
    let public_url =
        env::var("MEDIA_PUBLIC_URL").unwrap_or_else(|_| "http://localhost:3000/storage".to_string());
    (root, public_url)
}

/// Build the disk registry: always a local `public` disk, plus an `s3` disk
/// when MinIO credentials are present.
pub async fn setup_disks(config: &MediaConfig) -> Disks {
    let (root, public_url) = local_disk_settings();
    info!("💾 Local disk 'public': {} ({})", root, public_url);

    let mut disks = Disks::new().with_disk("public", Arc::new(LocalDiskStore::new(root, public_url)));

    if let Some(s3) = setup_s3().await {
        disks = disks.with_disk("s3", Arc::new(s3));
    }

    if disks.get(&config.default_disk).is_err() {
        warn!(
            "⚠️ Default disk '{}' is not configured (available: {:?})",
            config.default_disk,
            disks.names()
        );
    }

    disks
}

async fn setup_s3() -> Option<S3BlobStore> {
    let endpoint_url = env::var("MINIO_ENDPOINT").ok()?;
    let (Ok(access_key), Ok(secret_key)) =
        (env::var("MINIO_ACCESS_KEY"), env::var("MINIO_SECRET_KEY"))
    else {
        warn!("⚠️ MINIO_ENDPOINT set without credentials, skipping 's3' disk");
        return None;
    };
    let bucket = env::var("MINIO_BUCKET").unwrap_or_else(|_| "media".to_string());
    let public_url = env::var("MINIO_PUBLIC_URL").unwrap_or_else(|_| endpoint_url.clone());

    info!("☁️  S3 Storage: {} (Bucket: {})", endpoint_url, bucket);

    let aws_config = aws_config::from_env()
        .endpoint_url(&endpoint_url)
        .region(Region::new("us-east-1"))
        .credentials_provider(aws_sdk_s3::config::Credentials::new(
            access_key, secret_key, None, None, "static",
        ))
        .load()
        .await;

    let s3_config = aws_sdk_s3::config::Builder::from(&aws_config)
        .force_path_style(true)
        .build();

    let s3_client = aws_sdk_s3::Client::from_conf(s3_config);

    match s3_client.head_bucket().bucket(&bucket).send().await {
        Ok(_) => info!("✅ Bucket '{}' is ready", bucket),
        Err(_) => {
            info!("🪣 Bucket '{}' not found, creating...", bucket);
            if let Err(e) = s3_client.create_bucket().bucket(&bucket).send().await {
                tracing::error!("❌ Failed to create bucket '{}': {}", bucket, e);
            } else {
                info!("✅ Bucket '{}' created successfully", bucket);
            }
        }
    }

    Some(S3BlobStore::new(s3_client, bucket, public_url))
}
