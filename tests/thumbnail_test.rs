mod common;

use common::*;
use rust_media_backend::config::MediaConfig;
use rust_media_backend::entities::{media_conversions, prelude::*};
use sea_orm::{ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter};
use std::time::Duration;

fn original_url(path: &str) -> String {
    format!("{}/{}", BASE_URL, path)
}

#[tokio::test]
async fn test_non_image_has_no_thumbnail() {
    let h = harness().await;
    let pdf = h.seed_item("report.pdf", "application/pdf").await;

    assert_eq!(h.state.thumbnails.thumbnail_url(&pdf).await, None);
    assert_eq!(h.transformer.calls(), 0);
}

#[tokio::test]
async fn test_failed_transform_falls_back_to_original() {
    let h = harness_with(MediaConfig::default(), ScriptedTransformer::failing()).await;
    let item = h.seed_image("photo.png").await;

    let url = h.state.thumbnails.thumbnail_url(&item).await;
    assert_eq!(url, Some(original_url(&item.path)));
    assert_eq!(
        MediaConversions::find().count(&h.state.db).await.unwrap(),
        0
    );
}

#[tokio::test]
async fn test_generated_thumbnail_is_stored_and_cached() {
    let h = harness().await;
    let item = h.seed_image("photo.png").await;
    let expected_path = format!("media/thumbnails/thumb/{}.jpg", item.id);

    let url = h.state.thumbnails.thumbnail_url(&item).await;
    assert_eq!(url, Some(original_url(&expected_path)));
    assert!(h.store.contains(&expected_path));

    let again = h.state.thumbnails.thumbnail_url(&item).await;
    assert_eq!(again, url);
    assert_eq!(h.transformer.calls(), 1);

    let stored = MediaConversions::find()
        .filter(media_conversions::Column::MediaItemId.eq(item.id.as_str()))
        .all(&h.state.db)
        .await
        .unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].name, "thumb");
    assert_eq!(stored[0].path, expected_path);
}

#[tokio::test]
async fn test_stored_conversion_is_reused_without_cache() {
    let mut config = MediaConfig::default();
    config.cache.enabled = false;
    let h = harness_with(config, ScriptedTransformer::succeeding()).await;
    let item = h.seed_image("photo.png").await;

    let first = h.state.thumbnails.thumbnail_url(&item).await;
    let second = h.state.thumbnails.thumbnail_url(&item).await;

    assert_eq!(first, second);
    assert_eq!(h.transformer.calls(), 1);
}

#[tokio::test]
async fn test_disabled_generation_returns_original() {
    let mut config = MediaConfig::default();
    config.thumbnails.enabled = false;
    let h = harness_with(config, ScriptedTransformer::succeeding()).await;
    let item = h.seed_image("photo.png").await;

    assert_eq!(
        h.state.thumbnails.thumbnail_url(&item).await,
        Some(original_url(&item.path))
    );
    assert_eq!(h.transformer.calls(), 0);
}

#[tokio::test]
async fn test_slow_transform_times_out_to_original() {
    let mut config = MediaConfig::default();
    config.thumbnails.timeout = Duration::from_millis(50);
    let h = harness_with(config, ScriptedTransformer::slow(Duration::from_millis(500))).await;
    let item = h.seed_image("photo.png").await;

    assert_eq!(
        h.state.thumbnails.thumbnail_url(&item).await,
        Some(original_url(&item.path))
    );
}

#[tokio::test]
async fn test_concurrent_requests_share_one_generation() {
    let h = harness_with(
        MediaConfig::default(),
        ScriptedTransformer::slow(Duration::from_millis(100)),
    )
    .await;
    let item = h.seed_image("photo.png").await;

    let mut handles = Vec::new();
    for _ in 0..8 {
        let thumbnails = h.state.thumbnails.clone();
        let item = item.clone();
        handles.push(tokio::spawn(async move {
            thumbnails.thumbnail_url(&item).await
        }));
    }

    let mut urls = Vec::new();
    for handle in handles {
        urls.push(handle.await.unwrap());
    }

    assert_eq!(h.transformer.calls(), 1);
    assert!(urls.iter().all(|u| u == &urls[0]));
    assert!(urls[0].as_deref().unwrap().contains("/thumbnails/thumb/"));
}

#[tokio::test]
async fn test_named_conversions_use_their_own_size() {
    let h = harness().await;
    let item = h.seed_image("photo.png").await;

    let url = h
        .state
        .thumbnails
        .conversion_url(&item, "large")
        .await
        .unwrap();
    let path = format!("media/thumbnails/large/{}.jpg", item.id);
    assert_eq!(url, original_url(&path));
    assert_eq!(h.store.get_bytes(&path), b"600x600".to_vec());

    // Unknown conversion names degrade to the original
    assert_eq!(
        h.state.thumbnails.conversion_url(&item, "poster").await,
        Some(original_url(&item.path))
    );
}

#[tokio::test]
async fn test_generate_all_respects_force() {
    let h = harness().await;
    h.seed_images(&["a.png", "b.png"]).await;
    h.seed_item("doc.pdf", "application/pdf").await;

    let report = h.state.thumbnails.generate_all(false).await.unwrap();
    assert_eq!((report.generated, report.skipped, report.failed), (2, 0, 0));

    let report = h.state.thumbnails.generate_all(false).await.unwrap();
    assert_eq!((report.generated, report.skipped, report.failed), (0, 2, 0));

    let report = h.state.thumbnails.generate_all(true).await.unwrap();
    assert_eq!((report.generated, report.skipped, report.failed), (2, 0, 0));
    assert_eq!(
        MediaConversions::find().count(&h.state.db).await.unwrap(),
        2
    );
}

#[tokio::test]
async fn test_generate_all_counts_failures() {
    let h = harness_with(MediaConfig::default(), ScriptedTransformer::failing()).await;
    h.seed_images(&["a.png", "b.png"]).await;

    let report = h.state.thumbnails.generate_all(false).await.unwrap();
    assert_eq!((report.generated, report.failed), (0, 2));
}

#[tokio::test]
async fn test_delete_removes_conversions() {
    let h = harness().await;
    let item = h.seed_image("photo.png").await;
    h.state.thumbnails.thumbnail_url(&item).await;
    let thumb_path = format!("media/thumbnails/thumb/{}.jpg", item.id);
    assert!(h.store.contains(&thumb_path));

    h.state.registry.delete(&item.id).await.unwrap();
    h.state.thumbnails.forget(&item.id);

    assert!(!h.store.contains(&thumb_path));
    assert_eq!(
        MediaConversions::find().count(&h.state.db).await.unwrap(),
        0
    );
}
