mod common;

use bytes::Bytes;
use common::*;
use rust_media_backend::config::MediaConfig;
use rust_media_backend::entities::prelude::*;
use rust_media_backend::error::ErrorKind;
use rust_media_backend::services::upload_service::IncomingFile;
use sea_orm::{ConnectionTrait, EntityTrait, PaginatorTrait, Statement};

fn incoming(name: &str, mime: Option<&str>, data: Vec<u8>) -> IncomingFile {
    IncomingFile {
        original_name: name.to_string(),
        declared_mime: mime.map(str::to_string),
        data: Bytes::from(data),
    }
}

#[tokio::test]
async fn test_disallowed_type_touches_nothing() {
    let h = harness().await;

    let err = h
        .state
        .uploads
        .upload(
            incoming("setup.exe", Some("application/x-msdownload"), vec![0x4d, 0x5a, 0, 0]),
            None,
        )
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Validation);
    assert!(h.store.puts().is_empty());
    assert_eq!(h.store.file_count(), 0);
    assert_eq!(MediaItems::find().count(&h.state.db).await.unwrap(), 0);
}

#[tokio::test]
async fn test_oversized_file_is_rejected() {
    let mut config = MediaConfig::default();
    config.upload.max_file_size_kb = 1;
    let h = harness_with(config, ScriptedTransformer::succeeding()).await;

    let err = h
        .state
        .uploads
        .upload(incoming("notes.txt", Some("text/plain"), vec![b'x'; 2048]), None)
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Validation);
    assert!(h.store.puts().is_empty());
}

#[tokio::test]
async fn test_image_upload_records_everything() {
    let h = harness().await;

    let item = h
        .state
        .uploads
        .upload(
            incoming("Holiday Photo.PNG", Some("image/png"), png_bytes(40, 30)),
            Some("editor-1".to_string()),
        )
        .await
        .unwrap();

    assert_eq!(item.original_name, "Holiday Photo.PNG");
    assert_eq!(item.mime_type, "image/png");
    assert_eq!(item.disk, "public");
    assert_eq!((item.width, item.height), (Some(40), Some(30)));
    assert_eq!(item.created_by.as_deref(), Some("editor-1"));

    // media/images/YYYY/MM/DD/<uuid>.png
    let segments: Vec<&str> = item.path.split('/').collect();
    assert_eq!(segments.len(), 6);
    assert_eq!(&segments[..2], &["media", "images"]);
    assert_eq!(segments[2].len(), 4);
    assert!(segments[5].ends_with(".png"));

    assert_eq!(h.store.puts(), vec![item.path.clone()]);
    assert_eq!(item.size as usize, h.store.get_bytes(&item.path).len());
}

#[tokio::test]
async fn test_generic_type_is_sniffed() {
    let h = harness().await;

    let item = h
        .state
        .uploads
        .upload(
            incoming("blob", Some("application/octet-stream"), png_bytes(8, 8)),
            None,
        )
        .await
        .unwrap();

    assert_eq!(item.mime_type, "image/png");
    assert!(item.path.starts_with("media/images/"));
    assert!(item.path.ends_with(".png"));
}

#[tokio::test]
async fn test_documents_have_no_dimensions() {
    let h = harness().await;

    let item = h
        .state
        .uploads
        .upload(
            incoming("data.csv", Some("text/csv; charset=utf-8"), b"a,b\n1,2\n".to_vec()),
            None,
        )
        .await
        .unwrap();

    assert_eq!(item.mime_type, "text/csv");
    assert!(item.path.starts_with("media/documents/"));
    assert_eq!((item.width, item.height), (None, None));
}

#[tokio::test]
async fn test_storage_failure_creates_no_record() {
    let h = harness().await;
    h.store.fail_puts(true);

    let err = h
        .state
        .uploads
        .upload(incoming("a.png", Some("image/png"), png_bytes(4, 4)), None)
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::StorageIo);
    assert_eq!(MediaItems::find().count(&h.state.db).await.unwrap(), 0);
}

#[tokio::test]
async fn test_failed_insert_removes_stored_file() {
    let h = harness().await;
    let backend = h.state.db.get_database_backend();
    for table in ["media_conversions", "media_usages", "media_items"] {
        h.state
            .db
            .execute(Statement::from_string(
                backend,
                format!("DROP TABLE {}", table),
            ))
            .await
            .unwrap();
    }

    let err = h
        .state
        .uploads
        .upload(incoming("a.png", Some("image/png"), png_bytes(4, 4)), None)
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Database);
    assert_eq!(h.store.puts().len(), 1);
    assert_eq!(h.store.deletes(), h.store.puts());
    assert_eq!(h.store.file_count(), 0);
}

#[tokio::test]
async fn test_batch_limit() {
    let h = harness().await;
    let max = h.state.config.upload.max_files;

    assert!(h.state.uploads.check_batch(1).is_ok());
    assert!(h.state.uploads.check_batch(max).is_ok());
    assert_eq!(
        h.state.uploads.check_batch(max + 1).unwrap_err().kind(),
        ErrorKind::Validation
    );
    assert_eq!(
        h.state.uploads.check_batch(0).unwrap_err().kind(),
        ErrorKind::Validation
    );
}
