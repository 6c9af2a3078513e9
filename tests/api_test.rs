mod common;

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode},
};
use common::*;
use http_body_util::BodyExt;
use rust_media_backend::config::MediaConfig;
use rust_media_backend::create_app;
use serde_json::{Value, json};
use tower::ServiceExt;

const BOUNDARY: &str = "----MediaTestBoundary";

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let body = response.into_body().collect().await.unwrap().to_bytes();
    let value = if body.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&body).unwrap()
    };
    (status, value)
}

fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("Content-Type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn empty_request(method: &str, uri: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

fn upload_request(files: &[(&str, &str, &[u8])]) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/media")
        .header(
            "Content-Type",
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .body(Body::from(multipart_body(BOUNDARY, files)))
        .unwrap()
}

fn id_list(value: &Value) -> Vec<String> {
    value
        .as_array()
        .unwrap()
        .iter()
        .map(|v| v["id"].as_str().unwrap().to_string())
        .collect()
}

#[tokio::test]
async fn test_health_and_request_id() {
    let h = harness().await;
    let app = create_app(h.state.clone());

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/health")
                .header("x-request-id", "req-123")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["x-request-id"], "req-123");

    h.seed_image("a.png").await;
    let (_, body) = send(&app, empty_request("GET", "/health")).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["database"], "connected");
    assert_eq!(
        body["disks"],
        json!([{ "name": "public", "default": true, "reachable": true }])
    );
    assert_eq!(body["media_items"], 1);
}

#[tokio::test]
async fn test_health_degrades_without_default_disk() {
    let mut config = MediaConfig::default();
    config.default_disk = "s3".to_string();
    let h = harness_with(config, ScriptedTransformer::succeeding()).await;
    let app = create_app(h.state.clone());

    let (status, body) = send(&app, empty_request("GET", "/health")).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["status"], "degraded");
    assert_eq!(body["disks"][0]["default"], false);
}

#[tokio::test]
async fn test_upload_then_manage_media() {
    let h = harness().await;
    let app = create_app(h.state.clone());
    let png = png_bytes(64, 32);

    let (status, body) = send(&app, upload_request(&[("cat.png", "image/png", png.as_slice())])).await;
    assert_eq!(status, StatusCode::CREATED);
    let uploaded = &body["uploaded"][0];
    let id = uploaded["id"].as_str().unwrap().to_string();
    assert_eq!(uploaded["name"], "cat.png");
    assert_eq!(uploaded["is_image"], true);
    assert_eq!(uploaded["is_document"], false);
    assert_eq!(uploaded["classification"], "image");
    assert_eq!(uploaded["dimensions"], "64 × 32");
    assert!(
        uploaded["thumbnail_url"]
            .as_str()
            .unwrap()
            .contains("/thumbnails/thumb/")
    );

    let (status, body) = send(
        &app,
        json_request(
            "PATCH",
            &format!("/media/{}", id),
            json!({ "alt": "A cat", "caption": "Sleeping" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["alt"], "A cat");

    let (status, _) = send(
        &app,
        json_request(
            "PATCH",
            &format!("/media/{}", id),
            json!({ "title": "t".repeat(256) }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let (status, body) = send(&app, empty_request("GET", "/media")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 1);

    let (status, body) = send(&app, empty_request("DELETE", &format!("/media/{}", id))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["blob_status"], "removed");

    let (status, body) = send(&app, empty_request("GET", &format!("/media/{}", id))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["kind"], "not_found");

    let (status, body) = send(
        &app,
        empty_request("POST", &format!("/media/{}/restore", id)),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["id"], id.as_str());
}

#[tokio::test]
async fn test_rejected_upload_lists_allowed_types() {
    let h = harness().await;
    let app = create_app(h.state.clone());

    let (status, body) = send(
        &app,
        upload_request(&[("tool.exe", "application/x-msdownload", &b"MZ\x90\x00"[..])]),
    )
    .await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["kind"], "validation");
    let allowed = body["allowed_types"].as_array().unwrap();
    assert!(allowed.contains(&json!("image/png")));
    assert!(allowed.contains(&json!("application/pdf")));
    assert!(h.store.puts().is_empty());
}

#[tokio::test]
async fn test_multi_upload_reports_each_file() {
    let h = harness().await;
    let app = create_app(h.state.clone());
    let png = png_bytes(4, 4);

    let (status, body) = send(
        &app,
        upload_request(&[
            ("a.png", "image/png", png.as_slice()),
            ("bad.exe", "application/x-msdownload", &b"MZ"[..]),
            ("notes.txt", "text/plain", &b"hello"[..]),
        ]),
    )
    .await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["uploaded"].as_array().unwrap().len(), 2);
    assert_eq!(body["failed"][0]["filename"], "bad.exe");
}

#[tokio::test]
async fn test_thumbnail_endpoint() {
    let h = harness().await;
    let app = create_app(h.state.clone());
    let image = h.seed_image("photo.png").await;
    let doc = h.seed_item("doc.pdf", "application/pdf").await;

    let (status, body) = send(
        &app,
        empty_request("GET", &format!("/media/{}/thumbnail", image.id)),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["url"].as_str().unwrap().contains("/thumbnails/thumb/"));

    let (_, body) = send(
        &app,
        empty_request("GET", &format!("/media/{}/thumbnail", doc.id)),
    )
    .await;
    assert_eq!(body["url"], Value::Null);
}

#[tokio::test]
async fn test_slot_endpoints() {
    let h = harness().await;
    let app = create_app(h.state.clone());
    let items = h.seed_images(&["a.png", "b.png", "c.png", "d.png"]).await;
    let all = ids(&items);
    let base = "/usages/post/42/gallery";

    let (status, body) = send(&app, json_request("PUT", base, json!({ "media_ids": all }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(id_list(&body), all);

    let (status, body) = send(
        &app,
        json_request("POST", &format!("{}/reorder", base), json!({ "from": 1, "to": 3 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        id_list(&body),
        vec![all[0].clone(), all[2].clone(), all[3].clone(), all[1].clone()]
    );

    let (status, body) = send(
        &app,
        json_request("POST", &format!("{}/reorder", base), json!({ "from": 0, "to": 9 })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["kind"], "range");

    let (status, _) = send(
        &app,
        json_request(
            "POST",
            &format!("{}/attach", base),
            json!({ "media_ids": [all[0]], "start_position": 0 }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, body) = send(
        &app,
        json_request(
            "POST",
            &format!("{}/attach?group=hero", base),
            json!({ "media_ids": [all[0]] }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body[0]["group"], "hero");
    assert_eq!(body[0]["position"], 0);

    let (_, body) = send(&app, empty_request("GET", &format!("{}/summary", base))).await;
    assert_eq!(body["count"], 5);
    assert_eq!(body["exists"], true);

    let (status, body) = send(
        &app,
        json_request(
            "PUT",
            base,
            json!({ "media_ids": [all[0], "missing"] }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["kind"], "not_found");

    let (status, body) = send(
        &app,
        empty_request("POST", &format!("{}/items/{}/move-up", base, all[1])),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    // The field-wide slot also holds the hero copy of the first item
    let order = id_list(&body);
    assert_eq!(order.len(), 5);
    assert_eq!(order[3], all[1]);

    let (status, body) = send(
        &app,
        empty_request("DELETE", &format!("{}/items/{}", base, all[2])),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["removed"], 1);

    let (status, _) = send(
        &app,
        empty_request("DELETE", &format!("{}/items/{}", base, all[2])),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, body) = send(&app, empty_request("GET", "/usages/post/42")).await;
    assert_eq!(body["gallery"].as_array().unwrap().len(), 4);

    let (status, body) = send(&app, empty_request("DELETE", base)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["removed"], 4);
}
