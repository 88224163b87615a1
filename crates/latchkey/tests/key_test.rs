//! tests for the /key and /health endpoints.

mod common;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use common::Harness;
use tower::ServiceExt;

async fn get(h: &Harness, uri: &str) -> (StatusCode, serde_json::Value) {
    let response = h
        .app
        .clone()
        .oneshot(
            Request::builder()
                .method("GET")
                .uri(uri)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

#[tokio::test]
async fn test_key_returns_platform_public_pem() {
    let h = Harness::new().await;
    let (status, json) = get(&h, "/key").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["algorithm"], "EdDSA");
    assert_eq!(json["kid"], "platform-v1");

    // the pem parses back to the key the server signs licenses with
    let pem = json["public_key_pem"].as_str().unwrap();
    let parsed = latchkey_seal::channel_key_from_pem(pem).unwrap();
    assert_eq!(parsed.as_bytes(), h.platform_public.as_bytes());
}

#[tokio::test]
async fn test_health_passes_with_live_database() {
    let h = Harness::new().await;
    let (status, json) = get(&h, "/health").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "pass");
}
