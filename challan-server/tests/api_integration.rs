//! API integration tests for challan-server.
//!
//! These tests drive the HTTP API with realistic webhook envelopes and
//! multipart uploads, running the whole pipeline against the deterministic
//! mock backend and an in-memory report sink.

use std::sync::Arc;

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;

use challan_core::{AiBackend, MemorySink, ReportPipeline};
use challan_server::{create_router, AppState};

const VERIFY_TOKEN: &str = "test-verify-token";

/// Build the test router with mock AI and in-memory storage.
fn create_test_app() -> Router {
    let pipeline = ReportPipeline::new(AiBackend::mock(), Arc::new(MemorySink::new()));
    let state = AppState {
        pipeline: Arc::new(pipeline),
        whatsapp: None,
        waba_verify_token: Some(VERIFY_TOKEN.to_string()),
    };
    create_router(state)
}

/// Helper to create a multipart body for the analyze request
fn create_analyze_multipart(content: &[u8], content_type: &str) -> (String, Vec<u8>) {
    let boundary = "----TestBoundary7MA4YWxkTrZu0gW";
    let mut body = Vec::new();

    body.extend_from_slice(format!("--{}\r\n", boundary).as_bytes());
    body.extend_from_slice(
        b"Content-Disposition: form-data; name=\"file\"; filename=\"scene.jpg\"\r\n",
    );
    body.extend_from_slice(format!("Content-Type: {}\r\n\r\n", content_type).as_bytes());
    body.extend_from_slice(content);
    body.extend_from_slice(b"\r\n");
    body.extend_from_slice(format!("--{}--\r\n", boundary).as_bytes());

    (format!("multipart/form-data; boundary={}", boundary), body)
}

async fn response_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

// ============================================================================
// Health & Readiness Tests
// ============================================================================

#[tokio::test]
async fn test_health_endpoint() {
    let app = create_test_app();

    let response = app
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["service"], "challan-server");
    assert_eq!(body["delivery_configured"], false);
}

#[tokio::test]
async fn test_ready_endpoint() {
    let app = create_test_app();

    let response = app
        .oneshot(Request::get("/ready").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    assert_eq!(body["ready"], true);
}

// ============================================================================
// Webhook Handshake Tests
// ============================================================================

#[tokio::test]
async fn test_webhook_verification_echoes_challenge() {
    let app = create_test_app();

    let uri = format!(
        "/webhook/whatsapp?hub.mode=subscribe&hub.verify_token={}&hub.challenge=12345",
        VERIFY_TOKEN
    );
    let response = app
        .oneshot(Request::get(&uri).body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    assert_eq!(&bytes[..], b"12345");
}

#[tokio::test]
async fn test_webhook_verification_rejects_bad_token() {
    let app = create_test_app();

    let uri = "/webhook/whatsapp?hub.mode=subscribe&hub.verify_token=wrong&hub.challenge=12345";
    let response = app
        .oneshot(Request::get(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_webhook_verification_rejects_missing_params() {
    let app = create_test_app();

    let response = app
        .oneshot(Request::get("/webhook/whatsapp").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

// ============================================================================
// Webhook Intake Tests
// ============================================================================

#[tokio::test]
async fn test_webhook_acknowledges_text_messages() {
    let app = create_test_app();

    let envelope = json!({
        "entry": [{
            "changes": [{
                "value": {
                    "messages": [{
                        "type": "text",
                        "from": "919876543210",
                        "text": {"body": "hello"}
                    }]
                }
            }]
        }]
    });

    let response = app
        .oneshot(
            Request::post("/webhook/whatsapp")
                .header("content-type", "application/json")
                .body(Body::from(envelope.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn test_webhook_acknowledges_image_without_delivery_configured() {
    // No WhatsApp client in the test state: the image task is skipped but
    // the webhook must still acknowledge.
    let app = create_test_app();

    let envelope = json!({
        "entry": [{
            "changes": [{
                "value": {
                    "messages": [{
                        "type": "image",
                        "from": "919876543210",
                        "image": {"id": "media-123"}
                    }]
                }
            }]
        }]
    });

    let response = app
        .oneshot(
            Request::post("/webhook/whatsapp")
                .header("content-type", "application/json")
                .body(Body::from(envelope.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn test_webhook_tolerates_empty_envelope() {
    let app = create_test_app();

    let response = app
        .oneshot(
            Request::post("/webhook/whatsapp")
                .header("content-type", "application/json")
                .body(Body::from("{}"))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}

// ============================================================================
// Analyze Endpoint Tests
// ============================================================================

#[tokio::test]
async fn test_analyze_runs_full_pipeline() {
    let app = create_test_app();

    let (content_type, body) = create_analyze_multipart(b"fake-jpeg-bytes", "image/jpeg");
    let response = app
        .oneshot(
            Request::post("/api/v1/analyze")
                .header("content-type", content_type)
                .body(Body::from(body))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;

    assert_eq!(body["success"], true);
    let result = &body["result"];
    assert_eq!(result["vehicle_detected"], true);
    assert_eq!(result["is_violation"], true);
    assert_eq!(result["needs_manual_verification"], false);
    assert_eq!(result["report_success"], true);
    assert_eq!(result["report_id"], 1);

    let violations = result["violations"].as_array().unwrap();
    assert_eq!(violations.len(), 2);
    assert_eq!(violations[0]["id"], 1);
    assert_eq!(violations[1]["id"], 2);

    let narration = result["narration"].as_str().unwrap();
    assert!(narration.contains("₹1000"));
    assert!(narration.contains("₹2000"));
}

#[tokio::test]
async fn test_analyze_rejects_non_image_upload() {
    let app = create_test_app();

    let (content_type, body) = create_analyze_multipart(b"%PDF-1.4", "application/pdf");
    let response = app
        .oneshot(
            Request::post("/api/v1/analyze")
                .header("content-type", content_type)
                .body(Body::from(body))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = response_json(response).await;
    assert_eq!(body["code"], "INVALID_INPUT");
}

#[tokio::test]
async fn test_analyze_rejects_missing_file() {
    let app = create_test_app();

    let boundary = "----TestBoundary7MA4YWxkTrZu0gW";
    let body = format!("--{boundary}--\r\n");

    let response = app
        .oneshot(
            Request::post("/api/v1/analyze")
                .header(
                    "content-type",
                    format!("multipart/form-data; boundary={boundary}"),
                )
                .body(Body::from(body))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
