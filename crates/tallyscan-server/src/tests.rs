//! Server API tests

use super::*;
use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use http_body_util::BodyExt;
use std::time::Duration;
use tallyscan_core::{
    test_utils::{sample_png, MockLlmConfig, MockLlmServer},
    AIClient, ImagePreprocessor, MockBackend, OpenAIBackend, Prompt, RetryPolicy,
};
use tower::ServiceExt;

const BOUNDARY: &str = "tallyscan-test-boundary";

fn test_config() -> Config {
    let mut config = Config::default();
    config.provider.kind = tallyscan_core::ProviderKind::Mock;
    config
}

fn app_with_client(client: AIClient, config: Config) -> Router {
    let extractor = ReceiptExtractor::new(
        ImagePreprocessor::default(),
        client,
        Prompt::embedded().unwrap(),
        RetryPolicy {
            max_retries: 1,
            timeout: Duration::from_secs(5),
            initial_backoff: Duration::from_millis(1),
        },
    );
    create_router(extractor, config)
}

fn setup_test_app() -> Router {
    app_with_client(AIClient::Mock(MockBackend::new()), test_config())
}

/// Build a multipart/form-data body with a single file part
fn multipart_body(field: &str, content_type: Option<&str>, data: &[u8]) -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
    body.extend_from_slice(
        format!(
            "Content-Disposition: form-data; name=\"{}\"; filename=\"receipt\"\r\n",
            field
        )
        .as_bytes(),
    );
    if let Some(ct) = content_type {
        body.extend_from_slice(format!("Content-Type: {}\r\n", ct).as_bytes());
    }
    body.extend_from_slice(b"\r\n");
    body.extend_from_slice(data);
    body.extend_from_slice(format!("\r\n--{}--\r\n", BOUNDARY).as_bytes());
    body
}

fn upload_request(body: Vec<u8>) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/api/receipts/extract")
        .header(
            "content-type",
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .body(Body::from(body))
        .unwrap()
}

async fn get_body_json(response: axum::response::Response) -> serde_json::Value {
    let body = response.into_body();
    let bytes = body.collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

// ========== Health API Tests ==========

#[tokio::test]
async fn test_health() {
    let app = setup_test_app();

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/health")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get("x-content-type-options").unwrap(),
        "nosniff"
    );
    assert_eq!(response.headers().get("x-frame-options").unwrap(), "DENY");

    let json = get_body_json(response).await;
    assert_eq!(json["success"], true);
    assert_eq!(json["data"]["status"], "ok");
    assert_eq!(json["data"]["provider"], "mock");
    assert_eq!(json["data"]["model"], "mock");
}

#[tokio::test]
async fn test_upstream_health_unreachable() {
    let app = app_with_client(AIClient::Mock(MockBackend::unhealthy()), test_config());

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/health/upstream")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = get_body_json(response).await;
    assert_eq!(json["data"]["reachable"], false);
}

// ========== Extraction API Tests ==========

#[tokio::test]
async fn test_extract_receipt() {
    let app = setup_test_app();
    let body = multipart_body("file", Some("image/png"), &sample_png(60, 120));

    let response = app.oneshot(upload_request(body)).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = get_body_json(response).await;
    assert_eq!(json["success"], true);
    assert_eq!(json["data"]["currency"], "USD");
    assert_eq!(json["data"]["items"].as_array().unwrap().len(), 2);
    assert_eq!(json["data"]["items"][0]["name"], "Club Sandwich");
    assert!(json["data"]["additionalCosts"].is_array());
    assert!(json["data"].get("errorText").is_none());
}

#[tokio::test]
async fn test_extract_accepts_image_field_and_sniffs_type() {
    let app = setup_test_app();
    let body = multipart_body("image", None, &sample_png(20, 20));

    let response = app.oneshot(upload_request(body)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_unparseable_model_reply_is_still_success() {
    let app = app_with_client(
        AIClient::Mock(MockBackend::replying("Sorry, I can't help with that.")),
        test_config(),
    );
    let body = multipart_body("file", Some("image/png"), &sample_png(20, 20));

    let response = app.oneshot(upload_request(body)).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = get_body_json(response).await;
    assert_eq!(json["success"], true);
    assert_eq!(json["data"]["errorText"], "parsing error");
    assert_eq!(json["data"]["totalPrice"], 0.0);
    assert_eq!(json["data"]["currencySymbol"], "$");
}

#[tokio::test]
async fn test_missing_file() {
    let app = setup_test_app();
    let body = multipart_body("notes", Some("text/plain"), b"hello");

    let response = app.oneshot(upload_request(body)).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = get_body_json(response).await;
    assert_eq!(json["success"], false);
    assert_eq!(json["error"]["error"], "MISSING_FILE");
}

#[tokio::test]
async fn test_not_multipart() {
    let app = setup_test_app();

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/receipts/extract")
                .header("content-type", "application/json")
                .body(Body::from("{}"))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = get_body_json(response).await;
    assert_eq!(json["error"]["error"], "MISSING_FILE");
}

#[tokio::test]
async fn test_truncated_upload_is_missing_file() {
    let app = setup_test_app();
    let mut body = multipart_body("file", Some("image/png"), &sample_png(20, 20));
    // Drop the closing boundary
    body.truncate(body.len() - BOUNDARY.len() - 8);

    let response = app.oneshot(upload_request(body)).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = get_body_json(response).await;
    assert_eq!(json["error"]["error"], "MISSING_FILE");
}

#[tokio::test]
async fn test_unsupported_media_type() {
    let app = setup_test_app();
    let body = multipart_body("file", Some("application/pdf"), b"%PDF-1.7 fake");

    let response = app.oneshot(upload_request(body)).await.unwrap();

    assert_eq!(response.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
    let json = get_body_json(response).await;
    assert_eq!(json["error"]["error"], "UNSUPPORTED_MEDIA_TYPE");
}

#[tokio::test]
async fn test_file_too_large() {
    let mut config = test_config();
    config.upload.max_bytes = 1024;
    let app = app_with_client(AIClient::mock(), config);
    let body = multipart_body("file", Some("image/png"), &vec![0u8; 4096]);

    let response = app.oneshot(upload_request(body)).await.unwrap();

    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    let json = get_body_json(response).await;
    assert_eq!(json["error"]["error"], "FILE_TOO_LARGE");
}

#[tokio::test]
async fn test_body_over_stream_limit() {
    let mut config = test_config();
    config.upload.max_bytes = 1024;
    let app = app_with_client(AIClient::mock(), config);
    let body = multipart_body(
        "file",
        Some("image/png"),
        &vec![0u8; 1024 + MULTIPART_OVERHEAD + 1],
    );

    let response = app.oneshot(upload_request(body)).await.unwrap();

    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    let json = get_body_json(response).await;
    assert_eq!(json["error"]["error"], "FILE_TOO_LARGE");
}

#[tokio::test]
async fn test_corrupt_image() {
    let app = setup_test_app();
    let body = multipart_body("file", Some("image/jpeg"), b"\xFF\xD8\xFF garbage");

    let response = app.oneshot(upload_request(body)).await.unwrap();

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let json = get_body_json(response).await;
    assert_eq!(json["error"]["error"], "IMAGE_PROCESSING_ERROR");
}

#[tokio::test]
async fn test_upstream_failure() {
    let server = MockLlmServer::start_with(MockLlmConfig {
        failures: usize::MAX,
        failure_status: 500,
        ..Default::default()
    })
    .await;
    let client = AIClient::OpenAI(OpenAIBackend::new(&server.url(), "gpt-test", "sk-secret"));
    let app = app_with_client(client, test_config());
    let body = multipart_body("file", Some("image/png"), &sample_png(20, 20));

    let response = app.oneshot(upload_request(body)).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    let json = get_body_json(response).await;
    assert_eq!(json["success"], false);
    assert_eq!(json["error"]["error"], "PROCESSING_ERROR");
    // Upstream details stay in the logs
    assert!(!json.to_string().contains("mock failure"));
    // One retry on 5xx
    assert_eq!(server.request_count(), 2);
}

#[tokio::test]
async fn test_empty_model_choices_is_upstream_failure() {
    let server = MockLlmServer::start_with(MockLlmConfig {
        raw_body: Some(serde_json::json!({"id": "chatcmpl-mock", "choices": []})),
        ..Default::default()
    })
    .await;
    let client = AIClient::OpenAI(OpenAIBackend::new(&server.url(), "gpt-test", "sk"));
    let app = app_with_client(client, test_config());
    let body = multipart_body("file", Some("image/png"), &sample_png(20, 20));

    let response = app.oneshot(upload_request(body)).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    let json = get_body_json(response).await;
    assert_eq!(json["error"]["error"], "PROCESSING_ERROR");
    // Not retryable
    assert_eq!(server.request_count(), 1);
}

#[tokio::test]
async fn test_extract_over_http_backend() {
    let server = MockLlmServer::start(
        r#"```json
{"items":[{"name":"Latte","quantity":1,"price":4.75}],"totalPrice":4.75,"currency":"GBP","currencySymbol":"£"}
```"#,
    )
    .await;
    let client = AIClient::OpenAI(OpenAIBackend::new(&server.url(), "gpt-test", "sk"));
    let app = app_with_client(client, test_config());
    let body = multipart_body("file", Some("image/png"), &sample_png(20, 20));

    let response = app.oneshot(upload_request(body)).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = get_body_json(response).await;
    assert_eq!(json["data"]["currency"], "GBP");
    assert_eq!(json["data"]["items"][0]["name"], "Latte");
}

#[test]
fn test_app_error_from_core_error() {
    let err = AppError::from(tallyscan_core::Error::Timeout {
        after: Duration::from_secs(30),
    });
    assert_eq!(err.status(), StatusCode::BAD_GATEWAY);
    assert_eq!(err.code(), "PROCESSING_ERROR");

    let err = AppError::from(tallyscan_core::Error::Config("bad".into()));
    assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(err.code(), "INTERNAL_ERROR");
}
