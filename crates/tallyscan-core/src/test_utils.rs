//! Test utilities for tallyscan-core
//!
//! This module provides testing infrastructure including a mock LLM server
//! speaking both the OpenAI chat completions and Anthropic messages APIs.

use std::io::Cursor;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::{
    extract::{DefaultBodyLimit, Json, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use serde_json::{json, Value};
use tokio::sync::oneshot;

use crate::preprocess::{ImagePreprocessor, PreparedImage};

/// Behaviour of a [`MockLlmServer`]
#[derive(Debug, Clone)]
pub struct MockLlmConfig {
    /// Text the "model" answers with
    pub reply: String,
    /// Number of requests to fail before answering
    pub failures: usize,
    /// HTTP status used for the failing requests
    pub failure_status: u16,
    /// Delay before every answer
    pub delay: Duration,
    /// Raw JSON body returned instead of a well-formed completion
    pub raw_body: Option<Value>,
}

impl Default for MockLlmConfig {
    fn default() -> Self {
        Self {
            reply: crate::ai::SAMPLE_RECEIPT_JSON.to_string(),
            failures: 0,
            failure_status: 503,
            delay: Duration::ZERO,
            raw_body: None,
        }
    }
}

/// A request seen by the mock server
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub path: String,
    /// `Authorization` header (OpenAI style)
    pub authorization: Option<String>,
    /// `x-api-key` header (Anthropic style)
    pub api_key: Option<String>,
    pub body: Value,
}

struct ServerState {
    config: MockLlmConfig,
    remaining_failures: Mutex<usize>,
    requests: Mutex<Vec<RecordedRequest>>,
}

impl ServerState {
    fn record(&self, path: &str, headers: &HeaderMap, body: Value) {
        let header = |name: &str| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        };
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(RecordedRequest {
                path: path.to_string(),
                authorization: header("authorization"),
                api_key: header("x-api-key"),
                body,
            });
        }
    }

    /// Consume one scheduled failure, if any remain
    fn take_failure(&self) -> Option<StatusCode> {
        let mut remaining = self.remaining_failures.lock().ok()?;
        if *remaining == 0 {
            return None;
        }
        if *remaining != usize::MAX {
            *remaining -= 1;
        }
        StatusCode::from_u16(self.config.failure_status).ok()
    }

    fn failing(&self) -> bool {
        self.remaining_failures
            .lock()
            .map(|remaining| *remaining > 0)
            .unwrap_or(false)
    }
}

/// Mock LLM server for testing
pub struct MockLlmServer {
    addr: SocketAddr,
    state: Arc<ServerState>,
    shutdown_tx: Option<oneshot::Sender<()>>,
}

impl MockLlmServer {
    /// Start a server that always answers with `reply`
    pub async fn start(reply: &str) -> Self {
        Self::start_with(MockLlmConfig {
            reply: reply.to_string(),
            ..Default::default()
        })
        .await
    }

    /// Start the mock server on an available port
    pub async fn start_with(config: MockLlmConfig) -> Self {
        let state = Arc::new(ServerState {
            remaining_failures: Mutex::new(config.failures),
            config,
            requests: Mutex::new(Vec::new()),
        });

        let app = Router::new()
            .route("/v1/models", get(handle_models))
            .route("/v1/chat/completions", post(handle_chat_completions))
            .route("/v1/messages", post(handle_messages))
            .layer(DefaultBodyLimit::disable())
            .with_state(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    shutdown_rx.await.ok();
                })
                .await
                .unwrap();
        });

        Self {
            addr,
            state,
            shutdown_tx: Some(shutdown_tx),
        }
    }

    /// Get the base URL for this mock server
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Model calls received so far (health checks excluded)
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.state
            .requests
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }

    pub fn request_count(&self) -> usize {
        self.requests().len()
    }

    /// Stop the mock server
    pub fn stop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

impl Drop for MockLlmServer {
    fn drop(&mut self) {
        self.stop();
    }
}

fn failure_response(status: StatusCode) -> Response {
    (
        status,
        Json(json!({"error": {"message": "mock failure", "type": "server_error"}})),
    )
        .into_response()
}

async fn handle_models(State(state): State<Arc<ServerState>>) -> Response {
    if state.failing() {
        let status = StatusCode::from_u16(state.config.failure_status)
            .unwrap_or(StatusCode::SERVICE_UNAVAILABLE);
        return failure_response(status);
    }
    Json(json!({"data": [{"id": "mock-vision", "object": "model"}]})).into_response()
}

async fn handle_chat_completions(
    State(state): State<Arc<ServerState>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    state.record("/v1/chat/completions", &headers, body);
    tokio::time::sleep(state.config.delay).await;

    if let Some(status) = state.take_failure() {
        return failure_response(status);
    }
    if let Some(body) = &state.config.raw_body {
        return Json(body.clone()).into_response();
    }

    Json(json!({
        "id": "chatcmpl-mock",
        "object": "chat.completion",
        "choices": [{
            "index": 0,
            "message": {"role": "assistant", "content": state.config.reply},
            "finish_reason": "stop"
        }]
    }))
    .into_response()
}

async fn handle_messages(
    State(state): State<Arc<ServerState>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    state.record("/v1/messages", &headers, body);
    tokio::time::sleep(state.config.delay).await;

    if let Some(status) = state.take_failure() {
        return failure_response(status);
    }
    if let Some(body) = &state.config.raw_body {
        return Json(body.clone()).into_response();
    }

    Json(json!({
        "id": "msg_mock",
        "type": "message",
        "role": "assistant",
        "content": [{"type": "text", "text": state.config.reply}],
        "stop_reason": "end_turn"
    }))
    .into_response()
}

/// PNG bytes of a small off-white "receipt"
pub fn sample_png(width: u32, height: u32) -> Vec<u8> {
    let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, Rgb([245, 243, 235])));
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
        .unwrap();
    buf
}

/// A small prepared image for backend tests
pub fn sample_image() -> PreparedImage {
    ImagePreprocessor::default()
        .prepare(&sample_png(16, 32))
        .unwrap()
}
