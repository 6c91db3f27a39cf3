//! Tallyscan Web Server
//!
//! Axum-based REST API that turns uploaded receipt photos into structured
//! extraction results.
//!
//! Security features:
//! - Restrictive CORS policy
//! - Input validation (upload size limit, image MIME allow-list)
//! - Sanitized error responses

use std::sync::Arc;

use anyhow::Context;
use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use tower_http::{cors::CorsLayer, set_header::SetResponseHeaderLayer, trace::TraceLayer};
use tracing::{error, info, warn};

use tallyscan_core::{Config, ExtractionBackend, ReceiptExtractor};

mod handlers;

/// Room for multipart boundaries and part headers on top of the file itself
const MULTIPART_OVERHEAD: usize = 64 * 1024;

/// Shared application state
pub struct AppState {
    pub extractor: ReceiptExtractor,
    pub config: Config,
}

/// Uniform success envelope
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: T,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Json<Self> {
        Json(Self {
            success: true,
            data,
        })
    }
}

/// Create the application router
pub fn create_router(extractor: ReceiptExtractor, config: Config) -> Router {
    info!(
        "Model backend configured: {} at {} (model: {})",
        extractor.client().name(),
        extractor.client().host(),
        extractor.client().model()
    );

    // Body limit applies to the whole multipart request
    let body_limit = config.upload.max_bytes.saturating_add(MULTIPART_OVERHEAD);
    let allowed_origins = config.server.allowed_origins.clone();

    let state = Arc::new(AppState { extractor, config });

    let api_routes = Router::new()
        .route("/health", get(handlers::health))
        .route("/health/upstream", get(handlers::upstream_health))
        .route("/receipts/extract", post(handlers::extract_receipt))
        .layer(DefaultBodyLimit::max(body_limit));

    // Build CORS layer
    let cors = if allowed_origins.is_empty() {
        // Restrictive default: only allow same-origin
        CorsLayer::new()
            .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
            .allow_headers([header::CONTENT_TYPE])
    } else {
        // Allow specified origins
        let origins: Vec<HeaderValue> = allowed_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
            .allow_headers([header::CONTENT_TYPE])
    };

    Router::new()
        .nest("/api", api_routes)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        // Security headers
        .layer(SetResponseHeaderLayer::overriding(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::X_FRAME_OPTIONS,
            HeaderValue::from_static("DENY"),
        ))
}

/// Start the server with the given configuration
pub async fn serve_with_config(config: Config, host: &str, port: u16) -> anyhow::Result<()> {
    config.validate().context("Invalid configuration")?;
    let extractor =
        ReceiptExtractor::from_config(&config).context("Failed to set up receipt extractor")?;

    check_upstream_connection(&extractor).await;

    let app = create_router(extractor, config);
    let addr = format!("{}:{}", host, port);

    info!("Starting server at http://{}", addr);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Check and log model backend reachability
async fn check_upstream_connection(extractor: &ReceiptExtractor) {
    let client = extractor.client();
    if client.health_check().await {
        info!(
            "Model backend reachable: {} at {} (model: {})",
            client.name(),
            client.host(),
            client.model()
        );
    } else {
        warn!(
            "Model backend configured but not responding: {} at {}",
            client.name(),
            client.host()
        );
    }
}

// ============================================================================
// Error Handling
// ============================================================================

/// Application error type with HTTP status and machine-readable code
#[derive(Debug)]
pub struct AppError {
    status: StatusCode,
    code: &'static str,
    message: String,
    internal: Option<anyhow::Error>,
}

impl AppError {
    fn new(status: StatusCode, code: &'static str, msg: &str) -> Self {
        Self {
            status,
            code,
            message: msg.to_string(),
            internal: None,
        }
    }

    pub fn missing_file(msg: &str) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "MISSING_FILE", msg)
    }

    pub fn unsupported_media_type(msg: &str) -> Self {
        Self::new(
            StatusCode::UNSUPPORTED_MEDIA_TYPE,
            "UNSUPPORTED_MEDIA_TYPE",
            msg,
        )
    }

    pub fn file_too_large(max_bytes: usize) -> Self {
        Self::new(
            StatusCode::PAYLOAD_TOO_LARGE,
            "FILE_TOO_LARGE",
            &format!(
                "File too large. Maximum size is {} MB",
                max_bytes / 1024 / 1024
            ),
        )
    }

    pub fn image_processing(msg: &str) -> Self {
        Self::new(
            StatusCode::UNPROCESSABLE_ENTITY,
            "IMAGE_PROCESSING_ERROR",
            msg,
        )
    }

    pub fn internal(msg: &str) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", msg)
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn code(&self) -> &'static str {
        self.code
    }
}

impl From<tallyscan_core::Error> for AppError {
    fn from(err: tallyscan_core::Error) -> Self {
        match err {
            tallyscan_core::Error::ImageProcessing(msg) => {
                Self::image_processing(&format!("Could not read image: {}", msg))
            }
            err if err.is_upstream() => Self {
                status: StatusCode::BAD_GATEWAY,
                code: "PROCESSING_ERROR",
                message: "Failed to process receipt".to_string(),
                internal: Some(err.into()),
            },
            err => Self {
                internal: Some(err.into()),
                ..Self::internal("An internal error occurred")
            },
        }
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        Self {
            // Keep full error for logging
            internal: Some(err),
            // Return generic message to client
            ..Self::internal("An internal error occurred")
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // Log the full internal error if present
        if let Some(err) = &self.internal {
            error!(code = self.code, error = %err, "Request failed");
        }

        let body = Json(serde_json::json!({
            "success": false,
            "error": {
                "error": self.code,
                "message": self.message,
            }
        }));

        (self.status, body).into_response()
    }
}

#[cfg(test)]
mod tests;
