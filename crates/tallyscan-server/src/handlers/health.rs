//! Health check handlers

use std::sync::Arc;

use axum::{extract::State, Json};
use serde::Serialize;

use tallyscan_core::ExtractionBackend;

use crate::{ApiResponse, AppState};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthStatus {
    pub status: &'static str,
    pub version: &'static str,
    pub provider: &'static str,
    pub model: String,
    pub prompt_version: u32,
}

#[derive(Debug, Serialize)]
pub struct UpstreamHealth {
    pub provider: &'static str,
    pub host: String,
    pub model: String,
    pub reachable: bool,
}

/// GET /api/health - liveness, without touching the model provider
pub async fn health(State(state): State<Arc<AppState>>) -> Json<ApiResponse<HealthStatus>> {
    let client = state.extractor.client();
    ApiResponse::ok(HealthStatus {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        provider: client.name(),
        model: client.model().to_string(),
        prompt_version: state.extractor.prompt().metadata.version,
    })
}

/// GET /api/health/upstream - check the model provider is reachable
pub async fn upstream_health(
    State(state): State<Arc<AppState>>,
) -> Json<ApiResponse<UpstreamHealth>> {
    let client = state.extractor.client();
    ApiResponse::ok(UpstreamHealth {
        provider: client.name(),
        host: client.host().to_string(),
        model: client.model().to_string(),
        reachable: client.health_check().await,
    })
}
