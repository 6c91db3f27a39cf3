//! Receipt extraction handler

use std::sync::Arc;

use axum::{
    extract::{
        multipart::{MultipartError, MultipartRejection},
        Multipart, State,
    },
    http::StatusCode,
    Json,
};
use tracing::{debug, info};

use tallyscan_core::{preprocess::sniff_mime, ExtractionResult};

use crate::{ApiResponse, AppError, AppState};

/// Multipart field names accepted for the image
const FILE_FIELDS: &[&str] = &["file", "image"];

/// An uploaded image part
struct Upload {
    bytes: Vec<u8>,
    content_type: Option<String>,
    file_name: Option<String>,
}

fn multipart_error(err: MultipartError, max_bytes: usize) -> AppError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::file_too_large(max_bytes)
    } else {
        AppError::missing_file(&format!("Failed to read upload: {}", err.body_text()))
    }
}

/// Declared part type, or the sniffed one when the client sent none
fn resolve_mime(upload: &Upload) -> Option<String> {
    match upload.content_type.as_deref() {
        Some(declared) if !declared.eq_ignore_ascii_case("application/octet-stream") => {
            Some(declared.to_string())
        }
        _ => sniff_mime(&upload.bytes).map(str::to_string),
    }
}

/// Extract structured data from a receipt image
///
/// POST /api/receipts/extract
///
/// Expects multipart form with:
/// - file: receipt image (required; `image` is accepted as an alias)
///
/// An unreadable or non-receipt image still answers 200: the result then
/// carries `errorText`.
pub async fn extract_receipt(
    State(state): State<Arc<AppState>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<ApiResponse<ExtractionResult>>, AppError> {
    let mut multipart = multipart.map_err(|e| {
        AppError::missing_file(&format!(
            "Expected a multipart/form-data upload: {}",
            e.body_text()
        ))
    })?;
    let upload_settings = &state.config.upload;
    let max_bytes = upload_settings.max_bytes;
    let mut upload: Option<Upload> = None;

    // Extract fields from multipart form
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_error(e, max_bytes))?
    {
        let name = field.name().unwrap_or("").to_string();
        if !FILE_FIELDS.contains(&name.as_str()) || upload.is_some() {
            debug!(field = %name, "Ignoring multipart field");
            continue;
        }

        let content_type = field.content_type().map(str::to_string);
        let file_name = field.file_name().map(str::to_string);
        let bytes = field
            .bytes()
            .await
            .map_err(|e| multipart_error(e, max_bytes))?;

        // Check file size limit
        if bytes.len() > max_bytes {
            return Err(AppError::file_too_large(max_bytes));
        }

        upload = Some(Upload {
            bytes: bytes.to_vec(),
            content_type,
            file_name,
        });
    }

    // Validate required fields
    let upload = upload
        .filter(|u| !u.bytes.is_empty())
        .ok_or_else(|| AppError::missing_file("No image uploaded. Send it in a 'file' field."))?;

    let mime = resolve_mime(&upload)
        .ok_or_else(|| AppError::unsupported_media_type("Unrecognized file type"))?;
    if !upload_settings.allows(&mime) {
        return Err(AppError::unsupported_media_type(&format!(
            "Unsupported file type '{}'. Allowed: {}",
            mime,
            upload_settings.allowed_mime_types.join(", ")
        )));
    }

    info!(
        file_name = upload.file_name.as_deref().unwrap_or("-"),
        mime = %mime,
        bytes = upload.bytes.len(),
        "Receipt upload received"
    );

    let result = state.extractor.extract(upload.bytes).await?;
    Ok(ApiResponse::ok(result))
}
