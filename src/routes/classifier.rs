//! Prediction endpoints

use crate::error::Error;
use crate::models::classify_types::PredictionResult;
use crate::models::image_types::RawImage;
use crate::routes::error::ApiError;
use crate::services::classifier::pipeline::ServingContext;
use crate::services::fs_service;
use crate::services::image::loader;
use crate::services::thumbnail_service;
use crate::state::SharedState;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Multipart, State};
use axum::http::StatusCode;
use axum::Json;
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Debug, Serialize)]
pub struct PredictResponse {
    #[serde(flatten)]
    pub result: PredictionResult,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uploaded_file: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<String>,
    pub timestamp: String,
}

#[derive(Debug, Deserialize)]
pub struct ApiPredictRequest {
    pub image: Option<String>,
}

/// POST /predict - multipart upload in field `file`
pub async fn predict(
    State(state): State<SharedState>,
    mut multipart: Multipart,
) -> Result<Json<PredictResponse>, ApiError> {
    let limit_mb = state.config.max_upload_mb();
    let mut upload: Option<(String, Vec<u8>)> = None;

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => return Err(multipart_error(e.status(), e.body_text(), limit_mb)),
        };
        if field.name() != Some("file") {
            continue;
        }
        let file_name = field.file_name().unwrap_or("").to_string();
        let bytes = field
            .bytes()
            .await
            .map_err(|e| multipart_error(e.status(), e.body_text(), limit_mb))?;
        upload = Some((file_name, bytes.to_vec()));
    }

    let (file_name, bytes) = upload.ok_or_else(|| ApiError::BadRequest("No file uploaded".into()))?;
    if file_name.is_empty() {
        return Err(ApiError::BadRequest("No file selected".into()));
    }
    if !fs_service::is_image_file(Path::new(&file_name)) {
        return Err(ApiError::BadRequest(
            "Invalid file type. Please upload an image.".into(),
        ));
    }

    let ctx = serving_context(&state)?;
    let stored_name = format!(
        "{}_{}",
        chrono::Local::now().format("%Y%m%d_%H%M%S"),
        fs_service::sanitize_filename(&file_name)
    );
    let extension = Path::new(&file_name)
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("img")
        .to_lowercase();

    let upload_dir = state.config.upload_dir.clone();
    let (result, thumbnail) = tokio::task::spawn_blocking(move || {
        classify_upload(&ctx, &upload_dir, &extension, &bytes)
    })
    .await
    .map_err(|e| ApiError::Internal(format!("classification task failed: {e}")))??;

    info!(
        file = %stored_name,
        predicted = %result.predicted,
        confidence = result.confidence,
        "upload classified"
    );

    Ok(Json(PredictResponse {
        result,
        uploaded_file: Some(stored_name),
        thumbnail,
        timestamp: chrono::Utc::now().to_rfc3339(),
    }))
}

/// POST /api/predict - JSON body `{"image": "<data URL or base64>"}`
pub async fn api_predict(
    State(state): State<SharedState>,
    payload: Result<Json<ApiPredictRequest>, JsonRejection>,
) -> Result<Json<PredictResponse>, ApiError> {
    let Json(request) = payload.map_err(|rejection| {
        if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
            ApiError::PayloadTooLarge(state.config.max_upload_mb())
        } else {
            ApiError::BadRequest(rejection.body_text())
        }
    })?;

    let image = request
        .image
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ApiError::BadRequest("No image data provided".into()))?;
    let bytes = decode_image_payload(&image)?;

    let ctx = serving_context(&state)?;
    let (result, thumbnail) = tokio::task::spawn_blocking(move || {
        let raw = loader::load_bytes(&bytes)?;
        classify_with_thumbnail(&ctx, &raw)
    })
    .await
    .map_err(|e| ApiError::Internal(format!("classification task failed: {e}")))??;

    Ok(Json(PredictResponse {
        result,
        uploaded_file: None,
        thumbnail,
        timestamp: chrono::Utc::now().to_rfc3339(),
    }))
}

fn serving_context(state: &SharedState) -> Result<Arc<ServingContext>, ApiError> {
    state.context.clone().ok_or(ApiError::ModelNotLoaded)
}

/// Stage the upload in `dir` and classify it from disk. The staged file is
/// removed when this returns, on success or failure.
fn classify_upload(
    ctx: &ServingContext,
    dir: &Path,
    extension: &str,
    bytes: &[u8],
) -> Result<(PredictionResult, Option<String>), Error> {
    let mut staged = tempfile::Builder::new()
        .prefix("upload_")
        .suffix(&format!(".{extension}"))
        .tempfile_in(dir)?;
    staged.write_all(bytes)?;
    staged.flush()?;

    let raw = loader::load_path(staged.path())?;
    classify_with_thumbnail(ctx, &raw)
}

fn classify_with_thumbnail(
    ctx: &ServingContext,
    raw: &RawImage,
) -> Result<(PredictionResult, Option<String>), Error> {
    let result = ctx.classify_image(raw)?;
    let thumbnail = match thumbnail_service::generate_thumbnail(raw) {
        Ok(uri) => Some(uri),
        Err(e) => {
            warn!(error = %e, "thumbnail generation failed");
            None
        }
    };
    Ok((result, thumbnail))
}

/// Accept either a `data:image/...;base64,` URL or bare base64.
fn decode_image_payload(payload: &str) -> Result<Vec<u8>, ApiError> {
    let encoded = match payload.split_once(',') {
        Some((header, data)) if header.starts_with("data:") => data,
        _ => payload,
    };
    base64::engine::general_purpose::STANDARD
        .decode(encoded.trim())
        .map_err(|e| ApiError::BadRequest(format!("Invalid base64 image data: {e}")))
}

fn multipart_error(status: StatusCode, detail: String, limit_mb: usize) -> ApiError {
    if status == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::PayloadTooLarge(limit_mb)
    } else {
        warn!(detail, "failed to read multipart upload");
        ApiError::BadRequest("Failed to read file data.".into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_data_urls_and_bare_base64() {
        let encoded = base64::engine::general_purpose::STANDARD.encode(b"leaf");
        assert_eq!(decode_image_payload(&encoded).unwrap(), b"leaf");
        assert_eq!(
            decode_image_payload(&format!("data:image/png;base64,{encoded}")).unwrap(),
            b"leaf"
        );
    }

    #[test]
    fn rejects_invalid_base64() {
        assert!(matches!(
            decode_image_payload("data:image/png;base64,@@@"),
            Err(ApiError::BadRequest(_))
        ));
    }
}
