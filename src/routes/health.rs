//! Status endpoints

use crate::models::classify_types::ModelStatus;
use crate::routes::error::ApiError;
use crate::services::classifier::model_manager::{ModelMetadata, ModelVariant};
use crate::state::SharedState;
use axum::{extract::State, Json};
use serde::Serialize;

#[derive(Serialize)]
pub struct ModelInfoResponse {
    pub model_info: ModelMetadata,
    pub class_names: Vec<String>,
    pub num_classes: usize,
    pub variant: ModelVariant,
    pub uptime_seconds: u64,
}

/// GET /health - liveness plus model availability
pub async fn health_check(State(state): State<SharedState>) -> Json<ModelStatus> {
    Json(ModelStatus {
        status: "healthy",
        model_loaded: state.model_loaded(),
        error: state.load_error.clone(),
        timestamp: chrono::Utc::now().to_rfc3339(),
    })
}

/// GET /model-info - descriptor of the loaded model
pub async fn model_info(
    State(state): State<SharedState>,
) -> Result<Json<ModelInfoResponse>, ApiError> {
    let ctx = state.context.as_ref().ok_or(ApiError::ModelNotLoaded)?;
    let metadata = ctx.metadata().clone();

    Ok(Json(ModelInfoResponse {
        class_names: metadata.class_names.clone(),
        num_classes: metadata.num_classes,
        model_info: metadata,
        variant: ctx.variant(),
        uptime_seconds: state.uptime_seconds(),
    }))
}
