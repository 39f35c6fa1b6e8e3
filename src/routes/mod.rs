pub mod classifier;
pub mod error;
pub mod health;

use crate::state::SharedState;
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use tower_http::trace::TraceLayer;

pub fn router(state: SharedState) -> Router {
    let body_limit = state.config.max_upload_bytes;

    Router::new()
        .route("/health", get(health::health_check))
        .route("/model-info", get(health::model_info))
        .route("/predict", post(classifier::predict))
        .route("/api/predict", post(classifier::api_predict))
        .fallback(|| async { error::ApiError::NotFound })
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
