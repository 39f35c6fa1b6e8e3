use crate::error::Error;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
    pub code: &'static str,
    pub timestamp: String,
}

/// Request-level failures with HTTP status mapping.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),
    #[error("File too large. Maximum size is {0}MB.")]
    PayloadTooLarge(usize),
    #[error("Model not loaded")]
    ModelNotLoaded,
    #[error("Page not found")]
    NotFound,
    #[error("Prediction failed: {0}")]
    Classification(#[from] Error),
    #[error("Internal error: {0}")]
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            ApiError::BadRequest(detail) => {
                (StatusCode::BAD_REQUEST, "BAD_REQUEST", detail.clone())
            }
            ApiError::PayloadTooLarge(_) => (
                StatusCode::PAYLOAD_TOO_LARGE,
                "PAYLOAD_TOO_LARGE",
                self.to_string(),
            ),
            ApiError::ModelNotLoaded => (
                StatusCode::SERVICE_UNAVAILABLE,
                "MODEL_NOT_LOADED",
                self.to_string(),
            ),
            ApiError::NotFound => (StatusCode::NOT_FOUND, "NOT_FOUND", self.to_string()),
            ApiError::Classification(err) if err.is_client_error() => {
                let code = match err {
                    Error::Dimension { .. } => "DIMENSION_ERROR",
                    _ => "DECODE_ERROR",
                };
                (StatusCode::BAD_REQUEST, code, format!("Prediction failed: {err}"))
            }
            ApiError::Classification(err) => {
                tracing::error!(error = %err, "classification failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INFERENCE_FAILED",
                    "Prediction failed: internal error".to_string(),
                )
            }
            ApiError::Internal(detail) => {
                tracing::error!(detail, "API internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL",
                    "Internal server error".to_string(),
                )
            }
        };

        let body = ErrorBody {
            error: message,
            code,
            timestamp: chrono::Utc::now().to_rfc3339(),
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    async fn body_json(response: Response) -> serde_json::Value {
        let body = to_bytes(response.into_body(), 64 * 1024).await.unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    #[tokio::test]
    async fn decode_errors_are_client_errors() {
        let response = ApiError::from(Error::decode("<buffer>", "bad header")).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = body_json(response).await;
        assert_eq!(json["code"], "DECODE_ERROR");
    }

    #[tokio::test]
    async fn dimension_errors_are_client_errors() {
        let err = Error::Dimension {
            width: 9,
            height: 9,
            channels: 3,
            reason: "too small".into(),
        };
        let response = ApiError::from(err).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["code"], "DIMENSION_ERROR");
    }

    #[tokio::test]
    async fn inference_failures_hide_details() {
        let err = Error::DtypeMismatch {
            expected: "Uint8".into(),
            actual: "Float32".into(),
        };
        let response = ApiError::from(err).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let json = body_json(response).await;
        assert_eq!(json["code"], "INFERENCE_FAILED");
        assert!(!json["error"].as_str().unwrap().contains("Uint8"));
    }

    #[tokio::test]
    async fn model_not_loaded_returns_503() {
        let response = ApiError::ModelNotLoaded.into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body_json(response).await["error"], "Model not loaded");
    }

    #[tokio::test]
    async fn payload_too_large_mentions_limit() {
        let response = ApiError::PayloadTooLarge(16).into_response();
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(
            body_json(response).await["error"],
            "File too large. Maximum size is 16MB."
        );
    }
}
