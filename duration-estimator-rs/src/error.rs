use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

use crate::model::PredictionError;
use crate::validation::{ApiValidationError, ValidationErrorResponse};

/// Server-side failure after a request passed validation
#[derive(Debug, thiserror::Error)]
pub enum EstimationError {
    #[error(transparent)]
    Prediction(#[from] PredictionError),

    #[error("inference worker failed: {0}")]
    Worker(String),
}

/// Everything a handler can return instead of a success body
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Validation(#[from] ApiValidationError),

    #[error(transparent)]
    Estimation(#[from] EstimationError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Validation(err) => err.to_response().into_response(),
            ApiError::Estimation(err) => {
                // Inference failures stay opaque to the client
                tracing::error!(error = %err, "Prediction failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(ValidationErrorResponse {
                        error: "Prediction failed".to_string(),
                        code: StatusCode::INTERNAL_SERVER_ERROR.as_u16(),
                        details: None,
                    }),
                )
                    .into_response()
            }
        }
    }
}
