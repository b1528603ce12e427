//! Construction task duration estimator
//!
//! Serves a pre-trained regression model over HTTP. The model is loaded once
//! at startup and shared read-only by every request; each request runs a
//! validate, build feature row, infer, round sequence with no other state.

use std::sync::Arc;
use std::time::Instant;

use axum::{
    body::{Body, Bytes},
    extract::State,
    http::{Method, Request, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;
use tracing::Instrument;

pub mod cors;
pub mod error;
pub mod logging;
pub mod model;
pub mod request;
pub mod shutdown;
pub mod validation;

use error::{ApiError, EstimationError};
use model::{ModelInfo, PredictionError, Predictor};
use request::FeatureRow;
use validation::{
    parse_batch_request, parse_estimation_request, validate_content_type, ValidationErrorResponse,
};

pub const SERVICE_NAME: &str = "duration-estimator";

/// `POST /predict` success body
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionResponse {
    pub predicted_duration: f64,
}

/// `POST /predict/batch` success body
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchPredictionResponse {
    pub predicted_durations: Vec<f64>,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub healthy: bool,
    pub service_name: String,
    pub uptime_seconds: i64,
    pub started_at: String,
    pub status: String,
    pub model_version: String,
}

/// Round to two decimal places on the scaled value, halves away from zero,
/// so an exact binary half such as `0.125` becomes `0.13`
pub fn round_to_cents(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Estimator state shared by all handlers
pub struct Estimator {
    predictor: Arc<dyn Predictor>,
    max_batch_size: usize,
    started: Instant,
    started_at: DateTime<Utc>,
}

impl Estimator {
    pub fn new(predictor: Arc<dyn Predictor>, max_batch_size: usize) -> Self {
        Self {
            predictor,
            max_batch_size,
            started: Instant::now(),
            started_at: Utc::now(),
        }
    }

    pub fn model_info(&self) -> ModelInfo {
        self.predictor.info()
    }

    /// Create the Axum router with all routes and middleware
    pub fn create_router(self: Arc<Self>, cors: CorsLayer, max_payload_bytes: usize) -> Router {
        Router::new()
            .route("/", get(Self::root_handler))
            .route("/health", get(Self::health_handler))
            .route("/model", get(Self::model_handler))
            .route("/predict", post(Self::predict_handler))
            .route("/predict/batch", post(Self::batch_predict_handler))
            .layer(middleware::from_fn(Self::require_json_middleware))
            .layer(RequestBodyLimitLayer::new(max_payload_bytes))
            .layer(TraceLayer::new_for_http())
            .layer(cors)
            .with_state(self)
    }

    /// Run the predictor on the blocking pool and check it answered every row
    async fn run_inference(&self, rows: Vec<FeatureRow>) -> Result<Vec<f64>, EstimationError> {
        let expected = rows.len();
        let predictor = Arc::clone(&self.predictor);

        let outputs = tokio::task::spawn_blocking(move || predictor.predict(&rows))
            .await
            .map_err(|e| EstimationError::Worker(e.to_string()))??;

        if outputs.len() != expected {
            return Err(PredictionError::OutputCount {
                expected,
                produced: outputs.len(),
            }
            .into());
        }
        Ok(outputs)
    }

    async fn root_handler() -> impl IntoResponse {
        Json(serde_json::json!({
            "service": SERVICE_NAME,
            "version": env!("CARGO_PKG_VERSION"),
            "endpoints": [
                "GET /health",
                "GET /model",
                "POST /predict",
                "POST /predict/batch"
            ]
        }))
    }

    async fn health_handler(State(state): State<Arc<Self>>) -> impl IntoResponse {
        Json(HealthResponse {
            healthy: true,
            service_name: SERVICE_NAME.to_string(),
            uptime_seconds: state.started.elapsed().as_secs() as i64,
            started_at: state.started_at.to_rfc3339(),
            status: "SERVING".to_string(),
            model_version: state.predictor.info().version,
        })
    }

    async fn model_handler(State(state): State<Arc<Self>>) -> impl IntoResponse {
        Json(state.model_info())
    }

    async fn predict_handler(
        State(state): State<Arc<Self>>,
        body: Bytes,
    ) -> Result<Json<PredictionResponse>, ApiError> {
        let request = parse_estimation_request(&body)?;

        let span = tracing::info_span!(
            "predict",
            request_id = %uuid::Uuid::new_v4(),
            task_type = %request.task_type
        );
        let outputs = state
            .run_inference(vec![FeatureRow::from(request)])
            .instrument(span)
            .await?;

        let predicted = outputs.into_iter().next().ok_or_else(|| {
            EstimationError::from(PredictionError::OutputCount {
                expected: 1,
                produced: 0,
            })
        })?;

        Ok(Json(PredictionResponse {
            predicted_duration: round_to_cents(predicted),
        }))
    }

    async fn batch_predict_handler(
        State(state): State<Arc<Self>>,
        body: Bytes,
    ) -> Result<Json<BatchPredictionResponse>, ApiError> {
        let requests = parse_batch_request(&body, state.max_batch_size)?;

        let span = tracing::info_span!(
            "predict_batch",
            request_id = %uuid::Uuid::new_v4(),
            rows = requests.len()
        );
        let rows = requests.into_iter().map(FeatureRow::from).collect();
        let outputs = state.run_inference(rows).instrument(span).await?;

        Ok(Json(BatchPredictionResponse {
            predicted_durations: outputs.into_iter().map(round_to_cents).collect(),
        }))
    }

    /// POST bodies must be declared as JSON
    async fn require_json_middleware(
        req: Request<Body>,
        next: Next,
    ) -> Result<Response, (StatusCode, Json<ValidationErrorResponse>)> {
        if req.method() == Method::POST {
            if let Err(err) = validate_content_type(req.headers(), "application/json") {
                return Err(err.to_response());
            }
        }

        Ok(next.run(req).await)
    }
}
