//! Request validation for the estimator endpoints
//!
//! Bodies go through three gates before anything reaches the predictor:
//! UTF-8/JSON parsing, the JSON schema below (presence and type of every
//! field), and typed deserialization into [`TaskEstimationRequest`].

use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use jsonschema::{Draft, JSONSchema};
use serde_json::{json, Value};

use crate::request::TaskEstimationRequest;

lazy_static::lazy_static! {
    /// Integer fields: a JSON integer (an integral float counts) or a string holding one
    static ref INTEGER_FIELD: Value = json!({
        "anyOf": [
            { "type": "integer" },
            { "type": "string", "pattern": r"^\s*[-+]?\d+(\.0*)?\s*$" }
        ]
    });

    /// Number fields: a JSON number or a string holding a finite decimal
    static ref NUMBER_FIELD: Value = json!({
        "anyOf": [
            { "type": "number" },
            { "type": "string", "pattern": r"^\s*[-+]?(\d+(\.\d*)?|\.\d+)([eE][-+]?\d+)?\s*$" }
        ]
    });

    /// JSON Schema for estimation requests
    static ref TASK_REQUEST_SCHEMA_VALUE: Value = json!({
        "type": "object",
        "required": [
            "task_type",
            "crew_size",
            "area_of_work",
            "equipment_type",
            "labour_working_hours",
            "soil_type",
            "temperature",
            "sea_level"
        ],
        "properties": {
            "task_type": { "type": "string" },
            "crew_size": INTEGER_FIELD.clone(),
            "area_of_work": NUMBER_FIELD.clone(),
            "equipment_type": { "type": "string" },
            "labour_working_hours": INTEGER_FIELD.clone(),
            "soil_type": { "type": "string" },
            "temperature": NUMBER_FIELD.clone(),
            "sea_level": NUMBER_FIELD.clone()
        }
    });

    /// Schema for a single `POST /predict` body
    pub static ref TASK_REQUEST_SCHEMA: JSONSchema = JSONSchema::options()
        .with_draft(Draft::Draft7)
        .compile(&TASK_REQUEST_SCHEMA_VALUE)
        .expect("Invalid schema");

    /// Schema for a `POST /predict/batch` body
    pub static ref BATCH_REQUEST_SCHEMA: JSONSchema = {
        let schema = json!({
            "type": "array",
            "minItems": 1,
            "items": TASK_REQUEST_SCHEMA_VALUE.clone()
        });

        JSONSchema::options()
            .with_draft(Draft::Draft7)
            .compile(&schema)
            .expect("Invalid schema")
    };
}

/// Error response for validation failures
#[derive(Debug, serde::Serialize)]
pub struct ValidationErrorResponse {
    pub error: String,
    pub code: u16,
    pub details: Option<Vec<String>>,
}

/// Validation error for API requests
#[derive(Debug, thiserror::Error)]
pub enum ApiValidationError {
    #[error("Invalid request format: {0}")]
    InvalidFormat(String),

    #[error("Content type must be {0}")]
    ContentType(String),

    #[error("Request payload too large: {0}")]
    PayloadTooLarge(String),

    #[error("Schema validation failed: {}", .0.join("; "))]
    Schema(Vec<String>),
}

impl ApiValidationError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::InvalidFormat(_) | Self::Schema(_) => StatusCode::BAD_REQUEST,
            Self::ContentType(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            Self::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
        }
    }

    /// Convert to HTTP status code and error response
    pub fn to_response(&self) -> (StatusCode, Json<ValidationErrorResponse>) {
        let status = self.status();
        let details = match self {
            Self::Schema(violations) => Some(violations.clone()),
            _ => None,
        };

        (
            status,
            Json(ValidationErrorResponse {
                error: self.to_string(),
                code: status.as_u16(),
                details,
            }),
        )
    }
}

/// Validate the Content-Type header
pub fn validate_content_type(headers: &HeaderMap, expected: &str) -> Result<(), ApiValidationError> {
    let content_type = headers
        .get("content-type")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();

    if !content_type.starts_with(expected) {
        return Err(ApiValidationError::ContentType(format!(
            "Expected content type '{}', got '{}'",
            expected, content_type
        )));
    }

    Ok(())
}

/// Parse a raw body into a JSON value
pub fn parse_json_input(body: &[u8]) -> Result<Value, ApiValidationError> {
    let body_str = std::str::from_utf8(body).map_err(|_| {
        ApiValidationError::InvalidFormat("Request body is not valid UTF-8".to_string())
    })?;

    serde_json::from_str::<Value>(body_str.trim())
        .map_err(|e| ApiValidationError::InvalidFormat(format!("Invalid JSON: {}", e)))
}

/// Check a JSON value against a compiled schema, collecting every violation
pub fn validate_json_schema(schema: &JSONSchema, json: &Value) -> Result<(), ApiValidationError> {
    if let Err(errors) = schema.validate(json) {
        let mut details: Vec<String> = errors
            .map(|err| {
                let path = err.instance_path.to_string();
                if path.is_empty() {
                    err.to_string()
                } else {
                    format!("{} at {}", err, path)
                }
            })
            .collect();

        if details.is_empty() {
            details.push("Schema validation failed".to_string());
        }
        return Err(ApiValidationError::Schema(details));
    }

    Ok(())
}

fn into_request(value: Value) -> Result<TaskEstimationRequest, ApiValidationError> {
    // Catches what the patterns cannot: out-of-range integers and overflowing decimals
    serde_json::from_value(value).map_err(|e| ApiValidationError::Schema(vec![e.to_string()]))
}

/// Validate and deserialize a single estimation request body
pub fn parse_estimation_request(body: &[u8]) -> Result<TaskEstimationRequest, ApiValidationError> {
    let json = parse_json_input(body)?;
    validate_json_schema(&TASK_REQUEST_SCHEMA, &json)?;
    into_request(json)
}

/// Validate and deserialize a batch body of at most `max_items` requests
pub fn parse_batch_request(
    body: &[u8],
    max_items: usize,
) -> Result<Vec<TaskEstimationRequest>, ApiValidationError> {
    let json = parse_json_input(body)?;

    if let Value::Array(items) = &json {
        if items.len() > max_items {
            return Err(ApiValidationError::PayloadTooLarge(format!(
                "Batch of {} requests exceeds maximum of {}",
                items.len(),
                max_items
            )));
        }
    }

    validate_json_schema(&BATCH_REQUEST_SCHEMA, &json)?;

    match json {
        Value::Array(items) => items
            .into_iter()
            .enumerate()
            .map(|(idx, item)| {
                into_request(item).map_err(|err| match err {
                    ApiValidationError::Schema(details) => ApiValidationError::Schema(
                        details.into_iter().map(|d| format!("item {}: {}", idx, d)).collect(),
                    ),
                    other => other,
                })
            })
            .collect(),
        _ => Err(ApiValidationError::InvalidFormat(
            "Batch body must be a JSON array".to_string(),
        )),
    }
}
