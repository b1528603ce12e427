//! Model loading and inference
//!
//! A [`Predictor`] is built once at startup by [`load_predictor`] and shared
//! read-only across requests behind an `Arc`.

use std::path::PathBuf;

use serde::Serialize;

use crate::request::{FeatureKind, FeatureRow};

pub mod artifact;
pub mod contract;
pub mod loader;
#[cfg(feature = "onnx")]
pub mod onnx;
pub mod regressor;

pub use artifact::ArtifactModel;
pub use contract::{ColumnEncoding, ColumnSpec, HandleUnknown, InputContract};
pub use loader::load_predictor;
pub use regressor::Regressor;

/// Inference over feature rows
///
/// Implementations must be reentrant: `predict` takes `&self` and is called
/// concurrently from the blocking pool.
pub trait Predictor: Send + Sync {
    /// One output per input row, in input order
    fn predict(&self, rows: &[FeatureRow]) -> Result<Vec<f64>, PredictionError>;

    fn info(&self) -> ModelInfo;
}

/// Model metadata reported by `GET /model`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelInfo {
    pub name: String,
    pub version: String,
    pub backend: String,
    pub trained_at: Option<String>,
    pub input_columns: Vec<String>,
    pub encoded_width: usize,
}

/// Failure while running inference on already-validated input
#[derive(Debug, thiserror::Error)]
pub enum PredictionError {
    #[error("unknown category '{value}' for column '{column}'")]
    UnknownCategory { column: String, value: String },

    #[error("column '{column}' expects a {expected:?} value, got {actual:?}")]
    KindMismatch {
        column: String,
        expected: FeatureKind,
        actual: FeatureKind,
    },

    #[error("model produced a non-finite prediction ({0})")]
    NonFinite(f64),

    #[error("model produced {produced} outputs for {expected} rows")]
    OutputCount { expected: usize, produced: usize },

    #[error("inference backend failed: {0}")]
    Backend(String),
}

/// Failure while loading a model artifact at startup
#[derive(Debug, thiserror::Error)]
pub enum ModelLoadError {
    #[error("model artifact not found at {0}")]
    NotFound(PathBuf),

    #[error("failed to read model artifact {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse model artifact {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("model artifact is incompatible: {0}")]
    Incompatible(String),

    #[error("unsupported model format: {0}")]
    UnsupportedFormat(String),

    #[error("failed to load ONNX model: {0}")]
    Onnx(String),
}

/// Reject NaN and infinite outputs before they reach a response
pub(crate) fn ensure_finite(value: f64) -> Result<f64, PredictionError> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(PredictionError::NonFinite(value))
    }
}
