//! Native JSON model artifact.

use std::fs;
use std::io;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::contract::InputContract;
use super::regressor::Regressor;
use super::{ensure_finite, ModelInfo, ModelLoadError, PredictionError, Predictor};
use crate::request::FeatureRow;

pub const SUPPORTED_FORMAT_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactModel {
    pub format_version: u32,
    pub name: String,
    pub version: String,
    #[serde(default)]
    pub trained_at: Option<String>,
    pub contract: InputContract,
    pub regressor: Regressor,
}

impl ArtifactModel {
    pub fn from_path(path: &Path) -> Result<Self, ModelLoadError> {
        let content = fs::read_to_string(path).map_err(|source| match source.kind() {
            io::ErrorKind::NotFound => ModelLoadError::NotFound(path.to_path_buf()),
            _ => ModelLoadError::Io {
                path: path.to_path_buf(),
                source,
            },
        })?;

        let model: Self = serde_json::from_str(&content).map_err(|source| ModelLoadError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        model.verify()?;
        Ok(model)
    }

    pub fn verify(&self) -> Result<(), ModelLoadError> {
        if self.format_version != SUPPORTED_FORMAT_VERSION {
            return Err(ModelLoadError::Incompatible(format!(
                "format_version {} is not supported (expected {})",
                self.format_version, SUPPORTED_FORMAT_VERSION
            )));
        }
        self.contract.verify()?;
        self.regressor.verify(self.contract.encoded_width())
    }
}

impl Predictor for ArtifactModel {
    fn predict(&self, rows: &[FeatureRow]) -> Result<Vec<f64>, PredictionError> {
        let mut encoded = Vec::with_capacity(self.contract.encoded_width());
        rows.iter()
            .map(|row| {
                encoded.clear();
                self.contract.encode_into(row, &mut encoded)?;
                ensure_finite(self.regressor.predict(&encoded))
            })
            .collect()
    }

    fn info(&self) -> ModelInfo {
        ModelInfo {
            name: self.name.clone(),
            version: self.version.clone(),
            backend: format!("json/{}", self.regressor.kind()),
            trained_at: self.trained_at.clone(),
            input_columns: self.contract.column_names(),
            encoded_width: self.contract.encoded_width(),
        }
    }
}
