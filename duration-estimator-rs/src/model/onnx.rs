//! ONNX backend: a `[1, width]` f32 graph plus a sidecar contract file.
//!
//! The graph only ever sees numbers; categorical encoding happens here using
//! the sidecar `<model>.contract.json`.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tract_onnx::prelude::*;

use super::contract::InputContract;
use super::{ensure_finite, ModelInfo, ModelLoadError, PredictionError, Predictor};
use crate::request::FeatureRow;

#[derive(Debug, Deserialize)]
struct ContractSidecar {
    name: String,
    version: String,
    #[serde(default)]
    trained_at: Option<String>,
    contract: InputContract,
}

pub struct OnnxModel {
    plan: TypedRunnableModel<TypedModel>,
    width: usize,
    sidecar: ContractSidecar,
}

impl OnnxModel {
    pub fn contract_path(model_path: &Path) -> PathBuf {
        model_path.with_extension("contract.json")
    }

    pub fn from_path(path: &Path) -> Result<Self, ModelLoadError> {
        let sidecar_path = Self::contract_path(path);
        let content = fs::read_to_string(&sidecar_path).map_err(|source| match source.kind() {
            io::ErrorKind::NotFound => ModelLoadError::NotFound(sidecar_path.clone()),
            _ => ModelLoadError::Io {
                path: sidecar_path.clone(),
                source,
            },
        })?;
        let sidecar: ContractSidecar =
            serde_json::from_str(&content).map_err(|source| ModelLoadError::Parse {
                path: sidecar_path.clone(),
                source,
            })?;
        sidecar.contract.verify()?;

        let width = sidecar.contract.encoded_width();
        let plan = tract_onnx::onnx()
            .model_for_path(path)
            .and_then(|model| {
                model.with_input_fact(0, InferenceFact::dt_shape(f32::datum_type(), tvec!(1usize, width)))
            })
            .and_then(|model| model.into_optimized())
            .and_then(|model| model.into_runnable())
            .map_err(|e| ModelLoadError::Onnx(format!("{}: {:#}", path.display(), e)))?;

        Ok(Self { plan, width, sidecar })
    }

    fn predict_row(&self, row: &FeatureRow) -> Result<f64, PredictionError> {
        let encoded: Vec<f32> = self
            .sidecar
            .contract
            .encode(row)?
            .into_iter()
            .map(|x| x as f32)
            .collect();

        let input = Tensor::from_shape(&[1, self.width], &encoded).map_err(backend_error)?;
        let outputs = self.plan.run(tvec!(input.into())).map_err(backend_error)?;
        let first = outputs
            .first()
            .ok_or_else(|| PredictionError::Backend("model returned no outputs".to_string()))?;
        let value = first
            .to_array_view::<f32>()
            .map_err(backend_error)?
            .iter()
            .next()
            .copied()
            .ok_or_else(|| PredictionError::Backend("model returned an empty tensor".to_string()))?;

        ensure_finite(f64::from(value))
    }
}

fn backend_error(e: TractError) -> PredictionError {
    PredictionError::Backend(format!("{:#}", e))
}

impl Predictor for OnnxModel {
    fn predict(&self, rows: &[FeatureRow]) -> Result<Vec<f64>, PredictionError> {
        rows.iter().map(|row| self.predict_row(row)).collect()
    }

    fn info(&self) -> ModelInfo {
        ModelInfo {
            name: self.sidecar.name.clone(),
            version: self.sidecar.version.clone(),
            backend: "onnx".to_string(),
            trained_at: self.sidecar.trained_at.clone(),
            input_columns: self.sidecar.contract.column_names(),
            encoded_width: self.width,
        }
    }
}
