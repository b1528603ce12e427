//! Input contract carried by a model artifact: column names, order, kinds,
//! categorical vocabularies and the policy for unseen categories.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use super::{ModelLoadError, PredictionError};
use crate::request::{FeatureKind, FeatureRow, FeatureValue, FEATURE_COLUMNS};

/// What to do with a categorical value that is not in the vocabulary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HandleUnknown {
    /// Fail the prediction
    #[default]
    Error,
    /// Encode as an all-zero one-hot block
    Ignore,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ColumnEncoding {
    Numeric,
    Categorical { categories: Vec<String> },
}

impl ColumnEncoding {
    pub fn kind(&self) -> FeatureKind {
        match self {
            ColumnEncoding::Numeric => FeatureKind::Numeric,
            ColumnEncoding::Categorical { .. } => FeatureKind::Categorical,
        }
    }

    /// Number of encoded features this column expands into
    pub fn width(&self) -> usize {
        match self {
            ColumnEncoding::Numeric => 1,
            ColumnEncoding::Categorical { categories } => categories.len(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnSpec {
    pub name: String,
    #[serde(flatten)]
    pub encoding: ColumnEncoding,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputContract {
    pub columns: Vec<ColumnSpec>,
    #[serde(default)]
    pub handle_unknown: HandleUnknown,
}

impl InputContract {
    /// Check the contract against the request columns. Called once at load
    /// time; `encode` relies on the positional match it establishes.
    pub fn verify(&self) -> Result<(), ModelLoadError> {
        if self.columns.len() != FEATURE_COLUMNS.len() {
            return Err(ModelLoadError::Incompatible(format!(
                "artifact declares {} input columns, expected {}",
                self.columns.len(),
                FEATURE_COLUMNS.len()
            )));
        }

        for (idx, (spec, expected)) in self.columns.iter().zip(FEATURE_COLUMNS.iter()).enumerate() {
            if spec.name != expected.name {
                return Err(ModelLoadError::Incompatible(format!(
                    "input column {} is '{}', expected '{}'",
                    idx, spec.name, expected.name
                )));
            }
            if spec.encoding.kind() != expected.kind {
                return Err(ModelLoadError::Incompatible(format!(
                    "column '{}' is declared {:?}, expected {:?}",
                    spec.name,
                    spec.encoding.kind(),
                    expected.kind
                )));
            }
            if let ColumnEncoding::Categorical { categories } = &spec.encoding {
                if categories.is_empty() {
                    return Err(ModelLoadError::Incompatible(format!(
                        "column '{}' has an empty category list",
                        spec.name
                    )));
                }
                let mut seen = HashSet::new();
                if let Some(dup) = categories.iter().find(|c| !seen.insert(c.as_str())) {
                    return Err(ModelLoadError::Incompatible(format!(
                        "column '{}' lists category '{}' twice",
                        spec.name, dup
                    )));
                }
            }
        }

        Ok(())
    }

    /// Length of the encoded feature vector
    pub fn encoded_width(&self) -> usize {
        self.columns.iter().map(|c| c.encoding.width()).sum()
    }

    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    /// Encode one feature row, appending `encoded_width()` values to `out`
    pub fn encode_into(&self, row: &FeatureRow, out: &mut Vec<f64>) -> Result<(), PredictionError> {
        for (spec, value) in self.columns.iter().zip(row.values()) {
            match (&spec.encoding, value) {
                (ColumnEncoding::Numeric, FeatureValue::Numeric(x)) => out.push(*x),
                (ColumnEncoding::Categorical { categories }, FeatureValue::Categorical(label)) => {
                    let hit = categories.iter().position(|c| c == label);
                    if hit.is_none() && self.handle_unknown == HandleUnknown::Error {
                        return Err(PredictionError::UnknownCategory {
                            column: spec.name.clone(),
                            value: label.clone(),
                        });
                    }
                    out.extend((0..categories.len()).map(|i| if Some(i) == hit { 1.0 } else { 0.0 }));
                }
                (encoding, value) => {
                    return Err(PredictionError::KindMismatch {
                        column: spec.name.clone(),
                        expected: encoding.kind(),
                        actual: value.kind(),
                    });
                }
            }
        }
        Ok(())
    }

    pub fn encode(&self, row: &FeatureRow) -> Result<Vec<f64>, PredictionError> {
        let mut out = Vec::with_capacity(self.encoded_width());
        self.encode_into(row, &mut out)?;
        Ok(out)
    }
}
