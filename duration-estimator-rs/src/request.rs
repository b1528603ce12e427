//! Task estimation request and its feature-row projection.

use std::fmt;

use serde::de::{self, Deserializer, Visitor};
use serde::{Deserialize, Serialize};

/// Whether a feature column carries a category label or a number
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureKind {
    Categorical,
    Numeric,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeatureColumn {
    pub name: &'static str,
    pub kind: FeatureKind,
}

const fn column(name: &'static str, kind: FeatureKind) -> FeatureColumn {
    FeatureColumn { name, kind }
}

/// Column order of the feature row. Model artifacts are trained against this
/// exact order and are rejected at load time if they declare anything else.
pub const FEATURE_COLUMNS: [FeatureColumn; 8] = [
    column("task_type", FeatureKind::Categorical),
    column("crew_size", FeatureKind::Numeric),
    column("area_of_work", FeatureKind::Numeric),
    column("equipment_type", FeatureKind::Categorical),
    column("labour_working_hours", FeatureKind::Numeric),
    column("soil_type", FeatureKind::Categorical),
    column("temperature", FeatureKind::Numeric),
    column("sea_level", FeatureKind::Numeric),
];

/// Inbound request body for `POST /predict`
///
/// Only presence and JSON type are checked; range checks (non-negative crew
/// size and the like) are left to the model. Numeric fields also accept
/// numeric strings, and integer fields accept integral floats such as `5.0`.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct TaskEstimationRequest {
    pub task_type: String,
    #[serde(deserialize_with = "lenient_integer")]
    pub crew_size: i64,
    #[serde(deserialize_with = "lenient_number")]
    pub area_of_work: f64,
    pub equipment_type: String,
    #[serde(deserialize_with = "lenient_integer")]
    pub labour_working_hours: i64,
    pub soil_type: String,
    #[serde(deserialize_with = "lenient_number")]
    pub temperature: f64,
    #[serde(deserialize_with = "lenient_number")]
    pub sea_level: f64,
}

// Largest magnitude an f64 can hold that still round-trips through i64
const I64_FLOAT_LIMIT: f64 = 9_223_372_036_854_774_784.0;

fn integral_float<E: de::Error>(value: f64) -> Result<i64, E> {
    if value.is_finite() && value.fract() == 0.0 && value.abs() <= I64_FLOAT_LIMIT {
        Ok(value as i64)
    } else {
        Err(E::invalid_value(de::Unexpected::Float(value), &"an integer"))
    }
}

struct IntegerVisitor;

impl<'de> Visitor<'de> for IntegerVisitor {
    type Value = i64;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("an integer or a string holding one")
    }

    fn visit_i64<E: de::Error>(self, value: i64) -> Result<i64, E> {
        Ok(value)
    }

    fn visit_u64<E: de::Error>(self, value: u64) -> Result<i64, E> {
        i64::try_from(value)
            .map_err(|_| E::invalid_value(de::Unexpected::Unsigned(value), &self))
    }

    fn visit_f64<E: de::Error>(self, value: f64) -> Result<i64, E> {
        integral_float(value)
    }

    fn visit_str<E: de::Error>(self, value: &str) -> Result<i64, E> {
        let trimmed = value.trim();
        if let Ok(parsed) = trimmed.parse::<i64>() {
            return Ok(parsed);
        }
        match trimmed.parse::<f64>() {
            Ok(parsed) => integral_float(parsed),
            Err(_) => Err(E::invalid_value(de::Unexpected::Str(value), &self)),
        }
    }
}

struct NumberVisitor;

impl<'de> Visitor<'de> for NumberVisitor {
    type Value = f64;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a number or a string holding one")
    }

    fn visit_i64<E: de::Error>(self, value: i64) -> Result<f64, E> {
        Ok(value as f64)
    }

    fn visit_u64<E: de::Error>(self, value: u64) -> Result<f64, E> {
        Ok(value as f64)
    }

    fn visit_f64<E: de::Error>(self, value: f64) -> Result<f64, E> {
        Ok(value)
    }

    fn visit_str<E: de::Error>(self, value: &str) -> Result<f64, E> {
        // `f64::from_str` takes "NaN" and "inf"; only finite values are numbers here
        match value.trim().parse::<f64>() {
            Ok(parsed) if parsed.is_finite() => Ok(parsed),
            _ => Err(E::invalid_value(de::Unexpected::Str(value), &self)),
        }
    }
}

fn lenient_integer<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
    deserializer.deserialize_any(IntegerVisitor)
}

fn lenient_number<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
    deserializer.deserialize_any(NumberVisitor)
}

#[derive(Debug, Clone, PartialEq)]
pub enum FeatureValue {
    Categorical(String),
    Numeric(f64),
}

impl FeatureValue {
    pub fn kind(&self) -> FeatureKind {
        match self {
            FeatureValue::Categorical(_) => FeatureKind::Categorical,
            FeatureValue::Numeric(_) => FeatureKind::Numeric,
        }
    }
}

/// Single-row tabular form of a request, cells in [`FEATURE_COLUMNS`] order
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureRow {
    values: [FeatureValue; 8],
}

impl FeatureRow {
    pub fn values(&self) -> &[FeatureValue] {
        &self.values
    }

    pub fn get(&self, name: &str) -> Option<&FeatureValue> {
        FEATURE_COLUMNS
            .iter()
            .position(|c| c.name == name)
            .map(|idx| &self.values[idx])
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &FeatureValue)> {
        FEATURE_COLUMNS.iter().map(|c| c.name).zip(self.values.iter())
    }
}

impl From<TaskEstimationRequest> for FeatureRow {
    fn from(req: TaskEstimationRequest) -> Self {
        Self {
            values: [
                FeatureValue::Categorical(req.task_type),
                FeatureValue::Numeric(req.crew_size as f64),
                FeatureValue::Numeric(req.area_of_work),
                FeatureValue::Categorical(req.equipment_type),
                FeatureValue::Numeric(req.labour_working_hours as f64),
                FeatureValue::Categorical(req.soil_type),
                FeatureValue::Numeric(req.temperature),
                FeatureValue::Numeric(req.sea_level),
            ],
        }
    }
}
