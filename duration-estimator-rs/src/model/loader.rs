use std::path::Path;
use std::sync::Arc;

use super::{ArtifactModel, ModelLoadError, Predictor};

/// Load the predictor named by `path`, dispatching on the file extension.
///
/// Any failure here is a deployment error and is meant to abort startup.
pub fn load_predictor(path: &Path) -> Result<Arc<dyn Predictor>, ModelLoadError> {
    if !path.exists() {
        return Err(ModelLoadError::NotFound(path.to_path_buf()));
    }

    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();

    let predictor: Arc<dyn Predictor> = match extension.as_str() {
        "json" => Arc::new(ArtifactModel::from_path(path)?),
        "onnx" => load_onnx(path)?,
        "" => {
            return Err(ModelLoadError::UnsupportedFormat(format!(
                "{} has no file extension",
                path.display()
            )))
        }
        other => {
            return Err(ModelLoadError::UnsupportedFormat(format!(
                "'.{}' artifacts are not supported",
                other
            )))
        }
    };

    let info = predictor.info();
    tracing::info!(
        model = %info.name,
        version = %info.version,
        backend = %info.backend,
        encoded_width = info.encoded_width,
        "Loaded model artifact from {}",
        path.display()
    );

    Ok(predictor)
}

#[cfg(feature = "onnx")]
fn load_onnx(path: &Path) -> Result<Arc<dyn Predictor>, ModelLoadError> {
    Ok(Arc::new(super::onnx::OnnxModel::from_path(path)?))
}

#[cfg(not(feature = "onnx"))]
fn load_onnx(_path: &Path) -> Result<Arc<dyn Predictor>, ModelLoadError> {
    Err(ModelLoadError::UnsupportedFormat(
        "ONNX support is not compiled in; rebuild with the `onnx` feature".to_string(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn missing_path_is_not_found() {
        let err = load_predictor(Path::new("/srv/models/absent.json")).err().unwrap();
        assert!(matches!(err, ModelLoadError::NotFound(_)));
    }

    #[test]
    fn unknown_extension_is_unsupported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("construction_time_predictor.pkl");
        fs::write(&path, b"\x80\x04").unwrap();
        let err = load_predictor(&path).err().unwrap();
        assert!(matches!(err, ModelLoadError::UnsupportedFormat(_)));
    }

    #[cfg(not(feature = "onnx"))]
    #[test]
    fn onnx_requires_feature() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.onnx");
        fs::write(&path, b"").unwrap();
        let err = load_predictor(&path).err().unwrap();
        assert!(matches!(err, ModelLoadError::UnsupportedFormat(_)));
    }
}
