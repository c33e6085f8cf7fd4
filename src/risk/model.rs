use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ModelError {
    #[error("Model file not found: {0}")]
    NotFound(PathBuf),

    #[error("Unsupported model format: {0}")]
    Unsupported(String),

    #[error("Failed to read model: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid model definition: {0}")]
    Invalid(String),

    #[error("Model initialization failed: {0}")]
    Init(String),
}

/// A predictive model mapping named features to a probability.
///
/// Implementations may return any value; callers validate the range.
pub trait RiskModel: Send + Sync {
    fn predict(&self, features: &BTreeMap<String, f64>) -> Option<f64>;
    fn framework(&self) -> &'static str;
    fn version(&self) -> Option<String>;
}

// ═══════════════════════════════════════════════════════════
// JSON logistic model
// ═══════════════════════════════════════════════════════════

/// `sigmoid(intercept + Σ coefficient[name] * feature[name])`.
///
/// Features without a coefficient are ignored; coefficients without a
/// feature make the prediction fail.
#[derive(Debug, Clone, Deserialize)]
pub struct LogisticModel {
    pub intercept: f64,
    pub coefficients: BTreeMap<String, f64>,
    #[serde(default)]
    pub version: Option<String>,
}

impl LogisticModel {
    pub fn from_file(path: &Path) -> Result<Self, ModelError> {
        let raw = std::fs::read_to_string(path)?;
        let model: Self =
            serde_json::from_str(&raw).map_err(|e| ModelError::Invalid(e.to_string()))?;
        if !model.intercept.is_finite() || model.coefficients.values().any(|c| !c.is_finite()) {
            return Err(ModelError::Invalid("non-finite weight".into()));
        }
        Ok(model)
    }
}

impl RiskModel for LogisticModel {
    fn predict(&self, features: &BTreeMap<String, f64>) -> Option<f64> {
        let mut z = self.intercept;
        for (name, weight) in &self.coefficients {
            z += weight * features.get(name)?;
        }
        Some(1.0 / (1.0 + (-z).exp()))
    }

    fn framework(&self) -> &'static str {
        "json-logistic"
    }

    fn version(&self) -> Option<String> {
        self.version.clone()
    }
}

// ═══════════════════════════════════════════════════════════
// ONNX model: behind `onnx-model` feature
// ═══════════════════════════════════════════════════════════

#[cfg(feature = "onnx-model")]
mod onnx {
    use super::{ModelError, RiskModel};
    use ort::session::Session;
    use std::collections::BTreeMap;
    use std::path::Path;
    use std::sync::Mutex;

    /// Single-input ONNX classifier fed a `[1, n]` float row of features
    /// in name order. The last value of the first output is taken as
    /// the positive-class probability.
    ///
    /// `Session::run` needs `&mut self`, hence the Mutex.
    pub struct OnnxRiskModel {
        session: Mutex<Session>,
    }

    impl OnnxRiskModel {
        pub fn load(path: &Path) -> Result<Self, ModelError> {
            let session = Session::builder()
                .map_err(|e: ort::Error| ModelError::Init(e.to_string()))?
                .with_intra_threads(1)
                .map_err(|e: ort::Error| ModelError::Init(e.to_string()))?
                .commit_from_file(path)
                .map_err(|e: ort::Error| ModelError::Init(format!("ONNX load failed: {e}")))?;
            tracing::info!("ONNX risk model loaded from {}", path.display());
            Ok(Self { session: Mutex::new(session) })
        }

        fn infer(&self, features: &BTreeMap<String, f64>) -> Result<f64, String> {
            use ort::value::TensorRef;

            let row: Vec<f32> = features.values().map(|v| *v as f32).collect();
            let input = ndarray::Array2::from_shape_vec((1, row.len()), row)
                .map_err(|e| e.to_string())?;
            let tensor = TensorRef::from_array_view(&input).map_err(|e| e.to_string())?;

            let mut session = self
                .session
                .lock()
                .map_err(|_| "Session lock poisoned".to_string())?;
            let outputs = session
                .run(ort::inputs![tensor])
                .map_err(|e| format!("ONNX inference failed: {e}"))?;
            let (_, data) = outputs[0]
                .try_extract_tensor::<f32>()
                .map_err(|e| format!("Output extraction: {e}"))?;
            data.last()
                .map(|p| f64::from(*p))
                .ok_or_else(|| "empty model output".to_string())
        }
    }

    impl RiskModel for OnnxRiskModel {
        fn predict(&self, features: &BTreeMap<String, f64>) -> Option<f64> {
            match self.infer(features) {
                Ok(p) => Some(p),
                Err(e) => {
                    tracing::warn!(error = %e, "ONNX risk prediction failed");
                    None
                }
            }
        }

        fn framework(&self) -> &'static str {
            "onnxruntime"
        }

        fn version(&self) -> Option<String> {
            None
        }
    }
}

#[cfg(feature = "onnx-model")]
pub use onnx::OnnxRiskModel;

// ═══════════════════════════════════════════════════════════
// Service
// ═══════════════════════════════════════════════════════════

/// Reported alongside every composite score.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelInfo {
    pub loaded: bool,
    pub path: Option<String>,
    pub framework: Option<String>,
    pub version: Option<String>,
}

/// Owns the outcome of the one-time model load.
pub struct RiskModelService {
    path: Option<PathBuf>,
    model: Option<Box<dyn RiskModel>>,
    load_error: Option<String>,
}

impl RiskModelService {
    /// Attempt the load once. Failure is logged and cached; the service
    /// then always falls back to the heuristic.
    pub fn load(path: Option<&Path>) -> Self {
        let Some(path) = path else {
            return Self::disabled();
        };
        match load_model(path) {
            Ok(model) => {
                tracing::info!(path = %path.display(), framework = model.framework(), "Risk model loaded");
                Self { path: Some(path.to_path_buf()), model: Some(model), load_error: None }
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Risk model unavailable, using heuristic");
                Self { path: Some(path.to_path_buf()), model: None, load_error: Some(e.to_string()) }
            }
        }
    }

    pub fn disabled() -> Self {
        Self { path: None, model: None, load_error: None }
    }

    pub fn with_model(model: Box<dyn RiskModel>) -> Self {
        Self { path: None, model: Some(model), load_error: None }
    }

    /// Probability in `[0, 1]`, or `None` when no model is loaded or the
    /// model produced an error, a non-finite or an out-of-range value.
    pub fn predict(&self, features: &BTreeMap<String, f64>) -> Option<f64> {
        let model = self.model.as_ref()?;
        match model.predict(features) {
            Some(p) if p.is_finite() && (0.0..=1.0).contains(&p) => Some(p),
            Some(p) => {
                tracing::warn!(value = p, "Risk model returned out-of-range value, ignoring");
                None
            }
            None => None,
        }
    }

    pub fn load_error(&self) -> Option<&str> {
        self.load_error.as_deref()
    }

    pub fn info(&self) -> ModelInfo {
        ModelInfo {
            loaded: self.model.is_some(),
            path: self.path.as_ref().map(|p| p.display().to_string()),
            framework: self.model.as_ref().map(|m| m.framework().to_string()),
            version: self.model.as_ref().and_then(|m| m.version()),
        }
    }
}

fn load_model(path: &Path) -> Result<Box<dyn RiskModel>, ModelError> {
    if !path.exists() {
        return Err(ModelError::NotFound(path.to_path_buf()));
    }
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();
    match ext.as_str() {
        "json" => Ok(Box::new(LogisticModel::from_file(path)?)),
        #[cfg(feature = "onnx-model")]
        "onnx" => Ok(Box::new(OnnxRiskModel::load(path)?)),
        #[cfg(not(feature = "onnx-model"))]
        "onnx" => Err(ModelError::Unsupported(
            "onnx (build with the onnx-model feature)".into(),
        )),
        other => Err(ModelError::Unsupported(other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedModel(Option<f64>);

    impl RiskModel for FixedModel {
        fn predict(&self, _: &BTreeMap<String, f64>) -> Option<f64> {
            self.0
        }
        fn framework(&self) -> &'static str {
            "fixed"
        }
        fn version(&self) -> Option<String> {
            Some("t1".into())
        }
    }

    fn features() -> BTreeMap<String, f64> {
        [("bmi", 27.0), ("dia", 90.0), ("glucose", 150.0), ("sys", 145.0)]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect()
    }

    #[test]
    fn no_path_means_disabled() {
        let service = RiskModelService::load(None);
        assert!(!service.info().loaded);
        assert_eq!(service.predict(&features()), None);
    }

    #[test]
    fn missing_file_is_cached_failure() {
        let service = RiskModelService::load(Some(Path::new("/nonexistent/model.json")));
        let info = service.info();
        assert!(!info.loaded);
        assert_eq!(info.path.as_deref(), Some("/nonexistent/model.json"));
        assert!(service.load_error().is_some());
        assert_eq!(service.predict(&features()), None);
    }

    #[test]
    fn json_logistic_model_loads_and_predicts() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("risk.json");
        std::fs::write(
            &path,
            r#"{"intercept": 0.0, "coefficients": {"glucose": 0.0}, "version": "v2"}"#,
        )
        .unwrap();

        let service = RiskModelService::load(Some(&path));
        let info = service.info();
        assert!(info.loaded);
        assert_eq!(info.framework.as_deref(), Some("json-logistic"));
        assert_eq!(info.version.as_deref(), Some("v2"));
        assert_eq!(service.predict(&features()), Some(0.5));
    }

    #[test]
    fn malformed_json_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("risk.json");
        std::fs::write(&path, "{not json").unwrap();
        let service = RiskModelService::load(Some(&path));
        assert!(!service.info().loaded);
        assert!(service.load_error().unwrap().contains("Invalid model"));
    }

    #[test]
    fn unknown_extension_is_unsupported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("risk.pkl");
        std::fs::write(&path, "x").unwrap();
        let service = RiskModelService::load(Some(&path));
        assert!(service.load_error().unwrap().contains("Unsupported"));
    }

    #[test]
    fn out_of_range_predictions_are_rejected() {
        assert_eq!(RiskModelService::with_model(Box::new(FixedModel(Some(1.5)))).predict(&features()), None);
        assert_eq!(RiskModelService::with_model(Box::new(FixedModel(Some(f64::NAN)))).predict(&features()), None);
        assert_eq!(RiskModelService::with_model(Box::new(FixedModel(None))).predict(&features()), None);
        assert_eq!(RiskModelService::with_model(Box::new(FixedModel(Some(0.42)))).predict(&features()), Some(0.42));
    }

    #[test]
    fn logistic_requires_every_weighted_feature() {
        let model = LogisticModel {
            intercept: 0.0,
            coefficients: [("hba1c".to_string(), 1.0)].into_iter().collect(),
            version: None,
        };
        assert_eq!(model.predict(&features()), None);
    }
}
