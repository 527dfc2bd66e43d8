//! Loading of the three training artifacts: column schema, scaler, model.
//!
//! Columns, scaler and linear models are JSON exports of the fitted objects.
//! Models ending in `.onnx` are compiled with tract instead, which covers any
//! regressor the training side can export to ONNX.

use crate::encoding::{FeatureVector, TrainingColumns};
use crate::error::{ArtifactError, PredictError};
use crate::schema::Variant;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use tract_onnx::prelude::*;

pub const DEFAULT_SCALER_FILE: &str = "my_scaler.json";
pub const DEFAULT_COLUMNS_FILE: &str = "model_columns.json";

#[derive(Debug, Clone, PartialEq)]
pub struct ArtifactPaths {
    pub model: PathBuf,
    pub scaler: PathBuf,
    pub columns: PathBuf,
}

impl ArtifactPaths {
    /// Default file names for `variant`, resolved inside `dir`.
    pub fn in_dir(dir: impl AsRef<Path>, variant: Variant) -> Self {
        let dir = dir.as_ref();
        ArtifactPaths {
            model: dir.join(variant.default_model_file()),
            scaler: dir.join(DEFAULT_SCALER_FILE),
            columns: dir.join(DEFAULT_COLUMNS_FILE),
        }
    }
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, ArtifactError> {
    let bytes = fs::read(path).map_err(|source| ArtifactError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_slice(&bytes).map_err(|source| ArtifactError::Json {
        path: path.to_path_buf(),
        source,
    })
}

fn invalid(path: &Path, reason: impl Into<String>) -> ArtifactError {
    ArtifactError::Invalid {
        path: path.to_path_buf(),
        reason: reason.into(),
    }
}

/// Reads the ordered training column list (a JSON array of strings).
pub fn load_columns(path: impl AsRef<Path>) -> Result<TrainingColumns, ArtifactError> {
    let path = path.as_ref();
    let names: Vec<String> = read_json(path)?;
    TrainingColumns::new(names).map_err(|reason| invalid(path, reason))
}

#[derive(Debug, Deserialize)]
struct ScalerFile {
    #[serde(alias = "mean_", alias = "center", alias = "center_")]
    mean: Option<Vec<f64>>,
    #[serde(alias = "scale_")]
    scale: Option<Vec<f64>>,
    #[serde(alias = "n_features_in_")]
    n_features_in: Option<usize>,
    #[serde(alias = "feature_names_in_")]
    feature_names_in: Option<Vec<String>>,
}

/// Fitted per-feature linear transform `(x - center) / scale`.
#[derive(Debug, Clone, PartialEq)]
pub struct Scaler {
    center: Vec<f64>,
    scale: Vec<f64>,
    feature_names: Option<Vec<String>>,
}

impl Scaler {
    pub fn new(center: Vec<f64>, scale: Vec<f64>) -> Result<Self, String> {
        if center.len() != scale.len() {
            return Err(format!(
                "center has {} entries but scale has {}",
                center.len(),
                scale.len()
            ));
        }
        if center.iter().chain(&scale).any(|v| !v.is_finite()) {
            return Err("scaler parameters must be finite".to_string());
        }
        // Constant training columns are stored with scale 0 and left unscaled.
        let scale = scale
            .into_iter()
            .map(|s| if s == 0.0 { 1.0 } else { s })
            .collect();
        Ok(Scaler {
            center,
            scale,
            feature_names: None,
        })
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ArtifactError> {
        let path = path.as_ref();
        let file: ScalerFile = read_json(path)?;

        let width = file
            .mean
            .as_ref()
            .or(file.scale.as_ref())
            .map(Vec::len)
            .or(file.n_features_in)
            .ok_or_else(|| invalid(path, "scaler has neither mean, scale nor n_features_in"))?;
        if let Some(n) = file.n_features_in {
            if n != width {
                return Err(invalid(
                    path,
                    format!("n_features_in is {n} but parameters have {width} entries"),
                ));
            }
        }

        let center = file.mean.unwrap_or_else(|| vec![0.0; width]);
        let scale = file.scale.unwrap_or_else(|| vec![1.0; width]);
        let mut scaler = Scaler::new(center, scale).map_err(|reason| invalid(path, reason))?;

        if let Some(names) = file.feature_names_in {
            if names.len() != width {
                return Err(invalid(
                    path,
                    format!("{} feature names for {width} features", names.len()),
                ));
            }
            scaler.feature_names = Some(names);
        }
        Ok(scaler)
    }

    pub fn n_features(&self) -> usize {
        self.center.len()
    }

    /// Column names recorded at fit time, when the export kept them.
    pub fn feature_names(&self) -> Option<&[String]> {
        self.feature_names.as_deref()
    }

    pub fn transform(&self, features: &FeatureVector) -> Result<FeatureVector, PredictError> {
        if features.len() != self.n_features() {
            return Err(PredictError::AlignmentInconsistency {
                stage: "scaler",
                expected: self.n_features(),
                actual: features.len(),
            });
        }
        Ok(features
            .as_slice()
            .iter()
            .zip(self.center.iter().zip(&self.scale))
            .map(|(x, (center, scale))| (x - center) / scale)
            .collect::<Vec<_>>()
            .into())
    }
}

/// A fitted regressor mapping a fixed-width vector to one scalar.
pub trait Regressor: Send + Sync {
    fn backend(&self) -> &'static str;

    fn n_features(&self) -> usize;

    fn predict(&self, features: &FeatureVector) -> Result<f64, PredictError>;
}

#[derive(Debug, Deserialize)]
struct LinearModelFile {
    #[serde(alias = "coef_", alias = "coefficients")]
    coef: Vec<f64>,
    #[serde(alias = "intercept_", default)]
    intercept: f64,
}

/// `y = coef · x + intercept`
#[derive(Debug, Clone, PartialEq)]
pub struct LinearModel {
    coef: Vec<f64>,
    intercept: f64,
}

impl LinearModel {
    pub fn new(coef: Vec<f64>, intercept: f64) -> Result<Self, String> {
        if coef.is_empty() {
            return Err("model has no coefficients".to_string());
        }
        if !intercept.is_finite() || coef.iter().any(|c| !c.is_finite()) {
            return Err("model parameters must be finite".to_string());
        }
        Ok(LinearModel { coef, intercept })
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ArtifactError> {
        let path = path.as_ref();
        let file: LinearModelFile = read_json(path)?;
        LinearModel::new(file.coef, file.intercept).map_err(|reason| invalid(path, reason))
    }
}

impl Regressor for LinearModel {
    fn backend(&self) -> &'static str {
        "linear"
    }

    fn n_features(&self) -> usize {
        self.coef.len()
    }

    fn predict(&self, features: &FeatureVector) -> Result<f64, PredictError> {
        if features.len() != self.coef.len() {
            return Err(PredictError::AlignmentInconsistency {
                stage: "model",
                expected: self.coef.len(),
                actual: features.len(),
            });
        }
        let dot: f64 = self
            .coef
            .iter()
            .zip(features.as_slice())
            .map(|(c, x)| c * x)
            .sum();
        Ok(dot + self.intercept)
    }
}

/// Any ONNX regressor with a single `f32[1, n]` input and scalar output.
pub struct OnnxModel {
    model: SimplePlan<TypedFact, Box<dyn TypedOp>, Graph<TypedFact, Box<dyn TypedOp>>>,
    n_features: usize,
}

impl OnnxModel {
    pub fn load(path: impl AsRef<Path>, n_features: usize) -> Result<Self, ArtifactError> {
        let path = path.as_ref();
        let model = Self::compile(path, n_features).map_err(|e| ArtifactError::Onnx {
            path: path.to_path_buf(),
            message: format!("{e:#}"),
        })?;
        Ok(Self { model, n_features })
    }

    fn compile(
        path: &Path,
        n_features: usize,
    ) -> TractResult<SimplePlan<TypedFact, Box<dyn TypedOp>, Graph<TypedFact, Box<dyn TypedOp>>>>
    {
        tract_onnx::onnx()
            .model_for_path(path)?
            .with_input_fact(
                0,
                InferenceFact::dt_shape(f32::datum_type(), tvec!(1, n_features)),
            )?
            .into_optimized()?
            .into_runnable()
    }

    fn run(&self, features: &FeatureVector) -> TractResult<f64> {
        let input: Vec<f32> = features.as_slice().iter().map(|&x| x as f32).collect();
        let input_tensor = Tensor::from_shape(&[1, self.n_features], &input)?;
        let outputs = self.model.run(tvec!(input_tensor.into()))?;

        let value: f32 = *outputs[0]
            .to_array_view::<f32>()?
            .iter()
            .next()
            .ok_or_else(|| anyhow::anyhow!("model returned an empty output"))?;
        Ok(value as f64)
    }
}

impl Regressor for OnnxModel {
    fn backend(&self) -> &'static str {
        "onnx"
    }

    fn n_features(&self) -> usize {
        self.n_features
    }

    fn predict(&self, features: &FeatureVector) -> Result<f64, PredictError> {
        if features.len() != self.n_features {
            return Err(PredictError::AlignmentInconsistency {
                stage: "model",
                expected: self.n_features,
                actual: features.len(),
            });
        }
        self.run(features)
            .map_err(|e| PredictError::Inference(format!("{e:#}")))
    }
}

/// Loads the model at `path`, picking the backend from its extension.
pub fn load_regressor(
    path: impl AsRef<Path>,
    n_features: usize,
) -> Result<Box<dyn Regressor>, ArtifactError> {
    let path = path.as_ref();
    let is_onnx = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("onnx"));
    if is_onnx {
        Ok(Box::new(OnnxModel::load(path, n_features)?))
    } else {
        Ok(Box::new(LinearModel::load(path)?))
    }
}
