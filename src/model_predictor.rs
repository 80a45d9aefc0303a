use std::path::Path;

use log::{debug, info};
use ndarray::Array2;
use numpy::IntoPyArray;
use pyo3::prelude::*;
use pyo3::types::IntoPyDict;

use crate::error::{MonitorError, Result};
use crate::features::FeatureRow;

/// A trained model that maps one aligned row to a class id.
pub trait Classifier {
    /// The ordered feature vector the model was trained on.
    fn feature_names(&self) -> &[String];

    /// `row` must already be aligned to `feature_names`.
    fn predict(&self, row: &FeatureRow) -> Result<u32>;
}

/// A scikit-learn compatible estimator pickled with joblib, evaluated in the
/// embedded Python interpreter.
pub struct ModelPredictor {
    model: PyObject,
    feature_names: Vec<String>,
}

impl ModelPredictor {
    /// Loads the estimator and the list of training columns. Both artifacts
    /// are required.
    pub fn new(model_path: &Path, features_path: &Path) -> Result<Self> {
        for path in [model_path, features_path] {
            if !path.is_file() {
                return Err(MonitorError::ModelError(format!(
                    "missing model artifact {}",
                    path.display()
                )));
            }
        }

        Python::with_gil(|py| -> Result<Self> {
            let joblib = py.import("joblib")?;

            let model = joblib
                .call_method1("load", (model_path.to_string_lossy().into_owned(),))?
                .unbind();
            let feature_names: Vec<String> = joblib
                .call_method1("load", (features_path.to_string_lossy().into_owned(),))?
                .extract()?;

            if feature_names.is_empty() {
                return Err(MonitorError::ModelError(format!(
                    "{} lists no features",
                    features_path.display()
                )));
            }
            info!(
                "Loaded model {} expecting {} features",
                model_path.display(),
                feature_names.len()
            );

            Ok(ModelPredictor {
                model,
                feature_names,
            })
        })
    }
}

impl Classifier for ModelPredictor {
    fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    fn predict(&self, row: &FeatureRow) -> Result<u32> {
        let columns: Vec<&str> = row.names().collect();
        let values: Vec<f64> = row.values().collect();
        let matrix = Array2::from_shape_vec((1, values.len()), values)
            .map_err(|e| MonitorError::ModelError(e.to_string()))?;

        Python::with_gil(|py| -> Result<u32> {
            let pandas = py.import("pandas")?;

            // Keep the column names: the estimator checks them against training.
            let kwargs = [("columns", columns)].into_py_dict(py)?;
            let frame = pandas.call_method("DataFrame", (matrix.into_pyarray(py),), Some(&kwargs))?;

            let prediction = self.model.call_method1(py, "predict", (frame,))?;
            let labels: Vec<i64> = prediction.call_method0(py, "tolist")?.extract(py)?;
            let label = labels
                .first()
                .copied()
                .ok_or_else(|| MonitorError::ModelError("model returned no prediction".to_string()))?;
            debug!("Model predicted class {}", label);

            u32::try_from(label)
                .map_err(|_| MonitorError::ModelError(format!("unexpected class id {}", label)))
        })
    }
}
