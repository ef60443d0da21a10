//! Support vector regression over normalized feature vectors.

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::QualityError;

/// A pre-trained ε-SVR predictor with an RBF kernel.
///
/// The model is immutable after load and `Sync`; `predict` takes `&self`, so
/// one instance can serve concurrent scoring calls without locking.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SvrModel {
    /// RBF kernel width.
    pub gamma: f64,
    /// Decision function offset.
    pub rho: f64,
    /// Dual coefficients, one per support vector.
    pub coeffs: Vec<f64>,
    /// Support vectors, each of the model's input width.
    pub support_vectors: Vec<Vec<f64>>,
}

impl SvrModel {
    /// Load a model from a JSON document on disk.
    ///
    /// # Errors
    ///
    /// Returns [`QualityError::ModelLoad`] if the file is missing, unreadable
    /// or structurally invalid (ragged support vectors, coefficient count not
    /// matching the support vector count, or no support vectors at all).
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, QualityError> {
        let path = path.as_ref();
        let file = File::open(path)
            .map_err(|e| QualityError::ModelLoad(format!("{}: {}", path.display(), e)))?;
        let model: SvrModel = serde_json::from_reader(BufReader::new(file))
            .map_err(|e| QualityError::ModelLoad(format!("{}: {}", path.display(), e)))?;

        model.validate()?;

        log::debug!(
            "loaded SVR model: {} support vectors of width {} from {}",
            model.support_vectors.len(),
            model.input_width(),
            path.display()
        );

        Ok(model)
    }

    /// Persist the model as a JSON document.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), QualityError> {
        let file = File::create(path.as_ref())
            .map_err(|e| QualityError::ModelLoad(e.to_string()))?;
        serde_json::to_writer(BufWriter::new(file), self)
            .map_err(|e| QualityError::ModelLoad(e.to_string()))?;
        Ok(())
    }

    /// Check the structural invariants of the model.
    pub fn validate(&self) -> Result<(), QualityError> {
        let Some(first) = self.support_vectors.first() else {
            return Err(QualityError::ModelLoad(
                "model has no support vectors".into(),
            ));
        };

        if self.support_vectors.iter().any(|sv| sv.len() != first.len()) {
            return Err(QualityError::ModelLoad(
                "support vectors differ in length".into(),
            ));
        }

        if self.coeffs.len() != self.support_vectors.len() {
            return Err(QualityError::ModelLoad(format!(
                "coefficient count ({}) does not match support vector count ({})",
                self.coeffs.len(),
                self.support_vectors.len()
            )));
        }

        Ok(())
    }

    /// The feature vector width the model was trained on.
    pub fn input_width(&self) -> usize {
        self.support_vectors.first().map_or(0, |sv| sv.len())
    }

    /// Evaluate the decision function on a normalized feature vector.
    ///
    /// Computes `Σ αᵢ · exp(-γ ‖x - svᵢ‖²) - ρ`.
    ///
    /// # Errors
    ///
    /// Returns [`QualityError::Prediction`] if the input width does not match
    /// the model's.
    pub fn predict(&self, features: &[f64]) -> Result<f64, QualityError> {
        if features.len() != self.input_width() {
            return Err(QualityError::Prediction(format!(
                "input width {} does not match model width {}",
                features.len(),
                self.input_width()
            )));
        }

        let score = self
            .support_vectors
            .iter()
            .zip(self.coeffs.iter())
            .map(|(sv, &coeff)| {
                let dist_sq = sv
                    .iter()
                    .zip(features.iter())
                    .map(|(&a, &b)| (a - b) * (a - b))
                    .sum::<f64>();
                coeff * (-self.gamma * dist_sq).exp()
            })
            .sum::<f64>();

        Ok(score - self.rho)
    }
}
