//! Trained models

use crate::core::{Prediction, Result, SVMError, SVMModel, Sample, SparseVector, TrainingReport};
use crate::kernel::{kernel_sum, Kernel, KernelSpec};
use std::sync::Arc;

/// Sparse kernel expansion `score(x) = Σ coef_i K(x, sv_i) + bias`
///
/// This is the only artifact that outlives a training call. It is
/// immutable and can be shared between threads for prediction.
#[derive(Debug, Clone)]
pub struct SupportVectorModel {
    kernel: Arc<dyn Kernel>,
    support_vectors: Vec<SparseVector>,
    coefficients: Vec<f64>,
    bias: f64,
    support_indices: Vec<usize>,
    training_size: usize,
}

impl SupportVectorModel {
    /// Assemble a model from its parts
    ///
    /// # Errors
    /// [`SVMError::InvalidDataset`] when the arrays disagree in length, a
    /// support index is out of range, or a value is not finite.
    pub fn from_parts(
        kernel: Arc<dyn Kernel>,
        support_vectors: Vec<SparseVector>,
        coefficients: Vec<f64>,
        bias: f64,
        support_indices: Vec<usize>,
        training_size: usize,
    ) -> Result<Self> {
        if support_vectors.len() != coefficients.len()
            || support_vectors.len() != support_indices.len()
        {
            return Err(SVMError::InvalidDataset(format!(
                "model arrays disagree: {} vectors, {} coefficients, {} indices",
                support_vectors.len(),
                coefficients.len(),
                support_indices.len()
            )));
        }
        if let Some(&bad) = support_indices.iter().find(|&&i| i >= training_size) {
            return Err(SVMError::InvalidDataset(format!(
                "support index {bad} out of range for {training_size} training samples"
            )));
        }
        if !bias.is_finite() || coefficients.iter().any(|c| !c.is_finite()) {
            return Err(SVMError::InvalidDataset(
                "model coefficients must be finite".to_string(),
            ));
        }
        Ok(Self {
            kernel,
            support_vectors,
            coefficients,
            bias,
            support_indices,
            training_size,
        })
    }

    /// Raw score of a point
    pub fn score(&self, x: &SparseVector) -> f64 {
        kernel_sum(
            self.kernel.as_ref(),
            x,
            &self.support_vectors,
            &self.coefficients,
        ) + self.bias
    }

    pub fn kernel(&self) -> &Arc<dyn Kernel> {
        &self.kernel
    }

    pub fn kernel_spec(&self) -> KernelSpec {
        self.kernel.spec()
    }

    pub fn support_vectors(&self) -> &[SparseVector] {
        &self.support_vectors
    }

    /// Signed coefficient of each support vector
    pub fn coefficients(&self) -> &[f64] {
        &self.coefficients
    }

    pub fn bias(&self) -> f64 {
        self.bias
    }

    /// Position of each support vector in the training set
    pub fn support_indices(&self) -> &[usize] {
        &self.support_indices
    }

    /// Number of samples the model was trained on
    pub fn training_size(&self) -> usize {
        self.training_size
    }

    pub fn n_support_vectors(&self) -> usize {
        self.support_vectors.len()
    }

    /// Primal weight vector `w = Σ coef_i sv_i`, for linear kernels only
    pub fn linear_weights(&self) -> Option<Vec<f64>> {
        if self.kernel.spec() != KernelSpec::Linear {
            return None;
        }
        let dim = self
            .support_vectors
            .iter()
            .map(SparseVector::dim)
            .max()
            .unwrap_or(0);
        let mut w = vec![0.0; dim];
        for (sv, &coef) in self.support_vectors.iter().zip(&self.coefficients) {
            for (&idx, &value) in sv.indices.iter().zip(&sv.values) {
                w[idx] += coef * value;
            }
        }
        Some(w)
    }
}

/// Binary classifier over the two original label values
#[derive(Debug, Clone)]
pub struct TrainedClassifier {
    model: SupportVectorModel,
    classes: [f64; 2],
    report: TrainingReport,
}

impl TrainedClassifier {
    /// `classes[0]` is predicted for scores `<= 0`, `classes[1]` above
    pub fn new(model: SupportVectorModel, classes: [f64; 2], report: TrainingReport) -> Self {
        Self {
            model,
            classes,
            report,
        }
    }

    pub fn model(&self) -> &SupportVectorModel {
        &self.model
    }

    pub fn into_model(self) -> SupportVectorModel {
        self.model
    }

    /// The two label values, lower one first
    pub fn classes(&self) -> [f64; 2] {
        self.classes
    }

    pub fn report(&self) -> &TrainingReport {
        &self.report
    }

    /// Original label for a point
    pub fn predict_label(&self, x: &SparseVector) -> f64 {
        self.label_for(self.model.score(x))
    }

    fn label_for(&self, score: f64) -> f64 {
        if score > 0.0 {
            self.classes[1]
        } else {
            self.classes[0]
        }
    }
}

impl SVMModel for TrainedClassifier {
    fn decision_value(&self, features: &SparseVector) -> f64 {
        self.model.score(features)
    }

    fn predict(&self, sample: &Sample) -> Prediction {
        let decision_value = self.model.score(&sample.features);
        Prediction::new(self.label_for(decision_value), decision_value)
    }

    fn n_support_vectors(&self) -> usize {
        self.model.n_support_vectors()
    }

    fn bias(&self) -> f64 {
        self.model.bias()
    }
}

/// Epsilon-insensitive regressor
#[derive(Debug, Clone)]
pub struct TrainedRegressor {
    model: SupportVectorModel,
    report: TrainingReport,
}

impl TrainedRegressor {
    pub fn new(model: SupportVectorModel, report: TrainingReport) -> Self {
        Self { model, report }
    }

    pub fn model(&self) -> &SupportVectorModel {
        &self.model
    }

    pub fn into_model(self) -> SupportVectorModel {
        self.model
    }

    pub fn report(&self) -> &TrainingReport {
        &self.report
    }

    /// Predicted target value
    pub fn predict_value(&self, x: &SparseVector) -> f64 {
        self.model.score(x)
    }
}

impl SVMModel for TrainedRegressor {
    fn decision_value(&self, features: &SparseVector) -> f64 {
        self.model.score(features)
    }

    /// The prediction label is the regression estimate itself
    fn predict(&self, sample: &Sample) -> Prediction {
        let value = self.model.score(&sample.features);
        Prediction::new(value, value)
    }

    fn n_support_vectors(&self) -> usize {
        self.model.n_support_vectors()
    }

    fn bias(&self) -> f64 {
        self.model.bias()
    }
}
