//! Model serialization and persistence
//!
//! Trained models are stored as pretty-printed JSON: the kernel description,
//! the support vectors with their signed coefficients, the bias, and for
//! classifiers the two original label values.

use crate::core::{Result, SVMError, SolverConfig, SparseVector, TrainingReport};
use crate::kernel::KernelSpec;
use crate::optimizer::{SupportVectorModel, TrainedClassifier, TrainedRegressor};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

/// What a stored model predicts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelTask {
    Classification,
    Regression,
}

/// Serializable representation of a trained model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SerializableModel {
    pub task: ModelTask,
    pub kernel: KernelSpec,
    /// Support vectors
    pub support_vectors: Vec<SerializableVector>,
    /// Signed coefficient of each support vector
    pub coefficients: Vec<f64>,
    /// Position of each support vector in the training set
    pub support_indices: Vec<usize>,
    pub training_size: usize,
    /// Bias term
    pub bias: f64,
    /// Label values predicted for scores `<= 0` and `> 0`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub classes: Option<[f64; 2]>,
    /// Model metadata
    pub metadata: ModelMetadata,
}

/// Serializable sparse vector
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct SerializableVector {
    /// Feature indices
    pub indices: Vec<usize>,
    /// Feature values
    pub values: Vec<f64>,
}

/// Model metadata for tracking and validation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelMetadata {
    /// Library version used to create the model
    pub library_version: String,
    /// Number of support vectors
    pub n_support_vectors: usize,
    /// Training parameters used
    pub training_params: TrainingParams,
    /// Outcome of the training call
    pub report: TrainingReport,
    /// Creation timestamp (RFC 3339)
    pub created_at: String,
}

/// Training parameters for reference
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingParams {
    pub c: f64,
    pub tolerance: f64,
    pub epsilon: f64,
    pub max_iterations: usize,
    pub use_bias: bool,
}

impl From<&SolverConfig> for TrainingParams {
    fn from(config: &SolverConfig) -> Self {
        Self {
            c: config.c,
            tolerance: config.tolerance,
            epsilon: config.epsilon,
            max_iterations: config.max_iterations,
            use_bias: config.use_bias,
        }
    }
}

impl From<&SparseVector> for SerializableVector {
    fn from(v: &SparseVector) -> Self {
        Self {
            indices: v.indices.clone(),
            values: v.values.clone(),
        }
    }
}

impl TryFrom<&SerializableVector> for SparseVector {
    type Error = SVMError;

    fn try_from(v: &SerializableVector) -> Result<Self> {
        if v.indices.len() != v.values.len() {
            return Err(SVMError::SerializationError(format!(
                "support vector has {} indices but {} values",
                v.indices.len(),
                v.values.len()
            )));
        }
        Ok(SparseVector::new(v.indices.clone(), v.values.clone()))
    }
}

impl SerializableModel {
    /// Create a serializable model from a trained classifier
    pub fn from_classifier(classifier: &TrainedClassifier, config: &SolverConfig) -> Self {
        Self::build(
            ModelTask::Classification,
            classifier.model(),
            Some(classifier.classes()),
            classifier.report(),
            config,
        )
    }

    /// Create a serializable model from a trained regressor
    pub fn from_regressor(regressor: &TrainedRegressor, config: &SolverConfig) -> Self {
        Self::build(
            ModelTask::Regression,
            regressor.model(),
            None,
            regressor.report(),
            config,
        )
    }

    fn build(
        task: ModelTask,
        model: &SupportVectorModel,
        classes: Option<[f64; 2]>,
        report: &TrainingReport,
        config: &SolverConfig,
    ) -> Self {
        Self {
            task,
            kernel: model.kernel_spec(),
            support_vectors: model
                .support_vectors()
                .iter()
                .map(SerializableVector::from)
                .collect(),
            coefficients: model.coefficients().to_vec(),
            support_indices: model.support_indices().to_vec(),
            training_size: model.training_size(),
            bias: model.bias(),
            classes,
            metadata: ModelMetadata {
                library_version: env!("CARGO_PKG_VERSION").to_string(),
                n_support_vectors: model.n_support_vectors(),
                training_params: TrainingParams::from(config),
                report: report.clone(),
                created_at: chrono::Utc::now().to_rfc3339(),
            },
        }
    }

    /// Save model to file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let file = File::create(path).map_err(SVMError::IoError)?;
        let writer = BufWriter::new(file);
        serde_json::to_writer_pretty(writer, self)
            .map_err(|e| SVMError::SerializationError(e.to_string()))?;
        Ok(())
    }

    /// Load model from file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path).map_err(SVMError::IoError)?;
        let reader = BufReader::new(file);
        let model = serde_json::from_reader(reader)
            .map_err(|e| SVMError::SerializationError(e.to_string()))?;
        Ok(model)
    }

    /// Rebuild the prediction model, re-validating kernel parameters
    pub fn to_model(&self) -> Result<SupportVectorModel> {
        let kernel = self.kernel.build()?;
        let support_vectors = self
            .support_vectors
            .iter()
            .map(SparseVector::try_from)
            .collect::<Result<Vec<_>>>()?;
        SupportVectorModel::from_parts(
            kernel,
            support_vectors,
            self.coefficients.clone(),
            self.bias,
            self.support_indices.clone(),
            self.training_size,
        )
    }

    /// Rebuild a classifier; fails for regression models
    pub fn to_classifier(&self) -> Result<TrainedClassifier> {
        let classes = match (self.task, self.classes) {
            (ModelTask::Classification, Some(classes)) => classes,
            (ModelTask::Classification, None) => {
                return Err(SVMError::SerializationError(
                    "classification model without class labels".to_string(),
                ))
            }
            (ModelTask::Regression, _) => {
                return Err(SVMError::InvalidParameter(
                    "model file holds a regression model".to_string(),
                ))
            }
        };
        Ok(TrainedClassifier::new(
            self.to_model()?,
            classes,
            self.metadata.report.clone(),
        ))
    }

    /// Rebuild a regressor; fails for classification models
    pub fn to_regressor(&self) -> Result<TrainedRegressor> {
        if self.task != ModelTask::Regression {
            return Err(SVMError::InvalidParameter(
                "model file holds a classification model".to_string(),
            ));
        }
        Ok(TrainedRegressor::new(
            self.to_model()?,
            self.metadata.report.clone(),
        ))
    }

    /// Print model summary
    pub fn print_summary(&self) {
        let params = &self.metadata.training_params;
        let report = &self.metadata.report;
        println!("=== SVM Model Summary ===");
        println!("Task: {:?}", self.task);
        println!("Kernel: {}", self.kernel.name());
        if let Some([low, high]) = self.classes {
            println!("Classes: {low} (score <= 0), {high} (score > 0)");
        }
        println!("Support Vectors: {}", self.metadata.n_support_vectors);
        println!("Training Samples: {}", self.training_size);
        println!("Bias: {:.6}", self.bias);
        println!("Library Version: {}", self.metadata.library_version);
        println!("Created: {}", self.metadata.created_at);
        println!("Training Parameters:");
        println!("  C: {}", params.c);
        println!("  Tolerance: {}", params.tolerance);
        println!("  Epsilon: {}", params.epsilon);
        println!("  Max Iterations: {}", params.max_iterations);
        println!("  Bias Term: {}", params.use_bias);
        println!("Training Outcome:");
        println!("  Converged: {}", report.converged);
        println!("  Passes: {}", report.iterations);
        println!("  Steps: {}", report.steps);
        println!("  Dual Objective: {:.6}", report.objective);
    }
}
