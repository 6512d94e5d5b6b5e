//! High-level estimator API
//!
//! [`SVC`] and [`SVR`] wrap [`SmoTrainer`] in a builder-style estimator that
//! keeps its fitted model. Predicting before fitting is an error, not a
//! garbage value.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use dualsvm::api::SVC;
//! use dualsvm::data::LibSVMDataset;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let train = LibSVMDataset::from_file("train.libsvm")?;
//! let test = LibSVMDataset::from_file("test.libsvm")?;
//!
//! let mut svc = SVC::new().with_c(1.0).with_tolerance(1e-3);
//! svc.fit(&train)?;
//! println!("Accuracy: {:.2}%", svc.evaluate(&test)?.accuracy() * 100.0);
//! # Ok(())
//! # }
//! ```

use crate::core::{
    CacheMode, Dataset, Prediction, Result, SVMError, SVMModel, Sample, SolverConfig,
    SparseVector, SweepStrategy, TrainingReport,
};
use crate::kernel::{Kernel, KernelSpec, LinearKernel};
use crate::optimizer::{
    SmoTrainer, TrainableClassifier, TrainableRegressor, TrainedClassifier, TrainedRegressor,
};
use crate::solver::WarmStart;
use std::sync::Arc;

macro_rules! config_setters {
    () => {
        /// Set regularization parameter C
        pub fn with_c(mut self, c: f64) -> Self {
            self.config.c = c;
            self
        }

        /// Set the KKT violation tolerance
        pub fn with_tolerance(mut self, tolerance: f64) -> Self {
            self.config.tolerance = tolerance;
            self
        }

        /// Set the numerical noise floor for accepting a step
        pub fn with_eps(mut self, eps: f64) -> Self {
            self.config.eps = eps;
            self
        }

        /// Set maximum number of outer passes
        pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
            self.config.max_iterations = max_iterations;
            self
        }

        /// Choose the restricted sweep policy
        pub fn with_strategy(mut self, strategy: SweepStrategy) -> Self {
            self.config.strategy = strategy;
            self
        }

        /// Train with or without a bias term
        pub fn with_bias(mut self, use_bias: bool) -> Self {
            self.config.use_bias = use_bias;
            self
        }

        /// Set the kernel caching policy
        pub fn with_cache(mut self, cache: CacheMode) -> Self {
            self.config.cache = cache;
            self
        }

        /// Replace the whole configuration
        pub fn with_config(mut self, config: SolverConfig) -> Self {
            self.config = config;
            self
        }

        pub fn config(&self) -> &SolverConfig {
            &self.config
        }

        /// Hyperparameters are validated here, before any data is read
        fn trainer(&self) -> Result<SmoTrainer> {
            SmoTrainer::new(Arc::clone(&self.kernel), self.config.clone())
        }
    };
}

/// Support vector classifier over two label values
pub struct SVC {
    kernel: Arc<dyn Kernel>,
    config: SolverConfig,
    model: Option<TrainedClassifier>,
}

impl SVC {
    /// Create a classifier with linear kernel and default parameters
    pub fn new() -> Self {
        Self::with_kernel(Arc::new(LinearKernel::new()))
    }

    /// Create a classifier with a custom kernel
    pub fn with_kernel(kernel: Arc<dyn Kernel>) -> Self {
        Self {
            kernel,
            config: SolverConfig::default(),
            model: None,
        }
    }

    config_setters!();

    /// Train on a dataset from zero-initialized multipliers
    pub fn fit(&mut self, dataset: &dyn Dataset) -> Result<&TrainedClassifier> {
        let trained = self.trainer()?.train_classifier(dataset)?;
        Ok(self.model.insert(trained))
    }

    /// Train on a dataset starting from `warm`
    pub fn fit_warm(
        &mut self,
        dataset: &dyn Dataset,
        warm: WarmStart<'_>,
    ) -> Result<&TrainedClassifier> {
        let trained = self.trainer()?.train_classifier_warm(dataset, Some(warm))?;
        Ok(self.model.insert(trained))
    }

    /// Train again, warm-started from the current model when there is one
    ///
    /// The multipliers are reused directly when `dataset` has as many
    /// samples as the previous one; otherwise the previous decision function
    /// seeds them.
    pub fn refit(&mut self, dataset: &dyn Dataset) -> Result<&TrainedClassifier> {
        let trainer = self.trainer()?;
        let trained = match &self.model {
            None => trainer.train_classifier(dataset)?,
            Some(previous) if previous.model().training_size() == dataset.len() => {
                trainer.train_classifier_warm(dataset, Some(WarmStart::Model(previous.model())))?
            }
            Some(previous) => {
                let score = |x: &SparseVector| previous.model().score(x);
                trainer.train_classifier_warm(dataset, Some(WarmStart::Scorer(&score)))?
            }
        };
        Ok(self.model.insert(trained))
    }

    /// The fitted model, if any
    pub fn model(&self) -> Option<&TrainedClassifier> {
        self.model.as_ref()
    }

    fn fitted(&self) -> Result<&TrainedClassifier> {
        self.model.as_ref().ok_or(SVMError::ModelNotTrained)
    }

    /// Predict a single sample
    pub fn predict(&self, sample: &Sample) -> Result<Prediction> {
        Ok(self.fitted()?.predict(sample))
    }

    /// Predict multiple samples in parallel
    pub fn predict_batch(&self, samples: &[Sample]) -> Result<Vec<Prediction>> {
        Ok(self.fitted()?.predict_batch(samples))
    }

    /// Raw score of a point
    pub fn decision_function(&self, x: &SparseVector) -> Result<f64> {
        Ok(self.fitted()?.decision_value(x))
    }

    /// Confusion counts on a labelled dataset, taking the higher label as positive
    pub fn evaluate(&self, dataset: &dyn Dataset) -> Result<EvaluationMetrics> {
        let model = self.fitted()?;
        let predicted: Vec<f64> = model
            .predict_batch(dataset.samples())
            .into_iter()
            .map(|p| p.label)
            .collect();
        Ok(EvaluationMetrics::from_labels(
            &predicted,
            &dataset.get_labels(),
            model.classes()[1],
        ))
    }

    /// Get model information
    pub fn info(&self) -> Result<ModelInfo> {
        let model = self.fitted()?;
        Ok(ModelInfo::new(model.model(), model.report()))
    }
}

impl Default for SVC {
    fn default() -> Self {
        Self::new()
    }
}

/// Epsilon-insensitive support vector regressor
pub struct SVR {
    kernel: Arc<dyn Kernel>,
    config: SolverConfig,
    model: Option<TrainedRegressor>,
}

impl SVR {
    /// Create a regressor with linear kernel and default parameters
    pub fn new() -> Self {
        Self::with_kernel(Arc::new(LinearKernel::new()))
    }

    /// Create a regressor with a custom kernel
    pub fn with_kernel(kernel: Arc<dyn Kernel>) -> Self {
        Self {
            kernel,
            config: SolverConfig::default(),
            model: None,
        }
    }

    config_setters!();

    /// Set the width of the insensitive tube
    pub fn with_epsilon(mut self, epsilon: f64) -> Self {
        self.config.epsilon = epsilon;
        self
    }

    /// Train on a dataset from zero-initialized multipliers
    pub fn fit(&mut self, dataset: &dyn Dataset) -> Result<&TrainedRegressor> {
        let trained = self.trainer()?.train_regressor(dataset)?;
        Ok(self.model.insert(trained))
    }

    /// Train on a dataset starting from `warm`
    pub fn fit_warm(
        &mut self,
        dataset: &dyn Dataset,
        warm: WarmStart<'_>,
    ) -> Result<&TrainedRegressor> {
        let trained = self.trainer()?.train_regressor_warm(dataset, Some(warm))?;
        Ok(self.model.insert(trained))
    }

    /// Train again, warm-started from the current model when there is one
    pub fn refit(&mut self, dataset: &dyn Dataset) -> Result<&TrainedRegressor> {
        let trainer = self.trainer()?;
        let trained = match &self.model {
            None => trainer.train_regressor(dataset)?,
            Some(previous) if previous.model().training_size() == dataset.len() => {
                trainer.train_regressor_warm(dataset, Some(WarmStart::Model(previous.model())))?
            }
            Some(previous) => {
                let score = |x: &SparseVector| previous.model().score(x);
                trainer.train_regressor_warm(dataset, Some(WarmStart::Scorer(&score)))?
            }
        };
        Ok(self.model.insert(trained))
    }

    /// The fitted model, if any
    pub fn model(&self) -> Option<&TrainedRegressor> {
        self.model.as_ref()
    }

    fn fitted(&self) -> Result<&TrainedRegressor> {
        self.model.as_ref().ok_or(SVMError::ModelNotTrained)
    }

    /// Predict a single sample; the label is the estimated value
    pub fn predict(&self, sample: &Sample) -> Result<Prediction> {
        Ok(self.fitted()?.predict(sample))
    }

    /// Predict multiple samples in parallel
    pub fn predict_batch(&self, samples: &[Sample]) -> Result<Vec<Prediction>> {
        Ok(self.fitted()?.predict_batch(samples))
    }

    /// Estimated value at a point
    pub fn decision_function(&self, x: &SparseVector) -> Result<f64> {
        Ok(self.fitted()?.decision_value(x))
    }

    /// Error metrics against the dataset's targets
    pub fn evaluate(&self, dataset: &dyn Dataset) -> Result<RegressionMetrics> {
        let model = self.fitted()?;
        let predicted: Vec<f64> = model
            .predict_batch(dataset.samples())
            .into_iter()
            .map(|p| p.label)
            .collect();
        Ok(RegressionMetrics::from_predictions(
            &predicted,
            &dataset.get_labels(),
        ))
    }

    /// Get model information
    pub fn info(&self) -> Result<ModelInfo> {
        let model = self.fitted()?;
        Ok(ModelInfo::new(model.model(), model.report()))
    }
}

impl Default for SVR {
    fn default() -> Self {
        Self::new()
    }
}

/// Detailed evaluation metrics
#[derive(Debug, Clone)]
pub struct EvaluationMetrics {
    pub true_positives: usize,
    pub true_negatives: usize,
    pub false_positives: usize,
    pub false_negatives: usize,
}

impl EvaluationMetrics {
    fn new(tp: usize, tn: usize, fp: usize, fn_: usize) -> Self {
        Self {
            true_positives: tp,
            true_negatives: tn,
            false_positives: fp,
            false_negatives: fn_,
        }
    }

    /// Count agreements between predicted and true labels
    pub fn from_labels(predicted: &[f64], actual: &[f64], positive: f64) -> Self {
        let mut metrics = Self::new(0, 0, 0, 0);
        for (&pred, &truth) in predicted.iter().zip(actual) {
            match (pred == positive, truth == positive) {
                (true, true) => metrics.true_positives += 1,
                (false, false) => metrics.true_negatives += 1,
                (true, false) => metrics.false_positives += 1,
                (false, true) => metrics.false_negatives += 1,
            }
        }
        metrics
    }

    /// Calculate accuracy: (TP + TN) / (TP + TN + FP + FN)
    pub fn accuracy(&self) -> f64 {
        let total =
            self.true_positives + self.true_negatives + self.false_positives + self.false_negatives;
        ratio(self.true_positives + self.true_negatives, total)
    }

    /// Calculate precision: TP / (TP + FP)
    pub fn precision(&self) -> f64 {
        ratio(self.true_positives, self.true_positives + self.false_positives)
    }

    /// Calculate recall (sensitivity): TP / (TP + FN)
    pub fn recall(&self) -> f64 {
        ratio(self.true_positives, self.true_positives + self.false_negatives)
    }

    /// Calculate F1 score: 2 * (precision * recall) / (precision + recall)
    pub fn f1_score(&self) -> f64 {
        let p = self.precision();
        let r = self.recall();
        if p + r == 0.0 {
            0.0
        } else {
            2.0 * (p * r) / (p + r)
        }
    }

    /// Calculate specificity: TN / (TN + FP)
    pub fn specificity(&self) -> f64 {
        ratio(self.true_negatives, self.true_negatives + self.false_positives)
    }
}

fn ratio(numerator: usize, denominator: usize) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64
    }
}

/// Regression error metrics
#[derive(Debug, Clone, PartialEq)]
pub struct RegressionMetrics {
    /// Mean squared error
    pub mse: f64,
    /// Mean absolute error
    pub mae: f64,
    /// Coefficient of determination
    pub r2: f64,
}

impl RegressionMetrics {
    /// Compare predictions with targets, pairwise
    pub fn from_predictions(predicted: &[f64], actual: &[f64]) -> Self {
        let n = predicted.len().min(actual.len());
        if n == 0 {
            return Self {
                mse: 0.0,
                mae: 0.0,
                r2: 0.0,
            };
        }
        let pairs = || predicted.iter().zip(actual).take(n);
        let ss_res: f64 = pairs().map(|(p, y)| (p - y).powi(2)).sum();
        let abs_err: f64 = pairs().map(|(p, y)| (p - y).abs()).sum();
        let mean = actual[..n].iter().sum::<f64>() / n as f64;
        let ss_tot: f64 = actual[..n].iter().map(|y| (y - mean).powi(2)).sum();

        // Constant targets: perfect fit scores 1, anything else 0
        let r2 = if ss_tot > 0.0 {
            1.0 - ss_res / ss_tot
        } else if ss_res == 0.0 {
            1.0
        } else {
            0.0
        };
        Self {
            mse: ss_res / n as f64,
            mae: abs_err / n as f64,
            r2,
        }
    }

    /// Root mean squared error
    pub fn rmse(&self) -> f64 {
        self.mse.sqrt()
    }
}

/// Model information
#[derive(Debug, Clone)]
pub struct ModelInfo {
    pub n_support_vectors: usize,
    pub bias: f64,
    pub support_vector_indices: Vec<usize>,
    pub kernel: KernelSpec,
    pub report: TrainingReport,
}

impl ModelInfo {
    fn new(model: &crate::optimizer::SupportVectorModel, report: &TrainingReport) -> Self {
        Self {
            n_support_vectors: model.n_support_vectors(),
            bias: model.bias(),
            support_vector_indices: model.support_indices().to_vec(),
            kernel: model.kernel_spec(),
            report: report.clone(),
        }
    }
}
