//! Training entry points
//!
//! [`SmoTrainer`] ties a kernel and a [`SolverConfig`] to the dual solvers.
//! It validates the data, builds the kernel evaluator and dual state, picks
//! the solver for the bias setting, and sparsifies the result into a model.

pub mod model;
pub mod sparsify;

pub use self::model::*;
pub use self::sparsify::*;

use crate::core::{Dataset, Result, SVMError, Sample, SolverConfig, TrainingReport};
use crate::kernel::{Kernel, KernelEvaluator, NormalizedKernel};
use crate::solver::{seed, DualState, NoBiasSolver, SmoSolver, SolveOutcome, WarmStart};
use std::sync::Arc;

/// Binary classification training
pub trait TrainableClassifier {
    /// Train from zero-initialized multipliers
    fn train_classifier(&self, dataset: &dyn Dataset) -> Result<TrainedClassifier> {
        self.train_classifier_warm(dataset, None)
    }

    /// Train, optionally seeding the multipliers from `warm`
    fn train_classifier_warm(
        &self,
        dataset: &dyn Dataset,
        warm: Option<WarmStart<'_>>,
    ) -> Result<TrainedClassifier>;
}

/// Epsilon-insensitive regression training
pub trait TrainableRegressor {
    /// Train from zero-initialized multipliers
    fn train_regressor(&self, dataset: &dyn Dataset) -> Result<TrainedRegressor> {
        self.train_regressor_warm(dataset, None)
    }

    /// Train, optionally seeding the multipliers from `warm`
    fn train_regressor_warm(
        &self,
        dataset: &dyn Dataset,
        warm: Option<WarmStart<'_>>,
    ) -> Result<TrainedRegressor>;
}

/// SMO trainer for classification and regression
#[derive(Debug, Clone)]
pub struct SmoTrainer {
    kernel: Arc<dyn Kernel>,
    config: SolverConfig,
}

impl SmoTrainer {
    /// Create a trainer, rejecting invalid hyperparameters
    pub fn new(kernel: Arc<dyn Kernel>, config: SolverConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { kernel, config })
    }

    /// Create a trainer with the default configuration
    pub fn with_kernel(kernel: Arc<dyn Kernel>) -> Self {
        Self {
            kernel,
            config: SolverConfig::default(),
        }
    }

    pub fn config(&self) -> &SolverConfig {
        &self.config
    }

    pub fn kernel(&self) -> &Arc<dyn Kernel> {
        &self.kernel
    }

    /// Kernel the solver actually trains with
    ///
    /// The bias-free solver needs K(x, x) == 1, so other kernels are
    /// wrapped; the model keeps the wrapped kernel.
    fn training_kernel(&self) -> Arc<dyn Kernel> {
        if self.config.use_bias {
            Arc::clone(&self.kernel)
        } else {
            NormalizedKernel::wrap(Arc::clone(&self.kernel))
        }
    }

    /// Per-sample box bounds `C_i = C * weight_i`
    fn bounds(&self, samples: &[Sample]) -> Result<Vec<f64>> {
        if samples.is_empty() {
            return Err(SVMError::EmptyDataset);
        }
        samples
            .iter()
            .enumerate()
            .map(|(i, s)| {
                if !s.weight.is_finite() || s.weight <= 0.0 {
                    return Err(SVMError::InvalidDataset(format!(
                        "sample {i} has weight {}, weights must be positive and finite",
                        s.weight
                    )));
                }
                if !s.label.is_finite() || s.features.values.iter().any(|v| !v.is_finite()) {
                    return Err(SVMError::InvalidDataset(format!(
                        "sample {i} contains a non-finite value"
                    )));
                }
                Ok(self.config.c * s.weight)
            })
            .collect()
    }

    /// Seed, solve, and sparsify
    fn run(
        &self,
        kernel: &Arc<dyn Kernel>,
        samples: &[Sample],
        mut state: DualState,
        warm: Option<WarmStart<'_>>,
    ) -> Result<(SupportVectorModel, TrainingReport)> {
        let evaluator = KernelEvaluator::new(kernel.as_ref(), samples, self.config.cache)?;
        if let Some(warm) = warm {
            seed(
                &mut state,
                samples,
                evaluator.view(),
                warm,
                self.config.use_bias,
                self.config.epsilon,
            )?;
        }

        let outcome = if self.config.use_bias {
            SmoSolver::new(evaluator, state, self.config.clone()).solve()?
        } else {
            NoBiasSolver::new(evaluator, state, self.config.clone()).solve()?
        };

        let report = report_of(&outcome);
        let model = sparsify(outcome.state, samples, Arc::clone(kernel), outcome.bias)?;
        Ok((model, report))
    }
}

impl TrainableClassifier for SmoTrainer {
    fn train_classifier_warm(
        &self,
        dataset: &dyn Dataset,
        warm: Option<WarmStart<'_>>,
    ) -> Result<TrainedClassifier> {
        let samples = dataset.samples();
        let bounds = self.bounds(samples)?;
        let classes = class_pair(samples)?;
        let targets = samples
            .iter()
            .map(|s| if s.label == classes[1] { 1.0 } else { -1.0 })
            .collect();

        let kernel = self.training_kernel();
        let state = DualState::classification(targets, bounds);
        let (model, report) = self.run(&kernel, samples, state, warm)?;

        log::info!(
            "classifier trained on {} samples with {} kernel: {} support vectors, \
             {} passes, {} steps, objective {:.6}{}",
            samples.len(),
            kernel.spec().name(),
            model.n_support_vectors(),
            report.iterations,
            report.steps,
            report.objective,
            if report.converged { "" } else { " (not converged)" }
        );
        Ok(TrainedClassifier::new(model, classes, report))
    }
}

impl TrainableRegressor for SmoTrainer {
    fn train_regressor_warm(
        &self,
        dataset: &dyn Dataset,
        warm: Option<WarmStart<'_>>,
    ) -> Result<TrainedRegressor> {
        let samples = dataset.samples();
        let bounds = self.bounds(samples)?;
        let targets = samples.iter().map(|s| s.label).collect();

        let kernel = self.training_kernel();
        let state = DualState::regression(targets, bounds);
        let (model, report) = self.run(&kernel, samples, state, warm)?;

        log::info!(
            "regressor trained on {} samples with {} kernel: {} support vectors, \
             {} passes, {} steps, objective {:.6}{}",
            samples.len(),
            kernel.spec().name(),
            model.n_support_vectors(),
            report.iterations,
            report.steps,
            report.objective,
            if report.converged { "" } else { " (not converged)" }
        );
        Ok(TrainedRegressor::new(model, report))
    }
}

/// The two distinct label values, lower one first
fn class_pair(samples: &[Sample]) -> Result<[f64; 2]> {
    let mut labels: Vec<f64> = samples.iter().map(|s| s.label).collect();
    labels.sort_by(f64::total_cmp);
    labels.dedup();
    match labels.as_slice() {
        &[low, high] => Ok([low, high]),
        other => Err(SVMError::ClassCount(other.len())),
    }
}

fn report_of(outcome: &SolveOutcome) -> TrainingReport {
    TrainingReport {
        iterations: outcome.iterations,
        steps: outcome.steps,
        converged: outcome.converged,
        b_low: outcome.b_low,
        b_up: outcome.b_up,
        objective: outcome.objective,
        cache_hits: outcome.cache.hits,
        cache_misses: outcome.cache.misses,
    }
}
