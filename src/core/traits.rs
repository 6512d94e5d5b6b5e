//! Core traits for SVM training and prediction

use crate::core::{Prediction, Sample, SparseVector};
use rayon::prelude::*;

/// Random-access sample source
///
/// The solvers revisit the same index many times per pass, so plain
/// iteration is not enough: implementors hand out a borrowed slice.
pub trait Dataset: Send + Sync {
    /// All samples, in index order
    fn samples(&self) -> &[Sample];

    /// Number of samples in the dataset
    fn len(&self) -> usize {
        self.samples().len()
    }

    /// Number of features (dimensionality)
    fn dim(&self) -> usize {
        self.samples()
            .iter()
            .map(|s| s.features.dim())
            .max()
            .unwrap_or(0)
    }

    /// Borrow a single sample
    ///
    /// # Panics
    /// Panics if index >= len()
    fn get_sample(&self, i: usize) -> &Sample {
        &self.samples()[i]
    }

    /// Get all labels as a vector
    fn get_labels(&self) -> Vec<f64> {
        self.samples().iter().map(|s| s.label).collect()
    }

    /// Check if the dataset is empty
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Dataset for Vec<Sample> {
    fn samples(&self) -> &[Sample] {
        self
    }
}

impl Dataset for [Sample] {
    fn samples(&self) -> &[Sample] {
        self
    }
}

/// Trained binary SVM classifier
pub trait SVMModel: Send + Sync {
    /// Raw decision value for a feature vector
    fn decision_value(&self, features: &SparseVector) -> f64;

    /// Predict a single sample
    fn predict(&self, sample: &Sample) -> Prediction;

    /// Predict multiple samples in parallel
    fn predict_batch(&self, samples: &[Sample]) -> Vec<Prediction> {
        samples.par_iter().map(|s| self.predict(s)).collect()
    }

    /// Get the number of support vectors
    fn n_support_vectors(&self) -> usize;

    /// Get the bias term
    fn bias(&self) -> f64;
}
