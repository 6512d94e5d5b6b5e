//! Core type definitions for SVM training

use crate::core::{Result, SVMError};
use serde::{Deserialize, Serialize};

/// Default box constraint scale `C`
pub const DEFAULT_C: f64 = 1.0;
/// Default KKT violation tolerance
pub const DEFAULT_TOLERANCE: f64 = 1e-3;
/// Default width of the epsilon-insensitive tube for regression
pub const DEFAULT_EPSILON: f64 = 1e-3;
/// Default numerical noise floor used to reject negligible steps
///
/// Loose enough to stop early on large problems. See [`SolverConfig::eps`]
/// for how it bounds the precision of the final solution.
pub const DEFAULT_EPS: f64 = 1e-3;
/// Default outer-loop pass budget
pub const DEFAULT_MAX_ITERATIONS: usize = 10_000;
/// Default row cache budget (64 MiB)
pub const DEFAULT_CACHE_BYTES: usize = 64 * 1024 * 1024;

/// Prediction result containing label and decision value
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Prediction {
    /// Predicted class label (one of the two training classes)
    pub label: f64,
    /// Raw decision function value
    pub decision_value: f64,
}

impl Prediction {
    /// Create a new prediction
    pub fn new(label: f64, decision_value: f64) -> Self {
        Self {
            label,
            decision_value,
        }
    }
}

/// Sparse vector representation with sorted indices
#[derive(Clone, Debug, PartialEq)]
pub struct SparseVector {
    /// Sorted indices of non-zero elements
    pub indices: Vec<usize>,
    /// Values corresponding to indices
    pub values: Vec<f64>,
}

impl SparseVector {
    /// Create a new sparse vector, ensuring indices are sorted
    pub fn new(indices: Vec<usize>, values: Vec<f64>) -> Self {
        assert_eq!(
            indices.len(),
            values.len(),
            "Indices and values must have same length"
        );

        let mut pairs: Vec<_> = indices.into_iter().zip(values).collect();
        pairs.sort_by_key(|&(idx, _)| idx);

        let (indices, values): (Vec<_>, Vec<_>) = pairs.into_iter().unzip();
        Self { indices, values }
    }

    /// Build a sparse vector from a dense slice, dropping exact zeros
    pub fn from_dense(dense: &[f64]) -> Self {
        let (indices, values) = dense
            .iter()
            .enumerate()
            .filter(|&(_, &v)| v != 0.0)
            .map(|(i, &v)| (i, v))
            .unzip();
        Self { indices, values }
    }

    /// Create an empty sparse vector
    pub fn empty() -> Self {
        Self {
            indices: Vec::new(),
            values: Vec::new(),
        }
    }

    /// Get the value at a specific index (0 if not present)
    pub fn get(&self, index: usize) -> f64 {
        match self.indices.binary_search(&index) {
            Ok(pos) => self.values[pos],
            Err(_) => 0.0,
        }
    }

    /// Dot product with another sparse vector
    ///
    /// Both index lists are sorted, so this is a merge in
    /// O(nnz(x) + nnz(y)) time.
    pub fn dot(&self, other: &SparseVector) -> f64 {
        let mut result = 0.0;
        let mut i = 0;
        let mut j = 0;

        while i < self.indices.len() && j < other.indices.len() {
            let x_idx = self.indices[i];
            let y_idx = other.indices[j];

            if x_idx == y_idx {
                result += self.values[i] * other.values[j];
                i += 1;
                j += 1;
            } else if x_idx < y_idx {
                i += 1;
            } else {
                j += 1;
            }
        }

        result
    }

    /// Squared Euclidean distance to another sparse vector
    pub fn squared_distance(&self, other: &SparseVector) -> f64 {
        let mut distance_sq = 0.0;
        let mut i = 0;
        let mut j = 0;

        while i < self.indices.len() && j < other.indices.len() {
            let x_idx = self.indices[i];
            let y_idx = other.indices[j];

            if x_idx == y_idx {
                let diff = self.values[i] - other.values[j];
                distance_sq += diff * diff;
                i += 1;
                j += 1;
            } else if x_idx < y_idx {
                distance_sq += self.values[i] * self.values[i];
                i += 1;
            } else {
                distance_sq += other.values[j] * other.values[j];
                j += 1;
            }
        }

        distance_sq += self.values[i..].iter().map(|v| v * v).sum::<f64>();
        distance_sq += other.values[j..].iter().map(|v| v * v).sum::<f64>();

        distance_sq
    }

    /// Compute squared L2 norm
    pub fn norm_squared(&self) -> f64 {
        self.values.iter().map(|&v| v * v).sum()
    }

    /// Check if vector is empty
    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// One past the largest stored index
    pub fn dim(&self) -> usize {
        self.indices.last().map_or(0, |&i| i + 1)
    }
}

/// Training sample: features, label or target, and a weight
#[derive(Clone, Debug)]
pub struct Sample {
    /// Feature vector (sparse representation)
    pub features: SparseVector,
    /// Class label for classification, real target for regression
    pub label: f64,
    /// Per-sample weight; scales the box constraint to `C * weight`
    pub weight: f64,
}

impl Sample {
    /// Create a new sample with unit weight
    pub fn new(features: SparseVector, label: f64) -> Self {
        Self {
            features,
            label,
            weight: 1.0,
        }
    }

    /// Create a sample from dense features
    pub fn dense(features: &[f64], label: f64) -> Self {
        Self::new(SparseVector::from_dense(features), label)
    }

    /// Set the sample weight
    pub fn with_weight(mut self, weight: f64) -> Self {
        self.weight = weight;
        self
    }
}

/// Restricted sweep policy used between full sweeps
///
/// Both policies come from Keerthi et al.'s improvements to Platt's SMO.
/// Which one is faster depends on the data, so neither is hard-wired.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SweepStrategy {
    /// Examine every free index in turn until the bound gap closes
    ModificationOne,
    /// Repeatedly step the current worst pair `(i_up, i_low)`
    #[default]
    ModificationTwo,
}

/// Kernel value caching policy for one training call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheMode {
    /// Recompute every kernel value
    None,
    /// Materialize the full Gram matrix up front
    Full,
    /// LRU of whole kernel rows bounded by a byte budget
    Rows { bytes: usize },
    /// LRU of symmetric `(i, j)` entries
    Entries { capacity: usize },
}

impl Default for CacheMode {
    fn default() -> Self {
        CacheMode::Rows {
            bytes: DEFAULT_CACHE_BYTES,
        }
    }
}

/// Configuration for the dual solvers
#[derive(Debug, Clone, PartialEq)]
pub struct SolverConfig {
    /// Regularization parameter (upper bound for alpha, scaled by weight)
    pub c: f64,
    /// KKT violation threshold
    pub tolerance: f64,
    /// Width of the epsilon-insensitive tube (regression only)
    pub epsilon: f64,
    /// Numerical noise floor for accepting a step
    ///
    /// A pair step is rejected when `|a - a_old| < eps * (a + a_old + eps)`,
    /// so the floor grows with the multipliers. It also limits how precise
    /// the result can get: with large `c` the final KKT residual may exceed
    /// `2 * tolerance` by a few multiples of `eps * a`. Lower `eps` (e.g.
    /// `1e-9`) when the residual must stay within the tolerance.
    pub eps: f64,
    /// Maximum number of outer passes
    pub max_iterations: usize,
    /// Restricted sweep policy
    pub strategy: SweepStrategy,
    /// Whether the decision function carries a bias term
    pub use_bias: bool,
    /// Kernel caching policy
    pub cache: CacheMode,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            c: DEFAULT_C,
            tolerance: DEFAULT_TOLERANCE,
            epsilon: DEFAULT_EPSILON,
            eps: DEFAULT_EPS,
            max_iterations: DEFAULT_MAX_ITERATIONS,
            strategy: SweepStrategy::default(),
            use_bias: true,
            cache: CacheMode::default(),
        }
    }
}

impl SolverConfig {
    /// Reject invalid hyperparameters; values are never clamped
    pub fn validate(&self) -> Result<()> {
        if !self.c.is_finite() || self.c <= 0.0 {
            return Err(SVMError::InvalidParameter(format!(
                "C must be positive and finite, got: {}",
                self.c
            )));
        }
        if !self.tolerance.is_finite() || self.tolerance <= 0.0 {
            return Err(SVMError::InvalidParameter(format!(
                "tolerance must be positive and finite, got: {}",
                self.tolerance
            )));
        }
        if !self.epsilon.is_finite() || self.epsilon < 0.0 {
            return Err(SVMError::InvalidParameter(format!(
                "epsilon must be non-negative and finite, got: {}",
                self.epsilon
            )));
        }
        if !self.eps.is_finite() || self.eps <= 0.0 {
            return Err(SVMError::InvalidParameter(format!(
                "eps must be positive and finite, got: {}",
                self.eps
            )));
        }
        if self.max_iterations == 0 {
            return Err(SVMError::InvalidParameter(
                "max_iterations must be at least 1".to_string(),
            ));
        }
        match self.cache {
            CacheMode::Rows { bytes: 0 } | CacheMode::Entries { capacity: 0 } => {
                Err(SVMError::InvalidParameter(
                    "cache budget must be non-zero".to_string(),
                ))
            }
            _ => Ok(()),
        }
    }
}

/// Summary of one training call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingReport {
    /// Outer passes performed
    pub iterations: usize,
    /// Accepted pairwise steps
    pub steps: usize,
    /// Whether the KKT gap closed within the iteration budget
    pub converged: bool,
    /// Final lower threshold (0 without bias)
    pub b_low: f64,
    /// Final upper threshold (0 without bias)
    pub b_up: f64,
    /// Dual objective at the returned solution
    pub objective: f64,
    /// Kernel cache hits during training
    pub cache_hits: u64,
    /// Kernel cache misses during training
    pub cache_misses: u64,
}
