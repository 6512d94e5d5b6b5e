//! Dual coordinate-descent Support Vector Machine training
//!
//! Based on "Improvements to Platt's SMO Algorithm for SVM Classifier
//! Design" by Keerthi, Shevade, Bhattacharyya and Murthy, and its
//! regression counterpart by Shevade et al.

pub mod api;
pub mod cache;
pub mod core;
pub mod data;
pub mod kernel;
pub mod optimizer;
pub mod persistence;
pub mod solver;

// Re-export main types for convenience
pub use crate::api::{EvaluationMetrics, ModelInfo, RegressionMetrics, SVC, SVR};
pub use crate::cache::{CacheStats, KernelCache, RowCache};
pub use crate::core::error::*;
pub use crate::core::traits::*;
pub use crate::core::types::*;
pub use crate::data::{CSVDataset, LibSVMDataset};
pub use crate::kernel::{Kernel, KernelSpec, LinearKernel, NormalizedKernel, RBFKernel};
pub use crate::optimizer::{
    SmoTrainer, SupportVectorModel, TrainableClassifier, TrainableRegressor, TrainedClassifier,
    TrainedRegressor,
};
pub use crate::solver::WarmStart;

// Version info
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
