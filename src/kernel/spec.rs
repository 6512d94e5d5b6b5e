//! Serializable kernel descriptions

use crate::core::Result;
use crate::kernel::{
    Kernel, LinearKernel, NormalizedKernel, PolynomialKernel, RBFKernel, SigmoidKernel,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Kernel type and parameters, as stored in model files
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum KernelSpec {
    Linear,
    Rbf { gamma: f64 },
    Polynomial { degree: u32, gamma: f64, coef0: f64 },
    Sigmoid { gamma: f64, coef0: f64 },
    Normalized { inner: Box<KernelSpec> },
}

impl KernelSpec {
    /// Rebuild the kernel, re-validating its parameters
    pub fn build(&self) -> Result<Arc<dyn Kernel>> {
        let kernel: Arc<dyn Kernel> = match self {
            KernelSpec::Linear => Arc::new(LinearKernel::new()),
            KernelSpec::Rbf { gamma } => Arc::new(RBFKernel::new(*gamma)?),
            KernelSpec::Polynomial {
                degree,
                gamma,
                coef0,
            } => Arc::new(PolynomialKernel::new(*degree, *gamma, *coef0)?),
            KernelSpec::Sigmoid { gamma, coef0 } => Arc::new(SigmoidKernel::new(*gamma, *coef0)?),
            KernelSpec::Normalized { inner } => Arc::new(NormalizedKernel::new(inner.build()?)),
        };
        Ok(kernel)
    }

    /// Short human-readable name
    pub fn name(&self) -> String {
        match self {
            KernelSpec::Linear => "linear".to_string(),
            KernelSpec::Rbf { .. } => "rbf".to_string(),
            KernelSpec::Polynomial { .. } => "polynomial".to_string(),
            KernelSpec::Sigmoid { .. } => "sigmoid".to_string(),
            KernelSpec::Normalized { inner } => format!("normalized {}", inner.name()),
        }
    }
}
