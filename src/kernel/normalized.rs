//! Normalizing adapter for arbitrary kernels
//!
//! K'(x, y) = K(x, y) / sqrt(K(x, x) * K(y, y))
//!
//! The bias-free solvers assume K(x, x) == 1; kernels that do not satisfy
//! this are wrapped in [`NormalizedKernel`] before training.

use crate::core::SparseVector;
use crate::kernel::{Kernel, KernelSpec};
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct NormalizedKernel {
    inner: Arc<dyn Kernel>,
}

impl NormalizedKernel {
    pub fn new(inner: Arc<dyn Kernel>) -> Self {
        Self { inner }
    }

    /// Wrap `kernel` unless it is already normalized
    pub fn wrap(kernel: Arc<dyn Kernel>) -> Arc<dyn Kernel> {
        if kernel.is_normalized() {
            kernel
        } else {
            Arc::new(Self::new(kernel))
        }
    }

    pub fn inner(&self) -> &Arc<dyn Kernel> {
        &self.inner
    }
}

impl Kernel for NormalizedKernel {
    fn compute(&self, x: &SparseVector, y: &SparseVector) -> f64 {
        let kxx = self.inner.compute(x, x);
        let kyy = self.inner.compute(y, y);
        // Zero self-similarity (e.g. the origin under a linear kernel) maps to 0
        if kxx <= 0.0 || kyy <= 0.0 {
            return 0.0;
        }
        self.inner.compute(x, y) / (kxx * kyy).sqrt()
    }

    fn is_normalized(&self) -> bool {
        true
    }

    fn spec(&self) -> KernelSpec {
        KernelSpec::Normalized {
            inner: Box::new(self.inner.spec()),
        }
    }
}
