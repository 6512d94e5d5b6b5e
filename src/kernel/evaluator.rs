//! Index-pair kernel evaluation for one training call
//!
//! [`KernelEvaluator`] owns the caching policy chosen through
//! [`CacheMode`]. The diagonal K(i, i) is always precomputed. Uncached,
//! thread-safe access for the parallel passes goes through [`KernelView`].

use crate::cache::{CacheStats, KernelCache, RowCache};
use crate::core::{CacheMode, Result, SVMError, Sample, SparseVector};
use crate::kernel::Kernel;
use rayon::prelude::*;

/// Largest training set for which [`CacheMode::Full`] is accepted
pub const FULL_CACHE_MAX_SAMPLES: usize = 8192;

/// Read-only, uncached access to kernel values between training samples
#[derive(Clone, Copy)]
pub struct KernelView<'a> {
    kernel: &'a dyn Kernel,
    samples: &'a [Sample],
    norms: &'a [f64],
}

impl<'a> KernelView<'a> {
    /// K(x_i, x_j)
    pub fn eval(&self, i: usize, j: usize) -> f64 {
        self.kernel.compute_with_norms(
            &self.samples[i].features,
            &self.samples[j].features,
            self.norms[i],
            self.norms[j],
        )
    }

    /// K(x, x_j) for an arbitrary point with known squared norm
    pub fn eval_point(&self, x: &SparseVector, x_norm_sq: f64, j: usize) -> f64 {
        self.kernel
            .compute_with_norms(x, &self.samples[j].features, x_norm_sq, self.norms[j])
    }

    /// Σ_j coeffs[j] * K(x_i, x_j), skipping zero coefficients
    pub fn row_sum(&self, i: usize, coeffs: &[f64]) -> f64 {
        coeffs
            .iter()
            .enumerate()
            .filter(|&(_, &c)| c != 0.0)
            .map(|(j, &c)| c * self.eval(i, j))
            .sum()
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

enum Store {
    None,
    Full(Vec<f64>),
    Rows(RowCache),
    Entries(KernelCache),
}

/// Kernel evaluator over the samples of a single training call
pub struct KernelEvaluator<'a> {
    kernel: &'a dyn Kernel,
    samples: &'a [Sample],
    norms: Vec<f64>,
    diagonal: Vec<f64>,
    store: Store,
    // Lookups answered without touching an LRU (Full and None modes)
    direct_hits: u64,
    direct_misses: u64,
}

impl<'a> KernelEvaluator<'a> {
    /// Build an evaluator, materializing the Gram matrix in `Full` mode
    ///
    /// # Errors
    /// Returns [`SVMError::InvalidParameter`] when `Full` is requested for
    /// more than [`FULL_CACHE_MAX_SAMPLES`] samples.
    pub fn new(kernel: &'a dyn Kernel, samples: &'a [Sample], mode: CacheMode) -> Result<Self> {
        let n = samples.len();
        let norms: Vec<f64> = samples.iter().map(|s| s.features.norm_squared()).collect();
        let diagonal: Vec<f64> = samples
            .iter()
            .zip(&norms)
            .map(|(s, &nrm)| kernel.compute_with_norms(&s.features, &s.features, nrm, nrm))
            .collect();

        let store = match mode {
            CacheMode::None => Store::None,
            CacheMode::Full => {
                if n > FULL_CACHE_MAX_SAMPLES {
                    return Err(SVMError::InvalidParameter(format!(
                        "full kernel cache supports at most {FULL_CACHE_MAX_SAMPLES} samples, got {n}"
                    )));
                }
                let view = KernelView {
                    kernel,
                    samples,
                    norms: &norms,
                };
                let mut gram = vec![0.0; n * n];
                gram.par_chunks_mut(n.max(1)).enumerate().for_each(|(i, row)| {
                    for (j, value) in row.iter_mut().enumerate() {
                        *value = view.eval(i, j);
                    }
                });
                Store::Full(gram)
            }
            CacheMode::Rows { bytes } => Store::Rows(RowCache::with_memory_limit(n, bytes)),
            CacheMode::Entries { capacity } => Store::Entries(KernelCache::new(capacity)),
        };

        log::debug!("kernel evaluator ready: {n} samples, cache {mode:?}");

        Ok(Self {
            kernel,
            samples,
            norms,
            diagonal,
            store,
            direct_hits: 0,
            direct_misses: 0,
        })
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn samples(&self) -> &'a [Sample] {
        self.samples
    }

    pub fn kernel(&self) -> &'a dyn Kernel {
        self.kernel
    }

    /// Uncached, shareable view for parallel passes
    pub fn view(&self) -> KernelView<'_> {
        KernelView {
            kernel: self.kernel,
            samples: self.samples,
            norms: &self.norms,
        }
    }

    /// Precomputed K(i, i)
    pub fn diag(&self, i: usize) -> f64 {
        self.diagonal[i]
    }

    /// K(i, j) through the configured cache
    pub fn k(&mut self, i: usize, j: usize) -> f64 {
        if i == j {
            return self.diagonal[i];
        }
        match &mut self.store {
            Store::None => {
                self.direct_misses += 1;
                compute(self.kernel, self.samples, &self.norms, i, j)
            }
            Store::Full(gram) => {
                self.direct_hits += 1;
                gram[i * self.samples.len() + j]
            }
            Store::Rows(rows) => match rows.get(i, j) {
                Some(value) => value,
                None => compute(self.kernel, self.samples, &self.norms, i, j),
            },
            Store::Entries(cache) => match cache.get(i, j) {
                Some(value) => value,
                None => {
                    let value = compute(self.kernel, self.samples, &self.norms, i, j);
                    cache.put(i, j, value);
                    value
                }
            },
        }
    }

    /// Preload whole rows ahead of a dense sweep
    ///
    /// Only row mode acts on the hint; the other modes either hold
    /// everything already or cache entries individually.
    pub fn hint_rows(&mut self, rows: &[usize]) {
        let Store::Rows(cache) = &mut self.store else {
            return;
        };
        for &i in rows {
            if cache.contains(i) {
                continue;
            }
            let row: Box<[f64]> = (0..self.samples.len())
                .map(|j| compute(self.kernel, self.samples, &self.norms, i, j))
                .collect();
            cache.insert(i, row);
        }
    }

    /// Σ_j coeffs[j] * K(x, x_j) over the training samples
    pub fn k_eval_sum(&self, x: &SparseVector, coeffs: &[f64]) -> f64 {
        let view = self.view();
        let x_norm_sq = x.norm_squared();
        coeffs
            .iter()
            .enumerate()
            .filter(|&(_, &c)| c != 0.0)
            .map(|(j, &c)| c * view.eval_point(x, x_norm_sq, j))
            .sum()
    }

    /// Cache statistics accumulated so far
    pub fn stats(&self) -> CacheStats {
        match &self.store {
            Store::Rows(rows) => rows.stats(),
            Store::Entries(cache) => cache.stats(),
            Store::Full(gram) => CacheStats {
                hits: self.direct_hits,
                misses: 0,
                capacity: gram.len(),
                size: gram.len(),
            },
            Store::None => CacheStats {
                hits: 0,
                misses: self.direct_misses,
                capacity: 0,
                size: 0,
            },
        }
    }
}

fn compute(kernel: &dyn Kernel, samples: &[Sample], norms: &[f64], i: usize, j: usize) -> f64 {
    kernel.compute_with_norms(&samples[i].features, &samples[j].features, norms[i], norms[j])
}

/// Σ coeffs[i] * K(x, vectors[i]) for prediction on an arbitrary point
pub fn kernel_sum(
    kernel: &dyn Kernel,
    x: &SparseVector,
    vectors: &[SparseVector],
    coeffs: &[f64],
) -> f64 {
    let x_norm_sq = x.norm_squared();
    vectors
        .iter()
        .zip(coeffs)
        .map(|(sv, &c)| c * kernel.compute_with_norms(x, sv, x_norm_sq, sv.norm_squared()))
        .sum()
}
