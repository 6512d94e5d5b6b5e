//! Dual variables and the incrementally maintained gradient cache

use crate::kernel::{KernelEvaluator, KernelView};
use rayon::prelude::*;

/// Which dual problem a [`DualState`] belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Problem {
    /// Binary classification, targets are ±1
    Classification,
    /// Epsilon-insensitive regression, targets are real values
    Regression,
}

/// Per-sample dual variables for one training call
///
/// For classification `fcache[i]` tracks `F_i = Σ_j α_j y_j K_ij - y_i`.
/// For regression it tracks `F_i = y_i - Σ_j (α_j - α*_j) K_ij`.
/// Both are kept without the bias term.
#[derive(Debug, Clone)]
pub struct DualState {
    problem: Problem,
    pub(crate) alpha: Vec<f64>,
    /// Paired multipliers; all zero for classification
    pub(crate) alpha_star: Vec<f64>,
    pub(crate) target: Vec<f64>,
    /// Box bound `C_i = C * weight_i`
    pub(crate) bound: Vec<f64>,
    pub(crate) fcache: Vec<f64>,
}

impl DualState {
    /// Zero-initialized classification state; `targets` must be ±1
    pub fn classification(targets: Vec<f64>, bounds: Vec<f64>) -> Self {
        let fcache = targets.iter().map(|&y| -y).collect();
        Self::with_cache(Problem::Classification, targets, bounds, fcache)
    }

    /// Zero-initialized regression state
    pub fn regression(targets: Vec<f64>, bounds: Vec<f64>) -> Self {
        let fcache = targets.clone();
        Self::with_cache(Problem::Regression, targets, bounds, fcache)
    }

    fn with_cache(problem: Problem, target: Vec<f64>, bound: Vec<f64>, fcache: Vec<f64>) -> Self {
        debug_assert_eq!(target.len(), bound.len());
        let n = target.len();
        Self {
            problem,
            alpha: vec![0.0; n],
            alpha_star: vec![0.0; n],
            target,
            bound,
            fcache,
        }
    }

    pub fn problem(&self) -> Problem {
        self.problem
    }

    pub fn len(&self) -> usize {
        self.target.len()
    }

    pub fn is_empty(&self) -> bool {
        self.target.is_empty()
    }

    pub fn alpha(&self) -> &[f64] {
        &self.alpha
    }

    pub fn alpha_star(&self) -> &[f64] {
        &self.alpha_star
    }

    pub fn targets(&self) -> &[f64] {
        &self.target
    }

    pub fn bounds(&self) -> &[f64] {
        &self.bound
    }

    /// Current cached gradient values
    pub fn gradients(&self) -> &[f64] {
        &self.fcache
    }

    /// Signed coefficient β_i: `α_i y_i` or `α_i - α*_i`
    pub fn coefficient(&self, i: usize) -> f64 {
        match self.problem {
            Problem::Classification => self.alpha[i] * self.target[i],
            Problem::Regression => self.alpha[i] - self.alpha_star[i],
        }
    }

    /// Signed coefficients for every sample
    pub fn coefficients(&self) -> Vec<f64> {
        (0..self.len()).map(|i| self.coefficient(i)).collect()
    }

    /// Sign with which a change of Σ β_j K_ij enters F_i
    pub(crate) fn gradient_sign(&self) -> f64 {
        match self.problem {
            Problem::Classification => 1.0,
            Problem::Regression => -1.0,
        }
    }

    /// F_i given the kernel sum Σ_j β_j K_ij
    pub(crate) fn gradient_from_sum(&self, i: usize, sum: f64) -> f64 {
        match self.problem {
            Problem::Classification => sum - self.target[i],
            Problem::Regression => self.target[i] - sum,
        }
    }

    /// Apply a change `delta_sum` of Σ_j β_j K_ij to the cached F_i
    pub(crate) fn shift_gradient(&mut self, i: usize, delta_sum: f64) {
        self.fcache[i] += self.gradient_sign() * delta_sum;
    }

    /// F_i from its definition, through the evaluator's cache
    pub fn compute_gradient(&self, evaluator: &mut KernelEvaluator<'_>, i: usize) -> f64 {
        let mut sum = 0.0;
        for j in 0..self.len() {
            let beta = self.coefficient(j);
            if beta != 0.0 {
                sum += beta * evaluator.k(i, j);
            }
        }
        self.gradient_from_sum(i, sum)
    }

    /// Rebuild the whole gradient cache from scratch, in parallel
    pub fn recompute_gradients(&mut self, view: KernelView<'_>) {
        let coeffs = self.coefficients();
        let fresh: Vec<f64> = (0..self.len())
            .into_par_iter()
            .map(|i| self.gradient_from_sum(i, view.row_sum(i, &coeffs)))
            .collect();
        self.fcache = fresh;
    }

    /// Dual objective value (to be maximized)
    ///
    /// Classification: Σ α_i - ½ Σ β_i β_j K_ij.
    /// Regression: Σ y_i β_i - ε Σ (α_i + α*_i) - ½ Σ β_i β_j K_ij.
    pub fn objective(&self, view: KernelView<'_>, epsilon: f64) -> f64 {
        let coeffs = self.coefficients();
        let support: Vec<usize> = (0..self.len()).filter(|&i| coeffs[i] != 0.0).collect();
        let quadratic: f64 = support
            .par_iter()
            .map(|&i| {
                coeffs[i]
                    * support
                        .iter()
                        .map(|&j| coeffs[j] * view.eval(i, j))
                        .sum::<f64>()
            })
            .sum();
        let linear: f64 = match self.problem {
            Problem::Classification => self.alpha.iter().sum(),
            Problem::Regression => (0..self.len())
                .map(|i| {
                    self.target[i] * coeffs[i] - epsilon * (self.alpha[i] + self.alpha_star[i])
                })
                .sum(),
        };
        linear - 0.5 * quadratic
    }

    /// Store new multipliers for index `i`
    pub(crate) fn set_multipliers(&mut self, i: usize, alpha: f64, alpha_star: f64) {
        self.alpha[i] = alpha;
        self.alpha_star[i] = alpha_star;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{CacheMode, Sample};
    use crate::kernel::LinearKernel;
    use approx::assert_relative_eq;

    fn samples() -> Vec<Sample> {
        vec![
            Sample::dense(&[1.0, 0.0], 1.0),
            Sample::dense(&[0.0, 1.0], -1.0),
            Sample::dense(&[2.0, 2.0], 1.0),
        ]
    }

    #[test]
    fn test_initial_gradients() {
        let state = DualState::classification(vec![1.0, -1.0, 1.0], vec![1.0; 3]);
        assert_eq!(state.gradients(), &[-1.0, 1.0, -1.0]);
        assert!(state.alpha().iter().all(|&a| a == 0.0));

        let state = DualState::regression(vec![0.5, -2.0], vec![1.0; 2]);
        assert_eq!(state.gradients(), &[0.5, -2.0]);
    }

    #[test]
    fn test_coefficients() {
        let mut state = DualState::classification(vec![1.0, -1.0], vec![1.0; 2]);
        state.set_multipliers(1, 0.5, 0.0);
        assert_eq!(state.coefficients(), vec![0.0, -0.5]);

        let mut state = DualState::regression(vec![1.0, 2.0], vec![1.0; 2]);
        state.set_multipliers(0, 0.0, 0.25);
        state.set_multipliers(1, 0.75, 0.0);
        assert_eq!(state.coefficients(), vec![-0.25, 0.75]);
    }

    #[test]
    fn test_recompute_matches_incremental_shift() {
        let data = samples();
        let kernel = LinearKernel::new();
        let mut evaluator = KernelEvaluator::new(&kernel, &data, CacheMode::None).unwrap();

        let mut state = DualState::classification(vec![1.0, -1.0, 1.0], vec![1.0; 3]);
        state.set_multipliers(0, 0.5, 0.0);
        state.set_multipliers(1, 0.5, 0.0);
        // Δβ = (0.5, -0.5, 0)
        for k in 0..3 {
            let delta = 0.5 * evaluator.k(0, k) - 0.5 * evaluator.k(1, k);
            state.shift_gradient(k, delta);
        }
        let incremental = state.gradients().to_vec();

        state.recompute_gradients(evaluator.view());
        for (i, &value) in incremental.iter().enumerate() {
            assert_relative_eq!(state.gradients()[i], value, epsilon = 1e-12);
            assert_relative_eq!(
                state.compute_gradient(&mut evaluator, i),
                value,
                epsilon = 1e-12
            );
        }
    }

    #[test]
    fn test_objective() {
        let data = samples();
        let kernel = LinearKernel::new();
        let evaluator = KernelEvaluator::new(&kernel, &data, CacheMode::None).unwrap();

        let mut state = DualState::classification(vec![1.0, -1.0, 1.0], vec![1.0; 3]);
        assert_eq!(state.objective(evaluator.view(), 0.0), 0.0);

        state.set_multipliers(0, 1.0, 0.0);
        state.set_multipliers(1, 1.0, 0.0);
        // 2 - ½ |x0 - x1|² = 2 - 1
        assert_relative_eq!(state.objective(evaluator.view(), 0.0), 1.0, epsilon = 1e-12);

        let mut state = DualState::regression(vec![1.0, 0.0, 0.0], vec![1.0; 3]);
        state.set_multipliers(0, 0.5, 0.0);
        // 1 * 0.5 - 0.1 * 0.5 - ½ 0.25
        assert_relative_eq!(
            state.objective(evaluator.view(), 0.1),
            0.325,
            epsilon = 1e-12
        );
    }
}
