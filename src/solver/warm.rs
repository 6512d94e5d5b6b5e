//! Warm-start seeding of the dual variables

use crate::core::{Result, SVMError, Sample, SparseVector};
use crate::kernel::KernelView;
use crate::optimizer::SupportVectorModel;
use crate::solver::state::{DualState, Problem};
use rayon::prelude::*;

/// Source of initial multipliers for a training call
#[derive(Clone, Copy)]
pub enum WarmStart<'a> {
    /// Reuse the coefficients of a model trained on the same samples
    Model(&'a SupportVectorModel),
    /// Estimate multipliers from the loss residuals of any score function
    Scorer(&'a (dyn Fn(&SparseVector) -> f64 + Sync)),
}

impl std::fmt::Debug for WarmStart<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WarmStart::Model(model) => f
                .debug_tuple("Model")
                .field(&model.n_support_vectors())
                .finish(),
            WarmStart::Scorer(_) => f.write_str("Scorer"),
        }
    }
}

/// Seed `state` from `warm`, restore feasibility, and rebuild the
/// gradient cache for every index
///
/// # Errors
/// [`SVMError::WarmStartMismatch`] when a model was trained on a dataset of
/// a different size.
pub fn seed(
    state: &mut DualState,
    samples: &[Sample],
    view: KernelView<'_>,
    warm: WarmStart<'_>,
    use_bias: bool,
    epsilon: f64,
) -> Result<()> {
    let n = state.len();
    match warm {
        WarmStart::Model(model) => {
            if model.training_size() != n {
                return Err(SVMError::WarmStartMismatch {
                    expected: model.training_size(),
                    actual: n,
                });
            }
            for (&i, &coef) in model.support_indices().iter().zip(model.coefficients()) {
                let (alpha, alpha_star) = match state.problem() {
                    Problem::Classification => ((coef * state.target[i]).max(0.0), 0.0),
                    Problem::Regression => (coef.max(0.0), (-coef).max(0.0)),
                };
                state.set_multipliers(i, alpha, alpha_star);
            }
        }
        WarmStart::Scorer(score) => {
            let scores: Vec<f64> = samples.par_iter().map(|s| score(&s.features)).collect();
            for (i, &s) in scores.iter().enumerate() {
                let y = state.target[i];
                let (alpha, alpha_star) = match state.problem() {
                    Problem::Classification => ((1.0 - y * s).clamp(0.0, 1.0), 0.0),
                    Problem::Regression => {
                        let r = y - s;
                        let excess = (r.abs() - epsilon).clamp(0.0, 1.0);
                        if r > 0.0 {
                            (excess, 0.0)
                        } else {
                            (0.0, excess)
                        }
                    }
                };
                let c = state.bound[i];
                state.set_multipliers(i, alpha * c, alpha_star * c);
            }
        }
    }

    clamp_to_box(state);
    if use_bias {
        balance(state);
    }
    state.recompute_gradients(view);

    log::debug!(
        "warm start seeded {} non-zero multipliers",
        (0..n).filter(|&i| state.coefficient(i) != 0.0).count()
    );
    Ok(())
}

fn clamp_to_box(state: &mut DualState) {
    for i in 0..state.len() {
        let c = state.bound[i];
        let alpha = state.alpha[i].clamp(0.0, c);
        let alpha_star = state.alpha_star[i].clamp(0.0, c);
        state.set_multipliers(i, alpha, alpha_star);
    }
}

/// Restore Σ β = 0 by shrinking the heavier side proportionally
fn balance(state: &mut DualState) {
    let coeffs = state.coefficients();
    let positive: f64 = coeffs.iter().filter(|&&b| b > 0.0).sum();
    let negative: f64 = -coeffs.iter().filter(|&&b| b < 0.0).sum::<f64>();
    if positive == negative {
        return;
    }
    let (scale, shrink_positive) = if positive > negative {
        (negative / positive, true)
    } else {
        (positive / negative, false)
    };
    for (i, &beta) in coeffs.iter().enumerate() {
        if (beta > 0.0) == shrink_positive && beta != 0.0 {
            let (alpha, alpha_star) = (state.alpha[i] * scale, state.alpha_star[i] * scale);
            state.set_multipliers(i, alpha, alpha_star);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::CacheMode;
    use crate::kernel::{KernelEvaluator, LinearKernel};
    use approx::assert_relative_eq;

    fn samples() -> Vec<Sample> {
        vec![
            Sample::dense(&[2.0, 0.0], 1.0),
            Sample::dense(&[0.5, 0.0], 1.0),
            Sample::dense(&[-1.0, 0.0], -1.0),
            Sample::dense(&[-0.2, 0.0], -1.0),
        ]
    }

    #[test]
    fn test_scorer_seed_is_feasible_and_cached() {
        let data = samples();
        let kernel = LinearKernel::new();
        let mut evaluator = KernelEvaluator::new(&kernel, &data, CacheMode::None).unwrap();
        let mut state = DualState::classification(
            data.iter().map(|s| s.label).collect(),
            vec![2.0; data.len()],
        );

        // Scores x0 / 2: margins 1, 0.25, 0.5, 0.1
        let scorer = |x: &SparseVector| x.get(0) / 2.0;
        seed(&mut state, &data, evaluator.view(), WarmStart::Scorer(&scorer), true, 0.0).unwrap();

        assert_eq!(state.alpha()[0], 0.0);
        let sum: f64 = state.coefficients().iter().sum();
        assert_relative_eq!(sum, 0.0, epsilon = 1e-12);
        for i in 0..data.len() {
            assert!((0.0..=2.0).contains(&state.alpha()[i]));
            assert_relative_eq!(
                state.gradients()[i],
                state.compute_gradient(&mut evaluator, i),
                epsilon = 1e-12
            );
        }
    }

    #[test]
    fn test_regression_scorer_seed_without_bias_keeps_values() {
        let data = vec![Sample::dense(&[1.0], 3.0), Sample::dense(&[2.0], 0.0)];
        let kernel = LinearKernel::new();
        let evaluator = KernelEvaluator::new(&kernel, &data, CacheMode::None).unwrap();
        let mut state = DualState::regression(vec![3.0, 0.0], vec![4.0, 4.0]);

        let scorer = |_: &SparseVector| 2.8;
        seed(&mut state, &data, evaluator.view(), WarmStart::Scorer(&scorer), false, 0.1).unwrap();

        // r = 0.2 above the tube by 0.1; r = -2.8 capped at 1
        assert_relative_eq!(state.alpha()[0], 0.4, epsilon = 1e-12);
        assert_eq!(state.alpha_star()[0], 0.0);
        assert_eq!(state.alpha_star()[1], 4.0);
    }

    #[test]
    fn test_balance_shrinks_heavier_side() {
        let mut state = DualState::classification(vec![1.0, 1.0, -1.0], vec![1.0; 3]);
        state.set_multipliers(0, 1.0, 0.0);
        state.set_multipliers(1, 0.5, 0.0);
        state.set_multipliers(2, 0.75, 0.0);
        balance(&mut state);

        assert_relative_eq!(state.alpha()[0], 0.5, epsilon = 1e-12);
        assert_relative_eq!(state.alpha()[1], 0.25, epsilon = 1e-12);
        assert_eq!(state.alpha()[2], 0.75);
    }
}
