//! Sequential Minimal Optimization with an explicit bias term
//!
//! The solver keeps two thresholds instead of a single bias estimate:
//! `b_up`, the smallest gradient any index could still lower it to, and
//! `b_low`, the largest. The dual is optimal once `b_low <= b_up + 2τ`.
//! Gradients are cached only for interior indices; bound indices are
//! re-evaluated when examined.
//!
//! References:
//! - Platt, "Fast Training of Support Vector Machines using Sequential
//!   Minimal Optimization", 1998
//! - Keerthi, Shevade, Bhattacharyya, Murthy, "Improvements to Platt's SMO
//!   Algorithm for SVM Classifier Design", 2001

use crate::core::{Result, SVMError, SolverConfig, SweepStrategy};
use crate::kernel::KernelEvaluator;
use crate::solver::partition::IndexPartitioner;
use crate::solver::state::{DualState, Problem};
use crate::solver::{snap_to_bounds, SolveOutcome};

/// Kernel values of a working pair
#[derive(Debug, Clone, Copy)]
pub(super) struct PairKernel {
    pub k11: f64,
    pub k12: f64,
    pub k22: f64,
}

/// Pairwise solver for the dual with an equality constraint
pub struct SmoSolver<'a> {
    pub(super) evaluator: KernelEvaluator<'a>,
    pub(super) state: DualState,
    pub(super) partition: IndexPartitioner,
    pub(super) config: SolverConfig,
    pub(super) steps: usize,
}

impl<'a> SmoSolver<'a> {
    /// Set up the solver from an initialized state
    ///
    /// The gradient cache of `state` must be valid for every index, which
    /// holds for a fresh state and after warm-start seeding.
    pub fn new(evaluator: KernelEvaluator<'a>, state: DualState, config: SolverConfig) -> Self {
        let epsilon = match state.problem() {
            Problem::Classification => 0.0,
            Problem::Regression => config.epsilon,
        };
        let partition = IndexPartitioner::new(&state, epsilon);
        Self {
            evaluator,
            state,
            partition,
            config,
            steps: 0,
        }
    }

    pub fn state(&self) -> &DualState {
        &self.state
    }

    pub fn partition(&self) -> &IndexPartitioner {
        &self.partition
    }

    /// Run the outer loop until the thresholds meet or the pass budget runs out
    pub fn solve(mut self) -> Result<SolveOutcome> {
        let n = self.state.len();
        let mut examine_all = true;
        let mut num_changed = 0usize;
        let mut iterations = 0usize;

        while (num_changed > 0 || examine_all) && iterations < self.config.max_iterations {
            iterations += 1;
            num_changed = 0;

            if examine_all {
                for i in 0..n {
                    if self.examine_example(i)? {
                        num_changed += 1;
                    }
                }
            } else {
                num_changed = match self.config.strategy {
                    SweepStrategy::ModificationOne => self.sweep_free()?,
                    SweepStrategy::ModificationTwo => {
                        self.step_worst_pairs()?;
                        0
                    }
                };
            }

            log::debug!(
                "pass {}: {} {} changes, {} free, b_up={:.6}, b_low={:.6}",
                iterations,
                if examine_all { "full" } else { "restricted" },
                num_changed,
                self.partition.free_indices().len(),
                self.partition.b_up,
                self.partition.b_low
            );

            if examine_all {
                examine_all = false;
            } else if num_changed == 0 {
                examine_all = true;
            }
        }

        let converged = num_changed == 0 && !examine_all;
        if !converged {
            log::warn!(
                "SMO stopped after {iterations} passes without closing the KKT gap \
                 (b_up={:.6}, b_low={:.6})",
                self.partition.b_up,
                self.partition.b_low
            );
            self.state.recompute_gradients(self.evaluator.view());
            self.partition.rescan_all(&self.state);
        }

        let bias = self.bias()?;
        let objective = self.state.objective(self.evaluator.view(), self.partition.epsilon());
        Ok(SolveOutcome {
            bias,
            b_low: self.partition.b_low,
            b_up: self.partition.b_up,
            iterations,
            steps: self.steps,
            converged,
            objective,
            cache: self.evaluator.stats(),
            state: self.state,
        })
    }

    /// Modification one: examine interior indices until the gap closes
    fn sweep_free(&mut self) -> Result<usize> {
        let mut changed = 0;
        let free = self.partition.free_indices().to_vec();
        for i in free {
            if self.examine_example(i)? {
                changed += 1;
            }
            if self.partition.is_optimal(self.config.tolerance) {
                return Ok(0);
            }
        }
        Ok(changed)
    }

    /// Modification two: step the current worst pair until the gap closes
    /// or a step is rejected
    fn step_worst_pairs(&mut self) -> Result<()> {
        while !self.partition.is_optimal(self.config.tolerance) {
            let (i_up, i_low) = self.extreme_pair()?;
            if !self.take_step(i_up, i_low)? {
                break;
            }
        }
        Ok(())
    }

    fn extreme_pair(&self) -> Result<(usize, usize)> {
        match (self.partition.i_up, self.partition.i_low) {
            (Some(i_up), Some(i_low)) => Ok((i_up, i_low)),
            _ => Err(SVMError::InternalInvariant(
                "threshold indices unset after an accepted step".to_string(),
            )),
        }
    }

    /// Check index `i2` against the thresholds and step it with the
    /// partner that violates most
    ///
    /// Returns `true` when a step was accepted.
    pub fn examine_example(&mut self, i2: usize) -> Result<bool> {
        if !self.partition.is_free(i2) {
            self.evaluator.hint_rows(&[i2]);
            let f2 = self.state.compute_gradient(&mut self.evaluator, i2);
            self.state.fcache[i2] = f2;
            self.partition.update_threshold(&self.state, i2);
        }

        let two_tol = 2.0 * self.config.tolerance;
        let below_low = self
            .partition
            .up_value(&self.state, i2)
            .map(|v| self.partition.b_low - v)
            .filter(|&gap| gap > two_tol);
        let above_up = self
            .partition
            .low_value(&self.state, i2)
            .map(|v| v - self.partition.b_up)
            .filter(|&gap| gap > two_tol);

        let partner = match (below_low, above_up) {
            (None, None) => return Ok(false),
            (Some(_), None) => self.partition.i_low,
            (None, Some(_)) => self.partition.i_up,
            (Some(low_gap), Some(up_gap)) => {
                if up_gap > low_gap {
                    self.partition.i_up
                } else {
                    self.partition.i_low
                }
            }
        };
        let i1 = partner.ok_or_else(|| {
            SVMError::InternalInvariant(format!("no partner for violating index {i2}"))
        })?;
        self.take_step(i1, i2)
    }

    /// Jointly optimize the multipliers of `i1` and `i2`
    ///
    /// Both gradients must be current. Returns `true` when the pair moved.
    pub fn take_step(&mut self, i1: usize, i2: usize) -> Result<bool> {
        if i1 == i2 {
            return Ok(false);
        }
        match self.state.problem() {
            Problem::Classification => self.take_step_classification(i1, i2),
            Problem::Regression => self.take_step_regression(i1, i2),
        }
    }

    fn take_step_classification(&mut self, i1: usize, i2: usize) -> Result<bool> {
        let (alpha1, alpha2) = (self.state.alpha[i1], self.state.alpha[i2]);
        let (y1, y2) = (self.state.target[i1], self.state.target[i2]);
        let (f1, f2) = (self.state.fcache[i1], self.state.fcache[i2]);
        let (c1, c2) = (self.state.bound[i1], self.state.bound[i2]);
        let eps = self.config.eps;
        let s = y1 * y2;

        let (l, h) = if y1 != y2 {
            ((alpha2 - alpha1).max(0.0), c2.min(c1 + alpha2 - alpha1))
        } else {
            ((alpha1 + alpha2 - c1).max(0.0), c2.min(alpha1 + alpha2))
        };
        if l >= h {
            return Ok(false);
        }

        self.evaluator.hint_rows(&[i1, i2]);
        let kernel = PairKernel {
            k11: self.evaluator.diag(i1),
            k12: self.evaluator.k(i1, i2),
            k22: self.evaluator.diag(i2),
        };
        let eta = 2.0 * kernel.k12 - kernel.k11 - kernel.k22;

        let mut a2 = if eta < 0.0 {
            (alpha2 - y2 * (f1 - f2) / eta).clamp(l, h)
        } else {
            // Flat or indefinite curvature: compare the objective at both ends
            let g1 = y1 * f1 - alpha1 * kernel.k11 - s * alpha2 * kernel.k12;
            let g2 = y2 * f2 - s * alpha1 * kernel.k12 - alpha2 * kernel.k22;
            let psi = |a2: f64| {
                let a1 = alpha1 + s * (alpha2 - a2);
                a1 * g1
                    + a2 * g2
                    + 0.5 * a1 * a1 * kernel.k11
                    + 0.5 * a2 * a2 * kernel.k22
                    + s * a1 * a2 * kernel.k12
            };
            let (psi_l, psi_h) = (psi(l), psi(h));
            if psi_l < psi_h - eps {
                l
            } else if psi_l > psi_h + eps {
                h
            } else {
                alpha2
            }
        };
        a2 = snap_to_bounds(a2, c2);

        if (a2 - alpha2).abs() < eps * (a2 + alpha2 + eps) {
            return Ok(false);
        }

        let mut a1 = alpha1 + s * (alpha2 - a2);
        if a1 < 0.0 {
            a2 += s * a1;
            a1 = 0.0;
        } else if a1 > c1 {
            a2 += s * (a1 - c1);
            a1 = c1;
        }
        let a1 = snap_to_bounds(a1, c1);
        let a2 = snap_to_bounds(a2, c2);

        self.commit_pair(i1, i2, (a1, 0.0), (a2, 0.0), kernel)?;
        Ok(true)
    }

    /// Store new multipliers for a pair and bring the gradient cache,
    /// buckets and thresholds up to date
    pub(super) fn commit_pair(
        &mut self,
        i1: usize,
        i2: usize,
        new1: (f64, f64),
        new2: (f64, f64),
        kernel: PairKernel,
    ) -> Result<()> {
        let beta1 = self.state.coefficient(i1);
        let beta2 = self.state.coefficient(i2);
        self.state.set_multipliers(i1, new1.0, new1.1);
        self.state.set_multipliers(i2, new2.0, new2.1);
        let d1 = self.state.coefficient(i1) - beta1;
        let d2 = self.state.coefficient(i2) - beta2;

        self.state.shift_gradient(i1, d1 * kernel.k11 + d2 * kernel.k12);
        self.state.shift_gradient(i2, d1 * kernel.k12 + d2 * kernel.k22);
        for &k in self.partition.free_indices() {
            if k == i1 || k == i2 {
                continue;
            }
            let delta = d1 * self.evaluator.k(i1, k) + d2 * self.evaluator.k(i2, k);
            self.state.shift_gradient(k, delta);
        }

        self.partition.classify_index(&self.state, i1);
        self.partition.classify_index(&self.state, i2);
        self.partition.rescan_after_step(&self.state, i1, i2);
        self.extreme_pair()?;
        self.steps += 1;
        Ok(())
    }

    fn bias(&self) -> Result<f64> {
        let (b_low, b_up) = (self.partition.b_low, self.partition.b_up);
        if !b_low.is_finite() || !b_up.is_finite() {
            return Err(SVMError::InternalInvariant(format!(
                "thresholds not finite at exit (b_up={b_up}, b_low={b_low})"
            )));
        }
        Ok(match self.state.problem() {
            Problem::Classification => -(b_low + b_up) / 2.0,
            Problem::Regression => (b_low + b_up) / 2.0,
        })
    }

    /// Largest gap between a cached interior gradient and its definition
    #[cfg(test)]
    pub(crate) fn max_gradient_drift(&mut self) -> f64 {
        let free = self.partition.free_indices().to_vec();
        free.into_iter()
            .map(|i| {
                let exact = self.state.compute_gradient(&mut self.evaluator, i);
                (exact - self.state.fcache[i]).abs()
            })
            .fold(0.0, f64::max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{CacheMode, ErrorKind, Sample};
    use crate::kernel::{LinearKernel, RBFKernel};
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn blobs(n: usize, seed: u64) -> Vec<Sample> {
        let mut rng = StdRng::seed_from_u64(seed);
        (0..n)
            .map(|i| {
                let label = if i % 2 == 0 { 1.0 } else { -1.0 };
                let x = label * 1.0 + rng.random_range(-1.5..1.5);
                let y = label * 1.0 + rng.random_range(-1.5..1.5);
                Sample::dense(&[x, y], label)
            })
            .collect()
    }

    fn classification_state(data: &[Sample], c: f64) -> DualState {
        DualState::classification(
            data.iter().map(|s| s.label).collect(),
            vec![c; data.len()],
        )
    }

    #[test]
    fn test_simple_separable_pair() {
        let data = vec![
            Sample::dense(&[1.0, 0.0], 1.0),
            Sample::dense(&[-1.0, 0.0], -1.0),
        ];
        let kernel = LinearKernel::new();
        let evaluator = KernelEvaluator::new(&kernel, &data, CacheMode::None).unwrap();
        let state = classification_state(&data, 10.0);
        let outcome = SmoSolver::new(evaluator, state, SolverConfig::default())
            .solve()
            .unwrap();

        assert!(outcome.converged);
        // w = (1, 0), b = 0, alphas = 0.5
        assert!((outcome.state.alpha()[0] - 0.5).abs() < 1e-6);
        assert!((outcome.state.alpha()[1] - 0.5).abs() < 1e-6);
        assert!(outcome.bias.abs() < 1e-6);
    }

    #[test]
    fn test_gradient_cache_consistency_during_training() {
        let data = blobs(60, 7);
        let kernel = RBFKernel::new(0.5).unwrap();
        for mode in [CacheMode::None, CacheMode::Rows { bytes: 4096 }] {
            let evaluator = KernelEvaluator::new(&kernel, &data, mode).unwrap();
            let state = classification_state(&data, 1.0);
            let mut solver = SmoSolver::new(evaluator, state, SolverConfig::default());

            for round in 0..3 {
                for i in 0..data.len() {
                    solver.examine_example(i).unwrap();
                    assert!(
                        solver.max_gradient_drift() < 1e-8,
                        "drift after examining {i} in round {round}"
                    );
                }
            }
            assert!(solver.steps > 0);
        }
    }

    #[test]
    fn test_equality_constraint_preserved() {
        let data = blobs(40, 3);
        let kernel = RBFKernel::new(1.0).unwrap();
        let evaluator = KernelEvaluator::new(&kernel, &data, CacheMode::Full).unwrap();
        let state = classification_state(&data, 0.5);
        let outcome = SmoSolver::new(evaluator, state, SolverConfig::default())
            .solve()
            .unwrap();

        let sum: f64 = outcome.state.coefficients().iter().sum();
        assert!(sum.abs() < 1e-5, "Σ α y = {sum}");
        for &a in outcome.state.alpha() {
            assert!((0.0..=0.5).contains(&a));
        }
    }

    #[test]
    fn test_both_strategies_reach_optimality() {
        let data = blobs(50, 11);
        let kernel = RBFKernel::new(0.5).unwrap();
        let mut objectives = Vec::new();
        for strategy in [SweepStrategy::ModificationOne, SweepStrategy::ModificationTwo] {
            let config = SolverConfig {
                strategy,
                ..SolverConfig::default()
            };
            let evaluator = KernelEvaluator::new(&kernel, &data, CacheMode::None).unwrap();
            let outcome = SmoSolver::new(evaluator, classification_state(&data, 1.0), config)
                .solve()
                .unwrap();
            assert!(outcome.converged, "{strategy:?} did not converge");
            assert!(outcome.b_low <= outcome.b_up + 2.0 * 1e-3 + 1e-9);
            let evaluator = KernelEvaluator::new(&kernel, &data, CacheMode::None).unwrap();
            objectives.push(outcome.state.objective(evaluator.view(), 0.0));
        }
        assert!((objectives[0] - objectives[1]).abs() < 1e-2 * objectives[0].abs().max(1.0));
    }

    #[test]
    fn test_iteration_budget_is_not_an_error() {
        let data = blobs(80, 5);
        let kernel = RBFKernel::new(2.0).unwrap();
        let config = SolverConfig {
            max_iterations: 1,
            c: 100.0,
            ..SolverConfig::default()
        };
        let evaluator = KernelEvaluator::new(&kernel, &data, CacheMode::None).unwrap();
        let outcome = SmoSolver::new(evaluator, classification_state(&data, 100.0), config)
            .solve()
            .unwrap();

        assert_eq!(outcome.iterations, 1);
        assert!(!outcome.converged);
        assert!(outcome.bias.is_finite());
    }

    #[test]
    fn test_bound_gradients_read_cached_rows() {
        let data = blobs(40, 13);
        let kernel = RBFKernel::new(0.5).unwrap();
        let bytes = data.len() * data.len() * std::mem::size_of::<f64>();
        let evaluator =
            KernelEvaluator::new(&kernel, &data, CacheMode::Rows { bytes }).unwrap();
        let state = classification_state(&data, 1.0);
        let mut solver = SmoSolver::new(evaluator, state, SolverConfig::default());

        for round in 0..2 {
            for i in 0..data.len() {
                solver.examine_example(i).unwrap();
            }
            let stats = solver.evaluator.stats();
            assert!(stats.hits > 0, "round {round}");
            // Every kernel lookup goes through a row loaded beforehand
            assert_eq!(stats.misses, 0, "round {round}");
        }
        assert!(solver.steps > 0);
    }

    #[test]
    fn test_missing_partner_is_internal_error() {
        let data = blobs(10, 17);
        let kernel = LinearKernel::new();
        let evaluator = KernelEvaluator::new(&kernel, &data, CacheMode::None).unwrap();
        let state = classification_state(&data, 1.0);
        let mut solver = SmoSolver::new(evaluator, state, SolverConfig::default());

        // Index 0 is a positive at zero and violates against b_low
        assert_eq!(data[0].label, 1.0);
        assert!(solver.partition.b_low > solver.partition.b_up + 2.0 * solver.config.tolerance);
        solver.partition.i_low = None;

        let err = solver.examine_example(0).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InternalInvariant);
        assert!(err.is_internal());
        assert!(err.to_string().contains("no partner"));
        assert_eq!(solver.steps, 0);
    }

    #[test]
    fn test_unset_threshold_indices_are_internal_errors() {
        let data = blobs(10, 19);
        let kernel = LinearKernel::new();
        let evaluator = KernelEvaluator::new(&kernel, &data, CacheMode::None).unwrap();
        let state = classification_state(&data, 1.0);
        let mut solver = SmoSolver::new(evaluator, state, SolverConfig::default());
        assert!(solver.extreme_pair().is_ok());

        solver.partition.i_up = None;
        assert!(!solver.partition.is_optimal(solver.config.tolerance));
        let err = solver.extreme_pair().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InternalInvariant);

        let err = solver.step_worst_pairs().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InternalInvariant);
        assert_eq!(solver.steps, 0);
    }

    #[test]
    fn test_non_finite_thresholds_are_internal_errors() {
        let data = blobs(10, 23);
        let kernel = LinearKernel::new();
        let evaluator = KernelEvaluator::new(&kernel, &data, CacheMode::None).unwrap();
        let state = classification_state(&data, 1.0);
        let mut solver = SmoSolver::new(evaluator, state, SolverConfig::default());
        assert!(solver.bias().unwrap().is_finite());

        solver.partition.b_low = f64::NAN;
        let err = solver.bias().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InternalInvariant);
        assert_ne!(err.kind(), ErrorKind::Shape);
        assert_ne!(err.kind(), ErrorKind::Config);

        solver.partition.b_low = 1.0;
        solver.partition.b_up = f64::INFINITY;
        let err = solver.bias().unwrap_err();
        assert!(err.is_internal());
    }

    #[test]
    fn test_duplicate_points_with_opposite_labels() {
        // Identical inputs give eta == 0; the endpoint comparison must cope
        let data = vec![
            Sample::dense(&[1.0, 1.0], 1.0),
            Sample::dense(&[1.0, 1.0], -1.0),
            Sample::dense(&[2.0, 2.0], 1.0),
            Sample::dense(&[-2.0, -2.0], -1.0),
        ];
        let kernel = LinearKernel::new();
        let evaluator = KernelEvaluator::new(&kernel, &data, CacheMode::None).unwrap();
        let state = classification_state(&data, 1.0);
        let outcome = SmoSolver::new(evaluator, state, SolverConfig::default())
            .solve()
            .unwrap();
        assert!(outcome.bias.is_finite());
        assert!(outcome.state.alpha().iter().all(|&a| (0.0..=1.0).contains(&a)));
    }
}
