//! Dual coordinate solver without a bias term
//!
//! Dropping the bias removes the equality constraint, so every multiplier
//! can be optimized on its own. For a normalized kernel (K(x, x) = 1) the
//! exact one-dimensional maximizer is a clipped, and for regression
//! soft-thresholded, Newton step. Each accepted step on an examined index
//! is followed by a step on the interior index that violates the KKT
//! conditions most, which is tracked while the gradient cache is updated.

use crate::core::{Result, SolverConfig};
use crate::kernel::KernelEvaluator;
use crate::solver::partition::IndexPartitioner;
use crate::solver::state::{DualState, Problem};
use crate::solver::{SolveOutcome, BOUND_SNAP};

/// Coordinate solver for the bias-free dual
pub struct NoBiasSolver<'a> {
    evaluator: KernelEvaluator<'a>,
    state: DualState,
    partition: IndexPartitioner,
    config: SolverConfig,
    // Epsilon of the loss; zero for classification
    epsilon: f64,
    partner: Option<usize>,
    steps: usize,
}

impl<'a> NoBiasSolver<'a> {
    /// The evaluator's kernel should be normalized; see
    /// [`NormalizedKernel::wrap`](crate::kernel::NormalizedKernel::wrap)
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
            epsilon,
            partner: None,
            steps: 0,
        }
    }

    pub fn state(&self) -> &DualState {
        &self.state
    }

    /// Alternate full and interior sweeps until a full sweep changes nothing
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
                    num_changed += self.examine_example(i)?;
                }
            } else {
                let free = self.partition.free_indices().to_vec();
                for i in free {
                    num_changed += self.examine_example(i)?;
                }
            }

            log::debug!(
                "bias-free pass {iterations}: {num_changed} changes, {} free",
                self.partition.free_indices().len()
            );

            if examine_all {
                examine_all = false;
            } else if num_changed == 0 {
                examine_all = true;
            }
        }

        let converged = num_changed == 0 && !examine_all;
        if !converged {
            log::warn!("bias-free solver stopped after {iterations} passes with KKT violations left");
            self.state.recompute_gradients(self.evaluator.view());
        }

        let objective = self.state.objective(self.evaluator.view(), self.epsilon);
        Ok(SolveOutcome {
            bias: 0.0,
            b_low: 0.0,
            b_up: 0.0,
            iterations,
            steps: self.steps,
            converged,
            objective,
            cache: self.evaluator.stats(),
            state: self.state,
        })
    }

    /// Step index `i` if it violates the KKT conditions, then its partner
    ///
    /// Returns the number of accepted coordinate steps (0, 1 or 2).
    pub fn examine_example(&mut self, i: usize) -> Result<usize> {
        if !self.partition.is_free(i) {
            self.evaluator.hint_rows(&[i]);
            let f = self.state.compute_gradient(&mut self.evaluator, i);
            self.state.fcache[i] = f;
        }
        if self.violation(i) <= self.config.tolerance {
            return Ok(0);
        }
        if !self.coordinate_step(i) {
            return Ok(0);
        }
        let mut changed = 1;
        if let Some(p) = self.partner.filter(|&p| p != i) {
            if self.violation(p) > self.config.tolerance && self.coordinate_step(p) {
                changed += 1;
            }
        }
        Ok(changed)
    }

    /// Feasible range of β_i
    fn box_of(&self, i: usize) -> (f64, f64) {
        let c = self.state.bound[i];
        match self.state.problem() {
            Problem::Classification if self.state.target[i] > 0.0 => (0.0, c),
            Problem::Classification => (-c, 0.0),
            Problem::Regression => (-c, c),
        }
    }

    /// Derivative of the dual objective in β_i, ignoring the ε term
    fn residual(&self, i: usize) -> f64 {
        -self.state.gradient_sign() * self.state.fcache[i]
    }

    /// How much the dual could still gain per unit move of β_i
    fn violation(&self, i: usize) -> f64 {
        let beta = self.state.coefficient(i);
        let (lo, hi) = self.box_of(i);
        let r = self.residual(i);
        let up_slope = if beta >= 0.0 { r - self.epsilon } else { r + self.epsilon };
        let down_slope = if beta <= 0.0 { r + self.epsilon } else { r - self.epsilon };
        let up = if beta < hi { up_slope } else { 0.0 };
        let down = if beta > lo { -down_slope } else { 0.0 };
        up.max(down).max(0.0)
    }

    /// Exact maximization over β_i alone; returns `true` when it moved
    fn coordinate_step(&mut self, i: usize) -> bool {
        let beta = self.state.coefficient(i);
        let (lo, hi) = self.box_of(i);
        let kii = self.evaluator.diag(i);
        let r = self.residual(i);

        let target = if kii > 0.0 {
            let z = r + kii * beta;
            let shrunk = if z > self.epsilon {
                z - self.epsilon
            } else if z < -self.epsilon {
                z + self.epsilon
            } else {
                0.0
            };
            (shrunk / kii).clamp(lo, hi)
        } else if r - self.epsilon > 0.0 {
            // Zero self-similarity makes the objective linear in β_i
            hi
        } else if r + self.epsilon < 0.0 {
            lo
        } else {
            beta
        };
        let target = snap_beta(target, lo, hi);

        let eps = self.config.eps;
        let delta = target - beta;
        if delta.abs() < eps * (target.abs() + beta.abs() + eps) {
            return false;
        }

        let (alpha, alpha_star) = match self.state.problem() {
            Problem::Classification => (target * self.state.target[i], 0.0),
            Problem::Regression => (target.max(0.0), (-target).max(0.0)),
        };
        self.state.set_multipliers(i, alpha, alpha_star);

        self.evaluator.hint_rows(&[i]);
        self.state.shift_gradient(i, delta * kii);
        let mut worst: Option<(f64, usize)> = None;
        let free = self.partition.free_indices().to_vec();
        for k in free {
            if k == i {
                continue;
            }
            let kik = self.evaluator.k(i, k);
            self.state.shift_gradient(k, delta * kik);
            let v = self.violation(k);
            if v > worst.map_or(0.0, |(best, _)| best) {
                worst = Some((v, k));
            }
        }
        self.partner = worst.map(|(_, k)| k);

        self.partition.classify_index(&self.state, i);
        self.steps += 1;
        true
    }

    #[cfg(test)]
    fn max_gradient_drift(&mut self) -> f64 {
        let free = self.partition.free_indices().to_vec();
        free.into_iter()
            .map(|i| {
                let exact = self.state.compute_gradient(&mut self.evaluator, i);
                (exact - self.state.fcache[i]).abs()
            })
            .fold(0.0, f64::max)
    }
}

/// Snap β onto 0 or a box end when within [`BOUND_SNAP`]
fn snap_beta(beta: f64, lo: f64, hi: f64) -> f64 {
    if beta.abs() < BOUND_SNAP {
        0.0
    } else if beta > hi - BOUND_SNAP {
        hi
    } else if beta < lo + BOUND_SNAP {
        lo
    } else {
        beta
    }
}
