//! Pairwise step for epsilon-insensitive regression
//!
//! Each sample carries two multipliers, α for points above the tube and
//! α* for points below it, with at most one of them non-zero. A pair step
//! moves one multiplier of each index while keeping Σ (α - α*) fixed. That
//! gives four sub-problems, one per combination. They are tried in a fixed
//! order, each at most once, because settling one can open up another.
//!
//! Reference: Shevade, Keerthi, Bhattacharyya, Murthy, "Improvements to the
//! SMO Algorithm for SVM Regression", 2000.

use crate::core::Result;
use crate::solver::smo::{PairKernel, SmoSolver};
use crate::solver::snap_to_bounds;

/// Upper bound on case passes in one regression step
///
/// Every case is entered at most once, so the loop ends within four passes
/// on its own; the cap only guards against a broken case predicate.
pub const MAX_REGRESSION_CASE_PASSES: usize = 8;

/// Which two multipliers a case moves
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Case {
    /// α1 and α2
    AlphaAlpha,
    /// α1 and α2*
    AlphaStar,
    /// α1* and α2
    StarAlpha,
    /// α1* and α2*
    StarStar,
}

impl Case {
    const ORDER: [Case; 4] = [
        Case::AlphaAlpha,
        Case::AlphaStar,
        Case::StarAlpha,
        Case::StarStar,
    ];

    fn slot(self) -> usize {
        self as usize
    }
}

/// Working copy of the four multipliers of a pair
#[derive(Debug, Clone, Copy)]
struct PairMultipliers {
    a1: f64,
    a1_star: f64,
    a2: f64,
    a2_star: f64,
}

impl PairMultipliers {
    /// Feasibility predicate of `case` under the current gradient gap
    fn admits(&self, case: Case, delta_phi: f64, epsilon: f64) -> bool {
        let two_eps = 2.0 * epsilon;
        let p = self;
        match case {
            Case::AlphaAlpha => {
                (p.a1 > 0.0 || (p.a1_star == 0.0 && delta_phi > 0.0))
                    && (p.a2 > 0.0 || (p.a2_star == 0.0 && delta_phi < 0.0))
            }
            Case::AlphaStar => {
                (p.a1 > 0.0 || (p.a1_star == 0.0 && delta_phi > two_eps))
                    && (p.a2_star > 0.0 || (p.a2 == 0.0 && delta_phi > two_eps))
            }
            Case::StarAlpha => {
                (p.a1_star > 0.0 || (p.a1 == 0.0 && delta_phi < -two_eps))
                    && (p.a2 > 0.0 || (p.a2_star == 0.0 && delta_phi < -two_eps))
            }
            Case::StarStar => {
                (p.a1_star > 0.0 || (p.a1 == 0.0 && delta_phi < 0.0))
                    && (p.a2_star > 0.0 || (p.a2 == 0.0 && delta_phi > 0.0))
            }
        }
    }
}

impl<'a> SmoSolver<'a> {
    pub(super) fn take_step_regression(&mut self, i1: usize, i2: usize) -> Result<bool> {
        let old = PairMultipliers {
            a1: self.state.alpha[i1],
            a1_star: self.state.alpha_star[i1],
            a2: self.state.alpha[i2],
            a2_star: self.state.alpha_star[i2],
        };
        let (c1, c2) = (self.state.bound[i1], self.state.bound[i2]);
        let epsilon = self.config.epsilon;
        let eps = self.config.eps;

        self.evaluator.hint_rows(&[i1, i2]);
        let kernel = PairKernel {
            k11: self.evaluator.diag(i1),
            k12: self.evaluator.k(i1, i2),
            k22: self.evaluator.diag(i2),
        };
        let eta = kernel.k11 + kernel.k22 - 2.0 * kernel.k12;

        // β1 + β2 stays fixed through every case
        let gamma = (old.a1 - old.a1_star) + (old.a2 - old.a2_star);
        let mut delta_phi = self.state.fcache[i1] - self.state.fcache[i2];
        let mut cur = old;
        let mut tried = [false; 4];

        for pass in 1.. {
            if pass > MAX_REGRESSION_CASE_PASSES {
                log::warn!(
                    "regression step ({i1}, {i2}) hit the case pass cap, keeping the last update"
                );
                break;
            }
            let Some(case) = Case::ORDER
                .into_iter()
                .find(|&case| !tried[case.slot()] && cur.admits(case, delta_phi, epsilon))
            else {
                break;
            };
            tried[case.slot()] = true;

            let (l, h) = match case {
                Case::AlphaAlpha => ((gamma - c1).max(0.0), c2.min(gamma)),
                Case::AlphaStar => ((-gamma).max(0.0), c2.min(c1 - gamma)),
                Case::StarAlpha => (gamma.max(0.0), c2.min(c1 + gamma)),
                Case::StarStar => ((-gamma - c1).max(0.0), c2.min(-gamma)),
            };
            if l >= h {
                break;
            }

            // Slope of the dual objective along the case direction at t = 0
            let (slope, current) = match case {
                Case::AlphaAlpha => (-delta_phi, cur.a2),
                Case::AlphaStar => (delta_phi - 2.0 * epsilon, cur.a2_star),
                Case::StarAlpha => (-(delta_phi + 2.0 * epsilon), cur.a2),
                Case::StarStar => (delta_phi, cur.a2_star),
            };
            let next = if eta > 0.0 {
                (current + slope / eta).clamp(l, h)
            } else {
                let gain = |x: f64| {
                    let t = x - current;
                    slope * t - 0.5 * eta * t * t
                };
                let (gain_l, gain_h) = (gain(l), gain(h));
                if gain_l > gain_h + eps {
                    l
                } else if gain_h > gain_l + eps {
                    h
                } else {
                    current.clamp(l, h)
                }
            };
            let t = next - current;

            match case {
                Case::AlphaAlpha => {
                    cur.a2 = next;
                    cur.a1 -= t;
                    delta_phi += eta * t;
                }
                Case::AlphaStar => {
                    cur.a2_star = next;
                    cur.a1 += t;
                    delta_phi -= eta * t;
                }
                Case::StarAlpha => {
                    cur.a2 = next;
                    cur.a1_star += t;
                    delta_phi += eta * t;
                }
                Case::StarStar => {
                    cur.a2_star = next;
                    cur.a1_star -= t;
                    delta_phi -= eta * t;
                }
            }
        }

        let new = PairMultipliers {
            a1: snap_to_bounds(cur.a1, c1),
            a1_star: snap_to_bounds(cur.a1_star, c1),
            a2: snap_to_bounds(cur.a2, c2),
            a2_star: snap_to_bounds(cur.a2_star, c2),
        };

        let moved = (new.a2 - old.a2).abs() + (new.a2_star - old.a2_star).abs();
        if moved < eps * (new.a2 + new.a2_star + old.a2 + old.a2_star + eps) {
            return Ok(false);
        }

        self.commit_pair(
            i1,
            i2,
            (new.a1, new.a1_star),
            (new.a2, new.a2_star),
            kernel,
        )?;
        Ok(true)
    }
}
