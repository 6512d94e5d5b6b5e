//! Dual coordinate solvers
//!
//! [`SmoSolver`] implements the two-threshold SMO of Keerthi et al. for
//! classification and the Shevade et al. extension for epsilon-insensitive
//! regression. [`NoBiasSolver`] handles the bias-free dual, which has no
//! equality constraint.

pub mod no_bias;
pub mod partition;
pub mod regression;
pub mod smo;
pub mod state;
pub mod warm;

pub use self::no_bias::*;
pub use self::partition::*;
pub use self::regression::MAX_REGRESSION_CASE_PASSES;
pub use self::smo::*;
pub use self::state::*;
pub use self::warm::*;

use crate::cache::CacheStats;

/// Multipliers within this distance of a bound are treated as on it
pub const BOUND_SNAP: f64 = 1e-7;

/// Snap a multiplier onto 0 or `c` when it is within [`BOUND_SNAP`]
pub(crate) fn snap_to_bounds(a: f64, c: f64) -> f64 {
    if a < BOUND_SNAP {
        0.0
    } else if a > c - BOUND_SNAP {
        c
    } else {
        a
    }
}

/// Final state of an optimization run
#[derive(Debug, Clone)]
pub struct SolveOutcome {
    pub state: DualState,
    /// Bias of the decision function, 0 for the bias-free solver
    pub bias: f64,
    pub b_low: f64,
    pub b_up: f64,
    /// Outer passes performed
    pub iterations: usize,
    /// Accepted coordinate or pair updates
    pub steps: usize,
    pub converged: bool,
    /// Dual objective at exit
    pub objective: f64,
    pub cache: CacheStats,
}
