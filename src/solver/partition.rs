//! Index buckets and the `b_up` / `b_low` threshold pair
//!
//! Every index sits in exactly one bucket determined by its multipliers.
//! Each bucket says whether the index may lower `b_up`, raise `b_low`, or
//! both, and by which shift of its gradient (±ε for regression).

use crate::solver::state::{DualState, Problem};
use rayon::prelude::*;

/// Free-set size above which the bound scan runs on the rayon pool
pub const PARALLEL_SCAN_THRESHOLD: usize = 4096;

/// Bookkeeping set of one index
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bucket {
    /// Classification, 0 < α < C
    Free,
    /// Classification, y = +1 and α = 0
    LowerPositive,
    /// Classification, y = -1 and α = C
    UpperNegative,
    /// Classification, y = +1 and α = C
    UpperPositive,
    /// Classification, y = -1 and α = 0
    LowerNegative,
    /// Regression, 0 < α < C
    FreeAlpha,
    /// Regression, 0 < α* < C
    FreeAlphaStar,
    /// Regression, α = α* = 0
    AtZero,
    /// Regression, α* = C
    UpperAlphaStar,
    /// Regression, α = C
    UpperAlpha,
}

impl Bucket {
    /// Interior buckets, whose gradients are kept current after every step
    pub fn is_free(self) -> bool {
        matches!(self, Bucket::Free | Bucket::FreeAlpha | Bucket::FreeAlphaStar)
    }

    /// Value this index offers to `b_up`, if any
    pub fn up_value(self, f: f64, epsilon: f64) -> Option<f64> {
        match self {
            Bucket::Free | Bucket::LowerPositive | Bucket::UpperNegative => Some(f),
            Bucket::FreeAlpha | Bucket::UpperAlpha => Some(f - epsilon),
            Bucket::FreeAlphaStar | Bucket::AtZero => Some(f + epsilon),
            Bucket::UpperPositive | Bucket::LowerNegative | Bucket::UpperAlphaStar => None,
        }
    }

    /// Value this index offers to `b_low`, if any
    pub fn low_value(self, f: f64, epsilon: f64) -> Option<f64> {
        match self {
            Bucket::Free | Bucket::UpperPositive | Bucket::LowerNegative => Some(f),
            Bucket::FreeAlpha | Bucket::AtZero => Some(f - epsilon),
            Bucket::FreeAlphaStar | Bucket::UpperAlphaStar => Some(f + epsilon),
            Bucket::LowerPositive | Bucket::UpperNegative | Bucket::UpperAlpha => None,
        }
    }
}

/// Bucket of index `i` under the current multipliers
pub fn bucket_of(state: &DualState, i: usize) -> Bucket {
    let c = state.bound[i];
    let interior = |a: f64| a > 0.0 && a < c;
    match state.problem() {
        Problem::Classification => {
            let a = state.alpha[i];
            let positive = state.target[i] > 0.0;
            if interior(a) {
                Bucket::Free
            } else if a <= 0.0 {
                if positive {
                    Bucket::LowerPositive
                } else {
                    Bucket::LowerNegative
                }
            } else if positive {
                Bucket::UpperPositive
            } else {
                Bucket::UpperNegative
            }
        }
        Problem::Regression => {
            let (a, a_star) = (state.alpha[i], state.alpha_star[i]);
            if interior(a) {
                Bucket::FreeAlpha
            } else if interior(a_star) {
                Bucket::FreeAlphaStar
            } else if a >= c {
                Bucket::UpperAlpha
            } else if a_star >= c {
                Bucket::UpperAlphaStar
            } else {
                Bucket::AtZero
            }
        }
    }
}

/// Best candidate for each threshold found by a scan
#[derive(Debug, Clone, Copy)]
struct Extremes {
    up: Option<(f64, usize)>,
    low: Option<(f64, usize)>,
}

impl Extremes {
    const EMPTY: Extremes = Extremes {
        up: None,
        low: None,
    };

    // Ties go to the smaller index so serial and parallel scans agree
    fn merge(self, other: Extremes) -> Extremes {
        let up = match (self.up, other.up) {
            (Some(a), Some(b)) if b.0 < a.0 || (b.0 == a.0 && b.1 < a.1) => Some(b),
            (a, b) => a.or(b),
        };
        let low = match (self.low, other.low) {
            (Some(a), Some(b)) if b.0 > a.0 || (b.0 == a.0 && b.1 < a.1) => Some(b),
            (a, b) => a.or(b),
        };
        Extremes { up, low }
    }
}

/// Bucket membership, the free list, and the threshold pair
#[derive(Debug, Clone)]
pub struct IndexPartitioner {
    buckets: Vec<Bucket>,
    free: Vec<usize>,
    // Position of each index inside `free`, usize::MAX when absent
    free_pos: Vec<usize>,
    epsilon: f64,
    pub b_up: f64,
    pub b_low: f64,
    pub i_up: Option<usize>,
    pub i_low: Option<usize>,
}

impl IndexPartitioner {
    /// Classify every index and set the thresholds with one full scan
    ///
    /// The gradient cache of `state` must be valid for every index.
    pub fn new(state: &DualState, epsilon: f64) -> Self {
        let n = state.len();
        let mut partitioner = Self {
            buckets: Vec::with_capacity(n),
            free: Vec::new(),
            free_pos: vec![usize::MAX; n],
            epsilon,
            b_up: f64::INFINITY,
            b_low: f64::NEG_INFINITY,
            i_up: None,
            i_low: None,
        };
        for i in 0..n {
            let bucket = bucket_of(state, i);
            partitioner.buckets.push(bucket);
            if bucket.is_free() {
                partitioner.insert_free(i);
            }
        }
        partitioner.rescan_all(state);
        partitioner
    }

    pub fn bucket(&self, i: usize) -> Bucket {
        self.buckets[i]
    }

    pub fn is_free(&self, i: usize) -> bool {
        self.free_pos[i] != usize::MAX
    }

    /// Indices currently in an interior bucket, in no particular order
    pub fn free_indices(&self) -> &[usize] {
        &self.free
    }

    pub fn epsilon(&self) -> f64 {
        self.epsilon
    }

    /// Re-derive the bucket of `i` after its multipliers changed
    pub fn classify_index(&mut self, state: &DualState, i: usize) {
        let bucket = bucket_of(state, i);
        self.buckets[i] = bucket;
        match (bucket.is_free(), self.is_free(i)) {
            (true, false) => self.insert_free(i),
            (false, true) => self.remove_free(i),
            _ => {}
        }
    }

    fn insert_free(&mut self, i: usize) {
        self.free_pos[i] = self.free.len();
        self.free.push(i);
    }

    fn remove_free(&mut self, i: usize) {
        let pos = self.free_pos[i];
        self.free.swap_remove(pos);
        if let Some(&moved) = self.free.get(pos) {
            self.free_pos[moved] = pos;
        }
        self.free_pos[i] = usize::MAX;
    }

    /// Value index `i` offers to `b_up`
    pub fn up_value(&self, state: &DualState, i: usize) -> Option<f64> {
        self.buckets[i].up_value(state.fcache[i], self.epsilon)
    }

    /// Value index `i` offers to `b_low`
    pub fn low_value(&self, state: &DualState, i: usize) -> Option<f64> {
        self.buckets[i].low_value(state.fcache[i], self.epsilon)
    }

    /// Tighten the thresholds with the current gradient of index `i`
    pub fn update_threshold(&mut self, state: &DualState, i: usize) {
        if let Some(up) = self.up_value(state, i) {
            if up < self.b_up {
                self.b_up = up;
                self.i_up = Some(i);
            }
        }
        if let Some(low) = self.low_value(state, i) {
            if low > self.b_low {
                self.b_low = low;
                self.i_low = Some(i);
            }
        }
    }

    fn candidates(&self, state: &DualState, i: usize) -> Extremes {
        Extremes {
            up: self.up_value(state, i).map(|v| (v, i)),
            low: self.low_value(state, i).map(|v| (v, i)),
        }
    }

    fn apply(&mut self, extremes: Extremes) {
        (self.b_up, self.i_up) = match extremes.up {
            Some((v, i)) => (v, Some(i)),
            None => (f64::INFINITY, None),
        };
        (self.b_low, self.i_low) = match extremes.low {
            Some((v, i)) => (v, Some(i)),
            None => (f64::NEG_INFINITY, None),
        };
    }

    /// Recompute the thresholds over every index
    pub fn rescan_all(&mut self, state: &DualState) {
        let extremes = (0..state.len())
            .map(|i| self.candidates(state, i))
            .fold(Extremes::EMPTY, Extremes::merge);
        self.apply(extremes);
    }

    /// Recompute the thresholds over the free set plus the two indices
    /// that were just stepped
    pub fn rescan_after_step(&mut self, state: &DualState, i1: usize, i2: usize) {
        let free = if self.free.len() > PARALLEL_SCAN_THRESHOLD {
            self.free
                .par_iter()
                .map(|&i| self.candidates(state, i))
                .reduce(|| Extremes::EMPTY, Extremes::merge)
        } else {
            self.free
                .iter()
                .map(|&i| self.candidates(state, i))
                .fold(Extremes::EMPTY, Extremes::merge)
        };
        let extremes = free
            .merge(self.candidates(state, i1))
            .merge(self.candidates(state, i2));
        self.apply(extremes);
    }

    /// True when `b_low <= b_up + 2 * tolerance`
    pub fn is_optimal(&self, tolerance: f64) -> bool {
        self.b_low <= self.b_up + 2.0 * tolerance
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification_buckets() {
        let mut state = DualState::classification(vec![1.0, -1.0, 1.0, -1.0, 1.0], vec![1.0; 5]);
        state.set_multipliers(2, 1.0, 0.0);
        state.set_multipliers(3, 1.0, 0.0);
        state.set_multipliers(4, 0.5, 0.0);

        assert_eq!(bucket_of(&state, 0), Bucket::LowerPositive);
        assert_eq!(bucket_of(&state, 1), Bucket::LowerNegative);
        assert_eq!(bucket_of(&state, 2), Bucket::UpperPositive);
        assert_eq!(bucket_of(&state, 3), Bucket::UpperNegative);
        assert_eq!(bucket_of(&state, 4), Bucket::Free);
    }

    #[test]
    fn test_regression_buckets() {
        let mut state = DualState::regression(vec![0.0; 5], vec![2.0; 5]);
        state.set_multipliers(1, 1.0, 0.0);
        state.set_multipliers(2, 0.0, 1.0);
        state.set_multipliers(3, 2.0, 0.0);
        state.set_multipliers(4, 0.0, 2.0);

        assert_eq!(bucket_of(&state, 0), Bucket::AtZero);
        assert_eq!(bucket_of(&state, 1), Bucket::FreeAlpha);
        assert_eq!(bucket_of(&state, 2), Bucket::FreeAlphaStar);
        assert_eq!(bucket_of(&state, 3), Bucket::UpperAlpha);
        assert_eq!(bucket_of(&state, 4), Bucket::UpperAlphaStar);
    }

    #[test]
    fn test_every_bucket_reaches_a_threshold() {
        let buckets = [
            Bucket::Free,
            Bucket::LowerPositive,
            Bucket::UpperNegative,
            Bucket::UpperPositive,
            Bucket::LowerNegative,
            Bucket::FreeAlpha,
            Bucket::FreeAlphaStar,
            Bucket::AtZero,
            Bucket::UpperAlphaStar,
            Bucket::UpperAlpha,
        ];
        for bucket in buckets {
            let up = bucket.up_value(0.0, 0.1);
            let low = bucket.low_value(0.0, 0.1);
            assert!(up.is_some() || low.is_some(), "{bucket:?}");
            assert_eq!(bucket.is_free(), up.is_some() && low.is_some() && bucket != Bucket::AtZero);
        }
    }

    #[test]
    fn test_initial_thresholds_classification() {
        let state = DualState::classification(vec![1.0, -1.0, 1.0], vec![1.0; 3]);
        let partitioner = IndexPartitioner::new(&state, 0.0);

        // F = -y: positives offer -1 to b_up, negatives +1 to b_low
        assert_eq!(partitioner.b_up, -1.0);
        assert_eq!(partitioner.i_up, Some(0));
        assert_eq!(partitioner.b_low, 1.0);
        assert_eq!(partitioner.i_low, Some(1));
        assert!(!partitioner.is_optimal(1e-3));
        assert!(partitioner.free_indices().is_empty());
    }

    #[test]
    fn test_initial_thresholds_regression() {
        let state = DualState::regression(vec![1.0, 3.0], vec![1.0; 2]);
        let partitioner = IndexPartitioner::new(&state, 0.5);

        // All at zero: b_up = min(F + ε), b_low = max(F - ε)
        assert_eq!(partitioner.b_up, 1.5);
        assert_eq!(partitioner.i_up, Some(0));
        assert_eq!(partitioner.b_low, 2.5);
        assert_eq!(partitioner.i_low, Some(1));
    }

    #[test]
    fn test_free_list_tracking() {
        let mut state = DualState::classification(vec![1.0; 4], vec![1.0; 4]);
        let mut partitioner = IndexPartitioner::new(&state, 0.0);

        for i in [1, 2, 3] {
            state.set_multipliers(i, 0.5, 0.0);
            partitioner.classify_index(&state, i);
        }
        assert_eq!(partitioner.free_indices().len(), 3);

        state.set_multipliers(1, 0.0, 0.0);
        partitioner.classify_index(&state, 1);
        assert!(!partitioner.is_free(1));
        assert!(partitioner.is_free(2));
        assert!(partitioner.is_free(3));
        let mut free = partitioner.free_indices().to_vec();
        free.sort_unstable();
        assert_eq!(free, vec![2, 3]);
    }

    #[test]
    fn test_update_threshold_only_tightens() {
        let mut state = DualState::classification(vec![1.0, -1.0, 1.0], vec![1.0; 3]);
        let mut partitioner = IndexPartitioner::new(&state, 0.0);

        state.fcache[2] = -3.0;
        partitioner.update_threshold(&state, 2);
        assert_eq!(partitioner.b_up, -3.0);
        assert_eq!(partitioner.i_up, Some(2));

        state.fcache[0] = 0.0;
        partitioner.update_threshold(&state, 0);
        assert_eq!(partitioner.i_up, Some(2));
    }

    #[test]
    fn test_rescan_after_step_uses_free_set_and_pair() {
        let mut state = DualState::classification(vec![1.0, -1.0, 1.0, -1.0], vec![1.0; 4]);
        state.set_multipliers(0, 0.5, 0.0);
        state.set_multipliers(1, 0.5, 0.0);
        state.fcache = vec![0.2, -0.1, -5.0, 5.0];
        let mut partitioner = IndexPartitioner::new(&state, 0.0);
        assert_eq!(partitioner.i_up, Some(2));

        // Indices 2 and 3 are bound and not part of the step, so they are ignored
        partitioner.rescan_after_step(&state, 0, 1);
        assert_eq!(partitioner.b_up, -0.1);
        assert_eq!(partitioner.i_up, Some(1));
        assert_eq!(partitioner.b_low, 0.2);
        assert_eq!(partitioner.i_low, Some(0));
    }
}
