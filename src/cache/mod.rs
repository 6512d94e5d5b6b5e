//! Kernel value caches
//!
//! Two LRU layouts are provided for a single training call:
//! - [`KernelCache`] keeps individual symmetric entries K(i, j), keyed so
//!   that i <= j.
//! - [`RowCache`] keeps whole kernel rows K(i, ·) under a byte budget, which
//!   suits the dense sweeps over the free set after every step.

use lru::LruCache;
use std::num::NonZeroUsize;

/// Cache key for kernel values, normalized so that i <= j
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct PairKey {
    i: usize,
    j: usize,
}

impl PairKey {
    fn new(i: usize, j: usize) -> Self {
        if i <= j {
            Self { i, j }
        } else {
            Self { i: j, j: i }
        }
    }
}

fn capacity_of(n: usize) -> NonZeroUsize {
    NonZeroUsize::new(n).unwrap_or(NonZeroUsize::MIN)
}

/// LRU cache for individual kernel matrix entries
pub struct KernelCache {
    cache: LruCache<PairKey, f64>,
    hits: u64,
    misses: u64,
}

impl KernelCache {
    /// Create a new kernel cache with specified capacity in number of entries
    pub fn new(capacity: usize) -> Self {
        Self {
            cache: LruCache::new(capacity_of(capacity)),
            hits: 0,
            misses: 0,
        }
    }

    /// Get a kernel value from cache
    pub fn get(&mut self, i: usize, j: usize) -> Option<f64> {
        match self.cache.get(&PairKey::new(i, j)) {
            Some(&value) => {
                self.hits += 1;
                Some(value)
            }
            None => {
                self.misses += 1;
                None
            }
        }
    }

    /// Put a kernel value into cache
    pub fn put(&mut self, i: usize, j: usize, value: f64) {
        self.cache.put(PairKey::new(i, j), value);
    }

    /// Get cache statistics
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits,
            misses: self.misses,
            capacity: self.cache.cap().get(),
            size: self.cache.len(),
        }
    }
}

/// LRU cache of complete kernel rows
pub struct RowCache {
    rows: LruCache<usize, Box<[f64]>>,
    row_len: usize,
    hits: u64,
    misses: u64,
}

impl RowCache {
    /// Create a row cache holding at most `max_rows` rows of `row_len` values
    pub fn new(row_len: usize, max_rows: usize) -> Self {
        Self {
            rows: LruCache::new(capacity_of(max_rows)),
            row_len,
            hits: 0,
            misses: 0,
        }
    }

    /// Size the cache from a byte budget, keeping at least two rows so
    /// both members of a working pair fit
    pub fn with_memory_limit(row_len: usize, memory_bytes: usize) -> Self {
        let row_bytes = (row_len * std::mem::size_of::<f64>()).max(1);
        Self::new(row_len, (memory_bytes / row_bytes).max(2))
    }

    /// Length of each cached row
    pub fn row_len(&self) -> usize {
        self.row_len
    }

    /// Look up K(i, j) through either row i or row j
    pub fn get(&mut self, i: usize, j: usize) -> Option<f64> {
        if let Some(row) = self.rows.get(&i) {
            self.hits += 1;
            return Some(row[j]);
        }
        if let Some(row) = self.rows.get(&j) {
            self.hits += 1;
            return Some(row[i]);
        }
        self.misses += 1;
        None
    }

    /// Whether row `i` is resident; refreshes its recency
    pub fn contains(&mut self, i: usize) -> bool {
        self.rows.get(&i).is_some()
    }

    /// Insert a freshly computed row
    pub fn insert(&mut self, i: usize, row: Box<[f64]>) {
        debug_assert_eq!(row.len(), self.row_len);
        self.rows.put(i, row);
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits,
            misses: self.misses,
            capacity: self.rows.cap().get(),
            size: self.rows.len(),
        }
    }
}

/// Cache statistics
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub capacity: usize,
    pub size: usize,
}

impl CacheStats {
    /// Fraction of lookups served from the cache
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}
