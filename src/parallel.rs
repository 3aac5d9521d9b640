//! Order-preserving parallel map over independent work items
//!
//! Used for the per-patch SVDs of the nuclear-norm proximity operator and the
//! multi-core NUFFT. Each task reads its own input and produces its own output
//! slot, so the collected result does not depend on the number of workers or
//! on completion order.

use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};

/// A fixed-size rayon pool, built once and reused for every map.
///
/// `num_workers <= 1` keeps no pool and maps sequentially on the calling
/// thread. If a pool cannot be created (e.g. on a target without threads)
/// the maps also run sequentially.
pub struct WorkerPool {
    pool: Option<ThreadPool>,
}

impl WorkerPool {
    pub fn new(num_workers: usize) -> Self {
        if num_workers <= 1 {
            return Self { pool: None };
        }
        match ThreadPoolBuilder::new().num_threads(num_workers).build() {
            Ok(pool) => Self { pool: Some(pool) },
            Err(err) => {
                tracing::warn!(%err, num_workers, "could not start worker pool, running sequentially");
                Self { pool: None }
            }
        }
    }

    /// Threads actually used by `map`
    pub fn num_workers(&self) -> usize {
        self.pool.as_ref().map_or(1, |p| p.current_num_threads())
    }

    /// Map `f` over `items`, preserving order
    pub fn map<T, R, F>(&self, items: &[T], f: F) -> Vec<R>
    where
        T: Sync,
        R: Send,
        F: Fn(&T) -> R + Sync + Send,
    {
        match &self.pool {
            Some(pool) if items.len() > 1 => pool.install(|| items.par_iter().map(&f).collect()),
            _ => items.iter().map(&f).collect(),
        }
    }
}

/// Number of workers available on this machine
pub fn available_workers() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}
