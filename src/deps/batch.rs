//! Bounded worker pool for per-package work.
//!
//! Callers hand in one item per package name. Package paths never nest inside
//! each other, so no two workers touch the same part of the vendor tree.
//! Results always come back in input order.

use rayon::prelude::*;

/// Apply `work` to every item using up to `jobs` threads.
pub fn run<T, R, F>(items: &[T], jobs: usize, work: F) -> Vec<R>
where
    T: Sync,
    R: Send,
    F: Fn(&T) -> R + Sync,
{
    if jobs <= 1 || items.len() <= 1 {
        return items.iter().map(&work).collect();
    }

    let pool = match rayon::ThreadPoolBuilder::new().num_threads(jobs).build() {
        Ok(pool) => pool,
        Err(e) => {
            tracing::warn!(error = %e, "falling back to sequential processing");
            return items.iter().map(&work).collect();
        }
    };

    pool.install(|| items.par_iter().map(&work).collect())
}
