//! Memory-budget solver: turns a single byte budget into a
//! [`CoordinatorConfig`] plus the [`NativeLimits`] the bridge's
//! `configure_memory` needs.
//!
//! Every computation here is a pure function of its inputs (the budget and
//! the detected cpu count) — no global state, no I/O — so `solve_for_budget`
//! is deterministic and trivially testable.

use crate::config::{constants::*, estimate, CoordinatorConfig, NativeLimits};
use crate::error::{Error, ErrorKind, Result};

/// Number of logical cpus, read once via `num_cpus` rather than hand-rolled
/// `/proc` parsing (grounded in the retrieval pack's git-tooling manifests
/// that size worker pools off real core counts).
fn cpu_count() -> usize {
    num_cpus::get().max(1)
}

/// Solves `budget_bytes` into a [`CoordinatorConfig`].
///
/// Returns `ErrorKind::BudgetTooSmall` if `budget_bytes` is below the 512 MiB
/// floor, or if nothing remains after subtracting the fixed base overhead.
pub fn solve_for_budget(budget_bytes: u64) -> Result<CoordinatorConfig> {
    solve_with_cpu_count(budget_bytes, cpu_count())
}

/// Same as [`solve_for_budget`], but with an explicit cpu count — used by
/// tests that need determinism independent of the machine they run on.
pub fn solve_with_cpu_count(budget_bytes: u64, cpus: usize) -> Result<CoordinatorConfig> {
    if budget_bytes < BUDGET_FLOOR {
        return Err(Error::new(ErrorKind::BudgetTooSmall));
    }

    let usable = (budget_bytes as f64 * SLACK_FRACTION) as u64;
    let available = usable.checked_sub(BASE_OVERHEAD).filter(|&a| a > 0);
    let Some(available) = available else {
        return Err(Error::new(ErrorKind::BudgetTooSmall));
    };

    let cache_alloc = (available as f64 * 0.60) as u64;
    let worker_alloc = (available as f64 * 0.30) as u64;
    let buffer_alloc = (available as f64 * 0.10) as u64;

    let max_workers = ((cpus as f64 * 0.60).floor() as usize).max(1);
    let per_worker_cost = REPO_HANDLE_SIZE + DEFAULT_ARENA_SIZE + WORKER_NATIVE_OVERHEAD;
    let workers_by_budget = (worker_alloc / per_worker_cost) as usize;
    let workers = workers_by_budget.min(max_workers).max(MIN_WORKERS);

    let blob_cache_size =
        ((cache_alloc as f64 * 0.80) as u64).clamp(MIN_BLOB_CACHE_SIZE, MAX_BLOB_CACHE_SIZE);

    let diff_cache_size = ((cache_alloc as f64 * 0.20 / AVG_DIFF_SIZE as f64) as usize)
        .clamp(MIN_DIFF_CACHE_SIZE, MAX_DIFF_CACHE_ENTRIES);

    let buffer_size = ((buffer_alloc / AVG_COMMIT_DATA_SIZE) as usize).max(MIN_BUFFER_SIZE);

    Ok(CoordinatorConfig {
        workers,
        buffer_size,
        commit_batch_size: COMMIT_BATCH_SIZE,
        blob_cache_size,
        diff_cache_size,
        blob_arena_size: DEFAULT_ARENA_SIZE,
    })
}

/// Derives the native library's memory caps for `budget_bytes`: 25% of the
/// budget is the native share, split 80/20 between the mmap window cap and
/// the object cache cap.
///
/// Returns a zero-valued [`NativeLimits`] (meaning "use defaults") when
/// `budget_bytes` is zero.
pub fn native_limits_for_budget(budget_bytes: u64) -> NativeLimits {
    if budget_bytes == 0 {
        return NativeLimits::default();
    }
    let native_share = (budget_bytes as f64 * 0.25) as u64;
    let mmap_window_limit = (native_share as f64 * 0.80) as u64;
    let object_cache_limit = native_share - mmap_window_limit;
    NativeLimits { mmap_window_limit, object_cache_limit, malloc_arena_max: MALLOC_ARENA_MAX_DEFAULT }
}

#[cfg(test)]
mod tests {
    use super::*;

    const GIB: u64 = 1024 * 1024 * 1024;

    #[test]
    fn solver_1gib_budget() {
        let config = solve_with_cpu_count(GIB, 8).unwrap();
        assert!(config.workers >= 1);
        assert!(config.buffer_size >= 2);
        assert!(config.blob_cache_size > 0);
        assert!(config.diff_cache_size >= 100);
        assert_eq!(config.blob_arena_size, DEFAULT_ARENA_SIZE);
        assert!(estimate(&config) <= (GIB as f64 * 0.95) as u64);
    }

    #[test]
    fn solver_too_small_budget() {
        let err = solve_for_budget(64 * 1024 * 1024).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::BudgetTooSmall);
    }

    #[test]
    fn solver_huge_budget_caps_workers_and_caches() {
        let config = solve_with_cpu_count(64 * GIB, 8).unwrap();
        assert!(config.workers <= 8);
        assert_eq!(config.blob_cache_size, MAX_BLOB_CACHE_SIZE);
        assert_eq!(config.diff_cache_size, MAX_DIFF_CACHE_ENTRIES);
    }

    #[test]
    fn workers_never_exceed_cpu_count() {
        for cpus in [1usize, 2, 4, 8, 16, 64] {
            for budget in [GIB, 4 * GIB, 16 * GIB, 64 * GIB] {
                let config = solve_with_cpu_count(budget, cpus).unwrap();
                assert!(config.workers <= cpus, "cpus={cpus} budget={budget}");
            }
        }
    }

    #[test]
    fn estimate_never_exceeds_95_percent_of_budget() {
        let mut budget = BUDGET_FLOOR;
        while budget <= 8 * GIB {
            let config = solve_with_cpu_count(budget, 8).unwrap();
            assert!(
                estimate(&config) <= (budget as f64 * 0.95) as u64,
                "budget={budget} estimate={}",
                estimate(&config)
            );
            budget += GIB / 4;
        }
    }

    #[test]
    fn monotone_in_budget() {
        let small = solve_with_cpu_count(GIB, 8).unwrap();
        let large = solve_with_cpu_count(4 * GIB, 8).unwrap();
        assert!(small.blob_cache_size <= large.blob_cache_size);
        assert!(small.diff_cache_size <= large.diff_cache_size);
    }

    #[test]
    fn deterministic_given_same_inputs() {
        let a = solve_with_cpu_count(2 * GIB, 8).unwrap();
        let b = solve_with_cpu_count(2 * GIB, 8).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn native_limits_zero_budget_means_use_defaults() {
        assert_eq!(native_limits_for_budget(0), NativeLimits::default());
    }

    #[test]
    fn native_limits_split_80_20() {
        let limits = native_limits_for_budget(GIB);
        let native_share = (GIB as f64 * 0.25) as u64;
        assert_eq!(limits.mmap_window_limit + limits.object_cache_limit, native_share);
        assert!(limits.mmap_window_limit > limits.object_cache_limit);
        assert_eq!(limits.malloc_arena_max, 4);
    }

    proptest::proptest! {
        #[test]
        fn solver_invariants_hold_across_budget_range(
            gib in 1u64..64,
            cpus in 1usize..64,
        ) {
            let budget = gib * GIB;
            let config = solve_with_cpu_count(budget, cpus).unwrap();
            proptest::prop_assert!(config.workers <= cpus);
            proptest::prop_assert!(config.workers >= 1);
            proptest::prop_assert!(config.buffer_size >= 2);
            proptest::prop_assert!(config.diff_cache_size >= 100);
            proptest::prop_assert!(config.blob_cache_size >= MIN_BLOB_CACHE_SIZE);
            proptest::prop_assert!(estimate(&config) <= (budget as f64 * 0.95) as u64);
        }
    }
}
