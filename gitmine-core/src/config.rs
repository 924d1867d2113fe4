//! Output types of the budget solver, plus the estimate function
//! used both internally and by the test suite to check the solver's own
//! invariant.

/// Coordinator knobs derived from a single byte budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CoordinatorConfig {
    pub workers: usize,
    pub buffer_size: usize,
    pub commit_batch_size: usize,
    pub blob_cache_size: u64,
    pub diff_cache_size: usize,
    pub blob_arena_size: u64,
}

/// Process-wide native memory caps handed to the bridge's `configure_memory`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct NativeLimits {
    pub mmap_window_limit: u64,
    pub object_cache_limit: u64,
    pub malloc_arena_max: u32,
}

/// Model constants, kept as named constants rather than
/// inlined literals since they are part of the design contract, not
/// incidental tuning.
pub mod constants {
    pub const BASE_OVERHEAD: u64 = 250 * 1024 * 1024;
    pub const REPO_HANDLE_SIZE: u64 = 10 * 1024 * 1024;
    pub const WORKER_NATIVE_OVERHEAD: u64 = 50 * 1024 * 1024;
    pub const AVG_DIFF_SIZE: u64 = 2 * 1024;
    pub const AVG_COMMIT_DATA_SIZE: u64 = 64 * 1024;
    pub const MAX_BLOB_CACHE_SIZE: u64 = 256 * 1024 * 1024;
    pub const MAX_DIFF_CACHE_ENTRIES: usize = 20_000;
    pub const MALLOC_ARENA_MAX_DEFAULT: u32 = 4;
    pub const DEFAULT_ARENA_SIZE: u64 = 4 * 1024 * 1024;
    pub const MIN_WORKERS: usize = 1;
    pub const MIN_BUFFER_SIZE: usize = 2;
    pub const MIN_DIFF_CACHE_SIZE: usize = 100;
    pub const MIN_BLOB_CACHE_SIZE: u64 = 1024 * 1024;
    pub const COMMIT_BATCH_SIZE: usize = 100;
    pub const BUDGET_FLOOR: u64 = 512 * 1024 * 1024;
    pub const SLACK_FRACTION: f64 = 0.95;
}

/// Projected peak usage of `config`.
pub fn estimate(config: &CoordinatorConfig) -> u64 {
    use constants::*;
    let workers = config.workers as u64;
    BASE_OVERHEAD
        + workers * (REPO_HANDLE_SIZE + config.blob_arena_size)
        + workers * WORKER_NATIVE_OVERHEAD
        + config.blob_cache_size
        + config.diff_cache_size as u64 * AVG_DIFF_SIZE
        + config.buffer_size as u64 * AVG_COMMIT_DATA_SIZE
}
