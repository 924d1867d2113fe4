//! Thin `tracing` helpers shared by the worker, batch, and cache layers.
//!
//! The crate logs at the point an error is created rather than expecting
//! callers to re-log it. This module only centralizes the
//! span names so every log site uses the same target string.

/// Span covering one request handled by the pinned git worker.
pub fn worker_request_span(kind: &'static str) -> tracing::Span {
    tracing::debug_span!("worker_request", kind)
}

/// Span covering one flushed batch in the streaming processor.
pub fn batch_flush_span(batch_id: u64, len: usize) -> tracing::Span {
    tracing::debug_span!("batch_flush", batch_id, len)
}

/// Installs a `tracing-subscriber` that writes to the test harness's
/// captured output. Intended for `#[test]`/`#[tokio::test]` functions that
/// want to see `tracing` events; safe to call more than once per process
/// (subsequent calls are no-ops).
#[cfg(any(test, feature = "test-util"))]
pub fn init_test_subscriber() {
    use std::sync::Once;
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}
