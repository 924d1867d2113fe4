//! Batch processor & streamers: amortizes per-object native-call overhead by
//! bulk-loading blobs/diffs in a single crossing, plus a buffer-and-flush
//! streaming mode for drivers that produce hash/diff-request batches
//! incrementally.
//!
//! The streaming half is built on `tokio::sync::mpsc`, buffering input and
//! flushing on a size or close condition, the same shape as a UI event bus
//! repurposed here into a hash/diff-request batcher.

use std::collections::{HashMap, HashSet};

use tokio::sync::mpsc;

use crate::bridge::{self, BlobResult, Repo};
use crate::hash::Hash;
use crate::model::{Change, DiffRequest, DiffResult};

/// Default blob batch size, used when the caller passes `0`.
pub const DEFAULT_BLOB_BATCH_SIZE: usize = 100;
/// Default diff batch size, used when the caller passes `0`.
pub const DEFAULT_DIFF_BATCH_SIZE: usize = 50;

/// Resolves `0` to [`DEFAULT_BLOB_BATCH_SIZE`]; any other value passes
/// through unchanged.
pub fn blob_batch_size(requested: usize) -> usize {
    if requested == 0 { DEFAULT_BLOB_BATCH_SIZE } else { requested }
}

/// Resolves `0` to [`DEFAULT_DIFF_BATCH_SIZE`]; any other value passes
/// through unchanged.
pub fn diff_batch_size(requested: usize) -> usize {
    if requested == 0 { DEFAULT_DIFF_BATCH_SIZE } else { requested }
}

/// The default batch configuration exposed to external collaborators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchConfig {
    pub blob_batch_size: usize,
    pub diff_batch_size: usize,
    pub workers: usize,
}

/// `{blob_batch_size: 100, diff_batch_size: 50, workers: 1}`.
pub fn default_batch_config() -> BatchConfig {
    BatchConfig { blob_batch_size: DEFAULT_BLOB_BATCH_SIZE, diff_batch_size: DEFAULT_DIFF_BATCH_SIZE, workers: 1 }
}

/// The blob hashes referenced by `changes` — the set of
/// `{Insert.to, Delete.from, Modify.from, Modify.to}` — deduplicated, in
/// order of first occurrence.
pub fn unique_hashes(changes: &[Change]) -> Vec<Hash> {
    let mut seen = HashSet::new();
    let mut out = Vec::with_capacity(changes.len());
    for change in changes {
        for hash in [change.from_hash(), change.to_hash()].into_iter().flatten() {
            if seen.insert(hash) {
                out.push(hash);
            }
        }
    }
    out
}

/// Loads every blob referenced by `changes` in a single bridge crossing,
/// deduplicating repeated hashes first.
/// Returns a lookup table rather than a list, since callers need to resolve
/// per-change entries (`from`/`to`) against the shared result set.
pub fn load_blobs_for_changes(repo: &Repo, changes: &[Change]) -> HashMap<Hash, BlobResult> {
    let hashes = unique_hashes(changes);
    let results = bridge::batch_load_blobs(repo, &hashes);
    hashes.into_iter().zip(results).collect()
}

/// One [`DiffRequest`] per `Modify` change in `changes` — `Insert`/`Delete`
/// changes have no line-level diff to compute.
pub fn diff_requests_for_changes(changes: &[Change]) -> Vec<DiffRequest> {
    changes
        .iter()
        .filter_map(|change| match change {
            Change::Modify { from, to } => Some(DiffRequest::modify(from.hash, to.hash)),
            _ => None,
        })
        .collect()
}

/// Diffs every `Modify` change in `changes` in a single bridge crossing.
pub fn diff_blobs_for_changes(repo: &Repo, changes: &[Change]) -> Vec<DiffResult> {
    bridge::batch_diff_blobs(repo, &diff_requests_for_changes(changes))
}

/// One flushed output batch, tagged with a monotonically increasing id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Batch<T> {
    pub id: u64,
    pub items: Vec<T>,
}

/// Consumes `upstream` (a stream of already-chunked input batches — e.g. the
/// driver's own commit-by-commit grouping), buffering items internally and
/// flushing whenever the buffer reaches `batch_size` or the upstream closes.
/// `cancel` mirrors upstream-close: receiving on it (or the sender being
/// dropped) flushes any partial buffer and returns, closing `downstream` by
/// drop.
///
/// `batch_size = 0` selects the default for `T`'s kind via
/// [`blob_batch_size`]/[`diff_batch_size`] — callers pick whichever fits;
/// this function only needs the resolved number.
pub async fn stream_batches<T: Send + 'static>(
    mut upstream: mpsc::Receiver<Vec<T>>,
    downstream: mpsc::Sender<Batch<T>>,
    mut cancel: mpsc::Receiver<()>,
    batch_size: usize,
) {
    let batch_size = batch_size.max(1);
    let mut buffer: Vec<T> = Vec::with_capacity(batch_size);
    let mut next_id = 0u64;

    loop {
        tokio::select! {
            biased;
            _ = cancel.recv() => {
                flush(&downstream, &mut buffer, &mut next_id).await;
                return;
            }
            maybe_items = upstream.recv() => {
                match maybe_items {
                    Some(items) => {
                        buffer.extend(items);
                        while buffer.len() >= batch_size {
                            let rest = buffer.split_off(batch_size);
                            let full = std::mem::replace(&mut buffer, rest);
                            if downstream.send(Batch { id: next_id, items: full }).await.is_err() {
                                return;
                            }
                            next_id += 1;
                        }
                    }
                    None => {
                        flush(&downstream, &mut buffer, &mut next_id).await;
                        return;
                    }
                }
            }
        }
    }
}

async fn flush<T>(downstream: &mpsc::Sender<Batch<T>>, buffer: &mut Vec<T>, next_id: &mut u64) {
    if buffer.is_empty() {
        return;
    }
    let items = std::mem::take(buffer);
    let _ = downstream.send(Batch { id: *next_id, items }).await;
    *next_id += 1;
}
