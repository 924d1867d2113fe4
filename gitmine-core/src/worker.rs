//! Pinned git worker: a single-OS-thread actor that owns one
//! `git2::Repository` for its entire lifetime and serves three typed request
//! kinds in arrival order.
//!
//! `std::thread::spawn` owns the `Repository`, a `crossbeam_channel` request
//! channel feeds it, and a `for request in rx` dispatch loop drains it one at
//! a time. Each request carries its own reply sender instead of a shared
//! outbound bus, since a library used by concurrent drivers needs
//! per-request replies rather than one fan-out channel.

use std::path::{Path, PathBuf};
use std::thread::JoinHandle;

use crossbeam_channel::{unbounded, Receiver, Sender};

use crate::arena::ArenaBuilder;
use crate::bridge::{self, BlobResult, Repo};
use crate::error::{Error, ErrorKind, Result};
use crate::hash::Hash;
use crate::model::{Change, DiffRequest, DiffResult, TreeHandle};

/// Successful reply to a [`Request::TreeDiff`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeDiffReply {
    pub changes: Vec<Change>,
    /// The current commit's tree handle — reusable by the caller on its next
    /// `TreeDiff` request (as `previous_tree`) or simply dropped to release
    /// it.
    pub current_tree: TreeHandle,
}

/// Inbound request variants the worker serves, one at a time, in arrival
/// order.
pub enum Request {
    /// Diffs `commit_hash`'s tree against a previous point. Resolution order:
    /// an explicit `previous_tree` is used directly; otherwise a non-zero
    /// `previous_commit_hash` is resolved and diffed; otherwise this is
    /// treated as the initial commit and every blob in the tree is surfaced
    /// as an `Insert`.
    TreeDiff {
        commit_hash: Hash,
        previous_tree: Option<TreeHandle>,
        previous_commit_hash: Option<Hash>,
        reply: Sender<Result<TreeDiffReply>>,
    },
    /// Loads `hashes` in a single bridge crossing. `arena_capacity`, when
    /// `Some`, asks the worker to pack results into a shared arena of that
    /// many bytes instead of giving each blob its own allocation; any blob
    /// that would not fit falls back to the plain owned-buffer result the
    /// bridge already produced — no second native crossing is needed for
    /// the fallback, since the bridge call already returned owned bytes for
    /// every hash up front.
    BlobBatch { hashes: Vec<Hash>, arena_capacity: Option<usize>, reply: Sender<Vec<BlobResult>> },
    /// Diffs every request in a single bridge crossing.
    DiffBatch { requests: Vec<DiffRequest>, reply: Sender<Vec<DiffResult>> },
}

/// Handle returned by [`open_worker`] alongside the request sink. Dropping
/// the request sink signals the worker to drain and exit; `stop()` blocks
/// until that has happened.
pub struct StopHandle {
    join: Option<JoinHandle<()>>,
}

impl StopHandle {
    /// Blocks until the worker thread has drained its inbound channel and
    /// returned. The caller must have already dropped (or be about to drop)
    /// every clone of the request sink, or this never returns.
    pub fn stop(mut self) {
        if let Some(join) = self.join.take() {
            let _ = join.join();
        }
    }
}

/// Opens `repo_path` on a dedicated, pinned OS thread and returns a request
/// sink plus a [`StopHandle`]. Blocks until the worker has either opened the
/// repository successfully or failed to — so a caller never sends requests
/// into a worker that never started.
pub fn open_worker(repo_path: impl AsRef<Path>) -> Result<(Sender<Request>, StopHandle)> {
    let (request_tx, request_rx) = unbounded::<Request>();
    let (ready_tx, ready_rx) = crossbeam_channel::bounded::<Result<()>>(1);
    let path: PathBuf = repo_path.as_ref().to_path_buf();

    let join = std::thread::Builder::new()
        .name("gitmine-worker".to_string())
        .spawn(move || worker_loop(path, request_rx, ready_tx))
        .expect("spawn pinned git worker thread");

    match ready_rx.recv() {
        Ok(Ok(())) => Ok((request_tx, StopHandle { join: Some(join) })),
        Ok(Err(e)) => {
            let _ = join.join();
            Err(e)
        }
        Err(_) => Err(Error::new(ErrorKind::RepositoryOpen)),
    }
}

/// The thread body: opens the repository once, reports readiness, then
/// serves requests until the channel closes. `git2::Repository` is `!Send`,
/// so it must be opened here rather than passed in from `open_worker`.
fn worker_loop(path: PathBuf, rx: Receiver<Request>, ready_tx: Sender<Result<()>>) {
    let repo = match bridge::open_repository(&path) {
        Ok(repo) => repo,
        Err(e) => {
            let _ = ready_tx.send(Err(e));
            return;
        }
    };
    let _ = ready_tx.send(Ok(()));

    for request in rx {
        dispatch(&repo, request);
    }
}

fn dispatch(repo: &Repo, request: Request) {
    match request {
        Request::TreeDiff { commit_hash, previous_tree, previous_commit_hash, reply } => {
            let result = handle_tree_diff(repo, commit_hash, previous_tree, previous_commit_hash);
            let _ = reply.send(result);
        }
        Request::BlobBatch { hashes, arena_capacity, reply } => {
            let result = handle_blob_batch(repo, &hashes, arena_capacity);
            let _ = reply.send(result);
        }
        Request::DiffBatch { requests, reply } => {
            let result = bridge::batch_diff_blobs(repo, &requests);
            let _ = reply.send(result);
        }
    }
}

fn handle_tree_diff(
    repo: &Repo,
    commit_hash: Hash,
    previous_tree: Option<TreeHandle>,
    previous_commit_hash: Option<Hash>,
) -> Result<TreeDiffReply> {
    let current_tree_hash = bridge::resolve_tree_hash(repo, commit_hash)?;

    let changes = if let Some(TreeHandle(prev_hash)) = previous_tree {
        bridge::tree_diff(repo, prev_hash, current_tree_hash)?
    } else if let Some(prev_commit) = previous_commit_hash.filter(|h| !h.is_zero()) {
        let prev_tree_hash = bridge::resolve_tree_hash(repo, prev_commit)?;
        bridge::tree_diff(repo, prev_tree_hash, current_tree_hash)?
    } else {
        bridge::walk_tree_inserts(repo, current_tree_hash)?
    };

    Ok(TreeDiffReply { changes, current_tree: TreeHandle(current_tree_hash) })
}

/// Slot recording what happened when packing one loaded blob into the
/// in-progress arena, so the second pass (after the arena is frozen) knows
/// whether to build an arena-aliased or fall-back-owned `CachedBlob`.
enum PackedSlot {
    Packed(Hash, std::ops::Range<usize>),
    Fallback,
    Errored,
}

fn handle_blob_batch(repo: &Repo, hashes: &[Hash], arena_capacity: Option<usize>) -> Vec<BlobResult> {
    let raw = bridge::batch_load_blobs(repo, hashes);
    let Some(capacity) = arena_capacity else { return raw };

    let mut builder = ArenaBuilder::with_capacity(capacity);
    let slots: Vec<PackedSlot> = raw
        .iter()
        .map(|result| match result {
            Ok(blob) => match builder.push(blob.data()) {
                Ok(range) => PackedSlot::Packed(blob.hash(), range),
                Err(_) => PackedSlot::Fallback,
            },
            Err(_) => PackedSlot::Errored,
        })
        .collect();
    let arena = builder.finish();

    raw.into_iter()
        .zip(slots)
        .map(|(result, slot)| match slot {
            PackedSlot::Packed(hash, range) => {
                Ok(crate::blob::CachedBlob::from_arena(hash, std::sync::Arc::clone(&arena), range))
            }
            // Already an owned buffer from the bridge call above — no
            // second native crossing needed for the fallback.
            PackedSlot::Fallback | PackedSlot::Errored => result,
        })
        .collect()
}
