//! Native-library bridge: wraps `git2` (libgit2 bindings) behind a small,
//! batch-oriented surface. Every function here does a single "crossing"
//! into libgit2 per call — batching is the caller's (the worker's) job, not
//! something this module re-derives.

use std::cell::{Cell, RefCell};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};

use git2::{Delta, DiffOptions};

use crate::error::{Error, ErrorKind, Result};
use crate::hash::Hash;
use crate::model::{
    is_blob_mode, Change, ChangeEntry, CommitMeta, DiffOpKind, DiffRequest, DiffResult, Signature,
};
use crate::blob::CachedBlob;

/// An open repository handle. Not `Send` (libgit2 requires single-thread
/// usage) — callers must pin it to one OS thread.
pub struct Repo(git2::Repository);

/// Result of loading one blob in a batch: owned bytes on success, a tagged
/// error on failure. `CachedBlob` already carries size/binary/line-count, so
/// no separate result struct is needed.
pub type BlobResult = Result<CachedBlob>;

static MEMORY_CONFIGURED: AtomicBool = AtomicBool::new(false);

/// Opens the repository at `path` (a directory containing `.git`, or a bare
/// repo). Read-only — this crate never writes to the repository.
pub fn open_repository(path: &Path) -> Result<Repo> {
    git2::Repository::open(path)
        .map(Repo)
        .map_err(|e| Error::with_source(ErrorKind::RepositoryOpen, e))
}

/// Configures libgit2's process-wide memory caps. Must be called at most
/// once, before any repository is opened. A zero value
/// for any parameter leaves that cap unchanged. A second call returns
/// `ErrorKind::ConfigureMemory` rather than silently reconfiguring.
///
/// # Safety note
/// `git2::opts::set_*` calls are `unsafe` because libgit2 does not
/// synchronize them against concurrent repository use; the one-shot guard
/// here only prevents a second *logical* call from this crate, callers must
/// still ensure no repository is open yet.
pub fn configure_memory(mmap_cap: u64, cache_cap: u64, malloc_arenas: u32) -> Result<()> {
    if MEMORY_CONFIGURED.swap(true, Ordering::SeqCst) {
        return Err(Error::new(ErrorKind::ConfigureMemory));
    }

    if mmap_cap != 0 {
        // SAFETY: called once, before any repository handle is opened,
        // matching libgit2's `git_libgit2_opts` contract.
        unsafe {
            git2::opts::set_mwindow_mapped_limit(mmap_cap as usize)
                .map_err(|e| Error::with_source(ErrorKind::ConfigureMemory, e))?;
        }
    }
    if cache_cap != 0 {
        // SAFETY: see above.
        unsafe {
            git2::opts::set_cache_object_limit(git2::ObjectType::Any, cache_cap as usize)
                .map_err(|e| Error::with_source(ErrorKind::ConfigureMemory, e))?;
        }
    }
    if malloc_arenas != 0 {
        set_malloc_arena_max(malloc_arenas);
    }
    Ok(())
}

/// Caps glibc's per-process arena count via `mallopt(M_ARENA_MAX, ...)`.
/// This is not a libgit2 setting — it bounds the allocator the worker
/// threads themselves use. Best-effort: platforms without a tunable glibc
/// allocator (musl, macOS, Windows) silently ignore this.
#[cfg(all(target_os = "linux", target_env = "gnu"))]
fn set_malloc_arena_max(max_arenas: u32) {
    unsafe {
        libc::mallopt(libc::M_ARENA_MAX, max_arenas as i32);
    }
}

#[cfg(not(all(target_os = "linux", target_env = "gnu")))]
fn set_malloc_arena_max(_max_arenas: u32) {}

/// Loads `hashes` in a single crossing into the object database: fetches
/// the odb once, sorts+dedups the unique subset of requested hashes for
/// pack-file locality, then produces one [`BlobResult`] per input hash
/// (duplicates included) via binary search over the unique-loaded set.
pub fn batch_load_blobs(repo: &Repo, hashes: &[Hash]) -> Vec<BlobResult> {
    let odb = match repo.0.odb() {
        Ok(odb) => odb,
        Err(e) => {
            let err = classify_git2_error(&e);
            return hashes.iter().map(|_| Err(Error::new(err))).collect();
        }
    };

    let mut unique: Vec<Hash> = hashes.to_vec();
    unique.sort();
    unique.dedup();

    // `unique` is already hash-ordered, so this doubles as the sorted,
    // binary-searchable table.
    let loaded: Vec<(Hash, std::result::Result<CachedBlob, ErrorKind>)> = unique
        .into_iter()
        .map(|h| {
            let result = odb
                .read(h.into())
                .map(|obj| CachedBlob::new(h, obj.data().to_vec()))
                .map_err(|e| classify_git2_error(&e));
            (h, result)
        })
        .collect();

    hashes
        .iter()
        .map(|h| {
            let idx = loaded
                .binary_search_by_key(h, |(hh, _)| *hh)
                .expect("hash was included in the unique set that was just loaded");
            match &loaded[idx].1 {
                Ok(blob) => Ok(blob.detached_clone()),
                Err(kind) => Err(Error::new(*kind)),
            }
        })
        .collect()
}

/// Diffs each requested blob pair in a single crossing, using libgit2's
/// blob-pair line diff (`git2::Diff::blobs`) with callbacks that build
/// coalesced [`DiffResult`]s.
pub fn batch_diff_blobs(repo: &Repo, requests: &[DiffRequest]) -> Vec<DiffResult> {
    requests.iter().map(|req| diff_one_blob_pair(repo, req)).collect()
}

fn diff_one_blob_pair(repo: &Repo, req: &DiffRequest) -> DiffResult {
    let old_blob = if req.has_old { repo.0.find_blob(req.old_hash.into()).ok() } else { None };
    let new_blob = if req.has_new { repo.0.find_blob(req.new_hash.into()).ok() } else { None };

    let old_bytes = old_blob.as_ref().map(|b| b.content()).unwrap_or(&[]);
    let new_bytes = new_blob.as_ref().map(|b| b.content()).unwrap_or(&[]);
    let old_lines_total = crate::text::count_lines(old_bytes);
    let new_lines_total = crate::text::count_lines(new_bytes);

    if crate::text::is_binary(old_bytes) || crate::text::is_binary(new_bytes) {
        return DiffResult {
            old_lines: old_lines_total,
            new_lines: new_lines_total,
            ops: Vec::new(),
            error_kind: Some(ErrorKind::Binary),
        };
    }

    let result = RefCell::new(DiffResult {
        old_lines: old_lines_total,
        new_lines: new_lines_total,
        ops: Vec::new(),
        error_kind: None,
    });
    // Tracks how many old-side lines the hunk/line callbacks have consumed
    // so far, so the hunk callback can synthesize a leading Equal run and
    // the trailing check can synthesize a final one. Shared between two
    // distinct closures below, hence `Cell` rather than a plain local —
    // `RefCell` lets the hunk/line callbacks, which libgit2 invokes by
    // reference, accumulate into the same builder without re-borrowing issues.
    let old_line_pos = Cell::new(0usize);

    let mut opts = DiffOptions::new();
    let diff_res = git2::Diff::blobs(
        old_blob.as_ref(),
        None,
        new_blob.as_ref(),
        None,
        Some(&mut opts),
        None,
        None,
        Some(&mut |_delta, hunk| {
            let old_start = hunk.old_start() as usize;
            let pos = old_line_pos.get();
            if old_start > pos + 1 {
                result.borrow_mut().push_op(DiffOpKind::Equal, old_start - 1 - pos);
            }
            true
        }),
        Some(&mut |_delta, _hunk, line| {
            match line.origin() {
                '+' => result.borrow_mut().push_op(DiffOpKind::Insert, 1),
                '-' => {
                    result.borrow_mut().push_op(DiffOpKind::Delete, 1);
                    old_line_pos.set(old_line_pos.get() + 1);
                }
                ' ' => {
                    result.borrow_mut().push_op(DiffOpKind::Equal, 1);
                    old_line_pos.set(old_line_pos.get() + 1);
                }
                _ => {}
            }
            true
        }),
    );

    if diff_res.is_err() {
        return DiffResult {
            old_lines: old_lines_total,
            new_lines: new_lines_total,
            ops: Vec::new(),
            error_kind: Some(ErrorKind::Diff),
        };
    }

    let mut final_result = result.into_inner();
    let pos = old_line_pos.get();
    if old_lines_total > pos {
        final_result.push_op(DiffOpKind::Equal, old_lines_total - pos);
    }
    final_result
}

/// Diffs two trees. Takes the fast path (empty change list, no libgit2 call)
/// when both hashes are equal — the common case for metadata-only commits.
pub fn tree_diff(repo: &Repo, old_tree_hash: Hash, new_tree_hash: Hash) -> Result<Vec<Change>> {
    if old_tree_hash == new_tree_hash {
        return Ok(Vec::new());
    }

    let old_tree = repo.0.find_tree(old_tree_hash.into())?;
    let new_tree = repo.0.find_tree(new_tree_hash.into())?;
    let mut opts = DiffOptions::new();
    opts.include_typechange(true);
    let diff = repo.0.diff_tree_to_tree(Some(&old_tree), Some(&new_tree), Some(&mut opts))?;

    let mut changes = Vec::new();
    for delta in diff.deltas() {
        let change = match delta.status() {
            Delta::Added => delta_to_insert(&delta),
            Delta::Deleted => delta_to_delete(&delta),
            Delta::Modified | Delta::Renamed | Delta::Copied => delta_to_modify(&delta),
            Delta::Unmodified
            | Delta::Ignored
            | Delta::Untracked
            | Delta::Typechange
            | Delta::Unreadable
            | Delta::Conflicted => None,
        };
        if let Some(change) = change {
            changes.push(change);
        }
    }
    Ok(changes)
}

fn change_entry(file: &git2::DiffFile) -> Option<ChangeEntry> {
    let mode = file.mode() as u32;
    if !is_blob_mode(mode) {
        return None;
    }
    let path = file.path()?.to_string_lossy().replace('\\', "/");
    Some(ChangeEntry { path, hash: file.id().into(), size: file.size(), mode: mode as u16 })
}

fn delta_to_insert(delta: &git2::DiffDelta) -> Option<Change> {
    change_entry(&delta.new_file()).map(|to| Change::Insert { to })
}

fn delta_to_delete(delta: &git2::DiffDelta) -> Option<Change> {
    change_entry(&delta.old_file()).map(|from| Change::Delete { from })
}

fn delta_to_modify(delta: &git2::DiffDelta) -> Option<Change> {
    let from = change_entry(&delta.old_file())?;
    let to = change_entry(&delta.new_file())?;
    Some(Change::Modify { from, to })
}

/// Walks every blob entry of `tree_hash` and emits one Insert per entry —
/// the initial-commit path of the worker's `TreeDiff`, where there is no
/// previous tree to diff against.
pub fn walk_tree_inserts(repo: &Repo, tree_hash: Hash) -> Result<Vec<Change>> {
    let tree = repo.0.find_tree(tree_hash.into())?;
    let mut changes = Vec::new();
    tree.walk(git2::TreeWalkMode::PreOrder, |root, entry| {
        let mode = entry.filemode() as u32;
        if !is_blob_mode(mode) {
            return git2::TreeWalkResult::Ok;
        }
        let Some(name) = entry.name() else { return git2::TreeWalkResult::Ok };
        let path = format!("{root}{name}");
        let size = repo.0.find_blob(entry.id()).map(|b| b.size() as u64).unwrap_or(0);
        changes.push(Change::Insert {
            to: ChangeEntry { path, hash: entry.id().into(), size, mode: mode as u16 },
        });
        git2::TreeWalkResult::Ok
    })?;
    Ok(changes)
}

/// Resolves `commit_hash` to its tree hash, used by the worker to avoid
/// exposing raw `git2` types across the request/reply boundary.
pub fn resolve_tree_hash(repo: &Repo, commit_hash: Hash) -> Result<Hash> {
    let commit = repo.0.find_commit(commit_hash.into())?;
    Ok(commit.tree_id().into())
}

/// Reads full commit metadata (additive to the bridge's
/// diff/blob/tree surface, not a replacement for any of it).
pub fn read_commit_meta(repo: &Repo, hash: Hash) -> Result<CommitMeta> {
    let commit = repo.0.find_commit(hash.into())?;
    let parents = commit.parent_ids().map(Hash::from).collect();
    let author = signature_from_git2(&commit.author())?;
    let committer = signature_from_git2(&commit.committer())?;
    let summary = commit.summary().unwrap_or_default().to_string();
    Ok(CommitMeta {
        hash,
        parents,
        author,
        committer,
        summary,
        tree_hash: commit.tree_id().into(),
    })
}

fn signature_from_git2(sig: &git2::Signature) -> Result<Signature> {
    let when = sig.when();
    let secs = when.seconds();
    let when = std::time::UNIX_EPOCH
        .checked_add(std::time::Duration::from_secs(secs.unsigned_abs()))
        .ok_or_else(|| Error::new(ErrorKind::InvalidTimeFormat))?;
    Ok(Signature {
        name: sig.name().unwrap_or_default().to_string(),
        email: sig.email().unwrap_or_default().to_string(),
        when,
    })
}

fn classify_git2_error(err: &git2::Error) -> ErrorKind {
    match err.code() {
        git2::ErrorCode::NotFound => ErrorKind::Lookup,
        _ => ErrorKind::Memory,
    }
}
