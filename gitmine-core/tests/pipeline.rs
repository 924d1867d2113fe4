//! End-to-end exercise of the whole pipeline's data flow: a driver
//! walks commits, issues `TreeDiff` requests to a worker, resolves blob
//! hashes through the LRU cache (falling back to a `BlobBatch` request on
//! miss), and issues a `DiffBatch` request for every `Modify` change.
//!
//! This crosses module boundaries (`worker`, `batch`, `cache`, `bridge`)
//! deliberately — each module's own test suite already covers its internal
//! invariants in isolation.

use gitmine_core::batch;
use gitmine_core::cache::new_lru_blob_cache;
use gitmine_core::model::Change;
use gitmine_core::testutil::ScratchRepo;
use gitmine_core::worker::{self, Request};

#[test]
fn driver_walks_two_commits_through_worker_cache_and_batch() {
    let repo = ScratchRepo::new();
    let c1 = repo.commit_files(&[("a.txt", "line1\nline2\n"), ("keep.txt", "same")], &[]);
    let c2 = repo.commit_files(
        &[("a.txt", "line1\nline2\nline3\n"), ("keep.txt", "same"), ("new.txt", "fresh")],
        &[],
    );

    let (request_tx, stop) = worker::open_worker(repo.path()).expect("open worker");
    let cache = new_lru_blob_cache(10 * 1024 * 1024);

    // Commit 1: initial commit, every blob surfaces as Insert.
    let (reply_tx, reply_rx) = crossbeam_channel::unbounded();
    request_tx
        .send(Request::TreeDiff {
            commit_hash: c1,
            previous_tree: None,
            previous_commit_hash: None,
            reply: reply_tx,
        })
        .unwrap();
    let first = reply_rx.recv().unwrap().expect("tree diff for initial commit");
    assert_eq!(first.changes.len(), 2);

    // Commit 2: diff against commit 1 via previous_commit_hash.
    let (reply_tx, reply_rx) = crossbeam_channel::unbounded();
    request_tx
        .send(Request::TreeDiff {
            commit_hash: c2,
            previous_tree: None,
            previous_commit_hash: Some(c1),
            reply: reply_tx,
        })
        .unwrap();
    let second = reply_rx.recv().unwrap().expect("tree diff against previous commit");
    assert_eq!(second.changes.len(), 2); // a.txt modified, new.txt inserted
    assert!(second.changes.iter().any(|c| matches!(c, Change::Modify { to, .. } if to.path == "a.txt")));
    assert!(second.changes.iter().any(|c| matches!(c, Change::Insert { to } if to.path == "new.txt")));

    // Every blob hash the changes reference, deduplicated, then resolved
    // through the cache before falling back to a BlobBatch request.
    // {a.txt's old hash, a.txt's new hash, new.txt's hash} are all distinct.
    let wanted = batch::unique_hashes(&second.changes);
    assert_eq!(wanted.len(), 3);
    let misses: Vec<_> = wanted.iter().filter(|h| cache.get(*h).is_none()).copied().collect();
    assert_eq!(misses.len(), 3, "cache starts empty");

    let (reply_tx, reply_rx) = crossbeam_channel::unbounded();
    request_tx
        .send(Request::BlobBatch { hashes: misses.clone(), arena_capacity: None, reply: reply_tx })
        .unwrap();
    let loaded = reply_rx.recv().unwrap();
    assert_eq!(loaded.len(), misses.len());
    for (hash, result) in misses.iter().zip(loaded) {
        let blob = result.expect("blob loads");
        cache.put(*hash, blob);
    }
    for hash in &wanted {
        assert!(cache.get(hash).is_some(), "blob now cached after BlobBatch fill");
    }

    // DiffBatch over every Modify change.
    let diff_requests = batch::diff_requests_for_changes(&second.changes);
    assert_eq!(diff_requests.len(), 1);
    let (reply_tx, reply_rx) = crossbeam_channel::unbounded();
    request_tx.send(Request::DiffBatch { requests: diff_requests, reply: reply_tx }).unwrap();
    let diffs = reply_rx.recv().unwrap();
    assert_eq!(diffs[0].old_lines, 2);
    assert_eq!(diffs[0].new_lines, 3);
    assert!(diffs[0].error_kind.is_none());

    drop(request_tx);
    stop.stop();
}
