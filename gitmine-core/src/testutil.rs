//! Scratch-repository builder shared by the bridge, worker, and batch test
//! suites. Not part of the public API proper — gated the same way
//! `telemetry::init_test_subscriber` is, so both unit tests and the
//! integration tests under `tests/` can reuse it.

use std::path::Path;

use crate::bridge::{self, Repo};
use crate::hash::Hash;

/// A throwaway git repository on disk, cleaned up when dropped.
pub struct ScratchRepo {
    dir: tempfile::TempDir,
    repo: git2::Repository,
    bridge: Repo,
}

impl ScratchRepo {
    /// Initializes an empty repository in a fresh temp directory, then opens
    /// it a second time through the bridge under test.
    pub fn new() -> Self {
        let dir = tempfile::TempDir::new().expect("create scratch dir");
        let repo = git2::Repository::init(dir.path()).expect("init scratch repo");
        let bridge = bridge::open_repository(dir.path()).expect("open scratch repo via bridge");
        ScratchRepo { dir, repo, bridge }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// The bridge handle under test.
    pub fn bridge(&self) -> &Repo {
        &self.bridge
    }

    fn signature(&self) -> git2::Signature<'static> {
        git2::Signature::now("Scratch Author", "scratch@example.invalid")
            .expect("build signature")
    }

    /// Commits `files` (path, utf8 content) and `removals` (paths to drop)
    /// on top of the current HEAD, or as a root commit if HEAD is unborn.
    /// Returns the new commit's hash.
    pub fn commit_files(&self, files: &[(&str, &str)], removals: &[(&str, Option<()>)]) -> Hash {
        let mut builder = self.start_tree();
        for (path, content) in files {
            self.write_blob_entry(&mut builder, path, content.as_bytes());
        }
        for (path, _) in removals {
            builder.remove(path).ok();
        }
        self.finish_commit(builder)
    }

    /// Commits a single path with raw bytes, useful for binary-content tests.
    pub fn commit_blob(&self, _parent: Hash, path: &str, bytes: &[u8]) -> Hash {
        let mut builder = self.start_tree();
        self.write_blob_entry(&mut builder, path, bytes);
        self.finish_commit(builder)
    }

    /// The blob hash recorded for `path` in `commit`'s tree.
    pub fn blob_hash(&self, commit: Hash, path: &str) -> Hash {
        let commit = self.repo.find_commit(commit.into()).expect("find commit");
        let tree = commit.tree().expect("commit tree");
        let entry = tree.get_path(Path::new(path)).expect("path present in tree");
        entry.id().into()
    }

    fn start_tree(&self) -> git2::TreeBuilder<'_> {
        let base = self.repo.head().ok().and_then(|head| head.peel_to_tree().ok());
        self.repo.treebuilder(base.as_ref()).expect("create treebuilder")
    }

    fn write_blob_entry(&self, builder: &mut git2::TreeBuilder<'_>, path: &str, bytes: &[u8]) {
        let oid = self.repo.blob(bytes).expect("write blob");
        builder.insert(path, oid, 0o100644).expect("insert tree entry");
    }

    fn finish_commit(&self, builder: git2::TreeBuilder<'_>) -> Hash {
        let tree_oid = builder.write().expect("write tree");
        let tree = self.repo.find_tree(tree_oid).expect("find tree");
        let parent = self.repo.head().ok().and_then(|head| head.peel_to_commit().ok());
        let parents: Vec<&git2::Commit> = parent.iter().collect();
        let sig = self.signature();
        let commit_oid = self
            .repo
            .commit(Some("HEAD"), &sig, &sig, "scratch commit", &tree, &parents)
            .expect("create commit");
        commit_oid.into()
    }
}
