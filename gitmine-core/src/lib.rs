//! `gitmine-core`: the batched, worker-serialized, memory-budgeted git-
//! history mining engine. Walks a local repository's commit graph and
//! produces, per commit, file-level changes plus blob contents and
//! line-level diffs, ready for downstream analyzers (burndown, couples,
//! devs, etc. — those analyzers, the CLI surface, config loading, and
//! server front-ends all live outside this crate).
//!
//! Module map, leaves first:
//! - [`hash`] / [`model`] — the 20-byte object id and the rest of the data
//!   model.
//! - [`bridge`] — the `git2` (libgit2) bridge: blob/diff/tree-diff batch
//!   operations and process-wide memory caps.
//! - [`text`] — the authoritative binary-sniff and line-count definitions
//!   every other module defers to.
//! - [`blob`] / [`arena`] — owned or arena-aliased blob storage.
//! - [`cache`] — the size-aware, cost-weighted LRU blob cache.
//! - [`batch`] — synchronous batch dedup plus the streaming batcher.
//! - [`worker`] — the pinned, single-OS-thread git actor.
//! - [`budget`] / [`config`] — the memory-budget solver and its output types.
//! - [`error`] — the crate-wide tagged error type.
//! - [`telemetry`] — `tracing` span helpers.

pub mod arena;
pub mod batch;
pub mod blob;
pub mod bridge;
pub mod budget;
pub mod cache;
pub mod config;
pub mod error;
pub mod hash;
pub mod model;
pub mod telemetry;
pub mod worker;

#[cfg(any(test, feature = "test-util"))]
pub mod testutil;
