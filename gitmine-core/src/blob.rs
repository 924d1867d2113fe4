//! Owned blob contents with a memoized line count / binary flag.

use std::ops::Range;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::arena::Arena;
use crate::error::{Error, ErrorKind, Result};
use crate::hash::Hash;
use crate::text;

/// Sentinel stored in the memoization cell before it's been computed.
#[derive(Clone, Copy, PartialEq, Eq)]
enum LineCount {
    Unknown,
    Binary,
    Lines(usize),
}

/// Where a blob's bytes actually live. `Arena` aliases into a shared,
/// worker-built buffer (the "owned-bytes versus arena-backed
/// bytes" design note) rather than holding its own allocation; `Owned` is
/// the plain, independent-allocation case every other component uses.
enum Storage {
    Owned(Vec<u8>),
    Arena { arena: Arc<Arena>, range: Range<usize> },
}

impl Storage {
    fn bytes(&self) -> &[u8] {
        match self {
            Storage::Owned(buf) => buf,
            Storage::Arena { arena, range } => arena.slice(range.clone()),
        }
    }
}

/// An immutable blob: hash, size, raw bytes, and a lazily-computed,
/// single-evaluated line count.
///
/// Cloning (via [`detached_clone`](Self::detached_clone)) always produces an
/// independent, owned copy — a long-lived cache entry is never aliased to a
/// transient arena that the worker may free once its request completes.
pub struct CachedBlob {
    hash: Hash,
    storage: Storage,
    line_count: Mutex<LineCount>,
}

impl CachedBlob {
    /// Builds a `CachedBlob` from an owned buffer.
    pub fn new(hash: Hash, data: Vec<u8>) -> Self {
        CachedBlob { hash, storage: Storage::Owned(data), line_count: Mutex::new(LineCount::Unknown) }
    }

    /// Builds a `CachedBlob` that aliases a range of a shared [`Arena`]
    /// instead of owning its own buffer. Used by the worker's arena-backed
    /// blob-batch path.
    pub fn from_arena(hash: Hash, arena: Arc<Arena>, range: Range<usize>) -> Self {
        CachedBlob {
            hash,
            storage: Storage::Arena { arena, range },
            line_count: Mutex::new(LineCount::Unknown),
        }
    }

    pub fn hash(&self) -> Hash {
        self.hash
    }

    pub fn size(&self) -> u64 {
        self.storage.bytes().len() as u64
    }

    pub fn data(&self) -> &[u8] {
        self.storage.bytes()
    }

    /// A cheap read-only cursor over the blob's bytes.
    pub fn reader(&self) -> std::io::Cursor<&[u8]> {
        text::bytes_reader(self.storage.bytes())
    }

    pub fn is_binary(&self) -> bool {
        text::is_binary(self.storage.bytes())
    }

    /// Returns the memoized line count, computing it on first call. Returns
    /// `ErrorKind::Binary` for binary content.
    pub fn count_lines(&self) -> Result<usize> {
        let mut cell = self.line_count.lock();
        match *cell {
            LineCount::Lines(n) => Ok(n),
            LineCount::Binary => Err(Error::new(ErrorKind::Binary)),
            LineCount::Unknown => {
                let bytes = self.storage.bytes();
                if text::is_binary(bytes) {
                    *cell = LineCount::Binary;
                    Err(Error::new(ErrorKind::Binary))
                } else {
                    let n = text::count_lines(bytes);
                    *cell = LineCount::Lines(n);
                    Ok(n)
                }
            }
        }
    }

    /// A deep clone with a detached, independently-owned buffer — regardless
    /// of whether `self` is arena-backed. This is the only way bytes cross
    /// into a long-lived holder (the LRU cache).
    pub fn detached_clone(&self) -> Self {
        CachedBlob {
            hash: self.hash,
            storage: Storage::Owned(self.storage.bytes().to_vec()),
            line_count: Mutex::new(*self.line_count.lock()),
        }
    }
}

impl std::fmt::Debug for CachedBlob {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CachedBlob")
            .field("hash", &self.hash)
            .field("size", &self.storage.bytes().len())
            .finish()
    }
}
