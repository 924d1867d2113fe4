//! Contiguous backing buffer for arena-packed blob loads.
//!
//! A contiguous byte buffer in which multiple blobs are laid out
//! back-to-back, avoiding a per-blob heap allocation at the cost of requiring
//! lifetime management. The worker builds one of these per blob-batch request
//! when the caller opts in; [`crate::blob::CachedBlob`] values alias into it
//! via a shared reference-counted handle rather than copying. Long-lived
//! consumers (the LRU cache) always detach through `CachedBlob::detached_clone`
//! before storing a blob, so the arena going out of scope can never
//! invalidate a cached blob's bytes.

use std::ops::Range;
use std::sync::Arc;

use crate::error::ErrorKind;

/// A read-only, already-packed byte buffer. Built once via [`ArenaBuilder`]
/// and then shared behind an `Arc` — nothing mutates it after `finish()`.
#[derive(Debug)]
pub struct Arena {
    buf: Vec<u8>,
}

impl Arena {
    /// The bytes occupying `range`. Panics if `range` is out of bounds,
    /// which cannot happen for a range this arena itself issued.
    pub fn slice(&self, range: Range<usize>) -> &[u8] {
        &self.buf[range]
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }
}

/// Packs blobs into a fixed-capacity [`Arena`], back-to-back, in push order.
pub struct ArenaBuilder {
    buf: Vec<u8>,
    capacity: usize,
}

impl ArenaBuilder {
    /// Starts a builder with room for `capacity` bytes total.
    pub fn with_capacity(capacity: usize) -> Self {
        ArenaBuilder { buf: Vec::new(), capacity }
    }

    /// Appends `bytes`, returning the byte range it now occupies within the
    /// eventual [`Arena`]. Fails with [`ErrorKind::ArenaFull`] without
    /// mutating the builder if `bytes` would not fit in the remaining
    /// capacity — the caller (the worker) falls back to an owned-buffer
    /// load for that one entry instead.
    pub fn push(&mut self, bytes: &[u8]) -> Result<Range<usize>, ErrorKind> {
        let start = self.buf.len();
        let end = start + bytes.len();
        if end > self.capacity {
            return Err(ErrorKind::ArenaFull);
        }
        self.buf.extend_from_slice(bytes);
        Ok(start..end)
    }

    /// Freezes the builder into a shareable [`Arena`].
    pub fn finish(self) -> Arc<Arena> {
        Arc::new(Arena { buf: self.buf })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn packs_multiple_blobs_back_to_back() {
        let mut builder = ArenaBuilder::with_capacity(10);
        let a = builder.push(b"abc").unwrap();
        let b = builder.push(b"de").unwrap();
        let arena = builder.finish();
        assert_eq!(arena.slice(a), b"abc");
        assert_eq!(arena.slice(b), b"de");
        assert_eq!(arena.len(), 5);
    }

    #[test]
    fn push_beyond_capacity_is_arena_full() {
        let mut builder = ArenaBuilder::with_capacity(4);
        assert!(builder.push(b"abcd").is_ok());
        assert_eq!(builder.push(b"e").unwrap_err(), ErrorKind::ArenaFull);
    }
}
