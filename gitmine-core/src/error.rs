//! Crate-wide error type.
//!
//! Every fallible public function in `gitmine-core` returns `Result<T, Error>`.
//! `ErrorKind` is the tag consumers should match on; `Error` wraps it with an
//! optional underlying cause for `Display`/`source()` chaining. Human-readable
//! presentation is the caller's responsibility — this crate only classifies.

use std::fmt;

/// Discriminated error tags for every fallible operation in the crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ErrorKind {
    /// Budget below the 512 MiB floor, or nothing left after base overhead.
    #[error("budget too small")]
    BudgetTooSmall,
    /// Repository path could not be opened.
    #[error("could not open repository")]
    RepositoryOpen,
    /// A requested native object (commit, tree, blob) was not found.
    #[error("object not found")]
    Lookup,
    /// Allocation failure in the native path.
    #[error("native allocation failure")]
    Memory,
    /// One side of a diff is binary.
    #[error("binary content")]
    Binary,
    /// The native diff engine reported failure.
    #[error("diff engine failure")]
    Diff,
    /// An arena-backed load could not fit a blob.
    #[error("arena full")]
    ArenaFull,
    /// Native memory caps could not be applied.
    #[error("could not configure native memory limits")]
    ConfigureMemory,
    /// Requested parent index does not exist on a commit.
    #[error("no such parent")]
    Parent,
    /// Caller-side time value could not be parsed.
    #[error("invalid time format")]
    InvalidTimeFormat,
}

/// The crate's error type: a tag plus an optional underlying cause.
#[derive(Debug)]
pub struct Error {
    kind: ErrorKind,
    source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
}

impl Error {
    /// Builds an error with no underlying cause.
    pub fn new(kind: ErrorKind) -> Self {
        Self { kind, source: None }
    }

    /// Builds an error wrapping an underlying cause.
    pub fn with_source(
        kind: ErrorKind,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self { kind, source: Some(Box::new(source)) }
    }

    /// The error tag, for matching.
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.source {
            Some(source) => write!(f, "{}: {source}", self.kind),
            None => write!(f, "{}", self.kind),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source.as_ref().map(|e| e.as_ref() as &(dyn std::error::Error + 'static))
    }
}

impl From<ErrorKind> for Error {
    fn from(kind: ErrorKind) -> Self {
        Error::new(kind)
    }
}

impl From<git2::Error> for Error {
    /// Classifies a raw libgit2 error by its `git2::ErrorCode`.
    ///
    /// `NotFound` maps to `Lookup`; everything else maps to `Diff`, which is
    /// the most common failure mode surfaced through the bridge's diff paths.
    /// Callers that need a more specific tag (e.g. `RepositoryOpen`) construct
    /// the `Error` explicitly instead of relying on this conversion.
    fn from(err: git2::Error) -> Self {
        let kind = match err.code() {
            git2::ErrorCode::NotFound => ErrorKind::Lookup,
            _ => ErrorKind::Diff,
        };
        Error::with_source(kind, err)
    }
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;
