//! Error types for the object store, index, refs, and revision-resolution core.
//!
//! [`Error`] is the single error type returned by every public operation in this
//! crate. It uses rich enum variants so callers can match on specific failure
//! modes (a missing ref, a corrupt object, an ambiguous prefix) without parsing
//! error messages. `NotFound` and `AlreadyPresent` are flow-control signals as
//! much as failures — callers are expected to match on them explicitly rather
//! than treat every variant as fatal.

use std::path::PathBuf;

use thiserror::Error;

/// Errors returned by operations in this crate.
#[derive(Debug, Error)]
pub enum Error {
    /// A requested object, ref, or path was not found.
    #[error("not found: {message}")]
    NotFound {
        /// Human-readable description of what was missing.
        message: String,
    },

    /// An object write was skipped because the content already exists under
    /// the same id. Not a failure — callers that fold many writes (tree
    /// building) treat this the same as a fresh write.
    #[error("object already present: {id}")]
    AlreadyPresent {
        /// The id of the object that already existed.
        id: String,
    },

    /// On-disk data failed validation: a bad header, a signature mismatch, or
    /// a hash that does not match recomputed content. Always fatal to the
    /// current operation — the caller must not retry, it is a damage signal.
    #[error("corrupt data at {location}: {reason}")]
    Corrupt {
        /// What was being read (a path, an object id, ...).
        location: String,
        /// Why it failed validation.
        reason: String,
    },

    /// A token, name, or option combination was malformed.
    #[error("invalid argument: {message}")]
    InvalidArgument {
        /// Description of what was invalid.
        message: String,
    },

    /// A hex id prefix matched more than one object.
    #[error("ambiguous revision `{prefix}`: matches {candidates} objects")]
    AmbiguousRevision {
        /// The prefix that was given.
        prefix: String,
        /// How many objects it matched.
        candidates: usize,
    },

    /// A revision token could not be resolved to any object.
    #[error("unknown revision `{token}`")]
    UnknownRevision {
        /// The token that failed to resolve.
        token: String,
    },

    /// Another writer already holds the lock file for this path.
    #[error("lock contended: {}", path.display())]
    LockContended {
        /// The path whose lock file is held.
        path: PathBuf,
    },

    /// A chain of symbolic refs exceeded the maximum resolution depth,
    /// indicating a cycle.
    #[error("ref cycle detected resolving `{start}`")]
    RefCycle {
        /// The ref where resolution started.
        start: String,
    },

    /// An underlying filesystem error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience alias used throughout this crate.
pub type Result<T> = std::result::Result<T, Error>;
