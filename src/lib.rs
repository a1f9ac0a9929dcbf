//! A from-scratch, byte-exact implementation of the core of a git-compatible
//! version control system: the content-addressed object store, the binary
//! index (staging file), the tree builder that folds the index into tree
//! objects, the ref store, revision parsing, and a working-tree diff.
//!
//! This crate has no dependency on any existing git implementation — every
//! byte of every on-disk format is produced and consumed directly. It is
//! meant to sit underneath a porcelain layer (a CLI, a TUI, a sync daemon):
//! callers program against the types and structs here, never against raw
//! bytes.
//!
//! # Crate layout
//!
//! - [`error`] — the [`Error`] enum returned by every fallible operation.
//! - [`types`] — value types shared across modules ([`types::ObjectId`],
//!   [`types::Mode`], [`types::IndexEntry`], and friends).
//! - [`objects`] — [`objects::ObjectStore`]: content-addressed read/write of
//!   blobs, trees, and commits.
//! - [`commit`] — wraps a tree id and parent ids into a commit object's
//!   canonical payload, and parses one back.
//! - [`index`] — [`index::Index`]: the binary staging file.
//! - [`tree`] — folds an [`index::Index`] into a tree object graph and back.
//! - [`refs`] — [`refs::RefStore`]: branch/tag/HEAD storage and resolution.
//! - [`revparse`] — single-token revision resolution (`rev-parse` syntax).
//! - [`diff`] — working-tree-vs-index comparison.
//! - [`repo`] — [`repo::Repo`]: wires the above together against one
//!   `.git`-style directory.

pub mod commit;
pub mod config;
pub mod diff;
pub mod error;
pub mod index;
pub mod objects;
pub mod refs;
pub mod repo;
pub mod revparse;
pub mod tree;
pub mod types;

pub use commit::{CommitSpec, ParsedCommit, Signature};
pub use config::Config;
pub use error::{Error, Result};
pub use index::Index;
pub use objects::ObjectStore;
pub use refs::RefStore;
pub use repo::Repo;
pub use types::{
    HashDiff, IndexEntry, Mode, ObjectId, ObjectKind, ParsedRevision, RefName, Stage, TreeEntry,
};
