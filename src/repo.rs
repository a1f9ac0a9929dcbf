//! Wires the object store, index, and ref store together against one
//! on-disk repository.
//!
//! Deliberately not a singleton: every operation takes a `&Repo` explicitly,
//! so a process can open more than one repository (or the same repository
//! read-only from multiple threads) without hidden global state.

use std::path::{Path, PathBuf};

use crate::commit::{write_commit, CommitSpec, Signature};
use crate::config::Config;
use crate::diff::DiffFiles;
use crate::error::Error;
use crate::index::Index;
use crate::objects::ObjectStore;
use crate::refs::{Head, RefStore};
use crate::revparse::RevParse;
use crate::tree::TreeBuilder;
use crate::types::{IndexEntry, ObjectId, ParsedRevision, RefName};

/// The conventional name of the index file under a `.git` directory.
const INDEX_FILE_NAME: &str = "index";

/// A repository: a `.git`-style metadata directory plus the working tree it
/// describes.
#[derive(Debug, Clone)]
pub struct Repo {
    gitdir: PathBuf,
    worktree: PathBuf,
}

impl Repo {
    /// Open a repository given its metadata directory and working tree root.
    ///
    /// Does not validate that `gitdir` is well-formed; that happens lazily
    /// as individual components are used.
    #[must_use]
    pub fn new(gitdir: impl Into<PathBuf>, worktree: impl Into<PathBuf>) -> Self {
        Self {
            gitdir: gitdir.into(),
            worktree: worktree.into(),
        }
    }

    /// Initialize a fresh repository at `gitdir`/`worktree`: creates the
    /// `objects/` and `refs/heads/` directories and an unborn `HEAD`
    /// pointing at `refs/heads/main`.
    pub fn init(gitdir: impl Into<PathBuf>, worktree: impl Into<PathBuf>) -> Result<Self, Error> {
        let repo = Self::new(gitdir, worktree);
        std::fs::create_dir_all(repo.objects_dir())?;
        std::fs::create_dir_all(repo.gitdir.join("refs/heads"))?;
        std::fs::create_dir_all(repo.gitdir.join("refs/tags"))?;
        let head = crate::types::RefName::new("HEAD")?;
        let main = crate::types::RefName::new("refs/heads/main")?;
        repo.refs().write_symbolic(&head, &main)?;
        Ok(repo)
    }

    /// The `.git`-style metadata directory.
    #[must_use]
    pub fn gitdir(&self) -> &Path {
        &self.gitdir
    }

    /// The working tree root.
    #[must_use]
    pub fn worktree(&self) -> &Path {
        &self.worktree
    }

    fn objects_dir(&self) -> PathBuf {
        self.gitdir.join("objects")
    }

    fn index_path(&self) -> PathBuf {
        self.gitdir.join(INDEX_FILE_NAME)
    }

    /// The object store for this repository.
    #[must_use]
    pub fn objects(&self) -> ObjectStore {
        ObjectStore::new(self.objects_dir())
    }

    /// The ref store for this repository.
    #[must_use]
    pub fn refs(&self) -> RefStore {
        RefStore::new(&self.gitdir)
    }

    /// Read-only access to the `remote.<name>.url` config surface.
    #[must_use]
    pub fn config(&self) -> Config {
        Config::new(&self.gitdir)
    }

    /// Load the current index from disk (empty if it does not yet exist).
    pub fn index(&self) -> Result<Index, Error> {
        Index::read_from(&self.index_path())
    }

    /// Atomically persist `index` as this repository's staging file.
    pub fn write_index(&self, index: &Index) -> Result<(), Error> {
        index.write_to(&self.index_path())
    }

    /// Fold the index's stage-0 entries into a tree object, returning its id.
    pub fn write_tree(&self, entries: &[IndexEntry]) -> Result<ObjectId, Error> {
        let objects = self.objects();
        TreeBuilder::new(&objects).write_tree(entries)
    }

    /// The current `HEAD` state.
    pub fn head(&self) -> Result<Head, Error> {
        self.refs().head()
    }

    /// Resolve a single revision token against this repository.
    pub fn rev_parse(&self, token: &str) -> Result<ParsedRevision, Error> {
        let objects = self.objects();
        let refs = self.refs();
        RevParse::new(&refs, &objects).parse(token)
    }

    /// Compare the current index against the working tree.
    pub fn diff_files(&self) -> Result<Vec<crate::types::HashDiff>, Error> {
        let index = self.index()?;
        DiffFiles::new(&self.worktree).diff(&index)
    }

    /// Fold the current index into a tree, wrap it in a commit object naming
    /// the current `HEAD` commit (if any) as its sole parent, write the
    /// commit, and advance the branch `HEAD` points at (or `HEAD` itself, if
    /// detached) to the new commit.
    ///
    /// Returns the new commit's id.
    ///
    /// # Errors
    /// Propagates any [`crate::tree::TreeBuilder`], [`ObjectStore`], or
    /// [`RefStore`] failure encountered along the way.
    pub fn commit(&self, author: Signature, committer: Signature, message: &str) -> Result<ObjectId, Error> {
        let index = self.index()?;
        let tree = self.write_tree(index.entries())?;

        let refs = self.refs();
        let head = refs.head()?;
        let parent = match &head {
            Head::Branch { id, .. } => *id,
            Head::Detached(id) => Some(*id),
        };

        let spec = CommitSpec {
            tree,
            parents: parent.into_iter().collect(),
            author,
            committer,
            message: message.to_string(),
        };
        let commit_id = write_commit(&self.objects(), &spec)?;

        match head {
            Head::Branch { name, .. } => refs.write_direct(&name, commit_id)?,
            Head::Detached(_) => refs.write_direct(&RefName::new("HEAD")?, commit_id)?,
        }

        Ok(commit_id)
    }
}
