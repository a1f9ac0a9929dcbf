//! Branch, tag, and `HEAD` storage: reading, writing, and resolving
//! references, including symbolic refs (`ref: refs/heads/main`) and
//! detached-HEAD states.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::Error;
use crate::types::{ObjectId, RefName};

/// Maximum number of symbolic-ref hops [`RefStore::resolve`] will follow
/// before concluding there is a cycle.
const MAX_SYMBOLIC_DEPTH: usize = 5;

/// Where a ref's resolution bottomed out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Head {
    /// `HEAD` is a symbolic ref pointing at a branch, which may or may not
    /// exist yet (an unborn branch).
    Branch {
        /// The branch ref name, e.g. `refs/heads/main`.
        name: RefName,
        /// The commit id the branch currently points to, if it exists.
        id: Option<ObjectId>,
    },
    /// `HEAD` holds a literal object id directly (detached).
    Detached(ObjectId),
}

/// Storage and resolution for the loose ref files under a `.git`-style
/// directory (`HEAD`, `refs/heads/*`, `refs/remotes/*`, `refs/tags/*`).
#[derive(Debug, Clone)]
pub struct RefStore {
    gitdir: PathBuf,
}

impl RefStore {
    /// Open a ref store rooted at `gitdir` (the directory containing `HEAD`
    /// and `refs/`).
    #[must_use]
    pub fn new(gitdir: impl Into<PathBuf>) -> Self {
        Self { gitdir: gitdir.into() }
    }

    fn path_for(&self, name: &RefName) -> PathBuf {
        self.gitdir.join(name.as_str())
    }

    /// Read the raw content stored at `name`: either a 40-hex id or a
    /// `ref: <target>` symbolic-ref line.
    ///
    /// # Errors
    /// [`Error::NotFound`] if the ref file does not exist.
    pub fn read_raw(&self, name: &RefName) -> Result<RawRef, Error> {
        let path = self.path_for(name);
        let content = fs::read_to_string(&path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                Error::NotFound {
                    message: format!("ref `{name}` not found"),
                }
            } else {
                Error::Io(e)
            }
        })?;
        let trimmed = content.trim_end_matches('\n');
        if let Some(target) = trimmed.strip_prefix("ref: ") {
            let target_name = RefName::new(target.trim())?;
            Ok(RawRef::Symbolic(target_name))
        } else {
            let id: ObjectId = trimmed.parse().map_err(|_| Error::Corrupt {
                location: format!("ref `{name}`"),
                reason: format!("content `{trimmed}` is neither a symbolic ref nor a valid id"),
            })?;
            Ok(RawRef::Direct(id))
        }
    }

    /// Fully resolve `name` to a concrete object id, following symbolic refs
    /// up to [`MAX_SYMBOLIC_DEPTH`] hops.
    ///
    /// # Errors
    /// [`Error::RefCycle`] if resolution does not bottom out within the
    /// depth limit; [`Error::NotFound`] if any hop names a ref that does not
    /// exist.
    pub fn resolve(&self, name: &RefName) -> Result<ObjectId, Error> {
        let _span = tracing::debug_span!("ref_resolve", start = %name).entered();
        let mut current = name.clone();
        for _ in 0..MAX_SYMBOLIC_DEPTH {
            match self.read_raw(&current)? {
                RawRef::Direct(id) => return Ok(id),
                RawRef::Symbolic(target) => {
                    tracing::trace!(from = %current, to = %target, "following symbolic ref");
                    current = target;
                }
            }
        }
        Err(Error::RefCycle {
            start: name.to_string(),
        })
    }

    /// Same as [`Self::resolve`] but returns `Ok(None)` instead of
    /// `Err(NotFound)` for a ref (or unborn branch target) that does not
    /// exist.
    pub fn resolve_opt(&self, name: &RefName) -> Result<Option<ObjectId>, Error> {
        match self.resolve(name) {
            Ok(id) => Ok(Some(id)),
            Err(Error::NotFound { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Write a direct ref (a 40-hex id) atomically.
    pub fn write_direct(&self, name: &RefName, id: ObjectId) -> Result<(), Error> {
        self.write_raw(name, &format!("{id}\n"))
    }

    /// Write a symbolic ref (`ref: <target>`) atomically.
    pub fn write_symbolic(&self, name: &RefName, target: &RefName) -> Result<(), Error> {
        self.write_raw(name, &format!("ref: {target}\n"))
    }

    fn write_raw(&self, name: &RefName, content: &str) -> Result<(), Error> {
        let _span = tracing::debug_span!("ref_write", name = %name).entered();
        let path = self.path_for(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let lock_path = {
            let mut os = path.as_os_str().to_owned();
            os.push(".lock");
            PathBuf::from(os)
        };
        {
            let mut lock = fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&lock_path)
                .map_err(|e| {
                    if e.kind() == std::io::ErrorKind::AlreadyExists {
                        Error::LockContended {
                            path: path.clone(),
                        }
                    } else {
                        Error::Io(e)
                    }
                })?;
            use std::io::Write as _;
            lock.write_all(content.as_bytes())?;
            lock.sync_all()?;
        }
        fs::rename(&lock_path, &path)?;
        Ok(())
    }

    /// Delete a ref file. No-op if it does not exist.
    pub fn delete(&self, name: &RefName) -> Result<(), Error> {
        match fs::remove_file(self.path_for(name)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Error::Io(e)),
        }
    }

    /// The current `HEAD` state: which branch it points at (and whether that
    /// branch exists yet), or the detached commit id.
    pub fn head(&self) -> Result<Head, Error> {
        let head_name = RefName::new("HEAD")?;
        match self.read_raw(&head_name)? {
            RawRef::Direct(id) => Ok(Head::Detached(id)),
            RawRef::Symbolic(target) => {
                let id = self.resolve_opt(&target)?;
                Ok(Head::Branch { name: target, id })
            }
        }
    }

    /// List all branch refs under `refs/heads/`, sorted by name.
    pub fn branches(&self) -> Result<Vec<RefName>, Error> {
        self.list_under("refs/heads")
    }

    /// List all tag refs under `refs/tags/`, sorted by name.
    pub fn tags(&self) -> Result<Vec<RefName>, Error> {
        self.list_under("refs/tags")
    }

    /// List all remote-tracking refs under `refs/remotes/`, sorted by name.
    pub fn remote_refs(&self) -> Result<Vec<RefName>, Error> {
        self.list_under("refs/remotes")
    }

    fn list_under(&self, prefix: &str) -> Result<Vec<RefName>, Error> {
        let root = self.gitdir.join(prefix);
        let mut out = Vec::new();
        walk_refs(&root, prefix, &mut out)?;
        out.sort_by(|a: &RefName, b: &RefName| a.as_str().cmp(b.as_str()));
        Ok(out)
    }
}

/// What a ref file's content decodes to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawRef {
    /// A literal object id.
    Direct(ObjectId),
    /// A pointer at another ref name.
    Symbolic(RefName),
}

fn walk_refs(dir: &Path, prefix: &str, out: &mut Vec<RefName>) -> Result<(), Error> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(Error::Io(e)),
    };
    for entry in entries {
        let entry = entry?;
        let file_type = entry.file_type()?;
        let name = entry.file_name();
        let name = name.to_string_lossy();
        let full = format!("{prefix}/{name}");
        if file_type.is_dir() {
            walk_refs(&entry.path(), &full, out)?;
        } else {
            out.push(RefName::new(&full)?);
        }
    }
    Ok(())
}
