//! Working-tree-vs-index comparison: for each stage-0 index entry, stat the
//! corresponding working-tree path, classify its mode, and report it as
//! changed if the mode differs or the content hash differs.

use std::fs;
use std::os::unix::fs::{MetadataExt, PermissionsExt};
use std::path::Path;

use sha1::{Digest, Sha1};

use crate::error::Error;
use crate::index::Index;
use crate::types::{HashDiff, Mode, ObjectId, ObjectKind};

/// Compares the stage-0 entries of an index against the files actually
/// present in a working tree.
pub struct DiffFiles<'a> {
    worktree_root: &'a Path,
}

impl<'a> DiffFiles<'a> {
    /// Build a comparator rooted at `worktree_root`.
    #[must_use]
    pub fn new(worktree_root: &'a Path) -> Self {
        Self { worktree_root }
    }

    /// Compare every stage-0 entry in `index` against the working tree,
    /// returning the paths that differ, sorted by path.
    ///
    /// A path "differs" if: it is missing from the working tree, its
    /// classified mode does not match the index mode, or its content hash
    /// (computed only when the mode is a regular file) does not match the
    /// id recorded in the index.
    pub fn diff(&self, index: &Index) -> Result<Vec<HashDiff>, Error> {
        let mut out = Vec::new();
        for entry in index.entries() {
            if entry.stage != crate::types::Stage::Normal {
                continue;
            }
            let full_path = self.worktree_root.join(&entry.path);
            let worktree_mode = match fs::symlink_metadata(&full_path) {
                Ok(meta) => Some(classify_mode(&meta)),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
                Err(e) => return Err(Error::Io(e)),
            };

            let differs = match worktree_mode {
                None => true,
                Some(mode) => {
                    if mode != entry.mode {
                        true
                    } else if mode == Mode::Blob || mode == Mode::BlobExecutable {
                        hash_file(&full_path)? != entry.id
                    } else if mode == Mode::Symlink {
                        hash_symlink(&full_path)? != entry.id
                    } else {
                        // Subtrees/gitlinks are not diffed byte-for-byte here.
                        false
                    }
                }
            };

            if differs {
                out.push(HashDiff {
                    path: entry.path.clone(),
                    index_id: entry.id,
                    index_mode: entry.mode,
                    worktree_mode,
                    worktree_id: ObjectId::ZERO,
                });
            }
        }
        out.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(out)
    }
}

/// Classify a stat result into the restricted set of modes this core
/// understands: a directory is a subtree, a regular file is a blob (or
/// executable, per the owner-execute bit), and everything else — an actual
/// symlink, but also a device, socket, or fifo — is reported as symlink-mode.
///
/// Distinguishing a genuine symlink from other irregular files would need a
/// finer-grained stat classification than this core defines; per its
/// resolution of the source's ambiguous behavior here, every non-regular,
/// non-directory entry is folded into symlink-mode and left for the
/// working-tree collaborator to refine if it cares to.
fn classify_mode(meta: &fs::Metadata) -> Mode {
    let file_type = meta.file_type();
    if file_type.is_dir() {
        Mode::Tree
    } else if file_type.is_file() {
        if meta.permissions().mode() & 0o100 != 0 {
            Mode::BlobExecutable
        } else {
            Mode::Blob
        }
    } else {
        Mode::Symlink
    }
}

fn hash_file(path: &Path) -> Result<ObjectId, Error> {
    let content = fs::read(path)?;
    Ok(hash_blob(&content))
}

fn hash_symlink(path: &Path) -> Result<ObjectId, Error> {
    let target = fs::read_link(path)?;
    Ok(hash_blob(target.to_string_lossy().as_bytes()))
}

fn hash_blob(content: &[u8]) -> ObjectId {
    let header = format!("{} {}\0", ObjectKind::Blob.as_str(), content.len());
    let mut hasher = Sha1::new();
    hasher.update(header.as_bytes());
    hasher.update(content);
    let digest = hasher.finalize();
    let mut bytes = [0u8; 20];
    bytes.copy_from_slice(&digest);
    ObjectId::from_bytes(bytes)
}
