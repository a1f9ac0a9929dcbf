//! Folds a flat, sorted list of index entries into a nested tree object
//! graph, and the inverse: expanding a tree graph back into a flat list of
//! paths.
//!
//! Built as explicit recursion over `(prefix, entry_range)` — one recursive
//! call per directory level — rather than sentinel-scanning over a flat
//! sorted array, matching the recursive-descent style used elsewhere in this
//! crate's parsers.

use std::collections::BTreeMap;

use crate::error::Error;
use crate::objects::ObjectStore;
use crate::types::{IndexEntry, Mode, ObjectId, TreeEntry, tree_entry_cmp};

/// Builds tree objects from a flat set of staged paths.
pub struct TreeBuilder<'a> {
    store: &'a ObjectStore,
}

impl<'a> TreeBuilder<'a> {
    /// Build against the given object store; written trees land there.
    #[must_use]
    pub fn new(store: &'a ObjectStore) -> Self {
        Self { store }
    }

    /// Fold all stage-0 index entries into a tree object graph, returning
    /// the id of the root tree.
    ///
    /// # Errors
    /// [`Error::InvalidArgument`] if `entries` contains a stage other than
    /// normal (callers must resolve conflicts before writing a tree).
    pub fn write_tree(&self, entries: &[IndexEntry]) -> Result<ObjectId, Error> {
        for entry in entries {
            if entry.stage != crate::types::Stage::Normal {
                return Err(Error::InvalidArgument {
                    message: format!(
                        "cannot write a tree from an unmerged entry at `{}`",
                        entry.path
                    ),
                });
            }
        }

        let node = build_node(entries);
        self.write_node(&node)
    }

    fn write_node(&self, node: &DirNode) -> Result<ObjectId, Error> {
        let mut tree_entries = Vec::with_capacity(node.files.len() + node.dirs.len());

        for (name, entry) in &node.files {
            tree_entries.push(TreeEntry {
                name: name.clone(),
                mode: entry.mode,
                id: entry.id,
            });
        }
        for (name, child) in &node.dirs {
            let child_id = self.write_node(child)?;
            tree_entries.push(TreeEntry {
                name: name.clone(),
                mode: Mode::Tree,
                id: child_id,
            });
        }

        tree_entries.sort_by(|a, b| tree_entry_cmp(&a.name, a.mode, &b.name, b.mode));

        let payload = ObjectStore::encode_tree(&tree_entries);
        self.store.write_or_reuse(crate::types::ObjectKind::Tree, &payload)
    }

    /// Expand a tree (and its subtrees, recursively) back into a flat list
    /// of `(full_path, mode, id)` triples, in tree-sorted order at each
    /// level. The inverse of [`Self::write_tree`].
    pub fn expand_tree(&self, root: ObjectId) -> Result<Vec<(String, Mode, ObjectId)>, Error> {
        let mut out = Vec::new();
        self.expand_into(root, "", &mut out)?;
        Ok(out)
    }

    fn expand_into(
        &self,
        id: ObjectId,
        prefix: &str,
        out: &mut Vec<(String, Mode, ObjectId)>,
    ) -> Result<(), Error> {
        let (kind, payload) = self.store.read(id)?;
        if kind != crate::types::ObjectKind::Tree {
            return Err(Error::Corrupt {
                location: format!("tree {id}"),
                reason: format!("expected a tree object, found {kind}"),
            });
        }
        for entry in ObjectStore::parse_tree(&payload)? {
            let full_path = if prefix.is_empty() {
                entry.name.clone()
            } else {
                format!("{prefix}/{}", entry.name)
            };
            if entry.mode.is_tree() {
                self.expand_into(entry.id, &full_path, out)?;
            } else {
                out.push((full_path, entry.mode, entry.id));
            }
        }
        Ok(())
    }
}

/// One level of the in-memory directory tree folded from index entries
/// before any objects are written.
#[derive(Default)]
struct DirNode {
    files: BTreeMap<String, FileLeaf>,
    dirs: BTreeMap<String, DirNode>,
}

struct FileLeaf {
    mode: Mode,
    id: ObjectId,
}

fn build_node(entries: &[IndexEntry]) -> DirNode {
    let mut root = DirNode::default();
    for entry in entries {
        insert_path(&mut root, &entry.path, entry.mode, entry.id);
    }
    root
}

fn insert_path(node: &mut DirNode, path: &str, mode: Mode, id: ObjectId) {
    match path.split_once('/') {
        None => {
            node.files.insert(path.to_string(), FileLeaf { mode, id });
        }
        Some((head, rest)) => {
            let child = node.dirs.entry(head.to_string()).or_default();
            insert_path(child, rest, mode, id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Stage;
    use tempfile::tempdir;

    fn entry(path: &str, content: &[u8]) -> (IndexEntry, Vec<u8>) {
        (
            IndexEntry {
                path: path.to_string(),
                stage: Stage::Normal,
                mode: Mode::Blob,
                id: ObjectId::ZERO, // filled in by caller after writing the blob
                size: content.len() as u32,
                ctime_secs: 0,
                ctime_nanos: 0,
                mtime_secs: 0,
                mtime_nanos: 0,
                dev: 0,
                ino: 0,
                uid: 0,
                gid: 0,
                assume_valid: false,
            },
            content.to_vec(),
        )
    }

    #[test]
    fn single_file_at_root_matches_known_fixture() {
        let dir = tempdir().unwrap();
        let store = ObjectStore::new(dir.path());
        let blob_id = store.write(crate::types::ObjectKind::Blob, b"hello\n").unwrap();

        let mut e = entry("greet.txt", b"hello\n").0;
        e.id = blob_id;

        let builder = TreeBuilder::new(&store);
        let tree_id = builder.write_tree(std::slice::from_ref(&e)).unwrap();

        // `git hash-object` for "hello\n" is ce013625030ba8dba906f756967f9e9ca394464a;
        // a tree with one 100644 entry named greet.txt pointing at it hashes
        // to this value.
        assert_eq!(tree_id.to_string(), "56ef077a153a22a552fb32288831d723bbc3e26c");
    }

    #[test]
    fn nested_paths_fold_into_subtrees() {
        let dir = tempdir().unwrap();
        let store = ObjectStore::new(dir.path());

        let blob_a = store.write(crate::types::ObjectKind::Blob, b"a").unwrap();
        let blob_b = store.write(crate::types::ObjectKind::Blob, b"b").unwrap();

        let mut ea = entry("src/a.txt", b"a").0;
        ea.id = blob_a;
        let mut eb = entry("src/nested/b.txt", b"b").0;
        eb.id = blob_b;

        let builder = TreeBuilder::new(&store);
        let root = builder.write_tree(&[ea, eb]).unwrap();

        let expanded = builder.expand_tree(root).unwrap();
        let paths: Vec<_> = expanded.iter().map(|(p, _, _)| p.as_str()).collect();
        assert_eq!(paths, vec!["src/a.txt", "src/nested/b.txt"]);
    }

    #[test]
    fn write_tree_rejects_unmerged_entries() {
        let dir = tempdir().unwrap();
        let store = ObjectStore::new(dir.path());
        let builder = TreeBuilder::new(&store);

        let mut conflict = entry("c.txt", b"x").0;
        conflict.stage = Stage::Ours;

        let err = builder.write_tree(&[conflict]).unwrap_err();
        assert!(matches!(err, Error::InvalidArgument { .. }));
    }

    #[test]
    fn expand_then_rebuild_is_identity() {
        let dir = tempdir().unwrap();
        let store = ObjectStore::new(dir.path());
        let builder = TreeBuilder::new(&store);

        let blob = store.write(crate::types::ObjectKind::Blob, b"content").unwrap();
        let mut e1 = entry("dir/one.txt", b"content").0;
        e1.id = blob;
        let mut e2 = entry("dir/two.txt", b"content").0;
        e2.id = blob;

        let root = builder.write_tree(&[e1, e2]).unwrap();
        let expanded = builder.expand_tree(root).unwrap();

        let rebuilt_entries: Vec<IndexEntry> = expanded
            .iter()
            .map(|(path, mode, id)| IndexEntry {
                path: path.clone(),
                stage: Stage::Normal,
                mode: *mode,
                id: *id,
                size: 0,
                ctime_secs: 0,
                ctime_nanos: 0,
                mtime_secs: 0,
                mtime_nanos: 0,
                dev: 0,
                ino: 0,
                uid: 0,
                gid: 0,
                assume_valid: false,
            })
            .collect();

        let rebuilt_root = builder.write_tree(&rebuilt_entries).unwrap();
        assert_eq!(root, rebuilt_root);
    }
}
