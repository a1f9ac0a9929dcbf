//! Content-addressed object storage: blobs, trees, and commits, serialized
//! with the canonical `"<kind> <len>\0<payload>"` header, SHA-1-hashed, and
//! zlib-compressed onto disk under `objects/<xx>/<38hex>` (loose object
//! fanout layout).

use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use sha1::{Digest, Sha1};

use crate::error::Error;
use crate::types::{Mode, ObjectId, ObjectKind, TreeEntry};

/// Content-addressed storage for loose git objects rooted at a `.git`-style
/// directory's `objects/` subdirectory.
#[derive(Debug, Clone)]
pub struct ObjectStore {
    root: PathBuf,
}

impl ObjectStore {
    /// Open (or prepare to create) an object store at `objects_dir`.
    ///
    /// Does not touch the filesystem; `write` creates directories lazily.
    #[must_use]
    pub fn new(objects_dir: impl Into<PathBuf>) -> Self {
        Self {
            root: objects_dir.into(),
        }
    }

    /// The path an object with the given id would live at.
    #[must_use]
    pub fn path_for(&self, id: ObjectId) -> PathBuf {
        let hex = id.to_string();
        self.root.join(&hex[..2]).join(&hex[2..])
    }

    /// Compute the canonical header+payload bytes and their SHA-1 id without
    /// writing anything.
    #[must_use]
    pub fn hash(kind: ObjectKind, payload: &[u8]) -> (ObjectId, Vec<u8>) {
        let header = format!("{} {}\0", kind.as_str(), payload.len());
        let mut full = Vec::with_capacity(header.len() + payload.len());
        full.extend_from_slice(header.as_bytes());
        full.extend_from_slice(payload);

        let mut hasher = Sha1::new();
        hasher.update(&full);
        let digest = hasher.finalize();
        let mut bytes = [0u8; 20];
        bytes.copy_from_slice(&digest);
        (ObjectId::from_bytes(bytes), full)
    }

    /// Write `payload` as an object of the given kind, returning its id.
    ///
    /// If an object with the computed id already exists, the write is
    /// skipped (loose objects are immutable once written) and
    /// [`Error::AlreadyPresent`] is returned — callers that fold many writes,
    /// such as the tree builder, treat this identically to a fresh write.
    pub fn write(&self, kind: ObjectKind, payload: &[u8]) -> Result<ObjectId, Error> {
        let (id, full) = Self::hash(kind, payload);
        let path = self.path_for(id);
        let _span = tracing::debug_span!("object_write", %id, kind = kind.as_str()).entered();

        if path.exists() {
            tracing::debug!("object already present, skipping write");
            return Err(Error::AlreadyPresent { id: id.to_string() });
        }

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(&full)?;
        let compressed = encoder.finish()?;

        let tmp_path = path.with_extension(format!("tmp-{}", std::process::id()));
        fs::write(&tmp_path, &compressed)?;
        fs::rename(&tmp_path, &path)?;

        Ok(id)
    }

    /// Write `payload`, tolerating (rather than erroring on) the object
    /// already being present. Returns the id either way.
    pub fn write_or_reuse(&self, kind: ObjectKind, payload: &[u8]) -> Result<ObjectId, Error> {
        match self.write(kind, payload) {
            Ok(id) => Ok(id),
            Err(Error::AlreadyPresent { id }) => id.parse(),
            Err(e) => Err(e),
        }
    }

    /// `true` if an object with this id is present in the store.
    #[must_use]
    pub fn exists(&self, id: ObjectId) -> bool {
        self.path_for(id).exists()
    }

    /// List every stored object id whose hex string starts with `prefix`
    /// (1-39 lowercase hex characters), by walking the fanout directories.
    ///
    /// Used by revision resolution to disambiguate abbreviated ids.
    pub fn ids_with_prefix(&self, prefix: &str) -> Result<Vec<ObjectId>, Error> {
        let mut out = Vec::new();

        let dir_entries = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(out),
            Err(e) => return Err(Error::Io(e)),
        };

        for dir_entry in dir_entries {
            let dir_entry = dir_entry?;
            if !dir_entry.file_type()?.is_dir() {
                continue;
            }
            let fanout = dir_entry.file_name();
            let fanout = fanout.to_string_lossy();
            if fanout.len() != 2 {
                continue;
            }
            // Narrow the fanout scan whenever the prefix fully or partially
            // covers the 2-char directory name; falls through to scanning
            // every fanout directory when the prefix is shorter than that.
            let covers = prefix.len().min(2);
            if fanout.as_bytes()[..covers] != prefix.as_bytes()[..covers] {
                continue;
            }

            for file_entry in fs::read_dir(dir_entry.path())? {
                let file_entry = file_entry?;
                let rest = file_entry.file_name();
                let rest = rest.to_string_lossy();
                let hex = format!("{fanout}{rest}");
                if hex.len() == 40 && hex.starts_with(prefix) {
                    if let Ok(id) = hex.parse::<ObjectId>() {
                        out.push(id);
                    }
                }
            }
        }

        out.sort();
        Ok(out)
    }

    /// Read and decompress the object with the given id, returning its kind
    /// and payload (header stripped).
    ///
    /// # Errors
    /// [`Error::NotFound`] if no such object exists; [`Error::Corrupt`] if the
    /// stored bytes fail to decompress, parse a header, or recompute to a
    /// different id than requested.
    pub fn read(&self, id: ObjectId) -> Result<(ObjectKind, Vec<u8>), Error> {
        let _span = tracing::debug_span!("object_read", %id).entered();
        let path = self.path_for(id);
        let compressed = fs::read(&path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                Error::NotFound {
                    message: format!("object {id} not found"),
                }
            } else {
                Error::Io(e)
            }
        })?;

        let mut decoder = ZlibDecoder::new(compressed.as_slice());
        let mut full = Vec::new();
        decoder.read_to_end(&mut full).map_err(|e| Error::Corrupt {
            location: format!("object {id}"),
            reason: format!("zlib inflate failed: {e}"),
        })?;

        let nul = full.iter().position(|&b| b == 0).ok_or_else(|| Error::Corrupt {
            location: format!("object {id}"),
            reason: "missing NUL terminator in header".to_string(),
        })?;
        let header = std::str::from_utf8(&full[..nul]).map_err(|_| Error::Corrupt {
            location: format!("object {id}"),
            reason: "header is not valid UTF-8".to_string(),
        })?;
        let (kind_str, len_str) = header.split_once(' ').ok_or_else(|| Error::Corrupt {
            location: format!("object {id}"),
            reason: format!("malformed header `{header}`"),
        })?;
        let kind: ObjectKind = kind_str.parse()?;
        let declared_len: usize = len_str.parse().map_err(|_| Error::Corrupt {
            location: format!("object {id}"),
            reason: format!("non-numeric length `{len_str}`"),
        })?;

        let payload = full[nul + 1..].to_vec();
        if payload.len() != declared_len {
            return Err(Error::Corrupt {
                location: format!("object {id}"),
                reason: format!(
                    "declared length {declared_len} does not match payload length {}",
                    payload.len()
                ),
            });
        }

        let (recomputed, _) = Self::hash(kind, &payload);
        if recomputed != id {
            return Err(Error::Corrupt {
                location: format!("object {id}"),
                reason: format!("content hashes to {recomputed}, not the requested id"),
            });
        }

        Ok((kind, payload))
    }

    /// Read just the kind of an object: decompresses only as far as the
    /// header, without reading the full payload or recomputing its hash.
    ///
    /// Cheaper than [`Self::read`] for callers (like revision resolution)
    /// that only need to discriminate blob/tree/commit/tag.
    pub fn type_of(&self, id: ObjectId) -> Result<ObjectKind, Error> {
        let _span = tracing::debug_span!("object_type_of", %id).entered();
        let path = self.path_for(id);
        let file = fs::File::open(&path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                Error::NotFound {
                    message: format!("object {id} not found"),
                }
            } else {
                Error::Io(e)
            }
        })?;

        let mut decoder = ZlibDecoder::new(file);
        let mut header = Vec::new();
        let mut byte = [0u8; 1];
        loop {
            let n = decoder.read(&mut byte).map_err(|e| Error::Corrupt {
                location: format!("object {id}"),
                reason: format!("zlib inflate failed: {e}"),
            })?;
            if n == 0 {
                return Err(Error::Corrupt {
                    location: format!("object {id}"),
                    reason: "missing NUL terminator in header".to_string(),
                });
            }
            if byte[0] == 0 {
                break;
            }
            header.push(byte[0]);
        }

        let header = std::str::from_utf8(&header).map_err(|_| Error::Corrupt {
            location: format!("object {id}"),
            reason: "header is not valid UTF-8".to_string(),
        })?;
        let (kind_str, _len_str) = header.split_once(' ').ok_or_else(|| Error::Corrupt {
            location: format!("object {id}"),
            reason: format!("malformed header `{header}`"),
        })?;
        kind_str.parse()
    }

    /// Extract the tree id named by a commit object's `"tree <id>"` header
    /// line. Used by revision resolution to dereference a commit down to the
    /// tree it names when a tree is specifically requested.
    pub fn commit_tree(payload: &[u8]) -> Result<ObjectId, Error> {
        let text = std::str::from_utf8(payload).map_err(|_| Error::Corrupt {
            location: "commit".to_string(),
            reason: "payload is not valid UTF-8".to_string(),
        })?;
        let first_line = text.lines().next().ok_or_else(|| Error::Corrupt {
            location: "commit".to_string(),
            reason: "empty commit payload".to_string(),
        })?;
        let hex = first_line.strip_prefix("tree ").ok_or_else(|| Error::Corrupt {
            location: "commit".to_string(),
            reason: format!("expected a `tree <id>` header line, found `{first_line}`"),
        })?;
        hex.parse()
    }

    /// Parse a tree object's payload into its entries.
    ///
    /// # Format
    /// A sequence of `"<mode-octal> <name>\0<20-byte-id>"` records, with no
    /// separator between records — the 20-byte id is both the terminator for
    /// one entry and the start of counting the next.
    pub fn parse_tree(payload: &[u8]) -> Result<Vec<TreeEntry>, Error> {
        let mut entries = Vec::new();
        let mut cursor = 0usize;
        while cursor < payload.len() {
            let space = payload[cursor..]
                .iter()
                .position(|&b| b == b' ')
                .ok_or_else(|| Error::Corrupt {
                    location: "tree entry".to_string(),
                    reason: "missing space after mode".to_string(),
                })?;
            let mode_str = std::str::from_utf8(&payload[cursor..cursor + space]).map_err(|_| Error::Corrupt {
                location: "tree entry".to_string(),
                reason: "mode is not valid UTF-8".to_string(),
            })?;
            let mode_value = u32::from_str_radix(mode_str, 8).map_err(|_| Error::Corrupt {
                location: "tree entry".to_string(),
                reason: format!("non-octal mode `{mode_str}`"),
            })?;
            let mode = Mode::from_octal(mode_value)?;
            cursor += space + 1;

            let nul = payload[cursor..]
                .iter()
                .position(|&b| b == 0)
                .ok_or_else(|| Error::Corrupt {
                    location: "tree entry".to_string(),
                    reason: "missing NUL after name".to_string(),
                })?;
            let name = std::str::from_utf8(&payload[cursor..cursor + nul])
                .map_err(|_| Error::Corrupt {
                    location: "tree entry".to_string(),
                    reason: "name is not valid UTF-8".to_string(),
                })?
                .to_string();
            cursor += nul + 1;

            if cursor + 20 > payload.len() {
                return Err(Error::Corrupt {
                    location: "tree entry".to_string(),
                    reason: "truncated id".to_string(),
                });
            }
            let mut id_bytes = [0u8; 20];
            id_bytes.copy_from_slice(&payload[cursor..cursor + 20]);
            cursor += 20;

            entries.push(TreeEntry {
                name,
                mode,
                id: ObjectId::from_bytes(id_bytes),
            });
        }
        Ok(entries)
    }

    /// Serialize tree entries into a tree object's payload.
    ///
    /// Entries must already be in git's tree sort order; this function does
    /// not sort them (see [`crate::tree`] for the builder that does).
    #[must_use]
    pub fn encode_tree(entries: &[TreeEntry]) -> Vec<u8> {
        let mut payload = Vec::new();
        for entry in entries {
            payload.extend_from_slice(entry.mode.octal_str().as_bytes());
            payload.push(b' ');
            payload.extend_from_slice(entry.name.as_bytes());
            payload.push(0);
            payload.extend_from_slice(entry.id.as_bytes());
        }
        payload
    }
}

/// The root directory conventionally used for a repository's object store,
/// relative to the `.git` directory.
#[must_use]
pub fn objects_subdir(gitdir: &Path) -> PathBuf {
    gitdir.join("objects")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn store() -> (tempfile::TempDir, ObjectStore) {
        let dir = tempdir().unwrap();
        let store = ObjectStore::new(dir.path());
        (dir, store)
    }

    #[test]
    fn blob_hash_matches_known_fixture() {
        // `echo -n "hello world" | git hash-object --stdin` => this value.
        let (_dir, store) = store();
        let id = store.write(ObjectKind::Blob, b"hello world").unwrap();
        assert_eq!(id.to_string(), "95d09f2b10159347eece71399a7e2e907ea3df4f");
    }

    #[test]
    fn empty_blob_hash() {
        let (_dir, store) = store();
        let id = store.write(ObjectKind::Blob, b"").unwrap();
        assert_eq!(id.to_string(), "e69de29bb2d1d6434b8b29ae775ad8c2e48c5391");
    }

    #[test]
    fn write_then_read_roundtrips() {
        let (_dir, store) = store();
        let id = store.write(ObjectKind::Blob, b"payload data").unwrap();
        let (kind, payload) = store.read(id).unwrap();
        assert_eq!(kind, ObjectKind::Blob);
        assert_eq!(payload, b"payload data");
    }

    #[test]
    fn duplicate_write_is_already_present() {
        let (_dir, store) = store();
        store.write(ObjectKind::Blob, b"dup").unwrap();
        let err = store.write(ObjectKind::Blob, b"dup").unwrap_err();
        assert!(matches!(err, Error::AlreadyPresent { .. }));
    }

    #[test]
    fn write_or_reuse_tolerates_duplicate() {
        let (_dir, store) = store();
        let first = store.write_or_reuse(ObjectKind::Blob, b"dup").unwrap();
        let second = store.write_or_reuse(ObjectKind::Blob, b"dup").unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn read_missing_is_not_found() {
        let (_dir, store) = store();
        let err = store.read(ObjectId::ZERO).unwrap_err();
        assert!(matches!(err, Error::NotFound { .. }));
    }

    #[test]
    fn tree_entries_roundtrip() {
        let entries = vec![
            TreeEntry {
                name: "a.txt".to_string(),
                mode: Mode::Blob,
                id: ObjectId::from_bytes([1; 20]),
            },
            TreeEntry {
                name: "sub".to_string(),
                mode: Mode::Tree,
                id: ObjectId::from_bytes([2; 20]),
            },
        ];
        let payload = ObjectStore::encode_tree(&entries);
        let parsed = ObjectStore::parse_tree(&payload).unwrap();
        assert_eq!(parsed, entries);
    }

    #[test]
    fn corrupt_payload_is_detected_on_read() {
        let (_dir, store) = store();
        let id = store.write(ObjectKind::Blob, b"original").unwrap();
        let path = store.path_for(id);

        // Overwrite with a validly-zlib-compressed but wrong-content blob,
        // keeping the original (now mismatched) id.
        let (_other_id, full) = ObjectStore::hash(ObjectKind::Blob, b"tampered");
        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(&full).unwrap();
        fs::write(&path, encoder.finish().unwrap()).unwrap();

        let err = store.read(id).unwrap_err();
        assert!(matches!(err, Error::Corrupt { .. }));
    }

    #[test]
    fn type_of_matches_written_kind() {
        let (_dir, store) = store();
        let id = store.write(ObjectKind::Tree, b"").unwrap();
        assert_eq!(store.type_of(id).unwrap(), ObjectKind::Tree);
    }

    #[test]
    fn type_of_missing_is_not_found() {
        let (_dir, store) = store();
        let err = store.type_of(ObjectId::ZERO).unwrap_err();
        assert!(matches!(err, Error::NotFound { .. }));
    }

    #[test]
    fn commit_tree_extracts_leading_tree_line() {
        let payload = b"tree 56ef077a153a22a552fb32288831d723bbc3e26c\nauthor a <a@b> 0 +0000\n";
        let tree_id = ObjectStore::commit_tree(payload).unwrap();
        assert_eq!(tree_id.to_string(), "56ef077a153a22a552fb32288831d723bbc3e26c");
    }

    #[test]
    fn commit_tree_rejects_missing_header() {
        let err = ObjectStore::commit_tree(b"author a <a@b> 0 +0000\n").unwrap_err();
        assert!(matches!(err, Error::Corrupt { .. }));
    }

    #[test]
    fn path_for_uses_fanout_layout() {
        let (_dir, store) = store();
        let id: ObjectId = "0123456789abcdef0123456789abcdef01234567".parse().unwrap();
        let path = store.path_for(id);
        assert!(path.ends_with("01/23456789abcdef0123456789abcdef01234567"));
    }
}
