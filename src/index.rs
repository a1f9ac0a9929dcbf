//! The binary staging file (git index format, version 2): parsing,
//! serialization, and the small set of mutations needed to stage and
//! unstage paths.
//!
//! # On-disk layout
//!
//! ```text
//! header:   "DIRC" | version:u32be | entry_count:u32be         (12 bytes)
//! entry*:   fixed 62-byte prefix | path (NUL-padded to a multiple of 8)
//! trailer:  sha1(header || entries)                            (20 bytes)
//! ```
//!
//! Entries are sorted by `(path, stage)` and that order is the authoritative
//! iteration order — there is no separate index into the entry list.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use sha1::{Digest, Sha1};

use crate::error::Error;
use crate::types::{Mode, ObjectId, Stage};

/// Signature bytes at the start of every version-2 index file.
const SIGNATURE: &[u8; 4] = b"DIRC";
/// The only on-disk version this implementation produces or accepts.
const VERSION: u32 = 2;
/// Size in bytes of an index entry's fixed-width prefix, before the
/// variable-length NUL-padded path.
const ENTRY_PREFIX_LEN: usize = 62;

/// A single entry in the index.
pub use crate::types::IndexEntry as Entry;

/// The parsed contents of an index file.
#[derive(Debug, Clone, Default)]
pub struct Index {
    entries: Vec<Entry>,
}

impl Index {
    /// An empty index, as git produces before the first `add`.
    #[must_use]
    pub fn empty() -> Self {
        Self { entries: Vec::new() }
    }

    /// Parse an index from its on-disk byte representation.
    ///
    /// # Errors
    /// [`Error::Corrupt`] for a bad signature, unsupported version, checksum
    /// mismatch, or a truncated/malformed entry.
    pub fn parse(bytes: &[u8]) -> Result<Self, Error> {
        if bytes.len() < 12 + 20 {
            return Err(Error::Corrupt {
                location: "index".to_string(),
                reason: "file shorter than header + checksum".to_string(),
            });
        }

        let (header_and_entries, checksum) = bytes.split_at(bytes.len() - 20);
        let mut hasher = Sha1::new();
        hasher.update(header_and_entries);
        let computed: [u8; 20] = hasher.finalize().into();
        if computed != checksum {
            return Err(Error::Corrupt {
                location: "index".to_string(),
                reason: "trailing checksum does not match file contents".to_string(),
            });
        }

        if &header_and_entries[0..4] != SIGNATURE {
            return Err(Error::Corrupt {
                location: "index header".to_string(),
                reason: "missing DIRC signature".to_string(),
            });
        }
        let version = u32::from_be_bytes(header_and_entries[4..8].try_into().unwrap());
        if version != VERSION {
            return Err(Error::Corrupt {
                location: "index header".to_string(),
                reason: format!("unsupported index version {version}"),
            });
        }
        let count = u32::from_be_bytes(header_and_entries[8..12].try_into().unwrap()) as usize;

        let mut entries = Vec::with_capacity(count);
        let mut cursor = 12usize;
        for _ in 0..count {
            let (entry, consumed) = parse_entry(&header_and_entries[cursor..])?;
            entries.push(entry);
            cursor += consumed;
        }

        if cursor != header_and_entries.len() {
            return Err(Error::Corrupt {
                location: "index".to_string(),
                reason: format!(
                    "{} trailing bytes after the declared {count} entries",
                    header_and_entries.len() - cursor
                ),
            });
        }

        Ok(Self { entries })
    }

    /// Load an index from a file, returning an empty index if the file does
    /// not exist (matching a freshly initialized repository).
    pub fn read_from(path: &Path) -> Result<Self, Error> {
        match fs::read(path) {
            Ok(bytes) => Self::parse(&bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::empty()),
            Err(e) => Err(Error::Io(e)),
        }
    }

    /// Serialize the index to its on-disk byte representation.
    #[must_use]
    pub fn serialize(&self) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(SIGNATURE);
        out.extend_from_slice(&VERSION.to_be_bytes());
        out.extend_from_slice(&(self.entries.len() as u32).to_be_bytes());

        for entry in &self.entries {
            write_entry(&mut out, entry);
        }

        let mut hasher = Sha1::new();
        hasher.update(&out);
        let checksum: [u8; 20] = hasher.finalize().into();
        out.extend_from_slice(&checksum);
        out
    }

    /// Atomically write the index to `path` via a temp file + rename.
    ///
    /// # Errors
    /// [`Error::LockContended`] if a `.lock` file for this path already
    /// exists (another writer is mid-transaction).
    pub fn write_to(&self, path: &Path) -> Result<(), Error> {
        let _span = tracing::debug_span!("index_write", path = %path.display(), entries = self.entries.len())
            .entered();
        let lock_path = lock_path_for(path);
        let mut lock = fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&lock_path)
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::AlreadyExists {
                    Error::LockContended {
                        path: path.to_path_buf(),
                    }
                } else {
                    Error::Io(e)
                }
            })?;

        let bytes = self.serialize();
        lock.write_all(&bytes)?;
        lock.sync_all()?;
        drop(lock);
        fs::rename(&lock_path, path)?;
        Ok(())
    }

    /// All entries, in on-disk `(path, stage)` order.
    #[must_use]
    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    /// Look up the stage-0 entry for `path`, if present.
    #[must_use]
    pub fn by_path(&self, path: &str) -> Option<&Entry> {
        self.entries
            .iter()
            .find(|e| e.path == path && e.stage == Stage::Normal)
    }

    /// The blob id staged for `path` at stage 0, or [`ObjectId::ZERO`] if
    /// `path` is not staged (or only staged as part of a conflict).
    #[must_use]
    pub fn sha1_of(&self, path: &str) -> ObjectId {
        self.by_path(path).map_or(ObjectId::ZERO, |e| e.id)
    }

    /// Look up the entry for `path` at a specific stage.
    #[must_use]
    pub fn by_path_stage(&self, path: &str, stage: Stage) -> Option<&Entry> {
        self.entries.iter().find(|e| e.path == path && e.stage == stage)
    }

    /// All entries with a stage other than [`Stage::Normal`] — the unmerged
    /// paths left behind by a conflicted merge.
    #[must_use]
    pub fn unmerged(&self) -> Vec<&Entry> {
        self.entries.iter().filter(|e| e.stage != Stage::Normal).collect()
    }

    /// Stage a path at a given stage, replacing any existing entry at the
    /// same `(path, stage)` pair.
    ///
    /// Staging at [`Stage::Normal`] removes any stage-1/2/3 entries for the
    /// same path first, preserving the invariant that a path is either fully
    /// merged (stage 0 only) or fully conflicted (stages 1-3 only, no stage
    /// 0).
    pub fn add_stage(&mut self, entry: Entry) {
        if entry.stage == Stage::Normal {
            self.entries.retain(|e| e.path != entry.path);
        } else {
            self.entries
                .retain(|e| !(e.path == entry.path && e.stage == entry.stage));
        }
        self.insert_sorted(entry);
    }

    /// Remove the first entry with matching `path` (typically stage 0, since
    /// entries are sorted `(path, stage)`). No-op if absent.
    pub fn remove_file(&mut self, path: &str) {
        if let Some(pos) = self.entries.iter().position(|e| e.path == path) {
            self.entries.remove(pos);
        }
    }

    /// Collapse a conflicted path back to a single stage-0 entry, discarding
    /// stages 1-3. Used once a conflict has been resolved.
    pub fn resolve_conflict(&mut self, path: &str, resolved: Entry) {
        self.entries.retain(|e| e.path != path);
        self.insert_sorted(resolved);
    }

    fn insert_sorted(&mut self, entry: Entry) {
        let pos = self
            .entries
            .partition_point(|e| cmp_path_stage(e, &entry) == std::cmp::Ordering::Less);
        self.entries.insert(pos, entry);
    }
}

fn cmp_path_stage(a: &Entry, b: &Entry) -> std::cmp::Ordering {
    a.path.cmp(&b.path).then(a.stage.cmp(&b.stage))
}

/// The padding applied after an entry's path so that `ENTRY_PREFIX_LEN +
/// path_len + padding` is a multiple of 8. `padding` is always in `1..=8`
/// (never 0), since the NUL terminator occupies at least one of the padding
/// bytes.
fn entry_padding(path_len: usize) -> usize {
    let remainder = (ENTRY_PREFIX_LEN + path_len) % 8;
    8 - remainder
}

fn write_entry(out: &mut Vec<u8>, entry: &Entry) {
    let start = out.len();
    out.extend_from_slice(&entry.ctime_secs.to_be_bytes());
    out.extend_from_slice(&entry.ctime_nanos.to_be_bytes());
    out.extend_from_slice(&entry.mtime_secs.to_be_bytes());
    out.extend_from_slice(&entry.mtime_nanos.to_be_bytes());
    out.extend_from_slice(&entry.dev.to_be_bytes());
    out.extend_from_slice(&entry.ino.to_be_bytes());
    out.extend_from_slice(&entry.mode.octal().to_be_bytes());
    out.extend_from_slice(&entry.uid.to_be_bytes());
    out.extend_from_slice(&entry.gid.to_be_bytes());
    out.extend_from_slice(&entry.size.to_be_bytes());
    out.extend_from_slice(entry.id.as_bytes());

    let path_bytes = entry.path.as_bytes();
    let name_len = (path_bytes.len() as u16).min(0xFFF);
    let assume_bit: u16 = if entry.assume_valid { 0x8000 } else { 0 };
    let stage_bits: u16 = (entry.stage.as_u8() as u16) << 12;
    let flags = assume_bit | stage_bits | name_len;
    out.extend_from_slice(&flags.to_be_bytes());

    debug_assert_eq!(out.len() - start, ENTRY_PREFIX_LEN);

    out.extend_from_slice(path_bytes);
    let padding = entry_padding(path_bytes.len());
    out.extend(std::iter::repeat(0u8).take(padding));
}

fn parse_entry(bytes: &[u8]) -> Result<(Entry, usize), Error> {
    if bytes.len() < ENTRY_PREFIX_LEN {
        return Err(Error::Corrupt {
            location: "index entry".to_string(),
            reason: "truncated fixed-width prefix".to_string(),
        });
    }

    let read_u32 = |off: usize| u32::from_be_bytes(bytes[off..off + 4].try_into().unwrap());

    let ctime_secs = read_u32(0);
    let ctime_nanos = read_u32(4);
    let mtime_secs = read_u32(8);
    let mtime_nanos = read_u32(12);
    let dev = read_u32(16);
    let ino = read_u32(20);
    let mode_value = read_u32(24);
    let uid = read_u32(28);
    let gid = read_u32(32);
    let size = read_u32(36);
    let mut id_bytes = [0u8; 20];
    id_bytes.copy_from_slice(&bytes[40..60]);
    let flags = u16::from_be_bytes(bytes[60..62].try_into().unwrap());

    let mode = Mode::from_octal(mode_value)?;
    let id = ObjectId::from_bytes(id_bytes);
    let assume_valid = flags & 0x8000 != 0;
    let stage = Stage::from_u8(((flags >> 12) & 0b11) as u8)?;
    let name_len = (flags & 0x0FFF) as usize;

    let path_start = ENTRY_PREFIX_LEN;
    let path = if name_len < 0xFFF {
        if bytes.len() < path_start + name_len {
            return Err(Error::Corrupt {
                location: "index entry".to_string(),
                reason: "truncated path".to_string(),
            });
        }
        std::str::from_utf8(&bytes[path_start..path_start + name_len])
            .map_err(|_| Error::Corrupt {
                location: "index entry".to_string(),
                reason: "path is not valid UTF-8".to_string(),
            })?
            .to_string()
    } else {
        // Name length pegged at the 0xFFF sentinel: the path continues until
        // the first NUL.
        let nul = bytes[path_start..]
            .iter()
            .position(|&b| b == 0)
            .ok_or_else(|| Error::Corrupt {
                location: "index entry".to_string(),
                reason: "missing NUL terminator for long path".to_string(),
            })?;
        std::str::from_utf8(&bytes[path_start..path_start + nul])
            .map_err(|_| Error::Corrupt {
                location: "index entry".to_string(),
                reason: "path is not valid UTF-8".to_string(),
            })?
            .to_string()
    };

    let padding = entry_padding(path.as_bytes().len());
    let total = ENTRY_PREFIX_LEN + path.as_bytes().len() + padding;

    if bytes.len() < total {
        return Err(Error::Corrupt {
            location: "index entry".to_string(),
            reason: "truncated padding".to_string(),
        });
    }

    Ok((
        Entry {
            path,
            stage,
            mode,
            id,
            size,
            ctime_secs,
            ctime_nanos,
            mtime_secs,
            mtime_nanos,
            dev,
            ino,
            uid,
            gid,
            assume_valid,
        },
        total,
    ))
}

fn lock_path_for(path: &Path) -> PathBuf {
    let mut os = path.as_os_str().to_owned();
    os.push(".lock");
    PathBuf::from(os)
}
