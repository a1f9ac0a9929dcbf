//! Core vocabulary shared by every module in this crate: object identifiers,
//! object kinds, tree entry modes, and the small value types that flow
//! between the object store, the index, and revision resolution.
//!
//! These types intentionally contain no storage or I/O logic — they are the
//! nouns the rest of the crate operates on.

use std::fmt;
use std::str::FromStr;

use crate::error::Error;

// ---------------------------------------------------------------------------
// ObjectId
// ---------------------------------------------------------------------------

/// A git object identifier: the SHA-1 of an object's canonical serialization.
///
/// Stored as raw bytes for cheap comparison, hashing, and `Copy` semantics.
/// Displays as 40 lowercase hex characters.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId([u8; 20]);

impl ObjectId {
    /// The all-zero id, the sentinel "absent" value.
    pub const ZERO: Self = Self([0; 20]);

    /// Build an `ObjectId` from raw bytes.
    #[must_use]
    pub const fn from_bytes(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }

    /// The raw 20 bytes.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    /// `true` if this is the zero id.
    #[must_use]
    pub fn is_zero(&self) -> bool {
        *self == Self::ZERO
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl fmt::Debug for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjectId({self})")
    }
}

impl FromStr for ObjectId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() != 40 {
            return Err(Error::InvalidArgument {
                message: format!("expected 40 hex characters, got {}", s.len()),
            });
        }
        let decoded = hex::decode(s).map_err(|e| Error::InvalidArgument {
            message: format!("invalid hex in `{s}`: {e}"),
        })?;
        let bytes: [u8; 20] = decoded.try_into().expect("hex::decode of 40 chars yields 20 bytes");
        Ok(Self(bytes))
    }
}

/// Returns `true` if `s` is a plausible hex prefix of an object id: 1 to 40
/// hex digits.
#[must_use]
pub fn is_hex_prefix(s: &str) -> bool {
    !s.is_empty() && s.len() <= 40 && s.bytes().all(|b| b.is_ascii_hexdigit())
}

// ---------------------------------------------------------------------------
// ObjectKind
// ---------------------------------------------------------------------------

/// The tag of an object's canonical serialization header.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ObjectKind {
    /// Raw file content.
    Blob,
    /// Ordered directory entries.
    Tree,
    /// Tree + parents + identity + message.
    Commit,
    /// Annotated tag (recognized, not constructed, by this core).
    Tag,
}

impl ObjectKind {
    /// The on-disk ASCII tag used in the canonical header (`"<kind> <len>\0"`).
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Blob => "blob",
            Self::Tree => "tree",
            Self::Commit => "commit",
            Self::Tag => "tag",
        }
    }
}

impl FromStr for ObjectKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "blob" => Ok(Self::Blob),
            "tree" => Ok(Self::Tree),
            "commit" => Ok(Self::Commit),
            "tag" => Ok(Self::Tag),
            other => Err(Error::Corrupt {
                location: "object header".to_string(),
                reason: format!("unknown object kind `{other}`"),
            }),
        }
    }
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Mode
// ---------------------------------------------------------------------------

/// The file mode of a tree or index entry.
///
/// Restricted to the five values git permits: regular, executable, symlink,
/// subtree, and gitlink (submodule).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Mode {
    /// Regular file (`100644`).
    Blob,
    /// Executable file (`100755`).
    BlobExecutable,
    /// Symbolic link (`120000`).
    Symlink,
    /// Subtree (`40000`).
    Tree,
    /// Gitlink / submodule (`160000`).
    Gitlink,
}

impl Mode {
    /// The octal value git stores on disk (plain numeric value, as used in
    /// the struct-level index entry field, not the serialized text form).
    #[must_use]
    pub const fn octal(self) -> u32 {
        match self {
            Self::Blob => 0o100644,
            Self::BlobExecutable => 0o100755,
            Self::Symlink => 0o120000,
            Self::Tree => 0o040000,
            Self::Gitlink => 0o160000,
        }
    }

    /// Parse a mode from its octal numeric value.
    pub fn from_octal(value: u32) -> Result<Self, Error> {
        match value {
            0o100644 => Ok(Self::Blob),
            0o100755 => Ok(Self::BlobExecutable),
            0o120000 => Ok(Self::Symlink),
            0o040000 => Ok(Self::Tree),
            0o160000 => Ok(Self::Gitlink),
            other => Err(Error::Corrupt {
                location: "tree/index entry mode".to_string(),
                reason: format!("unrecognized mode {other:o}"),
            }),
        }
    }

    /// `true` for the subtree mode (`040000`).
    #[must_use]
    pub const fn is_tree(self) -> bool {
        matches!(self, Self::Tree)
    }

    /// The text form used in a serialized tree entry header: octal digits,
    /// no leading zero (e.g. `"100644"`, `"40000"`).
    #[must_use]
    pub fn octal_str(self) -> String {
        format!("{:o}", self.octal())
    }
}

// ---------------------------------------------------------------------------
// TreeEntry
// ---------------------------------------------------------------------------

/// A single entry in a tree object.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TreeEntry {
    /// Basename of this entry (no path separators).
    pub name: String,
    /// The entry's mode.
    pub mode: Mode,
    /// The id of the blob, tree, or commit (gitlink) this entry points at.
    pub id: ObjectId,
}

/// Order two tree entry names the way git sorts a tree's entries: a subtree
/// name compares as though it carried a trailing `/`, so a file `"foo.txt"`
/// sorts before a subtree named `"foo"`.
#[must_use]
pub fn tree_entry_cmp(a_name: &str, a_mode: Mode, b_name: &str, b_mode: Mode) -> std::cmp::Ordering {
    sort_key(a_name, a_mode).cmp(&sort_key(b_name, b_mode))
}

fn sort_key(name: &str, mode: Mode) -> Vec<u8> {
    let mut key = name.as_bytes().to_vec();
    if mode.is_tree() {
        key.push(b'/');
    }
    key
}

// ---------------------------------------------------------------------------
// Stage
// ---------------------------------------------------------------------------

/// The merge stage of an index entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Stage {
    /// Merged / normal (stage 0).
    Normal,
    /// Common ancestor (stage 1).
    Base,
    /// "Ours" side of a conflict (stage 2).
    Ours,
    /// "Theirs" side of a conflict (stage 3).
    Theirs,
}

impl Stage {
    /// The 2-bit numeric value stored in the index entry's flags field.
    #[must_use]
    pub const fn as_u8(self) -> u8 {
        match self {
            Self::Normal => 0,
            Self::Base => 1,
            Self::Ours => 2,
            Self::Theirs => 3,
        }
    }

    /// Decode a stage from its 2-bit numeric value.
    pub fn from_u8(value: u8) -> Result<Self, Error> {
        match value {
            0 => Ok(Self::Normal),
            1 => Ok(Self::Base),
            2 => Ok(Self::Ours),
            3 => Ok(Self::Theirs),
            other => Err(Error::Corrupt {
                location: "index entry flags".to_string(),
                reason: format!("invalid stage {other}"),
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// IndexEntry
// ---------------------------------------------------------------------------

/// A single entry in the on-disk index (staging area).
///
/// Mirrors the fixed-width fields of a version-2 index entry. Timestamps and
/// filesystem identity fields are stored for change detection but are not
/// interpreted by any operation in this crate beyond round-tripping.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IndexEntry {
    /// Path relative to the repository root, using `/` separators.
    pub path: String,
    /// The merge stage this entry occupies.
    pub stage: Stage,
    /// The file mode.
    pub mode: Mode,
    /// Id of the blob stored in the index.
    pub id: ObjectId,
    /// File size in bytes, as recorded at stat time.
    pub size: u32,
    /// Last content-change time, seconds component.
    pub ctime_secs: u32,
    /// Last content-change time, nanoseconds component.
    pub ctime_nanos: u32,
    /// Last modification time, seconds component.
    pub mtime_secs: u32,
    /// Last modification time, nanoseconds component.
    pub mtime_nanos: u32,
    /// Device id from `stat`.
    pub dev: u32,
    /// Inode number from `stat`.
    pub ino: u32,
    /// User id from `stat`.
    pub uid: u32,
    /// Group id from `stat`.
    pub gid: u32,
    /// `true` if the "assume unchanged" bit is set.
    pub assume_valid: bool,
}

// ---------------------------------------------------------------------------
// ParsedRevision
// ---------------------------------------------------------------------------

/// The result of resolving a single revision token: an id plus whether the
/// token carried the `^` exclusion prefix.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ParsedRevision {
    /// The resolved object id.
    pub id: ObjectId,
    /// `true` if the original token began with `^`.
    pub excluded: bool,
}

// ---------------------------------------------------------------------------
// RefName
// ---------------------------------------------------------------------------

/// A validated git ref name.
///
/// Must start with `refs/` or be a well-known bare name (`HEAD`, and similar).
/// Rejects the path patterns git also rejects: a leading `.`, a `..`
/// component, an empty component (`//`), and a trailing `/`.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct RefName(String);

/// Well-known bare ref names that don't start with `refs/`.
const BARE_REFS: &[&str] = &["HEAD", "FETCH_HEAD", "MERGE_HEAD", "ORIG_HEAD", "CHERRY_PICK_HEAD"];

impl RefName {
    /// Create a new `RefName`, validating that it looks like a git ref.
    ///
    /// # Errors
    /// Returns [`Error::InvalidArgument`] if the name is empty, malformed, or
    /// neither `refs/`-prefixed nor a well-known bare ref.
    pub fn new(name: &str) -> Result<Self, Error> {
        Self::validate(name)?;
        Ok(Self(name.to_owned()))
    }

    /// Return the ref name as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn validate(name: &str) -> Result<(), Error> {
        let reject = |reason: &str| {
            Err(Error::InvalidArgument {
                message: format!("invalid ref name `{name}`: {reason}"),
            })
        };
        if name.is_empty() {
            return reject("must not be empty");
        }
        if !(name.starts_with("refs/") || BARE_REFS.contains(&name)) {
            return reject("must start with 'refs/' or be a well-known ref (HEAD, etc.)");
        }
        if name.ends_with('/') {
            return reject("must not end with '/'");
        }
        if name.contains("//") {
            return reject("must not contain an empty path component");
        }
        if name.split('/').any(|part| part == ".." || part.starts_with('.')) {
            return reject("must not contain a '.'-leading or '..' path component");
        }
        Ok(())
    }
}

impl fmt::Display for RefName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for RefName {
    type Err = Error;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

// ---------------------------------------------------------------------------
// HashDiff (DiffFiles output)
// ---------------------------------------------------------------------------

/// One entry in the result of a working-tree diff: the index-side and
/// working-tree-side `(id, mode)` pair for a path that differs.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HashDiff {
    /// Path relative to the repository root.
    pub path: String,
    /// The id recorded in the index (stage 0).
    pub index_id: ObjectId,
    /// The mode recorded in the index.
    pub index_mode: Mode,
    /// The mode classified from the working-tree stat. `None` if the path is
    /// missing from the working tree.
    pub worktree_mode: Option<Mode>,
    /// Always [`ObjectId::ZERO`]: the working-tree content that produced this
    /// diff has been hashed only for comparison, not written to the object
    /// store, so there is no real id to report here yet.
    pub worktree_id: ObjectId,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    // -- ObjectId --

    #[test]
    fn oid_roundtrip_hex() {
        let hex = "0123456789abcdef0123456789abcdef01234567";
        let oid: ObjectId = hex.parse().unwrap();
        assert_eq!(oid.to_string(), hex);
    }

    #[test]
    fn oid_zero() {
        assert!(ObjectId::ZERO.is_zero());
        assert_eq!(
            ObjectId::ZERO.to_string(),
            "0000000000000000000000000000000000000000"
        );
    }

    #[test]
    fn oid_rejects_short() {
        assert!("abc".parse::<ObjectId>().is_err());
    }

    #[test]
    fn oid_rejects_non_hex() {
        let bad = "g".repeat(40);
        assert!(bad.parse::<ObjectId>().is_err());
    }

    #[test]
    fn oid_copy_semantics() {
        let hex = "a".repeat(40);
        let oid: ObjectId = hex.parse().unwrap();
        let copy = oid;
        assert_eq!(oid, copy);
    }

    #[test]
    fn oid_from_bytes() {
        let bytes = [0xab; 20];
        let oid = ObjectId::from_bytes(bytes);
        assert_eq!(oid.as_bytes(), &bytes);
        assert_eq!(oid.to_string(), "ab".repeat(20));
    }

    #[test]
    fn is_hex_prefix_accepts_partial() {
        assert!(is_hex_prefix("abc1"));
        assert!(!is_hex_prefix(""));
        assert!(!is_hex_prefix("xyz1"));
        assert!(!is_hex_prefix(&"a".repeat(41)));
    }

    // -- Mode --

    #[test]
    fn mode_octal_roundtrip() {
        for mode in [
            Mode::Blob,
            Mode::BlobExecutable,
            Mode::Symlink,
            Mode::Tree,
            Mode::Gitlink,
        ] {
            assert_eq!(Mode::from_octal(mode.octal()).unwrap(), mode);
        }
    }

    #[test]
    fn mode_octal_str_has_no_leading_zero() {
        assert_eq!(Mode::Blob.octal_str(), "100644");
        assert_eq!(Mode::Tree.octal_str(), "40000");
    }

    #[test]
    fn tree_sort_treats_subtree_as_slash_suffixed() {
        assert_eq!(
            tree_entry_cmp("foo.txt", Mode::Blob, "foo", Mode::Tree),
            std::cmp::Ordering::Less
        );
    }

    // -- Stage --

    #[test]
    fn stage_roundtrip() {
        for s in [Stage::Normal, Stage::Base, Stage::Ours, Stage::Theirs] {
            assert_eq!(Stage::from_u8(s.as_u8()).unwrap(), s);
        }
    }

    // -- RefName --

    #[test]
    fn refname_valid_refs_prefix() {
        assert!(RefName::new("refs/heads/main").is_ok());
        assert!(RefName::new("refs/remotes/origin/main").is_ok());
        assert!(RefName::new("refs/tags/v1.0").is_ok());
    }

    #[test]
    fn refname_valid_head() {
        assert!(RefName::new("HEAD").is_ok());
    }

    #[test]
    fn refname_rejects_bare() {
        assert!(RefName::new("main").is_err());
    }

    #[test]
    fn refname_rejects_empty() {
        assert!(RefName::new("").is_err());
    }

    #[test]
    fn refname_rejects_dotdot() {
        assert!(RefName::new("refs/heads/../escape").is_err());
    }

    #[test]
    fn refname_rejects_trailing_slash() {
        assert!(RefName::new("refs/heads/main/").is_err());
    }

    #[test]
    fn refname_rejects_double_slash() {
        assert!(RefName::new("refs/heads//main").is_err());
    }

    #[test]
    fn refname_display() {
        let r = RefName::new("refs/heads/main").unwrap();
        assert_eq!(r.to_string(), "refs/heads/main");
    }
}
