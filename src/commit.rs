//! Commit object construction and parsing.
//!
//! A commit wraps a tree id and zero or more parent commit ids together with
//! author/committer identity and a message into the canonical text payload
//! that [`crate::objects::ObjectStore`] hashes and stores. This module is the
//! inverse pair the object store's `"<kind> <len>\0<payload>"` envelope
//! leaves unopinionated: it owns the *shape* of a commit's payload, not its
//! storage.

use crate::error::Error;
use crate::objects::ObjectStore;
use crate::types::{ObjectId, ObjectKind};

/// An author or committer identity line: `<name> <email> <seconds> <tz>`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Signature {
    /// Display name.
    pub name: String,
    /// Email address, without surrounding angle brackets.
    pub email: String,
    /// Seconds since the Unix epoch.
    pub seconds: i64,
    /// Timezone offset in `+HHMM`/`-HHMM` form.
    pub tz_offset: String,
}

impl Signature {
    /// Build a signature from its parts.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        email: impl Into<String>,
        seconds: i64,
        tz_offset: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
            seconds,
            tz_offset: tz_offset.into(),
        }
    }

    fn encode(&self) -> String {
        format!("{} <{}> {} {}", self.name, self.email, self.seconds, self.tz_offset)
    }

    fn parse(line: &str) -> Result<Self, Error> {
        let open = line.find('<').ok_or_else(|| Error::Corrupt {
            location: "commit signature".to_string(),
            reason: format!("missing `<` in `{line}`"),
        })?;
        let close = line.find('>').ok_or_else(|| Error::Corrupt {
            location: "commit signature".to_string(),
            reason: format!("missing `>` in `{line}`"),
        })?;
        let name = line[..open].trim().to_string();
        let email = line[open + 1..close].to_string();
        let mut rest = line[close + 1..].trim().split_whitespace();
        let seconds: i64 = rest
            .next()
            .ok_or_else(|| Error::Corrupt {
                location: "commit signature".to_string(),
                reason: format!("missing timestamp in `{line}`"),
            })?
            .parse()
            .map_err(|_| Error::Corrupt {
                location: "commit signature".to_string(),
                reason: format!("non-numeric timestamp in `{line}`"),
            })?;
        let tz_offset = rest
            .next()
            .ok_or_else(|| Error::Corrupt {
                location: "commit signature".to_string(),
                reason: format!("missing timezone offset in `{line}`"),
            })?
            .to_string();
        Ok(Self {
            name,
            email,
            seconds,
            tz_offset,
        })
    }
}

/// The fields needed to author a new commit object.
#[derive(Clone, Debug)]
pub struct CommitSpec {
    /// The root tree this commit records.
    pub tree: ObjectId,
    /// Parent commit ids: empty for a root commit, one for a linear commit,
    /// two or more for a merge.
    pub parents: Vec<ObjectId>,
    /// Who wrote the change.
    pub author: Signature,
    /// Who recorded the commit (often identical to `author`).
    pub committer: Signature,
    /// The commit message, including any trailing newline the caller wants
    /// preserved verbatim.
    pub message: String,
}

/// A commit object's fields, as recovered from its canonical payload.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParsedCommit {
    /// The root tree this commit records.
    pub tree: ObjectId,
    /// Parent commit ids, in header order.
    pub parents: Vec<ObjectId>,
    /// Who wrote the change.
    pub author: Signature,
    /// Who recorded the commit.
    pub committer: Signature,
    /// The commit message (text following the blank line separator).
    pub message: String,
}

/// Serialize a commit's fields into the canonical text payload: a `tree`
/// line, zero or more `parent` lines, an `author` line, a `committer` line, a
/// blank line, then the message verbatim.
#[must_use]
pub fn encode_commit(spec: &CommitSpec) -> Vec<u8> {
    let mut out = String::new();
    out.push_str(&format!("tree {}\n", spec.tree));
    for parent in &spec.parents {
        out.push_str(&format!("parent {parent}\n"));
    }
    out.push_str(&format!("author {}\n", spec.author.encode()));
    out.push_str(&format!("committer {}\n", spec.committer.encode()));
    out.push('\n');
    out.push_str(&spec.message);
    out.into_bytes()
}

/// Parse a commit object's payload into its structured fields.
///
/// # Errors
/// [`Error::Corrupt`] if the header is missing the blank-line separator, a
/// mandatory `tree`/`author`/`committer` line, or any id fails to parse.
pub fn parse_commit(payload: &[u8]) -> Result<ParsedCommit, Error> {
    let text = std::str::from_utf8(payload).map_err(|_| Error::Corrupt {
        location: "commit".to_string(),
        reason: "payload is not valid UTF-8".to_string(),
    })?;
    let (header, message) = text.split_once("\n\n").ok_or_else(|| Error::Corrupt {
        location: "commit".to_string(),
        reason: "missing blank line separating header from message".to_string(),
    })?;

    let mut tree = None;
    let mut parents = Vec::new();
    let mut author = None;
    let mut committer = None;

    for line in header.lines() {
        if let Some(rest) = line.strip_prefix("tree ") {
            tree = Some(rest.parse()?);
        } else if let Some(rest) = line.strip_prefix("parent ") {
            parents.push(rest.parse()?);
        } else if let Some(rest) = line.strip_prefix("author ") {
            author = Some(Signature::parse(rest)?);
        } else if let Some(rest) = line.strip_prefix("committer ") {
            committer = Some(Signature::parse(rest)?);
        }
    }

    Ok(ParsedCommit {
        tree: tree.ok_or_else(|| Error::Corrupt {
            location: "commit".to_string(),
            reason: "missing `tree` header line".to_string(),
        })?,
        parents,
        author: author.ok_or_else(|| Error::Corrupt {
            location: "commit".to_string(),
            reason: "missing `author` header line".to_string(),
        })?,
        committer: committer.ok_or_else(|| Error::Corrupt {
            location: "commit".to_string(),
            reason: "missing `committer` header line".to_string(),
        })?,
        message: message.to_string(),
    })
}

/// Build a commit object from `spec` and write it to `store`, returning its
/// id. A pre-existing identical commit (same tree, parents, identities, and
/// message) is reused rather than duplicated, per [`ObjectStore::write_or_reuse`].
pub fn write_commit(store: &ObjectStore, spec: &CommitSpec) -> Result<ObjectId, Error> {
    let payload = encode_commit(spec);
    store.write_or_reuse(ObjectKind::Commit, &payload)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn sig() -> Signature {
        Signature::new("A U Thor", "author@example.com", 1_700_000_000, "+0000")
    }

    #[test]
    fn encode_then_parse_roundtrips() {
        let spec = CommitSpec {
            tree: ObjectId::from_bytes([0x11; 20]),
            parents: vec![ObjectId::from_bytes([0x22; 20])],
            author: sig(),
            committer: sig(),
            message: "a message\n".to_string(),
        };
        let payload = encode_commit(&spec);
        let parsed = parse_commit(&payload).unwrap();
        assert_eq!(parsed.tree, spec.tree);
        assert_eq!(parsed.parents, spec.parents);
        assert_eq!(parsed.author, spec.author);
        assert_eq!(parsed.committer, spec.committer);
        assert_eq!(parsed.message, spec.message);
    }

    #[test]
    fn root_commit_has_no_parent_lines() {
        let spec = CommitSpec {
            tree: ObjectId::from_bytes([0x33; 20]),
            parents: vec![],
            author: sig(),
            committer: sig(),
            message: "root\n".to_string(),
        };
        let payload = encode_commit(&spec);
        let text = String::from_utf8(payload).unwrap();
        assert!(!text.contains("parent "));
        assert!(text.starts_with("tree 3333333333333333333333333333333333333333\n"));
    }

    #[test]
    fn merge_commit_lists_parents_in_order() {
        let p1 = ObjectId::from_bytes([1; 20]);
        let p2 = ObjectId::from_bytes([2; 20]);
        let spec = CommitSpec {
            tree: ObjectId::from_bytes([0x44; 20]),
            parents: vec![p1, p2],
            author: sig(),
            committer: sig(),
            message: "merge\n".to_string(),
        };
        let parsed = parse_commit(&encode_commit(&spec)).unwrap();
        assert_eq!(parsed.parents, vec![p1, p2]);
    }

    #[test]
    fn write_commit_is_content_addressed() {
        let dir = tempdir().unwrap();
        let store = ObjectStore::new(dir.path());
        let spec = CommitSpec {
            tree: ObjectId::from_bytes([0x55; 20]),
            parents: vec![],
            author: sig(),
            committer: sig(),
            message: "msg\n".to_string(),
        };
        let id1 = write_commit(&store, &spec).unwrap();
        let id2 = write_commit(&store, &spec).unwrap();
        assert_eq!(id1, id2);
        let (kind, payload) = store.read(id1).unwrap();
        assert_eq!(kind, ObjectKind::Commit);
        assert_eq!(parse_commit(&payload).unwrap().message, "msg\n");
    }

    #[test]
    fn parse_rejects_missing_blank_line() {
        let err = parse_commit(b"tree 0000000000000000000000000000000000000000\nno blank line here")
            .unwrap_err();
        assert!(matches!(err, Error::Corrupt { .. }));
    }

    #[test]
    fn parse_rejects_missing_tree_line() {
        let text = format!(
            "author {}\ncommitter {}\n\nmsg\n",
            sig().encode(),
            sig().encode()
        );
        let err = parse_commit(text.as_bytes()).unwrap_err();
        assert!(matches!(err, Error::Corrupt { .. }));
    }

    #[test]
    fn signature_parse_rejects_missing_angle_brackets() {
        let err = Signature::parse("A U Thor author@example.com 1 +0000").unwrap_err();
        assert!(matches!(err, Error::Corrupt { .. }));
    }
}
