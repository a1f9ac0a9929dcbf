//! A narrow reader for the INI-like `<gitdir>/config` file.
//!
//! Only the one key this core's collaborators need — `remote.<name>.url` —
//! is exposed. The full git config grammar (includes, conditional sections,
//! multi-valued keys) is out of scope; this is a line-oriented subset
//! parser, not a general INI implementation.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::Error;

/// Read-only access to a repository's `config` file, scoped to the single
/// key this core consumes.
#[derive(Debug, Clone)]
pub struct Config {
    path: PathBuf,
}

impl Config {
    /// Open the config file at `gitdir/config`. Does not read it yet.
    #[must_use]
    pub fn new(gitdir: &Path) -> Self {
        Self {
            path: gitdir.join("config"),
        }
    }

    /// Look up `remote.<name>.url`. Returns `Ok(None)` if the config file or
    /// the section/key is absent.
    pub fn remote_url(&self, name: &str) -> Result<Option<String>, Error> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(Error::Io(e)),
        };

        let wanted_section = format!("remote \"{name}\"");
        let mut in_wanted_section = false;

        for raw_line in content.lines() {
            let line = raw_line.trim();
            if line.is_empty() || line.starts_with(';') || line.starts_with('#') {
                continue;
            }
            if let Some(section) = line.strip_prefix('[').and_then(|s| s.strip_suffix(']')) {
                in_wanted_section = section.trim() == wanted_section;
                continue;
            }
            if !in_wanted_section {
                continue;
            }
            if let Some((key, value)) = line.split_once('=') {
                if key.trim() == "url" {
                    return Ok(Some(value.trim().to_string()));
                }
            }
        }

        Ok(None)
    }
}
