//! Mapping from logical entities to paths under the store root.
//!
//! ```text
//! bags/<bag>/description
//! bags/<bag>/policy
//! bags/<bag>/tiddlers/.gitkeep
//! bags/<bag>/tiddlers/<title>
//! bags/<bag>/tiddlers/_binaries/<title>
//! recipes/<recipe>
//! users/<usersign>
//! ```
//!
//! Every name segment is percent-encoded so that any name maps to a single
//! safe path component, and decoding restores it exactly. Nothing here
//! touches the filesystem.

use std::fmt;
use std::path::{Path, PathBuf};

use crate::storage::error::{StoreError, StoreResult};

pub const BAGS_DIR: &str = "bags";
pub const RECIPES_DIR: &str = "recipes";
pub const USERS_DIR: &str = "users";
pub const TIDDLERS_DIR: &str = "tiddlers";
/// holds binary payloads next to the tiddler files; not a legal title
pub const BINARIES_DIR: &str = "_binaries";
/// keeps an empty tiddlers directory tracked by git
pub const PLACEHOLDER: &str = ".gitkeep";

const DESCRIPTION_FILE: &str = "description";
const POLICY_FILE: &str = "policy";

/// A `/`-separated path relative to the store root.
///
/// This is the form git wants for staging and tree lookups.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RepoPath(String);

impl RepoPath {
    fn new(path: impl Into<String>) -> Self {
        Self(path.into())
    }

    fn join(&self, segment: &str) -> Self {
        Self(format!("{}/{}", self.0, segment))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn as_path(&self) -> &Path {
        Path::new(&self.0)
    }

    /// the containing directory, `None` at the top level
    pub fn parent(&self) -> Option<RepoPath> {
        self.0.rsplit_once('/').map(|(dir, _)| Self::new(dir))
    }

    /// absolute location under `root`
    pub fn under(&self, root: &Path) -> PathBuf {
        self.0.split('/').fold(root.to_path_buf(), |acc, seg| acc.join(seg))
    }
}

impl fmt::Display for RepoPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for RepoPath {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

fn is_unreserved(b: u8) -> bool {
    b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b'.' | b'~')
}

/// Percent-encode a name into a single path segment.
///
/// A leading `.` is always encoded, which keeps `.`, `..`, `.gitkeep` and
/// friends from ever naming a real entry.
pub fn encode_name(name: &str) -> StoreResult<String> {
    if name.is_empty() {
        return Err(StoreError::invalid_name(name, "name cannot be empty"));
    }

    let mut out = String::with_capacity(name.len());
    for (i, &b) in name.as_bytes().iter().enumerate() {
        if is_unreserved(b) && !(i == 0 && b == b'.') {
            out.push(b as char);
        } else {
            out.push_str(&format!("%{:02X}", b));
        }
    }
    Ok(out)
}

/// Invert [`encode_name`].
pub fn decode_name(encoded: &str) -> StoreResult<String> {
    let bytes = encoded.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let hex = encoded
                .get(i + 1..i + 3)
                .ok_or_else(|| StoreError::invalid_name(encoded, "truncated escape"))?;
            let byte = u8::from_str_radix(hex, 16)
                .map_err(|_| StoreError::invalid_name(encoded, "bad escape"))?;
            out.push(byte);
            i += 3;
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }
    String::from_utf8(out).map_err(|_| StoreError::invalid_name(encoded, "not utf-8"))
}

pub fn bags_dir() -> RepoPath {
    RepoPath::new(BAGS_DIR)
}

pub fn recipes_dir() -> RepoPath {
    RepoPath::new(RECIPES_DIR)
}

pub fn users_dir() -> RepoPath {
    RepoPath::new(USERS_DIR)
}

pub fn bag_dir(bag: &str) -> StoreResult<RepoPath> {
    Ok(bags_dir().join(&encode_name(bag)?))
}

pub fn bag_description(bag: &str) -> StoreResult<RepoPath> {
    Ok(bag_dir(bag)?.join(DESCRIPTION_FILE))
}

pub fn bag_policy(bag: &str) -> StoreResult<RepoPath> {
    Ok(bag_dir(bag)?.join(POLICY_FILE))
}

pub fn tiddlers_dir(bag: &str) -> StoreResult<RepoPath> {
    Ok(bag_dir(bag)?.join(TIDDLERS_DIR))
}

pub fn tiddlers_placeholder(bag: &str) -> StoreResult<RepoPath> {
    Ok(tiddlers_dir(bag)?.join(PLACEHOLDER))
}

pub fn binaries_dir(bag: &str) -> StoreResult<RepoPath> {
    Ok(tiddlers_dir(bag)?.join(BINARIES_DIR))
}

/// Reject titles that would collide with the binaries directory.
pub fn check_title(title: &str) -> StoreResult<()> {
    if title == BINARIES_DIR {
        return Err(StoreError::ReservedName(title.to_string()));
    }
    if title.is_empty() {
        return Err(StoreError::invalid_name(title, "title cannot be empty"));
    }
    Ok(())
}

/// the primary file of a tiddler
pub fn tiddler_path(bag: &str, title: &str) -> StoreResult<RepoPath> {
    check_title(title)?;
    Ok(tiddlers_dir(bag)?.join(&encode_name(title)?))
}

/// the side-file holding a binary tiddler's payload
pub fn binary_path(bag: &str, title: &str) -> StoreResult<RepoPath> {
    check_title(title)?;
    Ok(binaries_dir(bag)?.join(&encode_name(title)?))
}

pub fn recipe_path(recipe: &str) -> StoreResult<RepoPath> {
    Ok(recipes_dir().join(&encode_name(recipe)?))
}

pub fn user_path(usersign: &str) -> StoreResult<RepoPath> {
    Ok(users_dir().join(&encode_name(usersign)?))
}

/// Whether a directory entry inside a tiddlers directory names a tiddler.
///
/// Encoded names never start with `.`, so dot-files (the placeholder,
/// in-flight temporary files) are never tiddlers.
pub fn is_tiddler_entry(entry: &str) -> bool {
    entry != BINARIES_DIR && !entry.starts_with('.')
}
