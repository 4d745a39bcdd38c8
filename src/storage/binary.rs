//! Binary payload separation.
//!
//! Binary tiddlers keep their payload verbatim in a side-file under
//! `tiddlers/_binaries/`. The primary file keeps the metadata and, as its
//! body, a fresh marker on every write, so the marker never reaches callers
//! and git records the primary file in the same commit as the side-file.

use std::borrow::Cow;

use ulid::Ulid;

use crate::model::Tiddler;
use crate::storage::error::{StoreError, StoreResult};
use crate::storage::files::FileStore;
use crate::storage::paths::{self, RepoPath};

/// textual types that do not start with `text/`
const PSEUDO_BINARY_TYPES: &[&str] = &[
    "application/json",
    "application/javascript",
    "application/xml",
    "image/svg+xml",
];

const MARKER_PREFIX: &str = "binary payload ";

/// Whether a content type marks a tiddler as binary.
pub fn is_binary(content_type: Option<&str>) -> bool {
    match content_type.map(str::trim) {
        None | Some("") => false,
        Some(t) => !t.starts_with("text/") && !PSEUDO_BINARY_TYPES.contains(&t),
    }
}

/// A unique marker body; never equal to any earlier marker.
fn marker() -> Vec<u8> {
    format!("{}{}", MARKER_PREFIX, Ulid::new()).into_bytes()
}

/// Result of [`BinarySplitter::split`].
#[derive(Debug)]
pub struct Split<'t> {
    /// what goes below the header in the primary file
    pub body: Cow<'t, [u8]>,
    /// side-file and the payload destined for it, if the tiddler is binary
    pub payload: Option<(RepoPath, &'t [u8])>,
}

impl Split<'_> {
    pub fn side_file(&self) -> Option<&RepoPath> {
        self.payload.as_ref().map(|(path, _)| path)
    }
}

pub struct BinarySplitter<'f> {
    files: &'f dyn FileStore,
}

impl<'f> BinarySplitter<'f> {
    pub fn new(files: &'f dyn FileStore) -> Self {
        Self { files }
    }

    /// Decide what a tiddler's primary file carries as its body. Binary
    /// tiddlers get a fresh marker and their payload is set aside for
    /// [`BinarySplitter::store`]; text tiddlers pass through untouched.
    ///
    /// Nothing is written and the tiddler is never modified, so the caller
    /// keeps its payload.
    pub fn split<'t>(&self, tiddler: &'t Tiddler) -> StoreResult<Split<'t>> {
        if !is_binary(tiddler.content_type.as_deref()) {
            return Ok(Split {
                body: Cow::Borrowed(&tiddler.text),
                payload: None,
            });
        }

        let side_file = paths::binary_path(&tiddler.bag, &tiddler.title)?;
        Ok(Split {
            body: Cow::Owned(marker()),
            payload: Some((side_file, &tiddler.text)),
        })
    }

    /// Write a split's payload verbatim to its side-file.
    pub fn store(&self, split: &Split<'_>) -> StoreResult<()> {
        if let Some((side_file, payload)) = &split.payload {
            if let Some(dir) = side_file.parent() {
                self.files.create_dir(&dir)?;
            }
            self.files.write(side_file, payload)?;
            tracing::debug!(path = %side_file, bytes = payload.len(), "wrote binary payload");
        }
        Ok(())
    }

    /// Replace a binary tiddler's marker body with its current payload.
    pub fn rehydrate(&self, tiddler: &mut Tiddler) -> StoreResult<()> {
        if !is_binary(tiddler.content_type.as_deref()) {
            return Ok(());
        }

        let side_file = paths::binary_path(&tiddler.bag, &tiddler.title)?;
        tiddler.text = self
            .files
            .read(&side_file)?
            .ok_or_else(|| StoreError::malformed(side_file.as_str(), "binary payload missing"))?;
        Ok(())
    }
}
