//! Plain file primitives the engine builds on.
//!
//! [`FileStore`] is the capability the store needs from its backing
//! directory: read, write, remove and list by [`RepoPath`]. [`DiskFiles`]
//! implements it on the local filesystem.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;

use crate::storage::error::StoreResult;
use crate::storage::paths::RepoPath;

pub trait FileStore: Send + Sync {
    /// directory all paths are relative to
    fn root(&self) -> &Path;

    /// Read a file. `None` if it does not exist.
    fn read(&self, path: &RepoPath) -> StoreResult<Option<Vec<u8>>>;

    /// Replace a file's content. The parent directory must already exist,
    /// so a write never resurrects a removed bag.
    fn write(&self, path: &RepoPath, bytes: &[u8]) -> StoreResult<()>;

    /// Remove a file. Returns whether it existed.
    fn remove(&self, path: &RepoPath) -> StoreResult<bool>;

    /// Remove a directory and everything below it. Returns whether it existed.
    fn remove_dir(&self, path: &RepoPath) -> StoreResult<bool>;

    /// Create a directory (and parents). Existing directories are fine.
    fn create_dir(&self, path: &RepoPath) -> StoreResult<()>;

    fn is_file(&self, path: &RepoPath) -> bool;

    fn is_dir(&self, path: &RepoPath) -> bool;

    /// Names of the immediate entries of a directory, sorted, skipping
    /// dot-files. `None` if the directory does not exist.
    fn list(&self, path: &RepoPath) -> StoreResult<Option<Vec<String>>>;
}

/// [`FileStore`] over a directory on the local filesystem.
#[derive(Debug, Clone)]
pub struct DiskFiles {
    root: PathBuf,
}

impl DiskFiles {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn full(&self, path: &RepoPath) -> PathBuf {
        path.under(&self.root)
    }
}

impl FileStore for DiskFiles {
    fn root(&self) -> &Path {
        &self.root
    }

    fn read(&self, path: &RepoPath) -> StoreResult<Option<Vec<u8>>> {
        match fs::read(self.full(path)) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn write(&self, path: &RepoPath, bytes: &[u8]) -> StoreResult<()> {
        let full = self.full(path);
        let dir = full.parent().unwrap_or(&self.root);

        // write-then-rename so readers never see a half-written file
        let mut temp = NamedTempFile::new_in(dir)?;
        temp.write_all(bytes)?;
        temp.persist(&full).map_err(|err| err.error)?;
        Ok(())
    }

    fn remove(&self, path: &RepoPath) -> StoreResult<bool> {
        match fs::remove_file(self.full(path)) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    fn remove_dir(&self, path: &RepoPath) -> StoreResult<bool> {
        match fs::remove_dir_all(self.full(path)) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    fn create_dir(&self, path: &RepoPath) -> StoreResult<()> {
        match fs::create_dir_all(self.full(path)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn is_file(&self, path: &RepoPath) -> bool {
        self.full(path).is_file()
    }

    fn is_dir(&self, path: &RepoPath) -> bool {
        self.full(path).is_dir()
    }

    fn list(&self, path: &RepoPath) -> StoreResult<Option<Vec<String>>> {
        let entries = match fs::read_dir(self.full(path)) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let mut names = Vec::new();
        for entry in entries {
            let name = entry?.file_name().to_string_lossy().into_owned();
            if !name.starts_with('.') {
                names.push(name);
            }
        }
        names.sort();
        Ok(Some(names))
    }
}
