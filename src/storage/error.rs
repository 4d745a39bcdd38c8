//! Storage layer error types
//!
//! All errors that can occur during store operations are defined here.
//! Every variant falls into one of four kinds (see [`ErrorKind`]) which is
//! what callers should branch on.

use std::path::PathBuf;

use thiserror::Error;

/// Semantic classification of a [`StoreError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// the entity or revision does not exist; never retried
    NotFound,
    /// reserved or invalid name, or a malformed file on read; never retried
    Format,
    /// the per-path lock could not be acquired in time; safe to retry later
    LockContention,
    /// version control or filesystem failure, cause attached
    Backend,
}

/// the main error type for store operations
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("bag not found: {0}")]
    BagNotFound(String),

    #[error("recipe not found: {0}")]
    RecipeNotFound(String),

    #[error("user not found: {0}")]
    UserNotFound(String),

    #[error("tiddler not found: {bag}/{title}")]
    TiddlerNotFound { bag: String, title: String },

    #[error("revision {revision} not found for {bag}/{title}")]
    RevisionNotFound {
        bag: String,
        title: String,
        revision: String,
    },

    /// the path has never been committed
    #[error("no history for path: {0}")]
    NoHistory(String),

    /// the path does not exist in the given commit, or the commit is unknown
    #[error("{path} not present at revision {revision}")]
    NotInRevision { path: String, revision: String },

    #[error("invalid name {name:?}: {reason}")]
    InvalidName { name: String, reason: String },

    #[error("'{0}' is a reserved name")]
    ReservedName(String),

    #[error("malformed file {path}: {reason}")]
    Malformed { path: String, reason: String },

    #[error("could not lock {path} after {attempts} attempts")]
    LockContention { path: PathBuf, attempts: u32 },

    /// error from the underlying Git library
    #[error("git error: {0}")]
    Git(#[from] git2::Error),

    /// I/O error (filesystem level)
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization or deserialization failed
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// internal error that shouldn't happen
    #[error("internal error: {0}")]
    Internal(String),
}

impl StoreError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            StoreError::BagNotFound(_)
            | StoreError::RecipeNotFound(_)
            | StoreError::UserNotFound(_)
            | StoreError::TiddlerNotFound { .. }
            | StoreError::RevisionNotFound { .. }
            | StoreError::NoHistory(_)
            | StoreError::NotInRevision { .. } => ErrorKind::NotFound,
            StoreError::InvalidName { .. }
            | StoreError::ReservedName(_)
            | StoreError::Malformed { .. } => ErrorKind::Format,
            StoreError::LockContention { .. } => ErrorKind::LockContention,
            StoreError::Git(_)
            | StoreError::Io(_)
            | StoreError::Serialization(_)
            | StoreError::Internal(_) => ErrorKind::Backend,
        }
    }

    /// check if this error indicates the resource doesn't exist
    pub fn is_not_found(&self) -> bool {
        self.kind() == ErrorKind::NotFound
    }

    pub fn is_format_error(&self) -> bool {
        self.kind() == ErrorKind::Format
    }

    /// check if this error is recoverable by retry
    pub fn is_retriable(&self) -> bool {
        self.kind() == ErrorKind::LockContention
    }

    pub(crate) fn invalid_name(name: &str, reason: impl Into<String>) -> Self {
        StoreError::InvalidName {
            name: name.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn malformed(path: &str, reason: impl Into<String>) -> Self {
        StoreError::Malformed {
            path: path.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn tiddler_not_found(bag: &str, title: &str) -> Self {
        StoreError::TiddlerNotFound {
            bag: bag.to_string(),
            title: title.to_string(),
        }
    }
}

/// result type alias for store operations
pub type StoreResult<T> = Result<T, StoreError>;
