//! storage layer for gitstore
//!
//! Everything below the engine: how names become paths, how a tiddler is
//! framed into a file, how writers are serialized, where binary payloads go,
//! and how the working tree is committed and read back through git. The
//! engine in [`crate::store`] composes these and never touches git2 itself.
//!
//! # Architecture
//!
//! ```text
//!   paths ──► codec ──► binary ──► files        (plain file I/O)
//!                                    │
//!   lock  (serializes writers per path)
//!                                    │
//!                                    ▼
//!                             GitRepository     (commit / history / show)
//!                                    │
//!                                    ▼
//!                                  commit
//! ```

pub mod binary;
pub mod codec;
mod commit;
mod error;
pub mod files;
pub mod lock;
pub mod paths;
mod repository;
mod types;

pub use commit::{CommitInfo, CommitMessage};
pub use error::{ErrorKind, StoreError, StoreResult};
pub use files::{DiskFiles, FileStore};
pub use lock::{LockGuard, LockManager};
pub use paths::RepoPath;
pub use repository::GitRepository;
pub use types::{CommitId, GitSignature, Identity, RevisionId, ServerHost, REVISION_LEN};
