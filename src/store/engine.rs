//! The store handle and the plumbing shared by every entity kind.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use crate::storage::files::{DiskFiles, FileStore};
use crate::storage::lock::LockManager;
use crate::storage::paths::{self, RepoPath};
use crate::storage::{CommitId, GitRepository, GitSignature, Identity, StoreError, StoreResult};
use crate::store::config::StoreConfig;

/// directory under the git metadata dir holding lock markers
const LOCK_DIR: &str = "gitstore-locks";

/// A git-backed store of bags, recipes, users and tiddlers.
///
/// Cheap to clone; clones share the repository handle and lock manager.
/// Each handle carries the [`Identity`] its commits are attributed to,
/// see [`Store::for_identity`].
#[derive(Clone)]
pub struct Store {
    inner: Arc<StoreInner>,
    identity: Identity,
}

struct StoreInner {
    config: StoreConfig,
    repo: GitRepository,
    files: Box<dyn FileStore>,
    locks: LockManager,
}

impl Store {
    /// Open the store at `root`, initializing it if needed.
    pub fn open(root: impl AsRef<Path>) -> StoreResult<Self> {
        Self::open_with_config(StoreConfig::new(root.as_ref()))
    }

    /// Open or initialize a store with custom configuration.
    pub fn open_with_config(config: StoreConfig) -> StoreResult<Self> {
        let files = DiskFiles::new(&config.root);
        Self::with_files(config, files)
    }

    /// Open a store over an alternate [`FileStore`].
    ///
    /// `files.root()` must be the same directory as `config.root`, since git
    /// stages whatever the file store wrote there.
    pub fn with_files(config: StoreConfig, files: impl FileStore + 'static) -> StoreResult<Self> {
        if files.root() != config.root.as_path() {
            return Err(StoreError::Internal(format!(
                "file store root {} differs from store root {}",
                files.root().display(),
                config.root.display()
            )));
        }
        std::fs::create_dir_all(&config.root)?;

        let service = GitSignature::at_host(&config.service_name, &config.host);
        let repo = GitRepository::open_or_init(&config.root, &service)?;
        for dir in [paths::bags_dir(), paths::recipes_dir(), paths::users_dir()] {
            files.create_dir(&dir)?;
        }

        let locks = LockManager::new(repo.git_dir().join(LOCK_DIR))
            .with_attempts(config.lock_attempts)
            .with_backoff(Duration::from_millis(config.lock_backoff_ms));
        let identity = Identity::guest(config.host.clone());

        tracing::debug!(root = %config.root.display(), "store opened");

        Ok(Self {
            inner: Arc::new(StoreInner {
                config,
                repo,
                files: Box::new(files),
                locks,
            }),
            identity,
        })
    }

    /// A handle whose commits are attributed to `identity`.
    pub fn for_identity(&self, identity: Identity) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            identity,
        }
    }

    /// Shorthand for [`Store::for_identity`] at the configured host.
    pub fn as_user(&self, usersign: impl Into<String>) -> Self {
        self.for_identity(Identity::new(usersign, self.inner.config.host.clone()))
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn config(&self) -> &StoreConfig {
        &self.inner.config
    }

    pub fn root(&self) -> &Path {
        &self.inner.config.root
    }

    /// the underlying repository, for history inspection
    pub fn repository(&self) -> &GitRepository {
        &self.inner.repo
    }

    pub(crate) fn files(&self) -> &dyn FileStore {
        self.inner.files.as_ref()
    }

    pub(crate) fn locks(&self) -> &LockManager {
        &self.inner.locks
    }

    /// Commit `paths` attributed to this handle's identity.
    pub(crate) fn commit(&self, message: &str, paths: &[&RepoPath]) -> StoreResult<CommitId> {
        let author = self.identity.author();
        let committer = self.identity.committer(&self.inner.config.service_name);
        self.inner.repo.commit(message, paths, &author, &committer)
    }

    /// [`Store::commit`], putting `paths` back to their HEAD state if the
    /// commit fails so the working tree never serves uncommitted content.
    pub(crate) fn commit_or_restore(&self, message: &str, paths: &[&RepoPath]) -> StoreResult<CommitId> {
        self.commit(message, paths).map_err(|err| {
            self.restore_from_head(paths);
            err
        })
    }

    /// Rewrite (or remove) each file in `paths` to match HEAD.
    pub(crate) fn restore_from_head(&self, paths: &[&RepoPath]) {
        for path in paths {
            if let Err(e) = self.restore_one(path) {
                tracing::error!(path = %path, error = %e, "failed to restore file from HEAD");
            }
        }
    }

    fn restore_one(&self, path: &RepoPath) -> StoreResult<()> {
        match self.inner.repo.read_head(path)? {
            Some(bytes) => {
                if let Some(dir) = path.parent() {
                    self.files().create_dir(&dir)?;
                }
                self.files().write(path, &bytes)
            }
            None => self.files().remove(path).map(drop),
        }
    }
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store")
            .field("root", &self.inner.config.root)
            .field("identity", &self.identity)
            .finish()
    }
}
