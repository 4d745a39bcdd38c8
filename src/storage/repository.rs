//! Core git repository wrapper.
//!
//! The store's working tree *is* the repository's working tree: the engine
//! writes plain files, then asks [`GitRepository::commit`] to stage exactly
//! the paths it touched and record them as one commit. Reads of past
//! revisions go through [`GitRepository::show`].
//!
//! `git2::Repository` is `Send` but not `Sync`, so access is serialized
//! behind a mutex. Clone this to share across threads.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use git2::{ErrorCode, Repository};
use parking_lot::Mutex;

use crate::storage::commit::{self, CommitBuilder, CommitInfo};
use crate::storage::error::{StoreError, StoreResult};
use crate::storage::paths::RepoPath;
use crate::storage::types::{CommitId, GitSignature, RevisionId};

#[derive(Clone)]
pub struct GitRepository {
    inner: Arc<GitRepositoryInner>,
}

struct GitRepositoryInner {
    repo: Mutex<Repository>,
    path: PathBuf,
    git_dir: PathBuf,
}

impl GitRepository {
    /// Open an existing repository.
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref();
        let repo = Repository::open(path)?;
        Ok(Self::wrap(repo, path))
    }

    /// Initialize a new repository with an empty first commit, so later
    /// commits always have a parent.
    pub fn init(path: impl AsRef<Path>, signature: &GitSignature) -> StoreResult<Self> {
        let path = path.as_ref();
        let repo = Repository::init(path)?;
        let commit_id = commit::create_initial_commit(&repo, signature)?;
        tracing::info!(path = %path.display(), commit = %commit_id, "initialized repository");
        Ok(Self::wrap(repo, path))
    }

    /// Open or initialize a repository.
    pub fn open_or_init(path: impl AsRef<Path>, signature: &GitSignature) -> StoreResult<Self> {
        let path = path.as_ref();
        if path.join(".git").exists() {
            Self::open(path)
        } else {
            Self::init(path, signature)
        }
    }

    fn wrap(repo: Repository, path: &Path) -> Self {
        let git_dir = repo.path().to_path_buf();
        Self {
            inner: Arc::new(GitRepositoryInner {
                repo: Mutex::new(repo),
                path: path.to_path_buf(),
                git_dir,
            }),
        }
    }

    /// the working tree root
    pub fn path(&self) -> &Path {
        &self.inner.path
    }

    /// the `.git` directory; never part of the working tree
    pub fn git_dir(&self) -> &Path {
        &self.inner.git_dir
    }

    /// Execute a function with exclusive access to the repository.
    pub fn with_repo<F, T>(&self, f: F) -> StoreResult<T>
    where
        F: FnOnce(&Repository) -> StoreResult<T>,
    {
        let repo = self.inner.repo.lock();
        f(&repo)
    }

    /// Get the current HEAD commit.
    pub fn head(&self) -> StoreResult<Option<CommitId>> {
        self.with_repo(commit::head_commit)
    }

    /// Get information about a commit.
    pub fn get_commit(&self, id: CommitId) -> StoreResult<CommitInfo> {
        self.with_repo(|repo| commit::get_commit(repo, id))
    }

    /// Stage `paths` as they are on disk and commit them, and nothing else.
    ///
    /// A path that is a file is added; anything else (removed file, removed
    /// directory) is dropped from the index along with everything below it.
    /// If any step fails the index is put back to HEAD so no half-staged
    /// change leaks into a later commit.
    pub fn commit(
        &self,
        message: &str,
        paths: &[&RepoPath],
        author: &GitSignature,
        committer: &GitSignature,
    ) -> StoreResult<CommitId> {
        self.with_repo(|repo| {
            let result = stage_and_commit(repo, &self.inner.path, message, paths, author, committer);
            if result.is_err() {
                if let Err(e) = reset_index(repo) {
                    tracing::error!(error = %e, "failed to restore index after aborted commit");
                }
            }
            result
        })
    }

    /// Commits that wrote `path`, newest first.
    pub fn history(&self, path: &RepoPath) -> StoreResult<Vec<CommitId>> {
        self.with_repo(|repo| match commit::head_commit(repo)? {
            Some(head) => commit::path_history(repo, head, path.as_path()),
            None => Ok(Vec::new()),
        })
    }

    /// The newest commit that wrote `path`.
    pub fn last_commit(&self, path: &RepoPath) -> StoreResult<CommitId> {
        self.history(path)?
            .into_iter()
            .next()
            .ok_or_else(|| StoreError::NoHistory(path.to_string()))
    }

    /// Content of `path` as committed at HEAD, `None` if HEAD has no such file.
    ///
    /// This is the last state the store vouches for; the working tree may
    /// be ahead of it after a failed commit.
    pub fn read_head(&self, path: &RepoPath) -> StoreResult<Option<Vec<u8>>> {
        self.with_repo(|repo| match commit::head_commit(repo)? {
            Some(head) => commit::read_path_at(repo, head, path.as_path()),
            None => Ok(None),
        })
    }

    /// Whether HEAD has anything (file or directory) at `path`.
    pub fn is_tracked(&self, path: &RepoPath) -> StoreResult<bool> {
        self.with_repo(|repo| match commit::head_commit(repo)? {
            Some(head) => commit::exists_at(repo, head, path.as_path()),
            None => Ok(false),
        })
    }

    /// Resolve an abbreviated or full revision to a commit.
    pub fn resolve(&self, revision: &RevisionId) -> StoreResult<CommitId> {
        let not_found = || StoreError::NotInRevision {
            path: String::new(),
            revision: revision.to_string(),
        };
        if !revision.is_well_formed() {
            return Err(not_found());
        }
        self.with_repo(|repo| match repo.find_commit_by_prefix(revision.as_str()) {
            Ok(found) => Ok(CommitId::new(found.id())),
            Err(e) if matches!(e.code(), ErrorCode::NotFound | ErrorCode::Ambiguous | ErrorCode::InvalidSpec) => {
                Err(not_found())
            }
            Err(e) => Err(StoreError::Git(e)),
        })
    }

    /// Content of `path` as of `revision`.
    pub fn show(&self, revision: &RevisionId, path: &RepoPath) -> StoreResult<Vec<u8>> {
        let not_found = || StoreError::NotInRevision {
            path: path.to_string(),
            revision: revision.to_string(),
        };
        let commit_id = self.resolve(revision).map_err(|e| match e {
            StoreError::NotInRevision { .. } => not_found(),
            other => other,
        })?;
        self.with_repo(|repo| commit::read_path_at(repo, commit_id, path.as_path()))?
            .ok_or_else(not_found)
    }
}

fn stage_and_commit(
    repo: &Repository,
    workdir: &Path,
    message: &str,
    paths: &[&RepoPath],
    author: &GitSignature,
    committer: &GitSignature,
) -> StoreResult<CommitId> {
    let mut index = repo.index()?;
    for path in paths {
        if path.under(workdir).is_file() {
            index.add_path(path.as_path())?;
        } else {
            index.remove_path(path.as_path())?;
            index.remove_dir(path.as_path(), 0)?;
        }
    }
    index.write()?;
    let tree_id = index.write_tree()?;

    let mut builder = CommitBuilder::new(repo)
        .tree(tree_id)
        .message(message)
        .author(author.clone())
        .committer(committer.clone())
        .update_ref("HEAD");
    if let Some(parent) = commit::head_commit(repo)? {
        builder = builder.parent(parent);
    }
    let commit_id = builder.commit()?;

    tracing::debug!(commit = %commit_id, summary = message, paths = paths.len(), "committed");
    Ok(commit_id)
}

/// put the index back to the HEAD tree
fn reset_index(repo: &Repository) -> StoreResult<()> {
    let mut index = repo.index()?;
    match commit::head_commit(repo)? {
        Some(head) => index.read_tree(&repo.find_commit(head.raw())?.tree()?)?,
        None => index.clear()?,
    }
    index.write()?;
    Ok(())
}
