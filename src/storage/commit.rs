//! Commit creation and per-path history traversal
//!
//! every store mutation becomes exactly one commit. This module builds
//! those commits and answers the two history questions the store asks:
//! which commits wrote a given path, and what a path contained at a commit.

use std::path::Path;

use chrono::{DateTime, TimeZone, Utc};
use git2::{ObjectType, Oid, Repository, Sort, Tree};

use crate::storage::error::{StoreError, StoreResult};
use crate::storage::types::{CommitId, GitSignature};

/// information about a commit
#[derive(Debug, Clone)]
pub struct CommitInfo {
    pub id: CommitId,
    pub parent_ids: Vec<CommitId>,
    pub message: String,
    pub author: GitSignature,
    pub committer: GitSignature,
    pub timestamp: DateTime<Utc>,
}

impl CommitInfo {
    /// create CommitInfo from a git2::Commit
    pub(crate) fn from_git2(commit: &git2::Commit<'_>) -> Self {
        let time = commit.time();
        let timestamp = Utc
            .timestamp_opt(time.seconds(), 0)
            .single()
            .unwrap_or_else(Utc::now);

        Self {
            id: CommitId::new(commit.id()),
            parent_ids: commit.parent_ids().map(CommitId::new).collect(),
            message: commit.message().unwrap_or("").to_string(),
            author: signature_of(&commit.author()),
            committer: signature_of(&commit.committer()),
            timestamp,
        }
    }

    /// get a short summary of the commit (first line of message)
    pub fn summary(&self) -> &str {
        self.message.lines().next().unwrap_or(&self.message)
    }
}

fn signature_of(sig: &git2::Signature<'_>) -> GitSignature {
    GitSignature::new(
        sig.name().unwrap_or("Unknown"),
        sig.email().unwrap_or("unknown@unknown"),
    )
}

/// builder for creating commits with a fluent interface
pub struct CommitBuilder<'a> {
    repo: &'a Repository,
    tree_id: Option<Oid>,
    parents: Vec<CommitId>,
    message: String,
    author: Option<GitSignature>,
    committer: Option<GitSignature>,
    update_ref: Option<String>,
}

impl<'a> CommitBuilder<'a> {
    pub fn new(repo: &'a Repository) -> Self {
        Self {
            repo,
            tree_id: None,
            parents: Vec::new(),
            message: String::new(),
            author: None,
            committer: None,
            update_ref: None,
        }
    }

    /// set the tree for this commit
    pub fn tree(mut self, tree_id: Oid) -> Self {
        self.tree_id = Some(tree_id);
        self
    }

    /// add a parent commit
    pub fn parent(mut self, parent: CommitId) -> Self {
        self.parents.push(parent);
        self
    }

    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    pub fn author(mut self, author: GitSignature) -> Self {
        self.author = Some(author);
        self
    }

    /// defaults to the author when unset
    pub fn committer(mut self, committer: GitSignature) -> Self {
        self.committer = Some(committer);
        self
    }

    /// update a ref (branch) to point to this commit
    pub fn update_ref(mut self, refname: impl Into<String>) -> Self {
        self.update_ref = Some(refname.into());
        self
    }

    /// create the commit and return its ID
    pub fn commit(self) -> StoreResult<CommitId> {
        let tree_id = self
            .tree_id
            .ok_or_else(|| StoreError::Internal("commit requires a tree".to_string()))?;
        let author = self
            .author
            .ok_or_else(|| StoreError::Internal("commit requires an author".to_string()))?;
        let committer = self.committer.unwrap_or_else(|| author.clone());

        let tree = self.repo.find_tree(tree_id)?;
        let author_sig = author.to_git2_signature()?;
        let committer_sig = committer.to_git2_signature()?;

        let parent_commits: Vec<git2::Commit<'_>> = self
            .parents
            .iter()
            .map(|id| self.repo.find_commit(id.raw()))
            .collect::<Result<_, _>>()?;
        let parent_refs: Vec<&git2::Commit<'_>> = parent_commits.iter().collect();

        let oid = self.repo.commit(
            self.update_ref.as_deref(),
            &author_sig,
            &committer_sig,
            &self.message,
            &tree,
            &parent_refs,
        )?;

        Ok(CommitId::new(oid))
    }
}

/// get information about a commit
pub fn get_commit(repo: &Repository, id: CommitId) -> StoreResult<CommitInfo> {
    let commit = repo
        .find_commit(id.raw())
        .map_err(|_| StoreError::NotInRevision {
            path: String::new(),
            revision: id.to_string(),
        })?;

    Ok(CommitInfo::from_git2(&commit))
}

/// the current tip, if any commit exists yet
pub fn head_commit(repo: &Repository) -> StoreResult<Option<CommitId>> {
    match repo.head() {
        Ok(head) => Ok(Some(CommitId::new(head.peel_to_commit()?.id()))),
        Err(e) if matches!(e.code(), git2::ErrorCode::UnbornBranch | git2::ErrorCode::NotFound) => {
            Ok(None)
        }
        Err(e) => Err(StoreError::Git(e)),
    }
}

/// create the initial (empty) commit for a new repository
pub fn create_initial_commit(repo: &Repository, signature: &GitSignature) -> StoreResult<CommitId> {
    let tree_id = repo.treebuilder(None)?.write()?;

    CommitBuilder::new(repo)
        .tree(tree_id)
        .message("initialize store")
        .author(signature.clone())
        .update_ref("HEAD")
        .commit()
}

/// blob id of `path` in `tree`, if it is a file there
fn blob_id_at(tree: &Tree<'_>, path: &Path) -> Option<Oid> {
    tree.get_path(path)
        .ok()
        .filter(|entry| entry.kind() == Some(ObjectType::Blob))
        .map(|entry| entry.id())
}

/// Commits that wrote `path`, newest first.
///
/// A commit counts when `path` is a file in its tree and differs from its
/// first parent's version. Commits that remove the path are not included.
pub fn path_history(repo: &Repository, start: CommitId, path: &Path) -> StoreResult<Vec<CommitId>> {
    let mut revwalk = repo.revwalk()?;
    revwalk.push(start.raw())?;
    revwalk.set_sorting(Sort::TOPOLOGICAL | Sort::TIME)?;

    let mut ids = Vec::new();
    for oid in revwalk {
        let commit = repo.find_commit(oid?)?;
        let Some(current) = blob_id_at(&commit.tree()?, path) else {
            continue;
        };
        let previous = match commit.parent(0) {
            Ok(parent) => blob_id_at(&parent.tree()?, path),
            Err(_) => None,
        };
        if previous != Some(current) {
            ids.push(CommitId::new(commit.id()));
        }
    }

    Ok(ids)
}

/// content of `path` as of `commit`, if it was a file there
pub fn read_path_at(repo: &Repository, commit: CommitId, path: &Path) -> StoreResult<Option<Vec<u8>>> {
    let commit = repo.find_commit(commit.raw())?;
    match blob_id_at(&commit.tree()?, path) {
        Some(blob_id) => Ok(Some(repo.find_blob(blob_id)?.content().to_vec())),
        None => Ok(None),
    }
}

/// whether `path` names anything in `commit`'s tree
pub fn exists_at(repo: &Repository, commit: CommitId, path: &Path) -> StoreResult<bool> {
    let commit = repo.find_commit(commit.raw())?;
    let exists = commit.tree()?.get_path(path).is_ok();
    Ok(exists)
}

/// message formatting for store operations
pub struct CommitMessage;

impl CommitMessage {
    pub fn bag_put(bag: &str) -> String {
        format!("bag put: {}", bag)
    }

    pub fn bag_delete(bag: &str) -> String {
        format!("bag delete: {}", bag)
    }

    pub fn recipe_put(recipe: &str) -> String {
        format!("recipe put: {}", recipe)
    }

    pub fn recipe_delete(recipe: &str) -> String {
        format!("recipe delete: {}", recipe)
    }

    pub fn user_put(usersign: &str) -> String {
        format!("user put: {}", usersign)
    }

    pub fn user_delete(usersign: &str) -> String {
        format!("user delete: {}", usersign)
    }

    pub fn tiddler_put(bag: &str, title: &str) -> String {
        format!("tiddler put: {}/{}", bag, title)
    }

    pub fn tiddler_delete(bag: &str, title: &str) -> String {
        format!("tiddler delete: {}/{}", bag, title)
    }
}
