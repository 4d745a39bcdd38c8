//! User persistence: one JSON file per account.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::model::User;
use crate::storage::paths::{self, decode_name};
use crate::storage::{CommitMessage, StoreError, StoreResult};
use crate::store::Store;

#[derive(Serialize, Deserialize)]
struct UserFile {
    #[serde(default)]
    note: String,
    /// opaque digest; hashing happens above the store
    #[serde(default)]
    password: Option<String>,
    #[serde(default)]
    roles: BTreeSet<String>,
}

impl Store {
    pub fn put_user(&self, user: &User) -> StoreResult<()> {
        let path = paths::user_path(&user.usersign)?;
        let file = UserFile {
            note: user.note.clone(),
            password: user.password.clone(),
            roles: user.roles().clone(),
        };
        let bytes = serde_json::to_vec_pretty(&file)?;

        let _guard = self.locks().acquire(&path)?;
        self.files().create_dir(&paths::users_dir())?;
        self.files().write(&path, &bytes)?;
        self.commit_or_restore(&CommitMessage::user_put(&user.usersign), &[&path])?;
        Ok(())
    }

    pub fn get_user(&self, usersign: &str) -> StoreResult<User> {
        let path = paths::user_path(usersign)?;
        let bytes = self
            .files()
            .read(&path)?
            .ok_or_else(|| StoreError::UserNotFound(usersign.to_string()))?;
        let file: UserFile = serde_json::from_slice(&bytes)
            .map_err(|e| StoreError::malformed(path.as_str(), e.to_string()))?;

        let mut user = User::new(usersign).with_note(file.note);
        user.password = file.password;
        user.set_roles(file.roles);
        Ok(user)
    }

    pub fn delete_user(&self, usersign: &str) -> StoreResult<()> {
        let path = paths::user_path(usersign)?;
        let _guard = self.locks().acquire(&path)?;

        // still in HEAD means an earlier delete never got committed
        let removed = self.files().remove(&path)?;
        if !removed && !self.repository().is_tracked(&path)? {
            return Err(StoreError::UserNotFound(usersign.to_string()));
        }
        self.commit_or_restore(&CommitMessage::user_delete(usersign), &[&path])?;
        Ok(())
    }

    pub fn list_users(&self) -> StoreResult<Vec<String>> {
        let entries = self.files().list(&paths::users_dir())?.unwrap_or_default();
        entries.iter().map(|entry| decode_name(entry)).collect()
    }
}
