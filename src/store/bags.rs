//! Bag persistence.
//!
//! A bag is a directory holding a `description` file, a JSON `policy` file
//! and a `tiddlers/` directory kept alive by a placeholder.

use crate::model::{Bag, Policy};
use crate::storage::paths::{self, decode_name};
use crate::storage::{CommitMessage, StoreError, StoreResult};
use crate::store::Store;

impl Store {
    /// Create or update a bag. Existing tiddlers are left alone.
    ///
    /// Holds the bag's lock exclusively, so no tiddler write is in flight.
    pub fn put_bag(&self, bag: &Bag) -> StoreResult<()> {
        let dir = paths::bag_dir(&bag.name)?;
        let description = paths::bag_description(&bag.name)?;
        let policy = paths::bag_policy(&bag.name)?;
        let placeholder = paths::tiddlers_placeholder(&bag.name)?;
        let changed = [&description, &policy, &placeholder];

        let _guard = self.locks().acquire(&dir)?;
        let files = self.files();
        let existed = files.is_dir(&dir);

        let written = files
            .create_dir(&paths::tiddlers_dir(&bag.name)?)
            .and_then(|()| files.write(&description, bag.desc.as_bytes()))
            .and_then(|()| files.write(&policy, &serde_json::to_vec_pretty(&bag.policy)?))
            .and_then(|()| {
                if files.is_file(&placeholder) {
                    Ok(())
                } else {
                    files.write(&placeholder, b"")
                }
            })
            .and_then(|()| self.commit(&CommitMessage::bag_put(&bag.name), &changed));

        match written {
            Ok(commit) => {
                tracing::debug!(bag = %bag.name, commit = %commit, "bag stored");
                Ok(())
            }
            Err(e) => {
                if existed {
                    self.restore_from_head(&changed);
                } else if let Err(cleanup) = files.remove_dir(&dir) {
                    tracing::error!(bag = %bag.name, error = %cleanup, "failed to remove half-created bag");
                }
                Err(e)
            }
        }
    }

    pub fn get_bag(&self, name: &str) -> StoreResult<Bag> {
        let description = paths::bag_description(name)?;
        let desc = self
            .files()
            .read(&description)?
            .ok_or_else(|| StoreError::BagNotFound(name.to_string()))?;

        let policy_path = paths::bag_policy(name)?;
        let policy = match self.files().read(&policy_path)? {
            Some(bytes) => serde_json::from_slice::<Policy>(&bytes)
                .map_err(|e| StoreError::malformed(policy_path.as_str(), e.to_string()))?,
            None => Policy::default(),
        };

        Ok(Bag {
            name: name.to_string(),
            desc: String::from_utf8_lossy(&desc).into_owned(),
            policy,
        })
    }

    /// Remove a bag and every tiddler in it, in one commit.
    ///
    /// Waits out in-flight tiddler writes to the bag. A bag still in HEAD
    /// counts as present even if its directory is already gone, so a delete
    /// whose commit failed can be retried.
    pub fn delete_bag(&self, name: &str) -> StoreResult<()> {
        let dir = paths::bag_dir(name)?;
        let _guard = self.locks().acquire(&dir)?;

        let removed = self.files().remove_dir(&dir)?;
        if !removed && !self.repository().is_tracked(&dir)? {
            return Err(StoreError::BagNotFound(name.to_string()));
        }

        let commit = self.commit(&CommitMessage::bag_delete(name), &[&dir])?;
        tracing::debug!(bag = %name, commit = %commit, "bag deleted");
        Ok(())
    }

    /// Names of all bags, sorted by encoded name.
    pub fn list_bags(&self) -> StoreResult<Vec<String>> {
        let entries = self.files().list(&paths::bags_dir())?.unwrap_or_default();
        entries.iter().map(|entry| decode_name(entry)).collect()
    }
}

#[cfg(test)]
mod tests {
    use crate::model::{Bag, Policy, Tiddler};
    use crate::storage::paths;
    use crate::storage::StoreError;
    use crate::store::engine::tests::test_store;

    #[test]
    fn test_put_and_get_bag() {
        let (_dir, store) = test_store();
        let policy = Policy {
            owner: Some("john".to_string()),
            read: vec!["R:ADMIN".to_string()],
            manage: vec!["john".to_string()],
            ..Default::default()
        };
        let bag = Bag::new("alpha").with_desc("the first bag").with_policy(policy.clone());

        store.put_bag(&bag).unwrap();
        let loaded = store.get_bag("alpha").unwrap();

        assert_eq!(loaded, bag);
        assert!(store.root().join("bags/alpha/tiddlers/.gitkeep").is_file());
    }

    #[test]
    fn test_empty_policy_round_trips() {
        let (_dir, store) = test_store();
        store.put_bag(&Bag::new("alpha")).unwrap();

        let loaded = store.get_bag("alpha").unwrap();
        assert!(loaded.policy.is_empty());
        assert_eq!(loaded.desc, "");
    }

    #[test]
    fn test_put_bag_twice_updates() {
        let (_dir, store) = test_store();
        store.put_bag(&Bag::new("alpha").with_desc("one")).unwrap();
        store.put_bag(&Bag::new("alpha").with_desc("two")).unwrap();

        assert_eq!(store.get_bag("alpha").unwrap().desc, "two");
        assert_eq!(store.list_bags().unwrap(), vec!["alpha"]);
    }

    #[test]
    fn test_missing_bag() {
        let (_dir, store) = test_store();
        assert!(matches!(store.get_bag("nope"), Err(StoreError::BagNotFound(_))));
        assert!(matches!(store.delete_bag("nope"), Err(StoreError::BagNotFound(_))));
    }

    #[test]
    fn test_list_bags_decodes_names() {
        let (_dir, store) = test_store();
        assert!(store.list_bags().unwrap().is_empty());

        for name in ["alpha", "oh hi", "a/b"] {
            store.put_bag(&Bag::new(name)).unwrap();
        }

        let mut names = store.list_bags().unwrap();
        names.sort();
        assert_eq!(names, vec!["a/b", "alpha", "oh hi"]);
        assert_eq!(store.get_bag("a/b").unwrap().name, "a/b");
    }

    #[test]
    fn test_delete_bag_removes_tiddlers() {
        let (_dir, store) = test_store();
        store.put_bag(&Bag::new("alpha")).unwrap();
        let mut tiddler = Tiddler::new("Foo", "alpha").with_text("lorem ipsum");
        let revision = store.put_tiddler(&mut tiddler).unwrap();

        store.delete_bag("alpha").unwrap();

        assert!(store.list_bags().unwrap().is_empty());
        assert!(store.get_tiddler("alpha", "Foo").unwrap_err().is_not_found());
        assert!(matches!(
            store.list_bag_tiddlers("alpha"),
            Err(StoreError::BagNotFound(_))
        ));
        // history survives the bag
        let old = store.get_tiddler_revision("alpha", "Foo", &revision).unwrap();
        assert_eq!(old.text, b"lorem ipsum");

        let mut again = Tiddler::new("Bar", "alpha").with_text("x");
        assert!(matches!(
            store.put_tiddler(&mut again),
            Err(StoreError::BagNotFound(_))
        ));
    }

    #[test]
    fn test_failed_put_bag_leaves_no_bag() {
        let (_dir, store) = test_store();
        let index_lock = store.root().join(".git").join("index.lock");
        std::fs::write(&index_lock, b"").unwrap();
        assert!(store.put_bag(&Bag::new("alpha")).is_err());
        std::fs::remove_file(&index_lock).unwrap();

        assert!(store.list_bags().unwrap().is_empty());
        let mut tiddler = Tiddler::new("Foo", "alpha").with_text("x");
        assert!(matches!(
            store.put_tiddler(&mut tiddler),
            Err(StoreError::BagNotFound(_))
        ));
    }

    #[test]
    fn test_delete_bag_retry_after_failed_commit() {
        let (_dir, store) = test_store();
        store.put_bag(&Bag::new("alpha")).unwrap();
        let mut tiddler = Tiddler::new("Foo", "alpha").with_text("x");
        store.put_tiddler(&mut tiddler).unwrap();

        let index_lock = store.root().join(".git").join("index.lock");
        std::fs::write(&index_lock, b"").unwrap();
        assert!(store.delete_bag("alpha").is_err());
        std::fs::remove_file(&index_lock).unwrap();

        store.delete_bag("alpha").unwrap();
        let dir = paths::bag_dir("alpha").unwrap();
        assert!(!store.repository().is_tracked(&dir).unwrap());
        assert!(matches!(store.delete_bag("alpha"), Err(StoreError::BagNotFound(_))));
    }

    #[test]
    fn test_delete_bag_waits_for_tiddler_writers() {
        let (_dir, store) = test_store();
        store.put_bag(&Bag::new("alpha")).unwrap();
        let dir = paths::bag_dir("alpha").unwrap();

        let writer = store.locks().acquire_shared(&dir).unwrap();
        assert!(store.delete_bag("alpha").unwrap_err().is_retriable());
        assert!(store.get_bag("alpha").is_ok());

        drop(writer);
        store.delete_bag("alpha").unwrap();
    }

    #[test]
    fn test_bag_commit_message() {
        let (_dir, store) = test_store();
        store.put_bag(&Bag::new("alpha")).unwrap();

        let repo = store.repository();
        let head = repo.head().unwrap().unwrap();
        assert_eq!(repo.get_commit(head).unwrap().summary(), "bag put: alpha");
    }
}
