//! Tiddler lifecycle: put, get (latest or pinned), delete, listing and
//! revision history.
//!
//! Writers hold the bag's lock shared and the tiddler's primary file lock
//! exclusively, so a bag cannot be deleted under a tiddler write. A put
//! takes provenance from HEAD, encodes before touching disk, then writes
//! the side-file (if binary) and the primary file and commits both
//! together. A failed commit puts the files back the way HEAD has them.

use chrono::Utc;

use crate::model::Tiddler;
use crate::storage::binary::{is_binary, BinarySplitter};
use crate::storage::codec::{decode_tiddler, encode_tiddler};
use crate::storage::paths::{self, decode_name, is_tiddler_entry, RepoPath};
use crate::storage::{CommitMessage, RevisionId, StoreError, StoreResult};
use crate::store::Store;

/// `YYYYMMDDHHMMSS` in UTC
fn timestamp_now() -> String {
    Utc::now().format("%Y%m%d%H%M%S").to_string()
}

impl Store {
    /// Store a new revision of `tiddler` and return its revision id.
    ///
    /// Every put is a new revision, even when nothing changed. Any revision
    /// already on `tiddler` is discarded. `creator` and `created` are taken
    /// from the committed revision if there is one, and from
    /// `modifier`/`modified` otherwise. An empty `modifier` defaults to the
    /// handle's user and an empty `modified` to now. On success `tiddler`
    /// carries the new revision; its text is never altered.
    pub fn put_tiddler(&self, tiddler: &mut Tiddler) -> StoreResult<RevisionId> {
        let primary = paths::tiddler_path(&tiddler.bag, &tiddler.title)?;
        let side = paths::binary_path(&tiddler.bag, &tiddler.title)?;

        let _bag_guard = self.locks().acquire_shared(&paths::bag_dir(&tiddler.bag)?)?;
        if !self.files().is_dir(&paths::tiddlers_dir(&tiddler.bag)?) {
            return Err(StoreError::BagNotFound(tiddler.bag.clone()));
        }
        let _guard = self.locks().acquire(&primary)?;

        tiddler.revision = None;
        if tiddler.modifier.is_empty() {
            tiddler.modifier = self.identity().usersign.clone();
        }
        if tiddler.modified.is_empty() {
            tiddler.modified = timestamp_now();
        }

        match self.repository().read_head(&primary)? {
            Some(bytes) => {
                let prior = decode_tiddler(&bytes, &tiddler.bag, &tiddler.title, primary.as_str())?;
                tiddler.creator = prior.creator;
                tiddler.created = prior.created;
            }
            None => {
                tiddler.creator = tiddler.modifier.clone();
                tiddler.created = tiddler.modified.clone();
            }
        }

        let splitter = BinarySplitter::new(self.files());
        let split = splitter.split(tiddler)?;
        let encoded = encode_tiddler(tiddler, &split.body)?;

        // a tiddler that stopped being binary drops its payload
        let stale = split.side_file().is_none() && self.files().is_file(&side);
        let mut changed: Vec<&RepoPath> = vec![&primary];
        if split.side_file().is_some() || stale {
            changed.push(&side);
        }

        let written = splitter
            .store(&split)
            .and_then(|()| self.files().write(&primary, &encoded))
            .and_then(|()| if stale { self.files().remove(&side).map(drop) } else { Ok(()) });
        if let Err(e) = written {
            self.restore_from_head(&changed);
            return Err(e);
        }

        let commit = self.commit_or_restore(&CommitMessage::tiddler_put(&tiddler.bag, &tiddler.title), &changed)?;

        let revision = commit.revision();
        tracing::debug!(path = %primary, revision = %revision, "tiddler stored");
        tiddler.revision = Some(revision.clone());
        Ok(revision)
    }

    /// The current revision of a tiddler.
    pub fn get_tiddler(&self, bag: &str, title: &str) -> StoreResult<Tiddler> {
        let primary = paths::tiddler_path(bag, title)?;
        let bytes = self
            .files()
            .read(&primary)?
            .ok_or_else(|| StoreError::tiddler_not_found(bag, title))?;

        let mut tiddler = decode_tiddler(&bytes, bag, title, primary.as_str())?;
        let last = self.repository().last_commit(&primary).map_err(|e| match e {
            StoreError::NoHistory(_) => StoreError::tiddler_not_found(bag, title),
            other => other,
        })?;
        tiddler.revision = Some(last.revision());

        BinarySplitter::new(self.files()).rehydrate(&mut tiddler)?;
        Ok(tiddler)
    }

    /// A tiddler as it was at `revision`.
    ///
    /// Works after the tiddler (or its bag) has been deleted. A binary
    /// payload is read from the same commit, falling back to the current
    /// side-file if that commit has none.
    pub fn get_tiddler_revision(
        &self,
        bag: &str,
        title: &str,
        revision: &RevisionId,
    ) -> StoreResult<Tiddler> {
        let primary = paths::tiddler_path(bag, title)?;
        let not_found = || StoreError::RevisionNotFound {
            bag: bag.to_string(),
            title: title.to_string(),
            revision: revision.to_string(),
        };
        let repo = self.repository();

        let commit = repo.resolve(revision).map_err(|e| match e {
            StoreError::NotInRevision { .. } => not_found(),
            other => other,
        })?;
        let pinned = commit.revision();
        let bytes = repo.show(&pinned, &primary).map_err(|e| match e {
            StoreError::NotInRevision { .. } => not_found(),
            other => other,
        })?;

        let mut tiddler = decode_tiddler(&bytes, bag, title, primary.as_str())?;
        if is_binary(tiddler.content_type.as_deref()) {
            let side = paths::binary_path(bag, title)?;
            match repo.show(&pinned, &side) {
                Ok(payload) => tiddler.text = payload,
                Err(StoreError::NotInRevision { .. }) => {
                    BinarySplitter::new(self.files()).rehydrate(&mut tiddler)?
                }
                Err(e) => return Err(e),
            }
        }
        tiddler.revision = Some(pinned);
        Ok(tiddler)
    }

    /// Remove a tiddler (and its binary payload). Its history is kept.
    ///
    /// A tiddler still in HEAD counts as present even if its file is
    /// already gone, so a delete whose commit failed can be retried.
    pub fn delete_tiddler(&self, bag: &str, title: &str) -> StoreResult<()> {
        let primary = paths::tiddler_path(bag, title)?;
        let side = paths::binary_path(bag, title)?;
        let _bag_guard = self.locks().acquire_shared(&paths::bag_dir(bag)?)?;
        let _guard = self.locks().acquire(&primary)?;

        let repo = self.repository();
        if !self.files().is_file(&primary) && !repo.is_tracked(&primary)? {
            return Err(StoreError::tiddler_not_found(bag, title));
        }
        let mut changed = vec![&primary];
        if self.files().is_file(&side) || repo.is_tracked(&side)? {
            changed.push(&side);
        }
        for path in &changed {
            self.files().remove(path)?;
        }

        let commit = self.commit_or_restore(&CommitMessage::tiddler_delete(bag, title), &changed)?;
        tracing::debug!(path = %primary, commit = %commit, "tiddler deleted");
        Ok(())
    }

    /// Titles of the tiddlers in a bag, sorted by encoded title.
    pub fn list_bag_tiddlers(&self, bag: &str) -> StoreResult<Vec<String>> {
        let entries = self
            .files()
            .list(&paths::tiddlers_dir(bag)?)?
            .ok_or_else(|| StoreError::BagNotFound(bag.to_string()))?;

        entries
            .iter()
            .filter(|entry| is_tiddler_entry(entry))
            .map(|entry| decode_name(entry))
            .collect()
    }

    /// Revisions of a live tiddler, newest first.
    pub fn list_tiddler_revisions(&self, bag: &str, title: &str) -> StoreResult<Vec<RevisionId>> {
        let primary = paths::tiddler_path(bag, title)?;
        if !self.files().is_file(&primary) {
            return Err(StoreError::tiddler_not_found(bag, title));
        }

        let history = self.repository().history(&primary)?;
        if history.is_empty() {
            return Err(StoreError::tiddler_not_found(bag, title));
        }
        Ok(history.iter().map(|id| id.revision()).collect())
    }
}

#[cfg(test)]
mod tests {
    use std::thread;
    use std::time::Duration;

    use crate::model::{Bag, Tiddler};
    use crate::storage::paths::BINARIES_DIR;
    use crate::storage::{ErrorKind, Identity, RevisionId, ServerHost, StoreError, REVISION_LEN};
    use crate::store::engine::tests::test_store;
    use crate::store::{Store, StoreConfig};

    fn store_with_alpha() -> (tempfile::TempDir, Store) {
        let (dir, store) = test_store();
        store.put_bag(&Bag::new("alpha")).unwrap();
        (dir, store)
    }

    fn png(seed: u8) -> Vec<u8> {
        vec![0x89, b'P', b'N', b'G', b'\r', b'\n', 0x1a, b'\n', 0, seed, 0xff]
    }

    #[test]
    fn test_put_get_and_revisions() {
        let (_dir, store) = store_with_alpha();

        let mut tiddler = Tiddler::new("Foo", "alpha").with_text("lorem ipsum");
        let first = store.put_tiddler(&mut tiddler).unwrap();
        assert_eq!(first.as_str().len(), REVISION_LEN);
        assert_eq!(tiddler.revision.as_ref(), Some(&first));

        let loaded = store.get_tiddler("alpha", "Foo").unwrap();
        assert_eq!(loaded.text, b"lorem ipsum");
        assert_eq!(loaded.revision.as_ref(), Some(&first));
        assert_eq!(store.list_tiddler_revisions("alpha", "Foo").unwrap(), vec![first.clone()]);

        tiddler.set_text("lorem ipsum\ndolor sit amet");
        let second = store.put_tiddler(&mut tiddler).unwrap();
        assert_ne!(first, second);

        let revisions = store.list_tiddler_revisions("alpha", "Foo").unwrap();
        assert_eq!(revisions, vec![second.clone(), first.clone()]);

        let newest = store.get_tiddler_revision("alpha", "Foo", &revisions[0]).unwrap();
        assert_eq!(newest.text, b"lorem ipsum\ndolor sit amet");
        let oldest = store.get_tiddler_revision("alpha", "Foo", &revisions[1]).unwrap();
        assert_eq!(oldest.text, b"lorem ipsum");
        assert_eq!(oldest.revision.as_ref(), Some(&first));
    }

    #[test]
    fn test_n_puts_give_n_revisions() {
        let (_dir, store) = store_with_alpha();
        let mut written = Vec::new();

        for i in 0..4 {
            let mut tiddler = Tiddler::new("Foo", "alpha").with_text(format!("version {}", i));
            written.push((store.put_tiddler(&mut tiddler).unwrap(), format!("version {}", i)));
        }
        // unrelated writes do not show up in Foo's history
        let mut other = Tiddler::new("Bar", "alpha").with_text("bar");
        store.put_tiddler(&mut other).unwrap();

        let revisions = store.list_tiddler_revisions("alpha", "Foo").unwrap();
        assert_eq!(revisions.len(), 4);
        for (revision, text) in &written {
            assert!(revisions.contains(revision));
            let tiddler = store.get_tiddler_revision("alpha", "Foo", revision).unwrap();
            assert_eq!(tiddler.text_str(), Some(text.as_str()));
        }
        assert_eq!(revisions[0], written[3].0);
    }

    #[test]
    fn test_metadata_round_trip() {
        let (_dir, store) = store_with_alpha();
        let mut tiddler = Tiddler::new("Foo", "alpha")
            .with_text("body\n\nwith blank lines\n")
            .with_content_type("text/x-markdown")
            .with_tags(["foo", "bar baz"]);
        tiddler.fields.insert("field0".to_string(), "value 0".to_string());
        tiddler.fields.insert("server.etag".to_string(), "computed".to_string());

        store.put_tiddler(&mut tiddler).unwrap();
        let loaded = store.get_tiddler("alpha", "Foo").unwrap();

        assert_eq!(loaded.text, tiddler.text);
        assert_eq!(loaded.tags, vec!["foo", "bar baz"]);
        assert_eq!(loaded.content_type.as_deref(), Some("text/x-markdown"));
        assert_eq!(loaded.fields.get("field0").map(String::as_str), Some("value 0"));
        assert!(!loaded.fields.contains_key("server.etag"));
        assert_eq!(loaded.modifier, Identity::GUEST);
        assert_eq!(loaded.modified.len(), 14);
    }

    #[test]
    fn test_creator_is_preserved() {
        let (_dir, store) = store_with_alpha();

        let mut first = Tiddler::new("Foo", "alpha").with_text("one").with_modifier("john");
        first.modified = "20130119150632".to_string();
        store.put_tiddler(&mut first).unwrap();

        let mut second = Tiddler::new("Foo", "alpha").with_text("two").with_modifier("jane");
        second.modified = "20130119151021".to_string();
        second.creator = "mallory".to_string();
        second.created = "19990101000000".to_string();
        store.put_tiddler(&mut second).unwrap();

        let loaded = store.get_tiddler("alpha", "Foo").unwrap();
        assert_eq!(loaded.creator, "john");
        assert_eq!(loaded.created, "20130119150632");
        assert_eq!(loaded.modifier, "jane");
        assert_eq!(loaded.modified, "20130119151021");
    }

    #[test]
    fn test_caller_revision_is_discarded() {
        let (_dir, store) = store_with_alpha();
        let mut tiddler = Tiddler::new("Foo", "alpha")
            .with_text("lorem ipsum")
            .with_revision(RevisionId::new("deadbeef00"));

        let revision = store.put_tiddler(&mut tiddler).unwrap();
        assert_ne!(revision.as_str(), "deadbeef00");
        assert_eq!(tiddler.revision, Some(revision));
    }

    #[test]
    fn test_identical_put_creates_revision() {
        let (_dir, store) = store_with_alpha();
        let mut tiddler = Tiddler::new("Foo", "alpha").with_text("same").with_modifier("john");
        tiddler.modified = "20130119150632".to_string();

        let first = store.put_tiddler(&mut tiddler).unwrap();
        let head = store.repository().head().unwrap();
        let again = store.put_tiddler(&mut tiddler).unwrap();

        assert_ne!(first, again);
        assert_ne!(store.repository().head().unwrap(), head);
        assert_eq!(
            store.list_tiddler_revisions("alpha", "Foo").unwrap(),
            vec![again.clone(), first.clone()]
        );
        for revision in [&first, &again] {
            let pinned = store.get_tiddler_revision("alpha", "Foo", revision).unwrap();
            assert_eq!(pinned.text, b"same");
            assert!(pinned.fields.is_empty());
        }
    }

    #[test]
    fn test_retry_after_failed_commit() {
        let (_dir, store) = store_with_alpha();
        let mut tiddler = Tiddler::new("Foo", "alpha").with_text("one");
        let first = store.put_tiddler(&mut tiddler).unwrap();

        let index_lock = store.root().join(".git").join("index.lock");
        std::fs::write(&index_lock, b"").unwrap();
        let mut update = Tiddler::new("Foo", "alpha").with_text("two");
        assert!(store.put_tiddler(&mut update).is_err());
        assert_eq!(update.revision, None);

        // nothing uncommitted is served
        let live = store.get_tiddler("alpha", "Foo").unwrap();
        assert_eq!(live.text, b"one");
        assert_eq!(live.revision.as_ref(), Some(&first));

        std::fs::remove_file(&index_lock).unwrap();
        let mut retry = Tiddler::new("Foo", "alpha").with_text("two");
        let second = store.put_tiddler(&mut retry).unwrap();
        assert_ne!(second, first);

        let live = store.get_tiddler("alpha", "Foo").unwrap();
        assert_eq!(live.text, b"two");
        assert_eq!(live.revision.as_ref(), Some(&second));
        assert_eq!(store.get_tiddler_revision("alpha", "Foo", &first).unwrap().text, b"one");
        assert_eq!(store.get_tiddler_revision("alpha", "Foo", &second).unwrap().text, b"two");
    }

    #[test]
    fn test_first_put_rolled_back_on_failed_commit() {
        let (_dir, store) = store_with_alpha();
        let index_lock = store.root().join(".git").join("index.lock");
        std::fs::write(&index_lock, b"").unwrap();

        let mut tiddler = Tiddler::new("Pic", "alpha").with_content_type("image/png");
        tiddler.text = png(4);
        assert!(store.put_tiddler(&mut tiddler).is_err());
        std::fs::remove_file(&index_lock).unwrap();

        assert!(store.get_tiddler("alpha", "Pic").unwrap_err().is_not_found());
        assert!(store.list_bag_tiddlers("alpha").unwrap().is_empty());
        assert!(!store.root().join("bags/alpha/tiddlers/_binaries/Pic").exists());
    }

    #[test]
    fn test_invalid_binary_update_writes_nothing() {
        let (_dir, store) = store_with_alpha();
        let mut tiddler = Tiddler::new("Pic", "alpha").with_content_type("application/octet-stream");
        tiddler.text = b"AAAA".to_vec();
        let first = store.put_tiddler(&mut tiddler).unwrap();

        let mut bad = Tiddler::new("Pic", "alpha").with_content_type("application/octet-stream");
        bad.text = b"BBBB".to_vec();
        bad.fields.insert("bad:key".to_string(), "v".to_string());
        assert!(store.put_tiddler(&mut bad).unwrap_err().is_format_error());

        let live = store.get_tiddler("alpha", "Pic").unwrap();
        assert_eq!(live.text, b"AAAA");
        assert_eq!(live.revision.as_ref(), Some(&first));
        let side = store.root().join("bags/alpha/tiddlers/_binaries/Pic");
        assert_eq!(std::fs::read(side).unwrap(), b"AAAA");
    }

    #[test]
    fn test_binary_tiddler() {
        let (_dir, store) = store_with_alpha();
        let payload = png(1);
        let mut tiddler = Tiddler::new("Pic", "alpha").with_content_type("image/png");
        tiddler.text = payload.clone();

        store.put_tiddler(&mut tiddler).unwrap();
        assert_eq!(tiddler.text, payload);

        let root = store.root().join("bags").join("alpha").join("tiddlers");
        let primary = std::fs::read(root.join("Pic")).unwrap();
        let side = std::fs::read(root.join(BINARIES_DIR).join("Pic")).unwrap();
        assert!(!primary.ends_with(&payload));
        assert!(primary.starts_with(b"creator: "));
        assert_eq!(side, payload);

        let loaded = store.get_tiddler("alpha", "Pic").unwrap();
        assert_eq!(loaded.text, payload);
        assert_eq!(loaded.content_type.as_deref(), Some("image/png"));
        assert_eq!(store.list_bag_tiddlers("alpha").unwrap(), vec!["Pic"]);
    }

    #[test]
    fn test_binary_revisions_in_lockstep() {
        let (_dir, store) = store_with_alpha();
        let mut revisions = Vec::new();
        for seed in 0..3 {
            let mut tiddler = Tiddler::new("Pic", "alpha").with_content_type("image/png");
            tiddler.text = png(seed);
            revisions.push(store.put_tiddler(&mut tiddler).unwrap());
        }
        revisions.reverse();

        let repo = store.repository();
        let primary = crate::storage::paths::tiddler_path("alpha", "Pic").unwrap();
        let side = crate::storage::paths::binary_path("alpha", "Pic").unwrap();
        let primary_history: Vec<RevisionId> =
            repo.history(&primary).unwrap().iter().map(|c| c.revision()).collect();
        let side_history: Vec<RevisionId> =
            repo.history(&side).unwrap().iter().map(|c| c.revision()).collect();

        assert_eq!(primary_history, revisions);
        assert_eq!(side_history, revisions);

        // pinned gets see the payload of their own commit
        for (revision, seed) in revisions.iter().zip([2u8, 1, 0]) {
            let old = store.get_tiddler_revision("alpha", "Pic", revision).unwrap();
            assert_eq!(old.text, png(seed));
        }
    }

    #[test]
    fn test_identical_binary_payload_still_commits() {
        let (_dir, store) = store_with_alpha();
        for _ in 0..2 {
            let mut tiddler = Tiddler::new("Pic", "alpha").with_content_type("image/png");
            tiddler.text = png(7);
            tiddler.modified = "20130119150632".to_string();
            store.put_tiddler(&mut tiddler).unwrap();
        }
        assert_eq!(store.list_tiddler_revisions("alpha", "Pic").unwrap().len(), 2);
    }

    #[test]
    fn test_binary_to_text_drops_payload() {
        let (_dir, store) = store_with_alpha();
        let mut tiddler = Tiddler::new("Pic", "alpha").with_content_type("image/png");
        tiddler.text = png(1);
        store.put_tiddler(&mut tiddler).unwrap();

        let mut text = Tiddler::new("Pic", "alpha").with_text("now text");
        store.put_tiddler(&mut text).unwrap();

        let side = store.root().join("bags/alpha/tiddlers/_binaries/Pic");
        assert!(!side.exists());
        assert_eq!(store.get_tiddler("alpha", "Pic").unwrap().text, b"now text");
    }

    #[test]
    fn test_delete_tiddler() {
        let (_dir, store) = store_with_alpha();
        let mut foo = Tiddler::new("Foo", "alpha").with_text("lorem ipsum");
        let revision = store.put_tiddler(&mut foo).unwrap();
        let mut bar = Tiddler::new("Bar", "alpha").with_text("bar");
        store.put_tiddler(&mut bar).unwrap();

        store.delete_tiddler("alpha", "Foo").unwrap();

        assert_eq!(store.list_bag_tiddlers("alpha").unwrap(), vec!["Bar"]);
        assert!(matches!(
            store.get_tiddler("alpha", "Foo"),
            Err(StoreError::TiddlerNotFound { .. })
        ));
        assert!(store.list_tiddler_revisions("alpha", "Foo").unwrap_err().is_not_found());
        assert!(store.delete_tiddler("alpha", "Foo").unwrap_err().is_not_found());

        let old = store.get_tiddler_revision("alpha", "Foo", &revision).unwrap();
        assert_eq!(old.text, b"lorem ipsum");
    }

    #[test]
    fn test_delete_binary_tiddler() {
        let (_dir, store) = store_with_alpha();
        let mut tiddler = Tiddler::new("Pic", "alpha").with_content_type("image/png");
        tiddler.text = png(3);
        let revision = store.put_tiddler(&mut tiddler).unwrap();

        store.delete_tiddler("alpha", "Pic").unwrap();

        assert!(!store.root().join("bags/alpha/tiddlers/_binaries/Pic").exists());
        let old = store.get_tiddler_revision("alpha", "Pic", &revision).unwrap();
        assert_eq!(old.text, png(3));
    }

    #[test]
    fn test_delete_retry_after_failed_commit() {
        let (_dir, store) = store_with_alpha();
        let mut pic = Tiddler::new("Pic", "alpha").with_content_type("image/png");
        pic.text = png(5);
        store.put_tiddler(&mut pic).unwrap();

        let index_lock = store.root().join(".git").join("index.lock");
        std::fs::write(&index_lock, b"").unwrap();
        assert!(store.delete_tiddler("alpha", "Pic").is_err());
        assert_eq!(store.get_tiddler("alpha", "Pic").unwrap().text, png(5));
        std::fs::remove_file(&index_lock).unwrap();

        store.delete_tiddler("alpha", "Pic").unwrap();
        assert!(store.get_tiddler("alpha", "Pic").unwrap_err().is_not_found());
        let repo = store.repository();
        assert!(!repo.is_tracked(&crate::storage::paths::tiddler_path("alpha", "Pic").unwrap()).unwrap());
        assert!(!repo.is_tracked(&crate::storage::paths::binary_path("alpha", "Pic").unwrap()).unwrap());
    }

    #[test]
    fn test_delete_commits_removal_already_on_disk() {
        let (_dir, store) = store_with_alpha();
        let mut foo = Tiddler::new("Foo", "alpha").with_text("foo");
        store.put_tiddler(&mut foo).unwrap();

        // left behind by a writer that died between removing and committing
        std::fs::remove_file(store.root().join("bags/alpha/tiddlers/Foo")).unwrap();

        store.delete_tiddler("alpha", "Foo").unwrap();
        let primary = crate::storage::paths::tiddler_path("alpha", "Foo").unwrap();
        assert!(!store.repository().is_tracked(&primary).unwrap());
        assert!(store.delete_tiddler("alpha", "Foo").unwrap_err().is_not_found());
    }

    #[test]
    fn test_reserved_title_rejected_everywhere() {
        let (_dir, store) = store_with_alpha();
        store.put_bag(&Bag::new("beta")).unwrap();
        let mut pic = Tiddler::new("Pic", "alpha").with_content_type("image/png");
        pic.text = png(0);
        store.put_tiddler(&mut pic).unwrap();

        for bag in ["alpha", "beta", "missing"] {
            let mut tiddler = Tiddler::new(BINARIES_DIR, bag).with_text("x");
            let err = store.put_tiddler(&mut tiddler).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Format, "{}", bag);
        }
    }

    #[test]
    fn test_put_into_missing_bag() {
        let (_dir, store) = test_store();
        let mut tiddler = Tiddler::new("Foo", "nope").with_text("x");
        assert!(matches!(
            store.put_tiddler(&mut tiddler),
            Err(StoreError::BagNotFound(_))
        ));
    }

    #[test]
    fn test_listing() {
        let (_dir, store) = store_with_alpha();
        assert!(store.list_bag_tiddlers("alpha").unwrap().is_empty());
        assert!(matches!(
            store.list_bag_tiddlers("nope"),
            Err(StoreError::BagNotFound(_))
        ));

        for title in ["Foo", "oh hi", ".hidden", "a/b"] {
            let mut tiddler = Tiddler::new(title, "alpha").with_text(title);
            store.put_tiddler(&mut tiddler).unwrap();
        }
        let mut pic = Tiddler::new("Pic", "alpha").with_content_type("image/png");
        pic.text = png(0);
        store.put_tiddler(&mut pic).unwrap();

        let mut titles = store.list_bag_tiddlers("alpha").unwrap();
        titles.sort();
        assert_eq!(titles, vec![".hidden", "Foo", "Pic", "a/b", "oh hi"]);
        assert_eq!(store.get_tiddler("alpha", "a/b").unwrap().text, b"a/b");
    }

    #[test]
    fn test_unknown_revisions() {
        let (_dir, store) = store_with_alpha();
        let mut foo = Tiddler::new("Foo", "alpha").with_text("foo");
        store.put_tiddler(&mut foo).unwrap();
        let mut bar = Tiddler::new("Bar", "alpha").with_text("bar");
        let bar_revision = store.put_tiddler(&mut bar).unwrap();

        for bogus in ["N/A", "90", "0000000000"] {
            let err = store
                .get_tiddler_revision("alpha", "Foo", &RevisionId::new(bogus))
                .unwrap_err();
            assert!(matches!(err, StoreError::RevisionNotFound { .. }), "{}", bogus);
        }

        // a revision of another tiddler that predates Foo's removal still shows Foo
        store.delete_tiddler("alpha", "Foo").unwrap();
        let mut baz = Tiddler::new("Baz", "alpha").with_text("baz");
        let baz_revision = store.put_tiddler(&mut baz).unwrap();
        assert!(store.get_tiddler_revision("alpha", "Foo", &bar_revision).is_ok());
        assert!(store
            .get_tiddler_revision("alpha", "Foo", &baz_revision)
            .unwrap_err()
            .is_not_found());
    }

    #[test]
    fn test_never_written() {
        let (_dir, store) = store_with_alpha();
        assert!(store.get_tiddler("alpha", "Nope").unwrap_err().is_not_found());
        assert!(store.list_tiddler_revisions("alpha", "Nope").unwrap_err().is_not_found());
        assert!(store.list_tiddler_revisions("nobag", "Nope").unwrap_err().is_not_found());
    }

    #[test]
    fn test_commit_attribution() {
        let dir = tempfile::TempDir::new().unwrap();
        let config = StoreConfig::new(dir.path()).host(ServerHost::new("example.org", 8001));
        let store = Store::open_with_config(config).unwrap();
        store.put_bag(&Bag::new("alpha")).unwrap();

        let john = store.for_identity(Identity::new("JohnDoe", ServerHost::new("example.com", 80)));
        let mut tiddler = Tiddler::new("Foo", "alpha").with_text("x");
        let revision = john.put_tiddler(&mut tiddler).unwrap();

        let repo = store.repository();
        let info = repo.get_commit(repo.resolve(&revision).unwrap()).unwrap();
        assert_eq!(info.summary(), "tiddler put: alpha/Foo");
        assert_eq!(info.author.to_string(), "JohnDoe <JohnDoe@example.com>");
        assert_eq!(info.committer.to_string(), "tiddlyweb <tiddlyweb@example.com>");
        assert_eq!(store.get_tiddler("alpha", "Foo").unwrap().modifier, "JohnDoe");

        let guest = repo.get_commit(repo.last_commit(
            &crate::storage::paths::bag_policy("alpha").unwrap(),
        ).unwrap()).unwrap();
        assert_eq!(guest.author.to_string(), "GUEST <GUEST@example.org:8001>");
    }

    #[test]
    fn test_lock_contention_surfaces() {
        let (_dir, store) = store_with_alpha();
        let primary = crate::storage::paths::tiddler_path("alpha", "Foo").unwrap();
        let _held = store.locks().acquire(&primary).unwrap();

        let mut tiddler = Tiddler::new("Foo", "alpha").with_text("x");
        let err = store.put_tiddler(&mut tiddler).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::LockContention);
        assert!(err.is_retriable());
    }

    #[test]
    fn test_bag_lock_blocks_tiddler_writes() {
        let (_dir, store) = store_with_alpha();
        let bag = crate::storage::paths::bag_dir("alpha").unwrap();
        let held = store.locks().acquire(&bag).unwrap();

        let mut tiddler = Tiddler::new("Foo", "alpha").with_text("x");
        assert_eq!(store.put_tiddler(&mut tiddler).unwrap_err().kind(), ErrorKind::LockContention);
        assert!(store.delete_tiddler("alpha", "Foo").unwrap_err().is_retriable());

        drop(held);
        store.put_tiddler(&mut tiddler).unwrap();
    }

    #[test]
    fn test_put_racing_bag_delete_leaves_no_orphan() {
        let dir = tempfile::TempDir::new().unwrap();
        let config = StoreConfig::new(dir.path())
            .lock_attempts(500)
            .lock_backoff(Duration::from_millis(2));
        let store = Store::open_with_config(config).unwrap();
        store.put_bag(&Bag::new("alpha")).unwrap();

        let writer = {
            let store = store.clone();
            thread::spawn(move || {
                (0..10)
                    .map(|i| {
                        let mut tiddler = Tiddler::new(format!("T{}", i), "alpha").with_text("x");
                        store.put_tiddler(&mut tiddler).map(|_| ())
                    })
                    .collect::<Vec<_>>()
            })
        };
        store.delete_bag("alpha").unwrap();
        let results = writer.join().unwrap();

        for result in &results {
            if let Err(e) = result {
                assert!(matches!(e, StoreError::BagNotFound(_)), "{}", e);
            }
        }
        assert!(!store.root().join("bags").join("alpha").exists());
        let bag = crate::storage::paths::bag_dir("alpha").unwrap();
        assert!(!store.repository().is_tracked(&bag).unwrap());
    }

    #[test]
    fn test_lock_released_after_failure() {
        let (_dir, store) = store_with_alpha();
        let mut bad = Tiddler::new("Foo", "alpha").with_text("x");
        bad.fields.insert("bad:key".to_string(), "v".to_string());
        assert!(store.put_tiddler(&mut bad).unwrap_err().is_format_error());

        let mut good = Tiddler::new("Foo", "alpha").with_text("x");
        store.put_tiddler(&mut good).unwrap();
    }

    #[test]
    fn test_concurrent_writers() {
        let dir = tempfile::TempDir::new().unwrap();
        let config = StoreConfig::new(dir.path())
            .lock_attempts(500)
            .lock_backoff(Duration::from_millis(2));
        let store = Store::open_with_config(config).unwrap();
        store.put_bag(&Bag::new("alpha")).unwrap();

        let handles: Vec<_> = (0..4)
            .map(|t| {
                let store = store.as_user(format!("writer{}", t));
                thread::spawn(move || {
                    for i in 0..5 {
                        let mut own = Tiddler::new(format!("T{}", t), "alpha")
                            .with_text(format!("{} {}", t, i));
                        store.put_tiddler(&mut own).unwrap();
                        let mut shared = Tiddler::new("Shared", "alpha")
                            .with_text(format!("{} {}", t, i));
                        store.put_tiddler(&mut shared).unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        for t in 0..4 {
            let title = format!("T{}", t);
            assert_eq!(store.list_tiddler_revisions("alpha", &title).unwrap().len(), 5);
        }
        let shared = store.list_tiddler_revisions("alpha", "Shared").unwrap();
        assert_eq!(shared.len(), 20);
        assert!(store.get_tiddler("alpha", "Shared").unwrap().creator.starts_with("writer"));
        assert_eq!(store.list_bag_tiddlers("alpha").unwrap().len(), 5);
    }
}
