//! gitstore - a git-backed versioned document store
//!
//! Bags, recipes, users and tiddlers are kept as plain files in a directory
//! tree that is also a git working tree. Every mutation is a commit, every
//! tiddler revision is a commit id, and the whole history lives in `.git/`.
//!
//! # Example
//!
//! ```no_run
//! use gitstore::model::{Bag, Tiddler};
//! use gitstore::store::Store;
//!
//! let store = Store::open("./wiki").unwrap();
//! store.put_bag(&Bag::new("alpha")).unwrap();
//!
//! let mut tiddler = Tiddler::new("Foo", "alpha").with_text("lorem ipsum");
//! store.put_tiddler(&mut tiddler).unwrap();
//! assert_eq!(store.list_tiddler_revisions("alpha", "Foo").unwrap().len(), 1);
//! ```

pub mod model;
pub mod storage;
pub mod store;

pub use storage::{ErrorKind, Identity, RevisionId, ServerHost, StoreError, StoreResult};
pub use store::{Store, StoreConfig};
