//! The storage engine.
//!
//! [`Store`] implements the lifecycle of every entity kind on top of the
//! storage layer. Each mutation writes plain files under the store root and
//! records exactly the paths it touched as one git commit, attributed to
//! the handle's [`Identity`](crate::storage::Identity).
//!
//! # Usage
//!
//! ```no_run
//! use gitstore::model::{Bag, Tiddler};
//! use gitstore::store::Store;
//!
//! let store = Store::open("./wiki").unwrap().as_user("JohnDoe");
//! store.put_bag(&Bag::new("alpha")).unwrap();
//!
//! let mut tiddler = Tiddler::new("Foo", "alpha").with_text("lorem ipsum");
//! let revision = store.put_tiddler(&mut tiddler).unwrap();
//!
//! let old = store.get_tiddler_revision("alpha", "Foo", &revision).unwrap();
//! assert_eq!(old.text, b"lorem ipsum");
//! ```

mod bags;
mod config;
mod engine;
mod recipes;
mod tiddlers;
mod users;

pub use config::StoreConfig;
pub use engine::Store;
