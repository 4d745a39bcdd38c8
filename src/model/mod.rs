//! Entity objects handled by the store.
//!
//! These are plain data carriers. Access-policy evaluation, recipe
//! resolution and the like happen above the storage layer; the store only
//! persists and restores the fields defined here.

mod bag;
mod policy;
mod recipe;
mod tiddler;
mod user;

pub use bag::Bag;
pub use policy::Policy;
pub use recipe::{Recipe, RecipeEntry};
pub use tiddler::{Tiddler, TiddlerFields};
pub use user::User;
