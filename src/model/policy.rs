//! Access policy attached to bags and recipes.

use serde::{Deserialize, Serialize};

/// Access constraints for a bag or recipe.
///
/// Each list holds user names or `R:`-prefixed role names. An empty list
/// means "no constraint" to the layer that evaluates policies; the store
/// only round-trips them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Policy {
    pub owner: Option<String>,
    pub read: Vec<String>,
    pub write: Vec<String>,
    pub create: Vec<String>,
    pub delete: Vec<String>,
    pub manage: Vec<String>,
    pub accept: Vec<String>,
}

impl Policy {
    /// check whether no constraint of any kind is set
    pub fn is_empty(&self) -> bool {
        self.owner.is_none()
            && self.read.is_empty()
            && self.write.is_empty()
            && self.create.is_empty()
            && self.delete.is_empty()
            && self.manage.is_empty()
            && self.accept.is_empty()
    }
}
