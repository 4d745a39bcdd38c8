use serde::{Deserialize, Serialize};

use crate::model::Policy;

/// One step of a recipe: a bag reference with an optional filter expression.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecipeEntry {
    pub bag: String,
    #[serde(default)]
    pub filter: String,
}

impl RecipeEntry {
    pub fn new(bag: impl Into<String>, filter: impl Into<String>) -> Self {
        Self {
            bag: bag.into(),
            filter: filter.into(),
        }
    }
}

/// An ordered composition of bags.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Recipe {
    pub name: String,
    pub desc: String,
    pub policy: Policy,
    entries: Vec<RecipeEntry>,
}

impl Recipe {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// replace the ordered bag list
    pub fn set_recipe<I, B, F>(&mut self, entries: I)
    where
        I: IntoIterator<Item = (B, F)>,
        B: Into<String>,
        F: Into<String>,
    {
        self.entries = entries
            .into_iter()
            .map(|(bag, filter)| RecipeEntry::new(bag, filter))
            .collect();
    }

    /// the ordered bag list
    pub fn get_recipe(&self) -> &[RecipeEntry] {
        &self.entries
    }

    pub(crate) fn set_entries(&mut self, entries: Vec<RecipeEntry>) {
        self.entries = entries;
    }
}
