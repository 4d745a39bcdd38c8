//! Recipe persistence: one JSON file per recipe.

use serde::{Deserialize, Serialize};

use crate::model::{Policy, Recipe, RecipeEntry};
use crate::storage::paths::{self, decode_name};
use crate::storage::{CommitMessage, StoreError, StoreResult};
use crate::store::Store;

/// on-disk shape of a recipe file
#[derive(Serialize, Deserialize)]
struct RecipeFile {
    #[serde(default)]
    desc: String,
    #[serde(default)]
    policy: Policy,
    #[serde(default)]
    recipe: Vec<RecipeEntry>,
}

impl Store {
    pub fn put_recipe(&self, recipe: &Recipe) -> StoreResult<()> {
        let path = paths::recipe_path(&recipe.name)?;
        let file = RecipeFile {
            desc: recipe.desc.clone(),
            policy: recipe.policy.clone(),
            recipe: recipe.get_recipe().to_vec(),
        };
        let bytes = serde_json::to_vec_pretty(&file)?;

        let _guard = self.locks().acquire(&path)?;
        self.files().create_dir(&paths::recipes_dir())?;
        self.files().write(&path, &bytes)?;
        self.commit_or_restore(&CommitMessage::recipe_put(&recipe.name), &[&path])?;
        Ok(())
    }

    pub fn get_recipe(&self, name: &str) -> StoreResult<Recipe> {
        let path = paths::recipe_path(name)?;
        let bytes = self
            .files()
            .read(&path)?
            .ok_or_else(|| StoreError::RecipeNotFound(name.to_string()))?;
        let file: RecipeFile = serde_json::from_slice(&bytes)
            .map_err(|e| StoreError::malformed(path.as_str(), e.to_string()))?;

        let mut recipe = Recipe::new(name);
        recipe.desc = file.desc;
        recipe.policy = file.policy;
        recipe.set_entries(file.recipe);
        Ok(recipe)
    }

    pub fn delete_recipe(&self, name: &str) -> StoreResult<()> {
        let path = paths::recipe_path(name)?;
        let _guard = self.locks().acquire(&path)?;

        // still in HEAD means an earlier delete never got committed
        let removed = self.files().remove(&path)?;
        if !removed && !self.repository().is_tracked(&path)? {
            return Err(StoreError::RecipeNotFound(name.to_string()));
        }
        self.commit_or_restore(&CommitMessage::recipe_delete(name), &[&path])?;
        Ok(())
    }

    pub fn list_recipes(&self) -> StoreResult<Vec<String>> {
        let entries = self.files().list(&paths::recipes_dir())?.unwrap_or_default();
        entries.iter().map(|entry| decode_name(entry)).collect()
    }
}
