//! DashMap-backed catalog.

use std::collections::HashMap;
use std::path::Path;

use async_trait::async_trait;
use dashmap::DashMap;
use serde::Deserialize;
use time::Date;

use super::{Catalog, CatalogError, CatalogResult, Plan, Recipe, parse_plan_date};

/// On-disk catalog layout.
///
/// ```json
/// {
///   "recipes": [{ "id": "r1", "languageCode": "ja", "content": { ... } }],
///   "plans": { "user-1": { "2025-03-14": { "recipes": ["r1"], "stepGroups": [] } } }
/// }
/// ```
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct CatalogFile {
    recipes: Vec<Recipe>,
    plans: HashMap<String, HashMap<String, Plan>>,
}

/// In-memory recipe and plan store.
#[derive(Debug, Default)]
pub struct InMemoryCatalog {
    recipes: DashMap<String, Recipe>,
    plans: DashMap<(String, Date), Plan>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a catalog from a JSON file.
    pub fn from_file(path: &Path) -> CatalogResult<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json(&contents)
    }

    /// Load a catalog from a JSON document.
    pub fn from_json(json: &str) -> CatalogResult<Self> {
        let file: CatalogFile = serde_json::from_str(json)?;
        let catalog = Self::new();

        for recipe in file.recipes {
            if recipe.id.is_empty() {
                return Err(CatalogError::InvalidData(
                    "recipe without an id".to_string(),
                ));
            }
            catalog.insert_recipe(recipe);
        }

        for (user_id, plans) in file.plans {
            for (plan_id, plan) in plans {
                let date = parse_plan_date(&plan_id).map_err(|e| {
                    CatalogError::InvalidData(format!(
                        "plan '{plan_id}' for user '{user_id}': {e}"
                    ))
                })?;
                catalog.insert_plan(&user_id, date, plan);
            }
        }

        tracing::info!(
            recipes = catalog.recipe_count(),
            plans = catalog.plans.len(),
            "Loaded recipe catalog"
        );
        Ok(catalog)
    }

    pub fn insert_recipe(&self, recipe: Recipe) {
        self.recipes.insert(recipe.id.clone(), recipe);
    }

    pub fn insert_plan(&self, user_id: &str, date: Date, plan: Plan) {
        self.plans.insert((user_id.to_string(), date), plan);
    }

    pub fn recipe_count(&self) -> usize {
        self.recipes.len()
    }
}

#[async_trait]
impl Catalog for InMemoryCatalog {
    async fn recipe(&self, id: &str) -> CatalogResult<Option<Recipe>> {
        Ok(self.recipes.get(id).map(|entry| entry.value().clone()))
    }

    async fn plan(&self, user_id: &str, date: Date) -> CatalogResult<Option<Plan>> {
        Ok(self
            .plans
            .get(&(user_id.to_string(), date))
            .map(|entry| entry.value().clone()))
    }
}
