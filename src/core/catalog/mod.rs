//! Recipe and plan catalog.
//!
//! The session layer resolves seed context through the [`Catalog`] trait.
//! [`InMemoryCatalog`] is the built-in implementation, optionally loaded from a
//! JSON file at startup.

mod memory;
mod types;

use async_trait::async_trait;
use thiserror::Error;
use time::Date;
use time::macros::format_description;

pub use memory::InMemoryCatalog;
pub use types::{
    IngredientSection, Plan, Recipe, RecipeContent, RecipeIngredient, RecipeStep, StepGroup,
};

/// Errors raised by catalog backends.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("Failed to read catalog: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid catalog data: {0}")]
    InvalidData(String),

    #[error("Catalog unavailable: {0}")]
    Unavailable(String),
}

impl From<serde_json::Error> for CatalogError {
    fn from(e: serde_json::Error) -> Self {
        CatalogError::InvalidData(e.to_string())
    }
}

pub type CatalogResult<T> = Result<T, CatalogError>;

/// Read access to recipes and per-user plans.
#[async_trait]
pub trait Catalog: Send + Sync {
    /// Look up a recipe by id.
    async fn recipe(&self, id: &str) -> CatalogResult<Option<Recipe>>;

    /// Look up the plan a user made for a given day.
    async fn plan(&self, user_id: &str, date: Date) -> CatalogResult<Option<Plan>>;

    /// Look up several recipes. Unknown ids are skipped; order follows `ids`.
    async fn recipes(&self, ids: &[String]) -> CatalogResult<Vec<Recipe>> {
        let mut found = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(recipe) = self.recipe(id).await? {
                found.push(recipe);
            }
        }
        Ok(found)
    }
}

/// Parse a plan id (`YYYY-MM-DD`).
pub fn parse_plan_date(plan_id: &str) -> Result<Date, time::error::Parse> {
    Date::parse(plan_id, format_description!("[year]-[month]-[day]"))
}
