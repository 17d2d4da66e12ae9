//! Recipe and plan records.
//!
//! All records serialize as camelCase JSON. That form is what the catalog file
//! contains, what `GET /recipes/{id}` returns and what is embedded into the
//! model's system instruction.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// An ingredient with a free-form quantity.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RecipeIngredient {
    pub name: String,
    pub quantity: String,
}

/// A titled group of additional ingredients (sauce, garnish, ...).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct IngredientSection {
    pub title: String,
    pub ingredients: Vec<RecipeIngredient>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RecipeStep {
    pub description: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub image_url: String,
}

/// The text content of a recipe in a single language.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RecipeContent {
    pub title: String,
    pub description: String,
    pub ingredients: Vec<RecipeIngredient>,
    pub additional_ingredients: Vec<IngredientSection>,
    pub steps: Vec<RecipeStep>,
    pub notes: String,
    pub serving_size: String,
}

/// A stored recipe.
///
/// `content` is in the recipe's source language; `localized_content` holds
/// translations keyed by language code (`en`, `ja`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Recipe {
    pub id: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub image_url: String,
    pub language_code: String,
    pub content: RecipeContent,
    #[serde(skip_serializing_if = "HashMap::is_empty")]
    pub localized_content: HashMap<String, RecipeContent>,
}

impl Recipe {
    /// Localized content for `language`, if a translation exists.
    pub fn localized(&self, language: &str) -> Option<&RecipeContent> {
        self.localized_content.get(language)
    }

    /// Content to show a caller speaking `language`: the translation when
    /// present, otherwise the source-language content.
    pub fn content_for(&self, language: &str) -> &RecipeContent {
        self.localized(language).unwrap_or(&self.content)
    }
}

/// A group of steps to execute together.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StepGroup {
    pub label: String,
    pub steps: Vec<RecipeStep>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub note: String,
}

/// A single day's cooking plan. Plans are keyed by user and `YYYY-MM-DD` date.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Plan {
    /// Recipe ids cooked that day
    pub recipes: Vec<String>,
    pub step_groups: Vec<StepGroup>,
    pub notes: Vec<String>,
}
