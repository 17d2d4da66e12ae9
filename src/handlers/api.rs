use axum::{
    Extension, Json,
    extract::{Path, State},
    http::HeaderMap,
    response::IntoResponse,
};
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;
use tracing::debug;

use crate::auth::Auth;
use crate::core::catalog::RecipeContent;
use crate::errors::{AppError, AppResult};
use crate::handlers::request_language;
use crate::state::AppState;

/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    Json(json!({ "status": "OK" }))
}

/// A recipe in the caller's language.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecipeView<'a> {
    pub id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<&'a str>,
    /// Language of `content`
    pub language_code: &'a str,
    pub content: &'a RecipeContent,
}

/// Look up a recipe by id, localized via `Accept-Language`.
pub async fn get_recipe(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<Auth>,
    Path(recipe_id): Path<String>,
    headers: HeaderMap,
) -> AppResult<impl IntoResponse> {
    let language = request_language(&headers);
    debug!(auth_id = ?auth.id, recipe_id = %recipe_id, language = %language, "Recipe lookup");

    let recipe = state
        .catalog
        .recipe(&recipe_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("recipe {recipe_id}")))?;

    let (language_code, content) = match recipe.localized(&language) {
        Some(content) => (language.as_str(), content),
        None => (recipe.language_code.as_str(), &recipe.content),
    };
    let body = serde_json::to_value(RecipeView {
        id: &recipe.id,
        image_url: Some(recipe.image_url.as_str()).filter(|url| !url.is_empty()),
        language_code,
        content,
    })
    .map_err(crate::core::catalog::CatalogError::from)?;

    Ok(Json(body))
}
