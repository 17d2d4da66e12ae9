//! Seed context resolution.

use std::sync::Arc;

use async_trait::async_trait;

use super::{RequestContext, SeedRequest, SessionError};
use crate::core::catalog::{Catalog, parse_plan_date};
use crate::core::prompt::SeedKind;

/// Resolved seed context.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Seed {
    pub kind: SeedKind,
    /// Text appended to the system instruction; may be empty
    pub text: String,
}

/// Turns a client's seed reference into seed text.
#[async_trait]
pub trait ContextResolver: Send + Sync {
    async fn resolve(
        &self,
        ctx: &RequestContext,
        request: &SeedRequest,
    ) -> Result<Seed, SessionError>;
}

/// Resolves seeds against the recipe catalog.
#[derive(Clone)]
pub struct SeedResolver {
    catalog: Arc<dyn Catalog>,
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<String, SessionError> {
    serde_json::to_string(value)
        .map_err(|e| SessionError::InvalidRequest(format!("Failed to encode seed: {e}")))
}

impl SeedResolver {
    pub fn new(catalog: Arc<dyn Catalog>) -> Self {
        Self { catalog }
    }

    async fn recipe_seed(
        &self,
        ctx: &RequestContext,
        recipe_id: &str,
    ) -> Result<Seed, SessionError> {
        let recipe = self
            .catalog
            .recipe(recipe_id)
            .await?
            .ok_or_else(|| SessionError::NotFound(format!("recipe {recipe_id}")))?;

        let json = match recipe.localized(&ctx.language) {
            Some(content) => to_json(content)?,
            None => to_json(&recipe)?,
        };

        Ok(Seed {
            kind: SeedKind::Recipe,
            text: format!("The recipe in structured JSON format is as follows:\n{json}"),
        })
    }

    async fn plan_seed(&self, ctx: &RequestContext, plan_id: &str) -> Result<Seed, SessionError> {
        let date = parse_plan_date(plan_id).map_err(|e| {
            SessionError::InvalidRequest(format!("plan id must be a YYYY-MM-DD date: {e}"))
        })?;
        let plan = self
            .catalog
            .plan(&ctx.user_id, date)
            .await?
            .ok_or_else(|| SessionError::NotFound(format!("plan {plan_id}")))?;

        let recipes = self.catalog.recipes(&plan.recipes).await?;
        if recipes.len() < plan.recipes.len() {
            tracing::warn!(
                session_id = %ctx.session_id,
                plan_id = %plan_id,
                missing = plan.recipes.len() - recipes.len(),
                "Plan references unknown recipes"
            );
        }

        Ok(Seed {
            kind: SeedKind::Plan,
            text: format!(
                "The plan's step groups in structured JSON format are as follows:\n{}\n\nThe recipes in structured JSON format are as follows:\n{}",
                to_json(&plan.step_groups)?,
                to_json(&recipes)?
            ),
        })
    }
}

#[async_trait]
impl ContextResolver for SeedResolver {
    async fn resolve(
        &self,
        ctx: &RequestContext,
        request: &SeedRequest,
    ) -> Result<Seed, SessionError> {
        if let Some(text) = non_empty(&request.recipe_text) {
            return Ok(Seed {
                kind: SeedKind::Recipe,
                text: format!("The recipe is as follows:\n{text}"),
            });
        }
        if let Some(recipe_id) = non_empty(&request.recipe_id) {
            return self.recipe_seed(ctx, recipe_id).await;
        }
        if let Some(plan_id) = non_empty(&request.plan_id) {
            return self.plan_seed(ctx, plan_id).await;
        }
        Ok(Seed::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::catalog::InMemoryCatalog;

    const CATALOG_JSON: &str = r#"{
        "recipes": [
            {
                "id": "r1",
                "languageCode": "ja",
                "content": {"title": "肉じゃが", "steps": [{"description": "切る"}]},
                "localizedContent": {"en": {"title": "Nikujaga", "steps": [{"description": "Cut"}]}}
            },
            {"id": "r2", "languageCode": "en", "content": {"title": "Miso soup"}}
        ],
        "plans": {
            "user-1": {
                "2025-03-14": {
                    "recipes": ["r1", "gone", "r2"],
                    "stepGroups": [{"label": "Prep", "steps": [{"description": "Wash rice"}]}]
                }
            }
        }
    }"#;

    fn resolver() -> SeedResolver {
        SeedResolver::new(Arc::new(InMemoryCatalog::from_json(CATALOG_JSON).unwrap()))
    }

    fn ctx(language: &str) -> RequestContext {
        RequestContext::new("user-1", language)
    }

    #[tokio::test]
    async fn test_text_takes_priority() {
        let request = SeedRequest {
            recipe_text: Some("Tomato Pasta: boil pasta...".to_string()),
            recipe_id: Some("r1".to_string()),
            plan_id: Some("2025-03-14".to_string()),
        };
        let seed = resolver().resolve(&ctx("ja"), &request).await.unwrap();
        assert_eq!(seed.kind, SeedKind::Recipe);
        assert_eq!(seed.text, "The recipe is as follows:\nTomato Pasta: boil pasta...");
    }

    #[tokio::test]
    async fn test_empty_text_falls_through_to_id() {
        let request = SeedRequest {
            recipe_text: Some(String::new()),
            recipe_id: Some("r2".to_string()),
            plan_id: None,
        };
        let seed = resolver().resolve(&ctx("ja"), &request).await.unwrap();
        assert!(seed.text.contains("Miso soup"));
    }

    #[tokio::test]
    async fn test_recipe_uses_localized_content() {
        let seed = resolver()
            .resolve(&ctx("en"), &SeedRequest::recipe_id("r1"))
            .await
            .unwrap();
        assert!(seed.text.starts_with("The recipe in structured JSON format is as follows:\n"));
        assert!(seed.text.contains("Nikujaga"));
        assert!(!seed.text.contains("肉じゃが"));
    }

    #[tokio::test]
    async fn test_recipe_without_translation_uses_full_record() {
        let seed = resolver()
            .resolve(&ctx("ja"), &SeedRequest::recipe_id("r1"))
            .await
            .unwrap();
        assert!(seed.text.contains("\"id\":\"r1\""));
        assert!(seed.text.contains("肉じゃが"));
    }

    #[tokio::test]
    async fn test_missing_recipe_is_not_found() {
        let result = resolver()
            .resolve(&ctx("ja"), &SeedRequest::recipe_id("nope"))
            .await;
        assert!(matches!(result, Err(SessionError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_plan_seed() {
        let seed = resolver()
            .resolve(&ctx("ja"), &SeedRequest::plan_id("2025-03-14"))
            .await
            .unwrap();
        assert_eq!(seed.kind, SeedKind::Plan);
        assert!(seed.text.starts_with(
            "The plan's step groups in structured JSON format are as follows:\n[{\"label\":\"Prep\""
        ));
        assert!(seed.text.contains("\n\nThe recipes in structured JSON format are as follows:\n"));
        assert!(seed.text.contains("Miso soup"));
        assert!(!seed.text.contains("\"gone\""));
    }

    #[tokio::test]
    async fn test_plan_is_scoped_to_user() {
        let other = RequestContext::new("user-2", "ja");
        let result = resolver()
            .resolve(&other, &SeedRequest::plan_id("2025-03-14"))
            .await;
        assert!(matches!(result, Err(SessionError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_invalid_plan_id() {
        let result = resolver()
            .resolve(&ctx("ja"), &SeedRequest::plan_id("next tuesday"))
            .await;
        assert!(matches!(result, Err(SessionError::InvalidRequest(_))));
    }

    #[tokio::test]
    async fn test_no_source_gives_empty_seed() {
        let seed = resolver()
            .resolve(&ctx("ja"), &SeedRequest::default())
            .await
            .unwrap();
        assert_eq!(seed, Seed::default());
    }
}
