use axum::{Router, routing::get};
use tower_http::trace::TraceLayer;

use crate::handlers::api;
use crate::state::AppState;
use std::sync::Arc;

/// Create the API router with protected routes
///
/// Authentication is layered on in [`create_app_router`](super::create_app_router).
pub fn create_api_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/recipes/{recipe_id}", get(api::get_recipe))
        .layer(TraceLayer::new_for_http())
}
