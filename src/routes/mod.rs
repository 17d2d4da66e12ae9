pub mod api;
pub mod chat;

use std::sync::Arc;

use axum::{Router, middleware, routing::get};

use crate::handlers::api::health_check;
use crate::middleware::{auth_middleware, connection_limit_middleware};
use crate::state::AppState;

/// Assemble the public, protected and chat routes with their middleware.
///
/// Serve it with `into_make_service_with_connect_info::<SocketAddr>()`; the
/// connection limit middleware needs the peer address.
pub fn create_app_router(app_state: Arc<AppState>) -> Router {
    let protected_routes = api::create_api_router().layer(middleware::from_fn_with_state(
        app_state.clone(),
        auth_middleware,
    ));

    // Layer order (outer to inner): connection_limit -> auth -> handler
    let chat_routes = chat::create_chat_router()
        .layer(middleware::from_fn_with_state(
            app_state.clone(),
            auth_middleware,
        ))
        .layer(middleware::from_fn_with_state(
            app_state.clone(),
            connection_limit_middleware,
        ));

    let public_routes = Router::new().route("/", get(health_check));

    public_routes
        .merge(protected_routes)
        .merge(chat_routes)
        .with_state(app_state)
}
