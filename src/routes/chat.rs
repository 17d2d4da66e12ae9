//! Chat WebSocket route configuration

use axum::{Router, routing::get};
use tower_http::trace::TraceLayer;

use crate::handlers::chat::chat_handler;
use crate::state::AppState;
use std::sync::Arc;

/// Create the chat WebSocket router
///
/// # Endpoint
///
/// `GET /chat` - WebSocket upgrade for the realtime cooking assistant
///
/// # Example
///
/// ```json
/// // Client seeds the session
/// {"type": "start", "recipe_id": "tomato-pasta"}
///
/// // Client streams microphone audio as binary frames and receives the
/// // assistant's voice as binary frames
/// ```
pub fn create_chat_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/chat", get(chat_handler))
        .layer(TraceLayer::new_for_http())
}
