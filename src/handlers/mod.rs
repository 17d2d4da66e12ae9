//! HTTP and WebSocket request handlers
//!
//! - `api` - Health check and recipe lookup
//! - `chat` - Realtime cooking assistant WebSocket

use axum::http::{HeaderMap, header::ACCEPT_LANGUAGE};

pub mod api;
pub mod chat;

pub use chat::chat_handler;

/// Language used when the request does not name one
pub const DEFAULT_LANGUAGE: &str = "ja";

/// Primary language subtag of the first `Accept-Language` entry (`en-US;q=0.9` → `en`).
pub fn request_language(headers: &HeaderMap) -> String {
    headers
        .get(ACCEPT_LANGUAGE)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .and_then(|tag| tag.split(';').next())
        .and_then(|tag| tag.split(['-', '_']).next())
        .map(|lang| lang.trim().to_ascii_lowercase())
        .filter(|lang| !lang.is_empty() && lang != "*")
        .unwrap_or_else(|| DEFAULT_LANGUAGE.to_string())
}
