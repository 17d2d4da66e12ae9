//! Chat WebSocket handlers
//!
//! `GET /chat` bridges a client's microphone audio to the realtime model and
//! streams the model's spoken answers back.
//!
//! # Protocol
//!
//! ## Client → Server
//!
//! - **start**: Seed context (`recipe_text`, `recipe_id` or `plan_id`)
//! - **audio**: Base64 PCM audio chunk
//! - **keep_alive**: Ignored
//! - **Binary frames**: Audio data (PCM 16-bit, 16kHz, mono)
//!
//! ## Server → Client
//!
//! - **navigate_to_step** / **navigate_to_ingredients**: UI control, only when
//!   tool relay is enabled
//! - **error**: Rejected frame, or the reason the session ended
//! - **Binary frames**: Model audio (PCM 16-bit, 24kHz, mono)

mod handler;
pub mod messages;

pub use handler::chat_handler;
