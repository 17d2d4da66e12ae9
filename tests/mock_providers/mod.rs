//! Mock Provider Servers
//!
//! Local WebSocket servers speaking the realtime provider protocols, so the
//! connectors and the full gateway can be exercised without network access.

// Not every test binary uses every mock
#![allow(dead_code)]

pub mod gemini_mock;
