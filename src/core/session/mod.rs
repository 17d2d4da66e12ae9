//! Realtime chat relay session.
//!
//! A [`ChatSession`] bridges one client stream to one upstream realtime
//! connection:
//!
//! - The inbound loop reads client messages. The first `Start` (or `Audio`)
//!   message resolves the seed context, opens the upstream, primes it with a
//!   greeting, starts the outbound loop and fires the init gate. Later audio is
//!   forwarded unchanged.
//! - The outbound loop forwards upstream PCM audio to the client in arrival
//!   order. Other parts are dropped unless tool relay is enabled.
//! - The [`ShutdownCoordinator`] closes the upstream exactly once, whichever
//!   loop or error path gets there first.
//!
//! Loops stopped by the session itself return `Ok`; only a caller
//! cancellation produces [`SessionError::Cancelled`].
//!
//! # Example
//!
//! ```rust,ignore
//! let session = ChatSession::new(ctx, Box::new(source), Arc::new(sink), services, cancel);
//! let handle = session.handle();
//! tokio::spawn(async move { if handle.ready().await { /* upstream is live */ } });
//! session.run().await?;
//! ```

mod context;
mod controller;
mod error;
mod inbound;
mod outbound;
mod seed;
mod shutdown;
mod stream;

use std::future::Future;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

pub use context::RequestContext;
pub use controller::{ChatSession, SessionHandle};
pub use error::SessionError;
pub use seed::{ContextResolver, Seed, SeedResolver};
pub use shutdown::{SessionPhase, ShutdownCoordinator};
pub use stream::{ChatRequest, ChatResponse, ClientSink, ClientSource, SeedRequest};

use crate::core::realtime::UpstreamConnector;

/// Collaborators shared by every session.
#[derive(Clone)]
pub struct SessionServices {
    pub connector: Arc<dyn UpstreamConnector>,
    pub resolver: Arc<dyn ContextResolver>,
    /// Forward navigation tool calls to the client
    pub relay_tool_calls: bool,
}

/// Result of a loop stopped through the session token.
fn stopped(caller: &CancellationToken) -> Result<(), SessionError> {
    if caller.is_cancelled() {
        Err(SessionError::Cancelled)
    } else {
        Ok(())
    }
}

/// Run a relay loop and trigger shutdown when it returns.
async fn supervise<F>(shutdown: Arc<ShutdownCoordinator>, relay: F) -> Result<(), SessionError>
where
    F: Future<Output = Result<(), SessionError>>,
{
    let result = relay.await;
    shutdown.trigger().await;
    result
}
