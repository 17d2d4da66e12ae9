//! Session controller.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::inbound::{InboundLoop, InitGate, RelayTask};
use super::shutdown::{SessionPhase, ShutdownCoordinator};
use super::{ClientSink, ClientSource, RequestContext, SessionError, SessionServices, supervise};

/// One relay session between a client and an upstream model.
pub struct ChatSession {
    ctx: RequestContext,
    source: Box<dyn ClientSource>,
    sink: Arc<dyn ClientSink>,
    services: SessionServices,
    caller: CancellationToken,
    shutdown: Arc<ShutdownCoordinator>,
}

/// Cloneable view of a running session.
#[derive(Clone)]
pub struct SessionHandle {
    shutdown: Arc<ShutdownCoordinator>,
}

impl SessionHandle {
    pub fn phase(&self) -> SessionPhase {
        self.shutdown.phase()
    }

    /// Resolves `true` once the upstream is ready, or `false` if the session
    /// ended without getting there.
    pub async fn ready(&self) -> bool {
        let mut phase = self.shutdown.subscribe();
        let _ = phase.wait_for(|p| *p >= SessionPhase::Active).await;
        self.shutdown.is_initialized()
    }
}

/// Closes the upstream if `run` is dropped before finishing.
struct ShutdownGuard(Arc<ShutdownCoordinator>);

impl Drop for ShutdownGuard {
    fn drop(&mut self) {
        let shutdown = self.0.clone();
        shutdown.token().cancel();
        if shutdown.is_closed() {
            return;
        }
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    shutdown.close_once().await;
                });
            }
            Err(_) => warn!("No runtime available to close the upstream connection"),
        }
    }
}

fn joined(
    result: Result<Result<(), SessionError>, tokio::task::JoinError>,
) -> Result<(), SessionError> {
    result.unwrap_or_else(|e| Err(e.into()))
}

impl ChatSession {
    /// Create a session. Cancelling `cancel` stops the session.
    pub fn new(
        ctx: RequestContext,
        source: Box<dyn ClientSource>,
        sink: Arc<dyn ClientSink>,
        services: SessionServices,
        cancel: CancellationToken,
    ) -> Self {
        let shutdown = Arc::new(ShutdownCoordinator::new(cancel.child_token()));
        Self {
            ctx,
            source,
            sink,
            services,
            caller: cancel,
            shutdown,
        }
    }

    pub fn handle(&self) -> SessionHandle {
        SessionHandle {
            shutdown: self.shutdown.clone(),
        }
    }

    pub fn phase(&self) -> SessionPhase {
        self.shutdown.phase()
    }

    pub fn ready(&self) -> impl Future<Output = bool> + Send + 'static {
        let handle = self.handle();
        async move { handle.ready().await }
    }

    /// Relay until the client ends the stream, either side fails, or the
    /// caller cancels. The upstream, if it was opened, is closed before this
    /// returns. The first error in completion order is returned.
    pub async fn run(self) -> Result<(), SessionError> {
        let Self {
            ctx,
            source,
            sink,
            services,
            caller,
            shutdown,
        } = self;
        let _guard = ShutdownGuard(shutdown.clone());
        let session_id = ctx.session_id.clone();

        info!(
            session_id = %session_id,
            user_id = %ctx.user_id,
            language = %ctx.language,
            "Chat session started"
        );

        let (ready_tx, ready_rx) = oneshot::channel::<RelayTask>();
        let inbound = InboundLoop {
            ctx,
            services,
            shutdown: shutdown.clone(),
            caller,
        };
        let mut inbound_task = tokio::spawn(supervise(
            shutdown.clone(),
            inbound.run(
                source,
                InitGate {
                    sink,
                    ready: ready_tx,
                },
            ),
        ));

        // The gate is dropped unfired when the inbound loop ends first.
        let result = match ready_rx.await {
            Err(_) => joined(inbound_task.await),
            Ok(mut outbound_task) => {
                let (first, rest) = tokio::select! {
                    result = &mut inbound_task => (joined(result), outbound_task),
                    result = &mut outbound_task => (joined(result), inbound_task),
                };
                shutdown.trigger().await;
                let second = joined(rest.await);
                first.and(second)
            }
        };

        // A panicked loop never reached its own shutdown trigger.
        shutdown.trigger().await;
        shutdown.advance(SessionPhase::Closed);

        match &result {
            Ok(()) => info!(session_id = %session_id, "Chat session ended"),
            Err(e) => {
                warn!(session_id = %session_id, code = e.code(), "Chat session failed: {}", e)
            }
        }
        result
    }
}
