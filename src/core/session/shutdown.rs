//! Exactly-once upstream shutdown and session phase tracking.

use std::sync::OnceLock;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::core::realtime::SharedUpstream;

/// Observable lifecycle of a relay session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum SessionPhase {
    /// No upstream yet; only the inbound loop runs
    Uninitialized,
    /// First message seen, upstream open in progress
    Initializing,
    /// Upstream open and both loops running
    Active,
    /// A loop has exited and shutdown was triggered
    Closing,
    /// Terminal
    Closed,
}

impl std::fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionPhase::Uninitialized => write!(f, "uninitialized"),
            SessionPhase::Initializing => write!(f, "initializing"),
            SessionPhase::Active => write!(f, "active"),
            SessionPhase::Closing => write!(f, "closing"),
            SessionPhase::Closed => write!(f, "closed"),
        }
    }
}

/// Owns the session's upstream slot and guarantees it is closed once.
///
/// The upstream is attached at most once. `close_once` may race from any task;
/// only the first caller closes the upstream, later callers return at once.
pub struct ShutdownCoordinator {
    upstream: OnceLock<SharedUpstream>,
    closed: AtomicBool,
    /// Set by whichever path actually calls `close` on the upstream
    upstream_closed: AtomicBool,
    /// Stops both relay loops; child of the caller's token
    token: CancellationToken,
    phase: watch::Sender<SessionPhase>,
    initialized: AtomicBool,
}

impl ShutdownCoordinator {
    pub(crate) fn new(token: CancellationToken) -> Self {
        let (phase, _) = watch::channel(SessionPhase::Uninitialized);
        Self {
            upstream: OnceLock::new(),
            closed: AtomicBool::new(false),
            upstream_closed: AtomicBool::new(false),
            token,
            phase,
            initialized: AtomicBool::new(false),
        }
    }

    /// Attach the freshly opened upstream. If shutdown already happened the
    /// upstream is closed right away and `false` is returned.
    pub(crate) async fn attach(&self, upstream: SharedUpstream) -> bool {
        if self.upstream.set(upstream.clone()).is_err() {
            tracing::error!("Upstream attached twice, closing the extra connection");
            let _ = upstream.close().await;
            return false;
        }
        if self.is_closed() {
            self.close_upstream().await;
            return false;
        }
        true
    }

    async fn close_upstream(&self) {
        let Some(upstream) = self.upstream.get() else {
            return;
        };
        if self.upstream_closed.swap(true, Ordering::AcqRel) {
            return;
        }
        if let Err(e) = upstream.close().await {
            tracing::warn!("Failed to close upstream connection: {}", e);
        }
    }

    /// Whether an intentional close has started.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Close the upstream if this is the first call. Returns whether this call
    /// performed the transition.
    pub async fn close_once(&self) -> bool {
        if self
            .closed
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return false;
        }

        self.advance(SessionPhase::Closing);
        self.close_upstream().await;
        true
    }

    /// Stop both loops and close the upstream.
    pub async fn trigger(&self) {
        self.advance(SessionPhase::Closing);
        self.token.cancel();
        self.close_once().await;
    }

    pub(crate) fn token(&self) -> &CancellationToken {
        &self.token
    }

    pub(crate) fn mark_initialized(&self) {
        self.initialized.store(true, Ordering::Release);
        self.advance(SessionPhase::Active);
    }

    pub(crate) fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::Acquire)
    }

    /// Move the phase forward. Phases never go backwards.
    pub(crate) fn advance(&self, next: SessionPhase) {
        self.phase.send_if_modified(|current| {
            if next > *current {
                *current = next;
                true
            } else {
                false
            }
        });
    }

    pub fn phase(&self) -> SessionPhase {
        *self.phase.borrow()
    }

    pub(crate) fn subscribe(&self) -> watch::Receiver<SessionPhase> {
        self.phase.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::realtime::{
        RealtimeError, RealtimeResult, UpstreamConnection, UpstreamEvent,
    };
    use async_trait::async_trait;
    use bytes::Bytes;
    use std::sync::Arc;
    use std::sync::atomic::AtomicUsize;

    #[derive(Default)]
    struct CountingUpstream {
        closes: AtomicUsize,
    }

    #[async_trait]
    impl UpstreamConnection for CountingUpstream {
        async fn send_audio(&self, _audio: Bytes) -> RealtimeResult<()> {
            Ok(())
        }
        async fn send_text(&self, _text: &str) -> RealtimeResult<()> {
            Ok(())
        }
        async fn receive(&self) -> RealtimeResult<UpstreamEvent> {
            Err(RealtimeError::NotConnected)
        }
        async fn close(&self) -> RealtimeResult<()> {
            self.closes.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_close_once_without_upstream_is_noop() {
        let coordinator = ShutdownCoordinator::new(CancellationToken::new());
        assert!(coordinator.close_once().await);
        assert!(!coordinator.close_once().await);
        assert!(coordinator.is_closed());
        assert_eq!(coordinator.phase(), SessionPhase::Closing);
    }

    #[tokio::test]
    async fn test_concurrent_close_closes_once() {
        let coordinator = Arc::new(ShutdownCoordinator::new(CancellationToken::new()));
        let upstream = Arc::new(CountingUpstream::default());
        assert!(coordinator.attach(upstream.clone()).await);

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let coordinator = coordinator.clone();
                tokio::spawn(async move { coordinator.close_once().await })
            })
            .collect();

        let mut winners = 0;
        for handle in handles {
            if handle.await.unwrap() {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);
        assert_eq!(upstream.closes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_attach_after_close_closes_immediately() {
        let coordinator = ShutdownCoordinator::new(CancellationToken::new());
        coordinator.close_once().await;

        let upstream = Arc::new(CountingUpstream::default());
        assert!(!coordinator.attach(upstream.clone()).await);
        assert_eq!(upstream.closes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_trigger_cancels_token() {
        let token = CancellationToken::new();
        let coordinator = ShutdownCoordinator::new(token.clone());
        coordinator.trigger().await;
        assert!(token.is_cancelled());
        assert!(coordinator.is_closed());
    }

    #[test]
    fn test_phase_never_moves_backwards() {
        let coordinator = ShutdownCoordinator::new(CancellationToken::new());
        coordinator.advance(SessionPhase::Active);
        coordinator.advance(SessionPhase::Initializing);
        assert_eq!(coordinator.phase(), SessionPhase::Active);
        coordinator.advance(SessionPhase::Closed);
        assert_eq!(coordinator.phase(), SessionPhase::Closed);
    }
}
