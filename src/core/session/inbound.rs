//! Client → upstream relay loop.
//!
//! The loop owns the client source. The first `Start` or `Audio` message
//! opens the upstream; after that audio is forwarded unchanged.

use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::outbound::OutboundLoop;
use super::shutdown::{SessionPhase, ShutdownCoordinator};
use super::{
    ChatRequest, ClientSink, ClientSource, RequestContext, SeedRequest, SessionError,
    SessionServices, stopped, supervise,
};
use crate::core::prompt;
use crate::core::realtime::{SessionSetup, SharedUpstream};

pub(crate) type RelayTask = JoinHandle<Result<(), SessionError>>;

/// What the inbound loop needs to start the outbound side exactly once.
pub(crate) struct InitGate {
    pub(crate) sink: Arc<dyn ClientSink>,
    /// Fired with the outbound task once the upstream is ready
    pub(crate) ready: oneshot::Sender<RelayTask>,
}

enum InboundState {
    Uninitialized(InitGate),
    Active(SharedUpstream),
}

pub(crate) struct InboundLoop {
    pub(crate) ctx: RequestContext,
    pub(crate) services: SessionServices,
    pub(crate) shutdown: Arc<ShutdownCoordinator>,
    pub(crate) caller: CancellationToken,
}

impl InboundLoop {
    pub(crate) async fn run(
        self,
        mut source: Box<dyn ClientSource>,
        gate: InitGate,
    ) -> Result<(), SessionError> {
        let token = self.shutdown.token().clone();
        let mut state = InboundState::Uninitialized(gate);
        let mut received_audio_bytes = 0usize;

        loop {
            let received = tokio::select! {
                biased;
                _ = token.cancelled() => return stopped(&self.caller),
                received = source.receive() => received?,
            };

            let Some(message) = received else {
                debug!(
                    session_id = %self.ctx.session_id,
                    received_audio_bytes,
                    "Client ended the stream"
                );
                return Ok(());
            };

            if let ChatRequest::Audio(audio) = &message {
                received_audio_bytes += audio.len();
            }

            state = tokio::select! {
                biased;
                _ = token.cancelled() => return stopped(&self.caller),
                next = self.transition(state, message) => next?,
            };
        }
    }

    async fn transition(
        &self,
        state: InboundState,
        message: ChatRequest,
    ) -> Result<InboundState, SessionError> {
        match (state, message) {
            (state @ InboundState::Uninitialized(_), ChatRequest::KeepAlive) => Ok(state),
            (InboundState::Uninitialized(gate), ChatRequest::Start(request)) => {
                let upstream = self.initialize(gate, &request).await?;
                Ok(InboundState::Active(upstream))
            }
            (InboundState::Uninitialized(gate), ChatRequest::Audio(audio)) => {
                let upstream = self.initialize(gate, &SeedRequest::default()).await?;
                self.forward(&upstream, audio).await?;
                Ok(InboundState::Active(upstream))
            }
            (InboundState::Active(upstream), ChatRequest::Audio(audio)) => {
                self.forward(&upstream, audio).await?;
                Ok(InboundState::Active(upstream))
            }
            (state @ InboundState::Active(_), ChatRequest::Start(_)) => {
                debug!(
                    session_id = %self.ctx.session_id,
                    "Ignoring start message on an initialized session"
                );
                Ok(state)
            }
            (state @ InboundState::Active(_), ChatRequest::KeepAlive) => Ok(state),
        }
    }

    async fn forward(&self, upstream: &SharedUpstream, audio: Bytes) -> Result<(), SessionError> {
        if audio.is_empty() {
            return Ok(());
        }
        upstream.send_audio(audio).await?;
        Ok(())
    }

    /// Resolve the seed, open the upstream, prime it, start the outbound loop
    /// and fire the init gate.
    async fn initialize(
        &self,
        gate: InitGate,
        request: &SeedRequest,
    ) -> Result<SharedUpstream, SessionError> {
        self.shutdown.advance(SessionPhase::Initializing);
        let language = self.ctx.language.as_str();

        let seed = self.services.resolver.resolve(&self.ctx, request).await?;
        let setup = SessionSetup {
            instructions: prompt::system_instruction(seed.kind, language, &seed.text),
            tools: prompt::tools(seed.kind),
            language_code: prompt::speech_locale(language).to_string(),
        };

        let upstream = self.services.connector.open(setup).await?;
        if !self.shutdown.attach(upstream.clone()).await {
            return Err(SessionError::Cancelled);
        }

        upstream.send_text(prompt::greeting(language)).await?;

        let outbound = OutboundLoop {
            upstream: upstream.clone(),
            sink: gate.sink,
            session_id: self.ctx.session_id.clone(),
            shutdown: self.shutdown.clone(),
            caller: self.caller.clone(),
            relay_tool_calls: self.services.relay_tool_calls,
        };
        let task = tokio::spawn(supervise(self.shutdown.clone(), outbound.run()));

        self.shutdown.mark_initialized();
        if gate.ready.send(task).is_err() {
            debug!(session_id = %self.ctx.session_id, "Session controller is gone");
        }

        info!(
            session_id = %self.ctx.session_id,
            user_id = %self.ctx.user_id,
            provider = self.services.connector.provider_name(),
            seed_kind = ?seed.kind,
            seed_bytes = seed.text.len(),
            "Upstream session ready"
        );

        Ok(upstream)
    }
}
