//! Upstream → client relay loop.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use super::shutdown::ShutdownCoordinator;
use super::{ChatResponse, ClientSink, SessionError, stopped};
use crate::core::prompt::{NAVIGATE_TO_INGREDIENTS, NAVIGATE_TO_STEP};
use crate::core::realtime::{FunctionCall, RealtimeError, SharedUpstream, UpstreamPart};

pub(crate) struct OutboundLoop {
    pub(crate) upstream: SharedUpstream,
    pub(crate) sink: Arc<dyn ClientSink>,
    pub(crate) session_id: String,
    pub(crate) shutdown: Arc<ShutdownCoordinator>,
    pub(crate) caller: CancellationToken,
    pub(crate) relay_tool_calls: bool,
}

impl OutboundLoop {
    pub(crate) async fn run(self) -> Result<(), SessionError> {
        let token = self.shutdown.token().clone();
        let mut forwarded_bytes = 0usize;

        loop {
            let received = tokio::select! {
                biased;
                _ = token.cancelled() => return stopped(&self.caller),
                received = self.upstream.receive() => received,
            };

            let event = match received {
                Ok(event) => event,
                Err(e) => return self.upstream_failed(e, forwarded_bytes),
            };

            for part in event.parts {
                match part {
                    UpstreamPart::InlineData { mime_type, data }
                        if mime_type.starts_with("audio/pcm") =>
                    {
                        forwarded_bytes += data.len();
                        self.deliver(ChatResponse::Audio(data)).await?;
                    }
                    UpstreamPart::FunctionCall(call) if self.relay_tool_calls => {
                        self.relay_tool_call(call).await?;
                    }
                    other => trace!(
                        session_id = %self.session_id,
                        part = ?other,
                        "Ignoring non-audio part"
                    ),
                }
                if token.is_cancelled() {
                    return stopped(&self.caller);
                }
            }
        }
    }

    /// Send to the client, giving up once the session is shutting down.
    ///
    /// A client that stops reading must not hold the loop open past shutdown.
    async fn deliver(&self, response: ChatResponse) -> Result<(), SessionError> {
        tokio::select! {
            biased;
            _ = self.shutdown.token().cancelled() => Ok(()),
            sent = self.sink.send(response) => sent,
        }
    }

    /// Receive errors after an intentional close are expected.
    fn upstream_failed(
        &self,
        e: RealtimeError,
        forwarded_bytes: usize,
    ) -> Result<(), SessionError> {
        if self.shutdown.is_closed() {
            debug!(
                session_id = %self.session_id,
                forwarded_bytes,
                "Upstream receive ended after close: {}",
                e
            );
            return Ok(());
        }
        warn!(session_id = %self.session_id, "Upstream receive failed: {}", e);
        Err(e.into())
    }

    async fn relay_tool_call(&self, call: FunctionCall) -> Result<(), SessionError> {
        let Some(response) = tool_call_response(&call) else {
            warn!(
                session_id = %self.session_id,
                name = %call.name,
                args = %call.args,
                "Dropping unsupported tool call"
            );
            return Ok(());
        };

        debug!(session_id = %self.session_id, name = %call.name, "Relaying tool call");
        self.deliver(response).await?;
        if self.shutdown.token().is_cancelled() {
            return stopped(&self.caller);
        }

        match self.upstream.send_tool_response(&call).await {
            Ok(()) => Ok(()),
            Err(e) if self.shutdown.is_closed() => {
                debug!(session_id = %self.session_id, "Tool ack after close: {}", e);
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }
}

fn index_arg(args: &serde_json::Value, name: &str) -> Option<u32> {
    let value = args.get(name)?;
    let index = value.as_u64().or_else(|| {
        value
            .as_f64()
            .filter(|f| *f >= 0.0 && f.fract() == 0.0)
            .map(|f| f as u64)
    })?;
    u32::try_from(index).ok()
}

/// Map a model tool call to a client control message.
pub(crate) fn tool_call_response(call: &FunctionCall) -> Option<ChatResponse> {
    match call.name.as_str() {
        NAVIGATE_TO_STEP => Some(ChatResponse::NavigateToStep {
            step: index_arg(&call.args, "step")?,
            group: index_arg(&call.args, "group"),
        }),
        NAVIGATE_TO_INGREDIENTS => Some(ChatResponse::NavigateToIngredients),
        _ => None,
    }
}
