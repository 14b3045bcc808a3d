use std::collections::VecDeque;
use std::fmt;
use std::mem;
use std::pin::Pin;
use std::task::ready;

use futures::stream::Stream;
use futures::task::{Context, Poll};
use futures::{SinkExt, StreamExt};

use cdp_types::{CallId, Message, MethodCall, MethodId};

use crate::domains::target::SessionId;
use crate::error::{CdpError, Result};
use crate::handler::HandlerConfig;
use crate::transport::{Transport, TransportError, WsTransport};

/// Writing the frames of `ids` to the transport failed.
#[derive(Debug)]
pub struct SendFailure {
    /// The calls whose frames may not have reached the remote end.
    pub ids: Vec<CallId>,
    pub error: TransportError,
}

/// Exchanges the messages with the transport
#[must_use = "streams do nothing unless polled"]
pub struct Connection {
    /// Queue of encoded commands to send.
    pending_commands: VecDeque<(CallId, String)>,
    /// Commands handed to the transport but not flushed yet.
    unflushed: Vec<CallId>,
    /// The channel to the remote end
    transport: Box<dyn Transport>,
    /// The identifier for a specific command
    next_id: u64,
}

impl Connection {
    pub fn new(transport: impl Transport + 'static) -> Self {
        Self {
            pending_commands: Default::default(),
            unflushed: Vec::new(),
            transport: Box::new(transport),
            next_id: 1,
        }
    }

    /// Open a websocket connection to `debug_ws_url`.
    pub async fn connect(debug_ws_url: impl AsRef<str>, config: &HandlerConfig) -> Result<Self> {
        let ws = WsTransport::connect(debug_ws_url, config).await?;
        Ok(Self::new(ws))
    }

    fn next_call_id(&mut self) -> CallId {
        let id = CallId::new(self.next_id);
        self.next_id = self.next_id.wrapping_add(1);
        id
    }

    /// Queue in the command to send over the transport and return the id for
    /// this command
    pub fn submit_command(
        &mut self,
        method: MethodId,
        session_id: Option<SessionId>,
        params: Option<serde_json::Value>,
    ) -> serde_json::Result<CallId> {
        let id = self.next_call_id();
        let call = MethodCall {
            id,
            method,
            session_id: session_id.map(Into::into),
            params,
        };
        let msg = call.encode()?;
        self.pending_commands.push_back((id, msg));
        Ok(id)
    }

    /// Number of commands not yet handed to the transport.
    pub fn queued(&self) -> usize {
        self.pending_commands.len()
    }

    /// Drop every queued command that was not written yet.
    pub fn clear_queue(&mut self) -> Vec<CallId> {
        self.unflushed.clear();
        self.pending_commands.drain(..).map(|(id, _)| id).collect()
    }

    /// Write all queued commands in order and flush them.
    ///
    /// Resolves once the queue is empty and flushed. On failure the calls
    /// affected by the failed write are reported.
    pub fn poll_flush_commands(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), SendFailure>> {
        while !self.pending_commands.is_empty() {
            match self.transport.poll_ready_unpin(cx) {
                Poll::Ready(Ok(())) => {}
                Poll::Ready(Err(error)) => return Poll::Ready(Err(self.send_failure(error))),
                Poll::Pending => return Poll::Pending,
            }

            if let Some((id, msg)) = self.pending_commands.pop_front() {
                tracing::trace!(target: "cdp_client::conn", %id, "Sending {}", msg);
                self.unflushed.push(id);
                if let Err(error) = self.transport.start_send_unpin(msg) {
                    return Poll::Ready(Err(self.send_failure(error)));
                }
            }
        }

        if !self.unflushed.is_empty() {
            if let Err(error) = ready!(self.transport.poll_flush_unpin(cx)) {
                return Poll::Ready(Err(self.send_failure(error)));
            }
            self.unflushed.clear();
        }

        Poll::Ready(Ok(()))
    }

    /// The calls a failed write affects: everything written but not flushed,
    /// or the next queued command if nothing was.
    fn send_failure(&mut self, error: TransportError) -> SendFailure {
        let mut ids = mem::take(&mut self.unflushed);
        if ids.is_empty() {
            if let Some((id, _)) = self.pending_commands.pop_front() {
                ids.push(id);
            }
        }
        SendFailure { ids, error }
    }

    /// Close the transport.
    pub fn poll_close(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), TransportError>> {
        self.transport.poll_close_unpin(cx)
    }
}

impl Stream for Connection {
    type Item = Result<Message>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let pin = self.get_mut();

        match ready!(pin.transport.poll_next_unpin(cx)) {
            Some(Ok(text)) => {
                let ready = match Message::decode(&text) {
                    Ok(msg) => {
                        tracing::trace!(target: "cdp_client::conn", "Received {:?}", msg);
                        Ok(msg)
                    }
                    Err(err) => {
                        tracing::debug!(target: "cdp_client::conn::parse_errors", msg = text, "Failed to parse raw message");
                        tracing::warn!(target: "cdp_client::conn", "Dropping malformed message: {}", err);
                        Err(CdpError::Malformed(err))
                    }
                };
                Poll::Ready(Some(ready))
            }
            Some(Err(err)) => Poll::Ready(Some(Err(CdpError::Transport(err)))),
            // transport closed
            None => Poll::Ready(None),
        }
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("pending_commands", &self.pending_commands.len())
            .field("unflushed", &self.unflushed)
            .field("next_id", &self.next_id)
            .finish()
    }
}
