use std::pin::Pin;
use std::task::{Context, Poll};

use futures::channel::mpsc::{self, UnboundedReceiver, UnboundedSender};
use futures::{Sink, Stream, StreamExt};

use cdp_types::{CallId, CdpEventMessage, Message, MethodCall, ProtocolError, Response};

use super::TransportError;

/// Create an in-memory transport together with the endpoint that plays the
/// remote side of it.
pub fn channel() -> (ChannelTransport, RemoteEndpoint) {
    let (to_remote, from_client) = mpsc::unbounded();
    let (to_client, from_remote) = mpsc::unbounded();
    (
        ChannelTransport {
            outgoing: to_remote,
            incoming: from_remote,
        },
        RemoteEndpoint {
            incoming: from_client,
            outgoing: to_client,
        },
    )
}

/// The client half of [`channel`].
#[must_use = "streams do nothing unless polled"]
#[derive(Debug)]
pub struct ChannelTransport {
    outgoing: UnboundedSender<String>,
    incoming: UnboundedReceiver<String>,
}

impl Stream for ChannelTransport {
    type Item = Result<String, TransportError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.get_mut().incoming.poll_next_unpin(cx).map(|msg| msg.map(Ok))
    }
}

impl Sink<String> for ChannelTransport {
    type Error = TransportError;

    fn poll_ready(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Pin::new(&mut self.get_mut().outgoing)
            .poll_ready(cx)
            .map_err(|_| TransportError::Closed)
    }

    fn start_send(self: Pin<&mut Self>, item: String) -> Result<(), Self::Error> {
        self.get_mut()
            .outgoing
            .unbounded_send(item)
            .map_err(|_| TransportError::Closed)
    }

    fn poll_flush(self: Pin<&mut Self>, _: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn poll_close(self: Pin<&mut Self>, _: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.get_mut().outgoing.close_channel();
        Poll::Ready(Ok(()))
    }
}

/// The remote half of [`channel`]: reads the commands a client wrote and
/// writes responses and events back.
#[derive(Debug)]
pub struct RemoteEndpoint {
    incoming: UnboundedReceiver<String>,
    outgoing: UnboundedSender<String>,
}

impl RemoteEndpoint {
    /// The next raw frame the client wrote, `None` once the client closed
    /// its side.
    pub async fn next_frame(&mut self) -> Option<String> {
        self.incoming.next().await
    }

    /// The next command the client wrote.
    ///
    /// Frames that do not decode as commands are skipped.
    pub async fn next_call(&mut self) -> Option<MethodCall> {
        while let Some(text) = self.incoming.next().await {
            match Message::decode(&text) {
                Ok(Message::Command(call)) => return Some(call),
                Ok(other) => {
                    tracing::warn!(target: "cdp_client::transport::channel", ?other, "client wrote a non command envelope")
                }
                Err(err) => {
                    tracing::warn!(target: "cdp_client::transport::channel", %err, "client wrote a malformed frame")
                }
            }
        }
        None
    }

    /// Reply to `id` with a successful `result`.
    pub fn respond(&self, id: CallId, result: serde_json::Value) -> bool {
        self.send_response(&Response::success(id, result))
    }

    /// Reply to `id` with a protocol error.
    pub fn respond_error(&self, id: CallId, code: i64, message: impl Into<String>) -> bool {
        self.send_response(&Response::failure(id, ProtocolError::new(code, message)))
    }

    pub fn send_response(&self, response: &Response) -> bool {
        serde_json::to_string(response)
            .map(|text| self.send_raw(text))
            .unwrap_or(false)
    }

    /// Push an event to the client.
    pub fn emit(&self, event: &CdpEventMessage) -> bool {
        serde_json::to_string(event)
            .map(|text| self.send_raw(text))
            .unwrap_or(false)
    }

    /// Push an arbitrary frame to the client.
    pub fn send_raw(&self, text: impl Into<String>) -> bool {
        self.outgoing.unbounded_send(text.into()).is_ok()
    }

    /// Whether the client side went away.
    pub fn is_closed(&self) -> bool {
        self.outgoing.is_closed()
    }

    /// Hang up: the client observes the end of its inbound stream.
    pub fn close(&mut self) {
        self.outgoing.close_channel();
    }
}
