use std::pin::Pin;
use std::task::{ready, Context, Poll};

use futures::{Sink, SinkExt, Stream, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::protocol::WebSocketConfig;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use super::TransportError;
use crate::handler::HandlerConfig;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Exchanges text frames with a websocket debugging endpoint.
#[must_use = "streams do nothing unless polled"]
#[derive(Debug)]
pub struct WsTransport {
    ws: WsStream,
}

impl WsTransport {
    /// Open a websocket to `debug_ws_url`.
    pub async fn connect(
        debug_ws_url: impl AsRef<str>,
        config: &HandlerConfig,
    ) -> Result<Self, TransportError> {
        let mut ws_config = WebSocketConfig::default();
        ws_config.max_message_size = config.max_message_size;
        ws_config.max_frame_size = config.max_frame_size;

        let (ws, _) = tokio_tungstenite::connect_async_with_config(
            debug_ws_url.as_ref(),
            Some(ws_config),
            false,
        )
        .await?;

        tracing::debug!(target: "cdp_client::transport::ws", url = debug_ws_url.as_ref(), "websocket connected");
        Ok(Self { ws })
    }

    /// Wrap an already established websocket.
    pub fn new(ws: WsStream) -> Self {
        Self { ws }
    }
}

impl Stream for WsTransport {
    type Item = Result<String, TransportError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let pin = self.get_mut();

        loop {
            let msg = match ready!(pin.ws.poll_next_unpin(cx)) {
                Some(Ok(WsMessage::Text(text))) => Ok(text.as_str().to_owned()),
                Some(Ok(WsMessage::Binary(bin))) => {
                    String::from_utf8(bin.to_vec()).map_err(|_| TransportError::NonUtf8Frame)
                }
                Some(Ok(WsMessage::Close(frame))) => {
                    tracing::debug!(target: "cdp_client::transport::ws", ?frame, "received close frame");
                    return Poll::Ready(None);
                }
                // ping, pong and raw frames
                Some(Ok(_)) => continue,
                Some(Err(err)) => Err(err.into()),
                None => return Poll::Ready(None),
            };
            return Poll::Ready(Some(msg));
        }
    }
}

impl Sink<String> for WsTransport {
    type Error = TransportError;

    fn poll_ready(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.get_mut().ws.poll_ready_unpin(cx).map_err(Into::into)
    }

    fn start_send(self: Pin<&mut Self>, item: String) -> Result<(), Self::Error> {
        self.get_mut()
            .ws
            .start_send_unpin(WsMessage::text(item))
            .map_err(Into::into)
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.get_mut().ws.poll_flush_unpin(cx).map_err(Into::into)
    }

    fn poll_close(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.get_mut().ws.poll_close_unpin(cx).map_err(Into::into)
    }
}
