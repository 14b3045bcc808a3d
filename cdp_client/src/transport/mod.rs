//! The bidirectional message channel the dispatch core runs on.
//!
//! A transport moves whole text frames: it yields every inbound frame as a
//! `String` and accepts outbound frames through its `Sink` half. The stream
//! ending means the remote end is gone.

use std::io;
use std::sync::Arc;

use futures::{Sink, Stream};
use thiserror::Error;
use tokio_tungstenite::tungstenite;

pub mod channel;
pub mod ws;

pub use self::channel::{channel, ChannelTransport, RemoteEndpoint};
pub use self::ws::WsTransport;

/// A message channel to the remote end of the protocol.
pub trait Transport:
    Stream<Item = Result<String, TransportError>> + Sink<String, Error = TransportError> + Send + Unpin
{
}

impl<T> Transport for T where
    T: Stream<Item = Result<String, TransportError>>
        + Sink<String, Error = TransportError>
        + Send
        + Unpin
{
}

/// A local read or write failure on the transport.
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    #[error("{0}")]
    Ws(Arc<tungstenite::Error>),
    #[error("{0}")]
    Io(Arc<io::Error>),
    #[error("Received a binary frame that is not valid UTF-8.")]
    NonUtf8Frame,
    #[error("The transport is closed.")]
    Closed,
}

impl TransportError {
    /// Whether the channel is unusable after this error.
    pub fn is_fatal(&self) -> bool {
        match self {
            TransportError::Ws(err) => matches!(
                **err,
                tungstenite::Error::AlreadyClosed
                    | tungstenite::Error::ConnectionClosed
                    | tungstenite::Error::Io(_)
                    | tungstenite::Error::Protocol(
                        tungstenite::error::ProtocolError::ResetWithoutClosingHandshake
                    )
            ),
            TransportError::Io(_) | TransportError::Closed => true,
            TransportError::NonUtf8Frame => false,
        }
    }
}

impl From<tungstenite::Error> for TransportError {
    fn from(err: tungstenite::Error) -> Self {
        TransportError::Ws(Arc::new(err))
    }
}

impl From<io::Error> for TransportError {
    fn from(err: io::Error) -> Self {
        TransportError::Io(Arc::new(err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fatal_errors() {
        assert!(TransportError::Closed.is_fatal());
        assert!(TransportError::from(tungstenite::Error::AlreadyClosed).is_fatal());
        assert!(TransportError::from(io::Error::from(io::ErrorKind::BrokenPipe)).is_fatal());
        assert!(!TransportError::NonUtf8Frame.is_fatal());
    }
}
