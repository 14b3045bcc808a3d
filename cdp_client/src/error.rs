use futures::channel::mpsc::SendError;
use futures::channel::oneshot::Canceled;
use thiserror::Error;

use cdp_types::{MalformedMessage, ProtocolError};

use crate::domains::target::SessionId;
use crate::transport::TransportError;

pub type Result<T, E = CdpError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum CdpError {
    /// An inbound frame that is not a recognized envelope.
    #[error("{0}")]
    Malformed(#[from] MalformedMessage),
    /// The remote end reported that the command failed.
    #[error("{0}")]
    Protocol(#[from] ProtocolError),
    #[error("{0}")]
    Transport(#[from] TransportError),
    /// The connection is closing or closed, no more commands are accepted.
    #[error("The connection to the remote end is closed.")]
    ConnectionClosed,
    /// The command addressed a session that is not attached.
    #[error("Session {0:?} is not attached.")]
    UnknownSession(SessionId),
    #[error("Request timed out.")]
    Timeout,
    /// A successful response came without the `result` a typed command needs.
    #[error("Received no response from the remote end.")]
    NoResponse,
    #[error("{0}")]
    Serde(#[from] serde_json::Error),
    #[error("{0}")]
    ChannelSendError(SendError),
    #[error("{0}")]
    Url(#[from] url::ParseError),
}

impl CdpError {
    /// The remote-reported error, if the command failed on the remote end.
    pub fn as_protocol_error(&self) -> Option<&ProtocolError> {
        match self {
            CdpError::Protocol(err) => Some(err),
            _ => None,
        }
    }

    /// Whether this error means the whole connection is gone.
    pub fn is_connection_closed(&self) -> bool {
        matches!(self, CdpError::ConnectionClosed)
    }
}

/// The handler dropped the reply channel: it shut down before answering.
impl From<Canceled> for CdpError {
    fn from(_: Canceled) -> Self {
        CdpError::ConnectionClosed
    }
}

impl From<SendError> for CdpError {
    fn from(err: SendError) -> Self {
        if err.is_disconnected() {
            CdpError::ConnectionClosed
        } else {
            CdpError::ChannelSendError(err)
        }
    }
}
