use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

/// Lifecycle of a connection.
///
/// Moves forward only: `Connected` -> `Closing` -> `Closed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum ConnectionState {
    /// Commands are accepted and events delivered.
    Connected = 0,
    /// Shutting down: pending calls are failed, no new commands are accepted.
    Closing = 1,
    /// Terminal.
    Closed = 2,
}

impl ConnectionState {
    fn from_u8(n: u8) -> Self {
        match n {
            0 => ConnectionState::Connected,
            1 => ConnectionState::Closing,
            _ => ConnectionState::Closed,
        }
    }

    /// Whether commands are still accepted.
    pub fn is_connected(self) -> bool {
        self == ConnectionState::Connected
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ConnectionState::Connected => "connected",
            ConnectionState::Closing => "closing",
            ConnectionState::Closed => "closed",
        };
        f.write_str(s)
    }
}

/// The connection state shared between the handler, which drives it, and
/// every client, which reads it.
#[derive(Debug, Clone)]
pub struct ConnectionStatus {
    state: Arc<AtomicU8>,
}

impl Default for ConnectionStatus {
    fn default() -> Self {
        Self {
            state: Arc::new(AtomicU8::new(ConnectionState::Connected as u8)),
        }
    }
}

impl ConnectionStatus {
    pub fn get(&self) -> ConnectionState {
        ConnectionState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Advance to `next`, returns `false` if the state already was `next` or
    /// past it.
    pub fn advance(&self, next: ConnectionState) -> bool {
        let prev = self.state.fetch_max(next as u8, Ordering::AcqRel);
        prev < next as u8
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_moves_forward() {
        let status = ConnectionStatus::default();
        let client_view = status.clone();
        assert_eq!(client_view.get(), ConnectionState::Connected);

        assert!(status.advance(ConnectionState::Closing));
        assert!(!status.advance(ConnectionState::Closing));
        assert_eq!(client_view.get(), ConnectionState::Closing);

        assert!(status.advance(ConnectionState::Closed));
        assert!(!status.advance(ConnectionState::Closing));
        assert_eq!(client_view.get(), ConnectionState::Closed);
        assert!(!client_view.get().is_connected());
    }
}
