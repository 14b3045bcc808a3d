use std::pin::Pin;
use std::task::ready;
use std::time::{Duration, Instant};

use futures::channel::mpsc::Receiver;
use futures::channel::oneshot::Sender as OneshotSender;
use futures::stream::{Fuse, Stream, StreamExt};
use futures::task::{Context, Poll};

use cdp_types::{CdpEventMessage, Message, Response};

use crate::cmd::CommandMessage;
use crate::conn::{Connection, SendFailure};
use crate::error::{CdpError, Result};
use crate::handler::job::PeriodicJob;
use crate::listeners::{EventListenerRequest, EventListeners};

pub use self::pending::PendingCalls;
pub use self::session::{Route, Session, SessionRouter};
pub use self::state::{ConnectionState, ConnectionStatus};

/// Standard timeout in MS
pub const REQUEST_TIMEOUT: u64 = 30_000;

/// How often timed out and abandoned calls are evicted, in MS
pub const HOUSEKEEPING_INTERVAL: u64 = 1_000;

/// Capacity of the channel between the clients and the handler
pub const CHANNEL_CAPACITY: usize = 1_000;

pub mod commandfuture;
mod job;
pub mod pending;
pub mod session;
pub mod state;

/// The handler that owns the connection to the remote end and drives all the
/// requests and events.
///
/// It has to be polled continuously, usually in a task of its own, for any
/// [`Client`](crate::Client) call to make progress. The stream yields an
/// error for every malformed inbound frame and every transport failure; the
/// connection stays usable unless the failure was fatal. It ends once the
/// connection is closed.
#[must_use = "streams do nothing unless polled"]
#[derive(Debug)]
pub struct Handler {
    /// Commands that are being processed and awaiting a response from the
    /// remote end.
    pending_commands: PendingCalls,
    /// Messages from the clients
    from_client: Fuse<Receiver<HandlerMessage>>,
    /// Keeps track of all the current active sessions
    sessions: SessionRouter,
    /// The connection to the remote end
    conn: Connection,
    /// Evicts timed out and abandoned requests periodically
    housekeeping: PeriodicJob,
    config: HandlerConfig,
    /// All registered event subscriptions
    event_listeners: EventListeners,
    /// Shared with every client
    status: ConnectionStatus,
    /// Callers of `close` waiting for the shutdown to finish
    close_waiters: Vec<OneshotSender<Result<()>>>,
}

impl Handler {
    /// Create a new `Handler` that drives the connection and listens for
    /// messages on the receiver `rx`.
    pub(crate) fn new(
        conn: Connection,
        rx: Receiver<HandlerMessage>,
        config: HandlerConfig,
        status: ConnectionStatus,
    ) -> Self {
        Self {
            pending_commands: Default::default(),
            from_client: rx.fuse(),
            sessions: Default::default(),
            conn,
            housekeeping: PeriodicJob::new(config.housekeeping_interval),
            config,
            event_listeners: Default::default(),
            status,
            close_waiters: Vec::new(),
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.status.get()
    }

    /// All currently attached sessions.
    pub fn sessions(&self) -> impl Iterator<Item = &Session> + '_ {
        self.sessions.sessions()
    }

    /// Number of commands awaiting their response.
    pub fn pending_commands(&self) -> usize {
        self.pending_commands.len()
    }

    /// Number of live event subscriptions.
    pub fn event_listeners(&self) -> usize {
        self.event_listeners.len()
    }

    pub fn config(&self) -> &HandlerConfig {
        &self.config
    }

    /// Submit a command initiated via channel
    fn submit_command(&mut self, msg: CommandMessage, now: Instant) {
        let CommandMessage {
            method,
            session_id,
            params,
            sender,
        } = msg;

        if sender.is_canceled() {
            tracing::trace!(target: "cdp_client::handler", %method, "Skipping command abandoned before it was sent");
            return;
        }

        if let Err(err) = self.sessions.resolve_target(session_id.as_ref()) {
            tracing::debug!(target: "cdp_client::handler", %method, "Rejecting command: {}", err);
            let _ = sender.send(Err(err));
            return;
        }

        match self
            .conn
            .submit_command(method.clone(), session_id, params)
        {
            Ok(call_id) => self
                .pending_commands
                .register(call_id, method, sender, now),
            Err(err) => {
                let _ = sender.send(Err(err.into()));
            }
        }
    }

    /// Received a response to a request.
    fn on_response(&mut self, resp: Response) {
        if resp.result.is_some() && resp.error.is_some() {
            tracing::warn!(target: "cdp_client::handler", id = %resp.id, "Response carries both a result and an error, treating it as an error");
        }
        self.pending_commands.resolve(resp.id, Ok(resp));
    }

    /// Process an incoming event read from the transport.
    ///
    /// The routing table is updated before the event is published.
    fn on_event(&mut self, event: CdpEventMessage) {
        self.sessions.on_event(&event);
        self.event_listeners.start_send(event);
    }

    /// Fail the calls a failed write affected, returns whether the connection
    /// has to be torn down.
    fn on_send_failure(&mut self, failure: SendFailure) -> bool {
        let SendFailure { ids, error } = failure;
        tracing::error!(target: "cdp_client::handler", "Failed to write to the transport: {}", error);
        for id in ids {
            self.pending_commands
                .resolve(id, Err(CdpError::Transport(error.clone())));
        }
        error.is_fatal()
    }

    fn on_client_message(&mut self, msg: HandlerMessage, now: Instant) {
        match msg {
            HandlerMessage::Command(cmd) => self.submit_command(cmd, now),
            HandlerMessage::AddEventListener(req) => self.event_listeners.add_listener(req),
            HandlerMessage::GetSessions(tx) => {
                let _ = tx.send(self.sessions.sessions().cloned().collect());
            }
            HandlerMessage::Close(tx) => {
                self.close_waiters.push(tx);
                self.begin_close("close requested");
            }
        }
    }

    /// Enter `Closing`: fail everything in flight, complete every event
    /// stream and stop accepting messages.
    fn begin_close(&mut self, reason: &str) {
        if !self.status.advance(ConnectionState::Closing) {
            return;
        }
        tracing::debug!(target: "cdp_client::handler", "Closing connection: {}", reason);

        let unsent = self.conn.clear_queue();
        let failed = self
            .pending_commands
            .fail_all(|| CdpError::ConnectionClosed);
        tracing::trace!(target: "cdp_client::handler", unsent = unsent.len(), failed, "Failed in-flight commands");

        self.event_listeners.close_all();
        self.sessions.clear();

        // reject whatever the clients managed to queue up
        let from_client = self.from_client.get_mut();
        from_client.close();
        while let Ok(msg) = from_client.try_recv() {
            match msg {
                HandlerMessage::Command(cmd) => {
                    let _ = cmd.sender.send(Err(CdpError::ConnectionClosed));
                }
                HandlerMessage::AddEventListener(req) => {
                    // dropping the sender completes the stream
                    drop(req);
                }
                HandlerMessage::GetSessions(tx) => {
                    let _ = tx.send(Vec::new());
                }
                HandlerMessage::Close(tx) => self.close_waiters.push(tx),
            }
        }
    }

    /// Close the transport and enter `Closed`.
    fn poll_shutdown(&mut self, cx: &mut Context<'_>) -> Poll<()> {
        if let Err(err) = ready!(self.conn.poll_close(cx)) {
            tracing::debug!(target: "cdp_client::handler", "Error while closing the transport: {}", err);
        }
        self.status.advance(ConnectionState::Closed);
        for tx in self.close_waiters.drain(..) {
            let _ = tx.send(Ok(()));
        }
        tracing::debug!(target: "cdp_client::handler", "Connection closed");
        Poll::Ready(())
    }
}

impl Stream for Handler {
    type Item = Result<()>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let pin = self.get_mut();

        loop {
            match pin.status.get() {
                ConnectionState::Connected => {}
                ConnectionState::Closing => {
                    ready!(pin.poll_shutdown(cx));
                    return Poll::Ready(None);
                }
                ConnectionState::Closed => return Poll::Ready(None),
            }

            let now = Instant::now();
            // temporary pinning of the client receiver should be safe as we are
            // pinning through the already pinned self. with the receiver we can
            // also safely ignore exhaustion as it is fused.
            while let Poll::Ready(Some(msg)) = Pin::new(&mut pin.from_client).poll_next(cx) {
                pin.on_client_message(msg, now);
                if !pin.status.get().is_connected() {
                    break;
                }
            }
            if !pin.status.get().is_connected() {
                continue;
            }

            if let Poll::Ready(Err(failure)) = pin.conn.poll_flush_commands(cx) {
                let error = failure.error.clone();
                if pin.on_send_failure(failure) {
                    pin.begin_close("transport write failed");
                }
                return Poll::Ready(Some(Err(CdpError::Transport(error))));
            }

            let mut done = true;

            while let Poll::Ready(ev) = Pin::new(&mut pin.conn).poll_next(cx) {
                match ev {
                    Some(Ok(Message::Response(resp))) => pin.on_response(resp),
                    Some(Ok(Message::Event(ev))) => pin.on_event(ev),
                    Some(Ok(Message::Command(call))) => {
                        tracing::debug!(target: "cdp_client::handler", id = %call.id, method = %call.method, "Ignoring inbound command");
                    }
                    Some(Err(err)) => {
                        if let CdpError::Transport(ref transport) = err {
                            tracing::error!(target: "cdp_client::handler", "Transport error: {}", transport);
                            if transport.is_fatal() {
                                pin.begin_close("transport read failed");
                            }
                        }
                        return Poll::Ready(Some(Err(err)));
                    }
                    None => {
                        pin.begin_close("transport ended");
                        break;
                    }
                }
                done = false;
            }

            if pin.housekeeping.poll_due(cx) {
                let timed_out = pin
                    .pending_commands
                    .evict_timed_out(now, pin.config.request_timeout);
                let canceled = pin.pending_commands.evict_canceled();
                pin.event_listeners.prune();
                if timed_out + canceled > 0 {
                    tracing::debug!(target: "cdp_client::handler", run = pin.housekeeping.runs(), timed_out, canceled, "Evicted pending commands");
                }
            }

            if !pin.status.get().is_connected() {
                continue;
            }

            if done {
                // no events/responses were read from the transport
                return Poll::Pending;
            }
        }
    }
}

impl Drop for Handler {
    fn drop(&mut self) {
        // pending callers observe the dropped reply channels as closed
        self.status.advance(ConnectionState::Closing);
        self.status.advance(ConnectionState::Closed);
    }
}

/// How to configure the handler
#[derive(Debug, Clone)]
pub struct HandlerConfig {
    /// default request timeout to use
    pub request_timeout: Duration,
    /// Capacity of the channel clients queue their messages in
    pub channel_capacity: usize,
    /// How often timed out and abandoned calls are evicted
    pub housekeeping_interval: Duration,
    /// Maximum size of an inbound websocket message, `None` for unbounded
    pub max_message_size: Option<usize>,
    /// Maximum size of a single inbound websocket frame, `None` for unbounded
    pub max_frame_size: Option<usize>,
}

impl Default for HandlerConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_millis(REQUEST_TIMEOUT),
            channel_capacity: CHANNEL_CAPACITY,
            housekeeping_interval: Duration::from_millis(HOUSEKEEPING_INTERVAL),
            max_message_size: None,
            max_frame_size: None,
        }
    }
}

/// Messages used internally to communicate with the handler, which is
/// executed in the background
#[derive(Debug)]
pub enum HandlerMessage {
    Command(CommandMessage),
    AddEventListener(EventListenerRequest),
    GetSessions(OneshotSender<Vec<Session>>),
    Close(OneshotSender<Result<()>>),
}
