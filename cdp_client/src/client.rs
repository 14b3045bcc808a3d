use std::sync::{Arc, Weak};
use std::time::Duration;

use futures::channel::mpsc::{channel, unbounded, Sender};
use futures::channel::oneshot::{self, channel as oneshot_channel};
use futures::SinkExt;
use serde::de::DeserializeOwned;

use cdp_types::{Command, CommandResponse, MethodId, MethodType, Response};

use crate::cmd::{to_command_response, CommandMessage};
use crate::conn::Connection;
use crate::domains::target::{DetachFromTargetParams, SessionId};
use crate::domains::{Domain, DomainRegistry};
use crate::error::{CdpError, Result};
use crate::handler::commandfuture::CommandFuture;
use crate::handler::{
    ConnectionState, ConnectionStatus, Handler, HandlerConfig, HandlerMessage, Session,
};
use crate::listeners::{EventFilter, EventListenerRequest, EventStream, RawEventStream};
use crate::transport::Transport;

/// A cheap, cloneable handle to a connection.
///
/// Every clone talks to the same [`Handler`], which has to be polled for any
/// call to make progress:
///
/// ```no_run
/// # use cdp_client::{Client, Result};
/// # use futures::StreamExt;
/// # async fn demo() -> Result<()> {
/// let (client, mut handler) = Client::connect("ws://127.0.0.1:9222/devtools/browser").await?;
/// tokio::spawn(async move {
///     while let Some(res) = handler.next().await {
///         if let Err(err) = res {
///             tracing::warn!("{}", err);
///         }
///     }
/// });
/// let version = client.call_command("Browser.getVersion", None, None).await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct Client {
    /// The `Sender` to send messages to the connection handler that drives the
    /// transport
    sender: Sender<HandlerMessage>,
    /// The connection state, driven by the handler
    status: ConnectionStatus,
    /// How long a call may wait for its response
    request_timeout: Duration,
    /// The domain façades of this connection
    domains: DomainHandle,
}

/// Domains hold a client themselves, so they get a weak handle to the
/// registry that caches them.
#[derive(Debug, Clone)]
enum DomainHandle {
    Strong(Arc<DomainRegistry>),
    Weak(Weak<DomainRegistry>),
}

impl Client {
    /// Connect to the websocket debugger url of a running instance.
    pub async fn connect(debug_ws_url: impl AsRef<str>) -> Result<(Self, Handler)> {
        Self::connect_with_config(debug_ws_url, HandlerConfig::default()).await
    }

    /// Connect to the websocket debugger url of a running instance with a
    /// given `HandlerConfig`.
    pub async fn connect_with_config(
        debug_ws_url: impl AsRef<str>,
        config: HandlerConfig,
    ) -> Result<(Self, Handler)> {
        let url = url::Url::parse(debug_ws_url.as_ref())?;
        let conn = Connection::connect(url.as_str(), &config).await?;
        Ok(Self::with_connection(conn, config))
    }

    /// Run the protocol over an already established transport.
    pub fn with_transport(
        transport: impl Transport + 'static,
        config: HandlerConfig,
    ) -> (Self, Handler) {
        Self::with_connection(Connection::new(transport), config)
    }

    fn with_connection(conn: Connection, config: HandlerConfig) -> (Self, Handler) {
        let (tx, rx) = channel(config.channel_capacity);
        let status = ConnectionStatus::default();

        let client = Self {
            sender: tx,
            status: status.clone(),
            request_timeout: config.request_timeout,
            domains: DomainHandle::Strong(Default::default()),
        };
        let handler = Handler::new(conn, rx, config, status);

        (client, handler)
    }

    /// The current state of the connection.
    pub fn state(&self) -> ConnectionState {
        self.status.get()
    }

    pub fn is_closed(&self) -> bool {
        self.state() == ConnectionState::Closed
    }

    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    /// Hand the command to the handler and wait for its response.
    async fn dispatch(
        &self,
        msg: CommandMessage,
        rx: oneshot::Receiver<Result<Response>>,
    ) -> Result<Response> {
        if !self.state().is_connected() {
            return Err(CdpError::ConnectionClosed);
        }
        CommandFuture::new(msg, rx, self.sender.clone(), self.request_timeout).await
    }

    /// Send a raw command and return its `result`.
    ///
    /// A remote reported failure becomes [`CdpError::Protocol`]. A success
    /// without `result` yields `Ok(None)`.
    pub async fn call_command(
        &self,
        method: impl Into<MethodId>,
        params: Option<serde_json::Value>,
        session_id: Option<SessionId>,
    ) -> Result<Option<serde_json::Value>> {
        let (tx, rx) = oneshot_channel();
        let msg = CommandMessage::new(method, params, session_id, tx);
        let resp = self.dispatch(msg, rx).await?;
        Ok(resp.into_result()?)
    }

    /// Call a method on the root connection.
    pub async fn execute<T: Command>(&self, cmd: T) -> Result<CommandResponse<T::Response>> {
        self.execute_with_session(cmd, None).await
    }

    /// Call a method, addressed to `session_id` if set.
    pub async fn execute_with_session<T: Command>(
        &self,
        cmd: T,
        session_id: Option<SessionId>,
    ) -> Result<CommandResponse<T::Response>> {
        let (tx, rx) = oneshot_channel();
        let method = cmd.identifier();
        let msg = CommandMessage::with_session(cmd, tx, session_id)?;
        let resp = self.dispatch(msg, rx).await?;
        to_command_response::<T>(resp, method)
    }

    async fn add_listener(
        &self,
        filter: EventFilter,
        session_id: Option<SessionId>,
    ) -> Result<RawEventStream> {
        if !self.state().is_connected() {
            return Err(CdpError::ConnectionClosed);
        }
        let (tx, rx) = unbounded();
        self.sender
            .clone()
            .send(HandlerMessage::AddEventListener(EventListenerRequest::new(
                tx, filter, session_id,
            )))
            .await?;
        Ok(RawEventStream::new(rx))
    }

    /// Every event, of every session.
    pub async fn events(&self) -> Result<RawEventStream> {
        self.add_listener(EventFilter::All, None).await
    }

    /// Every event with the given `method`, like `Debugger.paused`.
    pub async fn subscribe(&self, method: impl Into<MethodId>) -> Result<RawEventStream> {
        self.add_listener(EventFilter::Method(method.into()), None)
            .await
    }

    /// Every event of a domain, like `Debugger`.
    pub async fn subscribe_domain(&self, domain: impl Into<MethodId>) -> Result<RawEventStream> {
        self.add_listener(EventFilter::Domain(domain.into()), None)
            .await
    }

    /// Set listener for a typed event
    pub async fn event_listener<T: MethodType + DeserializeOwned>(
        &self,
    ) -> Result<EventStream<T>> {
        Ok(self
            .add_listener(EventFilter::Method(T::method_id()), None)
            .await?
            .typed())
    }

    /// The sessions currently attached.
    pub async fn sessions(&self) -> Result<Vec<Session>> {
        let (tx, rx) = oneshot_channel();
        self.sender
            .clone()
            .send(HandlerMessage::GetSessions(tx))
            .await?;
        Ok(rx.await?)
    }

    /// A handle addressing commands and subscriptions to `session_id`.
    pub fn session(&self, session_id: impl Into<SessionId>) -> TargetSession {
        TargetSession {
            client: self.clone(),
            session_id: session_id.into(),
        }
    }

    /// The façade of domain `D`, created on first use and shared afterwards.
    pub fn domain<D: Domain>(&self) -> Arc<D> {
        let registry = match &self.domains {
            DomainHandle::Strong(registry) => Some(Arc::clone(registry)),
            DomainHandle::Weak(registry) => registry.upgrade(),
        };
        match registry {
            Some(registry) => {
                let handle = DomainHandle::Weak(Arc::downgrade(&registry));
                registry.get_or_create(|| D::new(self.with_domains(handle)))
            }
            // every owning client is gone, nothing left to cache in
            None => Arc::new(D::new(self.clone())),
        }
    }

    fn with_domains(&self, domains: DomainHandle) -> Self {
        Self {
            sender: self.sender.clone(),
            status: self.status.clone(),
            request_timeout: self.request_timeout,
            domains,
        }
    }

    /// Orderly shutdown of the connection.
    ///
    /// Fails every pending call with [`CdpError::ConnectionClosed`], ends
    /// every event stream and closes the transport. Resolves once the
    /// connection is closed; closing twice is a no-op.
    pub async fn close(&self) -> Result<()> {
        if self.is_closed() {
            return Ok(());
        }
        let (tx, rx) = oneshot_channel();
        if self
            .sender
            .clone()
            .send(HandlerMessage::Close(tx))
            .await
            .is_err()
        {
            // the handler already shut down
            return Ok(());
        }
        rx.await.unwrap_or(Ok(()))
    }
}

/// A [`Client`] bound to an attached session.
#[derive(Debug, Clone)]
pub struct TargetSession {
    client: Client,
    session_id: SessionId,
}

impl TargetSession {
    pub fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    pub async fn call_command(
        &self,
        method: impl Into<MethodId>,
        params: Option<serde_json::Value>,
    ) -> Result<Option<serde_json::Value>> {
        self.client
            .call_command(method, params, Some(self.session_id.clone()))
            .await
    }

    pub async fn execute<T: Command>(&self, cmd: T) -> Result<CommandResponse<T::Response>> {
        self.client
            .execute_with_session(cmd, Some(self.session_id.clone()))
            .await
    }

    /// Every event of this session.
    pub async fn events(&self) -> Result<RawEventStream> {
        self.client
            .add_listener(EventFilter::All, Some(self.session_id.clone()))
            .await
    }

    /// The typed events `T` of this session.
    pub async fn event_listener<T: MethodType + DeserializeOwned>(
        &self,
    ) -> Result<EventStream<T>> {
        Ok(self
            .client
            .add_listener(
                EventFilter::Method(T::method_id()),
                Some(self.session_id.clone()),
            )
            .await?
            .typed())
    }

    /// Detach from the target, the session can no longer be addressed.
    pub async fn detach(&self) -> Result<()> {
        self.client
            .execute(DetachFromTargetParams::new(self.session_id.clone()))
            .await?;
        Ok(())
    }
}
