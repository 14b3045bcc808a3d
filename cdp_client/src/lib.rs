//! A Chrome DevTools Protocol client core.
//!
//! One [`Handler`] owns the transport to the remote end. It assigns a unique
//! id to every outgoing command, routes every response back to the caller
//! that issued it, fans events out to every interested subscriber and keeps
//! track of the sessions attached to targets. Any number of cloned
//! [`Client`]s issue commands and subscribe to events concurrently.
//!
//! ```no_run
//! use cdp_client::domains::runtime::{EvaluateParams, Runtime};
//! use cdp_client::domains::debugger::Debugger;
//! use cdp_client::Client;
//! use futures::StreamExt;
//!
//! # async fn demo() -> cdp_client::Result<()> {
//! let (client, mut handler) =
//!     Client::connect("ws://127.0.0.1:9222/devtools/page/E1B2").await?;
//!
//! let handle = tokio::spawn(async move {
//!     while let Some(event) = handler.next().await {
//!         if event.is_err() {
//!             continue;
//!         }
//!     }
//! });
//!
//! let debugger = client.domain::<Debugger>();
//! let mut paused = debugger.paused().await?;
//! debugger.enable().await?;
//!
//! let runtime = client.domain::<Runtime>();
//! let eval = runtime
//!     .evaluate(EvaluateParams::new("1 + 1").return_by_value(true))
//!     .await?;
//! assert_eq!(eval.result.value, Some(serde_json::json!(2)));
//!
//! if let Some(event) = paused.next().await {
//!     println!("paused: {}", event.reason);
//! }
//!
//! client.close().await?;
//! handle.await.ok();
//! # Ok(())
//! # }
//! ```
#![warn(missing_debug_implementations, rust_2018_idioms)]

pub mod client;
pub(crate) mod cmd;
pub mod conn;
pub mod domains;
pub mod error;
pub mod handler;
pub mod listeners;
pub mod transport;

pub use crate::client::{Client, TargetSession};
pub use crate::conn::Connection;
pub use crate::error::{CdpError, Result};
pub use crate::handler::{ConnectionState, Handler, HandlerConfig, Session};
pub use crate::listeners::{EventFilter, EventStream, RawEventStream};
pub use crate::transport::{channel, RemoteEndpoint, Transport, TransportError, WsTransport};

/// re-export the protocol envelope types
pub use cdp_types as types;
