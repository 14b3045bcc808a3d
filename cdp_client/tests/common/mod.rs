#![allow(dead_code)]

use cdp_client::{channel, CdpError, Client, HandlerConfig, RemoteEndpoint};
use futures::StreamExt;
use tokio::task::JoinHandle;

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::TRACE)
        .with_test_writer()
        .try_init();
}

/// A client over an in-memory transport, with its handler running in a task
/// that collects every error the handler yields.
pub struct Harness {
    pub client: Client,
    pub remote: RemoteEndpoint,
    pub handler: JoinHandle<Vec<CdpError>>,
}

pub fn connect() -> Harness {
    connect_with_config(HandlerConfig::default())
}

pub fn connect_with_config(config: HandlerConfig) -> Harness {
    init_tracing();
    let (transport, remote) = channel();
    let (client, mut handler) = Client::with_transport(transport, config);
    let handler = tokio::spawn(async move {
        let mut errors = Vec::new();
        while let Some(res) = handler.next().await {
            if let Err(err) = res {
                errors.push(err);
            }
        }
        errors
    });
    Harness {
        client,
        remote,
        handler,
    }
}
