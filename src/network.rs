//! Network client for the CertStream WebSocket feed.
//!
//! This module handles connecting to the certstream websocket, turning its
//! JSON messages into [`CertificateEvent`]s and reconnecting with exponential
//! backoff when the connection drops.

use crate::core::{CertificateEvent, EventKind};
use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use futures_util::StreamExt;
use serde::Deserialize;
use std::ops::ControlFlow;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::watch;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tokio_tungstenite::{connect_async_tls_with_config, Connector, MaybeTlsStream, WebSocketStream};
use tracing::{debug, error, info, trace, warn};

const INITIAL_BACKOFF: Duration = Duration::from_secs(1);
const MAX_BACKOFF: Duration = Duration::from_secs(60);

/// Parses a raw certstream JSON message.
///
/// Messages other than `certificate_update` (heartbeats and the like) parse to
/// an event with no domains. A `certificate_update` without a leaf
/// certificate is an error.
pub fn parse_message(text: &str) -> Result<CertificateEvent> {
    #[derive(Deserialize)]
    struct CertStreamMessage {
        #[serde(default)]
        message_type: String,
        data: Option<MessageData>,
    }

    #[derive(Deserialize)]
    struct MessageData {
        leaf_cert: Option<LeafCert>,
    }

    #[derive(Deserialize)]
    struct LeafCert {
        #[serde(default)]
        all_domains: Vec<String>,
        issuer: Option<Issuer>,
    }

    #[derive(Deserialize)]
    struct Issuer {
        #[serde(rename = "O")]
        organization: Option<String>,
    }

    let message: CertStreamMessage = serde_json::from_str(text)?;
    let kind = EventKind::from_tag(&message.message_type);
    let leaf_cert = message.data.and_then(|data| data.leaf_cert);

    match (kind, leaf_cert) {
        (EventKind::CertificateUpdate, Some(leaf)) => Ok(CertificateEvent::certificate_update(
            leaf.all_domains,
            leaf.issuer.and_then(|issuer| issuer.organization),
        )),
        (EventKind::CertificateUpdate, None) => {
            bail!("certificate_update message has no leaf_cert")
        }
        (kind, _) => Ok(CertificateEvent {
            kind,
            domains: Vec::new(),
            issuer_org: None,
        }),
    }
}

/// Trait for WebSocket connections to enable testing with fake implementations
#[async_trait]
pub trait WebSocketConnection: Send {
    /// Reads the next message from the WebSocket connection
    ///
    /// # Returns
    /// * `Some(Ok(Message))` if a message was successfully received
    /// * `Some(Err(error))` if there was an error reading the message
    /// * `None` if the connection has been closed
    async fn read_message(&mut self) -> Option<Result<Message, WsError>>;
}

struct LiveConnection {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

#[async_trait]
impl WebSocketConnection for LiveConnection {
    async fn read_message(&mut self) -> Option<Result<Message, WsError>> {
        self.stream.next().await
    }
}

/// CertStream WebSocket client that forwards every parsed message to the
/// event pipeline.
pub struct CertStreamClient {
    url: String,
    output_tx: async_channel::Sender<CertificateEvent>,
    allow_invalid_certs: bool,
}

impl CertStreamClient {
    /// Creates a new CertStream client
    ///
    /// # Arguments
    /// * `url` - The WebSocket URL to connect to (e.g., "wss://certstream.calidog.io")
    /// * `output_tx` - Channel sender feeding the pipeline workers
    /// * `allow_invalid_certs` - Accept self-signed or otherwise invalid TLS certificates
    pub fn new(
        url: String,
        output_tx: async_channel::Sender<CertificateEvent>,
        allow_invalid_certs: bool,
    ) -> Self {
        Self {
            url,
            output_tx,
            allow_invalid_certs,
        }
    }

    /// Processes messages from `connection` until it closes. No reconnection.
    pub async fn run_with_connection(&self, mut connection: Box<dyn WebSocketConnection>) -> Result<()> {
        info!("Starting CertStream client message processing");

        loop {
            match connection.read_message().await {
                Some(Ok(message)) => {
                    if self.handle_message(message).await?.is_break() {
                        break;
                    }
                }
                Some(Err(e)) => {
                    return Err(anyhow!("WebSocket error: {}", e));
                }
                None => {
                    info!("WebSocket connection closed");
                    break;
                }
            }
        }

        Ok(())
    }

    async fn handle_message(&self, message: Message) -> Result<ControlFlow<()>> {
        match message {
            Message::Text(text) => match parse_message(&text) {
                Ok(event) => {
                    trace!(domains = event.domains.len(), "Parsed certstream message");
                    self.output_tx
                        .send(event)
                        .await
                        .map_err(|e| anyhow!("Output channel closed: {}", e))?;
                }
                Err(e) => {
                    warn!("Failed to parse certstream message: {}", e);
                }
            },
            Message::Close(_) => {
                info!("Received close message from server");
                return Ok(ControlFlow::Break(()));
            }
            Message::Binary(_) | Message::Frame(_) => {
                debug!("Received non-text message, ignoring");
            }
            Message::Ping(_) | Message::Pong(_) => {
                trace!("Received ping/pong message");
            }
        }
        Ok(ControlFlow::Continue(()))
    }

    /// Runs the client against the configured URL, reconnecting with
    /// exponential backoff (1s doubling up to 60s) until shutdown.
    pub async fn run(&self, mut shutdown_rx: watch::Receiver<bool>) -> Result<()> {
        let mut backoff = INITIAL_BACKOFF;

        loop {
            if *shutdown_rx.borrow() {
                break;
            }
            info!("Attempting to connect to {}", self.url);

            let result = tokio::select! {
                biased;
                _ = shutdown_rx.changed() => {
                    info!("CertStream client received shutdown signal.");
                    break;
                }
                res = self.connect_and_run() => res,
            };

            match result {
                Ok(()) => {
                    info!("Connection closed normally");
                    backoff = INITIAL_BACKOFF;
                }
                Err(e) => {
                    error!("Connection failed: {:#}", e);
                }
            }

            if self.output_tx.is_closed() {
                info!("Event channel closed, CertStream client stopping.");
                break;
            }

            info!("Reconnecting in {:?}", backoff);
            tokio::select! {
                biased;
                _ = shutdown_rx.changed() => {
                    info!("CertStream client received shutdown signal.");
                    break;
                }
                _ = tokio::time::sleep(backoff) => {}
            }
            backoff = (backoff * 2).min(MAX_BACKOFF);
        }

        Ok(())
    }

    async fn connect_and_run(&self) -> Result<()> {
        let connector = if self.allow_invalid_certs {
            let tls = native_tls::TlsConnector::builder()
                .danger_accept_invalid_certs(true)
                .build()
                .context("Failed to build TLS connector")?;
            Some(Connector::NativeTls(tls))
        } else {
            None
        };

        let (stream, _) = connect_async_tls_with_config(self.url.as_str(), None, false, connector)
            .await
            .with_context(|| format!("Failed to connect to {}", self.url))?;

        info!("Connected to {}", self.url);
        self.run_with_connection(Box::new(LiveConnection { stream }))
            .await
    }
}
