#![allow(dead_code)]
//! Mock WebSocketConnection for testing the CertStreamClient
use async_trait::async_trait;
use brandwatch::network::WebSocketConnection;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::{Error, Message};

/// Connection half handed to the application. Yields whatever the paired
/// [`MockWebSocketHandle`] sends and closes when the handle is dropped.
pub struct MockWebSocket {
    rx: mpsc::UnboundedReceiver<Result<Message, Error>>,
}

/// Test half used to push messages into a [`MockWebSocket`].
#[derive(Clone)]
pub struct MockWebSocketHandle {
    tx: mpsc::UnboundedSender<Result<Message, Error>>,
}

impl MockWebSocket {
    pub fn new() -> (Self, MockWebSocketHandle) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { rx }, MockWebSocketHandle { tx })
    }
}

/// Renders a CertStream `certificate_update` message.
pub fn certificate_update_json(domains: &[&str], issuer: Option<&str>) -> String {
    serde_json::json!({
        "message_type": "certificate_update",
        "data": {
            "update_type": "X509LogEntry",
            "leaf_cert": {
                "all_domains": domains,
                "issuer": { "O": issuer },
            },
        },
    })
    .to_string()
}

impl MockWebSocketHandle {
    pub fn send_text(&self, text: impl Into<String>) {
        let text: String = text.into();
        let _ = self.tx.send(Ok(Message::Text(text.into())));
    }

    pub fn send_certificate(&self, domains: &[&str], issuer: Option<&str>) {
        self.send_text(certificate_update_json(domains, issuer));
    }

    pub fn send_heartbeat(&self) {
        self.send_text(r#"{"message_type": "heartbeat", "timestamp": 1751716800.0}"#);
    }

    pub fn send_error(&self) {
        let _ = self.tx.send(Err(Error::ConnectionClosed));
    }
}

#[async_trait]
impl WebSocketConnection for MockWebSocket {
    async fn read_message(&mut self) -> Option<Result<Message, Error>> {
        self.rx.recv().await
    }
}
