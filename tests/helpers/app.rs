#![allow(dead_code)]
//! Test helpers for running the full application instance.

use anyhow::Result;
use brandwatch::{
    app::AppBuilder,
    config::Config,
    core::{CertificateEvent, Output},
    deduplication::AlertGate,
    network::WebSocketConnection,
    outputs::ProgressDisplay,
    persistence::MemoryStore,
    pipeline::DetectionContext,
};
use std::{sync::Arc, time::Duration};
use tokio::{sync::watch, task::JoinHandle, time::timeout};

use super::mock_output::CountingOutput;

/// Represents a running instance of the application for testing purposes.
pub struct TestApp {
    pub events_tx: Option<async_channel::Sender<CertificateEvent>>,
    pub shutdown_tx: watch::Sender<bool>,
    pub app_handle: Option<JoinHandle<Result<()>>>,
    pub gate: Arc<AlertGate>,
    pub store: Arc<MemoryStore>,
}

impl TestApp {
    pub async fn send_event(&self, event: CertificateEvent) -> Result<()> {
        self.events_tx
            .as_ref()
            .expect("events_tx is only available when using with_test_events_channel")
            .send(event)
            .await?;
        Ok(())
    }

    pub async fn send_domains(&self, domains: &[&str], issuer: Option<&str>) -> Result<()> {
        let event = CertificateEvent::certificate_update(
            domains.iter().map(|d| d.to_string()).collect(),
            issuer.map(str::to_string),
        );
        self.send_event(event).await
    }

    pub fn close_events_channel(&mut self) {
        if let Some(tx) = self.events_tx.take() {
            drop(tx);
        }
    }

    /// Shuts down the application and waits for it to terminate.
    /// Fails if the application does not shut down within the specified timeout.
    pub async fn shutdown(self, timeout_duration: Duration) -> Result<()> {
        self.shutdown_tx
            .send(true)
            .expect("Failed to send shutdown signal");

        if let Some(handle) = self.app_handle {
            match timeout(timeout_duration, handle).await {
                Ok(Ok(result)) => result,
                Ok(Err(e)) => Err(e.into()),
                Err(_) => Err(anyhow::anyhow!("App failed to shut down within the timeout")),
            }
        } else {
            Ok(())
        }
    }
}

/// A builder for creating `TestApp` instances with specific configurations.
pub struct TestAppBuilder {
    pub config: Config,
    events_tx_for_test: Option<async_channel::Sender<CertificateEvent>>,
    events_rx_for_test: Option<async_channel::Receiver<CertificateEvent>>,
    outputs: Vec<Arc<dyn Output>>,
    websocket: Option<Box<dyn WebSocketConnection>>,
    store: Arc<MemoryStore>,
    context: DetectionContext,
}

impl Default for TestAppBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl TestAppBuilder {
    pub fn new() -> Self {
        let mut config = Config::default();
        config.network.certstream_url = "ws://127.0.0.1:12345".to_string();
        config.concurrency = 2;
        config.cooldown.domain_cooldown = 1;
        config.output.progress = false;
        config.output.colored = false;

        Self {
            config,
            events_tx_for_test: None,
            events_rx_for_test: None,
            outputs: vec![Arc::new(CountingOutput::new())],
            websocket: None,
            store: Arc::new(MemoryStore::new()),
            context: super::test_context(),
        }
    }

    /// Sets up a direct channel for event injection, bypassing the network client.
    /// The sender part of the channel is returned in the `TestApp` struct.
    pub fn with_test_events_channel(mut self) -> Self {
        let (tx, rx) = async_channel::unbounded();
        self.events_tx_for_test = Some(tx);
        self.events_rx_for_test = Some(rx);
        self
    }

    pub fn with_outputs(mut self, outputs: Vec<Arc<dyn Output>>) -> Self {
        self.outputs = outputs;
        self
    }

    pub fn with_websocket(mut self, ws: Box<dyn WebSocketConnection>) -> Self {
        self.websocket = Some(ws);
        self
    }

    pub fn with_store(mut self, store: Arc<MemoryStore>) -> Self {
        self.store = store;
        self
    }

    pub fn with_context(mut self, context: DetectionContext) -> Self {
        self.context = context;
        self
    }

    pub fn with_config_modifier(mut self, modifier: impl FnOnce(&mut Config)) -> Self {
        modifier(&mut self.config);
        self
    }

    /// Builds the app and starts running it in the background.
    pub async fn start(self) -> Result<TestApp> {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let store = self.store.clone();

        let mut builder = AppBuilder::new(self.config)
            .output_override(self.outputs)
            .store_override(store.clone())
            .context_override(self.context)
            .progress_override(ProgressDisplay::hidden());

        if let Some(rx) = self.events_rx_for_test {
            builder = builder.events_rx_for_test(rx);
        }
        if let Some(ws) = self.websocket {
            builder = builder.websocket_override(ws);
        }

        let app = builder.build(shutdown_rx).await?;
        let gate = app.gate();
        let app_handle = tokio::spawn(app.run());

        Ok(TestApp {
            events_tx: self.events_tx_for_test,
            shutdown_tx,
            app_handle: Some(app_handle),
            gate,
            store,
        })
    }
}
