//! The main application logic, decoupled from the entry point.

use crate::{
    config::Config,
    core::{CertificateEvent, Output},
    deduplication::AlertGate,
    formatting::ConsoleFormatter,
    network::{CertStreamClient, WebSocketConnection},
    notification::EmailOutput,
    outputs::{ConsoleOutput, LogFileOutput, OutputManager, ProgressDisplay},
    persistence::{AlertStore, JsonFileStore, StoreWriter},
    pipeline::{DetectionContext, EventPipeline},
    task_manager::TaskManager,
};
use anyhow::Result;
use async_channel::Receiver;
use chrono::{Local, Utc};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, error, info, instrument, trace};

/// A handle to the running application.
pub struct App {
    task_manager: TaskManager,
    gate: Arc<AlertGate>,
    store: Arc<dyn AlertStore>,
    progress: ProgressDisplay,
}

impl App {
    /// Creates a new `AppBuilder` to construct an `App`.
    pub fn builder(config: Config) -> AppBuilder {
        AppBuilder::new(config)
    }

    pub fn gate(&self) -> Arc<AlertGate> {
        self.gate.clone()
    }

    /// Waits for the shutdown signal, joins all tasks and saves the alert
    /// records one last time.
    pub async fn run(self) -> Result<()> {
        let mut shutdown_rx = self.task_manager.get_shutdown_rx();
        if !self.task_manager.is_shutting_down() {
            shutdown_rx.changed().await.ok();
        }
        info!("Shutdown signal received. Waiting for tasks to complete...");

        self.task_manager.shutdown().await;
        self.progress.finish();

        let gate = self.gate.clone();
        let store = self.store.clone();
        match tokio::task::spawn_blocking(move || gate.flush_to(&*store)).await {
            Ok(Ok(())) => info!("Alert records saved."),
            Ok(Err(e)) => error!("Failed to save alert records on shutdown: {}", e),
            Err(e) => error!("Final alert record save task failed: {}", e),
        }

        info!("All tasks shut down.");
        Ok(())
    }
}

/// Builder for the main application.
///
/// Every external collaborator can be overridden so tests can run the full
/// pipeline without a network, real files or an SMTP server.
pub struct AppBuilder {
    config: Config,
    events_rx_for_test: Option<Receiver<CertificateEvent>>,
    output_override: Option<Vec<Arc<dyn Output>>>,
    websocket_override: Option<Box<dyn WebSocketConnection>>,
    store_override: Option<Arc<dyn AlertStore>>,
    context_override: Option<DetectionContext>,
    progress_override: Option<ProgressDisplay>,
}

impl AppBuilder {
    /// Creates a new `AppBuilder` with the given configuration.
    pub fn new(config: Config) -> Self {
        Self {
            config,
            events_rx_for_test: None,
            output_override: None,
            websocket_override: None,
            store_override: None,
            context_override: None,
            progress_override: None,
        }
    }

    /// Feeds the workers from `rx` instead of a CertStream client.
    pub fn events_rx_for_test(mut self, rx: Receiver<CertificateEvent>) -> Self {
        self.events_rx_for_test = Some(rx);
        self
    }

    /// Overrides the output destinations for testing.
    pub fn output_override(mut self, outputs: Vec<Arc<dyn Output>>) -> Self {
        self.output_override = Some(outputs);
        self
    }

    /// Overrides the WebSocket connection for testing.
    pub fn websocket_override(mut self, ws: Box<dyn WebSocketConnection>) -> Self {
        self.websocket_override = Some(ws);
        self
    }

    /// Overrides the alert record store for testing.
    pub fn store_override(mut self, store: Arc<dyn AlertStore>) -> Self {
        self.store_override = Some(store);
        self
    }

    /// Uses `context` instead of loading the brand and whitelist files.
    pub fn context_override(mut self, context: DetectionContext) -> Self {
        self.context_override = Some(context);
        self
    }

    pub fn progress_override(mut self, progress: ProgressDisplay) -> Self {
        self.progress_override = Some(progress);
        self
    }

    /// Builds and initializes all application components, returning a runnable `App`.
    #[instrument(skip_all)]
    pub async fn build(self, shutdown_rx: watch::Receiver<bool>) -> Result<App> {
        let config = self.config;
        let task_manager = TaskManager::new(shutdown_rx);

        // =========================================================================
        // 1. Detection Inputs
        // =========================================================================
        let context = match self.context_override {
            Some(context) => context,
            None => DetectionContext::load(&config)?,
        };
        let context = Arc::new(context);

        // =========================================================================
        // 2. Alert Gate & Write-Behind Store
        // =========================================================================
        let store: Arc<dyn AlertStore> = match self.store_override {
            Some(store) => store,
            None => Arc::new(JsonFileStore::new(config.files.stats_file.clone())),
        };
        debug!(
            cooldown_days = config.cooldown.domain_cooldown,
            max_records = config.cooldown.max_records,
            "Initializing alert gate"
        );
        let writer = StoreWriter::spawn(
            store.clone(),
            config.performance.flush_queue_capacity,
            &task_manager,
        );
        let gate = Arc::new(
            AlertGate::load(&*store, &config.cooldown)
                .await
                .with_writer(writer),
        );

        // =========================================================================
        // 3. Outputs
        // =========================================================================
        let progress = self
            .progress_override
            .unwrap_or_else(|| ProgressDisplay::new(config.output.progress));

        let outputs = match self.output_override {
            Some(outputs) => outputs,
            None => {
                let log_output =
                    LogFileOutput::from_template(&config.files.log_file, Local::now().date_naive());
                info!("Alert log: {}", log_output.path().display());

                let mut outputs: Vec<Arc<dyn Output>> = vec![
                    Arc::new(ConsoleOutput::new(
                        ConsoleFormatter::new(config.output.colored),
                        progress.clone(),
                    )),
                    Arc::new(log_output),
                ];
                if config.smtp.enabled {
                    outputs.push(Arc::new(EmailOutput::from_config(&config.smtp)));
                }
                outputs
            }
        };
        let output_manager = Arc::new(OutputManager::new(outputs));
        debug!(outputs = ?output_manager.names(), "Initialized outputs");

        // =========================================================================
        // 4. Event Source
        // =========================================================================

        // If a test receiver is provided, use it. Otherwise, create a new channel
        // and spawn the CertStream client to populate it.
        let events_rx = if let Some(rx) = self.events_rx_for_test {
            rx
        } else {
            let (tx, rx) = async_channel::bounded(config.performance.queue_capacity);
            let certstream_url = config.network.certstream_url.clone();
            let allow_invalid_certs = config.network.allow_invalid_certs;
            debug!(certstream_url, allow_invalid_certs, "Initializing CertStream client");
            let certstream_client = CertStreamClient::new(certstream_url, tx, allow_invalid_certs);

            let websocket_override = self.websocket_override;
            let mut shutdown_rx = task_manager.get_shutdown_rx();
            task_manager.spawn("CertStreamClient", async move {
                let result = if let Some(ws) = websocket_override {
                    tokio::select! {
                        biased;
                        _ = shutdown_rx.changed() => {
                            info!("CertStream client (override) received shutdown signal.");
                            Ok(())
                        },
                        res = certstream_client.run_with_connection(ws) => res,
                    }
                } else {
                    certstream_client.run(shutdown_rx).await
                };

                if let Err(e) = result {
                    error!("CertStream client failed: {}", e);
                }
            });
            rx
        };

        // =========================================================================
        // 5. Pipeline Workers
        // =========================================================================
        let pipeline = Arc::new(EventPipeline::new(
            context,
            gate.clone(),
            output_manager,
            progress.clone(),
        ));

        info!("Spawning {} pipeline workers...", config.concurrency);
        for id in 0..config.concurrency {
            task_manager.spawn(
                "PipelineWorker",
                worker_loop(
                    id,
                    events_rx.clone(),
                    pipeline.clone(),
                    task_manager.get_shutdown_rx(),
                ),
            );
        }

        info!("BrandWatch initialized successfully. Monitoring certificates...");

        Ok(App {
            task_manager,
            gate,
            store,
            progress,
        })
    }
}

async fn worker_loop(
    id: usize,
    events_rx: Receiver<CertificateEvent>,
    pipeline: Arc<EventPipeline>,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    trace!("Pipeline worker {} started", id);
    loop {
        let event = tokio::select! {
            biased;
            _ = shutdown_rx.changed() => {
                trace!("Pipeline worker {} received shutdown signal, exiting.", id);
                break;
            }
            received = events_rx.recv() => match received {
                Ok(event) => event,
                Err(_) => {
                    trace!("Event channel closed, pipeline worker {} shutting down.", id);
                    break;
                }
            },
        };

        pipeline.process_event(&event, Utc::now()).await;
    }
}
