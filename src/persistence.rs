//! Durable storage for alert records.
//!
//! The alert gate keeps its records in memory; this module owns getting them
//! on and off disk. Saves go through a [`StoreWriter`], a single background
//! task fed by a bounded queue, so a slow disk applies backpressure instead of
//! blocking the caller on every alert.

use crate::task_manager::TaskManager;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// Domain to last-alert time. Ordered so that saved files are stable.
pub type AlertRecords = BTreeMap<String, DateTime<Utc>>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to access alert store {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("alert store {path} is corrupt: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// A durable home for alert records.
pub trait AlertStore: Send + Sync {
    /// Loads every record. A store that does not exist yet is empty, not an error.
    fn load(&self) -> Result<AlertRecords, StoreError>;

    /// Replaces the stored records with `records`.
    fn save(&self, records: &AlertRecords) -> Result<(), StoreError>;
}

/// Stores records as a flat JSON object of `domain -> RFC 3339 timestamp`.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, source: std::io::Error) -> StoreError {
        StoreError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

impl AlertStore for JsonFileStore {
    fn load(&self) -> Result<AlertRecords, StoreError> {
        if !self.path.exists() {
            return Ok(AlertRecords::new());
        }
        let content = fs::read_to_string(&self.path).map_err(|e| self.io_error(e))?;
        if content.trim().is_empty() {
            return Ok(AlertRecords::new());
        }
        serde_json::from_str(&content).map_err(|source| StoreError::Corrupt {
            path: self.path.clone(),
            source,
        })
    }

    /// Writes to a sibling temp file and renames it over the target, so a
    /// crash mid-write never leaves a truncated store behind.
    fn save(&self, records: &AlertRecords) -> Result<(), StoreError> {
        let json = serde_json::to_vec(records).map_err(|source| StoreError::Corrupt {
            path: self.path.clone(),
            source,
        })?;

        let mut tmp_path = self.path.clone().into_os_string();
        tmp_path.push(".tmp");
        let tmp_path = PathBuf::from(tmp_path);

        let mut file = fs::File::create(&tmp_path).map_err(|e| self.io_error(e))?;
        file.write_all(&json).map_err(|e| self.io_error(e))?;
        file.sync_all().map_err(|e| self.io_error(e))?;
        fs::rename(&tmp_path, &self.path).map_err(|e| self.io_error(e))?;
        Ok(())
    }
}

/// In-memory store used by tests.
#[cfg(any(test, feature = "test-utils"))]
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: std::sync::Mutex<AlertRecords>,
    saves: std::sync::atomic::AtomicUsize,
    corrupt: bool,
}

#[cfg(any(test, feature = "test-utils"))]
impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_records(records: AlertRecords) -> Self {
        Self {
            records: std::sync::Mutex::new(records),
            ..Default::default()
        }
    }

    /// A store whose `load` always reports corruption.
    pub fn corrupt() -> Self {
        Self {
            corrupt: true,
            ..Default::default()
        }
    }

    pub fn records(&self) -> AlertRecords {
        self.records.lock().unwrap().clone()
    }

    pub fn save_count(&self) -> usize {
        self.saves.load(std::sync::atomic::Ordering::SeqCst)
    }
}

#[cfg(any(test, feature = "test-utils"))]
impl AlertStore for MemoryStore {
    fn load(&self) -> Result<AlertRecords, StoreError> {
        if self.corrupt {
            let source = serde_json::from_str::<AlertRecords>("{").unwrap_err();
            return Err(StoreError::Corrupt {
                path: PathBuf::from("memory"),
                source,
            });
        }
        Ok(self.records())
    }

    fn save(&self, records: &AlertRecords) -> Result<(), StoreError> {
        *self.records.lock().unwrap() = records.clone();
        self.saves.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        Ok(())
    }
}

/// Handle to the background task that persists alert record snapshots.
///
/// Snapshots are saved in the order they were enqueued. When several are
/// waiting, only the newest is written, since each one is a full copy.
#[derive(Clone)]
pub struct StoreWriter {
    tx: mpsc::Sender<AlertRecords>,
}

impl StoreWriter {
    /// Spawns the writer task on `task_manager`.
    pub fn spawn(store: Arc<dyn AlertStore>, capacity: usize, task_manager: &TaskManager) -> Self {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let shutdown_rx = task_manager.get_shutdown_rx();
        task_manager.spawn("StoreWriter", run_writer(store, rx, shutdown_rx));
        Self { tx }
    }

    /// Queues a snapshot for saving, waiting if the queue is full.
    pub async fn enqueue(&self, records: AlertRecords) {
        if self.tx.send(records).await.is_err() {
            warn!("Store writer has stopped; alert records were not queued for saving");
        }
    }
}

async fn run_writer(
    store: Arc<dyn AlertStore>,
    mut rx: mpsc::Receiver<AlertRecords>,
    mut shutdown_rx: tokio::sync::watch::Receiver<bool>,
) {
    info!("Store writer started.");
    loop {
        tokio::select! {
            biased;
            _ = shutdown_rx.changed() => {
                // Persist whatever was queued before the signal.
                let mut latest = None;
                while let Ok(records) = rx.try_recv() {
                    latest = Some(records);
                }
                if let Some(records) = latest {
                    save_blocking(store.clone(), records).await;
                }
                info!("Store writer received shutdown signal.");
                break;
            }
            received = rx.recv() => {
                let Some(mut records) = received else {
                    debug!("Store writer channel closed.");
                    break;
                };
                while let Ok(newer) = rx.try_recv() {
                    records = newer;
                }
                save_blocking(store.clone(), records).await;
            }
        }
    }
    info!("Store writer finished.");
}

async fn save_blocking(store: Arc<dyn AlertStore>, records: AlertRecords) {
    let count = records.len();
    match tokio::task::spawn_blocking(move || store.save(&records)).await {
        Ok(Ok(())) => debug!(count, "Saved alert records."),
        Ok(Err(e)) => error!("Failed to save alert records: {}", e),
        Err(e) => error!("Alert record save task failed: {}", e),
    }
}
