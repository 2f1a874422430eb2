//! Owns every long-running task so shutdown can wait for all of them.
use futures::future::join_all;
use std::sync::{Arc, Mutex};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

struct NamedTask {
    name: &'static str,
    handle: JoinHandle<()>,
}

/// Spawns named tasks and joins them on shutdown.
///
/// Tasks are expected to watch the receiver from [`TaskManager::get_shutdown_rx`]
/// and return once it flips to `true`.
#[derive(Clone)]
pub struct TaskManager {
    tasks: Arc<Mutex<Vec<NamedTask>>>,
    shutdown_rx: watch::Receiver<bool>,
}

impl std::fmt::Debug for TaskManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskManager")
            .field("tasks", &self.task_count())
            .finish()
    }
}

impl TaskManager {
    pub fn new(shutdown_rx: watch::Receiver<bool>) -> Self {
        Self {
            tasks: Arc::new(Mutex::new(Vec::new())),
            shutdown_rx,
        }
    }

    /// Spawns `future` on the runtime and tracks it under `name`.
    pub fn spawn<F>(&self, name: &'static str, future: F)
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        debug!(task_name = name, "Spawning task");
        let handle = tokio::spawn(future);
        if let Ok(mut tasks) = self.tasks.lock() {
            tasks.push(NamedTask { name, handle });
        }
    }

    pub fn get_shutdown_rx(&self) -> watch::Receiver<bool> {
        self.shutdown_rx.clone()
    }

    /// `true` once the shutdown signal has been sent.
    pub fn is_shutting_down(&self) -> bool {
        *self.shutdown_rx.borrow()
    }

    pub fn task_count(&self) -> usize {
        self.tasks.lock().map(|tasks| tasks.len()).unwrap_or(0)
    }

    /// Waits for every tracked task to finish and returns the number that panicked.
    pub async fn shutdown(self) -> usize {
        let tasks: Vec<NamedTask> = match self.tasks.lock() {
            Ok(mut tasks) => tasks.drain(..).collect(),
            Err(_) => Vec::new(),
        };
        info!("Waiting for {} tasks to complete...", tasks.len());

        let (names, handles): (Vec<_>, Vec<_>) =
            tasks.into_iter().map(|t| (t.name, t.handle)).unzip();
        let results = join_all(handles).await;

        let mut panicked = 0;
        for (name, result) in names.into_iter().zip(results) {
            match result {
                Ok(()) => debug!(task_name = name, "Task shut down gracefully."),
                Err(e) => {
                    error!(task_name = name, error = %e, "Task panicked during shutdown.");
                    panicked += 1;
                }
            }
        }

        if panicked == 0 {
            info!("All tasks shut down gracefully.");
        } else {
            error!("{} tasks panicked during shutdown.", panicked);
        }
        panicked
    }
}
