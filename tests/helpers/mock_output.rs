#![allow(dead_code)]
use async_trait::async_trait;
use brandwatch::core::{Alert, Output, Severity};
use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc, Mutex,
};
use tokio::sync::Notify;

/// A mock Output that counts and keeps the alerts it has received.
#[derive(Clone, Debug)]
pub struct CountingOutput {
    pub count: Arc<AtomicUsize>,
    pub notifier: Arc<Notify>,
    pub alerts: Arc<Mutex<Vec<Alert>>>,
    min_severity: Severity,
}

impl CountingOutput {
    /// Receives HIGH alerts only, like the email and log outputs.
    pub fn new() -> Self {
        Self::with_min_severity(Severity::High)
    }

    /// Receives every alert at or above `min_severity`.
    pub fn with_min_severity(min_severity: Severity) -> Self {
        Self {
            count: Arc::new(AtomicUsize::new(0)),
            notifier: Arc::new(Notify::new()),
            alerts: Arc::new(Mutex::new(Vec::new())),
            min_severity,
        }
    }

    pub fn count(&self) -> usize {
        self.count.load(Ordering::SeqCst)
    }

    pub fn alerts(&self) -> Vec<Alert> {
        self.alerts.lock().unwrap().clone()
    }

    pub async fn wait_for_count(&self, target_count: usize, timeout_duration: std::time::Duration) {
        let wait_future = async {
            loop {
                let notified = self.notifier.notified();
                if self.count.load(Ordering::SeqCst) >= target_count {
                    break;
                }
                notified.await;
            }
        };

        tokio::time::timeout(timeout_duration, wait_future)
            .await
            .expect("Timed out waiting for alerts");
    }
}

#[async_trait]
impl Output for CountingOutput {
    fn name(&self) -> &str {
        "counting_mock"
    }

    fn min_severity(&self) -> Severity {
        self.min_severity
    }

    async fn send_alert(&self, alert: &Alert) -> anyhow::Result<()> {
        self.alerts.lock().unwrap().push(alert.clone());
        self.count.fetch_add(1, Ordering::SeqCst);
        self.notifier.notify_waiters();
        Ok(())
    }
}

/// A mock Output that always fails, standing in for an unreachable mail server.
#[derive(Clone, Debug, Default)]
pub struct FailingOutput {
    pub attempts: Arc<AtomicUsize>,
}

#[async_trait]
impl Output for FailingOutput {
    fn name(&self) -> &str {
        "failing_mock"
    }

    async fn send_alert(&self, _alert: &Alert) -> anyhow::Result<()> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        anyhow::bail!("connection refused")
    }
}
