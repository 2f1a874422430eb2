//! Alert destinations and the manager that routes alerts to them.
//!
//! Each destination implements [`Output`] and declares the lowest severity it
//! accepts. The console takes everything; the alert log and email only take
//! HIGH alerts.

use crate::core::{Alert, Output, Severity};
use crate::formatting::{ConsoleFormatter, TextFormatter};
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use chrono::NaiveDate;
use futures::future::join_all;
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, error, instrument};

/// Fans an alert out to every output that accepts its severity.
pub struct OutputManager {
    outputs: Vec<Arc<dyn Output>>,
}

impl OutputManager {
    pub fn new(outputs: Vec<Arc<dyn Output>>) -> Self {
        Self { outputs }
    }

    pub fn len(&self) -> usize {
        self.outputs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outputs.is_empty()
    }

    pub fn names(&self) -> Vec<&str> {
        self.outputs.iter().map(|output| output.name()).collect()
    }

    /// Sends `alert` to all accepting outputs concurrently.
    ///
    /// Every output is attempted. Failures are logged individually and then
    /// reported together as one error.
    #[instrument(skip_all, fields(domain = %alert.domain, severity = %alert.severity))]
    pub async fn send_alert(&self, alert: &Alert) -> Result<()> {
        let targets: Vec<&Arc<dyn Output>> = self
            .outputs
            .iter()
            .filter(|output| alert.severity >= output.min_severity())
            .collect();

        let results = join_all(targets.iter().map(|output| output.send_alert(alert))).await;

        let mut failed = 0;
        for (output, result) in targets.iter().zip(results) {
            match result {
                Ok(()) => debug!(output = output.name(), "Alert delivered."),
                Err(e) => {
                    error!(output = output.name(), "Failed to send alert: {:#}", e);
                    failed += 1;
                }
            }
        }

        if failed > 0 {
            bail!(
                "{} of {} outputs failed for {}",
                failed,
                targets.len(),
                alert.domain
            );
        }
        Ok(())
    }
}

/// Counter of scored domains, drawn on stdout.
///
/// Console lines are printed through the bar so they do not tear it. When the
/// bar is hidden, lines go straight to stdout.
#[derive(Clone)]
pub struct ProgressDisplay {
    bar: ProgressBar,
}

impl ProgressDisplay {
    pub fn new(enabled: bool) -> Self {
        if !enabled {
            return Self::hidden();
        }
        let bar = ProgressBar::new_spinner();
        bar.set_draw_target(ProgressDrawTarget::stdout());
        match ProgressStyle::with_template("{msg}: {pos} [{elapsed_precise}, {per_sec}]") {
            Ok(style) => bar.set_style(style),
            Err(e) => debug!("Falling back to default progress style: {}", e),
        }
        bar.set_message("certificate_update");
        Self { bar }
    }

    pub fn hidden() -> Self {
        Self {
            bar: ProgressBar::hidden(),
        }
    }

    pub fn inc(&self) {
        self.bar.inc(1);
    }

    /// Number of domains counted so far.
    pub fn position(&self) -> u64 {
        self.bar.position()
    }

    pub fn println(&self, line: &str) {
        if self.bar.is_hidden() {
            println!("{line}");
        } else {
            self.bar.println(line);
        }
    }

    pub fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

/// Prints alert lines of every severity.
pub struct ConsoleOutput {
    formatter: ConsoleFormatter,
    progress: ProgressDisplay,
}

impl ConsoleOutput {
    pub fn new(formatter: ConsoleFormatter, progress: ProgressDisplay) -> Self {
        Self {
            formatter,
            progress,
        }
    }
}

#[async_trait]
impl Output for ConsoleOutput {
    fn name(&self) -> &str {
        "console"
    }

    fn min_severity(&self) -> Severity {
        Severity::Low
    }

    async fn send_alert(&self, alert: &Alert) -> Result<()> {
        self.progress.println(&self.formatter.format_line(alert));
        Ok(())
    }
}

/// Appends the domain of each HIGH alert to a text file, one per line.
pub struct LogFileOutput {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl LogFileOutput {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    /// Creates an output whose file name has `{date}` replaced by `date`.
    pub fn from_template(template: &str, date: NaiveDate) -> Self {
        Self::new(resolve_log_path(template, date))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Replaces `{date}` in `template` with `date` as `YYYY-MM-DD`.
pub fn resolve_log_path(template: &str, date: NaiveDate) -> PathBuf {
    PathBuf::from(template.replace("{date}", &date.format("%Y-%m-%d").to_string()))
}

#[async_trait]
impl Output for LogFileOutput {
    fn name(&self) -> &str {
        "log_file"
    }

    async fn send_alert(&self, alert: &Alert) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .with_context(|| format!("Failed to open alert log {}", self.path.display()))?;
        file.write_all(format!("{}\n", alert.domain).as_bytes())
            .await
            .with_context(|| format!("Failed to write alert log {}", self.path.display()))?;
        file.flush().await?;
        Ok(())
    }
}
