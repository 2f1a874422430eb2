//! Configuration management for BrandWatch
//!
//! This module defines the main `Config` struct and its sub-structs,
//! responsible for holding all application settings. It uses the `figment`
//! crate to layer built-in defaults, a `brandwatch.toml` file, environment
//! variables and command-line flags, in that order.

use crate::cli::Cli;
use crate::deduplication::CooldownConfig;
use crate::scoring::ScoringPolicy;
use anyhow::{ensure, Context, Result};
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Configuration file read when `--config` is not given.
pub const DEFAULT_CONFIG_FILE: &str = "brandwatch.toml";

/// Prefix of environment variable overrides, e.g. `BRANDWATCH_SMTP__PASSWORD`.
pub const ENV_PREFIX: &str = "BRANDWATCH_";

/// The main configuration struct for the application.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct Config {
    /// The logging level for the application.
    pub log_level: String,
    /// Number of pipeline workers pulling certificate events.
    pub concurrency: usize,
    pub network: NetworkConfig,
    pub performance: PerformanceConfig,
    pub files: FilesConfig,
    /// Scoring thresholds and weights.
    pub detection: ScoringPolicy,
    pub cooldown: CooldownConfig,
    pub smtp: SmtpConfig,
    pub output: OutputConfig,
}

/// Configuration for the CertStream network client.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct NetworkConfig {
    /// The URL of the CertStream WebSocket server.
    pub certstream_url: String,
    /// Whether to accept invalid TLS certificates (for testing).
    pub allow_invalid_certs: bool,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            certstream_url: "wss://certstream.calidog.io".to_string(),
            allow_invalid_certs: false,
        }
    }
}

/// Queue sizes.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct PerformanceConfig {
    /// Capacity of the channel between the feed client and the workers.
    pub queue_capacity: usize,
    /// Capacity of the alert record write-behind queue.
    pub flush_queue_capacity: usize,
}

impl Default for PerformanceConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 10_000,
            flush_queue_capacity: 64,
        }
    }
}

/// Input and output file locations.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct FilesConfig {
    /// YAML file with a top-level `brands` list.
    pub brands_yaml: PathBuf,
    /// YAML file with a top-level `whitelist` list.
    pub whitelist_yaml: PathBuf,
    /// Alert log file name. `{date}` is replaced by the start date.
    pub log_file: String,
    /// JSON file holding the last alert time of each domain.
    pub stats_file: PathBuf,
}

impl Default for FilesConfig {
    fn default() -> Self {
        Self {
            brands_yaml: PathBuf::from("brands.yaml"),
            whitelist_yaml: PathBuf::from("whitelist.yaml"),
            log_file: "alerts-{date}.log".to_string(),
            stats_file: PathBuf::from("alert_stats.json"),
        }
    }
}

/// How the SMTP connection is secured.
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum SmtpSecurity {
    /// TLS from the first byte (SMTPS, usually port 465).
    #[default]
    Tls,
    /// Plain connection upgraded with STARTTLS (usually port 587).
    Starttls,
    /// No encryption at all.
    None,
}

/// Configuration for email alerts.
#[derive(Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct SmtpConfig {
    pub enabled: bool,
    pub server: String,
    pub port: u16,
    pub security: SmtpSecurity,
    /// Log in with `username` and `password` before sending.
    pub use_auth: bool,
    pub username: String,
    pub password: String,
    pub sender: String,
    pub recipients: Vec<String>,
    /// Subject line with `{domain}`, `{brand}` and `{score}` placeholders.
    pub subject_template: String,
}

impl Default for SmtpConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            server: String::new(),
            port: 465,
            security: SmtpSecurity::Tls,
            use_auth: true,
            username: String::new(),
            password: String::new(),
            sender: String::new(),
            recipients: Vec::new(),
            subject_template: "[BrandWatch] Possible {brand} phishing domain: {domain} (score {score})"
                .to_string(),
        }
    }
}

impl fmt::Debug for SmtpConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SmtpConfig")
            .field("enabled", &self.enabled)
            .field("server", &self.server)
            .field("port", &self.port)
            .field("security", &self.security)
            .field("use_auth", &self.use_auth)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("sender", &self.sender)
            .field("recipients", &self.recipients)
            .field("subject_template", &self.subject_template)
            .finish()
    }
}

/// Console output settings.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct OutputConfig {
    /// Color the domain in console alert lines.
    pub colored: bool,
    /// Show the scored-domain counter.
    pub progress: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            colored: true,
            progress: true,
        }
    }
}

impl Config {
    /// Loads the application configuration by layering sources.
    ///
    /// Order, lowest precedence first: built-in defaults, the TOML file from
    /// `--config` (or `brandwatch.toml`), `BRANDWATCH_` environment variables
    /// with `__` separating nested keys, and finally command-line flags.
    pub fn load(cli: &Cli) -> Result<Self> {
        // Only the implicit default file may be absent.
        let config_path = match &cli.config {
            Some(path) => {
                ensure!(
                    path.is_file(),
                    "Configuration file {} does not exist",
                    path.display()
                );
                path.clone()
            }
            None => PathBuf::from(DEFAULT_CONFIG_FILE),
        };

        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(&config_path))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .merge(cli)
            .extract()
            .with_context(|| format!("Failed to load configuration from {}", config_path.display()))?;

        config.validate()?;
        Ok(config)
    }

    /// Rejects settings the application cannot run with.
    pub fn validate(&self) -> Result<()> {
        ensure!(self.concurrency > 0, "concurrency must be greater than 0");
        ensure!(
            self.performance.queue_capacity > 0,
            "performance.queue_capacity must be greater than 0"
        );
        ensure!(
            self.cooldown.max_records > 0,
            "cooldown.max_records must be greater than 0"
        );
        if self.smtp.enabled {
            ensure!(!self.smtp.server.is_empty(), "smtp.server is required when smtp is enabled");
            ensure!(!self.smtp.sender.is_empty(), "smtp.sender is required when smtp is enabled");
            ensure!(
                !self.smtp.recipients.is_empty(),
                "smtp.recipients must not be empty when smtp is enabled"
            );
        }
        Ok(())
    }
}

// Provide a default implementation for tests and easy setup.
impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            concurrency: 4,
            network: NetworkConfig::default(),
            performance: PerformanceConfig::default(),
            files: FilesConfig::default(),
            detection: ScoringPolicy::default(),
            cooldown: CooldownConfig::default(),
            smtp: SmtpConfig::default(),
            output: OutputConfig::default(),
        }
    }
}
