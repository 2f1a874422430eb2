//! BrandWatch - Certificate Transparency brand impersonation monitor
//!
//! Watches newly issued certificates for domains that look like phishing
//! infrastructure aimed at a configured set of brands.

use anyhow::Result;
use brandwatch::{app::App, cli::Cli, config::Config};
use clap::Parser;
use tokio::sync::watch;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn log_configuration(config: &Config) {
    info!("-------------------- Configuration --------------------");
    info!("Log Level: {}", config.log_level);
    info!("Concurrency: {}", config.concurrency);
    info!("Event Queue Capacity: {}", config.performance.queue_capacity);
    info!("CertStream URL: {}", config.network.certstream_url);
    info!("Brands File: {}", config.files.brands_yaml.display());
    info!("Whitelist File: {}", config.files.whitelist_yaml.display());
    info!("Stats File: {}", config.files.stats_file.display());
    info!("Alert Score: {}", config.detection.min_score);
    info!("Suspicious Score: {}", config.detection.suspicious_score);
    info!("Domain Cooldown: {} days", config.cooldown.domain_cooldown);
    info!("Max Alert Records: {}", config.cooldown.max_records);
    info!(
        "Email Output: {}",
        if config.smtp.enabled {
            format!("Enabled ({} recipients)", config.smtp.recipients.len())
        } else {
            "Disabled".to_string()
        }
    );
    info!("-------------------------------------------------------");
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load configuration by layering sources: defaults, file, environment, and CLI args.
    let config = match Config::load(&cli) {
        Ok(config) => config,
        Err(err) => {
            init_tracing("info");
            error!("Failed to load configuration: {:#}", err);
            std::process::exit(1);
        }
    };

    init_tracing(&config.log_level);
    info!("BrandWatch starting up...");
    log_configuration(&config);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let app = match App::builder(config).build(shutdown_rx).await {
        Ok(app) => app,
        Err(err) => {
            error!("Failed to start: {:#}", err);
            std::process::exit(1);
        }
    };

    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("Ctrl-C received, shutting down..."),
            Err(e) => error!("Failed to listen for Ctrl-C: {}", e),
        }
        let _ = shutdown_tx.send(true);
    });

    app.run().await
}
