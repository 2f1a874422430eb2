//! Command-Line Interface (CLI) argument parsing.
//!
//! This module defines the command-line arguments for the application using the
//! `clap` crate. These arguments are parsed at startup and then merged with
//! the configuration from the `brandwatch.toml` file and environment variables.

use clap::Parser;
use figment::{
    value::{Dict, Map, Value},
    Error, Metadata, Profile, Provider,
};
use std::path::PathBuf;

/// Watches Certificate Transparency logs for domains impersonating known brands.
#[derive(Parser, Debug, Default)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to the TOML configuration file.
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Logging level (trace, debug, info, warn, error).
    #[arg(long, value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// CertStream WebSocket URL.
    #[arg(long, value_name = "URL")]
    pub certstream_url: Option<String>,

    /// Number of pipeline workers.
    #[arg(long, value_name = "N")]
    pub concurrency: Option<u64>,

    /// Days during which a repeat alert for the same domain is suppressed.
    #[arg(long, value_name = "DAYS")]
    pub cooldown_days: Option<u32>,

    /// Minimum score for a HIGH alert.
    #[arg(long, value_name = "SCORE")]
    pub min_score: Option<u32>,

    /// File holding the last alert time of each domain.
    #[arg(long, value_name = "FILE")]
    pub stats_file: Option<PathBuf>,

    /// Accept invalid TLS certificates from the CertStream server.
    #[arg(long)]
    pub allow_invalid_certs: bool,

    /// Hide the scored-domain counter.
    #[arg(long)]
    pub no_progress: bool,

    /// Print alert lines without color.
    #[arg(long)]
    pub no_color: bool,
}

/// Inserts `key = value` into the `section` table of `dict`, creating it if needed.
fn insert_nested(dict: &mut Dict, section: &str, key: &str, value: Value) {
    let entry = dict
        .entry(section.to_string())
        .or_insert_with(|| Value::from(Dict::new()));
    if let Value::Dict(_, table) = entry {
        table.insert(key.to_string(), value);
    }
}

impl Provider for Cli {
    fn metadata(&self) -> Metadata {
        Metadata::named("Command-Line Arguments")
    }

    fn data(&self) -> Result<Map<Profile, Dict>, Error> {
        let mut dict = Dict::new();

        if let Some(level) = &self.log_level {
            dict.insert("log_level".into(), Value::from(level.clone()));
        }

        if let Some(concurrency) = self.concurrency {
            dict.insert("concurrency".into(), Value::from(concurrency));
        }

        if let Some(url) = &self.certstream_url {
            insert_nested(&mut dict, "network", "certstream_url", Value::from(url.clone()));
        }

        // Flags only override when present; absent flags leave lower layers alone.
        if self.allow_invalid_certs {
            insert_nested(&mut dict, "network", "allow_invalid_certs", Value::from(true));
        }

        if let Some(days) = self.cooldown_days {
            insert_nested(&mut dict, "cooldown", "domain_cooldown", Value::from(days));
        }

        if let Some(score) = self.min_score {
            insert_nested(&mut dict, "detection", "min_score", Value::from(score));
        }

        if let Some(path) = &self.stats_file {
            insert_nested(
                &mut dict,
                "files",
                "stats_file",
                Value::from(path.to_string_lossy().into_owned()),
            );
        }

        if self.no_progress {
            insert_nested(&mut dict, "output", "progress", Value::from(false));
        }

        if self.no_color {
            insert_nested(&mut dict, "output", "colored", Value::from(false));
        }

        let mut map = Map::new();
        map.insert(Profile::Default, dict);
        Ok(map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_flags() {
        let cli = Cli::try_parse_from([
            "brandwatch",
            "--config",
            "custom.toml",
            "--cooldown-days",
            "3",
            "--min-score",
            "90",
            "--no-progress",
        ])
        .unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("custom.toml")));
        assert_eq!(cli.cooldown_days, Some(3));
        assert_eq!(cli.min_score, Some(90));
        assert!(cli.no_progress);
        assert!(!cli.no_color);
    }

    #[test]
    fn test_provider_nests_sections() {
        let cli = Cli {
            cooldown_days: Some(7),
            no_color: true,
            ..Default::default()
        };
        let data = cli.data().unwrap();
        let dict = &data[&Profile::Default];

        let Some(Value::Dict(_, cooldown)) = dict.get("cooldown") else {
            panic!("cooldown section missing");
        };
        assert_eq!(cooldown.get("domain_cooldown").and_then(Value::to_u128), Some(7));

        let Some(Value::Dict(_, output)) = dict.get("output") else {
            panic!("output section missing");
        };
        assert_eq!(output.get("colored").and_then(Value::to_bool), Some(false));
        assert!(dict.get("network").is_none());
    }

    #[test]
    fn test_empty_cli_provides_nothing() {
        let data = Cli::default().data().unwrap();
        assert!(data[&Profile::Default].is_empty());
    }
}
