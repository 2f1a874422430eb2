/// BrandWatch - flags newly certified domains that impersonate known brands
///
/// This library provides the detection core (normalization, scoring, alert
/// cooldown) together with the CertStream client, outputs and application
/// wiring around it.
pub mod app;
pub mod cli;
pub mod config;
pub mod confusables;
pub mod core;
pub mod deduplication;
pub mod formatting;
pub mod network;
pub mod normalize;
pub mod notification;
pub mod outputs;
pub mod persistence;
pub mod pipeline;
pub mod scoring;
pub mod task_manager;
pub mod watchlist;

// Re-export core types for convenience
pub use crate::core::*;
