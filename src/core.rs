//! Core domain types and service traits for BrandWatch
//!
//! This module defines the fundamental data structures and trait contracts
//! that govern component interactions throughout the application.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// The CertStream `message_type` tag carried by certificate issuance events.
pub const CERTIFICATE_UPDATE: &str = "certificate_update";

/// The kind of a message received from the certificate feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventKind {
    /// A newly logged certificate. The only kind that carries domains.
    CertificateUpdate,
    /// Keep-alive sent by the feed.
    Heartbeat,
    /// Any other tag, kept verbatim for logging.
    Other(String),
}

impl EventKind {
    /// Maps a raw `message_type` tag to an `EventKind`.
    pub fn from_tag(tag: &str) -> Self {
        match tag {
            CERTIFICATE_UPDATE => Self::CertificateUpdate,
            "heartbeat" => Self::Heartbeat,
            other => Self::Other(other.to_string()),
        }
    }
}

/// A single message from the certificate feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateEvent {
    pub kind: EventKind,
    /// The `all_domains` SAN entries of the leaf certificate.
    pub domains: Vec<String>,
    /// The issuer organization (`O`) of the leaf certificate, if present.
    pub issuer_org: Option<String>,
}

impl CertificateEvent {
    /// Creates a certificate issuance event.
    pub fn certificate_update(domains: Vec<String>, issuer_org: Option<String>) -> Self {
        Self {
            kind: EventKind::CertificateUpdate,
            domains,
            issuer_org,
        }
    }

    /// Returns `true` if the pipeline should look at the domains of this event.
    pub fn carries_domains(&self) -> bool {
        self.kind == EventKind::CertificateUpdate
    }
}

/// How loudly an alert is reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Suspicious but below the alert threshold. Console only.
    Low,
    /// A full alert: email, alert log and cooldown tracking.
    High,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Low => write!(f, "LOW"),
            Severity::High => write!(f, "HIGH"),
        }
    }
}

/// Represents a notification about a domain that looks like brand impersonation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Alert {
    /// When the decision was made.
    pub timestamp: DateTime<Utc>,
    /// The normalized (lower-cased, wildcard-stripped) domain.
    pub domain: String,
    /// The brand the domain most closely resembles.
    pub brand: Option<String>,
    /// Final score, including the issuer bonus.
    pub score: u32,
    pub severity: Severity,
    /// Issuer organization of the certificate the domain came from.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub issuer: Option<String>,
}

impl Alert {
    /// Returns the attributed brand or a placeholder for display.
    pub fn brand_or_unknown(&self) -> &str {
        self.brand.as_deref().unwrap_or("unknown")
    }
}

// =============================================================================
// Service Traits
// =============================================================================

/// Sends alerts to output destinations
#[async_trait]
pub trait Output: Send + Sync {
    /// A unique, descriptive name for the output (e.g., "console", "email").
    /// Used for logging.
    fn name(&self) -> &str;

    /// The lowest severity this output wants to receive.
    fn min_severity(&self) -> Severity {
        Severity::High
    }

    /// Sends an alert to the configured output destination
    ///
    /// # Returns
    /// * `Ok(())` if the alert was successfully sent
    /// * `Err` if sending failed (network error, I/O error, etc.)
    async fn send_alert(&self, alert: &Alert) -> Result<()>;
}
