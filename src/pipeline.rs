//! Turns certificate events into alert decisions.
//!
//! For each domain of a `certificate_update` event the pipeline normalizes,
//! checks the whitelist, scores, applies the issuer bonus, consults the alert
//! gate and dispatches the resulting alert. Every domain ends in a
//! [`DomainDecision`]; nothing here returns an error to the caller.

use crate::config::Config;
use crate::core::{Alert, CertificateEvent, Severity};
use crate::deduplication::AlertGate;
use crate::confusables::has_confusables;
use crate::normalize::normalize;
use crate::outputs::{OutputManager, ProgressDisplay};
use crate::scoring::{score, ScoreResult, ScoringPolicy};
use crate::watchlist::{load_brands, load_whitelist, BrandSet, Whitelist};
use anyhow::Result;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{debug, info, instrument, trace, warn};

/// Read-only inputs shared by every worker.
#[derive(Debug, Clone)]
pub struct DetectionContext {
    pub brands: BrandSet,
    pub whitelist: Whitelist,
    pub policy: ScoringPolicy,
}

impl DetectionContext {
    pub fn new(brands: BrandSet, whitelist: Whitelist, policy: ScoringPolicy) -> Self {
        Self {
            brands,
            whitelist,
            policy,
        }
    }

    /// Loads the brand and whitelist files named in `config`.
    pub fn load(config: &Config) -> Result<Self> {
        let brands = load_brands(&config.files.brands_yaml)?;
        let whitelist = load_whitelist(&config.files.whitelist_yaml)?;
        info!(
            brands = brands.len(),
            whitelist = whitelist.len(),
            "Loaded detection lists."
        );
        Ok(Self::new(brands, whitelist, config.detection.clone()))
    }
}

/// What happened to one domain of an event.
#[derive(Debug, Clone, PartialEq)]
pub enum DomainDecision {
    /// Nothing left after normalization.
    Skipped,
    /// Matched the whitelist; never scored.
    Whitelisted,
    /// A HIGH alert fired and was recorded.
    Alerted(Alert),
    /// Would have been a HIGH alert, but the domain is still cooling down.
    Suppressed { score: u32 },
    /// A LOW alert was shown on the console.
    Suspicious(Alert),
    /// Scored below every threshold.
    Ignored { score: u32 },
}

pub struct EventPipeline {
    context: Arc<DetectionContext>,
    gate: Arc<AlertGate>,
    outputs: Arc<OutputManager>,
    progress: ProgressDisplay,
}

impl EventPipeline {
    pub fn new(
        context: Arc<DetectionContext>,
        gate: Arc<AlertGate>,
        outputs: Arc<OutputManager>,
        progress: ProgressDisplay,
    ) -> Self {
        Self {
            context,
            gate,
            outputs,
            progress,
        }
    }

    /// Processes every domain of `event` in order.
    ///
    /// Events that are not certificate updates yield no decisions.
    #[instrument(skip_all, fields(domains = event.domains.len()))]
    pub async fn process_event(
        &self,
        event: &CertificateEvent,
        now: DateTime<Utc>,
    ) -> Vec<(String, DomainDecision)> {
        if !event.carries_domains() {
            trace!(kind = ?event.kind, "Ignoring event without domains.");
            return Vec::new();
        }

        let issuer = event.issuer_org.as_deref();
        let mut decisions = Vec::with_capacity(event.domains.len());
        for raw in &event.domains {
            let decision = self.process_domain(raw, issuer, now).await;
            decisions.push((raw.clone(), decision));
        }
        decisions
    }

    pub async fn process_domain(
        &self,
        raw: &str,
        issuer_org: Option<&str>,
        now: DateTime<Utc>,
    ) -> DomainDecision {
        let normalized = normalize(raw);
        if normalized.domain.is_empty() {
            debug!(raw = %raw, "Skipping empty domain entry.");
            return DomainDecision::Skipped;
        }
        let domain = normalized.domain.as_str();
        if has_confusables(domain) {
            debug!(domain = %domain, body = %normalized.body, "Folded look-alike characters.");
        }

        if self.context.whitelist.is_whitelisted(domain) {
            trace!(domain = %domain, "Domain is whitelisted.");
            return DomainDecision::Whitelisted;
        }

        self.progress.inc();
        let policy = &self.context.policy;
        let result = score(&normalized, &self.context.brands, policy)
            .with_bonus(policy.issuer_bonus(issuer_org));
        trace!(
            domain = %domain,
            suffix = normalized.suffix().unwrap_or("-"),
            parsed = normalized.is_fully_parsed(),
            score = result.score,
            brand = ?result.brand,
            similarity = result.similarity_percentage,
            breakdown = ?result.breakdown,
            "Scored domain."
        );

        if result.is_alert(policy) {
            if !self.gate.try_fire(domain, now).await {
                return DomainDecision::Suppressed {
                    score: result.score,
                };
            }
            let alert = build_alert(domain, &result, Severity::High, issuer_org, now);
            info!(
                domain = %domain,
                score = alert.score,
                brand = alert.brand_or_unknown(),
                "Alert fired."
            );
            self.dispatch(&alert).await;
            return DomainDecision::Alerted(alert);
        }

        if result.is_suspicious(policy) {
            let alert = build_alert(domain, &result, Severity::Low, issuer_org, now);
            debug!(domain = %domain, score = alert.score, "Suspicious domain.");
            self.dispatch(&alert).await;
            return DomainDecision::Suspicious(alert);
        }

        DomainDecision::Ignored {
            score: result.score,
        }
    }

    async fn dispatch(&self, alert: &Alert) {
        if let Err(e) = self.outputs.send_alert(alert).await {
            warn!("Alert for {} was not fully delivered: {:#}", alert.domain, e);
        }
    }
}

fn build_alert(
    domain: &str,
    result: &ScoreResult,
    severity: Severity,
    issuer_org: Option<&str>,
    now: DateTime<Utc>,
) -> Alert {
    Alert {
        timestamp: now,
        domain: domain.to_string(),
        brand: result.brand.clone(),
        score: result.score,
        severity,
        issuer: issuer_org.map(str::to_string),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{EventKind, Output};
    use crate::deduplication::CooldownConfig;
    use async_trait::async_trait;
    use chrono::TimeZone;
    use std::sync::Mutex;

    #[derive(Default)]
    struct CollectingOutput {
        alerts: Mutex<Vec<Alert>>,
    }

    #[async_trait]
    impl Output for CollectingOutput {
        fn name(&self) -> &str {
            "collecting"
        }

        fn min_severity(&self) -> Severity {
            Severity::Low
        }

        async fn send_alert(&self, alert: &Alert) -> anyhow::Result<()> {
            self.alerts.lock().unwrap().push(alert.clone());
            Ok(())
        }
    }

    fn pipeline(collector: Arc<CollectingOutput>) -> (EventPipeline, ProgressDisplay) {
        let context = DetectionContext::new(
            BrandSet::new(["paypal", "apple"]).unwrap(),
            Whitelist::new(["google.com"]),
            ScoringPolicy::default(),
        );
        let gate = AlertGate::new(&CooldownConfig {
            domain_cooldown: 1,
            ..Default::default()
        });
        let progress = ProgressDisplay::hidden();
        let pipeline = EventPipeline::new(
            Arc::new(context),
            Arc::new(gate),
            Arc::new(OutputManager::new(vec![collector])),
            progress.clone(),
        );
        (pipeline, progress)
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 7, 5, 12, 0, 0).unwrap()
    }

    #[tokio::test]
    async fn test_non_update_events_are_ignored() {
        let collector = Arc::new(CollectingOutput::default());
        let (pipeline, progress) = pipeline(collector.clone());
        let event = CertificateEvent {
            kind: EventKind::Heartbeat,
            domains: vec!["paypa1-secure.com".to_string()],
            issuer_org: None,
        };
        assert!(pipeline.process_event(&event, now()).await.is_empty());
        assert_eq!(progress.position(), 0);
        assert!(collector.alerts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_wildcard_entry_alerts_on_stripped_domain() {
        let collector = Arc::new(CollectingOutput::default());
        let (pipeline, _) = pipeline(collector.clone());
        let decision = pipeline
            .process_domain("*.PAYPA1-SECURE.com", Some("Let's Encrypt"), now())
            .await;

        let DomainDecision::Alerted(alert) = decision else {
            panic!("expected an alert, got {:?}", decision);
        };
        assert_eq!(alert.domain, "paypa1-secure.com");
        assert_eq!(alert.severity, Severity::High);
        assert_eq!(alert.issuer.as_deref(), Some("Let's Encrypt"));
    }

    #[tokio::test]
    async fn test_empty_entry_is_skipped_without_stopping_the_event() {
        let collector = Arc::new(CollectingOutput::default());
        let (pipeline, _) = pipeline(collector.clone());
        let event = CertificateEvent::certificate_update(
            vec!["  ".to_string(), "paypa1-secure.com".to_string()],
            None,
        );
        let decisions = pipeline.process_event(&event, now()).await;
        assert_eq!(decisions.len(), 2);
        assert_eq!(decisions[0].1, DomainDecision::Skipped);
        assert!(matches!(decisions[1].1, DomainDecision::Alerted(_)));
    }

    #[tokio::test]
    async fn test_cyrillic_lookalike_alerts_on_folded_body() {
        let collector = Arc::new(CollectingOutput::default());
        let (pipeline, _) = pipeline(collector.clone());
        let decision = pipeline
            .process_domain("p\u{0430}yp\u{0430}l-login.com", None, now())
            .await;

        let DomainDecision::Alerted(alert) = decision else {
            panic!("expected an alert, got {:?}", decision);
        };
        assert_eq!(alert.domain, "p\u{0430}yp\u{0430}l-login.com");
        assert_eq!(alert.brand.as_deref(), Some("paypal"));
    }

    #[tokio::test]
    async fn test_plain_domain_is_ignored() {
        let collector = Arc::new(CollectingOutput::default());
        let (pipeline, progress) = pipeline(collector.clone());
        let decision = pipeline.process_domain("example.org", None, now()).await;
        assert!(matches!(decision, DomainDecision::Ignored { .. }));
        assert_eq!(progress.position(), 1);
        assert!(collector.alerts.lock().unwrap().is_empty());
    }
}
