// Cooldown tracking for HIGH alerts.

use crate::persistence::{AlertRecords, AlertStore, StoreError, StoreWriter};
use chrono::{DateTime, Duration, Utc};
use moka::future::Cache;
use moka::policy::EvictionPolicy;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

const SECONDS_PER_DAY: u64 = 86_400;

/// Configuration for alert cooldown.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CooldownConfig {
    /// Days during which a repeat alert for the same domain is suppressed.
    pub domain_cooldown: u32,
    /// Upper bound on the number of remembered domains.
    pub max_records: u64,
    /// Forget a domain once its cooldown window has passed.
    pub expire_after_cooldown: bool,
}

impl Default for CooldownConfig {
    fn default() -> Self {
        Self {
            domain_cooldown: 0,
            max_records: 1_000_000,
            expire_after_cooldown: false,
        }
    }
}

/// Decides whether a HIGH alert may fire for a domain and remembers when it did.
///
/// Records live in a bounded cache. Every recorded alert is followed by a
/// snapshot of all records being queued on the [`StoreWriter`], if one is
/// attached.
pub struct AlertGate {
    records: Cache<String, DateTime<Utc>>,
    cooldown_days: u32,
    decision_lock: Mutex<()>,
    writer: Option<StoreWriter>,
}

impl AlertGate {
    /// Creates an empty gate.
    ///
    /// When `max_records` is reached the least recently used record is
    /// evicted, so a domain that has just alerted is always kept.
    pub fn new(config: &CooldownConfig) -> Self {
        let mut builder = Cache::builder()
            .max_capacity(config.max_records)
            .eviction_policy(EvictionPolicy::lru());
        if config.expire_after_cooldown && config.domain_cooldown > 0 {
            builder = builder.time_to_live(std::time::Duration::from_secs(
                u64::from(config.domain_cooldown) * SECONDS_PER_DAY,
            ));
        }
        Self {
            records: builder.build(),
            cooldown_days: config.domain_cooldown,
            decision_lock: Mutex::new(()),
            writer: None,
        }
    }

    /// Creates a gate seeded from `store`.
    ///
    /// An unreadable or corrupt store is logged and treated as empty.
    pub async fn load(store: &dyn AlertStore, config: &CooldownConfig) -> Self {
        let gate = Self::new(config);
        match store.load() {
            Ok(records) => {
                let count = records.len();
                gate.restore(records).await;
                info!(count, "Loaded alert records.");
            }
            Err(e) => {
                warn!("Could not load alert records, starting with none: {}", e);
            }
        }
        gate
    }

    /// Attaches the writer that persists records after each alert.
    pub fn with_writer(mut self, writer: StoreWriter) -> Self {
        self.writer = Some(writer);
        self
    }

    /// Inserts records without persisting them.
    pub async fn restore(&self, records: AlertRecords) {
        for (domain, timestamp) in records {
            self.records.insert(domain, timestamp).await;
        }
    }

    /// Returns `true` unless `domain` alerted less than `cooldown_days` before `now`.
    pub async fn should_alert(&self, domain: &str, now: DateTime<Utc>, cooldown_days: u32) -> bool {
        match self.records.get(domain).await {
            None => true,
            Some(last) => now.signed_duration_since(last) >= Duration::days(i64::from(cooldown_days)),
        }
    }

    /// Overwrites the last-alert time of `domain` and queues a save.
    pub async fn record_alert(&self, domain: &str, now: DateTime<Utc>) {
        self.records.insert(domain.to_string(), now).await;
        if let Some(writer) = &self.writer {
            writer.enqueue(self.snapshot()).await;
        }
    }

    /// Checks and records in one step, using the configured cooldown.
    ///
    /// Concurrent callers are serialized, so two workers can never both pass
    /// the cooldown check for the same domain.
    pub async fn try_fire(&self, domain: &str, now: DateTime<Utc>) -> bool {
        let _guard = self.decision_lock.lock().await;
        if !self.should_alert(domain, now, self.cooldown_days).await {
            debug!(domain = %domain, "Alert suppressed by cooldown.");
            return false;
        }
        self.record_alert(domain, now).await;
        true
    }

    pub async fn last_alert(&self, domain: &str) -> Option<DateTime<Utc>> {
        self.records.get(domain).await
    }

    /// A copy of every record currently held.
    pub fn snapshot(&self) -> AlertRecords {
        self.records
            .iter()
            .map(|(domain, timestamp)| (domain.as_ref().clone(), timestamp))
            .collect()
    }

    /// Saves all records to `store` right away, bypassing the writer queue.
    pub fn flush_to(&self, store: &dyn AlertStore) -> Result<(), StoreError> {
        store.save(&self.snapshot())
    }
}
