//! Audit Log Writer
//!
//! The only path that creates original audit entries. Appends are retried
//! with exponential backoff while the store is unavailable; entries that
//! still cannot be persisted are queued for redelivery and an operational
//! alert is raised. Nothing is dropped silently.

use rand::Rng;
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::audit::action::AuditAction;
use crate::audit::entry::{Actor, AuditEntry, MonotonicClock, Target};
use crate::config::WriterConfig;
use crate::database::Database;
use crate::error::AuditError;

/// Backoff schedule for appends hitting an unavailable store
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum number of attempts (including the initial one).
    pub max_attempts: u32,
    pub base_delay: Duration,
    /// Backoff is capped here.
    pub max_delay: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &WriterConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            base_delay: config.base_delay(),
            max_delay: config.max_delay(),
        }
    }

    /// Delay before retry number `attempt` (1-based), with up to 25% jitter
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exp = self
            .base_delay
            .saturating_mul(2u32.saturating_pow(attempt.saturating_sub(1)));
        let capped = exp.min(self.max_delay);
        let jitter_ms = (capped.as_millis() as u64) / 4;
        let jitter = if jitter_ms > 0 {
            rand::thread_rng().gen_range(0..=jitter_ms)
        } else {
            0
        };
        capped + Duration::from_millis(jitter)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(2),
        }
    }
}

/// Operational alert about audit data at risk
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum AuditAlert {
    /// Could not persist after all attempts; held for redelivery
    Queued {
        entry_id: String,
        action: String,
        error: String,
    },
    /// Persisting failed for a reason retrying cannot fix
    Failed {
        entry_id: String,
        action: String,
        error: String,
    },
    /// A fire-and-forget record was refused as invalid
    Rejected { action: String, reason: String },
    /// A queued entry has now been persisted
    Redelivered { entry_id: String },
}

/// Fan-out of audit alerts to the log and to any subscribers
#[derive(Clone)]
pub struct AlertSink {
    sender: broadcast::Sender<AuditAlert>,
}

impl AlertSink {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<AuditAlert> {
        self.sender.subscribe()
    }

    pub fn raise(&self, alert: AuditAlert) {
        match &alert {
            AuditAlert::Redelivered { entry_id } => {
                info!(target: "audit_alert", entry = %entry_id, "Queued audit entry redelivered");
            }
            other => {
                let detail = serde_json::to_string(other).unwrap_or_default();
                error!(target: "audit_alert", alert = %detail, "Audit data at risk");
            }
        }
        // No subscribers is fine; the log line above is the durable signal
        let _ = self.sender.send(alert);
    }
}

impl Default for AlertSink {
    fn default() -> Self {
        Self::new(64)
    }
}

/// Result of a successful append
#[derive(Debug, Clone, PartialEq)]
pub enum AppendOutcome {
    /// Durably stored
    Persisted(AuditEntry),
    /// Store unavailable; held for redelivery with its id and timestamp
    Queued(AuditEntry),
}

impl AppendOutcome {
    pub fn entry(&self) -> &AuditEntry {
        match self {
            Self::Persisted(entry) | Self::Queued(entry) => entry,
        }
    }

    pub fn into_entry(self) -> AuditEntry {
        match self {
            Self::Persisted(entry) | Self::Queued(entry) => entry,
        }
    }

    pub fn is_queued(&self) -> bool {
        matches!(self, Self::Queued(_))
    }
}

#[derive(Clone)]
pub struct LogWriter {
    database: Database,
    clock: Arc<MonotonicClock>,
    retry: RetryPolicy,
    pending: Arc<Mutex<VecDeque<AuditEntry>>>,
    alerts: AlertSink,
}

impl LogWriter {
    pub fn new(
        database: Database,
        clock: Arc<MonotonicClock>,
        retry: RetryPolicy,
        alerts: AlertSink,
    ) -> Self {
        Self {
            database,
            clock,
            retry,
            pending: Arc::new(Mutex::new(VecDeque::new())),
            alerts,
        }
    }

    pub fn alerts(&self) -> &AlertSink {
        &self.alerts
    }

    /// Validate and durably append a new entry.
    ///
    /// Unrecognised action tags are stored as uncategorized rather than
    /// refused. Retraction records cannot be created here. An unavailable
    /// store is not an error: the entry is queued and the outcome says so.
    /// Calling again would record the action twice.
    pub async fn append(
        &self,
        actor: Actor,
        action: AuditAction,
        target: Option<Target>,
    ) -> Result<AppendOutcome, AuditError> {
        if !actor.is_identified() {
            return Err(AuditError::Validation(
                "Audit actor must identify a principal".to_string(),
            ));
        }

        // Re-derive the variant so a typed payload is never stored as uncategorized
        let action = AuditAction::from_parts(action.tag(), action.metadata());
        if action.tag().trim().is_empty() {
            return Err(AuditError::Validation("Audit action tag is empty".to_string()));
        }
        if action.tag() == crate::audit::action::RETRACTION_TAG {
            return Err(AuditError::Validation(
                "Retraction records are only written by the retraction processor".to_string(),
            ));
        }

        if let Some(target) = &target {
            if target.target_type.trim().is_empty() {
                return Err(AuditError::Validation("Target type is empty".to_string()));
            }
        }

        if action.is_uncategorized() {
            warn!("Recording uncategorized audit action: {}", action.tag());
        }

        let entry = AuditEntry::new(self.clock.now(), actor, action, target);

        match self.persist_with_retry(&entry).await {
            Ok(()) => {
                debug!("Appended audit entry: {}", entry.summary());
                Ok(AppendOutcome::Persisted(entry))
            }
            Err(e) if e.is_retryable() => {
                self.pending.lock().await.push_back(entry.clone());
                self.alerts.raise(AuditAlert::Queued {
                    entry_id: entry.id.clone(),
                    action: entry.action.tag().to_string(),
                    error: e.to_string(),
                });
                Ok(AppendOutcome::Queued(entry))
            }
            Err(e) => {
                self.alerts.raise(AuditAlert::Failed {
                    entry_id: entry.id.clone(),
                    action: entry.action.tag().to_string(),
                    error: e.to_string(),
                });
                Err(e)
            }
        }
    }

    /// Fire-and-forget append for other subsystems.
    ///
    /// Never reports an error to the caller; failures are logged and
    /// alerted. The handle may be dropped.
    pub fn record_audit(
        &self,
        actor: Actor,
        action: AuditAction,
        target: Option<Target>,
    ) -> JoinHandle<()> {
        let writer = self.clone();
        tokio::spawn(async move {
            let tag = action.tag().to_string();
            match writer.append(actor, action, target).await {
                Ok(AppendOutcome::Persisted(_)) => {}
                Ok(AppendOutcome::Queued(entry)) => {
                    warn!("Audit record {} for {} queued for redelivery", entry.id, tag);
                }
                Err(AuditError::Validation(reason)) => {
                    writer.alerts.raise(AuditAlert::Rejected {
                        action: tag,
                        reason,
                    });
                }
                Err(e) => {
                    // Already alerted by append
                    warn!("Audit record for {} dropped: {}", tag, e);
                }
            }
        })
    }

    async fn persist_with_retry(&self, entry: &AuditEntry) -> Result<(), AuditError> {
        let mut attempt = 1;
        loop {
            match self.database.insert_entry(entry).await {
                Ok(_) => return Ok(()),
                Err(e) if e.is_retryable() && attempt < self.retry.max_attempts => {
                    let delay = self.retry.backoff(attempt);
                    warn!(
                        "Audit append attempt {}/{} failed: {}; retrying in {:?}",
                        attempt, self.retry.max_attempts, e, delay
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    pub async fn pending_count(&self) -> usize {
        self.pending.lock().await.len()
    }

    /// Persist queued entries in order, keeping their original id and
    /// timestamp. Stops at the first failure; returns how many were
    /// delivered.
    pub async fn flush_pending(&self) -> Result<usize, AuditError> {
        let mut pending = self.pending.lock().await;
        let mut delivered = 0;

        while let Some(entry) = pending.front() {
            match self.database.insert_entry(entry).await {
                Ok(_) => {
                    self.alerts.raise(AuditAlert::Redelivered {
                        entry_id: entry.id.clone(),
                    });
                    pending.pop_front();
                    delivered += 1;
                }
                Err(e) => {
                    warn!(
                        "Redelivery stopped with {} audit entries pending: {}",
                        pending.len(),
                        e
                    );
                    return Err(e);
                }
            }
        }

        Ok(delivered)
    }

    /// Periodically redeliver queued entries
    pub fn spawn_redelivery(&self, interval: Duration) -> JoinHandle<()> {
        let writer = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                if writer.pending_count().await == 0 {
                    continue;
                }
                match writer.flush_pending().await {
                    Ok(count) => info!("Redelivered {} queued audit entries", count),
                    Err(e) => warn!("Audit redelivery failed: {}", e),
                }
            }
        })
    }
}
