//! Audit Entry
//!
//! The immutable unit of the audit log. Entries carry a content hash over
//! their immutable fields so that offline verification can detect rows that
//! were altered after the fact.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::sync::atomic::{AtomicI64, Ordering};

use crate::audit::action::{AuditAction, RetractionDetails};

/// Principal responsible for an action
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Actor {
    pub id: String,
    pub display_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
}

impl Actor {
    pub fn new(id: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
            email: None,
            role: None,
        }
    }

    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.role = Some(role.into());
        self
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    /// Whether this actor identifies a concrete principal
    pub fn is_identified(&self) -> bool {
        let id = self.id.trim();
        !id.is_empty() && !id.eq_ignore_ascii_case("anonymous")
    }
}

/// Entity an action was performed on
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Target {
    pub target_type: String,
    #[serde(default)]
    pub target_id: Option<String>,
}

impl Target {
    pub fn new(target_type: impl Into<String>, target_id: impl Into<String>) -> Self {
        Self {
            target_type: target_type.into(),
            target_id: Some(target_id.into()),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum EntryStatus {
    Active,
    Retracted,
}

impl EntryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryStatus::Active => "active",
            EntryStatus::Retracted => "retracted",
        }
    }
}

impl std::fmt::Display for EntryStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for EntryStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(EntryStatus::Active),
            "retracted" => Ok(EntryStatus::Retracted),
            _ => Err(format!("Invalid entry status: {}", s)),
        }
    }
}

/// Audit log entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditEntry {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub actor: Actor,
    #[serde(flatten)]
    pub action: AuditAction,
    pub target_type: Option<String>,
    pub target_id: Option<String>,
    pub status: EntryStatus,
    pub retraction_ref: Option<String>,
    pub content_hash: String,
}

impl AuditEntry {
    /// Create a new active entry with a fresh id
    pub fn new(
        timestamp: DateTime<Utc>,
        actor: Actor,
        action: AuditAction,
        target: Option<Target>,
    ) -> Self {
        let (target_type, target_id) = match target {
            Some(t) => (Some(t.target_type), t.target_id),
            None => (None, None),
        };

        let mut entry = Self {
            id: uuid::Uuid::new_v4().to_string(),
            timestamp,
            actor,
            action,
            target_type,
            target_id,
            status: EntryStatus::Active,
            retraction_ref: None,
            content_hash: String::new(),
        };

        entry.content_hash = entry.calculate_hash();
        entry
    }

    /// Canonical string over the immutable fields.
    ///
    /// `status` and `retraction_ref` are excluded: they change exactly once
    /// when the entry is retracted.
    pub fn canonical_string(&self) -> String {
        let actor = serde_json::to_string(&self.actor).unwrap_or_default();
        format!(
            "id:{}|timestamp:{}|actor:{}|action:{}|metadata:{}|target_type:{}|target_id:{}",
            self.id,
            self.timestamp.timestamp_micros(),
            actor,
            self.action.tag(),
            self.action.metadata(),
            self.target_type.as_deref().unwrap_or(""),
            self.target_id.as_deref().unwrap_or(""),
        )
    }

    /// Calculate SHA256 hash of this entry
    pub fn calculate_hash(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.canonical_string().as_bytes());
        format!("sha256:{}", hex::encode(hasher.finalize()))
    }

    pub fn verify_hash(&self) -> bool {
        self.content_hash == self.calculate_hash()
    }

    pub fn is_retraction_record(&self) -> bool {
        self.action.is_retraction()
    }

    /// Details carried by a retraction record
    pub fn retraction_details(&self) -> Option<&RetractionDetails> {
        match &self.action {
            AuditAction::Retracted(details) => Some(details),
            _ => None,
        }
    }

    pub fn summary(&self) -> String {
        format!(
            "{} {} by {} on {}:{} [{}]",
            self.id,
            self.action.tag(),
            self.actor.id,
            self.target_type.as_deref().unwrap_or("-"),
            self.target_id.as_deref().unwrap_or("-"),
            self.status
        )
    }
}

/// Timestamp source that never goes backwards and never repeats.
///
/// Timestamps are truncated to microseconds, the precision the store keeps.
#[derive(Debug, Default)]
pub struct MonotonicClock {
    last_micros: AtomicI64,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn now(&self) -> DateTime<Utc> {
        let wall = Utc::now().timestamp_micros();
        let mut last = self.last_micros.load(Ordering::Relaxed);
        loop {
            let next = wall.max(last + 1);
            match self.last_micros.compare_exchange_weak(
                last,
                next,
                Ordering::AcqRel,
                Ordering::Relaxed,
            ) {
                Ok(_) => return micros_to_datetime(next),
                Err(actual) => last = actual,
            }
        }
    }
}

pub fn micros_to_datetime(micros: i64) -> DateTime<Utc> {
    Utc.timestamp_micros(micros)
        .single()
        .unwrap_or_default()
}
