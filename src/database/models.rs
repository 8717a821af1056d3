use serde_json::Value;
use sqlx::FromRow;

use crate::audit::action::AuditAction;
use crate::audit::entry::{micros_to_datetime, Actor, AuditEntry, EntryStatus};
use crate::error::AuditError;

/// Row shape of `audit_entries`
#[derive(Debug, Clone, FromRow)]
pub struct AuditEntryRow {
    pub id: String,
    pub ts_micros: i64,
    pub actor: String,
    pub action: String,
    pub metadata: String,
    pub target_type: Option<String>,
    pub target_id: Option<String>,
    pub status: String,
    pub retraction_ref: Option<String>,
    pub content_hash: String,
}

impl TryFrom<AuditEntryRow> for AuditEntry {
    type Error = AuditError;

    fn try_from(row: AuditEntryRow) -> Result<Self, Self::Error> {
        let actor: Actor = serde_json::from_str(&row.actor).map_err(|e| {
            AuditError::Database(format!("Corrupt actor in entry {}: {}", row.id, e))
        })?;
        let metadata: Value = serde_json::from_str(&row.metadata).map_err(|e| {
            AuditError::Database(format!("Corrupt metadata in entry {}: {}", row.id, e))
        })?;
        let status: EntryStatus = row
            .status
            .parse()
            .map_err(|e| AuditError::Database(format!("Entry {}: {}", row.id, e)))?;

        Ok(AuditEntry {
            id: row.id,
            timestamp: micros_to_datetime(row.ts_micros),
            actor,
            action: AuditAction::from_parts(&row.action, metadata),
            target_type: row.target_type,
            target_id: row.target_id,
            status,
            retraction_ref: row.retraction_ref,
            content_hash: row.content_hash,
        })
    }
}
