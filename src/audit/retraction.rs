//! Retraction Processor
//!
//! Corrects a mistaken entry without touching its content: a compensating
//! `audit.retracted` record is written and the original is flipped to
//! `retracted` in the same transaction.

use std::sync::Arc;
use tracing::info;

use crate::audit::action::{AuditAction, RetractionDetails};
use crate::audit::entry::{AuditEntry, MonotonicClock, Target};
use crate::authorization::AdminPrincipal;
use crate::database::Database;
use crate::error::AuditError;

/// Target type used by retraction records to point at the original entry
pub const AUDIT_ENTRY_TARGET: &str = "audit_entry";

#[derive(Clone)]
pub struct RetractionProcessor {
    database: Database,
    clock: Arc<MonotonicClock>,
}

impl RetractionProcessor {
    pub fn new(database: Database, clock: Arc<MonotonicClock>) -> Self {
        Self { database, clock }
    }

    /// Retract `entry_id` on behalf of `operator`.
    ///
    /// Fails with NotFound if the entry does not exist and Conflict if it is
    /// already retracted or is itself a retraction record. No partial write
    /// is ever left behind.
    pub async fn retract(
        &self,
        operator: &AdminPrincipal,
        entry_id: &str,
        reason: &str,
    ) -> Result<AuditEntry, AuditError> {
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(AuditError::Validation(
                "A retraction reason is required".to_string(),
            ));
        }

        let record = AuditEntry::new(
            self.clock.now(),
            operator.as_actor(),
            AuditAction::Retracted(RetractionDetails {
                retracted_entry_id: entry_id.to_string(),
                reason: reason.to_string(),
                retracted_by: operator.id.clone(),
            }),
            Some(Target::new(AUDIT_ENTRY_TARGET, entry_id)),
        );

        self.database.commit_retraction(entry_id, &record).await?;

        info!(
            operator = %operator.id,
            entry = entry_id,
            retraction = %record.id,
            "Audit entry retracted"
        );
        Ok(record)
    }
}
