//! Audit Log Verification
//!
//! Offline integrity checks over a full snapshot of the log: content hashes
//! and the two-way link between retracted entries and their retraction
//! records.

use serde::Serialize;
use std::collections::{HashMap, HashSet};
use tracing::info;

use crate::audit::entry::{AuditEntry, EntryStatus};
use crate::database::Database;
use crate::error::AuditError;

/// Outcome of a verification pass
#[derive(Debug, Clone, Default, Serialize)]
pub struct VerificationResult {
    pub entry_count: usize,
    pub retraction_count: usize,
    pub problems: Vec<String>,
}

impl VerificationResult {
    pub fn is_valid(&self) -> bool {
        self.problems.is_empty()
    }
}

/// Verify a snapshot of entries
pub fn verify_entries(entries: &[AuditEntry]) -> VerificationResult {
    let mut result = VerificationResult {
        entry_count: entries.len(),
        ..Default::default()
    };

    let by_id: HashMap<&str, &AuditEntry> = entries.iter().map(|e| (e.id.as_str(), e)).collect();
    if by_id.len() != entries.len() {
        result.problems.push("Duplicate entry ids".to_string());
    }

    let mut referenced: HashSet<&str> = HashSet::new();

    for entry in entries {
        if !entry.verify_hash() {
            result
                .problems
                .push(format!("Entry {} content hash mismatch", entry.id));
        }

        match (entry.status, entry.retraction_ref.as_deref()) {
            (EntryStatus::Active, Some(_)) => result
                .problems
                .push(format!("Active entry {} carries a retraction reference", entry.id)),
            (EntryStatus::Retracted, None) => result
                .problems
                .push(format!("Retracted entry {} has no retraction reference", entry.id)),
            (EntryStatus::Retracted, Some(reference)) => {
                let linked = by_id
                    .get(reference)
                    .and_then(|record| record.retraction_details())
                    .map(|details| details.retracted_entry_id == entry.id)
                    .unwrap_or(false);
                if !linked {
                    result.problems.push(format!(
                        "Retracted entry {} does not resolve to its retraction record {}",
                        entry.id, reference
                    ));
                }
            }
            (EntryStatus::Active, None) => {}
        }

        if let Some(details) = entry.retraction_details() {
            result.retraction_count += 1;

            if entry.status != EntryStatus::Active {
                result
                    .problems
                    .push(format!("Retraction record {} is itself retracted", entry.id));
            }

            if !referenced.insert(details.retracted_entry_id.as_str()) {
                result.problems.push(format!(
                    "Entry {} has more than one retraction record",
                    details.retracted_entry_id
                ));
            }

            let original = by_id.get(details.retracted_entry_id.as_str());
            let consistent = original
                .map(|o| {
                    o.status == EntryStatus::Retracted
                        && o.retraction_ref.as_deref() == Some(entry.id.as_str())
                })
                .unwrap_or(false);
            if !consistent {
                result.problems.push(format!(
                    "Retraction record {} is not reflected on entry {}",
                    entry.id, details.retracted_entry_id
                ));
            }
        }
    }

    result
}

/// Verify everything currently in the store
pub async fn verify_store(database: &Database) -> Result<VerificationResult, AuditError> {
    let entries = database.all_entries().await?;
    let result = verify_entries(&entries);
    info!(
        "Audit log verification: {} entries, {} retractions, {} problems",
        result.entry_count,
        result.retraction_count,
        result.problems.len()
    );
    Ok(result)
}
