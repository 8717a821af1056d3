//! Audit Log System
//!
//! Append-only record of privileged actions with non-destructive
//! retraction and filtered review.

pub mod action;
pub mod entry;
pub mod logger;
pub mod query;
pub mod retraction;
pub mod verify;

pub use action::{
    AuditAction, ChangeSet, FieldChange, LoginFailure, RetractionDetails, RoleChange,
    RETRACTION_TAG,
};
pub use entry::{Actor, AuditEntry, EntryStatus, MonotonicClock, Target};
pub use logger::{AlertSink, AppendOutcome, AuditAlert, LogWriter, RetryPolicy};
pub use query::{ActionFilter, AuditFilter, Cursor, PageRequest, QueryEngine, QueryPage};
pub use retraction::RetractionProcessor;
pub use verify::{verify_entries, verify_store, VerificationResult};
