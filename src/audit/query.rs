//! Audit Query Engine
//!
//! Filtered, paginated review of the audit log. Results are ordered newest
//! first with ties broken by id, so both offset pages and keyset cursors stay
//! stable when several entries share a timestamp.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::audit::entry::{AuditEntry, EntryStatus};
use crate::authorization::AdminPrincipal;
use crate::config::QueryConfig;
use crate::database::Database;
use crate::error::AuditError;

/// Action tag filter: exact tag, or every tag under a `prefix.*`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionFilter {
    Exact(String),
    Prefix(String),
}

impl ActionFilter {
    pub fn parse(pattern: &str) -> Result<Self, AuditError> {
        let pattern = pattern.trim();
        if pattern.is_empty() {
            return Err(AuditError::Validation("Empty action filter".to_string()));
        }

        match pattern.strip_suffix('*') {
            Some(prefix) if prefix.contains('*') => Err(AuditError::Validation(format!(
                "Unsupported action pattern: {}",
                pattern
            ))),
            Some(prefix) => Ok(Self::Prefix(prefix.to_string())),
            None if pattern.contains('*') => Err(AuditError::Validation(format!(
                "Unsupported action pattern: {}",
                pattern
            ))),
            None => Ok(Self::Exact(pattern.to_string())),
        }
    }
}

/// Conjunctive filter over audit entries; `None` fields match everything
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AuditFilter {
    pub actor_id: Option<String>,
    pub action: Option<ActionFilter>,
    pub target_type: Option<String>,
    pub target_id: Option<String>,
    /// Inclusive lower bound
    pub from: Option<DateTime<Utc>>,
    /// Exclusive upper bound
    pub to: Option<DateTime<Utc>>,
    pub status: Option<EntryStatus>,
}

impl AuditFilter {
    pub fn validate(&self) -> Result<(), AuditError> {
        if let (Some(from), Some(to)) = (self.from, self.to) {
            if from > to {
                return Err(AuditError::Validation(format!(
                    "Time range start {} is after end {}",
                    from.to_rfc3339(),
                    to.to_rfc3339()
                )));
            }
        }
        Ok(())
    }
}

/// Keyset position: the last entry of the previous page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cursor {
    pub ts_micros: i64,
    pub id: String,
}

impl Cursor {
    pub fn after(entry: &AuditEntry) -> Self {
        Self {
            ts_micros: entry.timestamp.timestamp_micros(),
            id: entry.id.clone(),
        }
    }

    pub fn encode(&self) -> String {
        URL_SAFE_NO_PAD.encode(format!("{}:{}", self.ts_micros, self.id))
    }

    pub fn decode(token: &str) -> Result<Self, AuditError> {
        let invalid = || AuditError::Validation("Invalid pagination cursor".to_string());

        let bytes = URL_SAFE_NO_PAD.decode(token).map_err(|_| invalid())?;
        let text = String::from_utf8(bytes).map_err(|_| invalid())?;
        let (ts, id) = text.split_once(':').ok_or_else(invalid)?;
        if id.is_empty() {
            return Err(invalid());
        }

        Ok(Self {
            ts_micros: ts.parse().map_err(|_| invalid())?,
            id: id.to_string(),
        })
    }
}

/// Requested window into the filtered result set
#[derive(Debug, Clone, PartialEq)]
pub enum PageRequest {
    /// 1-based page number
    Offset { page: u32, limit: u32 },
    After { cursor: Cursor, limit: u32 },
}

impl PageRequest {
    pub fn limit(&self) -> u32 {
        match self {
            Self::Offset { limit, .. } | Self::After { limit, .. } => *limit,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryPage {
    pub entries: Vec<AuditEntry>,
    pub total_count: u64,
    pub page: Option<u32>,
    pub limit: u32,
    pub next_cursor: Option<String>,
}

#[derive(Clone)]
pub struct QueryEngine {
    database: Database,
    config: QueryConfig,
}

impl QueryEngine {
    pub fn new(database: Database, config: QueryConfig) -> Self {
        Self { database, config }
    }

    /// Build a page request from raw paging parameters, clamping the limit
    /// to `[1, max_page_size]`.
    pub fn page_request(
        &self,
        page: Option<u32>,
        limit: Option<u32>,
        cursor: Option<&str>,
    ) -> Result<PageRequest, AuditError> {
        let limit = limit
            .unwrap_or(self.config.default_page_size)
            .clamp(1, self.config.max_page_size);

        match (page, cursor) {
            (Some(_), Some(_)) => Err(AuditError::Validation(
                "Use either page or cursor, not both".to_string(),
            )),
            (_, Some(token)) => Ok(PageRequest::After {
                cursor: Cursor::decode(token)?,
                limit,
            }),
            (Some(0), None) => Err(AuditError::Validation(
                "Page numbers start at 1".to_string(),
            )),
            (page, None) => Ok(PageRequest::Offset {
                page: page.unwrap_or(1),
                limit,
            }),
        }
    }

    /// Filtered page of entries with the filtered total
    pub async fn query(
        &self,
        principal: &AdminPrincipal,
        filter: &AuditFilter,
        page: &PageRequest,
    ) -> Result<QueryPage, AuditError> {
        filter.validate()?;
        let limit = page.limit().clamp(1, self.config.max_page_size);

        let (after, offset, page_number) = match page {
            PageRequest::Offset { page, .. } => {
                (None, u64::from(page.saturating_sub(1)) * u64::from(limit), Some(*page))
            }
            PageRequest::After { cursor, .. } => (Some(cursor), 0, None),
        };

        // One extra row tells us whether another page follows
        let (mut entries, total_count) = self
            .database
            .find_entries(filter, after, offset, limit + 1)
            .await?;

        let has_more = entries.len() > limit as usize;
        entries.truncate(limit as usize);
        let next_cursor = if has_more {
            entries.last().map(|e| Cursor::after(e).encode())
        } else {
            None
        };

        debug!(
            operator = %principal.id,
            returned = entries.len(),
            total = total_count,
            "Audit query served"
        );

        Ok(QueryPage {
            entries,
            total_count,
            page: page_number,
            limit,
            next_cursor,
        })
    }

    /// Single entry by id, whatever its status
    pub async fn get_by_id(
        &self,
        principal: &AdminPrincipal,
        id: &str,
    ) -> Result<AuditEntry, AuditError> {
        debug!(operator = %principal.id, entry = id, "Audit entry lookup");
        self.database
            .get_entry(id)
            .await?
            .ok_or_else(|| AuditError::NotFound(id.to_string()))
    }
}
