use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Path, Query, State,
    },
    response::Json,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;

use super::AppState;
use crate::audit::{ActionFilter, AuditFilter, EntryStatus, QueryPage};
use crate::authorization::AdminPrincipal;
use crate::error::AuditError;

/// Query string of `GET /admin/audit`
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditQueryParams {
    pub actor: Option<String>,
    pub action: Option<String>,
    pub target_type: Option<String>,
    pub target_id: Option<String>,
    pub from: Option<String>,
    pub to: Option<String>,
    pub status: Option<String>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub cursor: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RetractRequest {
    pub reason: String,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn parse_instant(field: &str, value: Option<String>) -> Result<Option<DateTime<Utc>>, AuditError> {
    non_empty(value)
        .map(|v| {
            DateTime::parse_from_rfc3339(&v)
                .map(|t| t.with_timezone(&Utc))
                .map_err(|e| AuditError::Validation(format!("Invalid {} timestamp: {}", field, e)))
        })
        .transpose()
}

impl AuditQueryParams {
    pub fn into_filter(self) -> Result<AuditFilter, AuditError> {
        let status = non_empty(self.status)
            .map(|s| s.parse::<EntryStatus>().map_err(AuditError::Validation))
            .transpose()?;
        let action = non_empty(self.action)
            .map(|a| ActionFilter::parse(&a))
            .transpose()?;

        Ok(AuditFilter {
            actor_id: non_empty(self.actor),
            action,
            target_type: non_empty(self.target_type),
            target_id: non_empty(self.target_id),
            from: parse_instant("from", self.from)?,
            to: parse_instant("to", self.to)?,
            status,
        })
    }
}

/// `GET /admin/audit`
pub async fn list_entries(
    State(state): State<AppState>,
    principal: AdminPrincipal,
    params: Result<Query<AuditQueryParams>, QueryRejection>,
) -> Result<Json<QueryPage>, AuditError> {
    let Query(mut params) = params?;
    let cursor = non_empty(params.cursor.take());
    let page = state
        .queries
        .page_request(params.page, params.limit, cursor.as_deref())?;
    let filter = params.into_filter()?;

    let result = state.queries.query(&principal, &filter, &page).await?;
    Ok(Json(result))
}

/// `GET /admin/audit/:id`
pub async fn get_entry(
    State(state): State<AppState>,
    principal: AdminPrincipal,
    Path(id): Path<String>,
) -> Result<Json<Value>, AuditError> {
    let entry = state.queries.get_by_id(&principal, &id).await?;
    Ok(Json(json!({ "entry": entry })))
}

/// `POST /admin/audit/:id/retract`
pub async fn retract_entry(
    State(state): State<AppState>,
    principal: AdminPrincipal,
    Path(id): Path<String>,
    request: Result<Json<RetractRequest>, JsonRejection>,
) -> Result<Json<Value>, AuditError> {
    let Json(request) = request?;
    info!("Retraction of {} requested by {}", id, principal.id);
    let record = state
        .retractions
        .retract(&principal, &id, &request.reason)
        .await?;
    Ok(Json(json!({ "retractionRecord": record })))
}
