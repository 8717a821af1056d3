//! HTTP surface
//!
//! Admin routes for reviewing and retracting audit entries, plus health
//! and status endpoints.

pub mod audit;

use axum::{
    extract::{FromRef, State},
    response::Json,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

use crate::audit::{AlertSink, LogWriter, MonotonicClock, QueryEngine, RetractionProcessor, RetryPolicy};
use crate::authorization::AccessGate;
use crate::config::AppConfig;
use crate::database::Database;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub gate: AccessGate,
    pub writer: LogWriter,
    pub queries: QueryEngine,
    pub retractions: RetractionProcessor,
}

impl AppState {
    /// Wire every component over one store and one clock
    pub fn new(config: AppConfig, database: Database, alerts: AlertSink) -> Self {
        let clock = Arc::new(MonotonicClock::new());
        let writer = LogWriter::new(
            database.clone(),
            clock.clone(),
            RetryPolicy::from_config(&config.writer),
            alerts,
        );

        Self {
            gate: AccessGate::new(&config.auth),
            queries: QueryEngine::new(database.clone(), config.query.clone()),
            retractions: RetractionProcessor::new(database, clock),
            writer,
            config: Arc::new(config),
        }
    }
}

impl FromRef<AppState> for AccessGate {
    fn from_ref(state: &AppState) -> Self {
        state.gate.clone()
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/status", get(status_endpoint))
        .route("/admin/audit", get(audit::list_entries))
        .route("/admin/audit/:id", get(audit::get_entry))
        .route("/admin/audit/:id/retract", post(audit::retract_entry))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .into_inner(),
        )
        .with_state(state)
}

async fn health_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "audit-trail",
        "timestamp": chrono::Utc::now()
    }))
}

async fn status_endpoint(State(state): State<AppState>) -> Json<serde_json::Value> {
    let pending = state.writer.pending_count().await;

    Json(serde_json::json!({
        "status": if pending == 0 { "healthy" } else { "degraded" },
        "service": state.config.service_name,
        "timestamp": chrono::Utc::now(),
        "writer": {
            "pendingRedelivery": pending
        },
        "query": {
            "maxPageSize": state.config.query.max_page_size
        }
    }))
}
