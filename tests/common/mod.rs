//! Shared helpers for audit trail integration tests
#![allow(dead_code)]

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use chrono::Duration;
use serde_json::Value;
use std::path::Path;
use tower::ServiceExt;

use audit_trail::api::{self, AppState};
use audit_trail::audit::{Actor, AlertSink, AppendOutcome, AuditAction, AuditEntry, Target};
use audit_trail::authorization::{AccessGate, AdminPrincipal};
use audit_trail::config::{AppConfig, DatabaseConfig};
use audit_trail::database::Database;

pub const TEST_SECRET: &str = "integration-test-secret-0123456789abcdef";

/// Service configuration with a usable secret and fast retries
pub fn test_config() -> AppConfig {
    let mut config = AppConfig::default();
    config.auth.jwt_secret = TEST_SECRET.to_string();
    config.writer.max_attempts = 2;
    config.writer.base_delay_ms = 5;
    config.writer.max_delay_ms = 20;
    config.query.default_page_size = 10;
    config.query.max_page_size = 50;
    config
}

/// Setup an in-memory SQLite database for testing
pub async fn setup_test_db() -> Database {
    Database::new_in_memory()
        .await
        .expect("Failed to create test database")
}

/// File-backed database with several connections and migrations applied
pub async fn setup_file_db(dir: &Path, busy_timeout_ms: u64) -> Database {
    let config = DatabaseConfig {
        url: format!("sqlite://{}", dir.join("audit.db").display()),
        max_connections: 4,
        busy_timeout_ms,
    };
    let database = Database::new(&config, std::time::Duration::from_secs(5))
        .await
        .expect("Failed to open file database");
    database
        .run_migrations()
        .await
        .expect("Failed to run migrations");
    database
}

pub fn test_state(database: Database) -> AppState {
    AppState::new(test_config(), database, AlertSink::default())
}

pub fn test_app(state: &AppState) -> Router {
    api::router(state.clone())
}

pub fn admin() -> AdminPrincipal {
    AdminPrincipal::new("admin-1", "Ada Admin", "admin")
}

/// Signed credential for `principal` under the test secret
pub fn token_for(principal: &AdminPrincipal) -> String {
    AccessGate::new(&test_config().auth)
        .issue_token(principal, Duration::minutes(10))
        .expect("Failed to issue token")
}

pub fn admin_token() -> String {
    token_for(&admin())
}

pub fn staff() -> Actor {
    Actor::new("staff-7", "Sam Staff").with_role("instructor")
}

pub fn course_target(id: &str) -> Option<Target> {
    Some(Target::new("course", id))
}

/// Append through the writer and return the stored entry
pub async fn record(state: &AppState, actor: Actor, action: AuditAction, target: Option<Target>) -> AuditEntry {
    match state
        .writer
        .append(actor, action, target)
        .await
        .expect("Failed to append audit entry")
    {
        AppendOutcome::Persisted(entry) => entry,
        AppendOutcome::Queued(entry) => panic!("Audit entry {} was queued, not stored", entry.id),
    }
}

/// Hold the store's write lock from a separate pooled connection
pub async fn lock_store(database: &Database) -> sqlx::pool::PoolConnection<sqlx::Sqlite> {
    let mut blocker = database.pool.acquire().await.expect("Failed to acquire connection");
    sqlx::query("BEGIN EXCLUSIVE")
        .execute(&mut *blocker)
        .await
        .expect("Failed to take write lock");
    blocker
}

pub async fn unlock_store(mut blocker: sqlx::pool::PoolConnection<sqlx::Sqlite>) {
    sqlx::query("ROLLBACK")
        .execute(&mut *blocker)
        .await
        .expect("Failed to release write lock");
}

pub async fn get(app: &Router, uri: &str, token: Option<&str>) -> (StatusCode, Value) {
    let mut request = Request::builder().method("GET").uri(uri);
    if let Some(token) = token {
        request = request.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    send(app, request.body(Body::empty()).expect("Failed to build request")).await
}

pub async fn post_json(app: &Router, uri: &str, token: Option<&str>, body: Value) -> (StatusCode, Value) {
    let mut request = Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = token {
        request = request.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    send(
        app,
        request
            .body(Body::from(body.to_string()))
            .expect("Failed to build request"),
    )
    .await
}

pub async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app
        .clone()
        .oneshot(request)
        .await
        .expect("Router failed");
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("Failed to read body");
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}
