use sqlx::{QueryBuilder, Sqlite, SqliteConnection, SqlitePool};

use crate::audit::entry::AuditEntry;
use crate::audit::query::{ActionFilter, AuditFilter, Cursor};
use crate::database::models::AuditEntryRow;

const ENTRY_COLUMNS: &str = "id, ts_micros, actor, action, metadata, target_type, target_id, \
                             status, retraction_ref, content_hash";

pub struct Queries;

impl Queries {
    /// Insert an entry. Returns false when a row with the same id already
    /// exists, which makes redelivery of a queued entry idempotent.
    pub async fn insert_entry(
        conn: &mut SqliteConnection,
        entry: &AuditEntry,
    ) -> Result<bool, sqlx::Error> {
        let actor = serde_json::to_string(&entry.actor)
            .map_err(|e| sqlx::Error::Encode(Box::new(e)))?;
        let retracted_entry_id = entry
            .retraction_details()
            .map(|d| d.retracted_entry_id.clone());

        let result = sqlx::query(
            r#"
            INSERT INTO audit_entries
            (id, ts_micros, actor_id, actor, action, metadata, target_type, target_id,
             status, retraction_ref, retracted_entry_id, content_hash)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO NOTHING
            "#,
        )
        .bind(&entry.id)
        .bind(entry.timestamp.timestamp_micros())
        .bind(&entry.actor.id)
        .bind(actor)
        .bind(entry.action.tag())
        .bind(entry.action.metadata().to_string())
        .bind(&entry.target_type)
        .bind(&entry.target_id)
        .bind(entry.status.as_str())
        .bind(&entry.retraction_ref)
        .bind(retracted_entry_id)
        .bind(&entry.content_hash)
        .execute(conn)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    pub async fn get_entry(
        conn: &mut SqliteConnection,
        id: &str,
    ) -> Result<Option<AuditEntryRow>, sqlx::Error> {
        sqlx::query_as::<_, AuditEntryRow>(&format!(
            "SELECT {} FROM audit_entries WHERE id = ?",
            ENTRY_COLUMNS
        ))
        .bind(id)
        .fetch_optional(conn)
        .await
    }

    /// Compare-and-swap the status of an active, non-retraction entry.
    /// Returns the number of rows flipped (0 or 1).
    pub async fn mark_retracted(
        conn: &mut SqliteConnection,
        id: &str,
        retraction_ref: &str,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE audit_entries
            SET status = 'retracted', retraction_ref = ?
            WHERE id = ? AND status = 'active' AND action <> 'audit.retracted'
            "#,
        )
        .bind(retraction_ref)
        .bind(id)
        .execute(conn)
        .await?;

        Ok(result.rows_affected())
    }

    pub async fn count_entries(
        pool: &SqlitePool,
        filter: &AuditFilter,
    ) -> Result<i64, sqlx::Error> {
        let mut builder = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM audit_entries");
        push_filters(&mut builder, filter, None);
        builder.build_query_scalar::<i64>().fetch_one(pool).await
    }

    /// Fetch entries in canonical order (newest first, ties by id).
    pub async fn find_entries(
        pool: &SqlitePool,
        filter: &AuditFilter,
        after: Option<&Cursor>,
        offset: u64,
        limit: u32,
    ) -> Result<Vec<AuditEntryRow>, sqlx::Error> {
        let mut builder =
            QueryBuilder::<Sqlite>::new(format!("SELECT {} FROM audit_entries", ENTRY_COLUMNS));
        push_filters(&mut builder, filter, after);
        builder.push(" ORDER BY ts_micros DESC, id DESC LIMIT ");
        builder.push_bind(i64::from(limit));
        builder.push(" OFFSET ");
        builder.push_bind(offset as i64);

        builder.build_query_as::<AuditEntryRow>().fetch_all(pool).await
    }

    /// Every entry, oldest first
    pub async fn all_entries(pool: &SqlitePool) -> Result<Vec<AuditEntryRow>, sqlx::Error> {
        sqlx::query_as::<_, AuditEntryRow>(&format!(
            "SELECT {} FROM audit_entries ORDER BY ts_micros ASC, id ASC",
            ENTRY_COLUMNS
        ))
        .fetch_all(pool)
        .await
    }
}

fn push_filters(
    builder: &mut QueryBuilder<'_, Sqlite>,
    filter: &AuditFilter,
    after: Option<&Cursor>,
) {
    builder.push(" WHERE 1 = 1");

    if let Some(actor_id) = &filter.actor_id {
        builder.push(" AND actor_id = ").push_bind(actor_id.clone());
    }

    match &filter.action {
        Some(ActionFilter::Exact(tag)) => {
            builder.push(" AND action = ").push_bind(tag.clone());
        }
        Some(ActionFilter::Prefix(prefix)) => {
            builder
                .push(" AND substr(action, 1, ")
                .push_bind(prefix.chars().count() as i64)
                .push(") = ")
                .push_bind(prefix.clone());
        }
        None => {}
    }

    if let Some(target_type) = &filter.target_type {
        builder.push(" AND target_type = ").push_bind(target_type.clone());
    }

    if let Some(target_id) = &filter.target_id {
        builder.push(" AND target_id = ").push_bind(target_id.clone());
    }

    if let Some(from) = filter.from {
        builder.push(" AND ts_micros >= ").push_bind(from.timestamp_micros());
    }

    if let Some(to) = filter.to {
        builder.push(" AND ts_micros < ").push_bind(to.timestamp_micros());
    }

    if let Some(status) = filter.status {
        builder.push(" AND status = ").push_bind(status.as_str().to_string());
    }

    if let Some(cursor) = after {
        builder
            .push(" AND (ts_micros < ")
            .push_bind(cursor.ts_micros)
            .push(" OR (ts_micros = ")
            .push_bind(cursor.ts_micros)
            .push(" AND id < ")
            .push_bind(cursor.id.clone())
            .push("))");
    }
}
