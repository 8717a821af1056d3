pub mod models;
pub mod queries;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::future::Future;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info};

use crate::audit::entry::AuditEntry;
use crate::audit::query::{AuditFilter, Cursor};
use crate::config::DatabaseConfig;
use crate::error::AuditError;
use queries::Queries;

/// Durable append-only entry store.
///
/// Every call is bounded by `store_timeout`; expiry surfaces as a retryable
/// `PersistenceUnavailable`.
#[derive(Clone)]
pub struct Database {
    pub pool: SqlitePool,
    store_timeout: Duration,
}

impl Database {
    pub async fn new(config: &DatabaseConfig, store_timeout: Duration) -> Result<Self, AuditError> {
        let options = SqliteConnectOptions::from_str(&config.url)
            .map_err(|e| AuditError::Config(format!("Invalid database url: {}", e)))?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_millis(config.busy_timeout_ms));

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(store_timeout)
            .connect_with(options)
            .await?;

        info!("Connected to audit store at {}", config.url);
        Ok(Self {
            pool,
            store_timeout,
        })
    }

    /// Single-connection in-memory store for tests and tooling
    pub async fn new_in_memory() -> Result<Self, AuditError> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")
            .map_err(|e| AuditError::Config(format!("Invalid database url: {}", e)))?;

        // The database lives only as long as its one connection
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;

        let database = Self {
            pool,
            store_timeout: Duration::from_secs(5),
        };
        database.run_migrations().await?;
        Ok(database)
    }

    pub fn with_store_timeout(mut self, store_timeout: Duration) -> Self {
        self.store_timeout = store_timeout;
        self
    }

    pub async fn run_migrations(&self) -> Result<(), AuditError> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| AuditError::Database(format!("Migration failed: {}", e)))?;
        Ok(())
    }

    /// Run a store operation under the configured timeout
    async fn bounded<T, F>(&self, operation: &str, fut: F) -> Result<T, AuditError>
    where
        F: Future<Output = Result<T, AuditError>>,
    {
        match tokio::time::timeout(self.store_timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(AuditError::timed_out(operation)),
        }
    }

    /// Persist a new entry. Returns false if the id was already stored.
    pub async fn insert_entry(&self, entry: &AuditEntry) -> Result<bool, AuditError> {
        self.bounded("insert", async {
            let mut conn = self.pool.acquire().await?;
            let inserted = Queries::insert_entry(&mut conn, entry).await?;
            debug!("Stored audit entry: {}", entry.summary());
            Ok::<_, AuditError>(inserted)
        })
        .await
    }

    pub async fn get_entry(&self, id: &str) -> Result<Option<AuditEntry>, AuditError> {
        self.bounded("lookup", async {
            let mut conn = self.pool.acquire().await?;
            Queries::get_entry(&mut conn, id)
                .await?
                .map(AuditEntry::try_from)
                .transpose()
        })
        .await
    }

    /// Flip `entry_id` to retracted and store `record` in one transaction.
    ///
    /// Nothing is written unless both succeed. When the flip matches no row
    /// the entry is inspected to report NotFound or Conflict.
    pub async fn commit_retraction(
        &self,
        entry_id: &str,
        record: &AuditEntry,
    ) -> Result<(), AuditError> {
        self.bounded("retraction", async {
            let mut tx = self.pool.begin().await?;

            // Write first so the transaction takes the write lock up front
            let flipped = Queries::mark_retracted(&mut tx, entry_id, &record.id).await?;
            if flipped == 0 {
                let existing = Queries::get_entry(&mut tx, entry_id).await?;
                tx.rollback().await?;
                return Err(match existing {
                    None => AuditError::NotFound(entry_id.to_string()),
                    Some(row) if row.action == crate::audit::action::RETRACTION_TAG => {
                        AuditError::retraction_not_retractable(entry_id)
                    }
                    Some(_) => AuditError::already_retracted(entry_id),
                });
            }

            if !Queries::insert_entry(&mut tx, record).await? {
                tx.rollback().await?;
                return Err(AuditError::Conflict(format!(
                    "Retraction record id {} already exists",
                    record.id
                )));
            }

            tx.commit().await?;
            Ok::<_, AuditError>(())
        })
        .await
    }

    /// Entries matching `filter`, newest first, plus the filtered total
    pub async fn find_entries(
        &self,
        filter: &AuditFilter,
        after: Option<&Cursor>,
        offset: u64,
        limit: u32,
    ) -> Result<(Vec<AuditEntry>, u64), AuditError> {
        self.bounded("query", async {
            let rows = Queries::find_entries(&self.pool, filter, after, offset, limit).await?;
            let total = Queries::count_entries(&self.pool, filter).await?;
            let entries = rows
                .into_iter()
                .map(AuditEntry::try_from)
                .collect::<Result<Vec<_>, _>>()?;
            Ok::<_, AuditError>((entries, total.max(0) as u64))
        })
        .await
    }

    /// Every stored entry, oldest first
    pub async fn all_entries(&self) -> Result<Vec<AuditEntry>, AuditError> {
        self.bounded("scan", async {
            Queries::all_entries(&self.pool)
                .await?
                .into_iter()
                .map(AuditEntry::try_from)
                .collect::<Result<Vec<_>, AuditError>>()
        })
        .await
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}
