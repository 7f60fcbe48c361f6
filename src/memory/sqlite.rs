use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::migrate::Migrator;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use tracing::{info, warn};

use super::{MemoryRecord, MemoryStore, TraceRecord};
use crate::config::DatabaseConfig;
use crate::error::{StorageError, StorageResult};
use crate::session::SessionState;

/// Static migrator that embeds migrations at compile time
static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

/// SQLite-backed memory store.
///
/// WAL journaling plus a busy timeout lets appenders from concurrent
/// processes queue on the write lock instead of failing or corrupting
/// earlier entries.
#[derive(Clone)]
pub struct SqliteMemory {
    pool: SqlitePool,
}

impl SqliteMemory {
    /// Open (or create) the memory database at the configured path
    pub async fn new(config: &DatabaseConfig) -> StorageResult<Self> {
        // Ensure parent directory exists
        if let Some(parent) = config.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| StorageError::Connection {
                message: format!("Failed to create database directory: {}", e),
            })?;
        }

        let database_url = format!("sqlite://{}?mode=rwc", config.path.display());

        let options = SqliteConnectOptions::from_str(&database_url)
            .map_err(|e| StorageError::Connection {
                message: format!("Invalid database URL: {}", e),
            })?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .connect_with(options)
            .await
            .map_err(|e| StorageError::Connection {
                message: format!("Failed to connect to database: {}", e),
            })?;

        let storage = Self { pool };
        storage.run_migrations().await?;

        Ok(storage)
    }

    /// Open an isolated in-memory store (tests)
    pub async fn new_in_memory() -> StorageResult<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:").map_err(|e| {
            StorageError::Connection {
                message: format!("Invalid database URL: {}", e),
            }
        })?;

        // A single connection keeps the in-memory database alive and shared.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await
            .map_err(|e| StorageError::Connection {
                message: format!("Failed to connect to database: {}", e),
            })?;

        let storage = Self { pool };
        storage.run_migrations().await?;

        Ok(storage)
    }

    /// Run database migrations using embedded sqlx migrations
    async fn run_migrations(&self) -> StorageResult<()> {
        MIGRATOR
            .run(&self.pool)
            .await
            .map_err(|e| StorageError::Migration {
                message: format!("Failed to run migrations: {}", e),
            })?;

        info!("Memory store migrations completed");
        Ok(())
    }

    /// Get the underlying pool for advanced queries
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[async_trait]
impl MemoryStore for SqliteMemory {
    async fn append_recall(&self, record: &MemoryRecord) -> StorageResult<()> {
        sqlx::query(
            r#"
            INSERT INTO recall_log (created_at, question, answer)
            VALUES (?, ?, ?)
            "#,
        )
        .bind(record.created_at.to_rfc3339())
        .bind(&record.question)
        .bind(&record.answer)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn recall(&self, question: &str, limit: usize) -> StorageResult<Vec<MemoryRecord>> {
        if limit == 0 {
            return Ok(Vec::new());
        }

        let matching: Vec<RecallRow> = sqlx::query_as(
            r#"
            SELECT id, created_at, question, answer
            FROM recall_log
            WHERE question = ?
            ORDER BY id DESC
            LIMIT ?
            "#,
        )
        .bind(question)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        let mut records: Vec<MemoryRecord> = matching.into_iter().map(|r| r.into()).collect();

        // Backfill with the most recent records overall.
        if records.len() < limit {
            let remainder = (limit - records.len()) as i64;
            let seen: Vec<i64> = records.iter().filter_map(|r| r.id).collect();

            let recent: Vec<RecallRow> = sqlx::query_as(
                r#"
                SELECT id, created_at, question, answer
                FROM recall_log
                WHERE question != ?
                ORDER BY id DESC
                LIMIT ?
                "#,
            )
            .bind(question)
            .bind(remainder)
            .fetch_all(&self.pool)
            .await?;

            for row in recent {
                if !seen.contains(&row.id) {
                    records.push(row.into());
                }
            }
        }

        Ok(records)
    }

    async fn append_trace(&self, record: &TraceRecord) -> StorageResult<()> {
        let steps = serde_json::to_string(&record.steps).map_err(|e| StorageError::Query {
            message: format!("Failed to serialize trace steps: {}", e),
        })?;

        sqlx::query(
            r#"
            INSERT INTO trace_log (created_at, question, outcome, steps)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(record.created_at.to_rfc3339())
        .bind(&record.question)
        .bind(record.outcome.to_string())
        .bind(&steps)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn recent_traces(&self, limit: usize) -> StorageResult<Vec<TraceRecord>> {
        let rows: Vec<TraceRow> = sqlx::query_as(
            r#"
            SELECT id, created_at, question, outcome, steps
            FROM trace_log
            ORDER BY id DESC
            LIMIT ?
            "#,
        )
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        // A malformed record is skipped, not fatal: the rest of the log is
        // still usable.
        let mut records = Vec::with_capacity(rows.len());
        for row in rows {
            match row.try_into() {
                Ok(record) => records.push(record),
                Err(message) => {
                    warn!(%message, "Skipping malformed trace record");
                }
            }
        }

        Ok(records)
    }
}

// Internal row types for SQLx mapping
#[derive(sqlx::FromRow)]
struct RecallRow {
    id: i64,
    created_at: String,
    question: String,
    answer: String,
}

impl From<RecallRow> for MemoryRecord {
    fn from(row: RecallRow) -> Self {
        MemoryRecord {
            id: Some(row.id),
            created_at: parse_timestamp(&row.created_at),
            question: row.question,
            answer: row.answer,
        }
    }
}

#[derive(sqlx::FromRow)]
struct TraceRow {
    id: i64,
    created_at: String,
    question: String,
    outcome: String,
    steps: String,
}

impl TryFrom<TraceRow> for TraceRecord {
    type Error = String;

    fn try_from(row: TraceRow) -> Result<Self, Self::Error> {
        let steps = serde_json::from_str(&row.steps)
            .map_err(|e| format!("trace {} has malformed steps: {}", row.id, e))?;
        let outcome = row
            .outcome
            .parse::<SessionState>()
            .map_err(|e| format!("trace {}: {}", row.id, e))?;

        Ok(TraceRecord {
            id: Some(row.id),
            created_at: parse_timestamp(&row.created_at),
            question: row.question,
            outcome,
            steps,
        })
    }
}

fn parse_timestamp(raw: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}
