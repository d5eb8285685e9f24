use std::path::Path;

use async_trait::async_trait;
use irrigo_core::{ActivityEntry, ActivityRecord};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqliteSynchronous};
use sqlx::{Row, SqlitePool};
use thiserror::Error;

use super::{ActivityLog, IdSource};

#[derive(Debug, Error)]
pub enum SqliteLogError {
    #[error("sqlx error: {0}")]
    Sqlx(#[from] sqlx::Error),
    #[error("serde json error: {0}")]
    SerdeJson(#[from] serde_json::Error),
    #[error("migration error: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),
    #[error("timestamp {0} cannot be stored")]
    Timestamp(jiff::Timestamp),
    #[error("internal error: {0}")]
    Internal(String),
}

/// Activity log persisted to a SQLite database.
///
/// Entries are stored as JSON next to the columns used for ordering.
#[derive(Clone)]
pub struct SqliteActivityLog {
    pool: SqlitePool,
    ids: IdSource,
}

impl SqliteActivityLog {
    /// Opens (creating if needed) the database at `path` and applies migrations.
    pub async fn new<P: AsRef<Path>>(path: P) -> Result<Self, SqliteLogError> {
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal);
        let pool = SqlitePool::connect_with(options).await?;

        Self::from_pool(pool).await
    }

    pub async fn from_pool(pool: SqlitePool) -> Result<Self, SqliteLogError> {
        sqlx::migrate!("./migrations").run(&pool).await?;
        Ok(Self {
            pool,
            ids: IdSource::default(),
        })
    }
}

#[async_trait]
impl ActivityLog for SqliteActivityLog {
    type Error = SqliteLogError;

    async fn append(&self, record: ActivityRecord) -> Result<ActivityEntry, Self::Error> {
        let id = self.ids.next().map_err(SqliteLogError::Internal)?;
        let entry = record.stamp(id, jiff::Timestamp::now());

        let timestamp_ns = i64::try_from(entry.timestamp.as_nanosecond())
            .map_err(|_| SqliteLogError::Timestamp(entry.timestamp))?;
        let json = serde_json::to_string(&entry)?;

        sqlx::query("INSERT INTO activity (id, timestamp_ns, entry_json) VALUES (?, ?, ?)")
            .bind(entry.id.0.to_string())
            .bind(timestamp_ns)
            .bind(&json)
            .execute(&self.pool)
            .await?;

        Ok(entry)
    }

    async fn recent(&self, limit: usize) -> Result<Vec<ActivityEntry>, Self::Error> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let rows = sqlx::query(
            "SELECT entry_json FROM activity ORDER BY timestamp_ns DESC, id DESC LIMIT ?",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        let mut entries = Vec::with_capacity(rows.len());
        for row in rows {
            let json: String = row.try_get("entry_json")?;
            entries.push(serde_json::from_str(&json)?);
        }

        Ok(entries)
    }

    async fn count(&self) -> Result<usize, Self::Error> {
        let row = sqlx::query("SELECT COUNT(*) AS total FROM activity")
            .fetch_one(&self.pool)
            .await?;
        let total: i64 = row.try_get("total")?;
        Ok(usize::try_from(total).unwrap_or_default())
    }
}
