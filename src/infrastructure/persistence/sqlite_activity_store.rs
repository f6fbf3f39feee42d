//! SQLite-backed `ActivityStore`.
//!
//! Connection pool configuration (WAL journal mode, foreign keys,
//! bounded pool) follows this codebase's standard `sqlx` setup. Reads
//! only ever project the columns the current `schema_version` understands,
//! so a future column added by a newer binary is silently ignored by an
//! older one rather than causing a read failure.

use crate::domain::model::{ActivityRecord, Key};
use crate::domain::ports::activity_store::ActivityStore;
use crate::domain::{DatabaseError, Domain};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::SqlitePool;
use std::str::FromStr;
use std::time::Duration;

pub struct SqliteActivityStore {
    pool: SqlitePool,
}

const CURRENT_SCHEMA_VERSION: i64 = 1;

impl SqliteActivityStore {
    pub async fn connect(database_url: &str) -> Result<Self, DatabaseError> {
        let options = SqliteConnectOptions::from_str(database_url)
            .map_err(|e| DatabaseError::ConnectionPoolError(e.to_string()))?
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .foreign_keys(true)
            .busy_timeout(Duration::from_secs(5))
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .min_connections(1)
            .max_connections(5)
            .idle_timeout(Duration::from_secs(30))
            .acquire_timeout(Duration::from_secs(10))
            .connect_with(options)
            .await?;

        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    async fn migrate(&self) -> Result<(), DatabaseError> {
        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS activity_records (
                schema_version INTEGER NOT NULL DEFAULT 1,
                domain TEXT NOT NULL,
                key TEXT NOT NULL,
                paused INTEGER NOT NULL DEFAULT 0,
                draining INTEGER NOT NULL DEFAULT 0,
                note TEXT,
                updated_at TEXT NOT NULL,
                PRIMARY KEY (domain, key)
            )
            ",
        )
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[derive(sqlx::FromRow)]
struct Row {
    domain: String,
    key: String,
    paused: i64,
    draining: i64,
    note: Option<String>,
    updated_at: String,
}

fn row_to_record(row: Row) -> Result<ActivityRecord, DatabaseError> {
    let domain = Domain::from_str(&row.domain).map_err(DatabaseError::ConnectionPoolError)?;
    let updated_at = DateTime::parse_from_rfc3339(&row.updated_at)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| DatabaseError::ConnectionPoolError(e.to_string()))?;
    Ok(ActivityRecord {
        key: Key::new(domain, row.key),
        paused: row.paused != 0,
        draining: row.draining != 0,
        note: row.note,
        updated_at,
    })
}

#[async_trait]
impl ActivityStore for SqliteActivityStore {
    async fn load(&self, key: &Key) -> Result<Option<ActivityRecord>, DatabaseError> {
        let row = sqlx::query_as::<_, Row>(
            "SELECT domain, key, paused, draining, note, updated_at FROM activity_records WHERE domain = ? AND key = ?",
        )
        .bind(key.domain.as_str())
        .bind(&key.name)
        .fetch_optional(&self.pool)
        .await?;

        row.map(row_to_record).transpose()
    }

    async fn load_all(&self) -> Result<Vec<ActivityRecord>, DatabaseError> {
        let rows = sqlx::query_as::<_, Row>("SELECT domain, key, paused, draining, note, updated_at FROM activity_records")
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(row_to_record).collect()
    }

    async fn save(&self, record: &ActivityRecord) -> Result<(), DatabaseError> {
        sqlx::query(
            r"
            INSERT INTO activity_records (schema_version, domain, key, paused, draining, note, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(domain, key) DO UPDATE SET
                paused = excluded.paused,
                draining = excluded.draining,
                note = excluded.note,
                updated_at = excluded.updated_at
            ",
        )
        .bind(CURRENT_SCHEMA_VERSION)
        .bind(record.key.domain.as_str())
        .bind(&record.key.name)
        .bind(record.paused)
        .bind(record.draining)
        .bind(&record.note)
        .bind(record.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn delete(&self, key: &Key) -> Result<(), DatabaseError> {
        sqlx::query("DELETE FROM activity_records WHERE domain = ? AND key = ?")
            .bind(key.domain.as_str())
            .bind(&key.name)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
