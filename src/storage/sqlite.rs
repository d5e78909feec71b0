//! SQLite ping store.
//!
//! One table of raw samples, WAL journaling for concurrent reads during the
//! per-cycle writes, and an idempotent schema created at startup. Suitable
//! for the tens-of-servers deployments this tracker targets.

use std::path::Path;

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Pool, Row, Sqlite};
use tracing::{debug, info, instrument};

use super::backend::{PingStore, SampleRow};
use super::error::{StorageError, StorageResult};

pub struct SqlitePingStore {
    pool: Pool<Sqlite>,
}

impl SqlitePingStore {
    /// Open (and create if missing) the database at `db_path` and ensure the
    /// schema exists.
    #[instrument(skip_all)]
    pub async fn new(db_path: impl AsRef<Path>) -> StorageResult<Self> {
        let db_path_str = db_path.as_ref().to_string_lossy().to_string();

        info!("initializing SQLite ping store at: {}", db_path_str);

        let options = SqliteConnectOptions::new()
            .filename(&db_path_str)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .busy_timeout(std::time::Duration::from_secs(30));

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .map_err(|e| StorageError::ConnectionFailed(e.to_string()))?;

        let store = Self { pool };
        store.ensure_schema().await?;

        info!("SQLite ping store ready");

        Ok(store)
    }

    /// Idempotent schema setup. The timestamp column is nullable on purpose:
    /// freestanding record rows without a known timestamp are legal.
    async fn ensure_schema(&self) -> StorageResult<()> {
        debug!("ensuring pings table and indexes");

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS pings \
             (timestamp BIGINT, server TINYTEXT NOT NULL, player_count MEDIUMINT)",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS pings_server_index ON pings (server, player_count)")
            .execute(&self.pool)
            .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS pings_timestamp_index ON pings (timestamp)")
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}

#[async_trait]
impl PingStore for SqlitePingStore {
    #[instrument(skip(self))]
    async fn record_sample(
        &self,
        server_key: &str,
        timestamp: i64,
        player_count: Option<u32>,
    ) -> StorageResult<()> {
        sqlx::query("INSERT INTO pings (timestamp, server, player_count) VALUES (?, ?, ?)")
            .bind(timestamp)
            .bind(server_key)
            .bind(player_count.map(|v| v as i64))
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    #[instrument(skip(self))]
    async fn load_samples(&self, start: i64, end: i64) -> StorageResult<Vec<SampleRow>> {
        let rows = sqlx::query(
            "SELECT timestamp, server, player_count FROM pings \
             WHERE timestamp >= ? AND timestamp <= ? ORDER BY timestamp ASC",
        )
        .bind(start)
        .bind(end)
        .fetch_all(&self.pool)
        .await?;

        debug!("loaded {} sample rows", rows.len());

        rows.into_iter()
            .map(|row| {
                Ok(SampleRow {
                    timestamp: row.try_get::<i64, _>("timestamp")?,
                    server_key: row.try_get::<String, _>("server")?,
                    player_count: row
                        .try_get::<Option<i64>, _>("player_count")?
                        .map(|v| v.max(0) as u32),
                })
            })
            .collect()
    }

    #[instrument(skip(self))]
    async fn load_record(&self, server_key: &str) -> StorageResult<Option<(u32, Option<i64>)>> {
        let row = sqlx::query(
            "SELECT player_count, timestamp FROM pings \
             WHERE server = ? AND player_count IS NOT NULL \
             ORDER BY player_count DESC LIMIT 1",
        )
        .bind(server_key)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => {
                let player_count = row.try_get::<i64, _>("player_count")?.max(0) as u32;
                let timestamp = row.try_get::<Option<i64>, _>("timestamp")?;
                Ok(Some((player_count, timestamp)))
            }
            None => Ok(None),
        }
    }

    async fn close(&self) -> StorageResult<()> {
        self.pool.close().await;
        Ok(())
    }
}
