use anyhow::{Context, Result};
use sqlx::Row;
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteSynchronous,
};
use std::str::FromStr;
use tracing::info;

use crate::config::DataDirs;

#[derive(Clone)]
pub struct Database {
    pub pool: SqlitePool,
}

impl Database {
    pub async fn new(dirs: &DataDirs) -> Result<Self> {
        info!("Connecting to database: {}", dirs.db_path.display());

        let options = SqliteConnectOptions::from_str(&dirs.db_url())
            .with_context(|| format!("Invalid database url: {}", dirs.db_url()))?
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Full);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .min_connections(1)
            .connect_with(options)
            .await
            .with_context(|| format!("Failed to connect to database: {}", dirs.db_url()))?;

        info!("Running database migrations...");
        self::run_migrations(&pool).await?;

        info!("Database initialized successfully");

        Ok(Self { pool })
    }

    pub async fn get_stats(&self) -> Result<DbStats> {
        let row = sqlx::query(
            r#"
            SELECT
                (SELECT COUNT(*) FROM content_records) as record_count,
                (SELECT COUNT(DISTINCT owner_id) FROM content_records) as owner_count,
                (SELECT page_count * page_size FROM pragma_page_count(), pragma_page_size()) as db_size
            "#,
        )
        .fetch_one(&self.pool)
        .await?;

        Ok(DbStats {
            records: row.try_get::<i64, _>("record_count").unwrap_or(0) as u64,
            owners: row.try_get::<i64, _>("owner_count").unwrap_or(0) as u64,
            database_size_bytes: row.try_get::<i64, _>("db_size").unwrap_or(0) as u64,
        })
    }

    pub async fn ping(&self) -> bool {
        sqlx::query("SELECT 1").execute(&self.pool).await.is_ok()
    }
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct DbStats {
    pub records: u64,
    pub owners: u64,
    pub database_size_bytes: u64,
}

/// Current schema version - increment when adding migrations
const SCHEMA_VERSION: i64 = 1;

pub(crate) async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at INTEGER NOT NULL DEFAULT (strftime('%s', 'now')),
            description TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;

    let current_version: i64 =
        sqlx::query_scalar("SELECT COALESCE(MAX(version), 0) FROM schema_version")
            .fetch_one(pool)
            .await
            .unwrap_or(0);

    if current_version > SCHEMA_VERSION {
        anyhow::bail!(
            "Database schema version {} is newer than supported version {}. Please upgrade the application.",
            current_version,
            SCHEMA_VERSION
        );
    }

    if current_version == SCHEMA_VERSION {
        info!(
            "Database schema is up to date (version {})",
            current_version
        );
        return Ok(());
    }

    info!(
        "Migrating database from version {} to {}",
        current_version, SCHEMA_VERSION
    );

    // AUTOINCREMENT: ids are never reused after a delete
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS content_records (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            owner_id INTEGER NOT NULL,
            body TEXT NOT NULL,
            created_at INTEGER NOT NULL,
            source_chat_id INTEGER,
            source_message_id INTEGER,
            origin_chat_id INTEGER,
            origin_message_id INTEGER
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_content_owner ON content_records(owner_id, id)",
    )
    .execute(pool)
    .await?;

    // NULL origins never collide, so records without an origin are unrestricted
    sqlx::query(
        "CREATE UNIQUE INDEX IF NOT EXISTS idx_content_origin ON content_records(origin_chat_id, origin_message_id)",
    )
    .execute(pool)
    .await?;

    sqlx::query("INSERT OR IGNORE INTO schema_version (version, description) VALUES (?, ?)")
        .bind(SCHEMA_VERSION)
        .bind("content records")
        .execute(pool)
        .await?;

    info!("Database migrations completed");
    Ok(())
}
