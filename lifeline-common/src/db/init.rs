//! Database initialization
//!
//! Creates the database on first run and brings the schema up to date. Table
//! creation is idempotent, so opening an existing database is the same call.

use crate::Result;
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};
use std::path::Path;
use tracing::info;

/// Default SQLite busy timeout in milliseconds
const BUSY_TIMEOUT_MS: i64 = 5000;

/// Initialize database connection and create tables if needed
pub async fn init_database(db_path: &Path) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    // Create parent directory if it doesn't exist
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
    let pool = SqlitePoolOptions::new()
        .max_connections(10)
        .connect(&db_url)
        .await?;

    if newly_created {
        info!("Initialized new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }

    // WAL lets the dashboard read while ingest writes
    sqlx::query("PRAGMA journal_mode = WAL")
        .execute(&pool)
        .await?;

    let pragma_sql = format!("PRAGMA busy_timeout = {}", BUSY_TIMEOUT_MS);
    sqlx::query(&pragma_sql).execute(&pool).await?;

    prepare_schema(&pool).await?;

    Ok(pool)
}

/// Open a private in-memory database with the full schema
///
/// The pool is capped at one connection: every SQLite in-memory connection is
/// its own database.
pub async fn init_in_memory() -> Result<SqlitePool> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await?;

    prepare_schema(&pool).await?;

    Ok(pool)
}

async fn prepare_schema(pool: &SqlitePool) -> Result<()> {
    // Calls are not tied to callers with a foreign key: the backend does not
    // guarantee the caller row is written first.
    sqlx::query("PRAGMA foreign_keys = OFF").execute(pool).await?;

    create_schema_version_table(pool).await?;
    create_callers_table(pool).await?;
    create_calls_table(pool).await?;

    crate::db::migrations::run_migrations(pool).await?;

    Ok(())
}

async fn create_schema_version_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_callers_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS callers (
            phone_number TEXT PRIMARY KEY,
            name TEXT,
            previous_history TEXT,
            sexual_orientation TEXT,
            last_call_ms INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_calls_table(pool: &SqlitePool) -> Result<()> {
    // emotions, sentiment and flags hold JSON documents
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS calls (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            phone_number TEXT NOT NULL,
            call_time_ms INTEGER NOT NULL,
            duration_secs INTEGER,
            source TEXT,
            urgency TEXT,
            transcript TEXT,
            summary TEXT,
            emotions TEXT,
            sentiment TEXT,
            flags TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}
