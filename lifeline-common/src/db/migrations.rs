//! Database schema migrations
//!
//! Versioned, idempotent migrations tracked in the `schema_version` table.
//!
//! # Migration Guidelines
//!
//! 1. **Never modify existing migrations** - databases in the field already ran them
//! 2. **Always add new migrations** - one function per schema change
//! 3. **Check before altering** - every migration must be safe to run twice

use crate::Result;
use sqlx::SqlitePool;
use tracing::{info, warn};

/// Current schema version
///
/// **IMPORTANT:** Increment this when adding new migrations
const CURRENT_SCHEMA_VERSION: i32 = 2;

/// Get current schema version from database
///
/// Returns 0 if schema_version table doesn't exist or has no rows
pub async fn get_schema_version(pool: &SqlitePool) -> Result<i32> {
    let table_exists: bool = sqlx::query_scalar(
        r#"
        SELECT EXISTS(
            SELECT 1 FROM sqlite_master
            WHERE type='table' AND name='schema_version'
        )
        "#,
    )
    .fetch_one(pool)
    .await?;

    if !table_exists {
        return Ok(0);
    }

    let version: Option<i32> =
        sqlx::query_scalar("SELECT version FROM schema_version ORDER BY version DESC LIMIT 1")
            .fetch_optional(pool)
            .await?;

    Ok(version.unwrap_or(0))
}

async fn set_schema_version(pool: &SqlitePool, version: i32) -> Result<()> {
    sqlx::query("INSERT INTO schema_version (version) VALUES (?)")
        .bind(version)
        .execute(pool)
        .await?;

    Ok(())
}

/// Run all pending migrations
pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    let current_version = get_schema_version(pool).await?;

    if current_version == CURRENT_SCHEMA_VERSION {
        info!("Database schema is up to date (v{})", current_version);
        return Ok(());
    }

    if current_version > CURRENT_SCHEMA_VERSION {
        warn!(
            "Database schema version ({}) is newer than code version ({})",
            current_version, CURRENT_SCHEMA_VERSION
        );
        return Ok(());
    }

    info!(
        "Running database migrations: v{} -> v{}",
        current_version, CURRENT_SCHEMA_VERSION
    );

    if current_version < 1 {
        migrate_v1(pool).await?;
        set_schema_version(pool, 1).await?;
        info!("✓ Migration v1 completed");
    }

    if current_version < 2 {
        migrate_v2(pool).await?;
        set_schema_version(pool, 2).await?;
        info!("✓ Migration v2 completed");
    }

    Ok(())
}

/// Migration v1: index calls by caller and time
///
/// Both the per-caller history query and the most-recent-call lookup filter
/// on phone number and order by call time.
async fn migrate_v1(pool: &SqlitePool) -> Result<()> {
    info!("Running migration v1: index calls(phone_number, call_time_ms)");

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_calls_phone_time ON calls (phone_number, call_time_ms DESC)",
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Migration v2: index callers by most recent call
///
/// The caller list is always read in descending `last_call_ms` order.
async fn migrate_v2(pool: &SqlitePool) -> Result<()> {
    info!("Running migration v2: index callers(last_call_ms)");

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_callers_last_call ON callers (last_call_ms DESC)")
        .execute(pool)
        .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_migrations_are_idempotent() {
        let pool = crate::db::init_in_memory().await.expect("init");
        assert_eq!(get_schema_version(&pool).await.unwrap(), CURRENT_SCHEMA_VERSION);

        run_migrations(&pool).await.expect("second run");
        assert_eq!(get_schema_version(&pool).await.unwrap(), CURRENT_SCHEMA_VERSION);
    }

    async fn index_exists(pool: &SqlitePool, name: &str) -> bool {
        sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type = 'index' AND name = ?)",
        )
        .bind(name)
        .fetch_one(pool)
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn test_fresh_database_has_both_indexes() {
        let pool = crate::db::init_in_memory().await.expect("init");
        assert!(index_exists(&pool, "idx_calls_phone_time").await);
        assert!(index_exists(&pool, "idx_callers_last_call").await);
    }

    #[tokio::test]
    async fn test_v1_database_is_upgraded_to_v2() {
        let pool = crate::db::init_in_memory().await.expect("init");

        // Roll back to the v1 state
        sqlx::query("DROP INDEX idx_callers_last_call")
            .execute(&pool)
            .await
            .unwrap();
        sqlx::query("DELETE FROM schema_version WHERE version = 2")
            .execute(&pool)
            .await
            .unwrap();
        assert_eq!(get_schema_version(&pool).await.unwrap(), 1);

        run_migrations(&pool).await.expect("migrations");

        assert_eq!(get_schema_version(&pool).await.unwrap(), 2);
        assert!(index_exists(&pool, "idx_callers_last_call").await);
    }
}
