// Migration Runner

use groupq_core::error::Result;
use sqlx::SqlitePool;
use tracing::info;

use crate::error::storage_error;

/// (version, description, sql) applied in order
const MIGRATIONS: &[(i64, &str, &str)] = &[
    (
        1,
        "Grouped queue jobs",
        include_str!("../migrations/001_queue_jobs.sql"),
    ),
    (
        2,
        "Processed record audit trail",
        include_str!("../migrations/002_processed_records.sql"),
    ),
];

/// Run database migrations
pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    info!("Running database migrations...");
    let current_version = current_version(pool).await?;
    info!(current_version, "Current schema version");

    for (version, description, sql) in MIGRATIONS {
        if current_version < *version {
            info!(version, "Applying migration: {}", description);
            apply_migration(pool, sql).await?;
        }
    }

    info!("All migrations applied successfully");
    Ok(())
}

async fn current_version(pool: &SqlitePool) -> Result<i64> {
    let table_exists: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name='schema_version'",
    )
    .fetch_one(pool)
    .await
    .map_err(storage_error)?;

    if table_exists == 0 {
        return Ok(0);
    }
    let version: Option<i64> = sqlx::query_scalar("SELECT MAX(version) FROM schema_version")
        .fetch_one(pool)
        .await
        .map_err(storage_error)?;
    Ok(version.unwrap_or(0))
}

/// Apply a single migration SQL file inside a transaction
async fn apply_migration(pool: &SqlitePool, sql: &str) -> Result<()> {
    let mut tx = pool.begin().await.map_err(storage_error)?;

    // Statements are split on ';', so migration files must not use it inside literals
    for statement in sql.split(';') {
        let clean_statement = statement
            .lines()
            .filter(|line| !line.trim().starts_with("--"))
            .collect::<Vec<_>>()
            .join("\n");
        let clean_statement = clean_statement.trim();

        if !clean_statement.is_empty() {
            sqlx::query(clean_statement)
                .execute(&mut *tx)
                .await
                .map_err(storage_error)?;
        }
    }

    tx.commit().await.map_err(storage_error)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::create_pool;

    #[tokio::test]
    async fn test_run_migrations() {
        let pool = create_pool("sqlite::memory:").await.unwrap();
        run_migrations(&pool).await.unwrap();

        for table in ["queue_jobs", "processed_records"] {
            let count: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {table}"))
                .fetch_one(&pool)
                .await
                .unwrap();
            assert_eq!(count, 0);
        }
        assert_eq!(current_version(&pool).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_migrations_are_idempotent() {
        let pool = create_pool("sqlite::memory:").await.unwrap();
        run_migrations(&pool).await.unwrap();
        run_migrations(&pool).await.unwrap();

        let rows: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM schema_version")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(rows, 2);
    }
}
