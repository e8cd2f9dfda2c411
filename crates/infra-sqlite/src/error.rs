// sqlx::Error -> AppError mapping
// Orphan rules prevent From<sqlx::Error> for AppError here, so adapters call these helpers

use groupq_core::error::AppError;

/// Queue-side failures: the broker is unreachable or rejected the operation
pub(crate) fn broker_error(err: sqlx::Error) -> AppError {
    AppError::BrokerUnavailable(describe(&err))
}

/// Audit-store and setup failures
pub(crate) fn storage_error(err: sqlx::Error) -> AppError {
    AppError::Database(describe(&err))
}

fn describe(err: &sqlx::Error) -> String {
    match err {
        sqlx::Error::Database(db_err) => match db_err.code() {
            // SQLite error codes: https://www.sqlite.org/rescode.html
            Some(code) => match code.as_ref() {
                "2067" | "1555" => format!("Unique constraint violation: {}", db_err.message()),
                "275" => format!("Check constraint violation: {}", db_err.message()),
                "5" | "517" => format!("Database locked (SQLITE_BUSY): {}", db_err.message()),
                "13" => format!("Database full: {}", db_err.message()),
                other => format!("Database error [{}]: {}", other, db_err.message()),
            },
            None => format!("Database error: {}", db_err.message()),
        },
        sqlx::Error::RowNotFound => "Row not found".to_string(),
        sqlx::Error::ColumnNotFound(col) => format!("Column not found: {}", col),
        sqlx::Error::PoolTimedOut => "Connection pool timed out".to_string(),
        // Connection, pool, protocol errors
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_queue_and_store_errors_map_to_distinct_variants() {
        assert!(matches!(
            broker_error(sqlx::Error::PoolTimedOut),
            AppError::BrokerUnavailable(ref m) if m.contains("timed out")
        ));
        assert!(matches!(
            storage_error(sqlx::Error::RowNotFound),
            AppError::Database(ref m) if m == "Row not found"
        ));
    }
}
