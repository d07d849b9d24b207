//! # Database Errors
//!
//! ```text
//! sqlx::Error::Database          → DbError::QueryFailed
//! sqlx::Error::PoolTimedOut      → DbError::PoolExhausted
//! sqlx::Error::PoolClosed        → DbError::Closed
//! sqlx::Error::ColumnDecode, …   → DbError::Decode
//! anything else                  → DbError::Internal
//! MigrateError                   → DbError::MigrationFailed
//! ```

use thiserror::Error;

/// Errors from the session database.
#[derive(Debug, Error)]
pub enum DbError {
    /// The database file or pool could not be opened.
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    /// SQLite rejected a statement.
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Every connection stayed busy past the acquire timeout.
    #[error("Connection pool exhausted")]
    PoolExhausted,

    /// [`crate::Database::close`] was already called.
    #[error("Database is closed")]
    Closed,

    /// A stored row did not have the expected shape.
    #[error("Failed to decode row: {0}")]
    Decode(String),

    #[error("Internal database error: {0}")]
    Internal(String),
}

impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Database(db_err) => DbError::QueryFailed(db_err.message().to_string()),
            sqlx::Error::PoolTimedOut => DbError::PoolExhausted,
            sqlx::Error::PoolClosed => DbError::Closed,
            sqlx::Error::ColumnDecode { .. }
            | sqlx::Error::ColumnNotFound(_)
            | sqlx::Error::Decode(_) => DbError::Decode(err.to_string()),
            _ => DbError::Internal(err.to_string()),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for DbError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        DbError::MigrationFailed(err.to_string())
    }
}

pub type DbResult<T> = Result<T, DbError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pool_errors_map() {
        let timed_out = DbError::from(sqlx::Error::PoolTimedOut);
        assert!(matches!(timed_out, DbError::PoolExhausted));

        let closed = DbError::from(sqlx::Error::PoolClosed);
        assert!(matches!(closed, DbError::Closed));
    }

    #[test]
    fn test_decode_errors_map() {
        let err = DbError::from(sqlx::Error::ColumnNotFound("payload".into()));
        assert!(matches!(err, DbError::Decode(_)));
        assert!(err.to_string().contains("payload"));
    }
}
