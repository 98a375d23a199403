//! Repository errors
//!
//! `from_sqlx` folds driver errors into the handful of cases the payment
//! repository distinguishes.

use thiserror::Error;

/// Result type for database operations
pub type DbResult<T> = Result<T, DatabaseError>;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DatabaseError {
    #[error("{entity} with ID '{id}' not found")]
    NotFound { entity: String, id: String },

    /// A unique index rejected the write, e.g. a repeated provider payment id
    #[error("duplicate value violates unique constraint '{constraint}'")]
    UniqueViolation { constraint: String },

    #[error("database query failed: {message}")]
    Query { message: String },

    /// Pool exhausted, closed, or the server is unreachable
    #[error("database connection error: {message}")]
    Connection { message: String },

    /// A stored value could not be decoded into its domain type
    #[error("could not decode column '{column}': {message}")]
    Decode { column: String, message: String },

    #[error("database configuration error: {message}")]
    Config { message: String },

    #[error("unknown database error: {message}")]
    Unknown { message: String },
}

impl DatabaseError {
    pub fn not_found<E: Into<String>, I: Into<String>>(entity: E, id: I) -> Self {
        DatabaseError::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, DatabaseError::NotFound { .. })
    }

    pub fn is_unique_violation(&self) -> bool {
        matches!(self, DatabaseError::UniqueViolation { .. })
    }

    pub fn from_sqlx(error: sqlx::Error) -> Self {
        match error {
            sqlx::Error::RowNotFound => DatabaseError::not_found("Record", "unknown"),
            sqlx::Error::PoolTimedOut => DatabaseError::Connection {
                message: "connection pool exhausted".to_string(),
            },
            sqlx::Error::PoolClosed => DatabaseError::Connection {
                message: "connection pool is closed".to_string(),
            },
            sqlx::Error::Io(io_err) => DatabaseError::Connection {
                message: io_err.to_string(),
            },
            sqlx::Error::Configuration(msg) => DatabaseError::Config {
                message: msg.to_string(),
            },
            sqlx::Error::Database(db_err) => {
                // 23505 is Postgres' unique_violation
                if db_err.code().as_deref() == Some("23505") {
                    DatabaseError::UniqueViolation {
                        constraint: db_err.constraint().unwrap_or("unknown").to_string(),
                    }
                } else {
                    DatabaseError::Query {
                        message: db_err.message().to_string(),
                    }
                }
            }
            sqlx::Error::ColumnDecode { index, source } => DatabaseError::Decode {
                column: index,
                message: source.to_string(),
            },
            other => DatabaseError::Unknown {
                message: other.to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_not_found_maps_to_not_found() {
        let error = DatabaseError::from_sqlx(sqlx::Error::RowNotFound);
        assert!(error.is_not_found());
        assert!(!error.is_unique_violation());
    }

    #[test]
    fn test_pool_timeout_is_connection_error() {
        let error = DatabaseError::from_sqlx(sqlx::Error::PoolTimedOut);
        assert!(matches!(error, DatabaseError::Connection { .. }));
    }

    #[test]
    fn test_not_found_message() {
        assert_eq!(
            DatabaseError::not_found("Payment", "P123").to_string(),
            "Payment with ID 'P123' not found"
        );
    }
}
