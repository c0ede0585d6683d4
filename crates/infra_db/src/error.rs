//! Database error types
//!
//! This module defines the error types that can occur during database
//! operations and their mapping onto the port-level error the domain
//! services consume.

use core_kernel::PortError;
use thiserror::Error;

/// Errors that can occur during database operations
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// Failed to establish a database connection
    #[error("Failed to connect to database: {0}")]
    ConnectionFailed(String),

    /// Entity not found in database
    #[error("Entity not found: {0}")]
    NotFound(String),

    /// Unique constraint violation (idempotency-key backstop included)
    #[error("Duplicate entry: {0}")]
    DuplicateEntry(String),

    /// Foreign key constraint violation
    #[error("Foreign key violation: {0}")]
    ForeignKeyViolation(String),

    /// A stored row failed domain re-validation on restore
    #[error("Corrupt row: {0}")]
    CorruptRow(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Generic SQL error
    #[error("SQL error: {0}")]
    SqlError(#[from] sqlx::Error),
}

impl DatabaseError {
    /// Classifies a sqlx error, surfacing constraint violations by kind
    pub fn from_sqlx(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &err {
            match db_err.code().as_deref() {
                Some("23505") => {
                    return DatabaseError::DuplicateEntry(db_err.message().to_string())
                }
                Some("23503") => {
                    return DatabaseError::ForeignKeyViolation(db_err.message().to_string())
                }
                _ => {}
            }
        }
        DatabaseError::SqlError(err)
    }
}

impl From<DatabaseError> for PortError {
    fn from(err: DatabaseError) -> Self {
        match err {
            DatabaseError::NotFound(id) => PortError::NotFound {
                entity_type: "record".to_string(),
                id,
            },
            DatabaseError::DuplicateEntry(message) => PortError::conflict(message),
            DatabaseError::ConnectionFailed(message) => PortError::connection(message),
            DatabaseError::SqlError(sqlx::Error::PoolTimedOut) => {
                PortError::connection("connection pool timed out")
            }
            other => PortError::Internal {
                message: other.to_string(),
                source: Some(Box::new(other)),
            },
        }
    }
}
