//! # Database Error Types
//!
//! Error types for database operations, plus the service-boundary error
//! that separates business rejection from infrastructure failure.
//!
//! ## Error Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                    Error Propagation                                │
//! │                                                                     │
//! │  SQLite Error (sqlx::Error)                                         │
//! │       │                                                             │
//! │       ▼                                                             │
//! │  DbError (this module) ← infrastructure: outcome unknown/aborted    │
//! │       │                                                             │
//! │       ├── CoreError (tienda-core) ← business rule rejection         │
//! │       ▼                                                             │
//! │  ServiceError { Domain | Database } ← what use-cases return         │
//! │       │                                                             │
//! │       ▼                                                             │
//! │  The CRUD shell maps Domain to 4xx and Database to 5xx              │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;
use tienda_core::CoreError;

// =============================================================================
// Db Error
// =============================================================================

/// Database operation errors.
///
/// These errors wrap sqlx errors and provide additional context. A
/// `DbError` in the middle of a multi-step sequence means the transaction
/// was rolled back: the caller learns the operation aborted, not that a
/// business rule rejected it.
#[derive(Debug, Error)]
pub enum DbError {
    /// Entity not found at the persistence level.
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// Unique constraint violation (lane triple, sku, document number).
    #[error("duplicate {field}: '{value}' already exists")]
    UniqueViolation { field: String, value: String },

    /// Foreign key constraint violation.
    #[error("foreign key violation: {message}")]
    ForeignKeyViolation { message: String },

    /// Database connection failed.
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// Migration failed.
    #[error("migration failed: {0}")]
    MigrationFailed(String),

    /// Query execution failed.
    #[error("query failed: {0}")]
    QueryFailed(String),

    /// Pool exhausted (all connections in use).
    #[error("connection pool exhausted")]
    PoolExhausted,

    /// Internal database error.
    #[error("internal database error: {0}")]
    Internal(String),
}

impl DbError {
    /// Creates a NotFound error for a given entity type and ID.
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        DbError::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }
}

/// Convert sqlx errors to DbError.
///
/// ## Error Mapping
/// ```text
/// sqlx::Error::RowNotFound    → DbError::NotFound
/// sqlx::Error::Database       → Analyze message for constraint type
/// sqlx::Error::PoolTimedOut   → DbError::PoolExhausted
/// Other                       → DbError::Internal
/// ```
impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => DbError::NotFound {
                entity: "Record".to_string(),
                id: "unknown".to_string(),
            },

            sqlx::Error::Database(db_err) => {
                let msg = db_err.message();

                // SQLite constraint messages:
                // "UNIQUE constraint failed: <table>.<column>"
                // "FOREIGN KEY constraint failed"
                if msg.contains("UNIQUE constraint failed") {
                    let field = msg
                        .split("UNIQUE constraint failed: ")
                        .nth(1)
                        .unwrap_or("unknown")
                        .to_string();
                    DbError::UniqueViolation {
                        field,
                        value: "unknown".to_string(),
                    }
                } else if msg.contains("FOREIGN KEY constraint failed") {
                    DbError::ForeignKeyViolation {
                        message: msg.to_string(),
                    }
                } else {
                    DbError::QueryFailed(msg.to_string())
                }
            }

            sqlx::Error::PoolTimedOut => DbError::PoolExhausted,

            sqlx::Error::PoolClosed => DbError::ConnectionFailed("pool is closed".to_string()),

            _ => DbError::Internal(err.to_string()),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for DbError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        DbError::MigrationFailed(err.to_string())
    }
}

/// Result type for database operations.
pub type DbResult<T> = Result<T, DbError>;

// =============================================================================
// Service Error
// =============================================================================

/// What the allocator and sale-engine use-cases return.
///
/// `Domain` failures are recoverable business rejections and propagate
/// unmodified from tienda-core. `Database` failures mean the transaction
/// aborted and the operation's outcome must be treated as unknown.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Domain(#[from] CoreError),

    #[error(transparent)]
    Database(#[from] DbError),
}

impl From<tienda_core::ValidationError> for ServiceError {
    fn from(err: tienda_core::ValidationError) -> Self {
        ServiceError::Domain(CoreError::Validation(err))
    }
}

impl ServiceError {
    /// True when the failure is a business rejection rather than an
    /// infrastructure fault.
    pub fn is_domain(&self) -> bool {
        matches!(self, ServiceError::Domain(_))
    }
}

/// Result type for service operations.
pub type ServiceResult<T> = Result<T, ServiceError>;

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_message() {
        let err = DbError::not_found("VoucherSeries", "vs-1");
        assert_eq!(err.to_string(), "VoucherSeries not found: vs-1");
    }

    #[test]
    fn test_service_error_classification() {
        let domain: ServiceError = CoreError::not_found("Sale", "s-1").into();
        assert!(domain.is_domain());

        let infra: ServiceError = DbError::PoolExhausted.into();
        assert!(!infra.is_domain());
    }
}
