//! # Error Types
//!
//! Domain-specific error types for tienda-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                 │
//! │                                                                     │
//! │  tienda-core errors (this file)                                     │
//! │  ├── CoreError        - Business rule violations                    │
//! │  └── ValidationError  - Input validation failures                   │
//! │                                                                     │
//! │  tienda-db errors (separate crate)                                  │
//! │  ├── DbError          - Infrastructure failures (outcome unknown)   │
//! │  └── ServiceError     - Domain | Database, at the use-case boundary │
//! │                                                                     │
//! │  Flow: ValidationError → CoreError → ServiceError → caller          │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Design Principles
//! 1. Use `thiserror` for derive macros (not manual impl)
//! 2. Include context in error messages (product id, statuses, lane key)
//! 3. Errors are enum variants, never String
//! 4. Business failures are recoverable by the caller and are never
//!    swallowed or retried inside the core

use thiserror::Error;

use crate::types::SaleStatus;

// =============================================================================
// Core Error
// =============================================================================

/// Core business logic errors.
///
/// These errors represent business rule violations or domain logic failures.
/// The caller maps them to user-facing responses (not-found vs. conflict
/// vs. validation); this crate never converts them to generic errors.
#[derive(Debug, Error)]
pub enum CoreError {
    /// An entity id does not resolve.
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// Uniqueness violation on a voucher lane or document key.
    ///
    /// ## When This Occurs
    /// - Creating a voucher series for a `(store, type, series)` triple
    ///   that already has a lane
    /// - Re-keying a lane onto an existing triple via update
    #[error("{entity} already exists: {key}")]
    AlreadyExists { entity: String, key: String },

    /// Illegal sale lifecycle move.
    ///
    /// ## When This Occurs
    /// - Completing a sale that is already CANCELLED
    /// - Refunding a sale that never completed
    /// - Any transition out of a terminal status
    #[error("invalid status transition: {from:?} -> {to:?}")]
    InvalidStatusTransition { from: SaleStatus, to: SaleStatus },

    /// Insufficient stock to complete a sale line.
    ///
    /// ## User Workflow
    /// ```text
    /// Complete sale (qty: 5)
    ///      │
    ///      ▼
    /// Check stock: available=3
    ///      │
    ///      ▼
    /// InsufficientStock { product_id, available: 3, requested: 5 }
    ///      │
    ///      ▼
    /// Shell shows: "Only 3 left in stock"
    /// ```
    #[error("insufficient stock for product {product_id}: available {available}, requested {requested}")]
    InsufficientStock {
        product_id: String,
        available: i64,
        requested: i64,
    },

    /// Product exists but is not usable (deactivated).
    #[error("product {product_id} is inactive")]
    InactiveProduct { product_id: String },

    /// Validation error (wraps ValidationError).
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),
}

impl CoreError {
    /// Creates a NotFound error for a given entity type and ID.
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        CoreError::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    /// Creates an AlreadyExists error for a given entity type and key.
    pub fn already_exists(entity: impl Into<String>, key: impl Into<String>) -> Self {
        CoreError::AlreadyExists {
            entity: entity.into(),
            key: key.into(),
        }
    }
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// These errors occur when input doesn't meet field-level requirements.
/// Used for early validation before business logic runs.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Value must not be negative.
    #[error("{field} must not be negative")]
    MustNotBeNegative { field: String },

    /// Invalid format (e.g., invalid decimal amount, invalid series code).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// A date lies in the future where only today-or-earlier is allowed.
    #[error("{field} must not be a future date")]
    FutureDate { field: String },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================
