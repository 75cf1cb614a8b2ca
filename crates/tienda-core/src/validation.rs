//! # Validation Module
//!
//! Field-level validation utilities for Tienda POS.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                              │
//! │                                                                     │
//! │  Layer 1: HTTP shell (DTO validation, not this workspace)           │
//! │           │                                                         │
//! │           ▼                                                         │
//! │  Layer 2: THIS MODULE + aggregate constructors                      │
//! │  ├── Field formats, ranges, calendar rules                          │
//! │  └── Business rule validation (Sale::create, VoucherSeries::new)    │
//! │           │                                                         │
//! │           ▼                                                         │
//! │  Layer 3: Database (SQLite)                                         │
//! │  ├── NOT NULL / CHECK constraints                                   │
//! │  ├── UNIQUE constraints (lane triple, sku)                          │
//! │  └── Foreign key constraints                                        │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};

use crate::error::ValidationError;
use crate::MAX_LINE_QUANTITY;

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

// =============================================================================
// String Validators
// =============================================================================

/// Validates a voucher series code.
///
/// ## Rules
/// - Must not be empty
/// - At most 10 characters
/// - Only alphanumeric characters (e.g. `"B001"`, `"F001"`)
///
/// ## Example
/// ```rust
/// use tienda_core::validation::validate_series_code;
///
/// assert!(validate_series_code("B001").is_ok());
/// assert!(validate_series_code("").is_err());
/// assert!(validate_series_code("B-001").is_err());
/// ```
pub fn validate_series_code(series: &str) -> ValidationResult<()> {
    let series = series.trim();

    if series.is_empty() {
        return Err(ValidationError::Required {
            field: "series".to_string(),
        });
    }

    if series.len() > 10 {
        return Err(ValidationError::TooLong {
            field: "series".to_string(),
            max: 10,
        });
    }

    if !series.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(ValidationError::InvalidFormat {
            field: "series".to_string(),
            reason: "must contain only letters and numbers".to_string(),
        });
    }

    Ok(())
}

/// Validates a SKU (Stock Keeping Unit).
///
/// ## Rules
/// - Must not be empty
/// - Must be between 1 and 50 characters
/// - Only alphanumeric characters, hyphens, underscores
pub fn validate_sku(sku: &str) -> ValidationResult<()> {
    let sku = sku.trim();

    if sku.is_empty() {
        return Err(ValidationError::Required {
            field: "sku".to_string(),
        });
    }

    if sku.len() > 50 {
        return Err(ValidationError::TooLong {
            field: "sku".to_string(),
            max: 50,
        });
    }

    if !sku
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-' || c == '_')
    {
        return Err(ValidationError::InvalidFormat {
            field: "sku".to_string(),
            reason: "must contain only letters, numbers, hyphens, and underscores".to_string(),
        });
    }

    Ok(())
}

// =============================================================================
// Numeric Validators
// =============================================================================

/// Validates a line item quantity: integer, positive, bounded.
pub fn validate_quantity(quantity: i64) -> ValidationResult<()> {
    if quantity <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "quantity".to_string(),
        });
    }
    if quantity > MAX_LINE_QUANTITY {
        return Err(ValidationError::OutOfRange {
            field: "quantity".to_string(),
            min: 1,
            max: MAX_LINE_QUANTITY,
        });
    }
    Ok(())
}

/// Validates a monetary amount in cents: must not be negative.
pub fn validate_amount_cents(field: &str, cents: i64) -> ValidationResult<()> {
    if cents < 0 {
        return Err(ValidationError::MustNotBeNegative {
            field: field.to_string(),
        });
    }
    Ok(())
}

// =============================================================================
// Date Validators
// =============================================================================

/// Validates that a sale date is not a calendar day later than `now`.
///
/// Same-day sales are allowed regardless of the time component; the
/// comparison works on calendar days, not instants.
pub fn validate_sale_date(sale_date: DateTime<Utc>, now: DateTime<Utc>) -> ValidationResult<()> {
    if sale_date.date_naive() > now.date_naive() {
        return Err(ValidationError::FutureDate {
            field: "sale_date".to_string(),
        });
    }
    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_series_code() {
        assert!(validate_series_code("B001").is_ok());
        assert!(validate_series_code("F001").is_ok());
        assert!(validate_series_code(" B001 ").is_ok());
        assert!(validate_series_code("").is_err());
        assert!(validate_series_code("B-001").is_err());
        assert!(validate_series_code("ABCDEFGHIJK").is_err());
    }

    #[test]
    fn test_sku() {
        assert!(validate_sku("COKE-330").is_ok());
        assert!(validate_sku("").is_err());
        assert!(validate_sku(&"A".repeat(100)).is_err());
        assert!(validate_sku("COKE 330").is_err());
    }

    #[test]
    fn test_quantity() {
        assert!(validate_quantity(1).is_ok());
        assert!(validate_quantity(MAX_LINE_QUANTITY).is_ok());
        assert!(validate_quantity(0).is_err());
        assert!(validate_quantity(-1).is_err());
        assert!(validate_quantity(MAX_LINE_QUANTITY + 1).is_err());
    }

    #[test]
    fn test_amounts() {
        assert!(validate_amount_cents("subtotal", 0).is_ok());
        assert!(validate_amount_cents("subtotal", 100).is_ok());
        assert!(validate_amount_cents("subtotal", -1).is_err());
    }

    #[test]
    fn test_sale_date_calendar_days() {
        let now = Utc::now();
        assert!(validate_sale_date(now, now).is_ok());
        assert!(validate_sale_date(now - Duration::days(10), now).is_ok());
        assert!(validate_sale_date(now + Duration::days(1), now).is_err());
    }
}
