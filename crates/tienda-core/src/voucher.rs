//! # Voucher Series
//!
//! A voucher series is one numbering lane: a `(store, voucher type, series)`
//! triple with its own monotonic counter, used to stamp sale documents.
//!
//! ## The Numbering Contract
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │  Lane: (store-1, receipt, "B001")     current_number = 41           │
//! │                                                                     │
//! │  allocate ──► 42 ──► "B001-00000042"                                │
//! │  allocate ──► 43 ──► "B001-00000043"                                │
//! │                                                                     │
//! │  Guarantees:                                                        │
//! │  • exactly-once: no number is ever handed out twice                 │
//! │  • no lost update: N increments always advance the counter by N     │
//! │  • format is bit-exact: series + "-" + zero-padded(number, 8)       │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The counter itself is advanced by the persistence layer with an atomic
//! read-modify-write (see `tienda-db`); this module owns the entity shape,
//! its invariants and the formatting rule.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{CoreResult, ValidationError};
use crate::types::VoucherType;
use crate::validation::validate_series_code;
use crate::DOCUMENT_NUMBER_WIDTH;

// =============================================================================
// Document Number Formatting
// =============================================================================

/// Formats a document number: `series + "-" + zero-padded(number, 8)`.
///
/// This format is load-bearing: it becomes the human-visible document
/// number and must be bit-exact. The width grows beyond 8 digits without
/// truncation.
///
/// ## Example
/// ```rust
/// use tienda_core::voucher::format_document_number;
///
/// assert_eq!(format_document_number("B001", 1), "B001-00000001");
/// assert_eq!(format_document_number("B001", 100_000_000), "B001-100000000");
/// ```
pub fn format_document_number(series: &str, number: i64) -> String {
    format!("{}-{:0width$}", series, number, width = DOCUMENT_NUMBER_WIDTH)
}

// =============================================================================
// Voucher Series
// =============================================================================

/// One numbering lane.
///
/// Invariants:
/// - `current_number >= 1` always
/// - at most one lane per `(store_id, voucher_type, series)` triple
///   (enforced by the persistence layer's unique index and re-checked on
///   create/update)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct VoucherSeries {
    /// Unique identifier (UUID v4).
    pub id: String,

    /// Store that owns this lane.
    pub store_id: String,

    /// Document kind this lane numbers.
    pub voucher_type: VoucherType,

    /// Series code, e.g. `"B001"`.
    pub series: String,

    /// Last issued number. The next document gets `current_number + 1`.
    pub current_number: i64,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl VoucherSeries {
    /// Creates a new lane starting at `starting_number`.
    ///
    /// ## Rules
    /// - `series` must be a valid series code (non-empty, short, alphanumeric)
    /// - `starting_number >= 1`
    pub fn new(
        id: impl Into<String>,
        store_id: impl Into<String>,
        voucher_type: VoucherType,
        series: &str,
        starting_number: i64,
        now: DateTime<Utc>,
    ) -> CoreResult<Self> {
        validate_series_code(series)?;

        if starting_number < 1 {
            return Err(ValidationError::OutOfRange {
                field: "starting_number".to_string(),
                min: 1,
                max: i64::MAX,
            }
            .into());
        }

        Ok(VoucherSeries {
            id: id.into(),
            store_id: store_id.into(),
            voucher_type,
            series: series.trim().to_string(),
            current_number: starting_number,
            created_at: now,
            updated_at: now,
        })
    }

    /// Human-readable lane key, used in conflict messages.
    pub fn lane_key(&self) -> String {
        format!(
            "{}/{}/{}",
            self.store_id,
            self.voucher_type.as_str(),
            self.series
        )
    }

    /// The number the next allocation will hand out.
    #[inline]
    pub fn next_number(&self) -> i64 {
        self.current_number + 1
    }

    /// Read-only preview of the lane position. Does not mutate anything.
    pub fn peek(&self) -> NextNumber {
        NextNumber {
            current_number: self.current_number,
            next_number: self.next_number(),
            formatted_number: format_document_number(&self.series, self.current_number),
            next_formatted_number: format_document_number(&self.series, self.next_number()),
        }
    }

    /// Advances the counter by exactly one.
    ///
    /// Bulk increments are loops of this single-unit step so the
    /// `current_number >= 1` invariant is re-checked each step. The
    /// persistence layer mirrors this with one atomic SQL statement per
    /// step.
    pub fn increment(&mut self, now: DateTime<Utc>) -> CoreResult<i64> {
        let next = self.current_number.checked_add(1).ok_or_else(|| {
            ValidationError::OutOfRange {
                field: "current_number".to_string(),
                min: 1,
                max: i64::MAX,
            }
        })?;
        self.current_number = next;
        self.updated_at = now;
        Ok(next)
    }
}

// =============================================================================
// Next Number Preview
// =============================================================================

/// Read-only allocation preview returned by `getNextNumber`-style calls.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NextNumber {
    pub current_number: i64,
    pub next_number: i64,
    pub formatted_number: String,
    pub next_formatted_number: String,
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn lane(start: i64) -> VoucherSeries {
        VoucherSeries::new(
            "vs-1",
            "store-1",
            VoucherType::Receipt,
            "B001",
            start,
            Utc::now(),
        )
        .unwrap()
    }

    #[test]
    fn test_format_is_bit_exact() {
        assert_eq!(format_document_number("B001", 1), "B001-00000001");
        assert_eq!(format_document_number("B001", 42), "B001-00000042");
        assert_eq!(format_document_number("F001", 99_999_999), "F001-99999999");
        // Width grows past 8 digits, no truncation
        assert_eq!(format_document_number("B001", 100_000_000), "B001-100000000");
    }

    #[test]
    fn test_new_lane_rules() {
        assert!(lane(1).current_number == 1);
        assert!(VoucherSeries::new(
            "vs-2",
            "store-1",
            VoucherType::Receipt,
            "B001",
            0,
            Utc::now()
        )
        .is_err());
        assert!(VoucherSeries::new(
            "vs-3",
            "store-1",
            VoucherType::Receipt,
            "",
            1,
            Utc::now()
        )
        .is_err());
    }

    #[test]
    fn test_peek_does_not_mutate() {
        let lane = lane(41);
        let preview = lane.peek();

        assert_eq!(preview.current_number, 41);
        assert_eq!(preview.next_number, 42);
        assert_eq!(preview.formatted_number, "B001-00000041");
        assert_eq!(preview.next_formatted_number, "B001-00000042");
        // Still 41 after peeking
        assert_eq!(lane.current_number, 41);
    }

    #[test]
    fn test_increment_is_single_unit() {
        let mut lane = lane(1);
        for expected in 2..=6 {
            let got = lane.increment(Utc::now()).unwrap();
            assert_eq!(got, expected);
        }
        assert_eq!(lane.current_number, 6);
    }

    #[test]
    fn test_lane_key() {
        assert_eq!(lane(1).lane_key(), "store-1/receipt/B001");
    }
}
