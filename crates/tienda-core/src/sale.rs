//! # Sale Aggregate
//!
//! The sale is one commercial transaction: a document header plus the line
//! items it was sold with.
//!
//! ## Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                        Sale Lifecycle                               │
//! │                                                                     │
//! │  1. CREATE (checkout)                                               │
//! │     └── Sale::create() → status: Pending, totals validated          │
//! │     └── document number stamped from the voucher lane               │
//! │                                                                     │
//! │  2. COMPLETE                                                        │
//! │     └── stock decremented + EXIT movements, all-or-nothing          │
//! │                                                                     │
//! │  3. CANCEL / REFUND                                                 │
//! │     └── terminal; compensating RETURN movements if completed        │
//! │                                                                     │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Mutation is only possible through explicit transition methods returning
//! a typed failure; there are no raw setters. The header totals are the
//! authoritative source of truth: they are validated once at creation and
//! line items are immutable afterwards, so header and details cannot
//! diverge.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::money::Money;
use crate::types::{SaleStatus, VoucherType};
use crate::validation::{validate_amount_cents, validate_quantity, validate_sale_date};
use crate::MAX_SALE_LINES;

// =============================================================================
// Sale Detail (line item)
// =============================================================================

/// One line item of a sale.
///
/// Owned by the sale by composition: created with it, never mutated after,
/// destroyed with it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct SaleDetail {
    pub id: String,
    pub sale_id: String,
    pub product_id: String,
    /// Units sold. Always > 0, integer only.
    pub quantity: i64,
    /// Unit price in cents at time of sale (frozen).
    pub unit_price_cents: i64,
    /// Line discount in cents. `0 <= discount <= quantity * unit_price`.
    pub discount_cents: i64,
}

impl SaleDetail {
    /// Line subtotal: `quantity * unit_price - discount`.
    #[inline]
    pub fn subtotal(&self) -> Money {
        Money::from_cents(self.quantity * self.unit_price_cents - self.discount_cents)
    }

    /// Returns the unit price as Money.
    #[inline]
    pub fn unit_price(&self) -> Money {
        Money::from_cents(self.unit_price_cents)
    }
}

/// Sum of line subtotals, a derived view over the details.
///
/// The persisted header totals stay authoritative; this is for reporting
/// and cross-checks, it is never written back.
pub fn details_total(details: &[SaleDetail]) -> Money {
    details
        .iter()
        .fold(Money::zero(), |acc, d| acc + d.subtotal())
}

/// Total units across all line items.
pub fn details_quantity(details: &[SaleDetail]) -> i64 {
    details.iter().map(|d| d.quantity).sum()
}

// =============================================================================
// Creation Input
// =============================================================================

/// One requested line item at checkout.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewSaleLine {
    pub product_id: String,
    pub quantity: i64,
    pub unit_price_cents: i64,
    pub discount_cents: i64,
}

/// Input for creating a sale.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewSale {
    pub store_id: String,
    pub customer_id: String,
    pub user_id: String,
    pub voucher_type: VoucherType,
    /// Series code of the numbering lane to stamp from, e.g. `"B001"`.
    pub series: String,
    pub sale_date: DateTime<Utc>,
    pub subtotal_cents: i64,
    pub tax_cents: i64,
    pub discount_cents: i64,
    pub notes: Option<String>,
    pub lines: Vec<NewSaleLine>,
}

// =============================================================================
// Sale
// =============================================================================

/// The sale document header.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Sale {
    pub id: String,
    pub store_id: String,
    pub customer_id: String,
    pub user_id: String,
    /// Stamped document number, e.g. `"B001-00000042"`. None until the
    /// voucher lane has been consulted.
    pub document_number: Option<String>,
    pub voucher_type: VoucherType,
    pub series: String,
    pub sale_date: DateTime<Utc>,
    pub subtotal_cents: i64,
    pub tax_cents: i64,
    pub discount_cents: i64,
    /// Always `subtotal + tax - discount`, computed once at creation.
    pub total_cents: i64,
    pub status: SaleStatus,
    pub notes: Option<String>,
    pub registered_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Sale {
    /// Validates the input and builds a Pending sale with its line items.
    ///
    /// ## Rules
    /// - `subtotal`, `tax`, `discount` must all be >= 0
    /// - `total = subtotal + tax - discount` and must not be negative
    /// - `sale_date` must not be a calendar day later than `now`
    ///   (same-day is allowed)
    /// - at least one line item, at most [`MAX_SALE_LINES`]
    /// - per line: `quantity > 0`, `unit_price >= 0`,
    ///   `0 <= discount <= quantity * unit_price`
    pub fn create(
        id: impl Into<String>,
        input: NewSale,
        now: DateTime<Utc>,
    ) -> CoreResult<(Sale, Vec<SaleDetail>)> {
        let id = id.into();

        validate_amount_cents("subtotal", input.subtotal_cents)?;
        validate_amount_cents("tax", input.tax_cents)?;
        validate_amount_cents("discount", input.discount_cents)?;
        validate_sale_date(input.sale_date, now)?;

        let total_cents = input.subtotal_cents + input.tax_cents - input.discount_cents;
        if total_cents < 0 {
            return Err(ValidationError::MustNotBeNegative {
                field: "total".to_string(),
            }
            .into());
        }

        if input.lines.is_empty() {
            return Err(ValidationError::Required {
                field: "lines".to_string(),
            }
            .into());
        }
        if input.lines.len() > MAX_SALE_LINES {
            return Err(ValidationError::OutOfRange {
                field: "lines".to_string(),
                min: 1,
                max: MAX_SALE_LINES as i64,
            }
            .into());
        }

        let mut details = Vec::with_capacity(input.lines.len());
        for line in &input.lines {
            details.push(Self::validate_line(&id, line)?);
        }

        let sale = Sale {
            id,
            store_id: input.store_id,
            customer_id: input.customer_id,
            user_id: input.user_id,
            document_number: None,
            voucher_type: input.voucher_type,
            series: input.series,
            sale_date: input.sale_date,
            subtotal_cents: input.subtotal_cents,
            tax_cents: input.tax_cents,
            discount_cents: input.discount_cents,
            total_cents,
            status: SaleStatus::Pending,
            notes: input.notes,
            registered_at: now,
            updated_at: now,
        };

        Ok((sale, details))
    }

    fn validate_line(sale_id: &str, line: &NewSaleLine) -> CoreResult<SaleDetail> {
        validate_quantity(line.quantity)?;
        validate_amount_cents("unit_price", line.unit_price_cents)?;

        let line_gross = line
            .quantity
            .checked_mul(line.unit_price_cents)
            .ok_or_else(|| ValidationError::OutOfRange {
                field: "line total".to_string(),
                min: 0,
                max: i64::MAX,
            })?;
        if line.discount_cents < 0 || line.discount_cents > line_gross {
            return Err(ValidationError::OutOfRange {
                field: "line discount".to_string(),
                min: 0,
                max: line_gross,
            }
            .into());
        }

        Ok(SaleDetail {
            id: uuid::Uuid::new_v4().to_string(),
            sale_id: sale_id.to_string(),
            product_id: line.product_id.clone(),
            quantity: line.quantity,
            unit_price_cents: line.unit_price_cents,
            discount_cents: line.discount_cents,
        })
    }

    /// Stamps the allocated document number. A sale is stamped exactly once.
    pub fn stamp_document_number(&mut self, number: String) -> CoreResult<()> {
        if self.document_number.is_some() {
            return Err(ValidationError::InvalidFormat {
                field: "document_number".to_string(),
                reason: "already stamped".to_string(),
            }
            .into());
        }
        self.document_number = Some(number);
        Ok(())
    }

    /// Moves the sale to a new status, or fails with
    /// `InvalidStatusTransition { from, to }`.
    pub fn transition_to(&mut self, to: SaleStatus, now: DateTime<Utc>) -> CoreResult<()> {
        if !self.status.can_transition_to(to) {
            return Err(CoreError::InvalidStatusTransition {
                from: self.status,
                to,
            });
        }
        self.status = to;
        self.updated_at = now;
        Ok(())
    }

    /// Returns the header total as Money.
    #[inline]
    pub fn total(&self) -> Money {
        Money::from_cents(self.total_cents)
    }

    /// True once no further transition is permitted.
    #[inline]
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
