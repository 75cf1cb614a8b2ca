//! # Domain Types
//!
//! Core domain types used throughout Tienda POS.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                │
//! │                                                                     │
//! │  ┌───────────────┐   ┌───────────────┐   ┌───────────────────┐     │
//! │  │   Product     │   │  VoucherType  │   │    SaleStatus     │     │
//! │  │ ───────────── │   │ ───────────── │   │ ───────────────── │     │
//! │  │ id (UUID)     │   │ Receipt       │   │ Pending (initial) │     │
//! │  │ sku (business)│   │ Invoice       │   │ Completed         │     │
//! │  │ price_cents   │   │ CreditNote    │   │ Cancelled (term.) │     │
//! │  │ current_stock │   │ DebitNote     │   │ Refunded  (term.) │     │
//! │  └───────────────┘   └───────────────┘   └───────────────────┘     │
//! │                                                                     │
//! │  ┌───────────────┐   ┌───────────────┐                             │
//! │  │ MovementType  │   │ ReferenceType │                             │
//! │  │ ───────────── │   │ ───────────── │                             │
//! │  │ Entry/Exit/.. │   │ Sale/Return/..│                             │
//! │  └───────────────┘   └───────────────┘                             │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Dual-Key Identity Pattern
//! Every entity has:
//! - `id`: UUID v4 - immutable, used for database relations
//! - Business ID: (sku, document number, lane triple) - human-readable

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};
use crate::money::Money;

// =============================================================================
// Voucher Type
// =============================================================================

/// The kind of commercial document a sale is stamped with.
///
/// Each `(store, voucher type, series)` triple owns its own numbering lane.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
pub enum VoucherType {
    /// Simple sales receipt (boleta).
    Receipt,
    /// Tax invoice (factura).
    Invoice,
    /// Credit note issued against a previous document.
    CreditNote,
    /// Debit note issued against a previous document.
    DebitNote,
}

impl VoucherType {
    /// Stable textual key, also the database representation.
    pub const fn as_str(&self) -> &'static str {
        match self {
            VoucherType::Receipt => "receipt",
            VoucherType::Invoice => "invoice",
            VoucherType::CreditNote => "credit_note",
            VoucherType::DebitNote => "debit_note",
        }
    }
}

// =============================================================================
// Sale Status
// =============================================================================

/// The lifecycle status of a sale.
///
/// ## State Machine
/// ```text
/// Pending ──► Completed ──► Refunded
///    │             │
///    └──────┬──────┘
///           ▼
///       Cancelled
/// ```
/// Cancelled and Refunded are terminal. Every other move is rejected with
/// `CoreError::InvalidStatusTransition`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "lowercase")]
pub enum SaleStatus {
    /// Sale created at checkout, stock not yet touched.
    Pending,
    /// Stock decremented, movements written, document final.
    Completed,
    /// Terminal. Stock restored if the sale had completed.
    Cancelled,
    /// Terminal. Only reachable from Completed; stock restored.
    Refunded,
}

impl SaleStatus {
    /// Stable textual key, also the database representation.
    pub const fn as_str(&self) -> &'static str {
        match self {
            SaleStatus::Pending => "pending",
            SaleStatus::Completed => "completed",
            SaleStatus::Cancelled => "cancelled",
            SaleStatus::Refunded => "refunded",
        }
    }

    /// True for statuses from which no further transition is permitted.
    pub const fn is_terminal(&self) -> bool {
        matches!(self, SaleStatus::Cancelled | SaleStatus::Refunded)
    }

    /// Checks whether `self -> to` is a legal lifecycle move.
    pub const fn can_transition_to(&self, to: SaleStatus) -> bool {
        matches!(
            (self, to),
            (SaleStatus::Pending, SaleStatus::Completed)
                | (SaleStatus::Pending, SaleStatus::Cancelled)
                | (SaleStatus::Completed, SaleStatus::Cancelled)
                | (SaleStatus::Completed, SaleStatus::Refunded)
        )
    }
}

impl Default for SaleStatus {
    fn default() -> Self {
        SaleStatus::Pending
    }
}

// =============================================================================
// Movement Type / Reference Type
// =============================================================================

/// The cause category of an inventory movement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
pub enum MovementType {
    /// Stock received (purchase, initial load).
    Entry,
    /// Stock sold or otherwise dispatched.
    Exit,
    /// Stocktake correction: sets stock to the counted quantity.
    Adjustment,
    /// Stock restored by a compensating reversal.
    Return,
    /// Stock moved to another store.
    Transfer,
    /// Stock written off (damage, theft, expiry).
    Loss,
}

impl MovementType {
    /// Derives the post-movement stock level.
    ///
    /// This is the single place the derivation rule lives; a movement's
    /// `new_stock` is computed here at creation time and never recomputed
    /// or mutated afterwards.
    pub const fn apply(&self, previous_stock: i64, quantity: i64) -> i64 {
        match self {
            MovementType::Entry | MovementType::Return => previous_stock + quantity,
            MovementType::Exit | MovementType::Transfer | MovementType::Loss => {
                previous_stock - quantity
            }
            // Stocktake semantics: the counted quantity replaces the level
            MovementType::Adjustment => quantity,
        }
    }
}

/// The kind of document an inventory movement points back to.
///
/// A movement references a sale only by `(reference_id, reference_type)`;
/// this is a weak back-reference used for compensating lookups, never an
/// ownership edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
pub enum ReferenceType {
    Purchase,
    Sale,
    Transfer,
    Return,
}

impl ReferenceType {
    /// Stable textual key, also the database representation.
    pub const fn as_str(&self) -> &'static str {
        match self {
            ReferenceType::Purchase => "purchase",
            ReferenceType::Sale => "sale",
            ReferenceType::Transfer => "transfer",
            ReferenceType::Return => "return",
        }
    }
}

// =============================================================================
// Product
// =============================================================================

/// A stock-bearing product.
///
/// The sale/inventory engine treats the product as the mutable resource
/// being protected: stock only ever changes through delta operations that
/// are checked against the current level.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Product {
    /// Unique identifier (UUID v4).
    pub id: String,

    /// Store this product belongs to.
    pub store_id: String,

    /// Stock Keeping Unit - business identifier, unique per store.
    pub sku: String,

    /// Display name shown on documents.
    pub name: String,

    /// Unit price in cents (smallest currency unit).
    pub price_cents: i64,

    /// Current stock level. Integer only: fractional stock is rejected
    /// upstream at validation.
    pub current_stock: i64,

    /// Whether the product is usable (soft delete / suspension flag).
    pub is_active: bool,

    /// When the product was created.
    pub created_at: DateTime<Utc>,

    /// When the product was last updated.
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// Returns the unit price as a Money type.
    #[inline]
    pub fn price(&self) -> Money {
        Money::from_cents(self.price_cents)
    }

    /// Checks whether the requested quantity is available.
    pub fn has_stock(&self, quantity: i64) -> bool {
        self.current_stock >= quantity
    }

    /// Checks whether the product can be sold at all for this quantity.
    pub fn can_sell(&self, quantity: i64) -> bool {
        self.is_active && self.has_stock(quantity)
    }

    /// Removes stock, failing with a typed error instead of going negative.
    pub fn remove_stock(&mut self, quantity: i64) -> CoreResult<()> {
        if !self.has_stock(quantity) {
            return Err(CoreError::InsufficientStock {
                product_id: self.id.clone(),
                available: self.current_stock,
                requested: quantity,
            });
        }
        self.current_stock -= quantity;
        Ok(())
    }

    /// Adds stock back (compensating returns, purchases).
    pub fn add_stock(&mut self, quantity: i64) {
        self.current_stock += quantity;
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn product(stock: i64, active: bool) -> Product {
        let now = Utc::now();
        Product {
            id: "p-1".to_string(),
            store_id: "store-1".to_string(),
            sku: "COKE-330".to_string(),
            name: "Coca-Cola 330ml".to_string(),
            price_cents: 299,
            current_stock: stock,
            is_active: active,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_sale_status_transitions() {
        use SaleStatus::*;

        assert!(Pending.can_transition_to(Completed));
        assert!(Pending.can_transition_to(Cancelled));
        assert!(Completed.can_transition_to(Cancelled));
        assert!(Completed.can_transition_to(Refunded));

        assert!(!Pending.can_transition_to(Refunded));
        assert!(!Completed.can_transition_to(Completed));
        assert!(!Cancelled.can_transition_to(Completed));
        assert!(!Refunded.can_transition_to(Cancelled));
    }

    #[test]
    fn test_terminal_statuses() {
        assert!(!SaleStatus::Pending.is_terminal());
        assert!(!SaleStatus::Completed.is_terminal());
        assert!(SaleStatus::Cancelled.is_terminal());
        assert!(SaleStatus::Refunded.is_terminal());
    }

    #[test]
    fn test_movement_apply() {
        assert_eq!(MovementType::Entry.apply(10, 5), 15);
        assert_eq!(MovementType::Return.apply(10, 5), 15);
        assert_eq!(MovementType::Exit.apply(10, 5), 5);
        assert_eq!(MovementType::Loss.apply(10, 5), 5);
        assert_eq!(MovementType::Transfer.apply(10, 5), 5);
        // Stocktake: counted quantity wins
        assert_eq!(MovementType::Adjustment.apply(10, 7), 7);
    }

    #[test]
    fn test_product_stock_ops() {
        let mut p = product(10, true);
        assert!(p.has_stock(10));
        assert!(!p.has_stock(11));
        assert!(p.can_sell(3));

        p.remove_stock(4).unwrap();
        assert_eq!(p.current_stock, 6);

        let err = p.remove_stock(7).unwrap_err();
        assert!(matches!(
            err,
            CoreError::InsufficientStock {
                available: 6,
                requested: 7,
                ..
            }
        ));
        // Failed removal leaves stock untouched
        assert_eq!(p.current_stock, 6);

        p.add_stock(4);
        assert_eq!(p.current_stock, 10);
    }

    #[test]
    fn test_inactive_product_cannot_sell() {
        let p = product(10, false);
        assert!(p.has_stock(1));
        assert!(!p.can_sell(1));
    }
}
