//! # tienda-core: Pure Business Logic for Tienda POS
//!
//! This crate is the **heart** of the Tienda POS backend. It contains the
//! domain logic of the administrative POS/inventory system as pure functions
//! with zero I/O dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                     Tienda POS Architecture                         │
//! │                                                                     │
//! │  ┌───────────────────────────────────────────────────────────────┐  │
//! │  │                 HTTP / CRUD shell (not here)                  │  │
//! │  │   routing, DTO validation, Swagger, auth middleware           │  │
//! │  └───────────────────────────────┬───────────────────────────────┘  │
//! │                                  │                                  │
//! │  ┌───────────────────────────────▼───────────────────────────────┐  │
//! │  │              ★ tienda-core (THIS CRATE) ★                     │  │
//! │  │                                                               │  │
//! │  │  ┌─────────┐ ┌─────────┐ ┌─────────┐ ┌──────────┐ ┌────────┐ │  │
//! │  │  │  money  │ │  sale   │ │ voucher │ │ movement │ │ types  │ │  │
//! │  │  │  Money  │ │  Sale   │ │ Series  │ │  Ledger  │ │Product │ │  │
//! │  │  └─────────┘ └─────────┘ └─────────┘ └──────────┘ └────────┘ │  │
//! │  │                                                               │  │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS          │  │
//! │  └───────────────────────────────┬───────────────────────────────┘  │
//! │                                  │                                  │
//! │  ┌───────────────────────────────▼───────────────────────────────┐  │
//! │  │                 tienda-db (Database Layer)                    │  │
//! │  │     SQLite repositories, allocator + sale/inventory engine    │  │
//! │  └───────────────────────────────────────────────────────────────┘  │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain types (Product, status enums)
//! - [`money`] - Money type with integer arithmetic (no floating point!)
//! - [`voucher`] - Voucher series lanes and document number formatting
//! - [`sale`] - Sale aggregate and its lifecycle state machine
//! - [`movement`] - Immutable inventory movement ledger entries
//! - [`error`] - Domain error types
//! - [`validation`] - Business rule validation
//!
//! ## Design Principles
//!
//! 1. **Pure Functions**: Every function is deterministic - same input = same output
//! 2. **No I/O**: Database, network, file system access is FORBIDDEN here
//! 3. **Integer Money**: All monetary values are in cents (i64) to avoid float errors
//! 4. **Explicit Errors**: All errors are typed, never strings or panics
//!
//! ## Example Usage
//!
//! ```rust
//! use tienda_core::voucher::format_document_number;
//!
//! // The document number format is a fixed external contract
//! assert_eq!(format_document_number("B001", 1), "B001-00000001");
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod money;
pub mod movement;
pub mod sale;
pub mod types;
pub mod validation;
pub mod voucher;

// =============================================================================
// Re-exports for Convenience
// =============================================================================
// These allow users to do `use tienda_core::Money` instead of
// `use tienda_core::money::Money`

pub use error::{CoreError, CoreResult, ValidationError};
pub use money::Money;
pub use movement::{InventoryMovement, NewMovement};
pub use sale::{NewSale, NewSaleLine, Sale, SaleDetail};
pub use types::*;
pub use voucher::{NextNumber, VoucherSeries};

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Zero-padding width of the numeric part of a document number.
///
/// ## Why a constant?
/// `B001-00000001` is the human-visible document number stamped on receipts
/// and invoices. The width is part of the external contract and must never
/// change for already-issued documents.
pub const DOCUMENT_NUMBER_WIDTH: usize = 8;

/// Maximum line items allowed on a single sale.
///
/// ## Business Reason
/// Prevents runaway sales and keeps the completion transaction bounded.
pub const MAX_SALE_LINES: usize = 200;

/// Maximum quantity of a single line item.
///
/// ## Business Reason
/// Prevents accidental over-ordering (e.g., typing 1000 instead of 10).
pub const MAX_LINE_QUANTITY: i64 = 9_999;
