//! # Inventory Movements
//!
//! An inventory movement is an immutable audit record: a point-in-time fact
//! about a stock change and its cause.
//!
//! ## Append-Only Ledger
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │  products.current_stock        inventory_movements                  │
//! │                                                                     │
//! │  10 ──(sale of 3)──► 7         EXIT   qty=3  prev=10 new=7  SALE   │
//! │   7 ──(refund)─────► 10        RETURN qty=3  prev=7  new=10 RETURN │
//! │                                                                     │
//! │  The EXIT row is never edited or deleted; the reversal is its own   │
//! │  fact. Replaying the ledger reconstructs every stock level.         │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! `new_stock` is derived deterministically from `movement_type`,
//! `previous_stock` and `quantity` at creation time (see
//! [`MovementType::apply`]) and never mutated afterwards.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{CoreResult, ValidationError};
use crate::types::{MovementType, ReferenceType};

// =============================================================================
// Inventory Movement
// =============================================================================

/// One immutable ledger entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct InventoryMovement {
    pub id: String,
    pub product_id: String,
    /// User who caused the movement.
    pub user_id: String,
    pub movement_type: MovementType,
    /// Moved units. Always > 0; the direction lives in `movement_type`.
    pub quantity: i64,
    /// Stock level immediately before the movement.
    pub previous_stock: i64,
    /// Stock level immediately after. Derived, never mutated.
    pub new_stock: i64,
    pub reason: Option<String>,
    /// Weak back-reference to the causing document (e.g. a sale id).
    pub reference_id: Option<String>,
    pub reference_type: Option<ReferenceType>,
    pub moved_at: DateTime<Utc>,
}

/// Input for recording a movement.
#[derive(Debug, Clone)]
pub struct NewMovement {
    pub product_id: String,
    pub user_id: String,
    pub movement_type: MovementType,
    pub quantity: i64,
    pub previous_stock: i64,
    pub reason: Option<String>,
    pub reference_id: Option<String>,
    pub reference_type: Option<ReferenceType>,
}

impl InventoryMovement {
    /// Records a movement, deriving `new_stock` from the inputs.
    ///
    /// ## Rules
    /// - `quantity > 0` (a zero or negative movement is meaningless)
    /// - outbound movements (Exit/Transfer/Loss) must not drive stock
    ///   below zero
    pub fn record(
        id: impl Into<String>,
        input: NewMovement,
        now: DateTime<Utc>,
    ) -> CoreResult<Self> {
        if input.quantity <= 0 {
            return Err(ValidationError::MustBePositive {
                field: "quantity".to_string(),
            }
            .into());
        }

        let new_stock = input.movement_type.apply(input.previous_stock, input.quantity);
        if new_stock < 0 {
            return Err(ValidationError::OutOfRange {
                field: "quantity".to_string(),
                min: 0,
                max: input.previous_stock,
            }
            .into());
        }

        Ok(InventoryMovement {
            id: id.into(),
            product_id: input.product_id,
            user_id: input.user_id,
            movement_type: input.movement_type,
            quantity: input.quantity,
            previous_stock: input.previous_stock,
            new_stock,
            reason: input.reason,
            reference_id: input.reference_id,
            reference_type: input.reference_type,
            moved_at: now,
        })
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn input(movement_type: MovementType, quantity: i64, previous: i64) -> NewMovement {
        NewMovement {
            product_id: "p-1".to_string(),
            user_id: "user-1".to_string(),
            movement_type,
            quantity,
            previous_stock: previous,
            reason: None,
            reference_id: Some("s-1".to_string()),
            reference_type: Some(ReferenceType::Sale),
        }
    }

    #[test]
    fn test_exit_derives_new_stock() {
        let m = InventoryMovement::record("m-1", input(MovementType::Exit, 3, 10), Utc::now())
            .unwrap();
        assert_eq!(m.previous_stock, 10);
        assert_eq!(m.new_stock, 7);
    }

    #[test]
    fn test_return_derives_new_stock() {
        let m = InventoryMovement::record("m-1", input(MovementType::Return, 3, 7), Utc::now())
            .unwrap();
        assert_eq!(m.new_stock, 10);
    }

    #[test]
    fn test_adjustment_sets_counted_quantity() {
        let m =
            InventoryMovement::record("m-1", input(MovementType::Adjustment, 4, 10), Utc::now())
                .unwrap();
        assert_eq!(m.new_stock, 4);
    }

    #[test]
    fn test_rejects_nonpositive_quantity() {
        assert!(
            InventoryMovement::record("m-1", input(MovementType::Exit, 0, 10), Utc::now())
                .is_err()
        );
        assert!(
            InventoryMovement::record("m-1", input(MovementType::Exit, -2, 10), Utc::now())
                .is_err()
        );
    }

    #[test]
    fn test_rejects_negative_outcome() {
        assert!(
            InventoryMovement::record("m-1", input(MovementType::Exit, 11, 10), Utc::now())
                .is_err()
        );
        assert!(
            InventoryMovement::record("m-1", input(MovementType::Loss, 11, 10), Utc::now())
                .is_err()
        );
    }
}
