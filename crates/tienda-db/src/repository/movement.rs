//! # Inventory Movement Repository
//!
//! Append-only access to the inventory movement ledger. There is no update
//! or delete here on purpose: a movement is a point-in-time fact, and
//! reversals are recorded as new facts.

use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::DbResult;
use tienda_core::{InventoryMovement, ReferenceType};

const SELECT_COLUMNS: &str = "id, product_id, user_id, movement_type, quantity, \
     previous_stock, new_stock, reason, reference_id, reference_type, moved_at";

/// Repository for the inventory movement ledger.
#[derive(Debug, Clone)]
pub struct MovementRepository {
    pool: SqlitePool,
}

impl MovementRepository {
    /// Creates a new MovementRepository.
    pub fn new(pool: SqlitePool) -> Self {
        MovementRepository { pool }
    }

    /// Appends a movement, on the caller's transaction.
    pub async fn insert_on(
        conn: &mut SqliteConnection,
        movement: &InventoryMovement,
    ) -> DbResult<()> {
        debug!(
            id = %movement.id,
            product_id = %movement.product_id,
            movement_type = ?movement.movement_type,
            quantity = %movement.quantity,
            "Appending inventory movement"
        );

        sqlx::query(
            r#"
            INSERT INTO inventory_movements (
                id, product_id, user_id, movement_type, quantity,
                previous_stock, new_stock, reason,
                reference_id, reference_type, moved_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            "#,
        )
        .bind(&movement.id)
        .bind(&movement.product_id)
        .bind(&movement.user_id)
        .bind(movement.movement_type)
        .bind(movement.quantity)
        .bind(movement.previous_stock)
        .bind(movement.new_stock)
        .bind(&movement.reason)
        .bind(&movement.reference_id)
        .bind(movement.reference_type)
        .bind(movement.moved_at)
        .execute(conn)
        .await?;

        Ok(())
    }

    /// Appends a movement outside any surrounding transaction.
    pub async fn insert(&self, movement: &InventoryMovement) -> DbResult<()> {
        let mut conn = self.pool.acquire().await?;
        Self::insert_on(&mut conn, movement).await
    }

    /// Finds movements by their causing document, oldest first.
    ///
    /// Used by the compensating reversal to walk a sale's EXIT movements.
    pub async fn find_by_reference(
        &self,
        reference_id: &str,
        reference_type: ReferenceType,
    ) -> DbResult<Vec<InventoryMovement>> {
        let mut conn = self.pool.acquire().await?;
        Self::find_by_reference_on(&mut conn, reference_id, reference_type).await
    }

    /// Transactional variant of
    /// [`find_by_reference`](Self::find_by_reference).
    pub async fn find_by_reference_on(
        conn: &mut SqliteConnection,
        reference_id: &str,
        reference_type: ReferenceType,
    ) -> DbResult<Vec<InventoryMovement>> {
        let movements = sqlx::query_as::<_, InventoryMovement>(&format!(
            r#"
            SELECT {SELECT_COLUMNS}
            FROM inventory_movements
            WHERE reference_id = ?1 AND reference_type = ?2
            ORDER BY moved_at, id
            "#
        ))
        .bind(reference_id)
        .bind(reference_type)
        .fetch_all(conn)
        .await?;

        Ok(movements)
    }

    /// Lists the movement history of a product, newest first.
    pub async fn list_by_product(
        &self,
        product_id: &str,
        limit: u32,
    ) -> DbResult<Vec<InventoryMovement>> {
        let movements = sqlx::query_as::<_, InventoryMovement>(&format!(
            r#"
            SELECT {SELECT_COLUMNS}
            FROM inventory_movements
            WHERE product_id = ?1
            ORDER BY moved_at DESC, id DESC
            LIMIT ?2
            "#
        ))
        .bind(product_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(movements)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
