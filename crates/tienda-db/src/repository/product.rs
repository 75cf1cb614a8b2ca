//! # Product Repository
//!
//! Database operations for products.
//!
//! ## Stock Update Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │  ❌ WRONG: Absolute update (loses concurrent writes)                │
//! │     read stock → compute in memory → UPDATE SET current_stock = 7   │
//! │                                                                     │
//! │  ✅ CORRECT: Guarded delta update, one statement                    │
//! │     UPDATE products                                                 │
//! │     SET current_stock = current_stock - ?                           │
//! │     WHERE id = ? AND is_active = 1 AND current_stock >= ?           │
//! │                                                                     │
//! │  Two sales on the same product serialize inside the store:          │
//! │  stock 10, sale of 3, sale of 4 → 3 left, never a lost update.      │
//! │  An unaffected row means the precondition failed; the caller        │
//! │  re-reads once to produce the precise typed failure.                │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::{DbError, DbResult};
use tienda_core::Product;

const SELECT_COLUMNS: &str =
    "id, store_id, sku, name, price_cents, current_stock, is_active, created_at, updated_at";

/// Outcome of a guarded stock decrement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StockTake {
    /// Decrement applied; carries (previous_stock, new_stock).
    Taken { previous: i64, new: i64 },
    /// No such product.
    Missing,
    /// Product exists but is deactivated.
    Inactive,
    /// Product active but under-stocked; carries the available level.
    Insufficient { available: i64 },
}

/// Repository for product database operations.
#[derive(Debug, Clone)]
pub struct ProductRepository {
    pool: SqlitePool,
}

impl ProductRepository {
    /// Creates a new ProductRepository.
    pub fn new(pool: SqlitePool) -> Self {
        ProductRepository { pool }
    }

    /// Gets a product by its ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Product>> {
        let mut conn = self.pool.acquire().await?;
        Self::get_by_id_on(&mut conn, id).await
    }

    /// Transactional variant of [`get_by_id`](Self::get_by_id).
    pub async fn get_by_id_on(conn: &mut SqliteConnection, id: &str) -> DbResult<Option<Product>> {
        let product = sqlx::query_as::<_, Product>(&format!(
            "SELECT {SELECT_COLUMNS} FROM products WHERE id = ?1"
        ))
        .bind(id)
        .fetch_optional(conn)
        .await?;

        Ok(product)
    }

    /// Gets a product by its SKU within a store.
    pub async fn get_by_sku(&self, store_id: &str, sku: &str) -> DbResult<Option<Product>> {
        let product = sqlx::query_as::<_, Product>(&format!(
            "SELECT {SELECT_COLUMNS} FROM products WHERE store_id = ?1 AND sku = ?2"
        ))
        .bind(store_id)
        .bind(sku)
        .fetch_optional(&self.pool)
        .await?;

        Ok(product)
    }

    /// Lists active products of a store, sorted by name.
    pub async fn list_active(&self, store_id: &str, limit: u32) -> DbResult<Vec<Product>> {
        let products = sqlx::query_as::<_, Product>(&format!(
            r#"
            SELECT {SELECT_COLUMNS}
            FROM products
            WHERE store_id = ?1 AND is_active = 1
            ORDER BY name
            LIMIT ?2
            "#
        ))
        .bind(store_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(products)
    }

    /// Inserts a new product.
    ///
    /// ## Returns
    /// * `Err(DbError::UniqueViolation)` - SKU already exists in the store
    pub async fn insert(&self, product: &Product) -> DbResult<()> {
        debug!(sku = %product.sku, "Inserting product");

        sqlx::query(
            r#"
            INSERT INTO products (
                id, store_id, sku, name, price_cents,
                current_stock, is_active, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
        )
        .bind(&product.id)
        .bind(&product.store_id)
        .bind(&product.sku)
        .bind(&product.name)
        .bind(product.price_cents)
        .bind(product.current_stock)
        .bind(product.is_active)
        .bind(product.created_at)
        .bind(product.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Updates a product's descriptive fields and price.
    ///
    /// Stock is deliberately NOT written here: stock only changes through
    /// the guarded delta operations below.
    pub async fn update(&self, product: &Product) -> DbResult<()> {
        debug!(id = %product.id, "Updating product");

        let now = Utc::now();

        let result = sqlx::query(
            r#"
            UPDATE products SET
                sku = ?2,
                name = ?3,
                price_cents = ?4,
                is_active = ?5,
                updated_at = ?6
            WHERE id = ?1
            "#,
        )
        .bind(&product.id)
        .bind(&product.sku)
        .bind(&product.name)
        .bind(product.price_cents)
        .bind(product.is_active)
        .bind(now)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Product", &product.id));
        }

        Ok(())
    }

    /// Soft-deletes a product by setting is_active = false.
    ///
    /// ## Why Soft Delete?
    /// Historical sales and movements still reference the product.
    pub async fn soft_delete(&self, id: &str) -> DbResult<()> {
        debug!(id = %id, "Soft-deleting product");

        let now = Utc::now();

        let result = sqlx::query(
            "UPDATE products SET is_active = 0, updated_at = ?2 WHERE id = ?1",
        )
        .bind(id)
        .bind(now)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Product", id));
        }

        Ok(())
    }

    /// Takes stock from a product with a guarded delta update.
    ///
    /// The decrement and its precondition are one statement; when the row
    /// is unaffected, one follow-up read classifies the reason so the
    /// caller can surface the precise typed failure.
    pub async fn take_stock_on(
        conn: &mut SqliteConnection,
        id: &str,
        quantity: i64,
    ) -> DbResult<StockTake> {
        debug!(id = %id, quantity = %quantity, "Taking stock");

        let now = Utc::now();

        let updated: Option<(i64,)> = sqlx::query_as(
            r#"
            UPDATE products
            SET current_stock = current_stock - ?2,
                updated_at = ?3
            WHERE id = ?1 AND is_active = 1 AND current_stock >= ?2
            RETURNING current_stock
            "#,
        )
        .bind(id)
        .bind(quantity)
        .bind(now)
        .fetch_optional(&mut *conn)
        .await?;

        if let Some((new,)) = updated {
            return Ok(StockTake::Taken {
                previous: new + quantity,
                new,
            });
        }

        // Precondition failed: classify why
        match Self::get_by_id_on(conn, id).await? {
            None => Ok(StockTake::Missing),
            Some(p) if !p.is_active => Ok(StockTake::Inactive),
            Some(p) => Ok(StockTake::Insufficient {
                available: p.current_stock,
            }),
        }
    }

    /// Gives stock back to a product (compensating returns).
    ///
    /// Returns `(previous_stock, new_stock)`, or `None` if the product no
    /// longer exists. Restores succeed even for deactivated products: a
    /// refund must not strand stock just because the item was retired.
    pub async fn give_stock_on(
        conn: &mut SqliteConnection,
        id: &str,
        quantity: i64,
    ) -> DbResult<Option<(i64, i64)>> {
        debug!(id = %id, quantity = %quantity, "Restoring stock");

        let now = Utc::now();

        let updated: Option<(i64,)> = sqlx::query_as(
            r#"
            UPDATE products
            SET current_stock = current_stock + ?2,
                updated_at = ?3
            WHERE id = ?1
            RETURNING current_stock
            "#,
        )
        .bind(id)
        .bind(quantity)
        .bind(now)
        .fetch_optional(conn)
        .await?;

        Ok(updated.map(|(new,)| (new - quantity, new)))
    }

    /// Counts active products in a store (for diagnostics).
    pub async fn count(&self, store_id: &str) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM products WHERE store_id = ?1 AND is_active = 1",
        )
        .bind(store_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};

    async fn setup() -> Database {
        Database::new(DbConfig::in_memory()).await.unwrap()
    }

    fn product(id: &str, sku: &str, stock: i64) -> Product {
        let now = Utc::now();
        Product {
            id: id.to_string(),
            store_id: "store-1".to_string(),
            sku: sku.to_string(),
            name: format!("Product {sku}"),
            price_cents: 500,
            current_stock: stock,
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn test_insert_and_get() {
        let db = setup().await;
        let repo = db.products();

        repo.insert(&product("p-1", "COKE-330", 10)).await.unwrap();

        let got = repo.get_by_id("p-1").await.unwrap().unwrap();
        assert_eq!(got.sku, "COKE-330");
        assert_eq!(got.current_stock, 10);

        let by_sku = repo.get_by_sku("store-1", "COKE-330").await.unwrap();
        assert!(by_sku.is_some());
    }

    #[tokio::test]
    async fn test_duplicate_sku_rejected() {
        let db = setup().await;
        let repo = db.products();

        repo.insert(&product("p-1", "COKE-330", 10)).await.unwrap();
        let err = repo
            .insert(&product("p-2", "COKE-330", 5))
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::UniqueViolation { .. }));
    }

    #[tokio::test]
    async fn test_take_stock_paths() {
        let db = setup().await;
        let repo = db.products();
        repo.insert(&product("p-1", "COKE-330", 10)).await.unwrap();

        let mut conn = db.pool().acquire().await.unwrap();

        let taken = ProductRepository::take_stock_on(&mut conn, "p-1", 4)
            .await
            .unwrap();
        assert_eq!(taken, StockTake::Taken { previous: 10, new: 6 });

        let insufficient = ProductRepository::take_stock_on(&mut conn, "p-1", 7)
            .await
            .unwrap();
        assert_eq!(insufficient, StockTake::Insufficient { available: 6 });

        let missing = ProductRepository::take_stock_on(&mut conn, "ghost", 1)
            .await
            .unwrap();
        assert_eq!(missing, StockTake::Missing);

        drop(conn);
        repo.soft_delete("p-1").await.unwrap();

        let mut conn = db.pool().acquire().await.unwrap();
        let inactive = ProductRepository::take_stock_on(&mut conn, "p-1", 1)
            .await
            .unwrap();
        assert_eq!(inactive, StockTake::Inactive);
    }

    #[tokio::test]
    async fn test_give_stock_back() {
        let db = setup().await;
        let repo = db.products();
        repo.insert(&product("p-1", "COKE-330", 6)).await.unwrap();

        let mut conn = db.pool().acquire().await.unwrap();
        let restored = ProductRepository::give_stock_on(&mut conn, "p-1", 4)
            .await
            .unwrap();
        assert_eq!(restored, Some((6, 10)));

        let ghost = ProductRepository::give_stock_on(&mut conn, "ghost", 4)
            .await
            .unwrap();
        assert_eq!(ghost, None);
    }
}
