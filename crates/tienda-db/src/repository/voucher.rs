//! # Voucher Series Repository
//!
//! Database operations for voucher numbering lanes.
//!
//! ## The Atomic Increment
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │  THE LOST-UPDATE RACE (what we must never do)                       │
//! │                                                                     │
//! │  Caller A: SELECT current_number  → 41                              │
//! │  Caller B: SELECT current_number  → 41        ← same pre-value!     │
//! │  Caller A: UPDATE ... SET current_number = 42                       │
//! │  Caller B: UPDATE ... SET current_number = 42 ← duplicate issued,   │
//! │                                                 one increment lost  │
//! │                                                                     │
//! │  OUR RULE: the increment is ONE statement, applied by the store:    │
//! │                                                                     │
//! │    UPDATE voucher_series                                            │
//! │    SET current_number = current_number + 1                          │
//! │    WHERE id = ?                                                     │
//! │    RETURNING current_number                                         │
//! │                                                                     │
//! │  SQLite serializes writers, so two concurrent calls always see      │
//! │  distinct post-increment values. No retry loop is needed because    │
//! │  there is no optimistic read to invalidate.                         │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::{DbError, DbResult};
use tienda_core::{VoucherSeries, VoucherType};

const SELECT_COLUMNS: &str =
    "id, store_id, voucher_type, series, current_number, created_at, updated_at";

/// Repository for voucher series database operations.
#[derive(Debug, Clone)]
pub struct VoucherSeriesRepository {
    pool: SqlitePool,
}

impl VoucherSeriesRepository {
    /// Creates a new VoucherSeriesRepository.
    pub fn new(pool: SqlitePool) -> Self {
        VoucherSeriesRepository { pool }
    }

    /// Inserts a new lane.
    ///
    /// ## Returns
    /// * `Err(DbError::UniqueViolation)` - the `(store, type, series)`
    ///   triple already has a lane
    pub async fn insert(&self, series: &VoucherSeries) -> DbResult<()> {
        debug!(id = %series.id, lane = %series.lane_key(), "Inserting voucher series");

        sqlx::query(
            r#"
            INSERT INTO voucher_series (
                id, store_id, voucher_type, series, current_number,
                created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
        )
        .bind(&series.id)
        .bind(&series.store_id)
        .bind(series.voucher_type)
        .bind(&series.series)
        .bind(series.current_number)
        .bind(series.created_at)
        .bind(series.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Gets a lane by its ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<VoucherSeries>> {
        let series = sqlx::query_as::<_, VoucherSeries>(&format!(
            "SELECT {SELECT_COLUMNS} FROM voucher_series WHERE id = ?1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(series)
    }

    /// Finds the lane for a `(store, voucher type, series)` triple.
    pub async fn find_lane(
        &self,
        store_id: &str,
        voucher_type: VoucherType,
        series: &str,
    ) -> DbResult<Option<VoucherSeries>> {
        let lane = sqlx::query_as::<_, VoucherSeries>(&format!(
            r#"
            SELECT {SELECT_COLUMNS}
            FROM voucher_series
            WHERE store_id = ?1 AND voucher_type = ?2 AND series = ?3
            "#
        ))
        .bind(store_id)
        .bind(voucher_type)
        .bind(series)
        .fetch_optional(&self.pool)
        .await?;

        Ok(lane)
    }

    /// Lists all lanes of a store, ordered by type and series code.
    pub async fn list_by_store(&self, store_id: &str) -> DbResult<Vec<VoucherSeries>> {
        let lanes = sqlx::query_as::<_, VoucherSeries>(&format!(
            r#"
            SELECT {SELECT_COLUMNS}
            FROM voucher_series
            WHERE store_id = ?1
            ORDER BY voucher_type, series
            "#
        ))
        .bind(store_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(lanes)
    }

    /// Updates a lane's mutable fields (type, series code, counter).
    ///
    /// The caller is responsible for having re-checked lane uniqueness when
    /// the key fields change; the unique index is the backstop.
    pub async fn update(&self, series: &VoucherSeries) -> DbResult<()> {
        debug!(id = %series.id, "Updating voucher series");

        let now = Utc::now();

        let result = sqlx::query(
            r#"
            UPDATE voucher_series SET
                voucher_type = ?2,
                series = ?3,
                current_number = ?4,
                updated_at = ?5
            WHERE id = ?1
            "#,
        )
        .bind(&series.id)
        .bind(series.voucher_type)
        .bind(&series.series)
        .bind(series.current_number)
        .bind(now)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("VoucherSeries", &series.id));
        }

        Ok(())
    }

    /// Hard-deletes a lane.
    ///
    /// ## Why Hard Delete?
    /// A lane has no transactional history dependents in this subsystem;
    /// issued documents carry their stamped number and do not point back.
    pub async fn delete(&self, id: &str) -> DbResult<()> {
        debug!(id = %id, "Deleting voucher series");

        let result = sqlx::query("DELETE FROM voucher_series WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("VoucherSeries", id));
        }

        Ok(())
    }

    /// Advances a lane's counter by exactly one, atomically, and returns
    /// the new value. `None` if the lane does not exist.
    ///
    /// This is the only code path that writes `current_number` outside of
    /// explicit field updates. Single statement, applied by the store (see
    /// module docs).
    pub async fn increment_on(conn: &mut SqliteConnection, id: &str) -> DbResult<Option<i64>> {
        let now = Utc::now();

        let number: Option<i64> = sqlx::query_scalar(
            r#"
            UPDATE voucher_series
            SET current_number = current_number + 1,
                updated_at = ?2
            WHERE id = ?1
            RETURNING current_number
            "#,
        )
        .bind(id)
        .bind(now)
        .fetch_optional(conn)
        .await?;

        Ok(number)
    }

    /// Pool-level single increment (outside any surrounding transaction).
    pub async fn increment(&self, id: &str) -> DbResult<Option<i64>> {
        let mut conn = self.pool.acquire().await?;
        Self::increment_on(&mut conn, id).await
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use chrono::Utc;

    async fn setup() -> Database {
        Database::new(DbConfig::in_memory()).await.unwrap()
    }

    fn lane(id: &str, series: &str, start: i64) -> VoucherSeries {
        VoucherSeries::new(id, "store-1", VoucherType::Receipt, series, start, Utc::now())
            .unwrap()
    }

    #[tokio::test]
    async fn test_insert_and_get() {
        let db = setup().await;
        let repo = db.voucher_series();

        repo.insert(&lane("vs-1", "B001", 1)).await.unwrap();

        let got = repo.get_by_id("vs-1").await.unwrap().unwrap();
        assert_eq!(got.series, "B001");
        assert_eq!(got.current_number, 1);

        let found = repo
            .find_lane("store-1", VoucherType::Receipt, "B001")
            .await
            .unwrap();
        assert!(found.is_some());

        assert!(repo.get_by_id("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_lane_uniqueness_enforced() {
        let db = setup().await;
        let repo = db.voucher_series();

        repo.insert(&lane("vs-1", "B001", 1)).await.unwrap();

        let err = repo.insert(&lane("vs-2", "B001", 1)).await.unwrap_err();
        assert!(matches!(err, DbError::UniqueViolation { .. }));

        // Same code under a different voucher type is a different lane
        let invoice_lane = VoucherSeries::new(
            "vs-3",
            "store-1",
            VoucherType::Invoice,
            "B001",
            1,
            Utc::now(),
        )
        .unwrap();
        repo.insert(&invoice_lane).await.unwrap();
    }

    #[tokio::test]
    async fn test_increment_advances_by_one() {
        let db = setup().await;
        let repo = db.voucher_series();

        repo.insert(&lane("vs-1", "B001", 1)).await.unwrap();

        assert_eq!(repo.increment("vs-1").await.unwrap(), Some(2));
        assert_eq!(repo.increment("vs-1").await.unwrap(), Some(3));
        assert_eq!(repo.increment("missing").await.unwrap(), None);

        let got = repo.get_by_id("vs-1").await.unwrap().unwrap();
        assert_eq!(got.current_number, 3);
    }

    #[tokio::test]
    async fn test_delete_is_hard() {
        let db = setup().await;
        let repo = db.voucher_series();

        repo.insert(&lane("vs-1", "B001", 1)).await.unwrap();
        repo.delete("vs-1").await.unwrap();

        assert!(repo.get_by_id("vs-1").await.unwrap().is_none());
        assert!(matches!(
            repo.delete("vs-1").await.unwrap_err(),
            DbError::NotFound { .. }
        ));
    }
}
