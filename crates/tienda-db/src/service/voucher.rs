//! # Voucher Series Allocator
//!
//! Use-cases for managing numbering lanes and handing out document
//! numbers exactly once.
//!
//! ## Allocation Under Concurrency
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │  Checkout A ─┐                                                      │
//! │              ├──► UPDATE ... + 1 RETURNING ──► 42 ──► B001-00000042 │
//! │  Checkout B ─┘                                 43 ──► B001-00000043 │
//! │                                                                     │
//! │  The store applies the increment; the service never computes the    │
//! │  next number in application memory. N successful increments always  │
//! │  hand out exactly {start+1, ..., start+N}: no duplicates, no gaps,  │
//! │  no lost updates.                                                   │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```

use sqlx::{Sqlite, SqliteConnection, SqlitePool, Transaction};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{DbError, ServiceResult};
use crate::repository::voucher::VoucherSeriesRepository;
use tienda_core::voucher::format_document_number;
use tienda_core::{CoreError, NextNumber, ValidationError, VoucherSeries, VoucherType};

// =============================================================================
// Update Input
// =============================================================================

/// Partial update for a lane. `None` fields are left unchanged.
#[derive(Debug, Clone, Default)]
pub struct UpdateSeries {
    pub voucher_type: Option<VoucherType>,
    pub series: Option<String>,
    pub current_number: Option<i64>,
}

// =============================================================================
// Service
// =============================================================================

/// The voucher series allocator.
#[derive(Debug, Clone)]
pub struct VoucherSeriesService {
    pool: SqlitePool,
}

impl VoucherSeriesService {
    /// Creates a new VoucherSeriesService.
    pub fn new(pool: SqlitePool) -> Self {
        VoucherSeriesService { pool }
    }

    fn repo(&self) -> VoucherSeriesRepository {
        VoucherSeriesRepository::new(self.pool.clone())
    }

    /// Opens a write transaction holding the writer lock from the start.
    ///
    /// SQLite cannot upgrade a read snapshot to a write lock: a deferred
    /// transaction that reads before its first write fails with an
    /// unretried "database is locked" once another writer commits in
    /// between. `BEGIN IMMEDIATE` takes the lock up front, so concurrent
    /// write transactions queue on the busy timeout instead.
    async fn begin_write(&self) -> ServiceResult<Transaction<'static, Sqlite>> {
        Ok(self
            .pool
            .begin_with("BEGIN IMMEDIATE")
            .await
            .map_err(DbError::from)?)
    }

    /// Creates a numbering lane.
    ///
    /// ## Failures
    /// * `AlreadyExists` - the `(store, type, series)` triple already has a
    ///   lane (pre-checked; the unique index is the backstop for races)
    /// * `Validation` - bad series code or `starting_number < 1`
    pub async fn create_series(
        &self,
        store_id: &str,
        voucher_type: VoucherType,
        series: &str,
        starting_number: i64,
    ) -> ServiceResult<VoucherSeries> {
        let repo = self.repo();

        if let Some(existing) = repo.find_lane(store_id, voucher_type, series).await? {
            return Err(CoreError::already_exists("VoucherSeries", existing.lane_key()).into());
        }

        let lane = VoucherSeries::new(
            Uuid::new_v4().to_string(),
            store_id,
            voucher_type,
            series,
            starting_number,
            chrono::Utc::now(),
        )?;

        match repo.insert(&lane).await {
            Ok(()) => {}
            // Two creations raced past the pre-check; report the business
            // conflict, not an infrastructure failure
            Err(DbError::UniqueViolation { .. }) => {
                return Err(CoreError::already_exists("VoucherSeries", lane.lane_key()).into());
            }
            Err(e) => return Err(e.into()),
        }

        info!(id = %lane.id, lane = %lane.lane_key(), start = lane.current_number, "Voucher series created");
        Ok(lane)
    }

    /// Read-only preview of a lane's position. Mutates nothing.
    pub async fn next_number(&self, series_id: &str) -> ServiceResult<NextNumber> {
        let lane = self
            .repo()
            .get_by_id(series_id)
            .await?
            .ok_or_else(|| CoreError::not_found("VoucherSeries", series_id))?;

        Ok(lane.peek())
    }

    /// Gets a lane by id.
    pub async fn get_series(&self, series_id: &str) -> ServiceResult<VoucherSeries> {
        let lane = self
            .repo()
            .get_by_id(series_id)
            .await?
            .ok_or_else(|| CoreError::not_found("VoucherSeries", series_id))?;
        Ok(lane)
    }

    /// Lists the lanes of a store.
    pub async fn list_series(&self, store_id: &str) -> ServiceResult<Vec<VoucherSeries>> {
        Ok(self.repo().list_by_store(store_id).await?)
    }

    /// Advances a lane by exactly `n`, applied as `n` sequential
    /// single-unit increments inside one transaction, and returns the
    /// updated lane.
    ///
    /// Bulk jumps (`current_number + n` in one statement) are deliberately
    /// not offered: each step re-checks the lane invariants.
    pub async fn increment_by(&self, series_id: &str, n: i64) -> ServiceResult<VoucherSeries> {
        if n < 1 {
            return Err(ValidationError::MustBePositive {
                field: "increment".to_string(),
            }
            .into());
        }

        let mut tx = self.begin_write().await?;

        for _ in 0..n {
            let advanced = VoucherSeriesRepository::increment_on(&mut tx, series_id).await?;
            if advanced.is_none() {
                // Rolls back the partial steps
                return Err(CoreError::not_found("VoucherSeries", series_id).into());
            }
        }

        tx.commit().await.map_err(DbError::from)?;

        let lane = self.get_series(series_id).await?;
        debug!(id = %series_id, n = n, current = lane.current_number, "Lane advanced");
        Ok(lane)
    }

    /// Updates a lane's type, series code or counter.
    ///
    /// When the lane key changes, uniqueness of the new
    /// `(store, type, series)` triple is re-checked, same as on creation.
    pub async fn update_series(
        &self,
        series_id: &str,
        update: UpdateSeries,
    ) -> ServiceResult<VoucherSeries> {
        let repo = self.repo();

        let mut lane = repo
            .get_by_id(series_id)
            .await?
            .ok_or_else(|| CoreError::not_found("VoucherSeries", series_id))?;

        if let Some(voucher_type) = update.voucher_type {
            lane.voucher_type = voucher_type;
        }
        if let Some(series) = update.series {
            tienda_core::validation::validate_series_code(&series)?;
            lane.series = series.trim().to_string();
        }
        if let Some(current_number) = update.current_number {
            if current_number < 1 {
                return Err(ValidationError::OutOfRange {
                    field: "current_number".to_string(),
                    min: 1,
                    max: i64::MAX,
                }
                .into());
            }
            lane.current_number = current_number;
        }

        // Re-check uniqueness against the possibly re-keyed triple
        if let Some(existing) = repo
            .find_lane(&lane.store_id, lane.voucher_type, &lane.series)
            .await?
        {
            if existing.id != lane.id {
                return Err(
                    CoreError::already_exists("VoucherSeries", lane.lane_key()).into(),
                );
            }
        }

        match repo.update(&lane).await {
            Ok(()) => {}
            Err(DbError::UniqueViolation { .. }) => {
                return Err(CoreError::already_exists("VoucherSeries", lane.lane_key()).into());
            }
            Err(DbError::NotFound { .. }) => {
                return Err(CoreError::not_found("VoucherSeries", series_id).into());
            }
            Err(e) => return Err(e.into()),
        }

        info!(id = %lane.id, lane = %lane.lane_key(), "Voucher series updated");
        Ok(lane)
    }

    /// Hard-deletes a lane.
    pub async fn delete_series(&self, series_id: &str) -> ServiceResult<()> {
        match self.repo().delete(series_id).await {
            Ok(()) => {
                info!(id = %series_id, "Voucher series deleted");
                Ok(())
            }
            Err(DbError::NotFound { .. }) => {
                Err(CoreError::not_found("VoucherSeries", series_id).into())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Allocates the next number of a lane on the caller's transaction and
    /// returns `(number, formatted document number)`.
    ///
    /// Used by sale creation so the stamp commits or rolls back with the
    /// sale itself.
    pub async fn allocate_on(
        conn: &mut SqliteConnection,
        lane: &VoucherSeries,
    ) -> ServiceResult<(i64, String)> {
        let number = VoucherSeriesRepository::increment_on(conn, &lane.id)
            .await?
            .ok_or_else(|| CoreError::not_found("VoucherSeries", &lane.id))?;

        Ok((number, format_document_number(&lane.series, number)))
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ServiceError;
    use crate::pool::{Database, DbConfig};
    use std::collections::HashSet;

    async fn setup() -> Database {
        Database::new(DbConfig::in_memory()).await.unwrap()
    }

    #[tokio::test]
    async fn test_create_series_conflicts() {
        let db = setup().await;
        let svc = db.voucher_service();

        let lane = svc
            .create_series("store-1", VoucherType::Receipt, "B001", 1)
            .await
            .unwrap();
        assert_eq!(lane.current_number, 1);

        let err = svc
            .create_series("store-1", VoucherType::Receipt, "B001", 1)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ServiceError::Domain(CoreError::AlreadyExists { .. })
        ));

        // Other store, same code: its own lane
        svc.create_series("store-2", VoucherType::Receipt, "B001", 1)
            .await
            .unwrap();

        // Starting number below 1 is invalid
        assert!(svc
            .create_series("store-1", VoucherType::Invoice, "F001", 0)
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_next_number_is_read_only() {
        let db = setup().await;
        let svc = db.voucher_service();

        let lane = svc
            .create_series("store-1", VoucherType::Receipt, "B001", 41)
            .await
            .unwrap();

        let preview = svc.next_number(&lane.id).await.unwrap();
        assert_eq!(preview.current_number, 41);
        assert_eq!(preview.next_number, 42);
        assert_eq!(preview.formatted_number, "B001-00000041");
        assert_eq!(preview.next_formatted_number, "B001-00000042");

        // Previewing twice returns the same thing: nothing moved
        let again = svc.next_number(&lane.id).await.unwrap();
        assert_eq!(again, preview);

        let err = svc.next_number("ghost").await.unwrap_err();
        assert!(matches!(
            err,
            ServiceError::Domain(CoreError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_increment_by_bulk() {
        let db = setup().await;
        let svc = db.voucher_service();

        let lane = svc
            .create_series("store-1", VoucherType::Receipt, "B001", 1)
            .await
            .unwrap();

        let advanced = svc.increment_by(&lane.id, 5).await.unwrap();
        assert_eq!(advanced.current_number, 6);

        assert!(svc.increment_by(&lane.id, 0).await.is_err());
        assert!(matches!(
            svc.increment_by("ghost", 1).await.unwrap_err(),
            ServiceError::Domain(CoreError::NotFound { .. })
        ));
    }

    /// Monotonic uniqueness under concurrency: N concurrent single-unit
    /// increments yield exactly {start+1, ..., start+N}, no duplicates,
    /// no gaps, and the persisted counter reflects every increment.
    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_increments_no_duplicates() {
        let db = setup().await;
        let svc = db.voucher_service();

        let lane = svc
            .create_series("store-1", VoucherType::Receipt, "B001", 1)
            .await
            .unwrap();

        const N: usize = 24;
        let mut handles = Vec::with_capacity(N);
        for _ in 0..N {
            let svc = svc.clone();
            let id = lane.id.clone();
            handles.push(tokio::spawn(async move {
                svc.increment_by(&id, 1).await.unwrap().current_number
            }));
        }

        let mut issued = HashSet::new();
        for handle in handles {
            let number = handle.await.unwrap();
            assert!(issued.insert(number), "duplicate number issued: {number}");
        }

        let expected: HashSet<i64> = (2..=(N as i64 + 1)).collect();
        assert_eq!(issued, expected);

        let final_lane = svc.get_series(&lane.id).await.unwrap();
        assert_eq!(final_lane.current_number, N as i64 + 1);
    }

    #[tokio::test]
    async fn test_update_series_uniqueness_recheck() {
        let db = setup().await;
        let svc = db.voucher_service();

        let b001 = svc
            .create_series("store-1", VoucherType::Receipt, "B001", 1)
            .await
            .unwrap();
        svc.create_series("store-1", VoucherType::Receipt, "B002", 1)
            .await
            .unwrap();

        // Re-keying B001 onto B002 collides
        let err = svc
            .update_series(
                &b001.id,
                UpdateSeries {
                    series: Some("B002".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ServiceError::Domain(CoreError::AlreadyExists { .. })
        ));

        // Updating only the counter keeps the key and succeeds
        let updated = svc
            .update_series(
                &b001.id,
                UpdateSeries {
                    current_number: Some(100),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.current_number, 100);

        // Counter below 1 violates the lane invariant
        assert!(svc
            .update_series(
                &b001.id,
                UpdateSeries {
                    current_number: Some(0),
                    ..Default::default()
                },
            )
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_delete_series() {
        let db = setup().await;
        let svc = db.voucher_service();

        let lane = svc
            .create_series("store-1", VoucherType::Receipt, "B001", 1)
            .await
            .unwrap();

        svc.delete_series(&lane.id).await.unwrap();
        assert!(matches!(
            svc.delete_series(&lane.id).await.unwrap_err(),
            ServiceError::Domain(CoreError::NotFound { .. })
        ));
    }
}
