//! # Sale / Inventory Consistency Engine
//!
//! Use-cases that keep three facts in agreement at all times: the sale's
//! status, the products' stock levels, and the movement ledger.
//!
//! ## Completion, All or Nothing
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │  complete_sale(s)                    ──── one transaction ────      │
//! │                                                                     │
//! │  for each line item:                                                │
//! │    guarded decrement  ──► EXIT movement (prev/new recorded)         │
//! │                                                                     │
//! │  status: pending ──► completed  (conditional update)                │
//! │                                                                     │
//! │  Any line failing (missing, inactive, under-stocked) rolls back     │
//! │  every decrement and every movement; the sale stays Pending and     │
//! │  the caller gets the precise typed failure for the offending line.  │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Cancellation of a Completed sale and refunds reverse stock by appending
//! compensating RETURN movements, one per original EXIT. The EXIT rows are
//! never edited or deleted.

use sqlx::{Sqlite, SqliteConnection, SqlitePool, Transaction};
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::{DbError, ServiceResult};
use crate::repository::movement::MovementRepository;
use crate::repository::product::{ProductRepository, StockTake};
use crate::repository::sale::{SaleFilter, SaleRepository};
use crate::repository::voucher::VoucherSeriesRepository;
use crate::service::voucher::VoucherSeriesService;
use tienda_core::{
    CoreError, InventoryMovement, MovementType, NewMovement, NewSale, ReferenceType, Sale,
    SaleDetail, SaleStatus,
};

// =============================================================================
// Service
// =============================================================================

/// The sale lifecycle engine.
#[derive(Debug, Clone)]
pub struct SaleService {
    pool: SqlitePool,
}

impl SaleService {
    /// Creates a new SaleService.
    pub fn new(pool: SqlitePool) -> Self {
        SaleService { pool }
    }

    fn sales(&self) -> SaleRepository {
        SaleRepository::new(self.pool.clone())
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

    // -------------------------------------------------------------------------
    // Creation
    // -------------------------------------------------------------------------

    /// Creates a Pending sale stamped with the next number of its lane.
    ///
    /// The number allocation and the sale insert share one transaction: a
    /// failed insert rolls the counter back, so abandoned attempts leave
    /// no gap in the issued sequence.
    ///
    /// Stock is NOT touched here. Decrements happen at completion.
    pub async fn create_sale(&self, input: NewSale) -> ServiceResult<(Sale, Vec<SaleDetail>)> {
        let (mut sale, details) =
            Sale::create(Uuid::new_v4().to_string(), input, chrono::Utc::now())?;

        let lane = VoucherSeriesRepository::new(self.pool.clone())
            .find_lane(&sale.store_id, sale.voucher_type, &sale.series)
            .await?
            .ok_or_else(|| {
                CoreError::not_found(
                    "VoucherSeries",
                    format!(
                        "{}/{}/{}",
                        sale.store_id,
                        sale.voucher_type.as_str(),
                        sale.series
                    ),
                )
            })?;

        let mut tx = self.begin_write().await?;

        let (_, document_number) = VoucherSeriesService::allocate_on(&mut tx, &lane).await?;
        sale.stamp_document_number(document_number)?;

        SaleRepository::insert_on(&mut tx, &sale, &details).await?;

        tx.commit().await.map_err(DbError::from)?;

        info!(
            id = %sale.id,
            document = ?sale.document_number,
            total_cents = sale.total_cents,
            lines = details.len(),
            "Sale created"
        );
        Ok((sale, details))
    }

    // -------------------------------------------------------------------------
    // Completion
    // -------------------------------------------------------------------------

    /// Completes a Pending sale: decrements stock for every line item,
    /// appends one EXIT movement per line, then flips the status.
    ///
    /// All of it is one transaction. Any line failing its guarded
    /// decrement aborts the whole completion; the sale remains Pending
    /// and no stock or ledger change survives.
    pub async fn complete_sale(&self, sale_id: &str, user_id: &str) -> ServiceResult<Sale> {
        let now = chrono::Utc::now();
        let mut tx = self.begin_write().await?;

        let mut sale = SaleRepository::get_by_id_on(&mut tx, sale_id)
            .await?
            .ok_or_else(|| CoreError::not_found("Sale", sale_id))?;

        // Validates Pending -> Completed before any stock is touched
        sale.transition_to(SaleStatus::Completed, now)?;

        let details = SaleRepository::get_details_on(&mut tx, sale_id).await?;

        for detail in &details {
            let taken =
                ProductRepository::take_stock_on(&mut tx, &detail.product_id, detail.quantity)
                    .await?;

            let previous = match taken {
                StockTake::Taken { previous, .. } => previous,
                StockTake::Missing => {
                    return Err(CoreError::not_found("Product", &detail.product_id).into());
                }
                StockTake::Inactive => {
                    return Err(CoreError::InactiveProduct {
                        product_id: detail.product_id.clone(),
                    }
                    .into());
                }
                StockTake::Insufficient { available } => {
                    return Err(CoreError::InsufficientStock {
                        product_id: detail.product_id.clone(),
                        available,
                        requested: detail.quantity,
                    }
                    .into());
                }
            };

            let movement = InventoryMovement::record(
                Uuid::new_v4().to_string(),
                NewMovement {
                    product_id: detail.product_id.clone(),
                    user_id: user_id.to_string(),
                    movement_type: MovementType::Exit,
                    quantity: detail.quantity,
                    previous_stock: previous,
                    reason: sale
                        .document_number
                        .as_ref()
                        .map(|n| format!("Sale {n}")),
                    reference_id: Some(sale.id.clone()),
                    reference_type: Some(ReferenceType::Sale),
                },
                now,
            )?;
            MovementRepository::insert_on(&mut tx, &movement).await?;
        }

        self.flip_status_on(&mut tx, sale_id, SaleStatus::Pending, SaleStatus::Completed)
            .await?;

        tx.commit().await.map_err(DbError::from)?;

        info!(id = %sale.id, document = ?sale.document_number, "Sale completed");
        Ok(sale)
    }

    // -------------------------------------------------------------------------
    // Cancellation / Refund
    // -------------------------------------------------------------------------

    /// Cancels a sale.
    ///
    /// * From Pending: no stock was ever taken, the status just flips.
    /// * From Completed: stock is restored with compensating RETURN
    ///   movements in the same transaction as the flip.
    /// * Anything else: `InvalidStatusTransition`.
    pub async fn cancel_sale(&self, sale_id: &str, user_id: &str) -> ServiceResult<Sale> {
        self.reverse_sale(sale_id, user_id, SaleStatus::Cancelled)
            .await
    }

    /// Refunds a Completed sale: compensates stock and flips to Refunded.
    pub async fn refund_sale(&self, sale_id: &str, user_id: &str) -> ServiceResult<Sale> {
        self.reverse_sale(sale_id, user_id, SaleStatus::Refunded)
            .await
    }

    async fn reverse_sale(
        &self,
        sale_id: &str,
        user_id: &str,
        to: SaleStatus,
    ) -> ServiceResult<Sale> {
        let now = chrono::Utc::now();
        let mut tx = self.begin_write().await?;

        let mut sale = SaleRepository::get_by_id_on(&mut tx, sale_id)
            .await?
            .ok_or_else(|| CoreError::not_found("Sale", sale_id))?;

        let from = sale.status;
        sale.transition_to(to, now)?;

        // Pending sales never touched stock; only a Completed one needs
        // its decrements undone
        if from == SaleStatus::Completed {
            Self::compensate_on(&mut tx, &sale, user_id).await?;
        }

        self.flip_status_on(&mut tx, sale_id, from, to).await?;

        tx.commit().await.map_err(DbError::from)?;

        info!(id = %sale.id, document = ?sale.document_number, status = to.as_str(), "Sale reversed");
        Ok(sale)
    }

    /// Restores the stock a sale took, by appending one RETURN movement
    /// per original EXIT movement.
    ///
    /// The EXIT rows are left untouched. A product that vanished since
    /// the sale completed is skipped with a warning; the remaining lines
    /// are still restored.
    async fn compensate_on(
        conn: &mut SqliteConnection,
        sale: &Sale,
        user_id: &str,
    ) -> ServiceResult<()> {
        let exits =
            MovementRepository::find_by_reference_on(conn, &sale.id, ReferenceType::Sale).await?;

        for exit in exits
            .iter()
            .filter(|m| m.movement_type == MovementType::Exit)
        {
            let restored =
                ProductRepository::give_stock_on(conn, &exit.product_id, exit.quantity).await?;

            let Some((previous, _)) = restored else {
                warn!(
                    sale_id = %sale.id,
                    product_id = %exit.product_id,
                    quantity = exit.quantity,
                    "Product vanished; skipping stock restore for this line"
                );
                continue;
            };

            let movement = InventoryMovement::record(
                Uuid::new_v4().to_string(),
                NewMovement {
                    product_id: exit.product_id.clone(),
                    user_id: user_id.to_string(),
                    movement_type: MovementType::Return,
                    quantity: exit.quantity,
                    previous_stock: previous,
                    reason: sale
                        .document_number
                        .as_ref()
                        .map(|n| format!("Reversal of sale {n}")),
                    reference_id: Some(sale.id.clone()),
                    reference_type: Some(ReferenceType::Return),
                },
                chrono::Utc::now(),
            )?;
            MovementRepository::insert_on(conn, &movement).await?;
        }

        Ok(())
    }

    /// Conditional status flip. When the row was not in `from` anymore a
    /// concurrent transition won; the loser re-reads and reports the
    /// transition that actually failed.
    async fn flip_status_on(
        &self,
        conn: &mut SqliteConnection,
        sale_id: &str,
        from: SaleStatus,
        to: SaleStatus,
    ) -> ServiceResult<()> {
        let flipped = SaleRepository::set_status_on(conn, sale_id, from, to).await?;
        if flipped {
            return Ok(());
        }

        let current = SaleRepository::get_by_id_on(conn, sale_id)
            .await?
            .ok_or_else(|| CoreError::not_found("Sale", sale_id))?;

        Err(CoreError::InvalidStatusTransition {
            from: current.status,
            to,
        }
        .into())
    }

    // -------------------------------------------------------------------------
    // Queries
    // -------------------------------------------------------------------------

    /// Gets a sale with its line items.
    pub async fn get_sale(&self, sale_id: &str) -> ServiceResult<(Sale, Vec<SaleDetail>)> {
        let repo = self.sales();
        let sale = repo
            .get_by_id(sale_id)
            .await?
            .ok_or_else(|| CoreError::not_found("Sale", sale_id))?;
        let details = repo.get_details(sale_id).await?;
        Ok((sale, details))
    }

    /// Lists sales matching the filter, newest first.
    pub async fn list_sales(&self, filter: &SaleFilter) -> ServiceResult<Vec<Sale>> {
        Ok(self.sales().find_many(filter).await?)
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
    use chrono::Utc;
    use tienda_core::{Product, VoucherType};

    async fn setup() -> Database {
        Database::new(DbConfig::in_memory()).await.unwrap()
    }

    /// File-backed database with the default pool size, so transactions
    /// really run on separate connections.
    async fn setup_file_db() -> (Database, std::path::PathBuf) {
        let path = std::env::temp_dir().join(format!("tienda-test-{}.db", uuid::Uuid::new_v4()));
        let db = Database::new(DbConfig::new(&path)).await.unwrap();
        (db, path)
    }

    async fn teardown_file_db(db: Database, path: &std::path::Path) {
        db.close().await;
        for suffix in ["", "-wal", "-shm"] {
            let _ = std::fs::remove_file(format!("{}{suffix}", path.display()));
        }
    }

    async fn seed_product(db: &Database, id: &str, stock: i64) -> Product {
        let now = Utc::now();
        let product = Product {
            id: id.to_string(),
            store_id: "store-1".to_string(),
            sku: format!("SKU-{id}"),
            name: format!("Product {id}"),
            price_cents: 1_000,
            current_stock: stock,
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        db.products().insert(&product).await.unwrap();
        product
    }

    async fn seed_lane(db: &Database) {
        db.voucher_service()
            .create_series("store-1", VoucherType::Receipt, "B001", 1)
            .await
            .unwrap();
    }

    fn checkout(lines: Vec<(&str, i64)>) -> NewSale {
        let subtotal: i64 = lines.iter().map(|(_, q)| q * 1_000).sum();
        NewSale {
            store_id: "store-1".to_string(),
            customer_id: "cust-1".to_string(),
            user_id: "user-1".to_string(),
            voucher_type: VoucherType::Receipt,
            series: "B001".to_string(),
            sale_date: Utc::now(),
            subtotal_cents: subtotal,
            tax_cents: 0,
            discount_cents: 0,
            notes: None,
            lines: lines
                .into_iter()
                .map(|(product_id, quantity)| tienda_core::NewSaleLine {
                    product_id: product_id.to_string(),
                    quantity,
                    unit_price_cents: 1_000,
                    discount_cents: 0,
                })
                .collect(),
        }
    }

    #[tokio::test]
    async fn test_create_sale_stamps_sequential_numbers() {
        let db = setup().await;
        seed_lane(&db).await;
        seed_product(&db, "p-1", 10).await;
        let svc = db.sale_service();

        let (first, _) = svc.create_sale(checkout(vec![("p-1", 1)])).await.unwrap();
        let (second, _) = svc.create_sale(checkout(vec![("p-1", 1)])).await.unwrap();

        assert_eq!(first.document_number.as_deref(), Some("B001-00000002"));
        assert_eq!(second.document_number.as_deref(), Some("B001-00000003"));
        assert_eq!(first.status, SaleStatus::Pending);

        // Creation never touches stock
        let p = db.products().get_by_id("p-1").await.unwrap().unwrap();
        assert_eq!(p.current_stock, 10);
    }

    #[tokio::test]
    async fn test_create_sale_without_lane_fails() {
        let db = setup().await;
        seed_product(&db, "p-1", 10).await;

        let err = db
            .sale_service()
            .create_sale(checkout(vec![("p-1", 1)]))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ServiceError::Domain(CoreError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_complete_sale_decrements_and_logs_exits() {
        let db = setup().await;
        seed_lane(&db).await;
        seed_product(&db, "p-1", 10).await;
        seed_product(&db, "p-2", 5).await;
        let svc = db.sale_service();

        let (sale, _) = svc
            .create_sale(checkout(vec![("p-1", 3), ("p-2", 2)]))
            .await
            .unwrap();

        let completed = svc.complete_sale(&sale.id, "user-1").await.unwrap();
        assert_eq!(completed.status, SaleStatus::Completed);

        let p1 = db.products().get_by_id("p-1").await.unwrap().unwrap();
        let p2 = db.products().get_by_id("p-2").await.unwrap().unwrap();
        assert_eq!(p1.current_stock, 7);
        assert_eq!(p2.current_stock, 3);

        let movements = db
            .movements()
            .find_by_reference(&sale.id, ReferenceType::Sale)
            .await
            .unwrap();
        assert_eq!(movements.len(), 2);
        for m in &movements {
            assert_eq!(m.movement_type, MovementType::Exit);
            assert_eq!(m.new_stock, m.previous_stock - m.quantity);
        }
    }

    /// Two line items, the second under-stocked: the whole completion
    /// rolls back. The first product keeps its stock, no movement row
    /// survives, the sale stays Pending.
    #[tokio::test]
    async fn test_complete_sale_is_all_or_nothing() {
        let db = setup().await;
        seed_lane(&db).await;
        seed_product(&db, "p-1", 10).await;
        seed_product(&db, "p-2", 1).await;
        let svc = db.sale_service();

        let (sale, _) = svc
            .create_sale(checkout(vec![("p-1", 3), ("p-2", 2)]))
            .await
            .unwrap();

        let err = svc.complete_sale(&sale.id, "user-1").await.unwrap_err();
        match err {
            ServiceError::Domain(CoreError::InsufficientStock {
                product_id,
                available,
                requested,
            }) => {
                assert_eq!(product_id, "p-2");
                assert_eq!(available, 1);
                assert_eq!(requested, 2);
            }
            other => panic!("expected InsufficientStock, got {other:?}"),
        }

        let p1 = db.products().get_by_id("p-1").await.unwrap().unwrap();
        assert_eq!(p1.current_stock, 10, "first decrement must roll back");

        let movements = db
            .movements()
            .find_by_reference(&sale.id, ReferenceType::Sale)
            .await
            .unwrap();
        assert!(movements.is_empty(), "no movement row survives a rollback");

        let (reread, _) = svc.get_sale(&sale.id).await.unwrap();
        assert_eq!(reread.status, SaleStatus::Pending);
    }

    #[tokio::test]
    async fn test_complete_inactive_product_fails() {
        let db = setup().await;
        seed_lane(&db).await;
        seed_product(&db, "p-1", 10).await;
        let svc = db.sale_service();

        let (sale, _) = svc.create_sale(checkout(vec![("p-1", 1)])).await.unwrap();
        db.products().soft_delete("p-1").await.unwrap();

        let err = svc.complete_sale(&sale.id, "user-1").await.unwrap_err();
        assert!(matches!(
            err,
            ServiceError::Domain(CoreError::InactiveProduct { .. })
        ));
    }

    #[tokio::test]
    async fn test_cancel_pending_touches_no_stock() {
        let db = setup().await;
        seed_lane(&db).await;
        seed_product(&db, "p-1", 10).await;
        let svc = db.sale_service();

        let (sale, _) = svc.create_sale(checkout(vec![("p-1", 3)])).await.unwrap();
        let cancelled = svc.cancel_sale(&sale.id, "user-1").await.unwrap();
        assert_eq!(cancelled.status, SaleStatus::Cancelled);

        let p = db.products().get_by_id("p-1").await.unwrap().unwrap();
        assert_eq!(p.current_stock, 10);
        assert!(db
            .movements()
            .find_by_reference(&sale.id, ReferenceType::Sale)
            .await
            .unwrap()
            .is_empty());
    }

    /// Cancelling a Completed sale appends exactly one RETURN per EXIT
    /// and restores the stock; the EXIT rows stay untouched.
    #[tokio::test]
    async fn test_cancel_completed_compensates() {
        let db = setup().await;
        seed_lane(&db).await;
        seed_product(&db, "p-1", 10).await;
        seed_product(&db, "p-2", 5).await;
        let svc = db.sale_service();

        let (sale, _) = svc
            .create_sale(checkout(vec![("p-1", 3), ("p-2", 2)]))
            .await
            .unwrap();
        svc.complete_sale(&sale.id, "user-1").await.unwrap();

        let cancelled = svc.cancel_sale(&sale.id, "user-2").await.unwrap();
        assert_eq!(cancelled.status, SaleStatus::Cancelled);

        let p1 = db.products().get_by_id("p-1").await.unwrap().unwrap();
        let p2 = db.products().get_by_id("p-2").await.unwrap().unwrap();
        assert_eq!(p1.current_stock, 10);
        assert_eq!(p2.current_stock, 5);

        let exits = db
            .movements()
            .find_by_reference(&sale.id, ReferenceType::Sale)
            .await
            .unwrap();
        let returns = db
            .movements()
            .find_by_reference(&sale.id, ReferenceType::Return)
            .await
            .unwrap();
        assert_eq!(exits.len(), 2);
        assert_eq!(returns.len(), 2);
        for r in &returns {
            assert_eq!(r.movement_type, MovementType::Return);
            assert_eq!(r.user_id, "user-2");
            assert_eq!(r.new_stock, r.previous_stock + r.quantity);
        }
        // Original EXIT rows are not edited by the reversal
        for e in &exits {
            assert_eq!(e.movement_type, MovementType::Exit);
            assert_eq!(e.user_id, "user-1");
        }
    }

    /// Reversal keeps working when a sold product was hard-deleted after
    /// completion: the surviving lines are restored with their RETURN
    /// rows, the vanished line is skipped, and the cancel still lands.
    #[tokio::test]
    async fn test_cancel_completed_survives_deleted_product() {
        let db = setup().await;
        seed_lane(&db).await;
        seed_product(&db, "p-1", 10).await;
        seed_product(&db, "p-2", 5).await;
        let svc = db.sale_service();

        let (sale, _) = svc
            .create_sale(checkout(vec![("p-1", 3), ("p-2", 2)]))
            .await
            .unwrap();
        svc.complete_sale(&sale.id, "user-1").await.unwrap();

        sqlx::query("DELETE FROM products WHERE id = ?1")
            .bind("p-2")
            .execute(db.pool())
            .await
            .unwrap();

        let cancelled = svc.cancel_sale(&sale.id, "user-2").await.unwrap();
        assert_eq!(cancelled.status, SaleStatus::Cancelled);

        let p1 = db.products().get_by_id("p-1").await.unwrap().unwrap();
        assert_eq!(p1.current_stock, 10);

        // Only the surviving product gets a compensating RETURN
        let returns = db
            .movements()
            .find_by_reference(&sale.id, ReferenceType::Return)
            .await
            .unwrap();
        assert_eq!(returns.len(), 1);
        assert_eq!(returns[0].product_id, "p-1");
        assert_eq!(returns[0].quantity, 3);

        // Both original EXIT rows are still on the ledger
        let exits = db
            .movements()
            .find_by_reference(&sale.id, ReferenceType::Sale)
            .await
            .unwrap();
        assert_eq!(exits.len(), 2);
    }

    #[tokio::test]
    async fn test_refund_requires_completed() {
        let db = setup().await;
        seed_lane(&db).await;
        seed_product(&db, "p-1", 10).await;
        let svc = db.sale_service();

        let (sale, _) = svc.create_sale(checkout(vec![("p-1", 3)])).await.unwrap();

        // Pending -> Refunded is not a legal edge
        let err = svc.refund_sale(&sale.id, "user-1").await.unwrap_err();
        assert!(matches!(
            err,
            ServiceError::Domain(CoreError::InvalidStatusTransition {
                from: SaleStatus::Pending,
                to: SaleStatus::Refunded,
            })
        ));

        svc.complete_sale(&sale.id, "user-1").await.unwrap();
        let refunded = svc.refund_sale(&sale.id, "user-1").await.unwrap();
        assert_eq!(refunded.status, SaleStatus::Refunded);

        let p = db.products().get_by_id("p-1").await.unwrap().unwrap();
        assert_eq!(p.current_stock, 10);
    }

    /// Completing an already-cancelled sale fails with the precise
    /// transition error and mutates nothing.
    #[tokio::test]
    async fn test_complete_cancelled_sale_rejected() {
        let db = setup().await;
        seed_lane(&db).await;
        seed_product(&db, "p-1", 10).await;
        let svc = db.sale_service();

        let (sale, _) = svc.create_sale(checkout(vec![("p-1", 3)])).await.unwrap();
        svc.cancel_sale(&sale.id, "user-1").await.unwrap();

        let err = svc.complete_sale(&sale.id, "user-1").await.unwrap_err();
        assert!(matches!(
            err,
            ServiceError::Domain(CoreError::InvalidStatusTransition {
                from: SaleStatus::Cancelled,
                to: SaleStatus::Completed,
            })
        ));

        let p = db.products().get_by_id("p-1").await.unwrap().unwrap();
        assert_eq!(p.current_stock, 10);
    }

    /// Of a concurrent complete and cancel on the same Pending sale,
    /// exactly one wins; the loser gets InvalidStatusTransition and the
    /// stock agrees with the winner.
    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_complete_vs_cancel() {
        let db = setup().await;
        seed_lane(&db).await;
        seed_product(&db, "p-1", 10).await;
        let svc = db.sale_service();

        let (sale, _) = svc.create_sale(checkout(vec![("p-1", 3)])).await.unwrap();

        let complete = {
            let svc = svc.clone();
            let id = sale.id.clone();
            tokio::spawn(async move { svc.complete_sale(&id, "user-1").await })
        };
        let cancel = {
            let svc = svc.clone();
            let id = sale.id.clone();
            tokio::spawn(async move { svc.cancel_sale(&id, "user-1").await })
        };

        let complete = complete.await.unwrap();
        let cancel = cancel.await.unwrap();

        assert_eq!(
            complete.is_ok() as u8 + cancel.is_ok() as u8,
            1,
            "exactly one of the racing transitions must win"
        );

        let (reread, _) = svc.get_sale(&sale.id).await.unwrap();
        let p = db.products().get_by_id("p-1").await.unwrap().unwrap();
        match reread.status {
            SaleStatus::Completed => assert_eq!(p.current_stock, 7),
            SaleStatus::Cancelled => assert_eq!(p.current_stock, 10),
            other => panic!("unexpected status {other:?}"),
        }
    }

    /// Completions of distinct sales on distinct products must all land
    /// when they run on separate pool connections. Completion reads the
    /// sale before its first write, and SQLite cannot upgrade a read
    /// snapshot to the write lock once a peer has committed, so the
    /// transactions must grab the writer lock at BEGIN and queue instead
    /// of failing with "database is locked".
    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_completions_on_file_db_all_succeed() {
        let (db, path) = setup_file_db().await;
        seed_lane(&db).await;

        let mut sale_ids = Vec::new();
        for i in 0..4 {
            let pid = format!("p-{i}");
            seed_product(&db, &pid, 10).await;
            let (sale, _) = db
                .sale_service()
                .create_sale(checkout(vec![(pid.as_str(), 2)]))
                .await
                .unwrap();
            sale_ids.push(sale.id);
        }

        let mut handles = Vec::new();
        for id in &sale_ids {
            let svc = db.sale_service();
            let id = id.clone();
            handles.push(tokio::spawn(
                async move { svc.complete_sale(&id, "user-1").await },
            ));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        for i in 0..4 {
            let p = db
                .products()
                .get_by_id(&format!("p-{i}"))
                .await
                .unwrap()
                .unwrap();
            assert_eq!(p.current_stock, 8);
        }

        teardown_file_db(db, &path).await;
    }

    #[tokio::test]
    async fn test_list_sales_filters() {
        let db = setup().await;
        seed_lane(&db).await;
        seed_product(&db, "p-1", 10).await;
        let svc = db.sale_service();

        let (a, _) = svc.create_sale(checkout(vec![("p-1", 1)])).await.unwrap();
        let (_b, _) = svc.create_sale(checkout(vec![("p-1", 1)])).await.unwrap();
        svc.complete_sale(&a.id, "user-1").await.unwrap();

        let completed = svc
            .list_sales(&SaleFilter {
                store_id: Some("store-1".to_string()),
                status: Some(SaleStatus::Completed),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(completed.len(), 1);
        assert_eq!(completed[0].id, a.id);

        let all = svc
            .list_sales(&SaleFilter {
                store_id: Some("store-1".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(all.len(), 2);
    }
}
