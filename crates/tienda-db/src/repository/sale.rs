//! # Sale Repository
//!
//! Database operations for sale headers and their line items.
//!
//! Status changes go through a conditional update (`WHERE id = ? AND
//! status = ?`): of two concurrent terminal transitions on the same sale,
//! exactly one affects the row. The loser observes zero affected rows,
//! re-reads the current status and surfaces `InvalidStatusTransition`.

use chrono::{DateTime, Utc};
use sqlx::{QueryBuilder, Sqlite, SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::{DbError, DbResult};
use tienda_core::{Sale, SaleDetail, SaleStatus};

const SELECT_COLUMNS: &str = "id, store_id, customer_id, user_id, document_number, \
     voucher_type, series, sale_date, subtotal_cents, tax_cents, discount_cents, \
     total_cents, status, notes, registered_at, updated_at";

const DETAIL_COLUMNS: &str =
    "id, sale_id, product_id, quantity, unit_price_cents, discount_cents";

// =============================================================================
// Filters
// =============================================================================

/// Filter for sale listings.
#[derive(Debug, Clone, Default)]
pub struct SaleFilter {
    pub store_id: Option<String>,
    pub status: Option<SaleStatus>,
    pub from_date: Option<DateTime<Utc>>,
    pub to_date: Option<DateTime<Utc>>,
    /// Maximum rows to return. Default: 100.
    pub limit: Option<u32>,
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for sale database operations.
#[derive(Debug, Clone)]
pub struct SaleRepository {
    pool: SqlitePool,
}

impl SaleRepository {
    /// Creates a new SaleRepository.
    pub fn new(pool: SqlitePool) -> Self {
        SaleRepository { pool }
    }

    /// Inserts a sale header with its line items, on the caller's
    /// transaction.
    pub async fn insert_on(
        conn: &mut SqliteConnection,
        sale: &Sale,
        details: &[SaleDetail],
    ) -> DbResult<()> {
        debug!(id = %sale.id, document = ?sale.document_number, "Inserting sale");

        sqlx::query(
            r#"
            INSERT INTO sales (
                id, store_id, customer_id, user_id, document_number,
                voucher_type, series, sale_date,
                subtotal_cents, tax_cents, discount_cents, total_cents,
                status, notes, registered_at, updated_at
            ) VALUES (
                ?1, ?2, ?3, ?4, ?5,
                ?6, ?7, ?8,
                ?9, ?10, ?11, ?12,
                ?13, ?14, ?15, ?16
            )
            "#,
        )
        .bind(&sale.id)
        .bind(&sale.store_id)
        .bind(&sale.customer_id)
        .bind(&sale.user_id)
        .bind(&sale.document_number)
        .bind(sale.voucher_type)
        .bind(&sale.series)
        .bind(sale.sale_date)
        .bind(sale.subtotal_cents)
        .bind(sale.tax_cents)
        .bind(sale.discount_cents)
        .bind(sale.total_cents)
        .bind(sale.status)
        .bind(&sale.notes)
        .bind(sale.registered_at)
        .bind(sale.updated_at)
        .execute(&mut *conn)
        .await?;

        for detail in details {
            sqlx::query(
                r#"
                INSERT INTO sale_details (
                    id, sale_id, product_id, quantity, unit_price_cents, discount_cents
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                "#,
            )
            .bind(&detail.id)
            .bind(&detail.sale_id)
            .bind(&detail.product_id)
            .bind(detail.quantity)
            .bind(detail.unit_price_cents)
            .bind(detail.discount_cents)
            .execute(&mut *conn)
            .await?;
        }

        Ok(())
    }

    /// Gets a sale by ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Sale>> {
        let mut conn = self.pool.acquire().await?;
        Self::get_by_id_on(&mut conn, id).await
    }

    /// Transactional variant of [`get_by_id`](Self::get_by_id).
    pub async fn get_by_id_on(conn: &mut SqliteConnection, id: &str) -> DbResult<Option<Sale>> {
        let sale = sqlx::query_as::<_, Sale>(&format!(
            "SELECT {SELECT_COLUMNS} FROM sales WHERE id = ?1"
        ))
        .bind(id)
        .fetch_optional(conn)
        .await?;

        Ok(sale)
    }

    /// Gets all line items of a sale.
    pub async fn get_details(&self, sale_id: &str) -> DbResult<Vec<SaleDetail>> {
        let mut conn = self.pool.acquire().await?;
        Self::get_details_on(&mut conn, sale_id).await
    }

    /// Transactional variant of [`get_details`](Self::get_details).
    pub async fn get_details_on(
        conn: &mut SqliteConnection,
        sale_id: &str,
    ) -> DbResult<Vec<SaleDetail>> {
        let details = sqlx::query_as::<_, SaleDetail>(&format!(
            "SELECT {DETAIL_COLUMNS} FROM sale_details WHERE sale_id = ?1 ORDER BY id"
        ))
        .bind(sale_id)
        .fetch_all(conn)
        .await?;

        Ok(details)
    }

    /// Lists sales matching the filter, newest first.
    pub async fn find_many(&self, filter: &SaleFilter) -> DbResult<Vec<Sale>> {
        let mut builder: QueryBuilder<Sqlite> =
            QueryBuilder::new(format!("SELECT {SELECT_COLUMNS} FROM sales WHERE 1 = 1"));

        if let Some(store_id) = &filter.store_id {
            builder.push(" AND store_id = ").push_bind(store_id);
        }
        if let Some(status) = filter.status {
            builder.push(" AND status = ").push_bind(status);
        }
        if let Some(from) = filter.from_date {
            builder.push(" AND sale_date >= ").push_bind(from);
        }
        if let Some(to) = filter.to_date {
            builder.push(" AND sale_date <= ").push_bind(to);
        }

        builder
            .push(" ORDER BY registered_at DESC LIMIT ")
            .push_bind(filter.limit.unwrap_or(100) as i64);

        let sales = builder
            .build_query_as::<Sale>()
            .fetch_all(&self.pool)
            .await?;

        Ok(sales)
    }

    /// Conditionally moves a sale from one status to another.
    ///
    /// ## Returns
    /// `true` when the row was in `from` and is now in `to`; `false` when
    /// the sale is missing or its status changed underneath us. The caller
    /// decides which of those it is and which typed failure to raise.
    pub async fn set_status_on(
        conn: &mut SqliteConnection,
        id: &str,
        from: SaleStatus,
        to: SaleStatus,
    ) -> DbResult<bool> {
        let now = Utc::now();

        let result = sqlx::query(
            r#"
            UPDATE sales SET
                status = ?3,
                updated_at = ?4
            WHERE id = ?1 AND status = ?2
            "#,
        )
        .bind(id)
        .bind(from)
        .bind(to)
        .bind(now)
        .execute(conn)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Hard-deletes a sale and its details (cascade).
    ///
    /// Only sane for Pending sales that never touched stock; the services
    /// refuse anything else.
    pub async fn delete(&self, id: &str) -> DbResult<()> {
        let result = sqlx::query("DELETE FROM sales WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Sale", id));
        }

        Ok(())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
