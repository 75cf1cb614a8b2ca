//! # tienda-db: Database Layer for Tienda POS
//!
//! SQLite persistence for the POS backend core, plus the two domain
//! services that need a transactional boundary:
//!
//! - the **voucher series allocator** (exactly-once monotonic document
//!   numbers per lane)
//! - the **sale/inventory consistency engine** (all-or-nothing completion,
//!   compensating reversals)
//!
//! ## Layout
//!
//! - [`pool`] - Connection pool and the [`Database`] facade
//! - [`migrations`] - Embedded schema migrations
//! - [`repository`] - Single-table operations (products, lanes, sales,
//!   movements)
//! - [`service`] - Multi-step use-cases with transaction boundaries
//! - [`error`] - [`DbError`] (infrastructure) and [`ServiceError`]
//!   (domain | infrastructure)
//!
//! ## Concurrency Discipline
//!
//! Every contended counter in the schema is mutated exclusively by a
//! single atomic SQL statement (`current_number = current_number + 1`,
//! `current_stock = current_stock - ?` guarded by a `WHERE` precondition).
//! No code path reads a counter, computes in application memory, then
//! writes it back.

pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;
pub mod service;

pub use error::{DbError, DbResult, ServiceError, ServiceResult};
pub use pool::{Database, DbConfig};
pub use repository::movement::MovementRepository;
pub use repository::product::ProductRepository;
pub use repository::sale::{SaleFilter, SaleRepository};
pub use repository::voucher::VoucherSeriesRepository;
pub use service::sale::SaleService;
pub use service::voucher::VoucherSeriesService;
