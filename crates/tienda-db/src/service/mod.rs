//! # Domain Services
//!
//! Use-cases that compose repositories under one transaction boundary.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │  VoucherSeriesService  ─ exactly-once document numbering per lane   │
//! │  SaleService           ─ sale lifecycle + inventory consistency     │
//! │                                                                     │
//! │  Both return ServiceError:                                          │
//! │    Domain(..)   → business rejection, caller-recoverable            │
//! │    Database(..) → transaction aborted, outcome unknown              │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```

pub mod sale;
pub mod voucher;
