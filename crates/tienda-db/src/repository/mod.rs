//! # Repositories
//!
//! Single-table database operations. Each repository holds a pool clone
//! for standalone use; mutations that must compose into a larger
//! transaction are exposed as `*_on(&mut SqliteConnection, ...)`
//! associated functions so the services can run them inside one
//! transaction.

pub mod movement;
pub mod product;
pub mod sale;
pub mod voucher;
