//! SQLite backend for the Alluvium dimensional warehouse.
//!
//! Wraps [`tokio_rusqlite`] so all database access runs on a dedicated
//! thread without blocking the async runtime. One connection is held per
//! open warehouse, matching the one-connection-per-run model.

mod encode;
mod schema;
mod store;

pub mod error;

pub use error::{Error, Result};
pub use store::SqliteWarehouse;
