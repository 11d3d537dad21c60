//! The `Warehouse` trait and supporting types.
//!
//! The trait is implemented by storage backends (e.g.
//! `alluvium-warehouse-sqlite`). The engine and the rate feed depend on
//! this abstraction, not on any concrete backend.

use std::future::Future;

use chrono::NaiveDate;

use crate::{
  dimension::{Channel, Customer, NewCustomer, TimeEntry},
  fact::FactRow,
  product::{Equivalence, Product, SourceProductRef},
};

/// Counters returned by a batched fact load.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadOutcome {
  pub inserted:         u64,
  /// Rows whose natural key already existed; skipped, never updated.
  pub skipped_existing: u64,
  /// Rows whose insert failed; logged and skipped, batch not aborted.
  pub failed:           u64,
}

/// Abstraction over the dimensional warehouse.
///
/// Every `get_or_create_*` behaves as one idempotent operation: on a
/// uniqueness violation from a concurrent or duplicate insert it re-queries
/// and returns the existing row instead of failing.
pub trait Warehouse: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  // ── Dimensions ────────────────────────────────────────────────────────

  fn get_or_create_customer(
    &self,
    input: NewCustomer,
  ) -> impl Future<Output = Result<Customer, Self::Error>> + Send + '_;

  fn get_or_create_channel(
    &self,
    name: String,
  ) -> impl Future<Output = Result<Channel, Self::Error>> + Send + '_;

  /// Get or create the day's time row. Calendar fields are derived on
  /// insertion; the fx rate defaults to 1.0 when unknown and is never
  /// retroactively corrected by the load path.
  fn get_or_create_time(
    &self,
    date: NaiveDate,
  ) -> impl Future<Output = Result<TimeEntry, Self::Error>> + Send + '_;

  fn get_or_create_product(
    &self,
    sku: String,
    name: Option<String>,
    category: Option<String>,
  ) -> impl Future<Output = Result<Product, Self::Error>> + Send + '_;

  // ── Equivalences ──────────────────────────────────────────────────────

  /// Find an equivalence matching **any** of the reference's identifiers.
  fn find_equivalence(
    &self,
    product: SourceProductRef,
  ) -> impl Future<Output = Result<Option<Equivalence>, Self::Error>> + Send + '_;

  /// Record a new source-code combination for `sku`. Idempotent under
  /// races: a uniqueness violation resolves to the existing row.
  fn insert_equivalence(
    &self,
    sku: String,
    product: SourceProductRef,
  ) -> impl Future<Output = Result<Equivalence, Self::Error>> + Send + '_;

  // ── Exchange rates ────────────────────────────────────────────────────

  /// The stored local-per-USD rate for the exact date, if any.
  fn fx_rate_on(
    &self,
    date: NaiveDate,
  ) -> impl Future<Output = Result<Option<f64>, Self::Error>> + Send + '_;

  /// Write a rate into the day's time row, inserting the row if missing.
  fn set_fx_rate(
    &self,
    date: NaiveDate,
    rate: f64,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  // ── Facts ─────────────────────────────────────────────────────────────

  /// Load fact rows idempotently. A row whose natural key already exists
  /// is skipped; inserts are committed every `batch_size` rows plus a
  /// final commit; a failed row is skipped without aborting its batch.
  fn load_facts(
    &self,
    rows: Vec<FactRow>,
    batch_size: usize,
  ) -> impl Future<Output = Result<LoadOutcome, Self::Error>> + Send + '_;

  fn fact_count(
    &self,
  ) -> impl Future<Output = Result<u64, Self::Error>> + Send + '_;
}
