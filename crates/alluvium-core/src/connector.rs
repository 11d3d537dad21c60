//! The extraction seam — one implementation per source system.
//!
//! Concrete connectors (document store, relational, graph, managed REST)
//! live outside this workspace; the engine only sees raw line items for a
//! window. Extraction is pull, batch, point-in-time.

use std::future::Future;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::product::SourceProductRef;

/// The date window a run extracts. `since` is already watermark + 1 day;
/// `None` means full history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionWindow {
  pub since: Option<NaiveDate>,
  pub until: NaiveDate,
}

impl ExtractionWindow {
  pub fn contains(&self, day: NaiveDate) -> bool {
    self.since.map_or(true, |s| day >= s) && day <= self.until
  }
}

/// Customer attributes as extracted, before normalization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawCustomer {
  pub email:         String,
  pub name:          String,
  pub gender_label:  String,
  pub country:       Option<String>,
  /// As extracted; a malformed value degrades to an unknown registration
  /// date rather than failing the row.
  pub registered_on: Option<String>,
}

/// One raw order line item as extracted from a source system.
///
/// Dates and prices stay as text until the aggregator runs them through
/// the parse chokepoint; a malformed value there is a row error, not a run
/// error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawLineItem {
  pub customer:     RawCustomer,
  pub product:      SourceProductRef,
  pub order_date:   String,
  pub channel:      Option<String>,
  pub currency:     String,
  pub quantity:     i64,
  pub unit_price:   String,
  pub discount_pct: Option<f64>,
}

/// Abstraction over a source system's extraction pipeline.
pub trait SourceConnector: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// Short name used in logs and run-log messages.
  fn source_name(&self) -> &str;

  /// Pull every raw line item in the window, as one batch.
  fn extract(
    &self,
    window: ExtractionWindow,
  ) -> impl Future<Output = Result<Vec<RawLineItem>, Self::Error>> + Send + '_;
}
