//! The exchange-rate provider seam.

use std::future::Future;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One (date, rate) pair from the upstream feed. Rates are
/// local-currency-units per one reporting-currency unit.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DatedRate {
  pub date: NaiveDate,
  pub rate: f64,
}

/// Abstraction over the external rate service. Implementations own
/// transport, authentication, and request timeouts.
pub trait RateProvider: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// Fetch every published rate in the inclusive date range.
  fn fetch(
    &self,
    start: NaiveDate,
    end: NaiveDate,
  ) -> impl Future<Output = Result<Vec<DatedRate>, Self::Error>> + Send + '_;
}
