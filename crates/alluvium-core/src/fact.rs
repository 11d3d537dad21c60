//! Fact types — from aggregated source groups to loadable warehouse rows.
//!
//! Facts are write-once. A fact's natural key is
//! (time, product, customer[, channel]); at most one row may ever exist per
//! key, no matter how many times overlapping windows are re-run.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::{dimension::NewCustomer, product::SourceProductRef};

/// One aggregated group: all of a customer's line items for one product on
/// one calendar day (and, configurably, one channel), still in the source
/// currency.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreFact {
  pub customer:          NewCustomer,
  pub product:           SourceProductRef,
  pub day:               NaiveDate,
  pub channel:           Option<String>,
  pub currency:          String,
  pub quantity:          i64,
  /// Arithmetic mean of the group's line-item unit prices.
  pub unit_price_native: f64,
  pub total_native:      f64,
}

/// A pre-fact with its monetary fields converted to the reporting currency.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NormalizedFact {
  pub customer:       NewCustomer,
  pub product:        SourceProductRef,
  pub day:            NaiveDate,
  pub channel:        Option<String>,
  pub quantity:       i64,
  pub unit_price_usd: f64,
  pub total_usd:      f64,
  /// The rate actually applied (1.0 for reporting-currency rows).
  pub fx_rate:        f64,
}

/// The natural key of a fact row, in surrogate-id form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FactKey {
  pub time_id:     i64,
  pub product_id:  i64,
  pub customer_id: i64,
  pub channel_id:  Option<i64>,
}

/// A fully resolved fact row, ready for the loader.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FactRow {
  pub key:            FactKey,
  pub quantity:       i64,
  pub unit_price_usd: f64,
  pub total_usd:      f64,
}
