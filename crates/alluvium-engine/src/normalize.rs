//! The currency normalizer — pre-facts to reporting-currency facts.

use alluvium_core::{
  fact::{NormalizedFact, PreFact},
  parse::round2,
  warehouse::Warehouse,
};

use crate::{Error, Result, config::EngineConfig};

/// Converts a pre-fact's monetary fields into the reporting currency.
pub struct CurrencyNormalizer<'a, W> {
  warehouse: &'a W,
  config:    &'a EngineConfig,
}

impl<'a, W: Warehouse> CurrencyNormalizer<'a, W> {
  pub fn new(warehouse: &'a W, config: &'a EngineConfig) -> Self {
    Self { warehouse, config }
  }

  /// Normalize one pre-fact.
  ///
  /// Reporting-currency rows pass through at the identity rate. Everything
  /// else divides by the stored local-per-USD rate for the exact order
  /// date; a missing rate falls back to the configured default with a
  /// warning and never fails the row. All monetary outputs are rounded
  /// half-up to 2 decimals.
  pub async fn normalize(&self, pre: PreFact) -> Result<NormalizedFact> {
    let rate = if pre.currency == self.config.reporting_currency {
      1.0
    } else {
      let stored = self
        .warehouse
        .fx_rate_on(pre.day)
        .await
        .map_err(|e| Error::Warehouse(Box::new(e)))?;

      match stored {
        Some(rate) if rate > 0.0 => rate,
        _ => {
          tracing::warn!(
            day = %pre.day,
            currency = %pre.currency,
            default_rate = self.config.default_fx_rate,
            "no exchange rate stored for the order date; using the default",
          );
          self.config.default_fx_rate
        }
      }
    };

    Ok(NormalizedFact {
      customer:       pre.customer,
      product:        pre.product,
      day:            pre.day,
      channel:        pre.channel,
      quantity:       pre.quantity,
      unit_price_usd: round2(pre.unit_price_native / rate),
      total_usd:      round2(pre.total_native / rate),
      fx_rate:        rate,
    })
  }
}

#[cfg(test)]
mod tests {
  use alluvium_core::{
    dimension::{Gender, NewCustomer},
    product::SourceProductRef,
  };
  use alluvium_warehouse_sqlite::SqliteWarehouse;
  use chrono::NaiveDate;

  use super::*;

  fn pre_fact(currency: &str, unit_price: f64, total: f64) -> PreFact {
    PreFact {
      customer:          NewCustomer {
        email:         "a@example.com".into(),
        name:          "Alice".into(),
        gender:        Gender::Female,
        country:       None,
        registered_on: None,
      },
      product:           SourceProductRef {
        alt_code: Some("ALT-1".into()),
        ..Default::default()
      },
      day:               "2024-03-01".parse().unwrap(),
      channel:           None,
      currency:          currency.into(),
      quantity:          1,
      unit_price_native: unit_price,
      total_native:      total,
    }
  }

  #[tokio::test]
  async fn reporting_currency_uses_the_identity_rate() {
    let w = SqliteWarehouse::open_in_memory().await.unwrap();
    let config = EngineConfig::default();
    let normalizer = CurrencyNormalizer::new(&w, &config);

    let fact = normalizer.normalize(pre_fact("USD", 12.25, 49.0)).await.unwrap();
    assert_eq!(fact.fx_rate, 1.0);
    assert_eq!(fact.unit_price_usd, 12.25);
    assert_eq!(fact.total_usd, 49.0);
  }

  #[tokio::test]
  async fn foreign_currency_divides_by_the_stored_rate() {
    let w = SqliteWarehouse::open_in_memory().await.unwrap();
    let day: NaiveDate = "2024-03-01".parse().unwrap();
    w.set_fx_rate(day, 500.0).await.unwrap();

    let config = EngineConfig::default();
    let normalizer = CurrencyNormalizer::new(&w, &config);

    let fact = normalizer
      .normalize(pre_fact("CRC", 1000.0, 3000.0))
      .await
      .unwrap();
    assert_eq!(fact.fx_rate, 500.0);
    assert_eq!(fact.unit_price_usd, 2.0);
    assert_eq!(fact.total_usd, 6.0);
  }

  #[tokio::test]
  async fn missing_rate_falls_back_to_the_default() {
    let w = SqliteWarehouse::open_in_memory().await.unwrap();
    let config = EngineConfig {
      default_fx_rate: 520.0,
      ..Default::default()
    };
    let normalizer = CurrencyNormalizer::new(&w, &config);

    let fact = normalizer
      .normalize(pre_fact("CRC", 520.0, 1040.0))
      .await
      .unwrap();
    assert_eq!(fact.fx_rate, 520.0);
    assert_eq!(fact.unit_price_usd, 1.0);
    assert_eq!(fact.total_usd, 2.0);
  }

  #[tokio::test]
  async fn converted_amounts_are_rounded_to_cents() {
    let w = SqliteWarehouse::open_in_memory().await.unwrap();
    let day: NaiveDate = "2024-03-01".parse().unwrap();
    w.set_fx_rate(day, 3.0).await.unwrap();

    let config = EngineConfig::default();
    let normalizer = CurrencyNormalizer::new(&w, &config);

    // 100 / 3 = 33.333... → 33.33
    let fact = normalizer.normalize(pre_fact("CRC", 100.0, 100.0)).await.unwrap();
    assert_eq!(fact.unit_price_usd, 33.33);
    assert_eq!(fact.total_usd, 33.33);
  }
}
