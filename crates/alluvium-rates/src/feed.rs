//! Writes provider rates into the time dimension.

use std::time::Duration;

use alluvium_core::warehouse::Warehouse;
use chrono::{Days, NaiveDate};

use crate::{
  Error, Result,
  provider::{DatedRate, RateProvider},
};

/// Pulls rates from a provider and records them in the warehouse's time
/// dimension.
pub struct RateFeed<'a, W> {
  warehouse:  &'a W,
  /// Maximum span requested from the provider in one call.
  chunk_days: u64,
  /// Pause between backfill chunks, to stay polite to the upstream
  /// service.
  throttle:   Duration,
}

impl<'a, W: Warehouse> RateFeed<'a, W> {
  pub fn new(warehouse: &'a W) -> Self {
    Self {
      warehouse,
      chunk_days: 180,
      throttle: Duration::from_secs(2),
    }
  }

  pub fn with_chunking(mut self, chunk_days: u64, throttle: Duration) -> Self {
    self.chunk_days = chunk_days.max(1);
    self.throttle = throttle;
    self
  }

  /// Record one batch of rates. A day whose write fails is logged and
  /// skipped; the batch continues. Returns the number of days written.
  pub async fn record(&self, rates: &[DatedRate]) -> u64 {
    let mut written = 0;
    for rate in rates {
      match self.warehouse.set_fx_rate(rate.date, rate.rate).await {
        Ok(()) => written += 1,
        Err(e) => {
          tracing::error!(
            date = %rate.date,
            error = %e,
            "rate write failed; day skipped",
          );
        }
      }
    }
    written
  }

  /// Backfill a historical range, fetching in chunks so a long range does
  /// not overload the upstream service, and sleeping between chunks.
  pub async fn backfill<P: RateProvider>(
    &self,
    provider: &P,
    start: NaiveDate,
    end: NaiveDate,
  ) -> Result<u64> {
    let mut written = 0;
    let mut cursor = start;

    while cursor <= end {
      let chunk_end = cursor
        .checked_add_days(Days::new(self.chunk_days - 1))
        .map_or(end, |d| d.min(end));

      tracing::info!(from = %cursor, to = %chunk_end, "fetching rate chunk");
      let rates = provider
        .fetch(cursor, chunk_end)
        .await
        .map_err(|e| Error::Provider(Box::new(e)))?;
      written += self.record(&rates).await;

      cursor = match chunk_end.checked_add_days(Days::new(1)) {
        Some(next) => next,
        None => break,
      };
      if cursor <= end {
        tokio::time::sleep(self.throttle).await;
      }
    }

    tracing::info!(written, "backfill complete");
    Ok(written)
  }

  /// Fetch the trailing two days and record the freshest published rate,
  /// for a daily refresh.
  pub async fn refresh_latest<P: RateProvider>(
    &self,
    provider: &P,
    today: NaiveDate,
  ) -> Result<Option<DatedRate>> {
    let yesterday = today.pred_opt().unwrap_or(today);
    let rates = provider
      .fetch(yesterday, today)
      .await
      .map_err(|e| Error::Provider(Box::new(e)))?;

    let latest = rates.into_iter().max_by_key(|r| r.date);
    match latest {
      Some(rate) => {
        self.record(&[rate]).await;
        tracing::info!(date = %rate.date, rate = rate.rate, "daily rate recorded");
      }
      None => {
        tracing::warn!("rate service returned nothing for the trailing window");
      }
    }
    Ok(latest)
  }
}

#[cfg(test)]
mod tests {
  use std::sync::Mutex;

  use alluvium_warehouse_sqlite::SqliteWarehouse;

  use super::*;

  #[derive(Debug, thiserror::Error)]
  #[error("rate service down")]
  struct ServiceDown;

  /// Serves a fixed rate per day and records every requested range.
  struct StubProvider {
    rates:    Vec<DatedRate>,
    requests: Mutex<Vec<(NaiveDate, NaiveDate)>>,
    fail:     bool,
  }

  impl StubProvider {
    fn with_rates(rates: Vec<DatedRate>) -> Self {
      Self { rates, requests: Mutex::new(Vec::new()), fail: false }
    }
  }

  impl RateProvider for StubProvider {
    type Error = ServiceDown;

    async fn fetch(
      &self,
      start: NaiveDate,
      end: NaiveDate,
    ) -> Result<Vec<DatedRate>, ServiceDown> {
      if self.fail {
        return Err(ServiceDown);
      }
      self.requests.lock().unwrap().push((start, end));
      Ok(
        self
          .rates
          .iter()
          .filter(|r| r.date >= start && r.date <= end)
          .copied()
          .collect(),
      )
    }
  }

  fn day(s: &str) -> NaiveDate { s.parse().unwrap() }

  fn rate(date: &str, value: f64) -> DatedRate {
    DatedRate { date: day(date), rate: value }
  }

  #[tokio::test]
  async fn backfill_writes_rates_into_the_time_dimension() {
    let w = SqliteWarehouse::open_in_memory().await.unwrap();
    let provider = StubProvider::with_rates(vec![
      rate("2024-01-02", 512.3),
      rate("2024-01-03", 513.1),
    ]);

    let feed = RateFeed::new(&w).with_chunking(180, Duration::ZERO);
    let written = feed
      .backfill(&provider, day("2024-01-01"), day("2024-01-31"))
      .await
      .unwrap();

    assert_eq!(written, 2);
    assert_eq!(w.fx_rate_on(day("2024-01-02")).await.unwrap(), Some(512.3));
    assert_eq!(w.fx_rate_on(day("2024-01-03")).await.unwrap(), Some(513.1));
  }

  #[tokio::test]
  async fn backfill_splits_long_ranges_into_chunks() {
    let w = SqliteWarehouse::open_in_memory().await.unwrap();
    let provider = StubProvider::with_rates(Vec::new());

    let feed = RateFeed::new(&w).with_chunking(10, Duration::ZERO);
    feed
      .backfill(&provider, day("2024-01-01"), day("2024-01-25"))
      .await
      .unwrap();

    let requests = provider.requests.lock().unwrap();
    assert_eq!(
      *requests,
      vec![
        (day("2024-01-01"), day("2024-01-10")),
        (day("2024-01-11"), day("2024-01-20")),
        (day("2024-01-21"), day("2024-01-25")),
      ],
    );
  }

  #[tokio::test]
  async fn provider_failure_surfaces_as_an_error() {
    let w = SqliteWarehouse::open_in_memory().await.unwrap();
    let provider = StubProvider {
      rates:    Vec::new(),
      requests: Mutex::new(Vec::new()),
      fail:     true,
    };

    let feed = RateFeed::new(&w).with_chunking(180, Duration::ZERO);
    let err = feed
      .backfill(&provider, day("2024-01-01"), day("2024-01-02"))
      .await
      .unwrap_err();
    assert!(matches!(err, Error::Provider(_)));
  }

  #[tokio::test]
  async fn refresh_latest_records_the_freshest_rate() {
    let w = SqliteWarehouse::open_in_memory().await.unwrap();
    let provider = StubProvider::with_rates(vec![
      rate("2024-06-09", 511.0),
      rate("2024-06-10", 512.0),
    ]);

    let feed = RateFeed::new(&w);
    let latest = feed
      .refresh_latest(&provider, day("2024-06-10"))
      .await
      .unwrap();

    assert_eq!(latest, Some(rate("2024-06-10", 512.0)));
    assert_eq!(w.fx_rate_on(day("2024-06-10")).await.unwrap(), Some(512.0));
    // The stale day was fetched but not recorded.
    assert_eq!(w.fx_rate_on(day("2024-06-09")).await.unwrap(), None);
  }

  #[tokio::test]
  async fn refresh_latest_with_no_published_rate_is_a_noop() {
    let w = SqliteWarehouse::open_in_memory().await.unwrap();
    let provider = StubProvider::with_rates(Vec::new());

    let feed = RateFeed::new(&w);
    let latest = feed
      .refresh_latest(&provider, day("2024-06-10"))
      .await
      .unwrap();
    assert_eq!(latest, None);
  }
}
