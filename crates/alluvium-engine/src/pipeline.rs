//! The run orchestrator.
//!
//! One invocation is one linear pass:
//! IDLE → EXTRACTING → AGGREGATING → RESOLVING → LOADING →
//! {SUCCESS | ERROR} → IDLE. Nothing reaches the fact table except through
//! the loader's dedup check, and the watermark moves only when a SUCCESS
//! record is appended.

use std::fmt;

use alluvium_core::{
  connector::{ExtractionWindow, SourceConnector},
  fact::{FactKey, FactRow, PreFact},
  warehouse::{LoadOutcome, Warehouse},
};
use chrono::{Days, NaiveDate, Utc};

use crate::{
  Error, Result,
  aggregate::{AggregateOutcome, aggregate},
  config::EngineConfig,
  normalize::CurrencyNormalizer,
  resolve::EntityResolver,
  runlog::FileRunLog,
};

/// The phases a run moves through, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunPhase {
  Idle,
  Extracting,
  Aggregating,
  Resolving,
  Loading,
}

impl fmt::Display for RunPhase {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let name = match self {
      Self::Idle => "idle",
      Self::Extracting => "extracting",
      Self::Aggregating => "aggregating",
      Self::Resolving => "resolving",
      Self::Loading => "loading",
    };
    f.write_str(name)
  }
}

/// Counters and bounds from one completed run.
#[derive(Debug, Clone)]
pub struct RunReport {
  pub window:         ExtractionWindow,
  pub rows_extracted: u64,
  pub groups:         u64,
  /// Line items dropped during aggregation.
  pub row_errors:     u64,
  /// Groups dropped because resolution or a dimension upsert failed.
  pub group_errors:   u64,
  pub load:           LoadOutcome,
  pub max_day:        Option<NaiveDate>,
}

/// The incremental reconciliation and load engine, bound to one warehouse
/// and one run log.
pub struct Pipeline<W> {
  warehouse: W,
  config:    EngineConfig,
  run_log:   FileRunLog,
}

impl<W: Warehouse> Pipeline<W> {
  pub fn new(warehouse: W, config: EngineConfig) -> Self {
    let run_log = FileRunLog::new(config.run_log_path.clone());
    Self { warehouse, config, run_log }
  }

  pub fn warehouse(&self) -> &W { &self.warehouse }

  pub fn run_log(&self) -> &FileRunLog { &self.run_log }

  /// Execute one full run against `connector`.
  ///
  /// An extraction failure appends an ERROR record and aborts; the
  /// watermark does not move, so the next invocation re-extracts the same
  /// window and converges through the loader's dedup check.
  pub async fn run<C: SourceConnector>(
    &self,
    connector: &C,
  ) -> Result<RunReport> {
    let source = connector.source_name().to_owned();

    // EXTRACTING
    let watermark = self.run_log.watermark()?;
    let window = ExtractionWindow {
      since: watermark.and_then(|d| d.checked_add_days(Days::new(1))),
      until: Utc::now().date_naive(),
    };
    tracing::info!(
      phase = %RunPhase::Extracting,
      source = %source,
      since = ?window.since,
      until = %window.until,
      "run started",
    );

    let items = match connector.extract(window).await {
      Ok(items) => items,
      Err(e) => {
        tracing::error!(
          phase = %RunPhase::Extracting,
          source = %source,
          error = %e,
          "run aborted",
        );
        self
          .run_log
          .append_error(format!("extraction from {source} failed: {e}"))?;
        return Err(Error::Extraction {
          source_name: source,
          message:     e.to_string(),
        });
      }
    };
    let rows_extracted = items.len() as u64;

    // AGGREGATING
    tracing::info!(
      phase = %RunPhase::Aggregating,
      rows = rows_extracted,
      "aggregating line items",
    );
    let AggregateOutcome { pre_facts, row_errors, max_day } =
      aggregate(items, &self.config);
    let groups = pre_facts.len() as u64;

    // RESOLVING (entity resolution, dimension upserts, normalization)
    tracing::info!(phase = %RunPhase::Resolving, groups, "resolving groups");
    let resolver = EntityResolver::new(&self.warehouse);
    let normalizer = CurrencyNormalizer::new(&self.warehouse, &self.config);

    let mut fact_rows = Vec::with_capacity(pre_facts.len());
    let mut group_errors = 0u64;
    for pre in pre_facts {
      match self.build_fact_row(&resolver, &normalizer, pre).await {
        Ok(row) => fact_rows.push(row),
        Err(e) => {
          tracing::error!(
            phase = %RunPhase::Resolving,
            error = %e,
            "group skipped",
          );
          group_errors += 1;
        }
      }
    }

    // LOADING
    tracing::info!(
      phase = %RunPhase::Loading,
      rows = fact_rows.len(),
      "loading facts",
    );
    let load = self
      .warehouse
      .load_facts(fact_rows, self.config.commit_batch_size)
      .await
      .map_err(|e| Error::Warehouse(Box::new(e)))?;

    // SUCCESS
    self.run_log.append_success(
      max_day,
      load.inserted,
      format!(
        "source={source} inserted={} skipped={} failed={}",
        load.inserted, load.skipped_existing, load.failed,
      ),
    )?;
    tracing::info!(
      inserted = load.inserted,
      skipped = load.skipped_existing,
      failed = load.failed,
      "run complete",
    );

    Ok(RunReport {
      window,
      rows_extracted,
      groups,
      row_errors,
      group_errors,
      load,
      max_day,
    })
  }

  async fn build_fact_row(
    &self,
    resolver: &EntityResolver<'_, W>,
    normalizer: &CurrencyNormalizer<'_, W>,
    pre: PreFact,
  ) -> Result<FactRow> {
    // Resolve and normalize before the day's time row is upserted: the fx
    // lookup must see the table as the rate feed left it, not the 1.0 the
    // upsert writes for unknown days.
    let product = resolver.resolve(&pre.product).await?;
    let normalized = normalizer.normalize(pre).await?;

    let customer = self
      .warehouse
      .get_or_create_customer(normalized.customer.clone())
      .await
      .map_err(|e| Error::Warehouse(Box::new(e)))?;

    let time = self
      .warehouse
      .get_or_create_time(normalized.day)
      .await
      .map_err(|e| Error::Warehouse(Box::new(e)))?;

    let channel_id = match &normalized.channel {
      Some(name) => Some(
        self
          .warehouse
          .get_or_create_channel(name.clone())
          .await
          .map_err(|e| Error::Warehouse(Box::new(e)))?
          .channel_id,
      ),
      None => None,
    };

    Ok(FactRow {
      key:            FactKey {
        time_id: time.time_id,
        product_id: product.product_id,
        customer_id: customer.customer_id,
        channel_id,
      },
      quantity:       normalized.quantity,
      unit_price_usd: normalized.unit_price_usd,
      total_usd:      normalized.total_usd,
    })
  }
}
