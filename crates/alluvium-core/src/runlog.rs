//! Run-log records — the durable watermark.
//!
//! The run log is append-only and is the sole source of truth for the
//! extraction watermark. Storage lives elsewhere; this module holds the
//! record type and the pure watermark computation.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Outcome of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RunStatus {
  Success,
  Error,
}

/// One appended run outcome.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunRecord {
  pub timestamp:           DateTime<Utc>,
  /// The maximum order date actually processed; `None` on failed runs that
  /// never reached data.
  pub last_processed_date: Option<NaiveDate>,
  pub rows_processed:      u64,
  pub status:              RunStatus,
  pub message:             String,
}

/// The latest date known to be fully processed: the maximum
/// `last_processed_date` over SUCCESS records. `None` means no successful
/// run exists and the next extraction covers full history.
pub fn watermark(records: &[RunRecord]) -> Option<NaiveDate> {
  records
    .iter()
    .filter(|r| r.status == RunStatus::Success)
    .filter_map(|r| r.last_processed_date)
    .max()
}

#[cfg(test)]
mod tests {
  use chrono::TimeZone;

  use super::*;

  fn record(
    status: RunStatus,
    date: Option<&str>,
  ) -> RunRecord {
    RunRecord {
      timestamp: Utc.with_ymd_and_hms(2024, 6, 1, 5, 0, 0).unwrap(),
      last_processed_date: date.map(|d| d.parse().unwrap()),
      rows_processed: 10,
      status,
      message: String::new(),
    }
  }

  #[test]
  fn watermark_is_max_over_success_records() {
    let records = vec![
      record(RunStatus::Success, Some("2024-05-01")),
      record(RunStatus::Success, Some("2024-05-20")),
      record(RunStatus::Success, Some("2024-05-10")),
    ];
    assert_eq!(
      watermark(&records),
      Some(NaiveDate::from_ymd_opt(2024, 5, 20).unwrap())
    );
  }

  #[test]
  fn error_records_do_not_advance_the_watermark() {
    let records = vec![
      record(RunStatus::Success, Some("2024-05-01")),
      record(RunStatus::Error, Some("2024-05-30")),
      record(RunStatus::Error, None),
    ];
    assert_eq!(
      watermark(&records),
      Some(NaiveDate::from_ymd_opt(2024, 5, 1).unwrap())
    );
  }

  #[test]
  fn no_success_records_means_no_watermark() {
    assert_eq!(watermark(&[]), None);
    assert_eq!(watermark(&[record(RunStatus::Error, None)]), None);
  }
}
