//! File-backed run log.
//!
//! One record per line, append-only. New records are JSON; a legacy line
//! holding a bare `YYYY-MM-DD` date is still read as a SUCCESS record so
//! logs written by earlier loaders keep bounding the window correctly.

use std::{
  fs::{File, OpenOptions},
  io::{BufRead, BufReader, Write as _},
  path::{Path, PathBuf},
};

use alluvium_core::runlog::{RunRecord, RunStatus, watermark};
use chrono::{DateTime, NaiveDate, Utc};

use crate::Result;

/// The durable watermark store.
pub struct FileRunLog {
  path: PathBuf,
}

impl FileRunLog {
  pub fn new(path: impl Into<PathBuf>) -> Self { Self { path: path.into() } }

  pub fn path(&self) -> &Path { &self.path }

  /// Read every record. A missing file means no runs yet. Unreadable
  /// lines are logged and skipped; they never fail a run.
  pub fn read_records(&self) -> Result<Vec<RunRecord>> {
    if !self.path.exists() {
      return Ok(Vec::new());
    }

    let file = File::open(&self.path)?;
    let mut records = Vec::new();

    for line in BufReader::new(file).lines() {
      let line = line?;
      let trimmed = line.trim();
      if trimmed.is_empty() {
        continue;
      }

      if let Ok(record) = serde_json::from_str::<RunRecord>(trimmed) {
        records.push(record);
        continue;
      }

      // Legacy format: one bare date per line.
      if let Ok(day) = trimmed.parse::<NaiveDate>() {
        records.push(RunRecord {
          // The legacy format carried no timestamp.
          timestamp:           DateTime::<Utc>::UNIX_EPOCH,
          last_processed_date: Some(day),
          rows_processed:      0,
          status:              RunStatus::Success,
          message:             String::new(),
        });
        continue;
      }

      tracing::warn!(line = %trimmed, "unreadable run-log line skipped");
    }

    Ok(records)
  }

  /// The current watermark, straight from the records on disk.
  pub fn watermark(&self) -> Result<Option<NaiveDate>> {
    Ok(watermark(&self.read_records()?))
  }

  /// Append one record; creates the file on first use.
  pub fn append(&self, record: &RunRecord) -> Result<()> {
    let mut file = OpenOptions::new()
      .create(true)
      .append(true)
      .open(&self.path)?;
    let line = serde_json::to_string(record)?;
    writeln!(file, "{line}")?;
    Ok(())
  }

  pub fn append_success(
    &self,
    last_processed_date: Option<NaiveDate>,
    rows_processed: u64,
    message: impl Into<String>,
  ) -> Result<()> {
    self.append(&RunRecord {
      timestamp: Utc::now(),
      last_processed_date,
      rows_processed,
      status: RunStatus::Success,
      message: message.into(),
    })
  }

  pub fn append_error(&self, message: impl Into<String>) -> Result<()> {
    self.append(&RunRecord {
      timestamp:           Utc::now(),
      last_processed_date: None,
      rows_processed:      0,
      status:              RunStatus::Error,
      message:             message.into(),
    })
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn log_in(dir: &tempfile::TempDir) -> FileRunLog {
    FileRunLog::new(dir.path().join("runs.log"))
  }

  #[test]
  fn missing_file_means_no_records() {
    let dir = tempfile::tempdir().unwrap();
    let log = log_in(&dir);
    assert!(log.read_records().unwrap().is_empty());
    assert_eq!(log.watermark().unwrap(), None);
  }

  #[test]
  fn appended_records_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let log = log_in(&dir);

    log
      .append_success(Some("2024-05-20".parse().unwrap()), 42, "ok")
      .unwrap();
    log.append_error("source unreachable").unwrap();

    let records = log.read_records().unwrap();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].status, RunStatus::Success);
    assert_eq!(records[0].rows_processed, 42);
    assert_eq!(records[1].status, RunStatus::Error);

    // Only the SUCCESS record bounds the window.
    assert_eq!(
      log.watermark().unwrap(),
      Some("2024-05-20".parse().unwrap())
    );
  }

  #[test]
  fn legacy_bare_date_lines_are_read_as_successes() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("runs.log");
    std::fs::write(&path, "2024-01-15\nnot a record\n\n").unwrap();

    let log = FileRunLog::new(&path);
    let records = log.read_records().unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].status, RunStatus::Success);
    assert_eq!(
      log.watermark().unwrap(),
      Some("2024-01-15".parse().unwrap())
    );
  }

  #[test]
  fn legacy_and_json_records_mix() {
    let dir = tempfile::tempdir().unwrap();
    let log = log_in(&dir);
    std::fs::write(log.path(), "2024-01-15\n").unwrap();

    log
      .append_success(Some("2024-02-01".parse().unwrap()), 7, "")
      .unwrap();

    assert_eq!(
      log.watermark().unwrap(),
      Some("2024-02-01".parse().unwrap())
    );
    assert_eq!(log.read_records().unwrap().len(), 2);
  }
}
