//! Error types for `alluvium-engine`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  /// A source system could not be reached or read. The run aborts, an
  /// ERROR record is appended, and the watermark stays put.
  #[error("extraction from {source_name} failed: {message}")]
  Extraction { source_name: String, message: String },

  #[error("core error: {0}")]
  Core(#[from] alluvium_core::Error),

  #[error("warehouse error: {0}")]
  Warehouse(#[source] Box<dyn std::error::Error + Send + Sync>),

  #[error("run log I/O error: {0}")]
  RunLog(#[from] std::io::Error),

  #[error("run log record error: {0}")]
  RunLogRecord(#[from] serde_json::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
