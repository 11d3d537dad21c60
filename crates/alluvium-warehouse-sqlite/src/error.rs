//! Error type for `alluvium-warehouse-sqlite`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("day parse error: {0}")]
  DayParse(String),

  #[error("unknown gender code: {0:?}")]
  UnknownGender(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
