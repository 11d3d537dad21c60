//! Error type for `alluvium-rules`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("http error: {0}")]
  Http(#[from] reqwest::Error),

  #[error("rule store returned status {status} for table {table}")]
  Api { table: String, status: u16 },

  #[error("rule store returned no representation for an insert into {0}")]
  MissingRepresentation(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
