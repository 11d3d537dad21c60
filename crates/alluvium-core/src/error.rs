//! Error types for `alluvium-core`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("unparsable amount: {0:?}")]
  BadAmount(String),

  #[error("unparsable date: {0:?}")]
  BadDate(String),

  /// A line item that carries no product identifier at all.
  #[error("line item has no product identifier")]
  NoProductIdentifier,
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
