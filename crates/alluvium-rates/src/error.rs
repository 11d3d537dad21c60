//! Error type for `alluvium-rates`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("rate provider error: {0}")]
  Provider(#[source] Box<dyn std::error::Error + Send + Sync>),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
