//! Exchange-rate ingestion for the Alluvium warehouse.
//!
//! The upstream rate service (a SOAP endpoint in production) stays behind
//! the [`provider::RateProvider`] seam; this crate owns what happens with
//! the rates once fetched — chunked historical backfill, daily refresh,
//! and writes into the time dimension.

#![allow(async_fn_in_trait)]

pub mod error;
pub mod feed;
pub mod provider;

pub use error::{Error, Result};
pub use feed::RateFeed;
pub use provider::{DatedRate, RateProvider};
