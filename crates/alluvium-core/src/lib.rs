//! Core types and trait definitions for the Alluvium sales warehouse.
//!
//! This crate is deliberately free of HTTP and database dependencies.
//! All other crates depend on it; it depends on nothing heavier than
//! serde, chrono, and a hash.

// We intentionally use native `async fn` in traits (stabilised in Rust 1.75).
// Suppress the advisory lint about `Send` bounds on the returned futures.
#![allow(async_fn_in_trait)]

pub mod connector;
pub mod dimension;
pub mod error;
pub mod fact;
pub mod parse;
pub mod product;
pub mod runlog;
pub mod warehouse;

pub use error::{Error, Result};
