//! Association-rule lifecycle reconciliation.
//!
//! A mining pass produces (antecedents → consequents) rules carrying
//! support, confidence, and lift. This crate versions them against the
//! rule store: an identical active rule is skipped, drifted metrics
//! soft-delete the old version and insert a new one, and fingerprints
//! absent from the mined set are retired. At most one active rule exists
//! per (antecedent set, consequent set) fingerprint at any time; history
//! is preserved through soft-deletes, never physically removed.
//!
//! Reconciliation is computed as a pure [`plan`](plan::plan) over a
//! snapshot of the stored tables, then applied through the REST client, so
//! the whole algorithm is testable without a server.

pub mod client;
pub mod error;
pub mod plan;
pub mod reconciler;
pub mod types;

pub use error::{Error, Result};
pub use reconciler::Reconciler;
