//! Product identity — canonical products and source-code equivalences.
//!
//! Every source system names products its own way. The equivalence table
//! maps any source code onto one canonical SKU; the SKU itself is derived
//! deterministically from the code bytes, so re-resolving the same code in
//! any process, in any order, lands on the same product.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// A product dimension row, keyed by canonical SKU. Created lazily, never
/// deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Product {
  pub product_id: i64,
  pub sku:        String,
  pub name:       Option<String>,
  pub category:   Option<String>,
}

/// The identifiers a source system supplies for one product, strongest
/// first: its own SKU-like code, an alternate code, an internal record id.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceProductRef {
  pub native_sku: Option<String>,
  pub alt_code:   Option<String>,
  pub source_ref: Option<String>,
  pub name:       Option<String>,
  pub category:   Option<String>,
}

impl SourceProductRef {
  /// The strongest identifier present; used both as the aggregation
  /// grouping key and as the input to SKU derivation.
  pub fn strongest_identifier(&self) -> Option<&str> {
    self
      .native_sku
      .as_deref()
      .or(self.alt_code.as_deref())
      .or(self.source_ref.as_deref())
  }
}

/// One source-code combination mapped to a canonical SKU. At most one row
/// exists per distinct source code.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Equivalence {
  pub equivalence_id: i64,
  pub sku:            String,
  pub native_sku:     Option<String>,
  pub alt_code:       Option<String>,
  pub source_ref:     Option<String>,
}

/// Derive a canonical SKU from a source identifier.
///
/// A pure function of the identifier bytes: SHA-256, first four bytes as
/// uppercase hex. No counters and no per-run state.
pub fn derive_sku(identifier: &str) -> String {
  let digest = Sha256::digest(identifier.as_bytes());
  format!("SKU-{}", hex::encode_upper(&digest[..4]))
}
