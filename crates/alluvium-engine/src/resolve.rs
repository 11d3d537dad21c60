//! The entity resolver — any source product code to one canonical product.
//!
//! Resolution is deterministic: a code that has never been seen gets a SKU
//! derived purely from its bytes, so any process, in any run order, lands
//! on the same canonical product. No counters, no per-run state.

use alluvium_core::{
  Error as CoreError,
  product::{Product, SourceProductRef, derive_sku},
  warehouse::Warehouse,
};

use crate::{Error, Result};

/// Resolves source product references against the equivalence table,
/// creating canonical products and equivalences on first encounter.
pub struct EntityResolver<'a, W> {
  warehouse: &'a W,
}

impl<'a, W: Warehouse> EntityResolver<'a, W> {
  pub fn new(warehouse: &'a W) -> Self { Self { warehouse } }

  /// Resolve `reference` to its canonical product.
  ///
  /// If the reference's descriptive data disagrees with what was first
  /// stored, the stored mapping wins and the conflict is logged as a
  /// warning.
  pub async fn resolve(&self, reference: &SourceProductRef) -> Result<Product> {
    let existing = self
      .warehouse
      .find_equivalence(reference.clone())
      .await
      .map_err(|e| Error::Warehouse(Box::new(e)))?;

    let (sku, newly_mapped) = match existing {
      Some(equivalence) => (equivalence.sku, false),
      None => {
        let strongest = reference
          .strongest_identifier()
          .ok_or(Error::Core(CoreError::NoProductIdentifier))?;
        (derive_sku(strongest), true)
      }
    };

    let product = self
      .warehouse
      .get_or_create_product(
        sku.clone(),
        reference.name.clone(),
        reference.category.clone(),
      )
      .await
      .map_err(|e| Error::Warehouse(Box::new(e)))?;

    if newly_mapped {
      self
        .warehouse
        .insert_equivalence(sku, reference.clone())
        .await
        .map_err(|e| Error::Warehouse(Box::new(e)))?;
    }

    warn_on_conflict(&product, reference);
    Ok(product)
  }
}

/// First-resolved mapping wins; later disagreement is reported, never
/// auto-corrected.
fn warn_on_conflict(product: &Product, reference: &SourceProductRef) {
  let name_conflict = matches!(
    (&product.name, &reference.name),
    (Some(stored), Some(incoming)) if stored != incoming
  );
  let category_conflict = matches!(
    (&product.category, &reference.category),
    (Some(stored), Some(incoming)) if stored != incoming
  );

  if name_conflict || category_conflict {
    tracing::warn!(
      sku = %product.sku,
      stored_name = ?product.name,
      incoming_name = ?reference.name,
      stored_category = ?product.category,
      incoming_category = ?reference.category,
      "conflicting product data for an already-resolved code; keeping the stored mapping",
    );
  }
}

#[cfg(test)]
mod tests {
  use alluvium_warehouse_sqlite::SqliteWarehouse;

  use super::*;

  fn reference(native: Option<&str>, alt: Option<&str>) -> SourceProductRef {
    SourceProductRef {
      native_sku: native.map(Into::into),
      alt_code:   alt.map(Into::into),
      source_ref: None,
      name:       Some("Widget".into()),
      category:   Some("Gadgets".into()),
    }
  }

  #[tokio::test]
  async fn resolving_twice_yields_the_same_product() {
    let w = SqliteWarehouse::open_in_memory().await.unwrap();
    let resolver = EntityResolver::new(&w);
    let reference = reference(None, Some("ALT-1"));

    let first = resolver.resolve(&reference).await.unwrap();
    let second = resolver.resolve(&reference).await.unwrap();
    assert_eq!(first.product_id, second.product_id);
    assert_eq!(first.sku, second.sku);
  }

  #[tokio::test]
  async fn a_weaker_identifier_finds_the_existing_mapping() {
    let w = SqliteWarehouse::open_in_memory().await.unwrap();
    let resolver = EntityResolver::new(&w);

    let full = reference(Some("NS-7"), Some("ALT-7"));
    let resolved = resolver.resolve(&full).await.unwrap();

    // A later extraction that only knows the alternate code must land on
    // the same canonical product.
    let partial = reference(None, Some("ALT-7"));
    let re_resolved = resolver.resolve(&partial).await.unwrap();
    assert_eq!(re_resolved.product_id, resolved.product_id);
  }

  #[tokio::test]
  async fn derivation_matches_across_independent_stores() {
    let w1 = SqliteWarehouse::open_in_memory().await.unwrap();
    let w2 = SqliteWarehouse::open_in_memory().await.unwrap();
    let reference = reference(None, Some("ALT-42"));

    let a = EntityResolver::new(&w1).resolve(&reference).await.unwrap();
    let b = EntityResolver::new(&w2).resolve(&reference).await.unwrap();
    assert_eq!(a.sku, b.sku);
  }

  #[tokio::test]
  async fn conflicting_data_keeps_the_first_mapping() {
    let w = SqliteWarehouse::open_in_memory().await.unwrap();
    let resolver = EntityResolver::new(&w);

    let first = reference(None, Some("ALT-9"));
    let resolved = resolver.resolve(&first).await.unwrap();

    let mut conflicting = reference(None, Some("ALT-9"));
    conflicting.name = Some("Completely Different".into());

    let re_resolved = resolver.resolve(&conflicting).await.unwrap();
    assert_eq!(re_resolved.product_id, resolved.product_id);
    assert_eq!(re_resolved.name.as_deref(), Some("Widget"));
  }

  #[tokio::test]
  async fn reference_without_identifiers_is_rejected() {
    let w = SqliteWarehouse::open_in_memory().await.unwrap();
    let resolver = EntityResolver::new(&w);

    let empty = SourceProductRef {
      name: Some("Nameless".into()),
      ..Default::default()
    };
    let err = resolver.resolve(&empty).await.unwrap_err();
    assert!(matches!(err, Error::Core(CoreError::NoProductIdentifier)));
  }
}
