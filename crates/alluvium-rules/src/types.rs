//! Row types for the rule store's tabular REST interface, plus the mined
//! rule input and the stored-state snapshot.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ─── Stored rows ─────────────────────────────────────────────────────────────

/// A stored itemset: one row per distinct product membership.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemsetRow {
  pub itemset_id: i64,
  pub support:    f64,
  pub size:       i64,
}

/// Membership of one product in one itemset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemsetItemRow {
  pub itemset_id: i64,
  pub product_id: i64,
}

/// A stored association rule. Soft-deleted rows keep their metrics and
/// gain a `deleted_at` timestamp.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssociationRuleRow {
  pub rule_id:    i64,
  pub itemset_id: i64,
  pub support:    f64,
  pub confidence: f64,
  pub lift:       f64,
  pub active:     bool,
  pub deleted_at: Option<DateTime<Utc>>,
}

/// Membership of one product in a rule's antecedent or consequent set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleProductRow {
  pub rule_id:    i64,
  pub product_id: i64,
}

// ─── Insert payloads ─────────────────────────────────────────────────────────

/// POST body for a new itemset; the store assigns the id.
#[derive(Debug, Clone, Serialize)]
pub struct NewItemsetRow {
  pub support: f64,
  pub size:    i64,
}

/// POST body for a new association rule.
#[derive(Debug, Clone, Serialize)]
pub struct NewAssociationRuleRow {
  pub itemset_id: i64,
  pub support:    f64,
  pub confidence: f64,
  pub lift:       f64,
  pub active:     bool,
  pub deleted_at: Option<DateTime<Utc>>,
}

// ─── Mined input ─────────────────────────────────────────────────────────────

/// The exact (antecedent set, consequent set) partition identifying a
/// rule.
pub type Fingerprint = (BTreeSet<i64>, BTreeSet<i64>);

/// A freshly mined rule, before reconciliation.
#[derive(Debug, Clone, PartialEq)]
pub struct MinedRule {
  pub antecedents: BTreeSet<i64>,
  pub consequents: BTreeSet<i64>,
  pub support:     f64,
  pub confidence:  f64,
  pub lift:        f64,
}

impl MinedRule {
  /// The itemset membership this rule belongs to: antecedents ∪
  /// consequents.
  pub fn itemset(&self) -> BTreeSet<i64> {
    self.antecedents.union(&self.consequents).copied().collect()
  }

  pub fn fingerprint(&self) -> Fingerprint {
    (self.antecedents.clone(), self.consequents.clone())
  }
}

// ─── Snapshot ────────────────────────────────────────────────────────────────

/// Everything persisted in the rule store, snapshotted before a
/// reconciliation pass.
#[derive(Debug, Clone, Default)]
pub struct RuleSnapshot {
  pub itemsets:    Vec<ItemsetRow>,
  pub memberships: Vec<ItemsetItemRow>,
  pub rules:       Vec<AssociationRuleRow>,
  pub antecedents: Vec<RuleProductRow>,
  pub consequents: Vec<RuleProductRow>,
}

fn group_products(rows: &[RuleProductRow]) -> BTreeMap<i64, BTreeSet<i64>> {
  let mut map: BTreeMap<i64, BTreeSet<i64>> = BTreeMap::new();
  for row in rows {
    map.entry(row.rule_id).or_default().insert(row.product_id);
  }
  map
}

impl RuleSnapshot {
  /// Itemset id → product membership.
  pub fn itemset_members(&self) -> BTreeMap<i64, BTreeSet<i64>> {
    let mut map: BTreeMap<i64, BTreeSet<i64>> = BTreeMap::new();
    for row in &self.memberships {
      map.entry(row.itemset_id).or_default().insert(row.product_id);
    }
    map
  }

  /// Rule id → antecedent product set.
  pub fn antecedents_of(&self) -> BTreeMap<i64, BTreeSet<i64>> {
    group_products(&self.antecedents)
  }

  /// Rule id → consequent product set.
  pub fn consequents_of(&self) -> BTreeMap<i64, BTreeSet<i64>> {
    group_products(&self.consequents)
  }
}
