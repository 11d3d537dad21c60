//! Pure reconciliation planning.
//!
//! `plan` decides every write a reconciliation pass will perform, from the
//! stored snapshot and the mined set alone. No I/O happens here; the
//! executor in [`crate::reconciler`] carries the plan out.

use std::collections::{BTreeMap, BTreeSet};

use crate::types::{AssociationRuleRow, Fingerprint, MinedRule, RuleSnapshot};

/// Metric comparisons use this tolerance; within it a re-mined rule is the
/// same version and no new row is written.
pub const METRIC_EPSILON: f64 = 1e-6;

/// Where a planned rule insert gets its itemset id from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemsetRef {
  Existing(i64),
  /// Index into [`ReconcilePlan::new_itemsets`].
  Planned(usize),
}

/// An itemset the plan will create, with its membership.
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedItemset {
  pub items:   BTreeSet<i64>,
  pub support: f64,
}

/// One active rule the plan will insert.
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedRule {
  pub itemset:     ItemsetRef,
  pub antecedents: BTreeSet<i64>,
  pub consequents: BTreeSet<i64>,
  pub support:     f64,
  pub confidence:  f64,
  pub lift:        f64,
}

/// The writes one reconciliation pass will perform.
#[derive(Debug, Clone, Default)]
pub struct ReconcilePlan {
  /// Rule ids to soft-delete (`active = false`, `deleted_at = now`).
  pub deactivate:        Vec<i64>,
  pub new_itemsets:      Vec<PlannedItemset>,
  pub new_rules:         Vec<PlannedRule>,
  /// Mined rules skipped because an identical active version exists.
  pub skipped_identical: u64,
}

impl ReconcilePlan {
  /// True when applying the plan would write nothing.
  pub fn is_noop(&self) -> bool {
    self.deactivate.is_empty()
      && self.new_itemsets.is_empty()
      && self.new_rules.is_empty()
  }
}

fn metrics_match(stored: &AssociationRuleRow, mined: &MinedRule) -> bool {
  (stored.support - mined.support).abs() < METRIC_EPSILON
    && (stored.confidence - mined.confidence).abs() < METRIC_EPSILON
    && (stored.lift - mined.lift).abs() < METRIC_EPSILON
}

/// Compute the reconciliation plan for `mined` against `snapshot`.
pub fn plan(snapshot: &RuleSnapshot, mined: &[MinedRule]) -> ReconcilePlan {
  let members = snapshot.itemset_members();
  let ants = snapshot.antecedents_of();
  let cons = snapshot.consequents_of();

  let mut plan = ReconcilePlan::default();

  // Pre-pass: retire every active rule whose fingerprint is absent from
  // the mined set. Rules that no longer hold disappear from the active
  // view but stay on record.
  let mined_fps: BTreeSet<Fingerprint> =
    mined.iter().map(MinedRule::fingerprint).collect();
  for rule in snapshot.rules.iter().filter(|r| r.active) {
    let fingerprint = (
      ants.get(&rule.rule_id).cloned().unwrap_or_default(),
      cons.get(&rule.rule_id).cloned().unwrap_or_default(),
    );
    if !mined_fps.contains(&fingerprint) {
      plan.deactivate.push(rule.rule_id);
    }
  }

  let itemset_by_members: BTreeMap<&BTreeSet<i64>, i64> =
    members.iter().map(|(id, set)| (set, *id)).collect();
  let mut planned_by_members: BTreeMap<BTreeSet<i64>, usize> = BTreeMap::new();

  let mut active_by_itemset: BTreeMap<i64, Vec<&AssociationRuleRow>> =
    BTreeMap::new();
  for rule in snapshot.rules.iter().filter(|r| r.active) {
    active_by_itemset.entry(rule.itemset_id).or_default().push(rule);
  }

  for rule in mined {
    let union = rule.itemset();

    let itemset = if let Some(id) = itemset_by_members.get(&union) {
      ItemsetRef::Existing(*id)
    } else if let Some(idx) = planned_by_members.get(&union) {
      ItemsetRef::Planned(*idx)
    } else {
      let idx = plan.new_itemsets.len();
      plan
        .new_itemsets
        .push(PlannedItemset { items: union.clone(), support: rule.support });
      planned_by_members.insert(union, idx);
      ItemsetRef::Planned(idx)
    };

    // Within the itemset, look for an active rule with the identical
    // antecedent/consequent partition.
    let existing = match itemset {
      ItemsetRef::Existing(id) => {
        active_by_itemset.get(&id).and_then(|rules| {
          rules
            .iter()
            .find(|r| {
              ants
                .get(&r.rule_id)
                .map_or(rule.antecedents.is_empty(), |a| *a == rule.antecedents)
                && cons
                  .get(&r.rule_id)
                  .map_or(rule.consequents.is_empty(), |c| {
                    *c == rule.consequents
                  })
            })
            .copied()
        })
      }
      ItemsetRef::Planned(_) => None,
    };

    if let Some(existing) = existing {
      if metrics_match(existing, rule) {
        // Unchanged data must not produce a redundant version.
        plan.skipped_identical += 1;
        continue;
      }
      plan.deactivate.push(existing.rule_id);
    }

    plan.new_rules.push(PlannedRule {
      itemset,
      antecedents: rule.antecedents.clone(),
      consequents: rule.consequents.clone(),
      support: rule.support,
      confidence: rule.confidence,
      lift: rule.lift,
    });
  }

  plan
}
