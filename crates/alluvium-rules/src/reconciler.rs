//! Snapshot, plan, apply.

use chrono::{SecondsFormat, Utc};
use serde_json::json;

use crate::{
  Error, Result,
  client::TableClient,
  plan::{ItemsetRef, ReconcilePlan, plan},
  types::{
    AssociationRuleRow, ItemsetItemRow, ItemsetRow, MinedRule,
    NewAssociationRuleRow, NewItemsetRow, RuleProductRow, RuleSnapshot,
  },
};

/// Applies mined rules to the rule store, one reconciliation pass at a
/// time.
pub struct Reconciler {
  client: TableClient,
}

impl Reconciler {
  pub fn new(client: TableClient) -> Self { Self { client } }

  /// Fetch all five rule tables as the pass's working snapshot.
  pub async fn snapshot(&self) -> Result<RuleSnapshot> {
    Ok(RuleSnapshot {
      itemsets:    self.client.fetch_all("itemset").await?,
      memberships: self.client.fetch_all("itemset_item").await?,
      rules:       self.client.fetch_all("association_rule").await?,
      antecedents: self.client.fetch_all("rule_antecedent").await?,
      consequents: self.client.fetch_all("rule_consequent").await?,
    })
  }

  /// One full pass: snapshot, plan, apply. Returns the executed plan.
  pub async fn reconcile(&self, mined: &[MinedRule]) -> Result<ReconcilePlan> {
    let snapshot = self.snapshot().await?;
    let plan = plan(&snapshot, mined);
    tracing::info!(
      deactivate = plan.deactivate.len(),
      new_itemsets = plan.new_itemsets.len(),
      new_rules = plan.new_rules.len(),
      skipped = plan.skipped_identical,
      "reconciliation planned",
    );
    self.apply(&plan).await?;
    Ok(plan)
  }

  /// Execute a plan: soft-deletes first, then new itemsets with their
  /// memberships, then new rules with their partition rows.
  pub async fn apply(&self, plan: &ReconcilePlan) -> Result<()> {
    let deleted_at =
      Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true);

    for rule_id in &plan.deactivate {
      let body = json!({ "active": false, "deleted_at": deleted_at });
      match self
        .client
        .patch_by_id("association_rule", "rule_id", *rule_id, &body)
        .await
      {
        Ok(()) => tracing::info!(rule_id, "rule soft-deleted"),
        // The rule stays active; the next pass will retire it again.
        Err(e) => {
          tracing::warn!(rule_id, error = %e, "soft-delete failed; rule left active");
        }
      }
    }

    let mut planned_ids = Vec::with_capacity(plan.new_itemsets.len());
    for planned in &plan.new_itemsets {
      let created: Vec<ItemsetRow> = self
        .client
        .insert("itemset", &[NewItemsetRow {
          support: planned.support,
          size:    planned.items.len() as i64,
        }])
        .await?;
      let itemset_id = created
        .first()
        .ok_or_else(|| Error::MissingRepresentation("itemset".into()))?
        .itemset_id;

      let members: Vec<ItemsetItemRow> = planned
        .items
        .iter()
        .map(|product_id| ItemsetItemRow { itemset_id, product_id: *product_id })
        .collect();
      let _: Vec<ItemsetItemRow> =
        self.client.insert("itemset_item", &members).await?;

      planned_ids.push(itemset_id);
    }

    for rule in &plan.new_rules {
      let itemset_id = match rule.itemset {
        ItemsetRef::Existing(id) => id,
        ItemsetRef::Planned(idx) => planned_ids[idx],
      };

      let created: Vec<AssociationRuleRow> = self
        .client
        .insert("association_rule", &[NewAssociationRuleRow {
          itemset_id,
          support: rule.support,
          confidence: rule.confidence,
          lift: rule.lift,
          active: true,
          deleted_at: None,
        }])
        .await?;
      let rule_id = created
        .first()
        .ok_or_else(|| {
          Error::MissingRepresentation("association_rule".into())
        })?
        .rule_id;

      let antecedents: Vec<RuleProductRow> = rule
        .antecedents
        .iter()
        .map(|product_id| RuleProductRow { rule_id, product_id: *product_id })
        .collect();
      let consequents: Vec<RuleProductRow> = rule
        .consequents
        .iter()
        .map(|product_id| RuleProductRow { rule_id, product_id: *product_id })
        .collect();

      let _: Vec<RuleProductRow> =
        self.client.insert("rule_antecedent", &antecedents).await?;
      let _: Vec<RuleProductRow> =
        self.client.insert("rule_consequent", &consequents).await?;

      tracing::info!(rule_id, itemset_id, "rule inserted");
    }

    Ok(())
  }
}
