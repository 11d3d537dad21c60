//! The aggregator — raw line items to pre-fact groups.
//!
//! Groups by (customer, strongest product identifier, calendar day and,
//! configurably, channel). Dates and prices arrive as text; a value the
//! parse chokepoint rejects drops that line item as a row error and the
//! run continues.

use std::collections::BTreeMap;

use alluvium_core::{
  connector::RawLineItem,
  dimension::{Gender, NewCustomer},
  fact::PreFact,
  parse::{parse_amount, parse_day},
  product::SourceProductRef,
};
use chrono::NaiveDate;

use crate::config::{DiscountPolicy, EngineConfig};

/// What aggregation produced, plus how much input it had to drop.
#[derive(Debug)]
pub struct AggregateOutcome {
  pub pre_facts:  Vec<PreFact>,
  /// Line items dropped for malformed dates, malformed amounts, or a
  /// missing product identifier.
  pub row_errors: u64,
  /// The maximum order date seen across accepted line items.
  pub max_day:    Option<NaiveDate>,
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
struct GroupKey {
  email:   String,
  product: String,
  day:     NaiveDate,
  channel: Option<String>,
}

struct GroupAccum {
  customer:   NewCustomer,
  product:    SourceProductRef,
  currency:   String,
  quantity:   i64,
  total:      f64,
  price_sum:  f64,
  line_count: u32,
}

/// Collapse raw line items into one pre-fact per group.
pub fn aggregate(
  items: Vec<RawLineItem>,
  config: &EngineConfig,
) -> AggregateOutcome {
  let mut groups: BTreeMap<GroupKey, GroupAccum> = BTreeMap::new();
  let mut row_errors = 0u64;
  let mut max_day: Option<NaiveDate> = None;

  for item in items {
    let day = match parse_day(&item.order_date) {
      Ok(day) => day,
      Err(e) => {
        tracing::error!(error = %e, "line item skipped");
        row_errors += 1;
        continue;
      }
    };
    let price = match parse_amount(&item.unit_price) {
      Ok(price) => price,
      Err(e) => {
        tracing::error!(error = %e, "line item skipped");
        row_errors += 1;
        continue;
      }
    };
    let Some(product_key) =
      item.product.strongest_identifier().map(str::to_owned)
    else {
      tracing::error!(
        customer = %item.customer.email,
        "line item skipped: no product identifier",
      );
      row_errors += 1;
      continue;
    };

    if max_day.map_or(true, |m| day > m) {
      max_day = Some(day);
    }

    let discount_factor = match (config.discount_policy, item.discount_pct) {
      (DiscountPolicy::Apply, Some(pct)) => 1.0 - pct / 100.0,
      _ => 1.0,
    };

    let key = GroupKey {
      email: item.customer.email.clone(),
      product: product_key,
      day,
      channel: if config.group_by_channel {
        item.channel.clone()
      } else {
        None
      },
    };

    let entry = groups.entry(key).or_insert_with(|| GroupAccum {
      customer:   NewCustomer {
        email:         item.customer.email.clone(),
        name:          item.customer.name.clone(),
        gender:        Gender::from_source_label(&item.customer.gender_label),
        country:       item.customer.country.clone(),
        // A malformed registration date degrades to unknown.
        registered_on: item
          .customer
          .registered_on
          .as_deref()
          .and_then(|d| parse_day(d).ok()),
      },
      product:    item.product.clone(),
      currency:   item.currency.clone(),
      quantity:   0,
      total:      0.0,
      price_sum:  0.0,
      line_count: 0,
    });

    entry.quantity += item.quantity;
    entry.total += item.quantity as f64 * price * discount_factor;
    entry.price_sum += price;
    entry.line_count += 1;
  }

  let pre_facts = groups
    .into_iter()
    .map(|(key, acc)| PreFact {
      customer:          acc.customer,
      product:           acc.product,
      day:               key.day,
      channel:           key.channel,
      currency:          acc.currency,
      quantity:          acc.quantity,
      unit_price_native: acc.price_sum / f64::from(acc.line_count),
      total_native:      acc.total,
    })
    .collect();

  AggregateOutcome { pre_facts, row_errors, max_day }
}

#[cfg(test)]
mod tests {
  use alluvium_core::connector::RawCustomer;

  use super::*;

  fn raw_customer(email: &str) -> RawCustomer {
    RawCustomer {
      email:         email.into(),
      name:          "Alice".into(),
      gender_label:  "F".into(),
      country:       None,
      registered_on: None,
    }
  }

  fn line(
    email: &str,
    alt_code: &str,
    date: &str,
    qty: i64,
    price: &str,
  ) -> RawLineItem {
    RawLineItem {
      customer:     raw_customer(email),
      product:      SourceProductRef {
        alt_code: Some(alt_code.into()),
        ..Default::default()
      },
      order_date:   date.into(),
      channel:      Some("online".into()),
      currency:     "USD".into(),
      quantity:     qty,
      unit_price:   price.into(),
      discount_pct: None,
    }
  }

  #[test]
  fn sums_quantity_and_total_per_group() {
    let items = vec![
      line("a@example.com", "ALT-1", "2024-03-01", 3, "10"),
      line("a@example.com", "ALT-1", "2024-03-01", 5, "10"),
    ];
    let out = aggregate(items, &EngineConfig::default());

    assert_eq!(out.pre_facts.len(), 1);
    let pre = &out.pre_facts[0];
    assert_eq!(pre.quantity, 8);
    assert_eq!(pre.total_native, 80.0);
    assert_eq!(pre.unit_price_native, 10.0);
    assert_eq!(out.row_errors, 0);
  }

  #[test]
  fn unit_price_is_the_arithmetic_mean() {
    let items = vec![
      line("a@example.com", "ALT-1", "2024-03-01", 1, "10"),
      line("a@example.com", "ALT-1", "2024-03-01", 1, "20"),
    ];
    let out = aggregate(items, &EngineConfig::default());
    assert_eq!(out.pre_facts[0].unit_price_native, 15.0);
  }

  #[test]
  fn distinct_days_form_distinct_groups() {
    let items = vec![
      line("a@example.com", "ALT-1", "2024-03-01", 1, "10"),
      line("a@example.com", "ALT-1", "2024-03-02", 1, "10"),
    ];
    let out = aggregate(items, &EngineConfig::default());
    assert_eq!(out.pre_facts.len(), 2);
    assert_eq!(out.max_day, Some("2024-03-02".parse().unwrap()));
  }

  #[test]
  fn discount_applies_when_the_policy_says_so() {
    let mut item = line("a@example.com", "ALT-1", "2024-03-01", 2, "100");
    item.discount_pct = Some(10.0);

    let out = aggregate(vec![item.clone()], &EngineConfig::default());
    assert_eq!(out.pre_facts[0].total_native, 180.0);

    let config = EngineConfig {
      discount_policy: DiscountPolicy::Ignore,
      ..Default::default()
    };
    let out = aggregate(vec![item], &config);
    assert_eq!(out.pre_facts[0].total_native, 200.0);
  }

  #[test]
  fn channel_grouping_is_a_config_choice() {
    let mut online = line("a@example.com", "ALT-1", "2024-03-01", 1, "10");
    let mut retail = line("a@example.com", "ALT-1", "2024-03-01", 1, "10");
    online.channel = Some("online".into());
    retail.channel = Some("retail".into());

    let out = aggregate(
      vec![online.clone(), retail.clone()],
      &EngineConfig::default(),
    );
    assert_eq!(out.pre_facts.len(), 2);

    let config = EngineConfig {
      group_by_channel: false,
      ..Default::default()
    };
    let out = aggregate(vec![online, retail], &config);
    assert_eq!(out.pre_facts.len(), 1);
    assert_eq!(out.pre_facts[0].quantity, 2);
    assert!(out.pre_facts[0].channel.is_none());
  }

  #[test]
  fn malformed_rows_are_counted_and_skipped() {
    let items = vec![
      line("a@example.com", "ALT-1", "2024-03-01", 1, "10"),
      line("a@example.com", "ALT-1", "not-a-date", 1, "10"),
      line("a@example.com", "ALT-1", "2024-03-01", 1, "ten dollars"),
    ];
    let out = aggregate(items, &EngineConfig::default());
    assert_eq!(out.row_errors, 2);
    assert_eq!(out.pre_facts.len(), 1);
    assert_eq!(out.pre_facts[0].quantity, 1);
  }

  #[test]
  fn item_without_any_product_identifier_is_a_row_error() {
    let mut item = line("a@example.com", "ALT-1", "2024-03-01", 1, "10");
    item.product = SourceProductRef::default();

    let out = aggregate(vec![item], &EngineConfig::default());
    assert_eq!(out.row_errors, 1);
    assert!(out.pre_facts.is_empty());
  }

  #[test]
  fn thousands_separators_parse_through_the_chokepoint() {
    let items = vec![
      line("a@example.com", "ALT-1", "2024-03-01", 1, "1,200.50"),
      line("a@example.com", "ALT-1", "2024-03-01", 1, "1200,50"),
    ];
    let out = aggregate(items, &EngineConfig::default());
    assert_eq!(out.pre_facts[0].total_native, 2401.0);
  }
}
