//! Dimension records — the who/when/where context around sales facts.
//!
//! Dimensions are created on first encounter and never mutated afterwards.
//! Surrogate ids are assigned by the warehouse; the fields here are the
//! natural keys and descriptive attributes.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

// ─── Gender ──────────────────────────────────────────────────────────────────

/// Customer gender, normalized from whatever labels the sources use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
  Male,
  Female,
  Unknown,
}

impl Gender {
  /// Map a source label onto the warehouse vocabulary. Sources disagree on
  /// spelling and language; only the leading letter is trusted.
  pub fn from_source_label(label: &str) -> Self {
    match label.trim().chars().next().map(|c| c.to_ascii_uppercase()) {
      Some('M') => Self::Male,
      Some('F') => Self::Female,
      _ => Self::Unknown,
    }
  }

  /// Single-letter code stored in the warehouse.
  pub fn code(self) -> &'static str {
    match self {
      Self::Male => "M",
      Self::Female => "F",
      Self::Unknown => "U",
    }
  }
}

// ─── Customer ────────────────────────────────────────────────────────────────

/// Input to the customer get-or-create; the email is the natural key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewCustomer {
  pub email:         String,
  pub name:          String,
  pub gender:        Gender,
  pub country:       Option<String>,
  pub registered_on: Option<NaiveDate>,
}

/// A customer dimension row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Customer {
  pub customer_id:   i64,
  pub email:         String,
  pub name:          String,
  pub gender:        Gender,
  pub country:       Option<String>,
  pub registered_on: Option<NaiveDate>,
}

// ─── Channel ─────────────────────────────────────────────────────────────────

/// A sales channel dimension row; the name is the natural key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Channel {
  pub channel_id: i64,
  pub name:       String,
}

// ─── Time ────────────────────────────────────────────────────────────────────

/// Input to the time get-or-create, with all calendar fields derived.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewTimeEntry {
  pub date:     NaiveDate,
  pub year:     i32,
  pub month:    u32,
  pub day:      u32,
  pub iso_week: u32,
  /// English weekday name, e.g. `"Monday"`.
  pub weekday:  String,
  /// Local-units-per-USD; `None` when no rate is known yet.
  pub fx_rate:  Option<f64>,
}

impl NewTimeEntry {
  /// Derive every calendar field from the date. The fx rate starts
  /// unknown; the warehouse applies its insertion default.
  pub fn for_date(date: NaiveDate) -> Self {
    Self {
      date,
      year: date.year(),
      month: date.month(),
      day: date.day(),
      iso_week: date.iso_week().week(),
      weekday: date.format("%A").to_string(),
      fx_rate: None,
    }
  }
}

/// A time dimension row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeEntry {
  pub time_id:  i64,
  pub date:     NaiveDate,
  pub year:     i32,
  pub month:    u32,
  pub day:      u32,
  pub iso_week: u32,
  pub weekday:  String,
  pub fx_rate:  Option<f64>,
}
