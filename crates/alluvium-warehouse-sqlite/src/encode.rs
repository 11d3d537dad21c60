//! Encoding and decoding helpers between Rust domain types and the
//! plain-text representations stored in SQLite columns.
//!
//! Calendar dates are stored as `YYYY-MM-DD` strings; gender as its
//! single-letter code.

use alluvium_core::dimension::{Customer, Gender, TimeEntry};
use chrono::NaiveDate;

use crate::{Error, Result};

// ─── Day ─────────────────────────────────────────────────────────────────────

pub fn encode_day(day: NaiveDate) -> String {
  day.format("%Y-%m-%d").to_string()
}

pub fn decode_day(s: &str) -> Result<NaiveDate> {
  NaiveDate::parse_from_str(s, "%Y-%m-%d")
    .map_err(|e| Error::DayParse(format!("{s:?}: {e}")))
}

// ─── Gender ──────────────────────────────────────────────────────────────────

pub fn encode_gender(g: Gender) -> &'static str { g.code() }

pub fn decode_gender(s: &str) -> Result<Gender> {
  match s {
    "M" => Ok(Gender::Male),
    "F" => Ok(Gender::Female),
    "U" => Ok(Gender::Unknown),
    other => Err(Error::UnknownGender(other.to_owned())),
  }
}

// ─── Row types ───────────────────────────────────────────────────────────────

/// Raw strings read directly from a `dim_customer` row.
pub struct RawCustomerRow {
  pub customer_id:   i64,
  pub email:         String,
  pub name:          String,
  pub gender:        String,
  pub country:       Option<String>,
  pub registered_on: Option<String>,
}

impl RawCustomerRow {
  pub fn into_customer(self) -> Result<Customer> {
    Ok(Customer {
      customer_id:   self.customer_id,
      email:         self.email,
      name:          self.name,
      gender:        decode_gender(&self.gender)?,
      country:       self.country,
      registered_on: self
        .registered_on
        .as_deref()
        .map(decode_day)
        .transpose()?,
    })
  }
}

/// Raw strings read directly from a `dim_time` row.
pub struct RawTimeRow {
  pub time_id:  i64,
  pub date:     String,
  pub year:     i32,
  pub month:    u32,
  pub day:      u32,
  pub iso_week: u32,
  pub weekday:  String,
  pub fx_rate:  Option<f64>,
}

impl RawTimeRow {
  pub fn into_entry(self) -> Result<TimeEntry> {
    Ok(TimeEntry {
      time_id:  self.time_id,
      date:     decode_day(&self.date)?,
      year:     self.year,
      month:    self.month,
      day:      self.day,
      iso_week: self.iso_week,
      weekday:  self.weekday,
      fx_rate:  self.fx_rate,
    })
  }
}
