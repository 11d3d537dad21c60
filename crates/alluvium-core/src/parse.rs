//! Normalization of raw source strings.
//!
//! Source systems hand over dates and monetary values as text, with comma
//! and dot conventions that differ per system. Every string-to-value
//! conversion in the pipeline goes through this module, so the cleanup
//! rules live in exactly one place.

use chrono::{DateTime, NaiveDate};

use crate::{Error, Result};

/// Parse a monetary or numeric string.
///
/// Interpretation rules, in order:
/// - both comma and dot present: commas are thousands separators
/// - comma only: the comma is the decimal separator
/// - otherwise: plain decimal
///
/// `"1,200.50"`, `"1200,50"` and `"1200.50"` all parse to `1200.50`.
pub fn parse_amount(raw: &str) -> Result<f64> {
  let trimmed: String = raw.trim().replace(' ', "");
  if trimmed.is_empty() {
    return Err(Error::BadAmount(raw.to_owned()));
  }

  let cleaned = if trimmed.contains(',') && trimmed.contains('.') {
    trimmed.replace(',', "")
  } else if trimmed.contains(',') {
    trimmed.replace(',', ".")
  } else {
    trimmed
  };

  cleaned
    .parse::<f64>()
    .map_err(|_| Error::BadAmount(raw.to_owned()))
}

/// Parse a calendar day from either a plain `YYYY-MM-DD` or a full
/// RFC 3339 timestamp (some sources export order dates with a time part).
pub fn parse_day(raw: &str) -> Result<NaiveDate> {
  let trimmed = raw.trim();
  if let Ok(day) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
    return Ok(day);
  }
  DateTime::parse_from_rfc3339(trimmed)
    .map(|dt| dt.date_naive())
    .map_err(|_| Error::BadDate(raw.to_owned()))
}

/// Round a monetary amount to 2 decimals, half up.
pub fn round2(amount: f64) -> f64 { (amount * 100.0).round() / 100.0 }
