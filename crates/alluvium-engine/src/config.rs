//! Engine configuration.
//!
//! Behavioral differences that were implicit in earlier per-source loaders
//! (channel grouping, discount handling) are explicit knobs here, so every
//! connector runs under the same documented policy.

use std::path::{Path, PathBuf};

use serde::Deserialize;

/// Whether line-item discount percentages participate in aggregation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiscountPolicy {
  /// `total = Σ qty · price · (1 − pct/100)`.
  Apply,
  /// Totals use the undiscounted price.
  Ignore,
}

/// Tunables for one engine instance. Every field has a default, so an
/// empty configuration is valid.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
  /// The warehouse reporting currency.
  pub reporting_currency: String,
  /// Fallback local-per-USD rate for order dates with no stored rate.
  pub default_fx_rate:    f64,
  /// Whether the sales channel participates in the fact natural key.
  pub group_by_channel:   bool,
  pub discount_policy:    DiscountPolicy,
  /// Fact inserts are committed every this many rows.
  pub commit_batch_size:  usize,
  /// Where the append-only run log lives.
  pub run_log_path:       PathBuf,
}

impl Default for EngineConfig {
  fn default() -> Self {
    Self {
      reporting_currency: "USD".into(),
      default_fx_rate:    520.0,
      group_by_channel:   true,
      discount_policy:    DiscountPolicy::Apply,
      commit_batch_size:  50,
      run_log_path:       PathBuf::from("alluvium_runs.log"),
    }
  }
}

impl EngineConfig {
  /// Load from a TOML file (optional — defaults apply when absent),
  /// overlaid with `ALLUVIUM_*` environment variables.
  pub fn load(path: impl AsRef<Path>) -> Result<Self, config::ConfigError> {
    config::Config::builder()
      .add_source(config::File::from(path.as_ref()).required(false))
      .add_source(config::Environment::with_prefix("ALLUVIUM"))
      .build()?
      .try_deserialize()
  }
}

#[cfg(test)]
mod tests {
  use std::io::Write as _;

  use super::*;

  #[test]
  fn defaults_are_sane() {
    let cfg = EngineConfig::default();
    assert_eq!(cfg.reporting_currency, "USD");
    assert!(cfg.group_by_channel);
    assert_eq!(cfg.discount_policy, DiscountPolicy::Apply);
    assert_eq!(cfg.commit_batch_size, 50);
  }

  #[test]
  fn loads_overrides_from_a_toml_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("engine.toml");
    let mut file = std::fs::File::create(&path).unwrap();
    writeln!(file, "group_by_channel = false").unwrap();
    writeln!(file, "discount_policy = \"ignore\"").unwrap();
    writeln!(file, "default_fx_rate = 505.5").unwrap();

    let cfg = EngineConfig::load(&path).unwrap();
    assert!(!cfg.group_by_channel);
    assert_eq!(cfg.discount_policy, DiscountPolicy::Ignore);
    assert_eq!(cfg.default_fx_rate, 505.5);
    // Untouched fields keep their defaults.
    assert_eq!(cfg.commit_batch_size, 50);
  }
}
