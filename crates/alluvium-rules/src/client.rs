//! Async HTTP client for the rule store's tabular REST interface.
//!
//! The store exposes each table under `/rest/v1/<table>` with filtered
//! GET, POST insert, and PATCH update, authenticated by an API key sent
//! both as a header and a bearer token.

use std::time::Duration;

use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;

use crate::{Error, Result};

/// Rows fetched per GET request while paging through a table.
const PAGE_SIZE: usize = 1000;

/// Attempts for the PATCH path before the failure is surfaced.
const PATCH_ATTEMPTS: u32 = 3;

/// Connection settings for the rule store.
#[derive(Debug, Clone)]
pub struct StoreConfig {
  pub base_url: String,
  pub api_key:  String,
}

/// Client for one rule store. Cheap to clone — the inner
/// [`reqwest::Client`] is `Arc`-based.
#[derive(Clone)]
pub struct TableClient {
  client: reqwest::Client,
  config: StoreConfig,
}

impl TableClient {
  pub fn new(config: StoreConfig) -> Result<Self> {
    let client = reqwest::Client::builder()
      .timeout(Duration::from_secs(30))
      .build()?;
    Ok(Self { client, config })
  }

  fn url(&self, table: &str) -> String {
    format!(
      "{}/rest/v1/{}",
      self.config.base_url.trim_end_matches('/'),
      table
    )
  }

  fn authed(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
    req
      .header("apikey", &self.config.api_key)
      .bearer_auth(&self.config.api_key)
  }

  /// Fetch every row of `table`, paging with limit/offset until an empty
  /// batch comes back.
  pub async fn fetch_all<T: DeserializeOwned>(
    &self,
    table: &str,
  ) -> Result<Vec<T>> {
    let mut rows = Vec::new();
    let mut offset = 0usize;

    loop {
      let resp = self
        .authed(self.client.get(self.url(table)))
        .query(&[
          ("select", "*".to_string()),
          ("limit", PAGE_SIZE.to_string()),
          ("offset", offset.to_string()),
        ])
        .send()
        .await?;

      if !resp.status().is_success() {
        return Err(Error::Api {
          table:  table.to_owned(),
          status: resp.status().as_u16(),
        });
      }

      let batch: Vec<T> = resp.json().await?;
      if batch.is_empty() {
        break;
      }
      rows.extend(batch);
      offset += PAGE_SIZE;
    }

    Ok(rows)
  }

  /// Insert rows and return the stored representations (with assigned
  /// ids). An empty slice is a no-op.
  pub async fn insert<T: Serialize, R: DeserializeOwned>(
    &self,
    table: &str,
    rows: &[T],
  ) -> Result<Vec<R>> {
    if rows.is_empty() {
      return Ok(Vec::new());
    }

    let resp = self
      .authed(self.client.post(self.url(table)))
      .header("Prefer", "return=representation")
      .json(rows)
      .send()
      .await?;

    if !resp.status().is_success() {
      return Err(Error::Api {
        table:  table.to_owned(),
        status: resp.status().as_u16(),
      });
    }

    Ok(resp.json().await?)
  }

  /// PATCH the row where `id_column = id`. Transient failures retry up to
  /// [`PATCH_ATTEMPTS`] times; the last failure is surfaced.
  pub async fn patch_by_id(
    &self,
    table: &str,
    id_column: &str,
    id: i64,
    body: &Value,
  ) -> Result<()> {
    let url = format!("{}?{}=eq.{}", self.url(table), id_column, id);

    let mut attempt = 0;
    loop {
      attempt += 1;

      let outcome = match self
        .authed(self.client.patch(&url))
        .json(body)
        .send()
        .await
      {
        Ok(resp) if resp.status().is_success() => Ok(()),
        Ok(resp) => Err(Error::Api {
          table:  table.to_owned(),
          status: resp.status().as_u16(),
        }),
        Err(e) => Err(Error::Http(e)),
      };

      match outcome {
        Ok(()) => return Ok(()),
        Err(e) if attempt < PATCH_ATTEMPTS => {
          tracing::warn!(table, id, attempt, error = %e, "PATCH failed; retrying");
        }
        Err(e) => return Err(e),
      }
    }
  }
}
