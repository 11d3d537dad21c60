//! [`SqliteWarehouse`] — the SQLite implementation of [`Warehouse`].

use std::path::Path;

use alluvium_core::{
  dimension::{Channel, Customer, NewCustomer, NewTimeEntry, TimeEntry},
  fact::{FactKey, FactRow},
  product::{Equivalence, Product, SourceProductRef},
  warehouse::{LoadOutcome, Warehouse},
};
use chrono::NaiveDate;
use rusqlite::OptionalExtension as _;

use crate::{
  Error, Result,
  encode::{RawCustomerRow, RawTimeRow, encode_day, encode_gender},
  schema::SCHEMA,
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// An Alluvium warehouse backed by a single SQLite file.
///
/// Cloning is cheap — the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteWarehouse {
  conn: tokio_rusqlite::Connection,
}

impl SqliteWarehouse {
  /// Open (or create) a warehouse at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory warehouse — useful for testing.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// Every fact row, in insertion order. The read surface for
  /// verification and downstream reporting queries.
  pub async fn list_facts(&self) -> Result<Vec<FactRow>> {
    let rows = self
      .conn
      .call(|conn| {
        let mut stmt = conn.prepare(
          "SELECT time_id, product_id, customer_id, channel_id,
                  quantity, unit_price_usd, total_usd
           FROM fact_sales ORDER BY fact_id",
        )?;
        let rows = stmt
          .query_map([], |row| {
            Ok(FactRow {
              key:            FactKey {
                time_id:     row.get(0)?,
                product_id:  row.get(1)?,
                customer_id: row.get(2)?,
                channel_id:  row.get(3)?,
              },
              quantity:       row.get(4)?,
              unit_price_usd: row.get(5)?,
              total_usd:      row.get(6)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;
    Ok(rows)
  }
}

// ─── Row selects ─────────────────────────────────────────────────────────────

fn is_unique_violation(err: &rusqlite::Error) -> bool {
  matches!(
    err,
    rusqlite::Error::SqliteFailure(e, _)
      if e.code == rusqlite::ErrorCode::ConstraintViolation
  )
}

/// A re-lookup after a lost insert race found no row either; surfaced as a
/// plain no-rows database error.
fn race_lost() -> tokio_rusqlite::Error {
  tokio_rusqlite::Error::Rusqlite(rusqlite::Error::QueryReturnedNoRows)
}

fn select_customer(
  conn: &rusqlite::Connection,
  email: &str,
) -> rusqlite::Result<Option<RawCustomerRow>> {
  conn
    .query_row(
      "SELECT customer_id, email, name, gender, country, registered_on
       FROM dim_customer WHERE email = ?1",
      rusqlite::params![email],
      |row| {
        Ok(RawCustomerRow {
          customer_id:   row.get(0)?,
          email:         row.get(1)?,
          name:          row.get(2)?,
          gender:        row.get(3)?,
          country:       row.get(4)?,
          registered_on: row.get(5)?,
        })
      },
    )
    .optional()
}

fn select_channel(
  conn: &rusqlite::Connection,
  name: &str,
) -> rusqlite::Result<Option<Channel>> {
  conn
    .query_row(
      "SELECT channel_id, name FROM dim_channel WHERE name = ?1",
      rusqlite::params![name],
      |row| {
        Ok(Channel { channel_id: row.get(0)?, name: row.get(1)? })
      },
    )
    .optional()
}

fn select_time(
  conn: &rusqlite::Connection,
  date: &str,
) -> rusqlite::Result<Option<RawTimeRow>> {
  conn
    .query_row(
      "SELECT time_id, date, year, month, day, iso_week, weekday, fx_rate
       FROM dim_time WHERE date = ?1",
      rusqlite::params![date],
      |row| {
        Ok(RawTimeRow {
          time_id:  row.get(0)?,
          date:     row.get(1)?,
          year:     row.get(2)?,
          month:    row.get(3)?,
          day:      row.get(4)?,
          iso_week: row.get(5)?,
          weekday:  row.get(6)?,
          fx_rate:  row.get(7)?,
        })
      },
    )
    .optional()
}

fn select_product(
  conn: &rusqlite::Connection,
  sku: &str,
) -> rusqlite::Result<Option<Product>> {
  conn
    .query_row(
      "SELECT product_id, sku, name, category FROM dim_product WHERE sku = ?1",
      rusqlite::params![sku],
      |row| {
        Ok(Product {
          product_id: row.get(0)?,
          sku:        row.get(1)?,
          name:       row.get(2)?,
          category:   row.get(3)?,
        })
      },
    )
    .optional()
}

fn select_equivalence(
  conn: &rusqlite::Connection,
  native_sku: Option<&str>,
  alt_code: Option<&str>,
  source_ref: Option<&str>,
) -> rusqlite::Result<Option<Equivalence>> {
  conn
    .query_row(
      "SELECT equivalence_id, sku, native_sku, alt_code, source_ref
       FROM equivalences
       WHERE native_sku = ?1 OR alt_code = ?2 OR source_ref = ?3
       LIMIT 1",
      rusqlite::params![native_sku, alt_code, source_ref],
      |row| {
        Ok(Equivalence {
          equivalence_id: row.get(0)?,
          sku:            row.get(1)?,
          native_sku:     row.get(2)?,
          alt_code:       row.get(3)?,
          source_ref:     row.get(4)?,
        })
      },
    )
    .optional()
}

// ─── Warehouse impl ──────────────────────────────────────────────────────────

impl Warehouse for SqliteWarehouse {
  type Error = Error;

  // ── Dimensions ────────────────────────────────────────────────────────

  async fn get_or_create_customer(
    &self,
    input: NewCustomer,
  ) -> Result<Customer> {
    let email = input.email;
    let name = input.name;
    let gender = encode_gender(input.gender).to_owned();
    let country = input.country;
    let registered_on = input.registered_on.map(encode_day);

    let raw: RawCustomerRow = self
      .conn
      .call(move |conn| {
        if let Some(found) = select_customer(conn, &email)? {
          return Ok(found);
        }

        let inserted = conn.execute(
          "INSERT INTO dim_customer (email, name, gender, country, registered_on)
           VALUES (?1, ?2, ?3, ?4, ?5)",
          rusqlite::params![email, name, gender, country, registered_on],
        );
        match inserted {
          Ok(_) => Ok(RawCustomerRow {
            customer_id: conn.last_insert_rowid(),
            email,
            name,
            gender,
            country,
            registered_on,
          }),
          Err(e) if is_unique_violation(&e) => {
            select_customer(conn, &email)?.ok_or_else(race_lost)
          }
          Err(e) => Err(e.into()),
        }
      })
      .await?;

    raw.into_customer()
  }

  async fn get_or_create_channel(&self, name: String) -> Result<Channel> {
    let channel = self
      .conn
      .call(move |conn| {
        if let Some(found) = select_channel(conn, &name)? {
          return Ok(found);
        }

        let inserted = conn.execute(
          "INSERT INTO dim_channel (name) VALUES (?1)",
          rusqlite::params![name],
        );
        match inserted {
          Ok(_) => Ok(Channel { channel_id: conn.last_insert_rowid(), name }),
          Err(e) if is_unique_violation(&e) => {
            select_channel(conn, &name)?.ok_or_else(race_lost)
          }
          Err(e) => Err(e.into()),
        }
      })
      .await?;
    Ok(channel)
  }

  async fn get_or_create_time(&self, date: NaiveDate) -> Result<TimeEntry> {
    let entry = NewTimeEntry::for_date(date);
    let date_str = encode_day(entry.date);

    let raw: RawTimeRow = self
      .conn
      .call(move |conn| {
        if let Some(found) = select_time(conn, &date_str)? {
          return Ok(found);
        }

        // Unknown rates default to 1.0 on insertion; only the rate feed
        // writes real rates afterwards.
        let fx = entry.fx_rate.unwrap_or(1.0);
        let inserted = conn.execute(
          "INSERT INTO dim_time (date, year, month, day, iso_week, weekday, fx_rate)
           VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
          rusqlite::params![
            date_str,
            entry.year,
            entry.month,
            entry.day,
            entry.iso_week,
            entry.weekday,
            fx,
          ],
        );
        match inserted {
          Ok(_) => Ok(RawTimeRow {
            time_id:  conn.last_insert_rowid(),
            date:     date_str,
            year:     entry.year,
            month:    entry.month,
            day:      entry.day,
            iso_week: entry.iso_week,
            weekday:  entry.weekday,
            fx_rate:  Some(fx),
          }),
          Err(e) if is_unique_violation(&e) => {
            select_time(conn, &date_str)?.ok_or_else(race_lost)
          }
          Err(e) => Err(e.into()),
        }
      })
      .await?;

    raw.into_entry()
  }

  async fn get_or_create_product(
    &self,
    sku: String,
    name: Option<String>,
    category: Option<String>,
  ) -> Result<Product> {
    let product = self
      .conn
      .call(move |conn| {
        if let Some(found) = select_product(conn, &sku)? {
          return Ok(found);
        }

        let inserted = conn.execute(
          "INSERT INTO dim_product (sku, name, category) VALUES (?1, ?2, ?3)",
          rusqlite::params![sku, name, category],
        );
        match inserted {
          Ok(_) => Ok(Product {
            product_id: conn.last_insert_rowid(),
            sku,
            name,
            category,
          }),
          Err(e) if is_unique_violation(&e) => {
            select_product(conn, &sku)?.ok_or_else(race_lost)
          }
          Err(e) => Err(e.into()),
        }
      })
      .await?;
    Ok(product)
  }

  // ── Equivalences ──────────────────────────────────────────────────────

  async fn find_equivalence(
    &self,
    product: SourceProductRef,
  ) -> Result<Option<Equivalence>> {
    let found = self
      .conn
      .call(move |conn| {
        Ok(select_equivalence(
          conn,
          product.native_sku.as_deref(),
          product.alt_code.as_deref(),
          product.source_ref.as_deref(),
        )?)
      })
      .await?;
    Ok(found)
  }

  async fn insert_equivalence(
    &self,
    sku: String,
    product: SourceProductRef,
  ) -> Result<Equivalence> {
    let equivalence = self
      .conn
      .call(move |conn| {
        let inserted = conn.execute(
          "INSERT INTO equivalences (sku, native_sku, alt_code, source_ref)
           VALUES (?1, ?2, ?3, ?4)",
          rusqlite::params![
            sku,
            product.native_sku,
            product.alt_code,
            product.source_ref,
          ],
        );
        match inserted {
          Ok(_) => Ok(Equivalence {
            equivalence_id: conn.last_insert_rowid(),
            sku,
            native_sku: product.native_sku,
            alt_code: product.alt_code,
            source_ref: product.source_ref,
          }),
          Err(e) if is_unique_violation(&e) => select_equivalence(
            conn,
            product.native_sku.as_deref(),
            product.alt_code.as_deref(),
            product.source_ref.as_deref(),
          )?
          .ok_or_else(race_lost),
          Err(e) => Err(e.into()),
        }
      })
      .await?;
    Ok(equivalence)
  }

  // ── Exchange rates ────────────────────────────────────────────────────

  async fn fx_rate_on(&self, date: NaiveDate) -> Result<Option<f64>> {
    let date_str = encode_day(date);
    let rate = self
      .conn
      .call(move |conn| {
        let row: Option<Option<f64>> = conn
          .query_row(
            "SELECT fx_rate FROM dim_time WHERE date = ?1",
            rusqlite::params![date_str],
            |row| row.get(0),
          )
          .optional()?;
        Ok(row.flatten())
      })
      .await?;
    Ok(rate)
  }

  async fn set_fx_rate(&self, date: NaiveDate, rate: f64) -> Result<()> {
    let entry = NewTimeEntry::for_date(date);
    let date_str = encode_day(date);

    self
      .conn
      .call(move |conn| {
        let updated = conn.execute(
          "UPDATE dim_time SET fx_rate = ?2 WHERE date = ?1",
          rusqlite::params![date_str, rate],
        )?;
        if updated > 0 {
          return Ok(());
        }

        match conn.execute(
          "INSERT INTO dim_time (date, year, month, day, iso_week, weekday, fx_rate)
           VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
          rusqlite::params![
            date_str,
            entry.year,
            entry.month,
            entry.day,
            entry.iso_week,
            entry.weekday,
            rate,
          ],
        ) {
          Ok(_) => Ok(()),
          Err(e) if is_unique_violation(&e) => {
            conn.execute(
              "UPDATE dim_time SET fx_rate = ?2 WHERE date = ?1",
              rusqlite::params![date_str, rate],
            )?;
            Ok(())
          }
          Err(e) => Err(e.into()),
        }
      })
      .await?;
    Ok(())
  }

  // ── Facts ─────────────────────────────────────────────────────────────

  async fn load_facts(
    &self,
    rows: Vec<FactRow>,
    batch_size: usize,
  ) -> Result<LoadOutcome> {
    let batch_size = batch_size.max(1);
    let outcome = self
      .conn
      .call(move |conn| {
        let mut outcome = LoadOutcome::default();

        for chunk in rows.chunks(batch_size) {
          let tx = conn.transaction()?;

          for row in chunk {
            let exists: bool = match row.key.channel_id {
              Some(channel_id) => tx
                .query_row(
                  "SELECT 1 FROM fact_sales
                   WHERE time_id = ?1 AND product_id = ?2
                     AND customer_id = ?3 AND channel_id = ?4",
                  rusqlite::params![
                    row.key.time_id,
                    row.key.product_id,
                    row.key.customer_id,
                    channel_id,
                  ],
                  |_| Ok(true),
                )
                .optional()?
                .unwrap_or(false),
              None => tx
                .query_row(
                  "SELECT 1 FROM fact_sales
                   WHERE time_id = ?1 AND product_id = ?2
                     AND customer_id = ?3 AND channel_id IS NULL",
                  rusqlite::params![
                    row.key.time_id,
                    row.key.product_id,
                    row.key.customer_id,
                  ],
                  |_| Ok(true),
                )
                .optional()?
                .unwrap_or(false),
            };

            if exists {
              outcome.skipped_existing += 1;
              continue;
            }

            match tx.execute(
              "INSERT INTO fact_sales
                 (time_id, product_id, customer_id, channel_id,
                  quantity, unit_price_usd, total_usd)
               VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
              rusqlite::params![
                row.key.time_id,
                row.key.product_id,
                row.key.customer_id,
                row.key.channel_id,
                row.quantity,
                row.unit_price_usd,
                row.total_usd,
              ],
            ) {
              Ok(_) => outcome.inserted += 1,
              Err(e) => {
                tracing::error!(
                  time_id = row.key.time_id,
                  product_id = row.key.product_id,
                  customer_id = row.key.customer_id,
                  error = %e,
                  "fact insert failed; row skipped",
                );
                outcome.failed += 1;
              }
            }
          }

          tx.commit()?;
        }

        Ok(outcome)
      })
      .await?;
    Ok(outcome)
  }

  async fn fact_count(&self) -> Result<u64> {
    let count: i64 = self
      .conn
      .call(|conn| {
        Ok(conn.query_row("SELECT COUNT(*) FROM fact_sales", [], |row| {
          row.get(0)
        })?)
      })
      .await?;
    Ok(count as u64)
  }
}
