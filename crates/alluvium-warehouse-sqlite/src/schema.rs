//! SQL schema for the SQLite warehouse.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! the `PRAGMA user_version` number.

/// Full schema DDL; idempotent thanks to `CREATE ... IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS dim_time (
    time_id  INTEGER PRIMARY KEY AUTOINCREMENT,
    date     TEXT NOT NULL UNIQUE,   -- YYYY-MM-DD
    year     INTEGER NOT NULL,
    month    INTEGER NOT NULL,
    day      INTEGER NOT NULL,
    iso_week INTEGER NOT NULL,
    weekday  TEXT NOT NULL,
    fx_rate  REAL                    -- local units per USD; NULL = unknown
);

CREATE TABLE IF NOT EXISTS dim_customer (
    customer_id   INTEGER PRIMARY KEY AUTOINCREMENT,
    email         TEXT NOT NULL UNIQUE,
    name          TEXT NOT NULL,
    gender        TEXT NOT NULL,     -- 'M' | 'F' | 'U'
    country       TEXT,
    registered_on TEXT
);

CREATE TABLE IF NOT EXISTS dim_channel (
    channel_id INTEGER PRIMARY KEY AUTOINCREMENT,
    name       TEXT NOT NULL UNIQUE
);

CREATE TABLE IF NOT EXISTS dim_product (
    product_id INTEGER PRIMARY KEY AUTOINCREMENT,
    sku        TEXT NOT NULL UNIQUE,
    name       TEXT,
    category   TEXT
);

-- Many source codes map onto one canonical SKU.
-- At most one row per distinct source code.
CREATE TABLE IF NOT EXISTS equivalences (
    equivalence_id INTEGER PRIMARY KEY AUTOINCREMENT,
    sku            TEXT NOT NULL,
    native_sku     TEXT UNIQUE,
    alt_code       TEXT UNIQUE,
    source_ref     TEXT UNIQUE
);

-- Facts are write-once.
-- No UPDATE or DELETE is ever issued against this table.
CREATE TABLE IF NOT EXISTS fact_sales (
    fact_id        INTEGER PRIMARY KEY AUTOINCREMENT,
    time_id        INTEGER NOT NULL REFERENCES dim_time(time_id),
    product_id     INTEGER NOT NULL REFERENCES dim_product(product_id),
    customer_id    INTEGER NOT NULL REFERENCES dim_customer(customer_id),
    channel_id     INTEGER REFERENCES dim_channel(channel_id),
    quantity       INTEGER NOT NULL,
    unit_price_usd REAL NOT NULL,
    total_usd      REAL NOT NULL
);

-- Safety net behind the loader's existence check. NULL channel_ids compare
-- distinct under SQLite UNIQUE, so the existence check stays authoritative
-- for channel-less facts.
CREATE UNIQUE INDEX IF NOT EXISTS fact_sales_natural_key
    ON fact_sales(time_id, product_id, customer_id, channel_id);

CREATE INDEX IF NOT EXISTS equivalences_sku_idx ON equivalences(sku);

PRAGMA user_version = 1;
";
