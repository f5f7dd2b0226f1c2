//! # SQLite Database methods
//!
//! This module contains "low-level" SQLite database interactions.
//!
//! All these interactions are simple functions (rather than stateful structs) that accept a `&mut SqliteConnection`
//! argument. Callers can obtain a connection from a pool, or open an atomic transaction as the need arises and call
//! through to the functions without any other changes.
//!
//! Functions that change state come in two flavours. Plain inserts and updates always apply. *Guarded* updates carry
//! the precondition in their `WHERE` clause and report whether they applied (a `bool`, or an `Option` of the updated
//! row); callers decide whether "no rows" is an error or an idempotent no-op.
use std::{env, str::FromStr, time::Duration};

use log::info;
use sqlx::{
    sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous},
    Error as SqlxError,
    SqlitePool,
};

pub mod checkout;
pub mod discounts;
pub mod invoices;
pub mod ledger;
pub mod lifecycle;
pub mod orders;
pub mod payments;
pub mod products;
pub mod settings;
pub mod settlement;
pub mod wallets;

const SQLITE_DB_URL: &str = "sqlite://data/shopkeep.db";
const BUSY_TIMEOUT: Duration = Duration::from_secs(10);

pub fn db_url() -> String {
    let result = env::var("SK_DATABASE_URL").unwrap_or_else(|_| {
        info!("SK_DATABASE_URL is not set. Using the default.");
        SQLITE_DB_URL.to_string()
    });
    info!("Using database URL: {result}");
    result
}

/// Opens a pool in WAL mode with a busy timeout, so that concurrent writers queue on the database lock instead of
/// failing immediately.
pub async fn new_pool(url: &str, max_connections: u32) -> Result<SqlitePool, SqlxError> {
    let options = SqliteConnectOptions::from_str(url)?
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .synchronous(SqliteSynchronous::Normal)
        .busy_timeout(BUSY_TIMEOUT)
        .foreign_keys(true);
    let pool = SqlitePoolOptions::new().max_connections(max_connections).connect_with(options).await?;
    Ok(pool)
}
