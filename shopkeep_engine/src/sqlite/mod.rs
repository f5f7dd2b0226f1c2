//! SQLite storage for the Shopkeep engine.
//!
//! [`SqliteDatabase`] implements every backend trait. The [`db`] module holds the connection-level functions it is
//! built from, and `migrations/` holds the schema, including the default chart of accounts and store settings.
mod sqlite_impl;

pub mod db;
pub use sqlite_impl::SqliteDatabase;
