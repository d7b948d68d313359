//! # sqlx-sqlite-registry
//!
//! A registry of SQLite databases keyed by identity and version, built on
//! [`sqlx_sqlite_conn_mgr`] for pooled, traced database access and
//! [`sqlx_sqlite_records`] for mapping query results onto typed records.
//!
//! ## Core Types
//!
//! - **[`DatabaseRegistry`]**: Opens each `(identity, version)` database once,
//!   shares the handle, and deletes its files on release
//! - **[`RegistryConfig`]**: Storage location, driver, pool sizing, and log levels
//! - **[`VersionedKey`]**: The `(identity, version)` pair naming a database
//! - **[`Error`]**: Error type for registry operations
//!
//! Omitting the identity selects [`COMMON_ID`]; omitting the version selects
//! [`BASE_VERSION`]. Passing either sentinel explicitly is rejected.
//!
//! ## Usage
//!
//! ```no_run
//! use serde_json::json;
//! use sqlx_sqlite_registry::{DatabaseRegistry, RegistryConfig, impl_record};
//!
//! #[derive(Debug, Default)]
//! struct Item {
//!    id: i64,
//!    name: String,
//! }
//!
//! impl_record!(Item { id => "id", name => "name" });
//!
//! #[tokio::main]
//! async fn main() -> sqlx_sqlite_registry::Result<()> {
//!    let registry = DatabaseRegistry::new(RegistryConfig::with_storage_root("/var/lib/app"))?;
//!
//!    let db = registry.get_for_identity_and_version("org1", "1.0").await?;
//!    db.execute("CREATE TABLE IF NOT EXISTS items (id INTEGER, name TEXT)", vec![])
//!       .await?;
//!    db.execute("INSERT INTO items VALUES (?, ?)", vec![json!(1), json!("a")])
//!       .await?;
//!
//!    let items: Vec<Item> = db.query_records("SELECT id, name FROM items", vec![]).await?;
//!    assert_eq!(items.len(), 1);
//!
//!    drop(db);
//!    registry.release("org1", "1.0").await?;
//!    Ok(())
//! }
//! ```

mod config;
mod diagnostics;
mod error;
mod key;
mod registry;

pub use config::RegistryConfig;
pub use diagnostics::STAT_COLLECTION_INTERVAL;
pub use error::{Error, Result};
pub use key::{BASE_VERSION, COMMON_ID, VersionedKey};
pub use registry::{DATA_FILE_NAME, DatabaseRegistry};

pub use sqlx_sqlite_conn_mgr::{
   Operation, PoolStats, SqliteDatabase, SqliteDatabaseConfig, TRACE_TARGET, Transaction,
   WriteQueryResult,
};
pub use sqlx_sqlite_records::{FieldSlot, Record, impl_record};

pub use sqlx::sqlite::{SqliteRow, SqliteStatement};
