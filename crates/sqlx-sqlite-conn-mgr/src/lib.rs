//! # sqlx-sqlite-conn-mgr
//!
//! A wrapper around SQLx that gives each SQLite database file one shared connection
//! pool, single-writer transactions, and tracing of every driver-level operation.
//!
//! ## Core Types
//!
//! - **[`SqliteDatabase`]**: Database handle owning the connection pool and the
//!   transaction lock
//! - **[`Transaction`]**: Open transaction; holds the lock and a reference to its
//!   database until commit, rollback, or drop
//! - **[`SqliteDatabaseConfig`]**: Pool sizing, connection lifetime, connection
//!   template, and trace level
//! - **[`OperationTracer`]**: Emits correlated begin/end entries around driver calls
//! - **[`Error`]**: Error type for database operations
//!
//! ## Architecture
//!
//! - **Shared pool**: All callers share one pool bounded by `max_open_connections`
//! - **WAL + foreign keys**: Applied to every connection the pool opens
//! - **Exclusive transactions**: One transaction per database at a time; plain
//!   queries do not wait for it
//! - **Traced operations**: Statements and transactions carry increasing ids under
//!   the `data_trace` target
//!
//! ## Usage
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use serde_json::json;
//! use sqlx_sqlite_conn_mgr::SqliteDatabase;
//!
//! #[tokio::main]
//! async fn main() -> sqlx_sqlite_conn_mgr::Result<()> {
//!     let db = Arc::new(SqliteDatabase::connect("example.db", None).await?);
//!
//!     db.execute("CREATE TABLE IF NOT EXISTS users (name TEXT)", vec![]).await?;
//!
//!     let mut tx = db.begin().await?;
//!     tx.execute("INSERT INTO users (name) VALUES (?)", vec![json!("Alice")]).await?;
//!     tx.commit().await?;
//!
//!     let rows = db.query("SELECT name FROM users", vec![]).await?;
//!     assert_eq!(rows.len(), 1);
//!
//!     db.close().await?;
//!     Ok(())
//! }
//! ```

mod bind;
mod config;
mod database;
mod error;
mod trace;
mod transaction;

// Re-export public types
pub use bind::WriteQueryResult;
pub use config::{PATH_PLACEHOLDER, SqliteDatabaseConfig};
pub use database::{DropHook, PoolStats, SqliteDatabase};
pub use error::{Error, Result};
pub use trace::{Operation, OperationTracer, TRACE_TARGET};
pub use transaction::Transaction;
