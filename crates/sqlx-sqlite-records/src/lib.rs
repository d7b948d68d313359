//! # sqlx-sqlite-records
//!
//! Projects SQLite result sets into typed records without per-query decoding code.
//!
//! ## Core Types
//!
//! - **[`Record`]**: Implemented by types that can be populated from rows. Usually
//!   generated with [`impl_record!`], which pairs each field with a result column.
//! - **[`FieldSlot`]**: Mutable, typed view of one record field used during assignment
//! - **[`FieldMapping`]**: Column → field table, built once per record type and cached
//! - **[`Error`]**: Error type for decoding operations
//!
//! ## Decoding
//!
//! Every result column is scanned into a neutral carrier picked from the column's
//! reported SQLite type (`TEXT`, `INTEGER`, `REAL`, `BLOB`). Column types come
//! from the statement, so an unsupported type fails even for an empty result.
//! Carriers are then assigned to the mapped fields, widening from nullable to
//! plain fields when the value is present and narrowing integers and reals into
//! any field of their family that can hold the value. Columns without a mapped
//! field are ignored.
//!
//! ```no_run
//! use sqlx::{Connection, Executor, SqliteConnection, Statement};
//! use sqlx_sqlite_records::{impl_record, records_from_rows};
//!
//! #[derive(Debug, Default)]
//! struct User {
//!    id: i64,
//!    age: Option<u8>,
//!    name: Option<String>,
//! }
//!
//! impl_record!(User {
//!    id => "id",
//!    age => "age",
//!    name => "user_name",
//! });
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let mut conn = SqliteConnection::connect("sqlite::memory:").await?;
//! let statement = conn
//!    .prepare("SELECT id, age, name AS user_name FROM users")
//!    .await?;
//! let rows = statement.query().fetch_all(&mut conn).await?;
//!
//! let mut users: Vec<User> = Vec::new();
//! records_from_rows(&mut users, statement.columns(), &rows)?;
//! # Ok(())
//! # }
//! ```

mod decode;
mod error;
mod mapping;
mod record;

pub use decode::{decode_records, records_from_rows};
pub use error::{Error, Result};
pub use mapping::{FieldMapping, mapping_for};
pub use record::{AsFieldSlot, FieldSlot, IntegerField, RealField, Record};
