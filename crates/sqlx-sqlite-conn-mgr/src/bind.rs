//! Binding JSON parameter values to sqlx queries

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use sqlx::Sqlite;
use sqlx::query::Query;
use sqlx::sqlite::{SqliteArguments, SqliteQueryResult};

/// Result returned from write operations (e.g. INSERT, UPDATE, DELETE).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriteQueryResult {
   /// The number of rows affected by the write operation.
   pub rows_affected: u64,
   /// The last inserted row ID (SQLite ROWID).
   ///
   /// Only set for INSERT operations on tables with a ROWID.
   pub last_insert_id: i64,
}

impl From<SqliteQueryResult> for WriteQueryResult {
   fn from(result: SqliteQueryResult) -> Self {
      Self {
         rows_affected: result.rows_affected(),
         last_insert_id: result.last_insert_rowid(),
      }
   }
}

pub(crate) type SqliteQuery<'q> = Query<'q, Sqlite, SqliteArguments<'q>>;

/// Binds each value to `query` in order.
pub(crate) fn bind_values(mut query: SqliteQuery<'_>, values: Vec<JsonValue>) -> SqliteQuery<'_> {
   for value in values {
      query = bind_value(query, value);
   }
   query
}

/// Binds a single JSON value to a SQLx query
fn bind_value(query: SqliteQuery<'_>, value: JsonValue) -> SqliteQuery<'_> {
   match value {
      JsonValue::Null => query.bind(None::<String>),
      JsonValue::Bool(b) => query.bind(b),
      JsonValue::String(s) => query.bind(s),
      JsonValue::Number(number) => {
         // Preserve integer precision by binding as i64 when possible
         if let Some(int_val) = number.as_i64() {
            query.bind(int_val)
         } else if let Some(uint_val) = number.as_u64() {
            // Only reached above i64::MAX; SQLite has no unsigned 64-bit type
            query.bind(uint_val as f64)
         } else {
            query.bind(number.as_f64().unwrap_or_default())
         }
      }
      // Arrays and objects are stored as their JSON text
      value @ (JsonValue::Array(_) | JsonValue::Object(_)) => query.bind(value.to_string()),
   }
}
