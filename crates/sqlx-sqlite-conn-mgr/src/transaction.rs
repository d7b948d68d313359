//! Write transactions holding a database's transaction lock

use std::future::Future;
use std::sync::Arc;

use serde_json::Value as JsonValue;
use sqlx::sqlite::{SqliteRow, SqliteStatement};
use sqlx::{Executor, Sqlite};
use sqlx_sqlite_records::{Record, decode_records};
use tokio::sync::OwnedMutexGuard;
use tracing::debug;

use crate::bind::{WriteQueryResult, bind_values};
use crate::database::SqliteDatabase;
use crate::error::{Error, Result};
use crate::trace::{Operation, OperationTracer};

/// An open transaction on a [`SqliteDatabase`](crate::SqliteDatabase).
///
/// While a `Transaction` exists, no other transaction can begin on the same
/// database. The lock is released when the transaction is committed, rolled
/// back, or dropped. Dropping without committing rolls back.
///
/// The transaction holds a reference to its database, so the database is not
/// torn down while the transaction is open.
#[must_use = "if unused, the transaction is immediately rolled back"]
pub struct Transaction {
   id: u64,
   // Declared before the guard so the rollback on drop is queued before the
   // lock is handed to the next transaction
   inner: sqlx::Transaction<'static, Sqlite>,
   tracer: Arc<OperationTracer>,
   _lock: OwnedMutexGuard<()>,
   // Dropped last, after the connection has gone back to the pool
   _database: Arc<SqliteDatabase>,
}

impl Transaction {
   pub(crate) fn new(
      id: u64,
      inner: sqlx::Transaction<'static, Sqlite>,
      database: Arc<SqliteDatabase>,
      lock: OwnedMutexGuard<()>,
   ) -> Self {
      Self {
         id,
         inner,
         tracer: Arc::clone(database.tracer()),
         _lock: lock,
         _database: database,
      }
   }

   /// Trace id of this transaction.
   pub fn id(&self) -> u64 {
      self.id
   }

   /// Execute a write statement inside this transaction
   pub async fn execute(&mut self, query: &str, values: Vec<JsonValue>) -> Result<WriteQueryResult> {
      let q = bind_values(sqlx::query(query), values);
      let id = self.tracer.next_statement_id();
      let result = self
         .tracer
         .observe_in(
            Some(self.id),
            Operation::Execute,
            Some(id),
            Some(query),
            q.execute(&mut *self.inner),
         )
         .await?;
      Ok(result.into())
   }

   /// Execute a query inside this transaction and return all rows
   pub async fn query(&mut self, query: &str, values: Vec<JsonValue>) -> Result<Vec<SqliteRow>> {
      let q = bind_values(sqlx::query(query), values);
      let id = self.tracer.next_statement_id();
      let rows = self
         .tracer
         .observe_in(
            Some(self.id),
            Operation::Query,
            Some(id),
            Some(query),
            q.fetch_all(&mut *self.inner),
         )
         .await?;
      Ok(rows)
   }

   /// Execute a query inside this transaction expecting zero or one row
   pub async fn query_row(
      &mut self,
      query: &str,
      values: Vec<JsonValue>,
   ) -> Result<Option<SqliteRow>> {
      let q = bind_values(sqlx::query(query), values);
      let id = self.tracer.next_statement_id();
      let row = self
         .tracer
         .observe_in(
            Some(self.id),
            Operation::Query,
            Some(id),
            Some(query),
            q.fetch_optional(&mut *self.inner),
         )
         .await?;
      Ok(row)
   }

   /// Execute a query inside this transaction and project the rows into `T`
   ///
   /// Column types are checked against the prepared statement, so an
   /// unsupported column type fails even when the query returns no rows.
   pub async fn query_records<T: Record>(
      &mut self,
      query: &str,
      values: Vec<JsonValue>,
   ) -> Result<Vec<T>> {
      let statement = self.prepare(query).await?;
      let q = bind_values(sqlx::Statement::query(&statement), values);
      let id = self.tracer.next_statement_id();
      let rows = self
         .tracer
         .observe_in(
            Some(self.id),
            Operation::Query,
            Some(id),
            Some(query),
            q.fetch_all(&mut *self.inner),
         )
         .await?;
      Ok(decode_records(sqlx::Statement::columns(&statement), &rows)?)
   }

   /// Prepare a statement on this transaction's connection
   pub async fn prepare(&mut self, query: &str) -> Result<SqliteStatement<'static>> {
      let id = self.tracer.next_statement_id();
      let statement = self
         .tracer
         .observe_in(
            Some(self.id),
            Operation::Prepare,
            Some(id),
            Some(query),
            (&mut *self.inner).prepare(query),
         )
         .await?;
      Ok(sqlx::Statement::to_owned(&statement))
   }

   /// Like [`execute`](Self::execute), but aborts with [`Error::Cancelled`] if
   /// `cancel` completes first.
   pub async fn execute_with_cancel<C>(
      &mut self,
      query: &str,
      values: Vec<JsonValue>,
      cancel: C,
   ) -> Result<WriteQueryResult>
   where
      C: Future<Output = ()>,
   {
      until_cancelled(cancel, self.execute(query, values)).await
   }

   /// Like [`query`](Self::query), but aborts with [`Error::Cancelled`] if
   /// `cancel` completes first.
   pub async fn query_with_cancel<C>(
      &mut self,
      query: &str,
      values: Vec<JsonValue>,
      cancel: C,
   ) -> Result<Vec<SqliteRow>>
   where
      C: Future<Output = ()>,
   {
      until_cancelled(cancel, self.query(query, values)).await
   }

   /// Like [`query_records`](Self::query_records), but aborts with
   /// [`Error::Cancelled`] if `cancel` completes first.
   pub async fn query_records_with_cancel<T, C>(
      &mut self,
      query: &str,
      values: Vec<JsonValue>,
      cancel: C,
   ) -> Result<Vec<T>>
   where
      T: Record,
      C: Future<Output = ()>,
   {
      until_cancelled(cancel, self.query_records(query, values)).await
   }

   /// Like [`prepare`](Self::prepare), but aborts with [`Error::Cancelled`] if
   /// `cancel` completes first.
   pub async fn prepare_with_cancel<C>(
      &mut self,
      query: &str,
      cancel: C,
   ) -> Result<SqliteStatement<'static>>
   where
      C: Future<Output = ()>,
   {
      until_cancelled(cancel, self.prepare(query)).await
   }

   /// Commit this transaction
   pub async fn commit(self) -> Result<()> {
      let Self {
         id,
         inner,
         tracer,
         _lock,
         _database,
      } = self;
      tracer
         .observe_in(Some(id), Operation::Commit, None, None, inner.commit())
         .await?;
      debug!(tx = id, "Transaction committed");
      Ok(())
   }

   /// Rollback this transaction
   pub async fn rollback(self) -> Result<()> {
      let Self {
         id,
         inner,
         tracer,
         _lock,
         _database,
      } = self;
      tracer
         .observe_in(Some(id), Operation::Rollback, None, None, inner.rollback())
         .await?;
      debug!(tx = id, "Transaction rolled back");
      Ok(())
   }
}

impl std::fmt::Debug for Transaction {
   fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
      f.debug_struct("Transaction")
         .field("id", &self.id)
         .finish_non_exhaustive()
   }
}

async fn until_cancelled<T, C, F>(cancel: C, operation: F) -> Result<T>
where
   C: Future<Output = ()>,
   F: Future<Output = Result<T>>,
{
   tokio::select! {
      biased;
      _ = cancel => Err(Error::Cancelled),
      result = operation => result,
   }
}
