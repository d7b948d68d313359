//! Tracing around driver-level operations
//!
//! Every prepare, query, execute, transaction begin/finish and pool close issued
//! through a [`SqliteDatabase`](crate::SqliteDatabase) passes through an
//! [`OperationTracer`]. Statements and transactions are numbered from separate
//! monotonically increasing counters so interleaved entries from concurrent
//! callers can be correlated. The tracer only observes: results and errors are
//! returned exactly as the driver produced them.

use std::fmt::Display;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};

use tracing::level_filters::LevelFilter;
use tracing::{debug, error};

/// Target used for all operation trace entries.
pub const TRACE_TARGET: &str = "data_trace";

/// Driver-level operation kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
   Prepare,
   Query,
   Execute,
   Begin,
   Commit,
   Rollback,
   Close,
}

impl Operation {
   pub fn as_str(&self) -> &'static str {
      match self {
         Operation::Prepare => "prepare stmt",
         Operation::Query => "query",
         Operation::Execute => "exec",
         Operation::Begin => "begin trans",
         Operation::Commit => "commit trans",
         Operation::Rollback => "rollback trans",
         Operation::Close => "close conn",
      }
   }
}

/// Per-database operation tracer.
#[derive(Debug)]
pub struct OperationTracer {
   database: String,
   level: LevelFilter,
   statements: AtomicU64,
   transactions: AtomicU64,
}

impl OperationTracer {
   pub fn new(database: impl Into<String>, level: LevelFilter) -> Self {
      Self {
         database: database.into(),
         level,
         statements: AtomicU64::new(0),
         transactions: AtomicU64::new(0),
      }
   }

   /// Whether begin/end entries are emitted.
   pub fn enabled(&self) -> bool {
      self.level >= LevelFilter::DEBUG
   }

   /// Allocates the next statement id, starting at 1.
   pub fn next_statement_id(&self) -> u64 {
      self.statements.fetch_add(1, Ordering::Relaxed) + 1
   }

   /// Allocates the next transaction id, starting at 1.
   pub fn next_transaction_id(&self) -> u64 {
      self.transactions.fetch_add(1, Ordering::Relaxed) + 1
   }

   /// Number of statement ids handed out so far.
   pub fn statement_count(&self) -> u64 {
      self.statements.load(Ordering::Relaxed)
   }

   /// Number of transaction ids handed out so far.
   pub fn transaction_count(&self) -> u64 {
      self.transactions.load(Ordering::Relaxed)
   }

   /// Runs `operation`, emitting entries before and after it.
   ///
   /// A failure is logged at error level and returned unchanged.
   pub async fn observe<T, E, F>(
      &self,
      op: Operation,
      id: Option<u64>,
      sql: Option<&str>,
      operation: F,
   ) -> Result<T, E>
   where
      F: Future<Output = Result<T, E>>,
      E: Display,
   {
      self.observe_in(None, op, id, sql, operation).await
   }

   /// Like [`observe`](Self::observe), tagging every entry with the id of the
   /// enclosing transaction.
   pub async fn observe_in<T, E, F>(
      &self,
      tx: Option<u64>,
      op: Operation,
      id: Option<u64>,
      sql: Option<&str>,
      operation: F,
   ) -> Result<T, E>
   where
      F: Future<Output = Result<T, E>>,
      E: Display,
   {
      let enabled = self.enabled();

      if enabled {
         debug!(
            target: TRACE_TARGET,
            db = %self.database,
            tx,
            id,
            sql,
            "begin {}",
            op.as_str()
         );
      }

      match operation.await {
         Ok(value) => {
            if enabled {
               debug!(target: TRACE_TARGET, db = %self.database, tx, id, "end {}", op.as_str());
            }
            Ok(value)
         }
         Err(e) => {
            error!(
               target: TRACE_TARGET,
               db = %self.database,
               tx,
               id,
               error = %e,
               "{} failed",
               op.as_str()
            );
            Err(e)
         }
      }
   }
}
