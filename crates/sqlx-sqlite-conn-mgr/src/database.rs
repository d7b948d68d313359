//! SQLite database with connection pooling and serialized write transactions

use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use serde::Serialize;
use serde_json::Value as JsonValue;
use sqlx::sqlite::{
   SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteRow, SqliteStatement,
};
use sqlx::{Connection, Executor, Pool, Sqlite};
use sqlx_sqlite_records::{Record, decode_records};
use tokio::sync::Mutex as AsyncMutex;
use tracing::{debug, info, warn};

use crate::bind::{WriteQueryResult, bind_values};
use crate::config::SqliteDatabaseConfig;
use crate::error::{Error, Result};
use crate::trace::{Operation, OperationTracer};
use crate::transaction::Transaction;

/// Work run after the pool of a dropped database has closed.
pub type DropHook = Box<dyn FnOnce() -> Pin<Box<dyn Future<Output = ()> + Send>> + Send>;

/// Point-in-time connection pool statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PoolStats {
   /// Connections currently open, idle or in use
   pub open_connections: u32,
   /// Open connections waiting in the pool
   pub idle_connections: u32,
   /// Open connections checked out by callers
   pub in_use: u32,
   /// Configured upper bound on open connections
   pub max_open_connections: u32,
}

/// SQLite database with a shared connection pool and single-writer transactions.
///
/// ## Concurrency
///
/// - Plain queries and statements run on any pooled connection and may proceed
///   concurrently with each other and with an open transaction.
/// - [`begin`](Self::begin) takes the database's transaction lock, so at most
///   one [`Transaction`] is open at a time. Further `begin` calls wait until the
///   open transaction commits, rolls back, or is dropped.
///
/// ## Pragmas
///
/// Every pooled connection is opened with `journal_mode=WAL` and
/// `foreign_keys=ON`.
///
/// ## Tracing
///
/// All driver calls pass through the database's [`OperationTracer`].
pub struct SqliteDatabase {
   /// Shared connection pool
   pool: Pool<Sqlite>,

   /// Held by the open transaction, if any
   transaction_lock: Arc<AsyncMutex<()>>,

   /// Per-database operation tracer
   tracer: Arc<OperationTracer>,

   /// Marks database as closed to prevent further operations
   closed: AtomicBool,

   /// Upper bound used for pool statistics
   max_open_connections: u32,

   /// Path to database file
   path: PathBuf,

   /// Run once the last reference is dropped, after the pool closes
   drop_hook: Mutex<Option<DropHook>>,
}

impl SqliteDatabase {
   /// Open (creating if missing) the database at `path`.
   ///
   /// The pool is configured from `custom_config` (or defaults), and the
   /// connection is verified with a ping before returning. On failure nothing is
   /// left open.
   pub async fn connect(
      path: impl AsRef<Path>,
      custom_config: Option<SqliteDatabaseConfig>,
   ) -> Result<Self> {
      let path = path.as_ref().to_path_buf();
      let config = custom_config.unwrap_or_default();
      let url = config.connection_url(&path)?;

      let options = SqliteConnectOptions::from_str(&url)?
         .create_if_missing(true)
         .journal_mode(SqliteJournalMode::Wal)
         .foreign_keys(true);

      let max_open_connections = config.max_open_connections();
      let pool = SqlitePoolOptions::new()
         .max_connections(max_open_connections)
         .min_connections(config.min_connections())
         .max_lifetime(config.connection_max_lifetime)
         .idle_timeout(config.idle_timeout)
         .connect_with(options)
         .await?;

      let tracer = Arc::new(OperationTracer::new(
         path.display().to_string(),
         config.trace_level,
      ));

      let db = Self {
         pool,
         transaction_lock: Arc::new(AsyncMutex::new(())),
         tracer,
         closed: AtomicBool::new(false),
         max_open_connections,
         path,
         drop_hook: Mutex::new(None),
      };

      if let Err(e) = db.ping().await {
         db.pool.close().await;
         return Err(e);
      }

      debug!(path = %db.path.display(), max_open_connections, "Opened SQLite database");
      Ok(db)
   }

   /// Path to the database file.
   pub fn path(&self) -> &Path {
      &self.path
   }

   /// The operation tracer for this database.
   pub fn tracer(&self) -> &Arc<OperationTracer> {
      &self.tracer
   }

   /// Get a reference to the connection pool for direct sqlx use.
   ///
   /// Operations issued directly on the pool bypass the operation tracer.
   pub fn pool(&self) -> Result<&Pool<Sqlite>> {
      self.ensure_open()?;
      Ok(&self.pool)
   }

   /// Verify that a connection can be acquired and answers.
   pub async fn ping(&self) -> Result<()> {
      self.ensure_open()?;
      let mut conn = self.pool.acquire().await?;
      conn.ping().await?;
      Ok(())
   }

   /// Prepare a statement on a pooled connection.
   ///
   /// The returned statement can be bound and run with sqlx against
   /// [`pool`](Self::pool).
   pub async fn prepare(&self, query: &str) -> Result<SqliteStatement<'static>> {
      self.ensure_open()?;
      let id = self.tracer.next_statement_id();
      let statement = self
         .tracer
         .observe(
            Operation::Prepare,
            Some(id),
            Some(query),
            (&self.pool).prepare(query),
         )
         .await?;
      Ok(sqlx::Statement::to_owned(&statement))
   }

   /// Execute a write query (INSERT/UPDATE/DELETE/DDL)
   pub async fn execute(&self, query: &str, values: Vec<JsonValue>) -> Result<WriteQueryResult> {
      self.ensure_open()?;
      let q = bind_values(sqlx::query(query), values);
      let id = self.tracer.next_statement_id();
      let result = self
         .tracer
         .observe(Operation::Execute, Some(id), Some(query), q.execute(&self.pool))
         .await?;
      Ok(result.into())
   }

   /// Execute a query and return all rows
   pub async fn query(&self, query: &str, values: Vec<JsonValue>) -> Result<Vec<SqliteRow>> {
      self.ensure_open()?;
      let q = bind_values(sqlx::query(query), values);
      let id = self.tracer.next_statement_id();
      let rows = self
         .tracer
         .observe(Operation::Query, Some(id), Some(query), q.fetch_all(&self.pool))
         .await?;
      Ok(rows)
   }

   /// Execute a query expecting zero or one row
   ///
   /// Rows after the first are discarded.
   pub async fn query_row(&self, query: &str, values: Vec<JsonValue>) -> Result<Option<SqliteRow>> {
      self.ensure_open()?;
      let q = bind_values(sqlx::query(query), values);
      let id = self.tracer.next_statement_id();
      let row = self
         .tracer
         .observe(Operation::Query, Some(id), Some(query), q.fetch_optional(&self.pool))
         .await?;
      Ok(row)
   }

   /// Execute a query and project the rows into records of type `T`
   ///
   /// Column types are checked against the prepared statement, so an
   /// unsupported column type fails even when the query returns no rows.
   pub async fn query_records<T: Record>(
      &self,
      query: &str,
      values: Vec<JsonValue>,
   ) -> Result<Vec<T>> {
      let statement = self.prepare(query).await?;
      let q = bind_values(sqlx::Statement::query(&statement), values);
      let id = self.tracer.next_statement_id();
      let rows = self
         .tracer
         .observe(Operation::Query, Some(id), Some(query), q.fetch_all(&self.pool))
         .await?;
      Ok(decode_records(sqlx::Statement::columns(&statement), &rows)?)
   }

   /// Execute a query and replace the contents of `dest` with the projected rows
   ///
   /// `dest` is left untouched if the query or the projection fails.
   pub async fn query_records_into<T: Record>(
      &self,
      dest: &mut Vec<T>,
      query: &str,
      values: Vec<JsonValue>,
   ) -> Result<()> {
      *dest = self.query_records(query, values).await?;
      Ok(())
   }

   /// Begin a transaction, waiting for any open transaction to finish first.
   ///
   /// The transaction keeps this database alive until it finishes, so a
   /// release of the last outside handle never tears it down mid-transaction.
   pub async fn begin(self: &Arc<Self>) -> Result<Transaction> {
      self.ensure_open()?;
      let lock = Arc::clone(&self.transaction_lock).lock_owned().await;

      // The lock is dropped with this frame if begin fails
      let id = self.tracer.next_transaction_id();
      let inner = self
         .tracer
         .observe_in(Some(id), Operation::Begin, None, None, self.pool.begin())
         .await?;

      Ok(Transaction::new(id, inner, Arc::clone(self), lock))
   }

   /// Current connection pool statistics.
   pub fn stats(&self) -> PoolStats {
      let open_connections = self.pool.size();
      let idle_connections = u32::try_from(self.pool.num_idle()).unwrap_or(u32::MAX);

      PoolStats {
         open_connections,
         idle_connections,
         in_use: open_connections.saturating_sub(idle_connections),
         max_open_connections: self.max_open_connections,
      }
   }

   /// Whether [`close`](Self::close) has been called.
   pub fn is_closed(&self) -> bool {
      self.closed.load(Ordering::Acquire)
   }

   /// Close the connection pool, waiting for checked-out connections to return.
   ///
   /// Subsequent operations fail with [`Error::DatabaseClosed`]. Closing twice is
   /// a no-op.
   pub async fn close(&self) -> Result<()> {
      if self.closed.swap(true, Ordering::AcqRel) {
         return Ok(());
      }

      close_pool(&self.pool, &self.tracer).await;
      info!(path = %self.path.display(), "Closed SQLite database");
      Ok(())
   }

   /// Close the pool and delete `dir`, the directory holding the database files.
   pub async fn destroy(self, dir: &Path) -> Result<()> {
      self.close().await?;

      match tokio::fs::remove_dir_all(dir).await {
         Ok(()) => {
            info!(dir = %dir.display(), "Removed database files");
            Ok(())
         }
         Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
         Err(e) => Err(e.into()),
      }
   }

   /// Register work to run once the last reference to this database is dropped.
   ///
   /// The pool is closed first. Replaces any previously registered hook.
   pub fn on_last_drop<F, Fut>(&self, hook: F)
   where
      F: FnOnce() -> Fut + Send + 'static,
      Fut: Future<Output = ()> + Send + 'static,
   {
      let hook: DropHook = Box::new(move || -> Pin<Box<dyn Future<Output = ()> + Send>> {
         Box::pin(hook())
      });
      if let Ok(mut slot) = self.drop_hook.lock() {
         *slot = Some(hook);
      }
   }

   /// Remove a hook registered with [`on_last_drop`](Self::on_last_drop).
   ///
   /// Returns whether a hook was registered.
   pub fn cancel_drop_hook(&self) -> bool {
      self
         .drop_hook
         .lock()
         .map(|mut slot| slot.take().is_some())
         .unwrap_or(false)
   }

   fn ensure_open(&self) -> Result<()> {
      if self.is_closed() {
         return Err(Error::DatabaseClosed);
      }
      Ok(())
   }
}

async fn close_pool(pool: &Pool<Sqlite>, tracer: &OperationTracer) {
   let _: std::result::Result<(), sqlx::Error> = tracer
      .observe(Operation::Close, None, None, async {
         pool.close().await;
         Ok(())
      })
      .await;
}

impl std::fmt::Debug for SqliteDatabase {
   fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
      f.debug_struct("SqliteDatabase")
         .field("path", &self.path)
         .field("closed", &self.is_closed())
         .field("stats", &self.stats())
         .finish_non_exhaustive()
   }
}

impl Drop for SqliteDatabase {
   fn drop(&mut self) {
      let hook = self.drop_hook.get_mut().ok().and_then(Option::take);
      let Some(hook) = hook else {
         return;
      };

      let pool = self.pool.clone();
      let tracer = Arc::clone(&self.tracer);
      let closed = self.is_closed();

      match tokio::runtime::Handle::try_current() {
         Ok(handle) => {
            handle.spawn(async move {
               if !closed {
                  close_pool(&pool, &tracer).await;
               }
               hook().await;
            });
         }
         Err(_) => {
            warn!(
               path = %self.path.display(),
               "No async runtime available; skipping teardown of dropped database"
            );
         }
      }
   }
}
