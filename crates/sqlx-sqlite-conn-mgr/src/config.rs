//! Configuration for SQLite database connection pools

use std::path::Path;
use std::time::Duration;

use tracing::level_filters::LevelFilter;

use crate::error::{Error, Result};

/// Placeholder replaced with the database file path in connection templates.
pub const PATH_PLACEHOLDER: &str = "%s";

/// Configuration for a SqliteDatabase connection pool
///
/// # Examples
///
/// ```
/// use sqlx_sqlite_conn_mgr::SqliteDatabaseConfig;
/// use std::time::Duration;
///
/// // Use defaults
/// let config = SqliteDatabaseConfig::default();
///
/// // Override just a few fields
/// let config = SqliteDatabaseConfig {
///     max_open_connections: 3,
///     connection_max_lifetime: Some(Duration::from_secs(300)),
///     ..Default::default()
/// };
/// ```
#[derive(Debug, Clone)]
pub struct SqliteDatabaseConfig {
   /// Maximum number of open connections in the pool
   ///
   /// Default: 6
   pub max_open_connections: u32,

   /// Number of idle connections the pool keeps open
   ///
   /// sqlx pools have no idle ceiling, so this becomes the pool's minimum size,
   /// capped at `max_open_connections`.
   ///
   /// Default: 2
   pub max_idle_connections: u32,

   /// Connections older than this are closed and replaced
   ///
   /// Default: None (connections are never recycled for age)
   pub connection_max_lifetime: Option<Duration>,

   /// Connections idle for this long are closed
   ///
   /// Default: 30 seconds
   pub idle_timeout: Duration,

   /// Connection string with a `%s` placeholder for the database file path
   ///
   /// Default: `sqlite:%s`
   pub connection_template: String,

   /// Most verbose level at which driver operations are traced
   ///
   /// Begin/end entries for each operation are only emitted when this admits
   /// `DEBUG`. Failures are always emitted at `ERROR`.
   ///
   /// Default: WARN
   pub trace_level: LevelFilter,
}

impl Default for SqliteDatabaseConfig {
   fn default() -> Self {
      Self {
         max_open_connections: 6,
         max_idle_connections: 2,
         connection_max_lifetime: None,
         idle_timeout: Duration::from_secs(30),
         connection_template: format!("sqlite:{PATH_PLACEHOLDER}"),
         trace_level: LevelFilter::WARN,
      }
   }
}

impl SqliteDatabaseConfig {
   /// Substitutes `path` into the connection template.
   pub fn connection_url(&self, path: &Path) -> Result<String> {
      if !self.connection_template.contains(PATH_PLACEHOLDER) {
         return Err(Error::InvalidConnectionTemplate(
            self.connection_template.clone(),
         ));
      }

      Ok(self
         .connection_template
         .replacen(PATH_PLACEHOLDER, &path.to_string_lossy(), 1))
   }

   pub(crate) fn min_connections(&self) -> u32 {
      self.max_idle_connections.min(self.max_open_connections())
   }

   pub(crate) fn max_open_connections(&self) -> u32 {
      self.max_open_connections.max(1)
   }
}
