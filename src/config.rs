//! Registry configuration

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use serde::Deserialize;
use sqlx_sqlite_conn_mgr::SqliteDatabaseConfig;
use tracing::level_filters::LevelFilter;

use crate::error::{Error, Result};

/// Drivers that resolve to the embedded SQLite engine.
const SUPPORTED_DRIVERS: &[&str] = &["sqlite3", "sqlite"];

/// Settings for a [`DatabaseRegistry`](crate::DatabaseRegistry).
///
/// Every field has a default, so a partial document deserializes:
///
/// ```
/// use sqlx_sqlite_registry::RegistryConfig;
///
/// let config: RegistryConfig =
///    serde_json::from_str(r#"{ "storage_root": "/var/lib/app", "trace_level": "debug" }"#)
///       .unwrap();
/// assert_eq!(config.data_path, "sqlite");
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
   /// Root storage directory.
   pub storage_root: PathBuf,

   /// Subdirectory of `storage_root` holding all databases.
   pub data_path: String,

   /// Driver name. Only the embedded SQLite driver is supported.
   pub driver: String,

   /// Connection string with a `%s` placeholder for the database file path.
   pub connection_template: String,

   /// Level at which driver operations are traced.
   pub trace_level: String,

   /// Application log level. Connection statistics are sampled when this
   /// admits `debug`.
   pub log_level: String,

   pub max_open_connections: u32,

   pub max_idle_connections: u32,

   /// Maximum connection age in seconds. Zero keeps connections indefinitely.
   pub connection_max_lifetime_secs: u64,

   pub idle_timeout_secs: u64,
}

impl Default for RegistryConfig {
   fn default() -> Self {
      let pool = SqliteDatabaseConfig::default();
      Self {
         storage_root: PathBuf::from("."),
         data_path: "sqlite".to_string(),
         driver: "sqlite3".to_string(),
         connection_template: pool.connection_template,
         trace_level: "warn".to_string(),
         log_level: "info".to_string(),
         max_open_connections: pool.max_open_connections,
         max_idle_connections: pool.max_idle_connections,
         connection_max_lifetime_secs: 0,
         idle_timeout_secs: pool.idle_timeout.as_secs(),
      }
   }
}

impl RegistryConfig {
   /// Configuration storing databases under `storage_root`, with defaults
   /// for everything else.
   pub fn with_storage_root(storage_root: impl Into<PathBuf>) -> Self {
      Self {
         storage_root: storage_root.into(),
         ..Default::default()
      }
   }

   /// Directory holding every database, `<storage_root>/<data_path>`.
   pub fn data_dir(&self) -> PathBuf {
      self.storage_root.join(&self.data_path)
   }

   /// Checks the driver and both log levels.
   pub fn validate(&self) -> Result<()> {
      if !SUPPORTED_DRIVERS.contains(&self.driver.as_str()) {
         return Err(Error::UnsupportedDriver(self.driver.clone()));
      }
      parse_level(&self.trace_level)?;
      parse_level(&self.log_level)?;
      Ok(())
   }

   /// Whether periodic connection statistics should be logged.
   pub fn samples_stats(&self) -> Result<bool> {
      Ok(parse_level(&self.log_level)? >= LevelFilter::DEBUG)
   }

   /// Pool configuration applied to every database in the registry.
   pub fn database_config(&self) -> Result<SqliteDatabaseConfig> {
      let connection_max_lifetime = match self.connection_max_lifetime_secs {
         0 => None,
         secs => Some(Duration::from_secs(secs)),
      };

      Ok(SqliteDatabaseConfig {
         max_open_connections: self.max_open_connections,
         max_idle_connections: self.max_idle_connections,
         connection_max_lifetime,
         idle_timeout: Duration::from_secs(self.idle_timeout_secs),
         connection_template: self.connection_template.clone(),
         trace_level: parse_level(&self.trace_level)?,
      })
   }
}

fn parse_level(level: &str) -> Result<LevelFilter> {
   LevelFilter::from_str(level.trim()).map_err(|_| Error::InvalidLevel(level.to_string()))
}

#[cfg(test)]
mod tests {
   use super::*;

   #[test]
   fn test_defaults() {
      let config = RegistryConfig::default();
      assert_eq!(config.driver, "sqlite3");
      assert_eq!(config.data_path, "sqlite");
      assert_eq!(config.connection_template, "sqlite:%s");
      assert_eq!(config.trace_level, "warn");
      assert!(config.validate().is_ok());
      assert!(!config.samples_stats().unwrap());
   }

   #[test]
   fn test_partial_document_uses_defaults() {
      let config: RegistryConfig = serde_json::from_str(
         r#"{ "storage_root": "/srv/data", "max_open_connections": 3, "log_level": "DEBUG" }"#,
      )
      .unwrap();

      assert_eq!(config.data_dir(), PathBuf::from("/srv/data").join("sqlite"));
      assert_eq!(config.max_open_connections, 3);
      assert_eq!(config.max_idle_connections, 2);
      assert!(config.samples_stats().unwrap());
   }

   #[test]
   fn test_database_config_conversion() {
      let config = RegistryConfig {
         trace_level: "debug".into(),
         connection_max_lifetime_secs: 120,
         idle_timeout_secs: 5,
         ..Default::default()
      };
      let db_config = config.database_config().unwrap();

      assert_eq!(db_config.trace_level, LevelFilter::DEBUG);
      assert_eq!(
         db_config.connection_max_lifetime,
         Some(Duration::from_secs(120))
      );
      assert_eq!(db_config.idle_timeout, Duration::from_secs(5));

      let unlimited = RegistryConfig::default().database_config().unwrap();
      assert_eq!(unlimited.connection_max_lifetime, None);
   }

   #[test]
   fn test_sqlite_driver_alias_accepted() {
      let config = RegistryConfig {
         driver: "sqlite".into(),
         ..Default::default()
      };
      assert!(config.validate().is_ok());
   }

   #[test]
   fn test_unsupported_driver_rejected() {
      let config = RegistryConfig {
         driver: "postgres".into(),
         ..Default::default()
      };
      assert!(matches!(
         config.validate(),
         Err(Error::UnsupportedDriver(driver)) if driver == "postgres"
      ));
   }

   #[test]
   fn test_invalid_level_rejected() {
      let config = RegistryConfig {
         trace_level: "loud".into(),
         ..Default::default()
      };
      assert!(matches!(config.validate(), Err(Error::InvalidLevel(_))));

      let config = RegistryConfig {
         log_level: "chatty".into(),
         ..Default::default()
      };
      assert!(matches!(config.samples_stats(), Err(Error::InvalidLevel(_))));
   }
}
