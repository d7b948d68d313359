//! Registry of open databases keyed by identity and version

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Weak};

use sqlx_sqlite_conn_mgr::{SqliteDatabase, SqliteDatabaseConfig};
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

use crate::config::RegistryConfig;
use crate::diagnostics::{STAT_COLLECTION_INTERVAL, StatsSampler};
use crate::error::{Error, Result};
use crate::key::{BASE_VERSION, COMMON_ID, VersionedKey};

/// Name of the database file inside each key's directory.
pub const DATA_FILE_NAME: &str = "sqlite3";

struct RegistryEntry {
   database: Arc<SqliteDatabase>,
   sampler: Option<StatsSampler>,
}

type Entries = RwLock<HashMap<VersionedKey, RegistryEntry>>;

/// Opens, shares, and tears down databases keyed by `(identity, version)`.
///
/// Every caller asking for the same key gets the same handle until the key is
/// released. Releasing a key removes it from the registry and deletes its
/// files once no caller holds the handle any longer.
pub struct DatabaseRegistry {
   config: RegistryConfig,
   database_config: SqliteDatabaseConfig,
   sample_stats: bool,
   entries: Arc<Entries>,
}

impl DatabaseRegistry {
   /// Create an empty registry.
   ///
   /// Fails for an unsupported driver or an unparseable log level.
   pub fn new(config: RegistryConfig) -> Result<Self> {
      config.validate()?;
      let database_config = config.database_config()?;
      let sample_stats = config.samples_stats()?;

      Ok(Self {
         config,
         database_config,
         sample_stats,
         entries: Arc::new(RwLock::new(HashMap::new())),
      })
   }

   pub fn config(&self) -> &RegistryConfig {
      &self.config
   }

   /// Database for the common identity at the base version.
   pub async fn get_default(&self) -> Result<Arc<SqliteDatabase>> {
      self.database_for(VersionedKey::common()).await
   }

   /// Database for `id` at the base version.
   pub async fn get_for_identity(&self, id: &str) -> Result<Arc<SqliteDatabase>> {
      self.database_for(VersionedKey::for_identity(id)?).await
   }

   /// Database for the common identity at `version`.
   pub async fn get_for_version(&self, version: &str) -> Result<Arc<SqliteDatabase>> {
      self.database_for(VersionedKey::for_version(version)?).await
   }

   /// Database for `id` at `version`.
   pub async fn get_for_identity_and_version(
      &self,
      id: &str,
      version: &str,
   ) -> Result<Arc<SqliteDatabase>> {
      self
         .database_for(VersionedKey::for_identity_and_version(id, version)?)
         .await
   }

   /// Release the database for the common identity at the base version.
   pub async fn release_default(&self) -> Result<()> {
      self.release(COMMON_ID, BASE_VERSION).await
   }

   /// Release the database for the common identity at `version`.
   pub async fn release_version(&self, version: &str) -> Result<()> {
      self.release(COMMON_ID, version).await
   }

   /// Release the database for `(id, version)`.
   ///
   /// The key leaves the registry immediately. If no caller still holds the
   /// handle, the pool is closed and the key's directory deleted before this
   /// returns; otherwise that happens when the last handle is dropped.
   /// Teardown failures are logged, not returned.
   pub async fn release(&self, id: &str, version: &str) -> Result<()> {
      let key = VersionedKey::from_parts(id, version);
      let mut entries = self.entries.write().await;

      let Some(entry) = entries.remove(&key) else {
         error!(key = %key, "Cannot find DB handle to release");
         return Err(Error::NotFound(key.to_string()));
      };

      if let Some(sampler) = entry.sampler {
         sampler.stop();
      }

      let dir = self.database_dir(&key);
      match Arc::try_unwrap(entry.database) {
         Ok(database) => {
            info!(key = %key, "Releasing DB");
            if let Err(e) = database.destroy(&dir).await {
               error!(key = %key, dir = %dir.display(), error = %e, "Failed to remove database files");
            }
         }
         Err(shared) => {
            info!(
               key = %key,
               "DB still in use; removing files after the last handle is dropped"
            );
            let registry = Arc::downgrade(&self.entries);
            shared.on_last_drop(move || remove_unclaimed(registry, key, dir));
         }
      }

      Ok(())
   }

   /// Close every open database without deleting any files.
   ///
   /// Callers still holding handles get
   /// [`DatabaseClosed`](sqlx_sqlite_conn_mgr::Error::DatabaseClosed) afterwards.
   pub async fn close_all(&self) {
      let drained: Vec<_> = self.entries.write().await.drain().collect();

      for (key, entry) in drained {
         if let Some(sampler) = entry.sampler {
            sampler.stop();
         }
         if let Err(e) = entry.database.close().await {
            warn!(key = %key, error = %e, "Failed to close database");
         }
      }
   }

   /// Number of open databases.
   pub async fn len(&self) -> usize {
      self.entries.read().await.len()
   }

   pub async fn is_empty(&self) -> bool {
      self.entries.read().await.is_empty()
   }

   /// Whether a database is open for `(id, version)`.
   pub async fn contains(&self, id: &str, version: &str) -> bool {
      let key = VersionedKey::from_parts(id, version);
      self.entries.read().await.contains_key(&key)
   }

   /// Directory holding the files for `key`.
   pub fn database_dir(&self, key: &VersionedKey) -> PathBuf {
      self.config.data_dir().join(key.relative_path())
   }

   async fn database_for(&self, key: VersionedKey) -> Result<Arc<SqliteDatabase>> {
      if let Some(entry) = self.entries.read().await.get(&key) {
         return Ok(Arc::clone(&entry.database));
      }

      let mut entries = self.entries.write().await;

      // Another caller may have opened it while we waited for the write lock
      if let Some(entry) = entries.get(&key) {
         return Ok(Arc::clone(&entry.database));
      }

      let dir = self.database_dir(&key);
      create_private_dir(&dir).await?;

      let path = dir.join(DATA_FILE_NAME);
      info!(key = %key, path = %path.display(), "LoadDB");

      let database = SqliteDatabase::connect(&path, Some(self.database_config.clone()))
         .await
         .inspect_err(|e| error!(key = %key, error = %e, "Error loading database"))?;
      let database = Arc::new(database);

      let sampler = self.sample_stats.then(|| {
         StatsSampler::spawn(
            key.clone(),
            Arc::downgrade(&database),
            STAT_COLLECTION_INTERVAL,
         )
      });

      entries.insert(
         key,
         RegistryEntry {
            database: Arc::clone(&database),
            sampler,
         },
      );

      Ok(database)
   }
}

impl std::fmt::Debug for DatabaseRegistry {
   fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
      f.debug_struct("DatabaseRegistry")
         .field("data_dir", &self.config.data_dir())
         .field("sample_stats", &self.sample_stats)
         .finish_non_exhaustive()
   }
}

async fn create_private_dir(dir: &Path) -> Result<()> {
   let mut builder = tokio::fs::DirBuilder::new();
   builder.recursive(true);
   #[cfg(unix)]
   builder.mode(0o700);
   builder.create(dir).await?;
   Ok(())
}

/// Delete a released database's files unless its key was opened again.
///
/// Runs under the registry write lock, so it cannot interleave with a new
/// open of the same key.
async fn remove_unclaimed(registry: Weak<Entries>, key: VersionedKey, dir: PathBuf) {
   let registry = registry.upgrade();
   let _guard = match &registry {
      Some(entries) => {
         let guard = entries.write().await;
         if guard.contains_key(&key) {
            debug!(key = %key, "Key reopened; keeping database files");
            return;
         }
         Some(guard)
      }
      None => None,
   };

   match tokio::fs::remove_dir_all(&dir).await {
      Ok(()) => info!(key = %key, dir = %dir.display(), "Removed released database files"),
      Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
      Err(e) => {
         error!(key = %key, dir = %dir.display(), error = %e, "Failed to remove database files")
      }
   }
}

#[cfg(test)]
mod tests {
   use super::*;
   use tempfile::TempDir;

   fn registry(temp: &TempDir) -> DatabaseRegistry {
      DatabaseRegistry::new(RegistryConfig::with_storage_root(temp.path())).unwrap()
   }

   #[tokio::test]
   async fn test_database_file_location() {
      let temp = TempDir::new().unwrap();
      let registry = registry(&temp);

      let db = registry.get_for_identity_and_version("org1", "1.0").await.unwrap();
      let expected = temp.path().join("sqlite").join("org1").join("1.0").join(DATA_FILE_NAME);

      assert_eq!(db.path(), expected.as_path());
      assert!(expected.exists());
   }

   #[cfg(unix)]
   #[tokio::test]
   async fn test_directories_are_private() {
      use std::os::unix::fs::PermissionsExt;

      let temp = TempDir::new().unwrap();
      let registry = registry(&temp);
      let _db = registry.get_for_identity("org2").await.unwrap();

      let dir = registry.database_dir(&VersionedKey::from_parts("org2", BASE_VERSION));
      let mode = std::fs::metadata(&dir).unwrap().permissions().mode();
      assert_eq!(mode & 0o777, 0o700);
   }

   #[tokio::test]
   async fn test_sampler_attached_at_debug_level() {
      let temp = TempDir::new().unwrap();
      let registry = DatabaseRegistry::new(RegistryConfig {
         log_level: "debug".into(),
         ..RegistryConfig::with_storage_root(temp.path())
      })
      .unwrap();

      registry.get_default().await.unwrap();
      {
         let entries = registry.entries.read().await;
         let entry = entries.get(&VersionedKey::common()).unwrap();
         assert!(entry.sampler.is_some());
      }

      registry.release_default().await.unwrap();
      assert!(registry.is_empty().await);
   }

   #[tokio::test]
   async fn test_no_sampler_at_info_level() {
      let temp = TempDir::new().unwrap();
      let registry = registry(&temp);

      registry.get_default().await.unwrap();
      let entries = registry.entries.read().await;
      assert!(entries.get(&VersionedKey::common()).unwrap().sampler.is_none());
   }

   #[tokio::test]
   async fn test_remove_unclaimed_keeps_reopened_key() {
      let temp = TempDir::new().unwrap();
      let registry = registry(&temp);

      let _db = registry.get_for_identity("org1").await.unwrap();
      let key = VersionedKey::from_parts("org1", BASE_VERSION);
      let dir = registry.database_dir(&key);

      remove_unclaimed(Arc::downgrade(&registry.entries), key, dir.clone()).await;
      assert!(dir.exists());
   }

   #[tokio::test]
   async fn test_remove_unclaimed_after_registry_dropped() {
      let temp = TempDir::new().unwrap();
      let dir = temp.path().join("orphan");
      std::fs::create_dir_all(&dir).unwrap();

      let entries: Arc<Entries> = Arc::new(RwLock::new(HashMap::new()));
      let weak = Arc::downgrade(&entries);
      drop(entries);

      remove_unclaimed(weak, VersionedKey::common(), dir.clone()).await;
      assert!(!dir.exists());
   }
}
