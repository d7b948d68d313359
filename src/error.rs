//! Error types for the database registry

/// Result type alias for registry operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors returned by [`DatabaseRegistry`](crate::DatabaseRegistry).
#[derive(Debug, thiserror::Error)]
pub enum Error {
   /// The common identity was passed explicitly.
   #[error("reserved ID: {0}")]
   ReservedIdentity(String),

   /// The base version was passed explicitly.
   #[error("reserved version: {0}")]
   ReservedVersion(String),

   /// Identity or version cannot be used as a storage path segment.
   #[error("invalid key segment: '{0}'")]
   InvalidKey(String),

   /// Release was requested for a key with no open database.
   #[error("cannot find DB handle for {0} to release")]
   NotFound(String),

   /// The configured driver is not an embedded SQLite driver.
   #[error("unsupported data driver: {0}")]
   UnsupportedDriver(String),

   /// A configured log level could not be parsed.
   #[error("invalid level '{0}'")]
   InvalidLevel(String),

   /// Error from the connection manager.
   #[error(transparent)]
   ConnectionManager(#[from] sqlx_sqlite_conn_mgr::Error),

   /// I/O error when preparing database directories.
   #[error("io error: {0}")]
   Io(#[from] std::io::Error),
}

impl Error {
   /// Extract a structured error code from the error type.
   pub fn error_code(&self) -> String {
      match self {
         Error::ReservedIdentity(_) | Error::ReservedVersion(_) | Error::InvalidKey(_) => {
            "INVALID_KEY".to_string()
         }
         Error::NotFound(_) => "NOT_FOUND".to_string(),
         Error::UnsupportedDriver(_) => "UNSUPPORTED_DRIVER".to_string(),
         Error::InvalidLevel(_) => "INVALID_LEVEL".to_string(),
         Error::ConnectionManager(e) => e.error_code(),
         Error::Io(_) => "IO_ERROR".to_string(),
      }
   }

   /// True for errors caused by the identity or version passed in.
   pub fn is_invalid_key(&self) -> bool {
      matches!(
         self,
         Error::ReservedIdentity(_) | Error::ReservedVersion(_) | Error::InvalidKey(_)
      )
   }
}

#[cfg(test)]
mod tests {
   use super::*;

   #[test]
   fn test_error_code_reserved_values() {
      let err = Error::ReservedIdentity("common".into());
      assert_eq!(err.error_code(), "INVALID_KEY");
      assert_eq!(err.to_string(), "reserved ID: common");
      assert!(err.is_invalid_key());

      let err = Error::ReservedVersion("base".into());
      assert_eq!(err.error_code(), "INVALID_KEY");
      assert!(err.to_string().contains("base"));
   }

   #[test]
   fn test_error_code_not_found() {
      let err = Error::NotFound("org1/1.0".into());
      assert_eq!(err.error_code(), "NOT_FOUND");
      assert!(err.to_string().contains("org1/1.0"));
      assert!(!err.is_invalid_key());
   }

   #[test]
   fn test_error_code_connection_manager_passthrough() {
      let err = Error::from(sqlx_sqlite_conn_mgr::Error::DatabaseClosed);
      assert_eq!(err.error_code(), "DATABASE_CLOSED");
   }

   #[test]
   fn test_error_code_io() {
      let err = Error::Io(std::io::Error::new(
         std::io::ErrorKind::PermissionDenied,
         "denied",
      ));
      assert_eq!(err.error_code(), "IO_ERROR");
   }
}
