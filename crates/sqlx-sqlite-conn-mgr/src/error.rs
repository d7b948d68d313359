//! Error types for sqlx-sqlite-conn-mgr

use thiserror::Error;

/// Errors that may occur when working with sqlx-sqlite-conn-mgr
#[derive(Error, Debug)]
pub enum Error {
   /// IO error when accessing database files. Standard library IO errors
   /// are converted to this variant.
   #[error("IO error: {0}")]
   Io(#[from] std::io::Error),

   /// Error from the sqlx library. Standard sqlx errors are converted to this variant
   #[error("Sqlx error: {0}")]
   Sqlx(#[from] sqlx::Error),

   /// Rows could not be projected into the requested record type
   #[error(transparent)]
   Records(#[from] sqlx_sqlite_records::Error),

   /// Database has been closed and cannot be used
   #[error("Database has been closed")]
   DatabaseClosed,

   /// The connection string template has no `%s` placeholder for the file path
   #[error("connection template must contain '%s': {0}")]
   InvalidConnectionTemplate(String),

   /// The operation's cancellation signal fired before it completed
   #[error("operation cancelled")]
   Cancelled,
}

impl Error {
   /// Machine-readable code for this error.
   pub fn error_code(&self) -> String {
      match self {
         Error::Io(_) => "IO_ERROR".to_string(),
         Error::Sqlx(e) => {
            if let Some(code) = e.as_database_error().and_then(|db_err| db_err.code()) {
               return format!("SQLITE_{}", code);
            }
            "SQLX_ERROR".to_string()
         }
         Error::Records(e) => e.error_code(),
         Error::DatabaseClosed => "DATABASE_CLOSED".to_string(),
         Error::InvalidConnectionTemplate(_) => "INVALID_CONNECTION_TEMPLATE".to_string(),
         Error::Cancelled => "CANCELLED".to_string(),
      }
   }
}

/// A type alias for Results with our Error type
pub type Result<T> = std::result::Result<T, Error>;
