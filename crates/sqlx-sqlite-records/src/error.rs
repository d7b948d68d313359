//! Error types for sqlx-sqlite-records

/// Errors that may occur while projecting rows into records.
#[derive(Debug, thiserror::Error)]
pub enum Error {
   /// Reading a column value from a row failed.
   #[error("Sqlx error: {0}")]
   Sqlx(#[from] sqlx::Error),

   /// The engine reported a column type that has no carrier.
   #[error("unsupported column type: {0}")]
   UnsupportedColumnType(String),

   /// A column value cannot be assigned to the field mapped to it.
   #[error("cannot convert column type {column_type} to field type {field_type}")]
   TypeMismatch {
      column_type: String,
      field_type: &'static str,
   },

   /// A column value does not fit the numeric type of its mapped field.
   #[error("value {value} out of range for field type {field_type}")]
   OutOfRange {
      value: String,
      field_type: &'static str,
   },
}

impl Error {
   /// Machine-readable code for this error.
   pub fn error_code(&self) -> String {
      match self {
         Error::Sqlx(_) => "SQLX_ERROR".to_string(),
         Error::UnsupportedColumnType(_) => "UNSUPPORTED_COLUMN_TYPE".to_string(),
         Error::TypeMismatch { .. } => "TYPE_MISMATCH".to_string(),
         Error::OutOfRange { .. } => "OUT_OF_RANGE".to_string(),
      }
   }
}

/// A type alias for Results with our Error type
pub type Result<T> = std::result::Result<T, Error>;
