/// Result type alias for adapter operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for the SQLite adapter.
#[derive(Debug, thiserror::Error)]
pub enum Error {
   /// Error from SQLx operations.
   #[error(transparent)]
   Sqlx(#[from] sqlx::Error),

   /// SQLite type that cannot be mapped to JSON.
   #[error("unsupported datatype: {0}")]
   UnsupportedDatatype(String),

   /// Binding key that is not a numbered placeholder, or numbering with gaps.
   #[error("invalid parameter key '{key}': bindings must be numbered $1..$n")]
   InvalidParameter { key: String },
}

impl Error {
   /// Extract a structured error code from the error type.
   pub fn error_code(&self) -> String {
      match self {
         Error::Sqlx(e) => {
            if let Some(code) = e.as_database_error().and_then(|db_err| db_err.code()) {
               return format!("SQLITE_{}", code);
            }
            "SQLX_ERROR".to_string()
         }
         Error::UnsupportedDatatype(_) => "UNSUPPORTED_DATATYPE".to_string(),
         Error::InvalidParameter { .. } => "INVALID_PARAMETER".to_string(),
      }
   }
}

impl From<Error> for datatables_core::Error {
   fn from(err: Error) -> Self {
      datatables_core::Error::adapter(err.error_code(), err)
   }
}
