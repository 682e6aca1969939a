//! Error types for datatables-core

/// Result type alias for composition operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while configuring or running a grid query.
///
/// Malformed request input never shows up here: invalid descriptor entries
/// are dropped during validation and the request proceeds with defaults.
#[derive(Debug, thiserror::Error)]
pub enum Error {
   /// The base projection exposes no nameable columns.
   #[error("no columns could be determined from the base query")]
   NoColumns,

   /// Two projected columns resolve to the same name.
   #[error("duplicate column name '{name}' in the base query")]
   DuplicateColumn { name: String },

   /// A customisation referenced a column that does not exist.
   #[error("unknown column '{name}'")]
   UnknownColumn { name: String },

   /// Generation was requested before a base query was supplied.
   #[error("no base query has been set")]
   QueryNotSet,

   /// Failure reported by the dialect adapter (connection, execution, decoding).
   #[error("adapter error: {source}")]
   Adapter {
      code: String,
      #[source]
      source: Box<dyn std::error::Error + Send + Sync + 'static>,
   },
}

impl Error {
   /// Wrap an adapter failure, keeping its machine-readable code.
   pub fn adapter(
      code: impl Into<String>,
      source: impl Into<Box<dyn std::error::Error + Send + Sync + 'static>>,
   ) -> Self {
      Error::Adapter {
         code: code.into(),
         source: source.into(),
      }
   }

   /// Extract a structured error code from the error type.
   pub fn error_code(&self) -> String {
      match self {
         Error::NoColumns => "NO_COLUMNS".to_string(),
         Error::DuplicateColumn { .. } => "DUPLICATE_COLUMN".to_string(),
         Error::UnknownColumn { .. } => "UNKNOWN_COLUMN".to_string(),
         Error::QueryNotSet => "QUERY_NOT_SET".to_string(),
         Error::Adapter { code, .. } => code.clone(),
      }
   }

   /// Whether this is a configuration error (as opposed to a runtime failure).
   pub fn is_configuration(&self) -> bool {
      matches!(
         self,
         Error::NoColumns
            | Error::DuplicateColumn { .. }
            | Error::UnknownColumn { .. }
            | Error::QueryNotSet
      )
   }
}
