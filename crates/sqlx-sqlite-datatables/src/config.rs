//! Configuration for the SQLite adapter

use std::time::Duration;

use serde::Deserialize;

/// Configuration for [`SqliteAdapter`](crate::SqliteAdapter)
///
/// # Examples
///
/// ```
/// use sqlx_sqlite_datatables::SqliteAdapterConfig;
/// use std::time::Duration;
///
/// // Use defaults
/// let config = SqliteAdapterConfig::default();
///
/// // Override just one field
/// let config = SqliteAdapterConfig {
///     idle_timeout: Duration::from_secs(60),
///     ..Default::default()
/// };
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SqliteAdapterConfig {
   /// Maximum number of pooled connections
   ///
   /// Grid requests only read, so every connection can serve any request.
   ///
   /// Default: 6
   pub max_connections: u32,

   /// Idle timeout for pooled connections
   ///
   /// Default: 30 seconds
   #[serde(with = "seconds")]
   pub idle_timeout: Duration,

   /// Open the database file read-only
   ///
   /// When false the file is created if it does not exist.
   ///
   /// Default: false
   pub read_only: bool,

   /// Use `=` instead of `LIKE '%word%'` for default column matches
   ///
   /// Default: false
   pub exact_match: bool,
}

impl Default for SqliteAdapterConfig {
   fn default() -> Self {
      Self {
         max_connections: 6,
         idle_timeout: Duration::from_secs(30),
         read_only: false,
         exact_match: false,
      }
   }
}

mod seconds {
   use std::time::Duration;

   use serde::{Deserialize, Deserializer};

   pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
   where
      D: Deserializer<'de>,
   {
      u64::deserialize(deserializer).map(Duration::from_secs)
   }
}
