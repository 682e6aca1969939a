//! Configuration for grid request handling

use serde::Deserialize;

/// Configuration for [`Datatables`](crate::Datatables)
///
/// # Examples
///
/// ```
/// use sqlx_datatables::DatatablesConfig;
///
/// // Use defaults
/// let config = DatatablesConfig::default();
///
/// // Report error detail and a call trace in responses
/// let config = DatatablesConfig {
///     debug: true,
///     ..Default::default()
/// };
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DatatablesConfig {
   /// Page length used when a request leaves `length` unset or zero
   ///
   /// Default: 10
   pub default_page_length: i64,

   /// Debug mode
   ///
   /// Error responses carry the failure message and its source chain
   /// instead of the generic message, and every response carries a
   /// `debug` trace. Never enable this for untrusted clients.
   ///
   /// Default: false
   pub debug: bool,
}

impl Default for DatatablesConfig {
   fn default() -> Self {
      Self {
         default_page_length: datatables_core::DEFAULT_PAGE_LENGTH,
         debug: false,
      }
   }
}
