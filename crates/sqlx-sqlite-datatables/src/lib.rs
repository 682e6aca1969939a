//! # sqlx-sqlite-datatables
//!
//! SQLite backend for [`datatables_core`], built on SQLx.
//!
//! ## Core Types
//!
//! - **[`SqliteAdapter`]**: Connection pool plus the SQLite dialect; implements
//!   [`DialectAdapter`](datatables_core::DialectAdapter)
//! - **[`SqliteAdapterConfig`]**: Pool and matching settings
//! - **[`Error`]**: Adapter errors with machine-readable codes
//!
//! Values decode by storage class: `NULL` to null, `INTEGER` to a number,
//! `REAL` to a float, `TEXT` to a string and `BLOB` to base64 text.

mod adapter;
mod config;
mod decode;
mod error;

pub use adapter::SqliteAdapter;
pub use config::SqliteAdapterConfig;
pub use error::{Error, Result};
