//! # sqlx-datatables
//!
//! Server-side processing for paginated data grids. Give it a SELECT and a
//! grid request; it answers with one page of rows plus total and filtered
//! counts, composing parameterized SQL for the search, order and paging the
//! client asked for.
//!
//! ## Core Types
//!
//! - **[`Datatables`]**: Per-request orchestrator and column customisation API
//! - **[`GridResponse`]**: The response payload
//! - **[`DatatablesConfig`]**: Page length default and debug mode
//! - **[`SqliteAdapter`]**: SQLite backend (re-exported from `sqlx-sqlite-datatables`)
//!
//! The composition engine lives in [`datatables_core`] and is re-exported
//! here, so custom filter hooks and other backends only need this crate.
//!
//! ## Example
//!
//! ```no_run
//! use serde_json::json;
//! use sqlx_datatables::{Datatables, FilterScope, SqliteAdapter, SqliteAdapterConfig};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let adapter = SqliteAdapter::connect("app.db", SqliteAdapterConfig::default()).await?;
//! let request = json!({
//!    "draw": 1,
//!    "start": 0,
//!    "length": 25,
//!    "search": { "value": "" },
//!    "columns": [
//!       { "data": "0", "searchable": true, "orderable": true, "search": { "value": "4" } },
//!    ],
//! });
//!
//! let mut grid = Datatables::new(adapter, &request);
//! grid
//!    .query("SELECT id, name FROM users")?
//!    .filter("id", FilterScope::Individual, |helper| Some(helper.greater_or_equal(4)))?
//!    .add("label", |row| format!("user {}", sqlx_datatables::cell_text(&row["name"])))?;
//!
//! let response = grid.generate().await;
//! println!("{}", response.to_json());
//! # Ok(())
//! # }
//! ```

mod config;
mod datatables;
mod debug;
mod response;

pub use config::DatatablesConfig;
pub use datatables::Datatables;
pub use debug::{DebugCall, DebugTrace};
pub use response::{GENERIC_ERROR, GridResponse};

pub use datatables_core::{
   Addressing, Column, ColumnAttributes, ColumnCollection, ColumnSpec, ComposedQuery, DataKey, Dialect,
   DialectAdapter, Error, FilterHelper, FilterHook, FilterScope, OrderSpec, QueryBuilder, RequestOptions,
   Result, Row, RowData, SortDirection, Statement, ValueTransform, cell_text,
};
pub use sqlx_sqlite_datatables::{SqliteAdapter, SqliteAdapterConfig};
