//! # datatables-core
//!
//! Backend-agnostic engine that answers server-side data grid requests by
//! composing SQL around a caller-supplied SELECT.
//!
//! ## Core Types
//!
//! - **[`QueryBuilder`]**: Discovers the projected columns and composes the statement chain
//! - **[`ColumnCollection`]** / **[`Column`]**: The column model, with hiding, transforms and filter hooks
//! - **[`RequestOptions`]**: Validated grid request descriptor
//! - **[`Dialect`]** / **[`DialectAdapter`]**: Per-backend SQL fragments and execution
//! - **[`FilterHelper`]**: Comparison builders handed to custom filter hooks
//!
//! ## Statement chain
//!
//! Every request produces three statements sharing one set of bindings:
//!
//! - **base**: the caller's SQL wrapped in a projection of the discovered columns
//! - **filtered**: base plus the WHERE clause built from the global and per-column searches
//! - **full**: filtered plus ORDER BY and LIMIT; its rows become the response page

mod builder;
mod collection;
mod column;
mod dialect;
mod error;
mod filter;
mod options;
mod projection;
mod result;
mod statement;

use indexmap::IndexMap;
use serde_json::Value as JsonValue;

pub use builder::{Addressing, ComposedQuery, DEFAULT_PAGE_LENGTH, QueryBuilder};
pub use collection::ColumnCollection;
pub use column::{Column, ColumnAttributes, FilterHook, FilterScope, ValueTransform};
pub use dialect::{Dialect, DialectAdapter};
pub use error::{Error, Result};
pub use filter::FilterHelper;
pub use options::{ColumnSpec, DataKey, OrderSpec, RequestOptions, SortDirection};
pub use projection::{column_names, has_order_by, rewrite_named_placeholders};
pub use result::{RowData, assemble_row, assemble_rows, cell_text};
pub use statement::Statement;

/// One result row as returned by an adapter: column name to raw value, in
/// projection order.
pub type Row = IndexMap<String, JsonValue>;
