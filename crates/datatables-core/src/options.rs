//! Validated view over an incoming grid request descriptor.
//!
//! The descriptor is untrusted input. Every entry is checked for shape and
//! type; anything malformed is dropped with a `trace!` event instead of
//! failing the request, so a bad order entry degrades to "no ordering" and a
//! bad column entry to "no per-column filter".

use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value as JsonValue;
use tracing::trace;

/// Sort direction requested for a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SortDirection {
   /// Ascending order (smallest first)
   Asc,
   /// Descending order (largest first)
   Desc,
}

impl SortDirection {
   /// Parse the exact lowercase tokens a grid client sends.
   pub fn parse(value: &str) -> Option<Self> {
      match value {
         "asc" => Some(SortDirection::Asc),
         "desc" => Some(SortDirection::Desc),
         _ => None,
      }
   }

   pub fn as_sql(self) -> &'static str {
      match self {
         SortDirection::Asc => "asc",
         SortDirection::Desc => "desc",
      }
   }
}

/// Key a client uses to address a column's data.
///
/// Either a plain string (`"name"`, `"0"`) or an orthogonal-data object such
/// as `{"_": "name", "sort": "name_sort"}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum DataKey {
   Plain(String),
   Nested(IndexMap<String, String>),
}

impl DataKey {
   /// Key used for attribute binding and result addressing.
   pub fn primary(&self) -> Option<&str> {
      match self {
         DataKey::Plain(key) => Some(key),
         DataKey::Nested(keys) => keys.get("_").map(String::as_str),
      }
   }

   /// Key used when the client sorts on this column (`sort`, falling back to `_`).
   pub fn sort_key(&self) -> Option<&str> {
      match self {
         DataKey::Plain(key) => Some(key),
         DataKey::Nested(keys) => keys.get("sort").or_else(|| keys.get("_")).map(String::as_str),
      }
   }

   fn from_value(value: &JsonValue) -> Option<Self> {
      match value {
         JsonValue::Object(map) => {
            let keys = map
               .iter()
               .filter_map(|(k, v)| scalar_string(v).map(|v| (k.clone(), v)))
               .collect();
            Some(DataKey::Nested(keys))
         }
         other => scalar_string(other).map(DataKey::Plain),
      }
   }
}

/// One validated entry of the client's `columns` array.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnSpec {
   pub data: DataKey,
   pub name: String,
   pub searchable: bool,
   pub orderable: bool,
   pub search_value: String,
}

/// One validated entry of the client's `order` array.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct OrderSpec {
   /// Index into the client's `columns` array
   pub column: usize,
   pub direction: SortDirection,
}

/// Validated snapshot of a grid request.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RequestOptions {
   draw: i64,
   start: i64,
   length: i64,
   search_value: String,
   order: Vec<OrderSpec>,
   columns: Vec<ColumnSpec>,
}

impl RequestOptions {
   /// Validate a raw descriptor, dropping anything malformed.
   pub fn from_value(request: &JsonValue) -> Self {
      let search_value = request
         .get("search")
         .and_then(|search| search.get("value"))
         .and_then(scalar_string)
         .unwrap_or_default();

      Self {
         draw: int_value(request.get("draw")),
         start: int_value(request.get("start")),
         length: int_value(request.get("length")),
         search_value,
         order: parse_order(request.get("order")),
         columns: parse_columns(request.get("columns")),
      }
   }

   /// Opaque correlation token echoed back in the response; `0` when absent.
   pub fn draw(&self) -> i64 {
      self.draw
   }

   pub fn start(&self) -> i64 {
      self.start
   }

   /// Requested page length; `-1` asks for every row, `0` means unset.
   pub fn length(&self) -> i64 {
      self.length
   }

   pub fn search_value(&self) -> &str {
      &self.search_value
   }

   pub fn order(&self) -> &[OrderSpec] {
      &self.order
   }

   pub fn columns(&self) -> &[ColumnSpec] {
      &self.columns
   }
}

impl From<&JsonValue> for RequestOptions {
   fn from(request: &JsonValue) -> Self {
      Self::from_value(request)
   }
}

impl<'de> Deserialize<'de> for RequestOptions {
   fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
   where
      D: Deserializer<'de>,
   {
      let raw = JsonValue::deserialize(deserializer)?;
      Ok(Self::from_value(&raw))
   }
}

fn parse_order(raw: Option<&JsonValue>) -> Vec<OrderSpec> {
   let Some(items) = raw.and_then(JsonValue::as_array) else {
      return Vec::new();
   };

   let mut order = Vec::with_capacity(items.len());
   for item in items {
      let column = item.get("column").and_then(index_value);
      let direction = item
         .get("dir")
         .and_then(JsonValue::as_str)
         .and_then(SortDirection::parse);

      match (column, direction) {
         (Some(column), Some(direction)) => order.push(OrderSpec { column, direction }),
         _ => trace!(entry = %item, "Dropping malformed order entry"),
      }
   }
   order
}

fn parse_columns(raw: Option<&JsonValue>) -> Vec<ColumnSpec> {
   let Some(items) = raw.and_then(JsonValue::as_array) else {
      return Vec::new();
   };

   let mut columns = Vec::with_capacity(items.len());
   for item in items {
      match parse_column(item) {
         Some(spec) => columns.push(spec),
         None => trace!(entry = %item, "Dropping malformed column entry"),
      }
   }
   columns
}

fn parse_column(item: &JsonValue) -> Option<ColumnSpec> {
   let data = DataKey::from_value(item.get("data")?)?;
   let searchable = bool_value(item.get("searchable")?)?;
   let orderable = bool_value(item.get("orderable")?)?;
   let search_value = scalar_string(item.get("search")?.get("value")?)?;
   let name = item.get("name").and_then(scalar_string).unwrap_or_default();

   Some(ColumnSpec {
      data,
      name,
      searchable,
      orderable,
      search_value,
   })
}

/// Lenient integer conversion: numbers, numeric strings and booleans; `0` otherwise.
fn int_value(value: Option<&JsonValue>) -> i64 {
   match value {
      Some(JsonValue::Number(n)) => n
         .as_i64()
         .or_else(|| n.as_f64().map(|f| f as i64))
         .unwrap_or_default(),
      Some(JsonValue::String(s)) => s.trim().parse().unwrap_or_default(),
      Some(JsonValue::Bool(b)) => i64::from(*b),
      _ => 0,
   }
}

/// Non-negative column index given as a number or an all-digit string.
fn index_value(value: &JsonValue) -> Option<usize> {
   match value {
      JsonValue::Number(n) => n.as_u64().and_then(|n| usize::try_from(n).ok()),
      JsonValue::String(s) if !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit()) => {
         s.parse().ok()
      }
      _ => None,
   }
}

/// Boolean flag as sent by grid clients (`true`, `"true"`, `"1"`, `"on"`, `"yes"` and
/// their negatives). Anything else is not a boolean.
fn bool_value(value: &JsonValue) -> Option<bool> {
   match value {
      JsonValue::Bool(b) => Some(*b),
      JsonValue::Number(n) => match n.as_i64() {
         Some(1) => Some(true),
         Some(0) => Some(false),
         _ => None,
      },
      JsonValue::String(s) => match s.trim().to_ascii_lowercase().as_str() {
         "1" | "true" | "on" | "yes" => Some(true),
         "0" | "false" | "off" | "no" | "" => Some(false),
         _ => None,
      },
      _ => None,
   }
}

fn scalar_string(value: &JsonValue) -> Option<String> {
   match value {
      JsonValue::String(s) => Some(s.clone()),
      JsonValue::Number(n) => Some(n.to_string()),
      JsonValue::Bool(b) => Some(b.to_string()),
      _ => None,
   }
}
