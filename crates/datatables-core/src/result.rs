//! Reshaping of result rows into the client's key space.

use indexmap::IndexMap;
use serde::Serialize;
use serde_json::Value as JsonValue;

use crate::Row;
use crate::builder::Addressing;
use crate::collection::ColumnCollection;

/// One client-facing row: a positional array or an object keyed by column name.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum RowData {
   Positional(Vec<String>),
   Named(IndexMap<String, String>),
}

impl RowData {
   /// Cell addressed by position (positional rows) or name (named rows).
   pub fn get(&self, key: &str) -> Option<&str> {
      match self {
         RowData::Positional(cells) => key
            .parse::<usize>()
            .ok()
            .and_then(|i| cells.get(i))
            .map(String::as_str),
         RowData::Named(cells) => cells.get(key).map(String::as_str),
      }
   }

   pub fn len(&self) -> usize {
      match self {
         RowData::Positional(cells) => cells.len(),
         RowData::Named(cells) => cells.len(),
      }
   }

   pub fn is_empty(&self) -> bool {
      self.len() == 0
   }
}

/// Text rendering of a raw value; `null` becomes the empty string.
pub fn cell_text(value: &JsonValue) -> String {
   match value {
      JsonValue::Null => String::new(),
      JsonValue::String(s) => s.clone(),
      other => other.to_string(),
   }
}

/// Build the client row for `row` from the visible columns, in collection order.
pub fn assemble_row(columns: &ColumnCollection, addressing: Addressing, row: &Row) -> RowData {
   match addressing {
      Addressing::Positional => RowData::Positional(columns.visible().map(|c| c.value(row)).collect()),
      Addressing::Named => RowData::Named(
         columns
            .visible()
            .map(|c| (c.name().to_string(), c.value(row)))
            .collect(),
      ),
   }
}

pub fn assemble_rows(columns: &ColumnCollection, addressing: Addressing, rows: &[Row]) -> Vec<RowData> {
   rows
      .iter()
      .map(|row| assemble_row(columns, addressing, row))
      .collect()
}
