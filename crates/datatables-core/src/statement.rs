//! Parameterized SQL statements.

use std::fmt;

use indexmap::IndexMap;
use serde::Serialize;
use serde_json::Value as JsonValue;

/// SQL text plus its ordered, keyed bind values.
///
/// Values only ever reach the text as placeholder tokens produced by
/// [`Dialect::escape`](crate::Dialect::escape). Derived statements are
/// produced with [`Statement::duplicate`], which copies the bindings so the
/// copies never alias each other.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Statement {
   sql: String,
   params: IndexMap<String, JsonValue>,
}

impl Statement {
   pub fn new(sql: impl Into<String>) -> Self {
      Self {
         sql: sql.into(),
         params: IndexMap::new(),
      }
   }

   pub fn with_params(sql: impl Into<String>, params: IndexMap<String, JsonValue>) -> Self {
      Self {
         sql: sql.into(),
         params,
      }
   }

   pub fn sql(&self) -> &str {
      &self.sql
   }

   pub fn params(&self) -> &IndexMap<String, JsonValue> {
      &self.params
   }

   /// Replace the SQL text, keeping every binding recorded so far.
   pub fn set_sql(&mut self, sql: impl Into<String>) {
      self.sql = sql.into();
   }

   /// Independent copy with new SQL text and the same bindings.
   pub fn duplicate(&self, sql: impl Into<String>) -> Self {
      Self {
         sql: sql.into(),
         params: self.params.clone(),
      }
   }

   /// Record a binding under `key`.
   pub fn bind(&mut self, key: impl Into<String>, value: JsonValue) {
      self.params.insert(key.into(), value);
   }

   /// 1-based index the next generated placeholder should use.
   pub fn next_param_index(&self) -> usize {
      self.params.len() + 1
   }

   /// Merge caller bindings so they come before the ones already recorded.
   ///
   /// On a key collision the statement's own value wins, but the key keeps
   /// the caller's position.
   pub fn merge_ahead(&mut self, caller: &IndexMap<String, JsonValue>) {
      if caller.is_empty() {
         return;
      }
      let mut merged = caller.clone();
      for (key, value) in self.params.drain(..) {
         merged.insert(key, value);
      }
      self.params = merged;
   }
}

impl fmt::Display for Statement {
   fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
      f.write_str(&self.sql)
   }
}
