//! Comparison helpers handed to filter hooks.

use serde_json::Value as JsonValue;

use crate::column::Column;
use crate::dialect::Dialect;
use crate::statement::Statement;

/// Builds filter fragments for one column against the statement currently
/// being composed.
///
/// Every value goes through [`Dialect::escape`] on that statement, so
/// bindings land on the filtered statement and never on the base one.
pub struct FilterHelper<'a> {
   statement: &'a mut Statement,
   column: &'a Column,
   dialect: &'a dyn Dialect,
   /// Keyword of the global search pass; `None` during the individual pass
   keyword: Option<&'a str>,
}

impl<'a> FilterHelper<'a> {
   pub fn new(
      statement: &'a mut Statement,
      column: &'a Column,
      dialect: &'a dyn Dialect,
      keyword: Option<&'a str>,
   ) -> Self {
      Self {
         statement,
         column,
         dialect,
         keyword,
      }
   }

   pub fn column(&self) -> &'a Column {
      self.column
   }

   /// The value being searched for: the global keyword, or the column's own search value.
   pub fn search_value(&self) -> &'a str {
      let column: &'a Column = self.column;
      self.keyword.unwrap_or_else(|| column.search_value())
   }

   /// Bind `value` and return its placeholder.
   pub fn escape(&mut self, value: impl Into<JsonValue>) -> String {
      self.dialect.escape(value.into(), self.statement)
   }

   /// Equality in exact-match mode, substring match otherwise.
   pub fn default_filter(&mut self) -> String {
      let word = self.search_value();
      let column: &'a Column = self.column;
      let name = column.name();
      if self.dialect.exact_match() {
         self.dialect.equal_fragment(self.statement, name, word)
      } else {
         self.dialect.like_fragment(self.statement, name, word)
      }
   }

   pub fn equals(&mut self, value: impl Into<JsonValue>) -> String {
      self.compare("=", value.into())
   }

   pub fn greater_or_equal(&mut self, value: impl Into<JsonValue>) -> String {
      self.compare(">=", value.into())
   }

   pub fn less_or_equal(&mut self, value: impl Into<JsonValue>) -> String {
      self.compare("<=", value.into())
   }

   /// Inclusive range. A null or empty bound is left open; with both open
   /// the default match is used.
   pub fn between(&mut self, low: impl Into<JsonValue>, high: impl Into<JsonValue>) -> String {
      let mut parts = Vec::with_capacity(2);
      let low = low.into();
      if !is_open_bound(&low) {
         parts.push(self.greater_or_equal(low));
      }
      let high = high.into();
      if !is_open_bound(&high) {
         parts.push(self.less_or_equal(high));
      }

      if parts.is_empty() {
         return self.default_filter();
      }
      parts.join(" AND ")
   }

   /// Set membership. An empty set matches nothing.
   pub fn where_in<I, V>(&mut self, values: I) -> String
   where
      I: IntoIterator<Item = V>,
      V: Into<JsonValue>,
   {
      let tokens: Vec<String> = values.into_iter().map(|v| self.escape(v)).collect();
      if tokens.is_empty() {
         return "1 = 0".to_string();
      }
      format!(
         "{} IN ({})",
         self.dialect.quote_identifier(self.column.name()),
         tokens.join(", ")
      )
   }

   fn compare(&mut self, op: &str, value: JsonValue) -> String {
      let token = self.dialect.escape(value, self.statement);
      format!(
         "{} {} {}",
         self.dialect.quote_identifier(self.column.name()),
         op,
         token
      )
   }
}

fn is_open_bound(value: &JsonValue) -> bool {
   match value {
      JsonValue::Null => true,
      JsonValue::String(s) => s.is_empty(),
      _ => false,
   }
}
