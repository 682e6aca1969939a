//! Capability interface implemented once per database backend.
//!
//! [`Dialect`] covers SQL fragment generation and value escaping. It is
//! object safe so filter hooks can receive it as `&dyn Dialect`.
//! [`DialectAdapter`] adds statement execution on top. The composition
//! engine never branches on which backend it is talking to.

use std::future::Future;

use serde_json::Value as JsonValue;

use crate::Row;
use crate::error::Result;
use crate::statement::Statement;

/// SQL fragment generation for one backend.
///
/// Every method except the exact-match pair has a default matching plain
/// ANSI SQL with `$N` placeholders.
pub trait Dialect {
   /// Whether the default match compares with `=` instead of a substring match.
   fn exact_match(&self) -> bool;

   fn set_exact_match(&mut self, value: bool);

   /// Placeholder token for the `index`-th (1-based) binding of a statement.
   fn placeholder(&self, index: usize) -> String {
      format!("${index}")
   }

   /// Record `value` as a binding on `statement` and return its placeholder.
   fn escape(&self, value: JsonValue, statement: &mut Statement) -> String {
      let token = self.placeholder(statement.next_param_index());
      statement.bind(token.clone(), value);
      token
   }

   /// Quote an identifier. Embedded quote characters are doubled.
   fn quote_identifier(&self, name: &str) -> String {
      format!("\"{}\"", name.replace('"', "\"\""))
   }

   /// Project the caller's SQL down to the named columns.
   fn projection_sql(&self, raw_sql: &str, columns: &[&str]) -> String {
      let list: Vec<String> = columns.iter().map(|c| self.quote_identifier(c)).collect();
      format!("SELECT {} FROM ({}) t", list.join(", "), raw_sql)
   }

   fn distinct_sql(&self, statement: &Statement, column: &str) -> String {
      let column = self.quote_identifier(column);
      format!("SELECT {column} FROM ({}) t GROUP BY {column}", statement.sql())
   }

   fn count_sql(&self, statement: &Statement) -> String {
      format!("SELECT COUNT(*) AS rowcount FROM ({}) t", statement.sql())
   }

   fn where_sql(&self, fragments: &[String]) -> String {
      format!(" WHERE {}", fragments.join(" AND "))
   }

   fn like_fragment(&self, statement: &mut Statement, column: &str, word: &str) -> String {
      let token = self.escape(JsonValue::String(format!("%{word}%")), statement);
      format!("{} LIKE {}", self.quote_identifier(column), token)
   }

   fn equal_fragment(&self, statement: &mut Statement, column: &str, word: &str) -> String {
      let token = self.escape(JsonValue::String(word.to_string()), statement);
      format!("{} = {}", self.quote_identifier(column), token)
   }

   fn order_by_sql(&self, order: &[String]) -> String {
      format!(" ORDER BY {}", order.join(", "))
   }

   fn limit_sql(&self, take: i64, skip: i64) -> String {
      format!(" LIMIT {take} OFFSET {skip}")
   }
}

/// A [`Dialect`] that can also run statements.
pub trait DialectAdapter: Dialect + Send + Sync {
   /// Run `statement` and return its rows as ordered name → value maps.
   fn execute(&self, statement: &Statement) -> impl Future<Output = Result<Vec<Row>>> + Send;

   /// Number of rows `statement` would return.
   fn count(&self, statement: &Statement) -> impl Future<Output = Result<u64>> + Send;
}
