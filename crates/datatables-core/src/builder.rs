//! Composition of the base, filtered and full statements for one request.

use std::sync::OnceLock;

use indexmap::IndexMap;
use regex::Regex;
use serde::Serialize;
use serde_json::Value as JsonValue;
use tracing::{debug, trace};

use crate::collection::ColumnCollection;
use crate::column::FilterHook;
use crate::dialect::Dialect;
use crate::error::{Error, Result};
use crate::filter::FilterHelper;
use crate::options::{ColumnSpec, RequestOptions};
use crate::projection;
use crate::statement::Statement;

/// Page length used when the client leaves `length` unset.
pub const DEFAULT_PAGE_LENGTH: i64 = 10;

/// How the client refers to columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Addressing {
   /// Keys are indexes into the visible columns; rows are arrays.
   Positional,
   /// Keys are column names; rows are objects.
   Named,
}

impl Addressing {
   /// Positional iff the primary data keys are exactly a permutation of
   /// `"0"..="n-1"`. An empty column list is positional.
   pub fn infer(specs: &[ColumnSpec]) -> Self {
      let mut seen = vec![false; specs.len()];
      for spec in specs {
         let Some(index) = spec.data.primary().and_then(|key| canonical_index(key, specs.len())) else {
            return Addressing::Named;
         };
         if seen[index] {
            return Addressing::Named;
         }
         seen[index] = true;
      }
      Addressing::Positional
   }
}

fn canonical_index(key: &str, len: usize) -> Option<usize> {
   let index = key.parse::<usize>().ok()?;
   (index < len && index.to_string() == key).then_some(index)
}

/// The statement chain for one request.
#[derive(Debug, Clone, PartialEq)]
pub struct ComposedQuery {
   /// Caller SQL projected to the discovered columns, caller bindings only
   pub base: Statement,
   /// `base` plus the WHERE clause
   pub filtered: Statement,
   /// `filtered` plus ORDER BY and LIMIT
   pub full: Statement,
   pub addressing: Addressing,
}

impl ComposedQuery {
   /// Whether any filter applied, i.e. `filtered` needs its own count.
   pub fn is_filtered(&self) -> bool {
      self.filtered.sql() != self.base.sql()
   }
}

/// Owns the column model of one query and turns request options into SQL.
#[derive(Debug)]
pub struct QueryBuilder {
   raw_sql: String,
   columns: ColumnCollection,
   /// Discovered names, in projection order
   projected: Vec<String>,
   has_default_order: bool,
   default_page_length: i64,
}

impl QueryBuilder {
   /// Discover the columns of `raw_sql`.
   pub fn new(raw_sql: &str) -> Result<Self> {
      let raw_sql = raw_sql.trim().trim_end_matches(';').trim_end().to_string();
      let projected = projection::column_names(&raw_sql)?;
      let columns = ColumnCollection::from_names(&projected)?;
      let has_default_order = projection::has_order_by(&raw_sql);

      debug!(columns = ?projected, has_default_order, "discovered query columns");

      Ok(Self {
         raw_sql,
         columns,
         projected,
         has_default_order,
         default_page_length: DEFAULT_PAGE_LENGTH,
      })
   }

   /// Page length substituted when the client sends `length: 0`.
   pub fn with_default_page_length(mut self, length: i64) -> Self {
      self.default_page_length = length;
      self
   }

   /// Page length used when a request sends `length` 0.
   pub fn set_default_page_length(&mut self, length: i64) {
      self.default_page_length = length;
   }

   pub fn raw_sql(&self) -> &str {
      &self.raw_sql
   }

   pub fn columns(&self) -> &ColumnCollection {
      &self.columns
   }

   pub fn columns_mut(&mut self) -> &mut ColumnCollection {
      &mut self.columns
   }

   /// Whether the caller's SQL already ends in its own ORDER BY.
   pub fn has_default_order(&self) -> bool {
      self.has_default_order
   }

   /// Reset every column's attributes, then bind the client's declarations
   /// onto the visible columns they address.
   pub fn bind_attributes(&mut self, options: &RequestOptions) -> Addressing {
      for column in self.columns.iter_mut() {
         column.reset_attributes();
      }

      let addressing = Addressing::infer(options.columns());
      for spec in options.columns() {
         let Some(key) = spec.data.primary() else {
            continue;
         };
         match self.resolve(key, addressing) {
            Some(index) => {
               if let Some(column) = self.columns.get_mut(index) {
                  column.set_attributes(spec.into());
               }
            }
            None => trace!(key, "client column matches no visible column"),
         }
      }
      addressing
   }

   /// Collection index of the visible column addressed by `key`.
   pub fn resolve(&self, key: &str, addressing: Addressing) -> Option<usize> {
      match addressing {
         Addressing::Positional => key
            .parse::<usize>()
            .ok()
            .and_then(|n| self.columns.visible_index(n)),
         Addressing::Named => self.columns.visible_position(key),
      }
   }

   /// The caller's SQL projected to the discovered columns, with caller
   /// bindings recorded first.
   pub fn base_statement(&self, dialect: &dyn Dialect, caller: &IndexMap<String, JsonValue>) -> Statement {
      let names: Vec<&str> = self.projected.iter().map(String::as_str).collect();
      let mut statement = Statement::new(dialect.projection_sql(&self.raw_sql, &names));
      statement.merge_ahead(caller);
      statement
   }

   /// Build the whole statement chain for `options`.
   pub fn compose(
      &mut self,
      options: &RequestOptions,
      dialect: &dyn Dialect,
      caller: &IndexMap<String, JsonValue>,
   ) -> ComposedQuery {
      let addressing = self.bind_attributes(options);
      let base = self.base_statement(dialect, caller);

      let mut filtered = base.duplicate(base.sql());
      let clause = self.filter(&mut filtered, options, dialect);
      filtered.set_sql(format!("{}{}", base.sql(), clause));

      let order = self.order_by(options, addressing, dialect);
      let limit = self.limit(options, dialect);
      let full = filtered.duplicate(format!("{}{}{}", filtered.sql(), order, limit));

      debug!(
         base = base.sql(),
         filtered = filtered.sql(),
         full = full.sql(),
         params = filtered.params().len(),
         "composed statements"
      );

      ComposedQuery {
         base,
         filtered,
         full,
         addressing,
      }
   }

   /// Distinct values of `column` over `base`, sharing its bindings.
   pub fn distinct_statement(&self, base: &Statement, column: &str, dialect: &dyn Dialect) -> Result<Statement> {
      if !self.projected.iter().any(|name| name == column) {
         return Err(Error::UnknownColumn {
            name: column.to_string(),
         });
      }
      Ok(base.duplicate(dialect.distinct_sql(base, column)))
   }

   fn filter(&self, statement: &mut Statement, options: &RequestOptions, dialect: &dyn Dialect) -> String {
      let fragments: Vec<String> = [
         self.filter_global(statement, options, dialect),
         self.filter_individual(statement, dialect),
      ]
      .into_iter()
      .flatten()
      .collect();

      if fragments.is_empty() {
         String::new()
      } else {
         dialect.where_sql(&fragments)
      }
   }

   fn filter_global(&self, statement: &mut Statement, options: &RequestOptions, dialect: &dyn Dialect) -> Option<String> {
      let term = normalize_search(options.search_value());
      if term.is_empty() {
         return None;
      }

      let keywords: Vec<&str> = if dialect.exact_match() {
         vec![term.as_str()]
      } else {
         term.split_whitespace().collect()
      };

      let mut groups = Vec::new();
      for keyword in keywords {
         let look: Vec<String> = self
            .columns
            .globally_searchable()
            .map(|column| {
               let mut helper = FilterHelper::new(statement, column, dialect, Some(keyword));
               apply_filter(column.global_filter(), &mut helper)
            })
            .filter(|fragment| !fragment.is_empty())
            .collect();

         if !look.is_empty() {
            groups.push(format!("({})", look.join(" OR ")));
         }
      }

      (!groups.is_empty()).then(|| groups.join(" AND "))
   }

   fn filter_individual(&self, statement: &mut Statement, dialect: &dyn Dialect) -> Option<String> {
      let look: Vec<String> = self
         .columns
         .individually_searchable()
         .map(|column| {
            let mut helper = FilterHelper::new(statement, column, dialect, None);
            apply_filter(column.individual_filter(), &mut helper)
         })
         .filter(|fragment| !fragment.is_empty())
         .collect();

      (!look.is_empty()).then(|| look.join(" AND "))
   }

   fn order_by(&self, options: &RequestOptions, addressing: Addressing, dialect: &dyn Dialect) -> String {
      let mut order = Vec::new();
      for spec in options.order() {
         let Some(key) = options.columns().get(spec.column).and_then(|c| c.data.sort_key()) else {
            trace!(column = spec.column, "order entry names no client column");
            continue;
         };
         let Some(column) = self.resolve(key, addressing).and_then(|i| self.columns.get(i)) else {
            trace!(key, "order entry matches no visible column");
            continue;
         };
         if !column.is_orderable() {
            continue;
         }
         order.push(format!("{} {}", dialect.quote_identifier(column.name()), spec.direction.as_sql()));
      }

      if order.is_empty() {
         if self.has_default_order {
            return String::new();
         }
         let Some(first) = self.columns.visible().find(|c| !c.is_computed()) else {
            return String::new();
         };
         order.push(format!("{} asc", dialect.quote_identifier(first.name())));
      }

      dialect.order_by_sql(&order)
   }

   fn limit(&self, options: &RequestOptions, dialect: &dyn Dialect) -> String {
      let take = match options.length() {
         0 => self.default_page_length,
         length => length,
      };
      if take < 0 || options.draw() == 0 {
         return String::new();
      }
      dialect.limit_sql(take, options.start().max(0))
   }
}

/// Run the custom hook if there is one, falling back to the default match
/// when it declines. Hook output is parenthesised so it composes safely.
fn apply_filter(hook: Option<&FilterHook>, helper: &mut FilterHelper<'_>) -> String {
   if let Some(hook) = hook
      && let Some(fragment) = hook(&mut *helper).filter(|f| !f.trim().is_empty())
   {
      return format!("({fragment})");
   }
   helper.default_filter()
}

/// Collapse runs of non-word characters to a single space.
fn normalize_search(value: &str) -> String {
   static NON_WORD: OnceLock<Regex> = OnceLock::new();
   let re = NON_WORD.get_or_init(|| Regex::new(r"\W+").expect("invalid regex"));
   re.replace_all(value, " ").trim().to_string()
}
