//! Request-level orchestration: column customisation, execution and response.

use std::sync::Arc;
use std::time::Instant;

use datatables_core::{
   Column, ColumnCollection, ComposedQuery, DialectAdapter, Error, FilterHelper, FilterScope, QueryBuilder,
   RequestOptions, Result, Row, Statement, assemble_rows,
};
use indexmap::IndexMap;
use serde_json::{Value as JsonValue, json};
use tracing::{debug, warn};

use crate::config::DatatablesConfig;
use crate::debug::DebugTrace;
use crate::response::GridResponse;

/// Answers one grid request against a caller-supplied SELECT.
///
/// # Example
///
/// ```no_run
/// use serde_json::json;
/// use sqlx_datatables::{Datatables, SqliteAdapter, SqliteAdapterConfig};
///
/// # async fn run() -> Result<(), Box<dyn std::error::Error>> {
/// let adapter = SqliteAdapter::connect("app.db", SqliteAdapterConfig::default()).await?;
/// let request = json!({ "draw": 1, "start": 0, "length": 10, "search": { "value": "doe" } });
///
/// let mut grid = Datatables::new(adapter, &request);
/// grid.query("SELECT id, name, surname FROM users")?.hide("id", false)?;
///
/// let response = grid.generate().await;
/// println!("{response}");
/// # Ok(())
/// # }
/// ```
pub struct Datatables<A: DialectAdapter> {
   adapter: A,
   options: RequestOptions,
   config: DatatablesConfig,
   builder: Option<QueryBuilder>,
   /// Caller bindings, merged ahead of generated ones
   bindings: IndexMap<String, JsonValue>,
   total_records: Option<u64>,
   distinct_columns: Vec<String>,
   distinct_data: IndexMap<String, JsonValue>,
   composed: Option<ComposedQuery>,
   queries: IndexMap<String, Statement>,
   trace: Option<DebugTrace>,
}

impl<A: DialectAdapter> Datatables<A> {
   pub fn new(adapter: A, options: impl Into<RequestOptions>) -> Self {
      Self {
         adapter,
         options: options.into(),
         config: DatatablesConfig::default(),
         builder: None,
         bindings: IndexMap::new(),
         total_records: None,
         distinct_columns: Vec::new(),
         distinct_data: IndexMap::new(),
         composed: None,
         queries: IndexMap::new(),
         trace: None,
      }
   }

   /// Replace the configuration. It takes effect on the next generation.
   pub fn with_config(mut self, config: DatatablesConfig) -> Self {
      self.config = config;
      self
   }

   pub fn adapter(&self) -> &A {
      &self.adapter
   }

   pub fn options(&self) -> &RequestOptions {
      &self.options
   }

   /// Set the base query and discover its columns.
   pub fn query(&mut self, sql: &str) -> Result<&mut Self> {
      self.builder = Some(QueryBuilder::new(sql)?);
      self.composed = None;
      self.queries.clear();
      Ok(self)
   }

   /// Set the base query together with the bindings it references.
   ///
   /// Keys are placeholder tokens, numbered (`$1`, `$2`, ...) or named
   /// (`:min`); generated bindings are numbered after them.
   pub fn query_with<I, K, V>(&mut self, sql: &str, bindings: I) -> Result<&mut Self>
   where
      I: IntoIterator<Item = (K, V)>,
      K: Into<String>,
      V: Into<JsonValue>,
   {
      self.query(sql)?;
      for (key, value) in bindings {
         self.escape(key, value);
      }
      Ok(self)
   }

   /// Append a display-only column computed from the whole row.
   pub fn add<F>(&mut self, name: &str, transform: F) -> Result<&mut Self>
   where
      F: Fn(&Row) -> String + Send + Sync + 'static,
   {
      self.columns_mut()?.push(Column::computed(name, Arc::new(transform)))?;
      Ok(self)
   }

   /// Replace how an existing column renders its value.
   pub fn edit<F>(&mut self, name: &str, transform: F) -> Result<&mut Self>
   where
      F: Fn(&Row) -> String + Send + Sync + 'static,
   {
      self.columns_mut()?.by_name_mut(name)?.set_transform(Arc::new(transform));
      Ok(self)
   }

   /// Hide a column from the output; `force_search` keeps it in the global search.
   pub fn hide(&mut self, name: &str, force_search: bool) -> Result<&mut Self> {
      self.columns_mut()?.by_name_mut(name)?.hide(force_search);
      Ok(self)
   }

   /// Register a custom filter for a column.
   pub fn filter<F>(&mut self, name: &str, scope: FilterScope, hook: F) -> Result<&mut Self>
   where
      F: Fn(&mut FilterHelper<'_>) -> Option<String> + Send + Sync + 'static,
   {
      self.columns_mut()?.by_name_mut(name)?.set_filter(scope, Arc::new(hook));
      Ok(self)
   }

   /// Add a caller binding referenced by the base query.
   pub fn escape(&mut self, key: impl Into<String>, value: impl Into<JsonValue>) -> &mut Self {
      self.bindings.insert(key.into(), value.into());
      self
   }

   pub fn force_exact_match(&mut self, value: bool) -> &mut Self {
      self.adapter.set_exact_match(value);
      self
   }

   /// Use a known total instead of counting the base query.
   pub fn set_total_records(&mut self, total: u64) -> &mut Self {
      self.total_records = Some(total);
      self
   }

   /// Include the distinct values of `name` under `distinctData`.
   pub fn set_distinct_response_from(&mut self, name: impl Into<String>) -> &mut Self {
      self.distinct_columns.push(name.into());
      self
   }

   /// Caller-supplied `distinctData` entries; these win over computed ones.
   pub fn set_distinct_response(&mut self, data: IndexMap<String, JsonValue>) -> &mut Self {
      self.distinct_data = data;
      self
   }

   /// Names of the visible columns.
   pub fn get_columns(&self) -> Vec<String> {
      self
         .builder
         .as_ref()
         .map(|b| b.columns().names().into_iter().map(str::to_string).collect())
         .unwrap_or_default()
   }

   pub fn columns(&self) -> Option<&ColumnCollection> {
      self.builder.as_ref().map(QueryBuilder::columns)
   }

   /// The paged statement of the last generation.
   pub fn get_query(&self) -> Option<&Statement> {
      self.composed.as_ref().map(|c| &c.full)
   }

   /// Statements issued by the last generation, keyed `query` (total
   /// count), `recordsFiltered` (filtered count) and `full` (page).
   pub fn queries(&self) -> &IndexMap<String, Statement> {
      &self.queries
   }

   /// Answer the request, converting any failure into an error response.
   pub async fn generate(&mut self) -> GridResponse {
      match self.try_generate().await {
         Ok(response) => response,
         Err(err) => {
            warn!(error = %err, code = %err.error_code(), "grid request failed");
            let mut response = GridResponse::from_error(self.options.draw(), &err, self.config.debug);
            response.debug = self.trace.take();
            response
         }
      }
   }

   /// Answer the request.
   pub async fn try_generate(&mut self) -> Result<GridResponse> {
      self.queries.clear();
      self.trace = self.config.debug.then(DebugTrace::new);
      if let Some(trace) = self.trace.as_mut() {
         trace.log_call("init", json!({ "request": serde_json::to_value(&self.options).unwrap_or_default() }));
      }

      let builder = self.builder.as_mut().ok_or(Error::QueryNotSet)?;
      builder.set_default_page_length(self.config.default_page_length);
      let composed = builder.compose(&self.options, &self.adapter, &self.bindings);
      if let Some(trace) = self.trace.as_mut() {
         trace.log_call(
            "compose",
            json!({
               "base": composed.base.sql(),
               "filtered": composed.filtered.sql(),
               "full": composed.full.sql(),
               "addressing": composed.addressing,
            }),
         );
      }

      let records_total = match self.total_records {
         Some(total) => total,
         None => {
            let total = count(&self.adapter, &composed.base, &mut self.trace).await?;
            self.queries.insert("query".into(), composed.base.clone());
            total
         }
      };

      let records_filtered = if composed.is_filtered() {
         let filtered = count(&self.adapter, &composed.filtered, &mut self.trace).await?;
         self.queries.insert("recordsFiltered".into(), composed.filtered.clone());
         filtered
      } else {
         records_total
      };

      let rows = execute(&self.adapter, &composed.full, &mut self.trace).await?;
      self.queries.insert("full".into(), composed.full.clone());
      let data = assemble_rows(builder.columns(), composed.addressing, &rows);

      let distinct_data = if self.distinct_columns.is_empty() && self.distinct_data.is_empty() {
         None
      } else {
         let mut distinct = IndexMap::new();
         for name in &self.distinct_columns {
            let statement = builder.distinct_statement(&composed.base, name, &self.adapter)?;
            let values: Vec<JsonValue> = execute(&self.adapter, &statement, &mut self.trace)
               .await?
               .into_iter()
               .map(|mut row| row.shift_remove(name).unwrap_or(JsonValue::Null))
               .collect();
            distinct.insert(name.clone(), JsonValue::Array(values));
         }
         distinct.extend(self.distinct_data.clone());
         Some(distinct)
      };

      debug!(
         draw = self.options.draw(),
         records_total,
         records_filtered,
         rows = data.len(),
         "generated grid response"
      );

      if let Some(trace) = self.trace.as_mut() {
         trace.add("final_sql", composed.full.sql());
         trace.add("columns", builder.columns().names());
         trace.log_call("generate_complete", JsonValue::Null);
      }

      self.composed = Some(composed);

      Ok(GridResponse {
         draw: self.options.draw(),
         records_total,
         records_filtered,
         data,
         distinct_data,
         error: None,
         debug: self.trace.take(),
      })
   }

   fn columns_mut(&mut self) -> Result<&mut ColumnCollection> {
      self
         .builder
         .as_mut()
         .map(QueryBuilder::columns_mut)
         .ok_or(Error::QueryNotSet)
   }
}

async fn count<A: DialectAdapter>(adapter: &A, statement: &Statement, trace: &mut Option<DebugTrace>) -> Result<u64> {
   let started = Instant::now();
   let total = adapter.count(statement).await?;
   if let Some(trace) = trace.as_mut() {
      trace.log_call(
         "db_count",
         json!({
            "sql": adapter.count_sql(statement),
            "params": statement.params(),
            "duration_ms": started.elapsed().as_millis() as u64,
            "count": total,
         }),
      );
   }
   Ok(total)
}

async fn execute<A: DialectAdapter>(
   adapter: &A,
   statement: &Statement,
   trace: &mut Option<DebugTrace>,
) -> Result<Vec<Row>> {
   let started = Instant::now();
   let rows = adapter.execute(statement).await?;
   if let Some(trace) = trace.as_mut() {
      trace.log_call(
         "db_query",
         json!({
            "sql": statement.sql(),
            "params": statement.params(),
            "duration_ms": started.elapsed().as_millis() as u64,
            "row_count": rows.len(),
         }),
      );
   }
   Ok(rows)
}

#[cfg(test)]
mod tests {
   use std::sync::Mutex;

   use super::*;
   use datatables_core::Dialect;

   #[derive(Default)]
   struct StubAdapter {
      rows: Vec<Row>,
      total: u64,
      filtered: u64,
      fail: bool,
      exact: bool,
      log: Arc<Mutex<Vec<String>>>,
   }

   impl StubAdapter {
      fn new() -> Self {
         let rows = [(1, "John"), (2, "Jane")]
            .into_iter()
            .map(|(id, name)| {
               let mut row = Row::new();
               row.insert("id".into(), json!(id));
               row.insert("name".into(), json!(name));
               row
            })
            .collect();
         Self {
            rows,
            total: 11,
            filtered: 2,
            ..Self::default()
         }
      }

      fn failing() -> Self {
         Self {
            fail: true,
            ..Self::new()
         }
      }

      fn check(&self, statement: &Statement) -> Result<()> {
         self.log.lock().unwrap().push(statement.sql().to_string());
         if self.fail {
            return Err(Error::adapter("STUB_ERROR", std::io::Error::other("boom")));
         }
         Ok(())
      }
   }

   impl Dialect for StubAdapter {
      fn exact_match(&self) -> bool {
         self.exact
      }

      fn set_exact_match(&mut self, value: bool) {
         self.exact = value;
      }
   }

   impl DialectAdapter for StubAdapter {
      async fn execute(&self, statement: &Statement) -> Result<Vec<Row>> {
         self.check(statement)?;
         Ok(self.rows.clone())
      }

      async fn count(&self, statement: &Statement) -> Result<u64> {
         self.check(statement)?;
         Ok(if statement.sql().contains(" WHERE ") {
            self.filtered
         } else {
            self.total
         })
      }
   }

   fn request(search: &str) -> JsonValue {
      json!({
         "draw": 7,
         "start": 0,
         "length": 10,
         "search": { "value": search },
         "columns": [
            { "data": "0", "searchable": true, "orderable": true, "search": { "value": "" } },
            { "data": "1", "searchable": true, "orderable": true, "search": { "value": "" } },
         ],
      })
   }

   fn query_keys<A: DialectAdapter>(grid: &Datatables<A>) -> Vec<&str> {
      grid.queries().keys().map(String::as_str).collect()
   }

   #[tokio::test]
   async fn unfiltered_request_counts_once() {
      let adapter = StubAdapter::new();
      let log = adapter.log.clone();
      let mut grid = Datatables::new(adapter, &request(""));
      grid.query("SELECT id, name FROM users").unwrap();

      let response = grid.try_generate().await.unwrap();

      assert_eq!(response.draw, 7);
      assert_eq!(response.records_total, 11);
      assert_eq!(response.records_filtered, 11);
      assert_eq!(query_keys(&grid), vec!["query", "full"]);
      assert_eq!(log.lock().unwrap().len(), 2);
   }

   #[tokio::test]
   async fn filtered_request_counts_both_statements() {
      let mut grid = Datatables::new(StubAdapter::new(), &request("doe"));
      grid.query("SELECT id, name FROM users").unwrap();

      let response = grid.try_generate().await.unwrap();

      assert_eq!(response.records_total, 11);
      assert_eq!(response.records_filtered, 2);
      assert_eq!(query_keys(&grid), vec!["query", "recordsFiltered", "full"]);
      assert!(grid.queries()["recordsFiltered"].sql().contains(" WHERE "));
   }

   #[tokio::test]
   async fn total_override_skips_the_base_count() {
      let adapter = StubAdapter::new();
      let log = adapter.log.clone();
      let mut grid = Datatables::new(adapter, &request(""));
      grid.query("SELECT id, name FROM users").unwrap().set_total_records(40);

      let response = grid.try_generate().await.unwrap();

      assert_eq!(response.records_total, 40);
      assert_eq!(response.records_filtered, 40);
      assert_eq!(query_keys(&grid), vec!["full"]);
      assert_eq!(log.lock().unwrap().len(), 1);
   }

   #[tokio::test]
   async fn generating_without_a_query_fails() {
      let mut grid = Datatables::new(StubAdapter::new(), &request(""));
      assert!(matches!(grid.try_generate().await, Err(Error::QueryNotSet)));
      assert!(matches!(grid.hide("id", false), Err(Error::QueryNotSet)));

      let response = grid.generate().await;
      assert_eq!(response.draw, 7);
      assert_eq!(response.error.as_deref(), Some(crate::GENERIC_ERROR));
      assert!(response.debug.is_none());
   }

   #[tokio::test]
   async fn adapter_failure_is_all_or_nothing() {
      let mut grid = Datatables::new(StubAdapter::failing(), &request(""));
      grid.query("SELECT id, name FROM users").unwrap();

      let response = grid.generate().await;
      assert!(response.is_error());
      assert!(response.data.is_empty());
      assert_eq!(response.records_total, 0);
      assert_eq!(response.error.as_deref(), Some(crate::GENERIC_ERROR));
   }

   #[tokio::test]
   async fn debug_mode_reports_detail_and_trace() {
      let config = DatatablesConfig {
         debug: true,
         ..Default::default()
      };
      let mut grid = Datatables::new(StubAdapter::failing(), &request("")).with_config(config);
      grid.query("SELECT id, name FROM users").unwrap();

      let response = grid.generate().await;
      let error = response.error.unwrap();
      assert!(error.starts_with("Error: adapter error: boom"));
      let trace = response.debug.unwrap();
      assert_eq!(trace.stages(), vec!["init", "compose"]);
   }

   #[tokio::test]
   async fn debug_trace_records_every_stage() {
      let config = DatatablesConfig {
         debug: true,
         ..Default::default()
      };
      let mut grid = Datatables::new(StubAdapter::new(), &request("doe")).with_config(config);
      grid.query("SELECT id, name FROM users").unwrap();

      let trace = grid.try_generate().await.unwrap().debug.unwrap();
      assert_eq!(
         trace.stages(),
         vec!["init", "compose", "db_count", "db_count", "db_query", "generate_complete"]
      );
      assert_eq!(trace.calls()[4].context["row_count"], json!(2));
      assert!(trace.entry("final_sql").unwrap().as_str().unwrap().contains("LIMIT 10"));
   }

   #[tokio::test]
   async fn hidden_and_computed_columns_shape_rows() {
      let mut grid = Datatables::new(StubAdapter::new(), &request(""));
      grid
         .query("SELECT id, name FROM users")
         .unwrap()
         .hide("id", false)
         .unwrap()
         .add("label", |row| format!("#{}", datatables_core::cell_text(&row["id"])))
         .unwrap()
         .edit("name", |row| datatables_core::cell_text(&row["name"]).to_uppercase())
         .unwrap();

      let response = grid.try_generate().await.unwrap();

      assert_eq!(grid.get_columns(), vec!["name", "label"]);
      assert_eq!(
         serde_json::to_value(&response.data).unwrap(),
         json!([["JOHN", "#1"], ["JANE", "#2"]])
      );
   }

   #[tokio::test]
   async fn customising_unknown_or_duplicate_columns_fails() {
      let mut grid = Datatables::new(StubAdapter::new(), &request(""));
      grid.query("SELECT id, name FROM users").unwrap();

      assert!(matches!(grid.hide("missing", false), Err(Error::UnknownColumn { .. })));
      assert!(matches!(
         grid.filter("missing", FilterScope::Both, |_| None),
         Err(Error::UnknownColumn { .. })
      ));
      assert!(matches!(
         grid.add("name", |_| String::new()),
         Err(Error::DuplicateColumn { .. })
      ));
   }

   #[tokio::test]
   async fn distinct_data_merges_caller_entries() {
      let mut grid = Datatables::new(StubAdapter::new(), &request(""));
      grid.query("SELECT id, name FROM users").unwrap();
      grid.set_distinct_response_from("name");

      let response = grid.try_generate().await.unwrap();
      let distinct = response.distinct_data.unwrap();
      assert_eq!(distinct["name"], json!(["John", "Jane"]));

      let overrides: IndexMap<String, JsonValue> =
         [("name".to_string(), json!(["override"])), ("extra".to_string(), json!([1]))]
            .into_iter()
            .collect();
      grid.set_distinct_response(overrides);
      let distinct = grid.try_generate().await.unwrap().distinct_data.unwrap();
      assert_eq!(distinct["name"], json!(["override"]));
      assert_eq!(distinct["extra"], json!([1]));
   }

   #[tokio::test]
   async fn caller_bindings_precede_generated_ones() {
      let mut grid = Datatables::new(StubAdapter::new(), &request("doe"));
      grid
         .query_with("SELECT id, name FROM users WHERE id > $1", [("$1", 3)])
         .unwrap();

      grid.try_generate().await.unwrap();

      let full = grid.get_query().unwrap();
      let keys: Vec<&str> = full.params().keys().map(String::as_str).collect();
      assert_eq!(keys, vec!["$1", "$2", "$3"]);
      assert_eq!(full.params()["$1"], json!(3));
      assert_eq!(grid.queries()["query"].params().len(), 1);
   }

   #[tokio::test]
   async fn config_set_after_query_applies_page_length() {
      let mut request = request("");
      request["length"] = json!(0);
      let mut grid = Datatables::new(StubAdapter::new(), &request);
      grid.query("SELECT id, name FROM users").unwrap();
      let config = DatatablesConfig {
         default_page_length: 25,
         ..Default::default()
      };
      let mut grid = grid.with_config(config);

      grid.try_generate().await.unwrap();
      assert!(grid.get_query().unwrap().sql().ends_with(" LIMIT 25 OFFSET 0"));
   }

   #[tokio::test]
   async fn force_exact_match_reaches_the_adapter() {
      let mut grid = Datatables::new(StubAdapter::new(), &request("john doe"));
      grid.query("SELECT id, name FROM users").unwrap();
      grid.force_exact_match(true);
      assert!(grid.adapter().exact_match());

      grid.try_generate().await.unwrap();
      let full = grid.get_query().unwrap();
      assert_eq!(full.params()["$1"], json!("john doe"));
      assert!(full.sql().contains(r#""id" = $1"#));
   }
}
