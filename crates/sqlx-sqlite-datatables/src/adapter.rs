//! SQLite dialect and executor for datatables-core

use std::collections::HashMap;
use std::path::Path;
use std::time::Instant;

use datatables_core::{Dialect, DialectAdapter, Row, Statement, rewrite_named_placeholders};
use serde_json::Value as JsonValue;
use sqlx::sqlite::{SqliteArguments, SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::{Column, Executor, Row as _, Sqlite};
use tracing::debug;

use crate::config::SqliteAdapterConfig;
use crate::decode;
use crate::error::{Error, Result};

type Query<'q> = sqlx::query::Query<'q, Sqlite, SqliteArguments<'q>>;

/// Runs composed grid statements against a SQLite connection pool.
///
/// Generated placeholders are the ANSI `$N` form, which SQLite binds by
/// number. Caller bindings may also use named `:name` placeholders.
#[derive(Debug, Clone)]
pub struct SqliteAdapter {
   pool: SqlitePool,
   exact_match: bool,
}

impl SqliteAdapter {
   /// Open a pool on the database file at `path`.
   pub async fn connect(path: impl AsRef<Path>, config: SqliteAdapterConfig) -> Result<Self> {
      let path = path.as_ref();
      let options = SqliteConnectOptions::new()
         .filename(path)
         .read_only(config.read_only)
         .create_if_missing(!config.read_only);

      let pool = SqlitePoolOptions::new()
         .max_connections(config.max_connections)
         .idle_timeout(Some(config.idle_timeout))
         .connect_with(options)
         .await?;

      debug!(
         path = %path.display(),
         max_connections = config.max_connections,
         read_only = config.read_only,
         "opened sqlite pool"
      );

      Ok(Self {
         pool,
         exact_match: config.exact_match,
      })
   }

   /// Wrap an existing pool.
   pub fn from_pool(pool: SqlitePool) -> Self {
      Self {
         pool,
         exact_match: false,
      }
   }

   pub fn pool(&self) -> &SqlitePool {
      &self.pool
   }

   /// Close the pool, waiting for checked-out connections to return.
   pub async fn close(&self) {
      self.pool.close().await;
   }

   /// Run `statement` and decode every row.
   pub async fn fetch_all(&self, statement: &Statement) -> Result<Vec<Row>> {
      let started = Instant::now();
      let (sql, args) = prepare(statement.sql(), statement)?;
      let query = bind_values(sqlx::query(&sql), args);
      let rows = self.pool.fetch_all(query).await?;

      let mut values = Vec::with_capacity(rows.len());
      for row in rows {
         let mut value = Row::default();
         for (i, column) in row.columns().iter().enumerate() {
            let v = row.try_get_raw(i)?;
            value.insert(column.name().to_string(), decode::to_json(v)?);
         }
         values.push(value);
      }

      debug!(
         sql = statement.sql(),
         params = statement.params().len(),
         rows = values.len(),
         elapsed_ms = started.elapsed().as_millis() as u64,
         "fetched rows"
      );
      Ok(values)
   }

   /// Number of rows `statement` would return.
   pub async fn fetch_count(&self, statement: &Statement) -> Result<u64> {
      let (sql, args) = prepare(&self.count_sql(statement), statement)?;
      let query = bind_values(sqlx::query(&sql), args);
      let row = self.pool.fetch_one(query).await?;
      let count: i64 = row.try_get("rowcount")?;

      debug!(sql = %sql, count, "counted rows");
      Ok(u64::try_from(count).unwrap_or_default())
   }
}

impl Dialect for SqliteAdapter {
   fn exact_match(&self) -> bool {
      self.exact_match
   }

   fn set_exact_match(&mut self, value: bool) {
      self.exact_match = value;
   }
}

impl DialectAdapter for SqliteAdapter {
   async fn execute(&self, statement: &Statement) -> datatables_core::Result<Vec<Row>> {
      Ok(self.fetch_all(statement).await?)
   }

   async fn count(&self, statement: &Statement) -> datatables_core::Result<u64> {
      Ok(self.fetch_count(statement).await?)
   }
}

/// SQL text and bind values in argument order.
///
/// Numbered keys (`$N`, `?N`) bind to argument N. Named keys (`:name`,
/// `@name`, `$name`) bind to the argument at their position among the
/// statement's bindings, and their tokens in `sql` become `?N`. The
/// resulting indices must run `1..n` with no gaps.
fn prepare<'s>(sql: &str, statement: &'s Statement) -> Result<(String, Vec<&'s JsonValue>)> {
   let mut indexed = Vec::with_capacity(statement.params().len());
   let mut named = HashMap::new();
   for (position, (key, value)) in statement.params().iter().enumerate() {
      let index = match placeholder_index(key) {
         Some(index) => index,
         None if is_named(key) => {
            named.insert(key.as_str(), format!("?{}", position + 1));
            position + 1
         }
         None => return Err(Error::InvalidParameter { key: key.clone() }),
      };
      indexed.push((index, key, value));
   }
   indexed.sort_by_key(|(index, _, _)| *index);

   let mut values = Vec::with_capacity(indexed.len());
   for (position, (index, key, value)) in indexed.into_iter().enumerate() {
      if index != position + 1 {
         return Err(Error::InvalidParameter { key: key.clone() });
      }
      values.push(value);
   }

   let sql = if named.is_empty() {
      sql.to_string()
   } else {
      rewrite_named_placeholders(sql, |token| named.get(token).cloned())
   };
   Ok((sql, values))
}

fn placeholder_index(key: &str) -> Option<usize> {
   key.strip_prefix('$')
      .or_else(|| key.strip_prefix('?'))
      .and_then(|n| n.parse().ok())
}

fn is_named(key: &str) -> bool {
   let Some(name) = key.strip_prefix([':', '@', '$']) else {
      return false;
   };
   name.starts_with(|c: char| c.is_ascii_alphabetic() || c == '_')
      && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn bind_values<'q>(query: Query<'q>, values: Vec<&JsonValue>) -> Query<'q> {
   values
      .into_iter()
      .fold(query, |query, value| bind_value(query, value.clone()))
}

/// Bind a JSON value with the closest SQLite type.
fn bind_value(query: Query<'_>, value: JsonValue) -> Query<'_> {
   if value.is_null() {
      query.bind(None::<JsonValue>)
   } else if let Some(s) = value.as_str() {
      query.bind(s.to_owned())
   } else if let Some(b) = value.as_bool() {
      query.bind(b)
   } else if let Some(number) = value.as_number() {
      // Preserve integer precision by binding as i64 when possible
      if let Some(int_val) = number.as_i64() {
         query.bind(int_val)
      } else if let Some(uint_val) = number.as_u64() {
         // Above i64::MAX, so only REAL can hold it
         query.bind(uint_val as f64)
      } else {
         query.bind(number.as_f64().unwrap_or_default())
      }
   } else {
      // Arrays and objects are stored as JSON text
      query.bind(value)
   }
}
