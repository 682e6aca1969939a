use serde_json::{Value as JsonValue, json};
use sqlx_datatables::{Datatables, DatatablesConfig, FilterScope, SqliteAdapter, SqliteAdapterConfig};
use tempfile::TempDir;

const QUERY: &str = "SELECT id AS fid, name, surname, age FROM mytable";

async fn create_test_db() -> (SqliteAdapter, TempDir) {
   let temp_dir = TempDir::new().expect("Failed to create temp directory");
   let db_path = temp_dir.path().join("test.db");
   let adapter = SqliteAdapter::connect(&db_path, SqliteAdapterConfig::default())
      .await
      .expect("Failed to connect to test database");

   seed_people_table(&adapter).await;
   (adapter, temp_dir)
}

/// Seed 11 people.
///
/// ```text
/// id | name      | surname | age
/// ---|-----------|---------|----
///  1 | John      | Doe     | 20
///  2 | Jane      | Doe     | 25
///  3 | George    | Martin  | 34
///  4 | Todd      | Wycoff  | 36
///  5 | Ruby      | Pickett | 28
///  6 | Colin     | McCoy   | 19
///  7 | Stephanie | Skinner | 45
///  8 | Anna      | Baker   | 31
///  9 | Peter     | Parker  | 40
/// 10 | Laura     | Hill    | 27
/// 11 | Mark      | Stone   | 52
/// ```
async fn seed_people_table(adapter: &SqliteAdapter) {
   sqlx::query("CREATE TABLE mytable (id INTEGER PRIMARY KEY, name TEXT, surname TEXT, age INTEGER)")
      .execute(adapter.pool())
      .await
      .unwrap();

   let rows = [
      (1, "John", "Doe", 20),
      (2, "Jane", "Doe", 25),
      (3, "George", "Martin", 34),
      (4, "Todd", "Wycoff", 36),
      (5, "Ruby", "Pickett", 28),
      (6, "Colin", "McCoy", 19),
      (7, "Stephanie", "Skinner", 45),
      (8, "Anna", "Baker", 31),
      (9, "Peter", "Parker", 40),
      (10, "Laura", "Hill", 27),
      (11, "Mark", "Stone", 52),
   ];

   for (id, name, surname, age) in rows {
      sqlx::query("INSERT INTO mytable (id, name, surname, age) VALUES ($1, $2, $3, $4)")
         .bind(id)
         .bind(name)
         .bind(surname)
         .bind(age)
         .execute(adapter.pool())
         .await
         .unwrap();
   }
}

/// Positional request over `count` columns, all searchable and orderable.
fn request(count: usize) -> JsonValue {
   let columns: Vec<JsonValue> = (0..count)
      .map(|i| {
         json!({
            "data": i.to_string(),
            "name": "",
            "searchable": true,
            "orderable": true,
            "search": { "value": "" },
         })
      })
      .collect();

   json!({
      "draw": 1,
      "start": 0,
      "length": 10,
      "search": { "value": "", "regex": false },
      "order": [],
      "columns": columns,
   })
}

#[tokio::test]
async fn test_returns_column_names_in_projection_order() {
   let (adapter, _temp) = create_test_db().await;
   let mut grid = Datatables::new(adapter, &json!({}));
   grid.query(QUERY).unwrap();

   assert_eq!(grid.get_columns(), vec!["fid", "name", "surname", "age"]);
}

#[tokio::test]
async fn test_counts_all_rows_and_pages_the_first_ten() {
   let (adapter, _temp) = create_test_db().await;
   let mut grid = Datatables::new(adapter, &request(4));
   grid.query(QUERY).unwrap();

   let response = grid.try_generate().await.unwrap();

   assert_eq!(response.records_total, 11);
   assert_eq!(response.records_filtered, 11);
   assert_eq!(response.data.len(), 10);
   assert_eq!(
      serde_json::to_value(&response.data[0]).unwrap(),
      json!(["1", "John", "Doe", "20"])
   );
   assert_eq!(grid.queries().len(), 2);
}

#[tokio::test]
async fn test_hidden_column_is_left_out_of_rows() {
   let (adapter, _temp) = create_test_db().await;
   let mut grid = Datatables::new(adapter, &request(3));
   grid.query(QUERY).unwrap().hide("fid", false).unwrap();

   let response = grid.try_generate().await.unwrap();

   // default order falls to the first visible column
   assert_eq!(grid.get_columns(), vec!["name", "surname", "age"]);
   assert_eq!(
      serde_json::to_value(&response.data[0]).unwrap(),
      json!(["Anna", "Baker", "31"])
   );
}

#[tokio::test]
async fn test_named_addressing_returns_objects() {
   let (adapter, _temp) = create_test_db().await;
   let request = json!({
      "draw": 1,
      "start": 0,
      "length": 10,
      "columns": [
         { "data": "name", "searchable": true, "orderable": true, "search": { "value": "" } },
         { "data": "surname", "searchable": true, "orderable": true, "search": { "value": "" } },
         { "data": "age", "searchable": true, "orderable": true, "search": { "value": "" } },
      ],
   });
   let mut grid = Datatables::new(adapter, &request);
   grid.query(QUERY).unwrap().hide("fid", false).unwrap();

   let response = grid.try_generate().await.unwrap();

   assert_eq!(
      serde_json::to_value(&response.data[0]).unwrap(),
      json!({ "name": "Anna", "surname": "Baker", "age": "31" })
   );
}

#[tokio::test]
async fn test_global_search_filters_rows() {
   let (adapter, _temp) = create_test_db().await;
   let mut request = request(4);
   request["search"]["value"] = json!("doe");
   let mut grid = Datatables::new(adapter, &request);
   grid.query(QUERY).unwrap();

   let response = grid.try_generate().await.unwrap();

   assert_eq!(response.records_total, 11);
   assert_eq!(response.records_filtered, 2);
   assert_eq!(response.data.len(), 2);
   assert_eq!(grid.queries().len(), 3);
}

#[tokio::test]
async fn test_global_search_requires_every_keyword() {
   let (adapter, _temp) = create_test_db().await;
   let mut request = request(4);
   request["search"]["value"] = json!("jane doe");
   let mut grid = Datatables::new(adapter, &request);
   grid.query(QUERY).unwrap();

   let response = grid.try_generate().await.unwrap();

   assert_eq!(response.records_filtered, 1);
   assert_eq!(response.data[0].get("1"), Some("Jane"));
}

#[tokio::test]
async fn test_individual_search_filters_one_column() {
   let (adapter, _temp) = create_test_db().await;
   let mut request = request(4);
   request["columns"][2]["search"]["value"] = json!("Park");
   let mut grid = Datatables::new(adapter, &request);
   grid.query(QUERY).unwrap();

   let response = grid.try_generate().await.unwrap();

   assert_eq!(response.records_filtered, 1);
   assert_eq!(response.data[0].get("1"), Some("Peter"));
}

#[tokio::test]
async fn test_sorts_by_requested_column() {
   let (adapter, _temp) = create_test_db().await;
   let mut request = request(4);
   request["order"] = json!([{ "column": 2, "dir": "desc" }]);
   let mut grid = Datatables::new(adapter, &request);
   grid.query(QUERY).unwrap();

   let response = grid.try_generate().await.unwrap();

   assert_eq!(
      serde_json::to_value(&response.data[0]).unwrap(),
      json!(["4", "Todd", "Wycoff", "36"])
   );
}

#[tokio::test]
async fn test_sort_follows_client_column_keys_not_array_position() {
   let (adapter, _temp) = create_test_db().await;
   let request = json!({
      "draw": 1,
      "start": 0,
      "length": 10,
      "order": [{ "column": 0, "dir": "asc" }],
      "columns": [
         { "data": "3", "searchable": true, "orderable": true, "search": { "value": "" } },
         { "data": "0", "searchable": true, "orderable": true, "search": { "value": "" } },
         { "data": "1", "searchable": true, "orderable": true, "search": { "value": "" } },
         { "data": "2", "searchable": true, "orderable": true, "search": { "value": "" } },
      ],
   });
   let mut grid = Datatables::new(adapter, &request);
   grid.query(QUERY).unwrap();

   let response = grid.try_generate().await.unwrap();

   // ordered by age, the fourth visible column
   assert_eq!(response.data[0].get("1"), Some("Colin"));
   assert_eq!(response.data[0].get("3"), Some("19"));
}

#[tokio::test]
async fn test_caller_order_by_is_respected() {
   let (adapter, _temp) = create_test_db().await;
   let mut grid = Datatables::new(adapter, &request(4));
   grid
      .query("SELECT id AS fid, name, surname, age FROM mytable ORDER BY age DESC")
      .unwrap();

   let response = grid.try_generate().await.unwrap();

   assert!(!grid.get_query().unwrap().sql().contains("\"fid\" asc"));
   assert_eq!(response.data[0].get("1"), Some("Mark"));
}

#[tokio::test]
async fn test_length_minus_one_returns_everything() {
   let (adapter, _temp) = create_test_db().await;
   let mut request = request(4);
   request["length"] = json!(-1);
   request["start"] = json!(5);
   let mut grid = Datatables::new(adapter, &request);
   grid.query(QUERY).unwrap();

   let response = grid.try_generate().await.unwrap();

   assert_eq!(response.data.len(), 11);
}

#[tokio::test]
async fn test_paging_offsets_rows() {
   let (adapter, _temp) = create_test_db().await;
   let mut request = request(4);
   request["start"] = json!(10);
   let mut grid = Datatables::new(adapter, &request);
   grid.query(QUERY).unwrap();

   let response = grid.try_generate().await.unwrap();

   assert_eq!(response.data.len(), 1);
   assert_eq!(response.data[0].get("1"), Some("Mark"));
}

#[tokio::test]
async fn test_base_query_bindings_and_total_override() {
   let (adapter, _temp) = create_test_db().await;
   let mut grid = Datatables::new(adapter, &request(4));
   grid
      .query_with("SELECT id AS fid, name, surname, age FROM mytable WHERE id > $1", [("$1", 3)])
      .unwrap();

   let response = grid.try_generate().await.unwrap();
   assert_eq!(response.records_total, 8);
   assert_eq!(grid.queries().len(), 2);

   grid.set_total_records(8);
   let response = grid.try_generate().await.unwrap();
   assert_eq!(response.records_total, 8);
   assert_eq!(grid.queries().len(), 1);
}

#[tokio::test]
async fn test_named_base_query_bindings() {
   let (adapter, _temp) = create_test_db().await;
   let mut request = request(2);
   request["search"]["value"] = json!("a");
   let mut grid = Datatables::new(adapter, &request);
   grid
      .query_with("select id as fid, name from mytable where id > :min", [(":min", 3)])
      .unwrap();

   let response = grid.try_generate().await.unwrap();

   assert_eq!(response.records_total, 8);
   // Ruby, Colin, Todd and Peter have no "a"
   assert_eq!(response.records_filtered, 4);
   assert_eq!(response.data[0].get("1"), Some("Stephanie"));
   let keys: Vec<&str> = grid.get_query().unwrap().params().keys().map(String::as_str).collect();
   assert_eq!(keys[0], ":min");
}

#[tokio::test]
async fn test_bindings_combine_with_search() {
   let (adapter, _temp) = create_test_db().await;
   let mut request = request(4);
   request["search"]["value"] = json!("doe");
   let mut grid = Datatables::new(adapter, &request);
   grid
      .query_with("SELECT id AS fid, name, surname, age FROM mytable WHERE id > $1", [("$1", 1)])
      .unwrap();

   let response = grid.try_generate().await.unwrap();

   assert_eq!(response.records_total, 10);
   assert_eq!(response.records_filtered, 1);
   assert_eq!(response.data[0].get("1"), Some("Jane"));
}

#[tokio::test]
async fn test_custom_filter_between() {
   let (adapter, _temp) = create_test_db().await;
   let mut request = request(4);
   request["columns"][0]["search"]["value"] = json!("x");
   let mut grid = Datatables::new(adapter, &request);
   grid
      .query(QUERY)
      .unwrap()
      .filter("fid", FilterScope::Individual, |helper| Some(helper.between(4, 6)))
      .unwrap();

   let response = grid.try_generate().await.unwrap();

   assert_eq!(response.records_filtered, 3);
}

#[tokio::test]
async fn test_custom_filter_where_in() {
   let (adapter, _temp) = create_test_db().await;
   let mut grid = Datatables::new(adapter, &request(4));
   grid
      .query(QUERY)
      .unwrap()
      .filter("fid", FilterScope::Individual, |helper| Some(helper.where_in([5])))
      .unwrap();

   let response = grid.try_generate().await.unwrap();

   assert_eq!(response.records_filtered, 1);
   assert_eq!(
      serde_json::to_value(&response.data[0]).unwrap(),
      json!(["5", "Ruby", "Pickett", "28"])
   );
}

#[tokio::test]
async fn test_custom_filter_falls_back_to_default_match() {
   let (adapter, _temp) = create_test_db().await;
   let mut request = request(4);
   request["columns"][0]["search"]["value"] = json!("5");
   let mut grid = Datatables::new(adapter, &request);
   grid
      .query(QUERY)
      .unwrap()
      .filter("fid", FilterScope::Individual, |_| None)
      .unwrap();

   let response = grid.try_generate().await.unwrap();

   assert_eq!(response.records_filtered, 1);
   assert_eq!(response.data[0].get("0"), Some("5"));
}

#[tokio::test]
async fn test_custom_global_filter() {
   let (adapter, _temp) = create_test_db().await;
   let mut request = request(4);
   request["search"]["value"] = json!("36");
   let mut grid = Datatables::new(adapter, &request);
   grid
      .query(QUERY)
      .unwrap()
      .filter("age", FilterScope::Global, |helper| {
         let keyword = helper.search_value().to_string();
         keyword.parse::<i64>().ok().map(|age| helper.greater_or_equal(age))
      })
      .unwrap();

   let response = grid.try_generate().await.unwrap();

   // ages 36, 40, 45, 52; "36" also matches no other column
   assert_eq!(response.records_filtered, 4);
}

#[tokio::test]
async fn test_exact_match_compares_whole_values() {
   let (adapter, _temp) = create_test_db().await;
   let mut request = request(4);
   request["search"]["value"] = json!("Doe");
   let mut grid = Datatables::new(adapter, &request);
   grid.query(QUERY).unwrap();
   grid.force_exact_match(true);

   let response = grid.try_generate().await.unwrap();
   assert_eq!(response.records_filtered, 2);

   request["search"]["value"] = json!("Do");
   let mut grid = Datatables::new(grid.adapter().clone(), &request);
   grid.query(QUERY).unwrap();
   grid.force_exact_match(true);

   let response = grid.try_generate().await.unwrap();
   assert_eq!(response.records_filtered, 0);
   assert!(response.data.is_empty());
}

#[tokio::test]
async fn test_computed_and_edited_columns() {
   let (adapter, _temp) = create_test_db().await;
   let mut grid = Datatables::new(adapter, &request(5));
   grid
      .query(QUERY)
      .unwrap()
      .edit("name", |row| format!("{}!", sqlx_datatables::cell_text(&row["name"])))
      .unwrap()
      .add("full_name", |row| {
         format!(
            "{} {}",
            sqlx_datatables::cell_text(&row["name"]),
            sqlx_datatables::cell_text(&row["surname"])
         )
      })
      .unwrap();

   let response = grid.try_generate().await.unwrap();

   assert_eq!(
      serde_json::to_value(&response.data[0]).unwrap(),
      json!(["1", "John!", "Doe", "20", "John Doe"])
   );
}

#[tokio::test]
async fn test_distinct_values() {
   let (adapter, _temp) = create_test_db().await;
   let mut grid = Datatables::new(adapter, &request(4));
   grid.query(QUERY).unwrap();
   grid.set_distinct_response_from("surname");

   let response = grid.try_generate().await.unwrap();
   let distinct = response.distinct_data.unwrap();

   assert_eq!(distinct["surname"].as_array().unwrap().len(), 10);
   assert!(distinct["surname"].as_array().unwrap().contains(&json!("Doe")));
}

#[tokio::test]
async fn test_sql_error_yields_generic_response() {
   let (adapter, _temp) = create_test_db().await;
   let mut grid = Datatables::new(adapter, &request(2));
   grid.query("SELECT id, title FROM missing_table").unwrap();

   let response = grid.generate().await;

   assert_eq!(response.draw, 1);
   assert_eq!(response.error.as_deref(), Some(sqlx_datatables::GENERIC_ERROR));
   let json: JsonValue = serde_json::from_str(&response.to_json()).unwrap();
   assert_eq!(json["recordsTotal"], json!(0));
   assert_eq!(json["data"], json!([]));
}

#[tokio::test]
async fn test_sql_error_detail_in_debug_mode() {
   let (adapter, _temp) = create_test_db().await;
   let config = DatatablesConfig {
      debug: true,
      ..Default::default()
   };
   let mut grid = Datatables::new(adapter, &request(2)).with_config(config);
   grid.query("SELECT id, title FROM missing_table").unwrap();

   let response = grid.generate().await;

   let error = response.error.unwrap();
   assert!(error.starts_with("Error: "));
   assert!(error.contains("missing_table"));
   assert!(response.debug.is_some());
}
