//! Conversion of raw SQLite values into JSON.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde_json::Value as JsonValue;
use sqlx::sqlite::SqliteValueRef;
use sqlx::{TypeInfo, Value, ValueRef};

use crate::error::{Error, Result};

/// Map one SQLite value to JSON by its storage class.
///
/// BLOBs are base64-encoded; non-finite reals become `null`.
pub(crate) fn to_json(value: SqliteValueRef<'_>) -> Result<JsonValue> {
   if value.is_null() {
      return Ok(JsonValue::Null);
   }

   let value = ValueRef::to_owned(&value);
   let type_name = value.type_info().name().to_string();
   let decoded = match type_name.as_str() {
      "INTEGER" | "BOOLEAN" => JsonValue::from(value.try_decode::<i64>()?),
      "REAL" => serde_json::Number::from_f64(value.try_decode::<f64>()?)
         .map(JsonValue::Number)
         .unwrap_or(JsonValue::Null),
      "BLOB" => JsonValue::String(STANDARD.encode(value.try_decode::<Vec<u8>>()?)),
      _ => match value.try_decode::<String>() {
         Ok(text) => JsonValue::String(text),
         Err(_) => return Err(Error::UnsupportedDatatype(type_name)),
      },
   };
   Ok(decoded)
}
