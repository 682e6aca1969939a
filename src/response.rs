//! The grid response payload.

use std::{fmt, io};

use datatables_core::{Error, RowData};
use indexmap::IndexMap;
use serde::Serialize;
use serde_json::Value as JsonValue;
use serde_json::ser::{CharEscape, CompactFormatter, Formatter};

use crate::debug::DebugTrace;

/// Message sent in place of error detail outside debug mode.
pub const GENERIC_ERROR: &str = "An unexpected error occurred. Please try again later.";

/// Response for one grid request.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GridResponse {
   pub draw: i64,
   pub records_total: u64,
   pub records_filtered: u64,
   pub data: Vec<RowData>,
   /// Column name to its distinct values
   #[serde(skip_serializing_if = "Option::is_none")]
   pub distinct_data: Option<IndexMap<String, JsonValue>>,
   #[serde(skip_serializing_if = "Option::is_none")]
   pub error: Option<String>,
   #[serde(skip_serializing_if = "Option::is_none")]
   pub debug: Option<DebugTrace>,
}

impl GridResponse {
   /// All-or-nothing failure response: zero counts, no rows.
   ///
   /// `detailed` exposes the error message and its source chain.
   pub fn from_error(draw: i64, err: &Error, detailed: bool) -> Self {
      let error = if detailed {
         let mut message = format!("Error: {err}");
         let mut source = std::error::Error::source(err);
         while let Some(cause) = source {
            message.push_str(&format!("\ncaused by: {cause}"));
            source = cause.source();
         }
         message
      } else {
         GENERIC_ERROR.to_string()
      };

      Self {
         draw,
         error: Some(error),
         ..Self::default()
      }
   }

   pub fn is_error(&self) -> bool {
      self.error.is_some()
   }

   pub fn to_value(&self) -> JsonValue {
      serde_json::to_value(self).unwrap_or(JsonValue::Null)
   }

   /// JSON text safe to embed in HTML: `<`, `>`, `&`, `'` and `"` inside
   /// strings are written as `\u00XX` escapes.
   pub fn to_json(&self) -> String {
      match to_html_safe_json(self) {
         Ok(json) => json,
         Err(err) => {
            tracing::warn!(error = %err, "failed to serialize grid response");
            let fallback = Self {
               draw: self.draw,
               error: Some(GENERIC_ERROR.to_string()),
               ..Self::default()
            };
            to_html_safe_json(&fallback).unwrap_or_default()
         }
      }
   }
}

fn to_html_safe_json<T: Serialize>(value: &T) -> serde_json::Result<String> {
   let mut buf = Vec::with_capacity(128);
   let mut serializer = serde_json::Serializer::with_formatter(&mut buf, HtmlSafeFormatter);
   value.serialize(&mut serializer)?;
   // serde_json only ever writes UTF-8
   Ok(String::from_utf8(buf).unwrap_or_default())
}

impl fmt::Display for GridResponse {
   fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
      f.write_str(&self.to_json())
   }
}

/// Compact output with string contents hex-escaped for HTML. Structural
/// quotes are written by `begin_string`/`end_string` and stay as they are.
struct HtmlSafeFormatter;

impl Formatter for HtmlSafeFormatter {
   fn write_string_fragment<W>(&mut self, writer: &mut W, fragment: &str) -> io::Result<()>
   where
      W: ?Sized + io::Write,
   {
      let bytes = fragment.as_bytes();
      let mut start = 0;
      for (i, &b) in bytes.iter().enumerate() {
         let escape: &[u8] = match b {
            b'<' => b"\\u003C",
            b'>' => b"\\u003E",
            b'&' => b"\\u0026",
            b'\'' => b"\\u0027",
            _ => continue,
         };
         writer.write_all(&bytes[start..i])?;
         writer.write_all(escape)?;
         start = i + 1;
      }
      writer.write_all(&bytes[start..])
   }

   fn write_char_escape<W>(&mut self, writer: &mut W, char_escape: CharEscape) -> io::Result<()>
   where
      W: ?Sized + io::Write,
   {
      match char_escape {
         CharEscape::Quote => writer.write_all(b"\\u0022"),
         other => CompactFormatter.write_char_escape(writer, other),
      }
   }
}
