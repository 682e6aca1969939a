//! Call trace attached to responses in debug mode.

use std::time::Instant;

use indexmap::IndexMap;
use serde::Serialize;
use serde_json::Value as JsonValue;

/// One recorded stage of a request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DebugCall {
   pub stage: String,
   pub context: JsonValue,
   /// Milliseconds since the trace was started
   pub elapsed_ms: u64,
}

/// Keyed entries plus an ordered list of stage calls.
///
/// Serializes as the entries object with the calls under `calls`.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DebugTrace {
   #[serde(flatten)]
   entries: IndexMap<String, JsonValue>,
   #[serde(skip_serializing_if = "Vec::is_empty")]
   calls: Vec<DebugCall>,
   #[serde(skip)]
   started: Option<Instant>,
}

impl DebugTrace {
   pub fn new() -> Self {
      Self {
         started: Some(Instant::now()),
         ..Self::default()
      }
   }

   /// Set a keyed entry, replacing any previous value.
   pub fn add(&mut self, key: impl Into<String>, value: impl Into<JsonValue>) -> &mut Self {
      self.entries.insert(key.into(), value.into());
      self
   }

   pub fn log_call(&mut self, stage: impl Into<String>, context: JsonValue) -> &mut Self {
      let elapsed_ms = self
         .started
         .map(|started| started.elapsed().as_millis() as u64)
         .unwrap_or_default();
      self.calls.push(DebugCall {
         stage: stage.into(),
         context,
         elapsed_ms,
      });
      self
   }

   pub fn entry(&self, key: &str) -> Option<&JsonValue> {
      self.entries.get(key)
   }

   pub fn calls(&self) -> &[DebugCall] {
      &self.calls
   }

   /// Stages in the order they were logged.
   pub fn stages(&self) -> Vec<&str> {
      self.calls.iter().map(|c| c.stage.as_str()).collect()
   }
}
