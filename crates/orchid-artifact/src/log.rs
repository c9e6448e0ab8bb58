//! Structured log entries, one JSON object per line.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// The kind of event a log line records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogEvent {
  Start,
  End,
  Retry,
  Failure,
  Info,
  Cancelled,
}

/// One structured log line.
///
/// Each entry is independently parseable; the log's line order equals
/// execution order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
  pub ts_utc: DateTime<Utc>,
  pub node: String,
  pub event: LogEvent,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub attempt: Option<u32>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub message: Option<String>,
  #[serde(default, skip_serializing_if = "Map::is_empty")]
  pub fields: Map<String, Value>,
}

impl LogEntry {
  pub fn new(node: impl Into<String>, event: LogEvent) -> Self {
    Self {
      ts_utc: Utc::now(),
      node: node.into(),
      event,
      attempt: None,
      message: None,
      fields: Map::new(),
    }
  }

  pub fn attempt(mut self, attempt: u32) -> Self {
    self.attempt = Some(attempt);
    self
  }

  pub fn message(mut self, message: impl Into<String>) -> Self {
    self.message = Some(message.into());
    self
  }

  pub fn field(mut self, key: impl Into<String>, value: Value) -> Self {
    self.fields.insert(key.into(), value);
    self
  }
}
