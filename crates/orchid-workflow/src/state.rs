//! The immutable state snapshot threaded between nodes.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A snapshot of run state: string keys mapped to JSON values.
///
/// Snapshots are never mutated; [`RunState::with`] returns a new state with
/// one key replaced or added. The ordered map keeps serialized snapshots
/// byte-stable across runs with identical inputs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunState {
  values: BTreeMap<String, Value>,
}

impl RunState {
  pub fn new() -> Self {
    Self::default()
  }

  /// A new snapshot with `key` set to `value`.
  #[must_use]
  pub fn with(&self, key: impl Into<String>, value: Value) -> Self {
    let mut values = self.values.clone();
    values.insert(key.into(), value);
    Self { values }
  }

  pub fn get(&self, key: &str) -> Option<&Value> {
    self.values.get(key)
  }

  pub fn contains(&self, key: &str) -> bool {
    self.values.contains_key(key)
  }

  pub fn keys(&self) -> impl Iterator<Item = &str> {
    self.values.keys().map(String::as_str)
  }

  /// The snapshot as a single JSON object.
  pub fn to_value(&self) -> Value {
    serde_json::to_value(&self.values).unwrap_or(Value::Null)
  }
}

#[cfg(test)]
mod tests {
  use serde_json::json;

  use super::*;

  #[test]
  fn test_with_does_not_mutate_original() {
    let a = RunState::new().with("x", json!(1));
    let b = a.with("x", json!(2)).with("y", json!(3));

    assert_eq!(a.get("x"), Some(&json!(1)));
    assert!(!a.contains("y"));
    assert_eq!(b.get("x"), Some(&json!(2)));
    assert_eq!(b.get("y"), Some(&json!(3)));
  }

  #[test]
  fn test_serialization_is_key_ordered() {
    let state = RunState::new()
      .with("zeta", json!(1))
      .with("alpha", json!(2));
    let text = serde_json::to_string(&state).expect("serialize");
    assert_eq!(text, r#"{"alpha":2,"zeta":1}"#);
  }
}
