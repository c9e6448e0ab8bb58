//! Small helpers for digging into the shared run state.

use serde_json::Value;

use orchid_workflow::RunState;

pub(crate) fn get<'a>(state: &'a RunState, path: &[&str]) -> Option<&'a Value> {
  let (first, rest) = path.split_first()?;
  let mut current = state.get(first)?;
  for key in rest {
    current = current.get(key)?;
  }
  Some(current)
}

pub(crate) fn get_bool(state: &RunState, path: &[&str]) -> Option<bool> {
  get(state, path).and_then(Value::as_bool)
}

pub(crate) fn get_u64(state: &RunState, path: &[&str]) -> Option<u64> {
  get(state, path).and_then(Value::as_u64)
}

pub(crate) fn get_i64(state: &RunState, path: &[&str]) -> Option<i64> {
  get(state, path).and_then(Value::as_i64)
}

pub(crate) fn get_f64(state: &RunState, path: &[&str]) -> Option<f64> {
  get(state, path).and_then(Value::as_f64)
}

pub(crate) fn get_str<'a>(state: &'a RunState, path: &[&str]) -> Option<&'a str> {
  get(state, path).and_then(Value::as_str)
}

/// Round to a fixed number of decimal digits.
pub(crate) fn round_to(x: f64, digits: u32) -> f64 {
  let factor = 10f64.powi(digits as i32);
  (x * factor).round() / factor
}

#[cfg(test)]
mod tests {
  use serde_json::json;

  use super::*;

  #[test]
  fn test_get_walks_nested_path() {
    let state = RunState::new().with("a", json!({ "b": { "c": 7 } }));
    assert_eq!(get_u64(&state, &["a", "b", "c"]), Some(7));
    assert_eq!(get_u64(&state, &["a", "missing"]), None);
  }

  #[test]
  fn test_round_to() {
    assert_eq!(round_to(1.23456789, 3), 1.235);
    assert_eq!(round_to(-27.209999999, 8), -27.21);
  }
}
