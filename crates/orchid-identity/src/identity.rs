//! Run identity derivation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::hash::short_hash;

/// Length of the config hash component in a run id.
pub const CONFIG_HASH_LEN: usize = 10;

/// Length of the hash recorded for copied structure inputs.
pub const INPUT_HASH_LEN: usize = 16;

#[derive(Debug, Error)]
pub enum IdentityError {
  /// The material key is required and must be non-empty.
  #[error("material key must not be empty")]
  EmptyMaterialKey,

  /// The configuration still contains an unresolved `${...}` placeholder.
  #[error("resolved config contains unresolved reference: {value}")]
  UnresolvedConfig { value: String },
}

/// The stable identity of a single run.
///
/// Immutable once derived; the run directory is named from it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunIdentity {
  pub timestamp: DateTime<Utc>,
  pub material_key: String,
  pub config_hash: String,
  pub git_revision: Option<String>,
  pub run_name: Option<String>,
}

impl RunIdentity {
  /// Derive a run identity from its semantic inputs.
  ///
  /// Pure: identical arguments yield an identical identity. The timestamp
  /// is caller-supplied so determinism is testable.
  pub fn derive(
    material_key: &str,
    resolved_config: &Value,
    timestamp: DateTime<Utc>,
    git_revision: Option<&str>,
    run_name: Option<&str>,
  ) -> Result<Self, IdentityError> {
    if material_key.trim().is_empty() {
      return Err(IdentityError::EmptyMaterialKey);
    }
    if let Some(value) = find_unresolved(resolved_config) {
      return Err(IdentityError::UnresolvedConfig { value });
    }

    Ok(Self {
      timestamp,
      material_key: material_key.to_string(),
      config_hash: short_hash(resolved_config, CONFIG_HASH_LEN),
      git_revision: git_revision.map(str::to_string),
      run_name: run_name.map(str::to_string),
    })
  }

  /// Render the run id used to name the run directory:
  /// `<ts>_<material>_<config-hash>[_<git>][_<name>]`.
  pub fn run_id(&self) -> String {
    let mut parts = vec![
      format_utc_compact(&self.timestamp),
      sanitize_component(&self.material_key, 48),
      sanitize_component(&self.config_hash, 16),
    ];
    if let Some(git) = &self.git_revision {
      parts.push(sanitize_component(git, 16));
    }
    if let Some(name) = &self.run_name {
      parts.push(sanitize_component(name, 48).to_lowercase());
    }
    parts.join("_")
  }
}

/// Find any string value containing a `${...}` placeholder, depth-first.
fn find_unresolved(value: &Value) -> Option<String> {
  match value {
    Value::String(s) if s.contains("${") => Some(s.clone()),
    Value::Object(map) => map.values().find_map(find_unresolved),
    Value::Array(items) => items.iter().find_map(find_unresolved),
    _ => None,
  }
}

fn format_utc_compact(ts: &DateTime<Utc>) -> String {
  ts.format("%Y%m%dT%H%M%SZ").to_string()
}

/// Reduce a string to a filesystem-safe path component.
///
/// Runs of characters outside `[A-Za-z0-9_.-]` collapse to a single `-`;
/// leading/trailing separators are trimmed and the result is truncated to
/// `max_len`. An empty result becomes `"x"`.
pub fn sanitize_component(value: &str, max_len: usize) -> String {
  let mut out = String::with_capacity(value.len());
  let mut last_was_sep = false;
  for c in value.trim().chars() {
    if c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-') {
      out.push(c);
      last_was_sep = false;
    } else if !last_was_sep {
      out.push('-');
      last_was_sep = true;
    }
  }
  let trimmed: String = out
    .trim_matches(|c| matches!(c, '-' | '_' | '.'))
    .chars()
    .take(max_len)
    .collect();
  if trimmed.is_empty() {
    "x".to_string()
  } else {
    trimmed
  }
}

#[cfg(test)]
mod tests {
  use chrono::TimeZone;
  use serde_json::json;

  use super::*;

  fn fixed_ts() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 5, 12, 30, 45).unwrap()
  }

  #[test]
  fn test_derive_is_deterministic() {
    let cfg = json!({ "calculator": { "xc": "PBE" }, "run": { "retries": 1 } });
    let a = RunIdentity::derive("tio2_rutile", &cfg, fixed_ts(), Some("abc123"), Some("smoke"))
      .expect("derive");
    let b = RunIdentity::derive("tio2_rutile", &cfg, fixed_ts(), Some("abc123"), Some("smoke"))
      .expect("derive");
    assert_eq!(a, b);
    assert_eq!(a.run_id(), b.run_id());
  }

  #[test]
  fn test_run_id_format_is_exact() {
    let cfg = json!({ "k": 1 });
    let identity =
      RunIdentity::derive("tio2 rutile", &cfg, fixed_ts(), Some("abc123"), Some("Smoke Run"))
        .expect("derive");
    let run_id = identity.run_id();

    assert!(run_id.starts_with("20240305T123045Z_tio2-rutile_"));
    assert!(run_id.ends_with("_abc123_smoke-run"));
  }

  #[test]
  fn test_config_order_invariance() {
    let a = json!({ "b": 1, "a": { "y": 2, "x": 3 } });
    let b = json!({ "a": { "x": 3, "y": 2 }, "b": 1 });
    let ia = RunIdentity::derive("m", &a, fixed_ts(), None, None).expect("derive");
    let ib = RunIdentity::derive("m", &b, fixed_ts(), None, None).expect("derive");
    assert_eq!(ia.config_hash, ib.config_hash);
  }

  #[test]
  fn test_empty_material_key_rejected() {
    let err = RunIdentity::derive("  ", &json!({}), fixed_ts(), None, None)
      .expect_err("empty key must fail");
    assert!(matches!(err, IdentityError::EmptyMaterialKey));
  }

  #[test]
  fn test_unresolved_reference_rejected() {
    let cfg = json!({ "run": { "runs_dir": "${RUNS_DIR}" } });
    let err = RunIdentity::derive("m", &cfg, fixed_ts(), None, None)
      .expect_err("placeholder must fail");
    assert!(matches!(err, IdentityError::UnresolvedConfig { .. }));
  }

  #[test]
  fn test_sanitize_component() {
    assert_eq!(sanitize_component("tio2 rutile", 48), "tio2-rutile");
    assert_eq!(sanitize_component("a/b\\c", 48), "a-b-c");
    assert_eq!(sanitize_component("--x--", 48), "x");
    assert_eq!(sanitize_component("!!!", 48), "x");
    assert_eq!(sanitize_component("abcdef", 3), "abc");
  }
}
