//! The run manifest: an incrementally written, always-parseable record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use orchid_identity::RunIdentity;

/// Final (or in-flight) status of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
  Running,
  Succeeded,
  Failed,
  Cancelled,
}

/// Outcome of a single node attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeOutcome {
  /// The node succeeded and the run advanced to a successor.
  Advanced,
  /// The node requested a retry and another attempt was scheduled.
  Retried,
  /// The node failed fatally (or exhausted its retry budget).
  Failed,
  /// The node produced the run's final state.
  Completed,
}

/// One node attempt, as recorded in the manifest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransitionRecord {
  pub node: String,
  pub attempt: u32,
  pub started_at: DateTime<Utc>,
  pub completed_at: DateTime<Utc>,
  pub outcome: NodeOutcome,
}

/// Provenance of the structure input, when one was provided.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StructureProvenance {
  pub path: Option<String>,
  pub copied_path: Option<String>,
  pub input_hash: Option<String>,
}

/// The run manifest.
///
/// Append-only in spirit: identity and config are fixed at creation,
/// transitions accumulate, and status moves monotonically from `Running`
/// to exactly one terminal value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
  pub run_id: String,
  pub created_at_utc: DateTime<Utc>,
  pub material_id: String,
  pub config_hash: String,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub git_revision: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub run_name: Option<String>,
  pub resolved_config: Value,
  pub structure: StructureProvenance,
  pub transitions: Vec<TransitionRecord>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub retry: Option<Value>,
  pub status: RunStatus,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub error: Option<String>,
}

impl Manifest {
  /// A fresh manifest for a newly initialized run.
  pub fn new(identity: &RunIdentity, resolved_config: Value) -> Self {
    Self {
      run_id: identity.run_id(),
      created_at_utc: identity.timestamp,
      material_id: identity.material_key.clone(),
      config_hash: identity.config_hash.clone(),
      git_revision: identity.git_revision.clone(),
      run_name: identity.run_name.clone(),
      resolved_config,
      structure: StructureProvenance::default(),
      transitions: Vec::new(),
      retry: None,
      status: RunStatus::Running,
      error: None,
    }
  }

  /// Record one completed node attempt.
  pub fn push_transition(&mut self, record: TransitionRecord) {
    self.transitions.push(record);
  }
}

#[cfg(test)]
mod tests {
  use chrono::TimeZone;
  use serde_json::json;

  use super::*;

  #[test]
  fn test_manifest_round_trips() {
    let ts = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();
    let identity =
      RunIdentity::derive("si_bulk", &json!({ "k": 1 }), ts, None, None).expect("derive");

    let mut manifest = Manifest::new(&identity, json!({ "k": 1 }));
    manifest.push_transition(TransitionRecord {
      node: "load_structure".to_string(),
      attempt: 1,
      started_at: ts,
      completed_at: ts,
      outcome: NodeOutcome::Advanced,
    });

    let text = serde_json::to_string_pretty(&manifest).expect("serialize");
    let back: Manifest = serde_json::from_str(&text).expect("parse");
    assert_eq!(back, manifest);
    assert_eq!(back.status, RunStatus::Running);
  }

  #[test]
  fn test_status_serializes_snake_case() {
    assert_eq!(
      serde_json::to_value(RunStatus::Succeeded).unwrap(),
      json!("succeeded")
    );
    assert_eq!(
      serde_json::to_value(NodeOutcome::Retried).unwrap(),
      json!("retried")
    );
  }
}
