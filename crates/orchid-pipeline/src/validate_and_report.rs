//! Final validation of the calculation results.

use async_trait::async_trait;
use serde_json::{Value, json};
use tracing::info;

use orchid_workflow::{Node, NodeResult, RunState};

use crate::util::{get, get_bool, get_f64, round_to};

/// Terminal node: checks the calculation against the validation
/// thresholds and produces the run's final state.
///
/// Reasons mirror what they check: a missing energy, an unconverged SCF
/// when convergence is required, and a maximum force above threshold.
pub struct ValidateAndReport;

#[async_trait]
impl Node for ValidateAndReport {
  async fn execute(&self, state: &RunState, _attempt: u32) -> NodeResult {
    let mut reasons: Vec<&str> = Vec::new();

    let energy = get_f64(state, &["calculation", "energy_ev"]);
    if energy.is_none() {
      reasons.push("energy_missing_or_not_run");
    }

    let require_converged =
      get_bool(state, &["resolved_config", "validate", "require_scf_converged"]) != Some(false);
    let converged = get_bool(state, &["calculation", "scf_converged"]) == Some(true);
    if require_converged && !converged {
      reasons.push("scf_not_converged_or_not_run");
    }

    let max_force = max_force_norm(state);
    if let Some(max_force) = max_force {
      let threshold =
        get_f64(state, &["resolved_config", "validate", "max_force"]).unwrap_or(0.05);
      if max_force > threshold {
        reasons.push("max_force_exceeded");
      }
    }

    let passed = reasons.is_empty();
    info!(passed, ?reasons, "validation complete");

    let validation = json!({
      "passed": passed,
      "reasons": reasons,
      "max_force": max_force,
    });

    NodeResult::Terminal {
      state: state.with("validation", validation),
    }
  }
}

/// Largest per-atom force norm, rounded to 8 digits.
fn max_force_norm(state: &RunState) -> Option<f64> {
  let forces = get(state, &["calculation", "forces_ev_per_a"])?.as_array()?;
  let mut max: Option<f64> = None;
  for row in forces {
    let row = row.as_array()?;
    let norm = row
      .iter()
      .filter_map(Value::as_f64)
      .map(|v| v * v)
      .sum::<f64>()
      .sqrt();
    max = Some(max.map_or(norm, |m: f64| m.max(norm)));
  }
  max.map(|m| round_to(m, 8))
}

#[cfg(test)]
mod tests {
  use super::*;

  async fn terminal_state(node_state: RunState) -> RunState {
    match ValidateAndReport.execute(&node_state, 1).await {
      NodeResult::Terminal { state } => state,
      other => panic!("expected terminal, got {other:?}"),
    }
  }

  #[tokio::test]
  async fn test_passing_run() {
    let state = RunState::new().with(
      "calculation",
      json!({
        "energy_ev": -27.21,
        "scf_converged": true,
        "forces_ev_per_a": [[0.01, 0.0, 0.0], [0.02, 0.0, 0.0]],
      }),
    );
    let validation = terminal_state(state).await;
    let v = validation.get("validation").unwrap();
    assert_eq!(v["passed"], true);
    assert_eq!(v["max_force"], 0.02);
    assert_eq!(v["reasons"].as_array().unwrap().len(), 0);
  }

  #[tokio::test]
  async fn test_missing_energy_and_convergence() {
    let validation = terminal_state(RunState::new()).await;
    let v = validation.get("validation").unwrap();
    assert_eq!(v["passed"], false);
    let reasons = v["reasons"].as_array().unwrap();
    assert!(reasons.contains(&json!("energy_missing_or_not_run")));
    assert!(reasons.contains(&json!("scf_not_converged_or_not_run")));
  }

  #[tokio::test]
  async fn test_force_threshold() {
    let state = RunState::new()
      .with(
        "calculation",
        json!({
          "energy_ev": -27.21,
          "scf_converged": true,
          "forces_ev_per_a": [[0.2, 0.0, 0.0]],
        }),
      )
      .with("resolved_config", json!({ "validate": { "max_force": 0.05 } }));
    let v = terminal_state(state).await;
    let v = v.get("validation").unwrap();
    assert_eq!(v["passed"], false);
    assert!(v["reasons"].as_array().unwrap().contains(&json!("max_force_exceeded")));
  }

  #[tokio::test]
  async fn test_convergence_not_required_when_disabled() {
    let state = RunState::new()
      .with(
        "calculation",
        json!({ "energy_ev": -1.0, "scf_converged": false }),
      )
      .with(
        "resolved_config",
        json!({ "validate": { "require_scf_converged": false } }),
      );
    let v = terminal_state(state).await;
    assert_eq!(v.get("validation").unwrap()["passed"], true);
  }
}
