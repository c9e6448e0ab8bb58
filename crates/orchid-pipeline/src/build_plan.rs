//! Calculation planning: turn config + structure into an executable plan.

use async_trait::async_trait;
use serde_json::{Value, json};
use tracing::debug;

use orchid_workflow::{FailureKind, Node, NodeResult, RunState};

use crate::util::{get, get_bool};

/// Builds the calculation plan from the resolved config and the structure
/// descriptor: backend checks, molecular vs periodic mode, SCF settings.
///
/// The plan is distinct from the raw config: it is what the evaluation
/// step actually consumes, with the mode decision already made.
pub struct BuildPlan;

#[async_trait]
impl Node for BuildPlan {
  async fn execute(&self, state: &RunState, _attempt: u32) -> NodeResult {
    let calc = get(state, &["resolved_config", "calculator"])
      .cloned()
      .unwrap_or_else(|| json!({}));

    let backend = calc["backend"].as_str().unwrap_or("pyscf").to_lowercase();
    let method = calc["method"].as_str().unwrap_or("dft").to_lowercase();
    if backend != "pyscf" {
      return NodeResult::Failure {
        kind: FailureKind::Plan,
        message: format!("unsupported calculator.backend '{backend}' (only 'pyscf')"),
      };
    }
    if method != "dft" {
      return NodeResult::Failure {
        kind: FailureKind::Plan,
        message: format!("unsupported calculator.method '{method}' (only 'dft')"),
      };
    }

    // PBC mode: explicit setting wins, otherwise follow the structure.
    let structure_periodic = get_bool(state, &["structure", "periodic"]).unwrap_or(false);
    let use_pbc = match calc["pbc"]["enabled"] {
      Value::Bool(enabled) => enabled,
      _ => structure_periodic,
    };

    let pbc_block = if use_pbc {
      json!({
        "enabled": true,
        "basis": calc["pbc"]["basis"].as_str().unwrap_or("gth-szv-molopt-sr"),
        "pseudo": calc["pbc"]["pseudo"].clone(),
        "mesh": calc["pbc"]["mesh"].clone(),
        "kpts": calc["pbc"]["kpts"].clone(),
        "use_multigrid": calc["pbc"]["use_multigrid"].as_bool().unwrap_or(true),
      })
    } else {
      json!({ "enabled": false })
    };

    let plan = json!({
      "mode": if use_pbc { "pbc" } else { "molecule" },
      "backend": backend,
      "method": method,
      "xc": calc["xc"].as_str().unwrap_or("PBE"),
      "basis": calc["basis"].as_str().unwrap_or("def2-svp"),
      "charge": calc["charge"].as_i64().unwrap_or(0),
      "spin": calc["spin"].as_i64().unwrap_or(0),
      "scf": {
        "conv_tol": calc["scf"]["conv_tol"].as_f64().unwrap_or(1e-8),
        "max_cycle": calc["scf"]["max_cycle"].as_u64().unwrap_or(50),
        "fallback_newton": true,
      },
      "pbc": pbc_block,
      "compute_forces": true,
    });

    debug!(mode = %plan["mode"], "calculation plan built");

    // Seed the calculation block; evaluation fills it in.
    let calculation = json!({
      "backend": backend,
      "method": method,
      "xc": plan["xc"],
      "basis": plan["basis"],
      "energy_ev": null,
      "forces_ev_per_a": null,
      "scf_converged": null,
      "scf_iterations": null,
      "error": null,
    });

    NodeResult::Success {
      state: state.with("plan", plan).with("calculation", calculation),
      next: None,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn state_with(calculator: Value, structure: Value) -> RunState {
    RunState::new()
      .with("resolved_config", json!({ "calculator": calculator }))
      .with("structure", structure)
  }

  #[tokio::test]
  async fn test_unsupported_backend_fails() {
    let state = state_with(json!({ "backend": "vasp" }), json!({}));
    let result = BuildPlan.execute(&state, 1).await;
    assert!(matches!(
      result,
      NodeResult::Failure {
        kind: FailureKind::Plan,
        ..
      }
    ));
  }

  #[tokio::test]
  async fn test_auto_pbc_follows_structure() {
    let state = state_with(json!({}), json!({ "periodic": true }));
    let NodeResult::Success { state, .. } = BuildPlan.execute(&state, 1).await else {
      panic!("expected success");
    };
    assert_eq!(state.get("plan").unwrap()["mode"], "pbc");
    assert_eq!(state.get("plan").unwrap()["pbc"]["enabled"], true);
  }

  #[tokio::test]
  async fn test_explicit_pbc_setting_wins() {
    let state = state_with(
      json!({ "pbc": { "enabled": false } }),
      json!({ "periodic": true }),
    );
    let NodeResult::Success { state, .. } = BuildPlan.execute(&state, 1).await else {
      panic!("expected success");
    };
    assert_eq!(state.get("plan").unwrap()["mode"], "molecule");
  }

  #[tokio::test]
  async fn test_plan_carries_scf_settings() {
    let state = state_with(
      json!({ "scf": { "conv_tol": 1e-6, "max_cycle": 20 } }),
      json!({}),
    );
    let NodeResult::Success { state, .. } = BuildPlan.execute(&state, 1).await else {
      panic!("expected success");
    };
    let plan = state.get("plan").unwrap();
    assert_eq!(plan["scf"]["max_cycle"], 20);
    assert_eq!(plan["scf"]["conv_tol"], 1e-6);
    // Calculation block is seeded but empty.
    assert_eq!(state.get("calculation").unwrap()["energy_ev"], Value::Null);
  }
}
