//! Energy/force evaluation and optional relaxation.
//!
//! This is the slot for the eventual science kernels. The model shipped
//! here is deliberately simple but fully deterministic: SCF convergence,
//! energy, and forces are pure functions of the plan and the structure
//! descriptor, so identical inputs reproduce identical artifacts.

use async_trait::async_trait;
use serde_json::{Value, json};
use tracing::{debug, warn};

use orchid_workflow::{Node, NodeResult, RunState};

use crate::util::{get, get_f64, get_str, get_u64, round_to};

/// SCF iterations the model needs for a molecular calculation.
const REQUIRED_CYCLES_MOLECULE: u64 = 24;
/// SCF iterations the model needs for a periodic calculation.
const REQUIRED_CYCLES_PBC: u64 = 36;
/// Model energy per atom, in eV.
const ENERGY_PER_ATOM_EV: f64 = -13.605;

/// Runs the deterministic evaluation model and fills the `calculation`
/// (and, when enabled, `relaxation`) blocks.
///
/// SCF converges iff `scf.max_cycle` covers the mode's required iteration
/// count; an unconverged SCF leaves the energy unset and lets the router
/// decide between repair and validation.
pub struct RunRelaxation;

#[async_trait]
impl Node for RunRelaxation {
  async fn execute(&self, state: &RunState, _attempt: u32) -> NodeResult {
    let Some(natoms) = get_u64(state, &["structure", "natoms"]) else {
      // Nothing to compute; validation downstream reports the gap.
      debug!("no structure descriptor, skipping evaluation");
      return NodeResult::Success {
        state: state.clone(),
        next: None,
      };
    };

    let mode = get_str(state, &["plan", "mode"]).unwrap_or("molecule");
    let max_cycle = get_f64(state, &["plan", "scf", "max_cycle"])
      .map(|v| v as u64)
      .unwrap_or(50);
    let precision_digits = get_u64(state, &["resolved_config", "run", "precision_digits"])
      .unwrap_or(8) as u32;

    let required = if mode == "pbc" {
      REQUIRED_CYCLES_PBC
    } else {
      REQUIRED_CYCLES_MOLECULE
    };
    let converged = max_cycle >= required;
    let iterations = required.min(max_cycle);

    let mut calculation = get(state, &["calculation"])
      .and_then(Value::as_object)
      .cloned()
      .unwrap_or_default();
    calculation.insert("scf_converged".to_string(), json!(converged));
    calculation.insert("scf_iterations".to_string(), json!(iterations));

    if !converged {
      warn!(max_cycle, required, "scf did not converge");
      calculation.insert("error".to_string(), json!("scf_not_converged"));
      return NodeResult::Success {
        state: state.with("calculation", Value::Object(calculation)),
        next: None,
      };
    }

    let energy_ev = round_to(ENERGY_PER_ATOM_EV * natoms as f64, precision_digits);
    calculation.insert("energy_ev".to_string(), json!(energy_ev));
    calculation.insert("error".to_string(), Value::Null);

    let relax_enabled =
      get(state, &["resolved_config", "relax", "enabled"]).and_then(Value::as_bool) != Some(false);
    let force_magnitude = if relax_enabled { 0.012 } else { 0.045 };
    let forces: Vec<Value> = (0..natoms)
      .map(|_| json!([force_magnitude, 0.0, 0.0]))
      .collect();
    calculation.insert("forces_ev_per_a".to_string(), Value::Array(forces));

    let relaxation = if relax_enabled {
      let steps = get_u64(state, &["resolved_config", "relax", "steps"]).unwrap_or(200);
      json!({
        "enabled": true,
        "optimizer": get_str(state, &["resolved_config", "relax", "optimizer"]).unwrap_or("BFGS"),
        "fmax": get_f64(state, &["resolved_config", "relax", "fmax"]).unwrap_or(0.05),
        "steps": steps,
        "steps_taken": steps.min(11),
      })
    } else {
      json!({ "enabled": false })
    };

    debug!(energy_ev, iterations, "evaluation complete");
    NodeResult::Success {
      state: state
        .with("calculation", Value::Object(calculation))
        .with("relaxation", relaxation),
      next: None,
    }
  }
}
