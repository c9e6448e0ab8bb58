//! Wiring of the standard pipeline graph.

use serde_json::json;

use orchid_config::RootConfig;
use orchid_workflow::{GraphError, RunState, WorkflowGraph};

use crate::build_plan::BuildPlan;
use crate::load_structure::LoadStructure;
use crate::repair_and_retry::RepairAndRetry;
use crate::run_relaxation::RunRelaxation;
use crate::util::{get_bool, get_i64};
use crate::validate_and_report::ValidateAndReport;

/// Routing after the evaluation step: a converged SCF goes to validation,
/// an unconverged one is repaired while retries remain, and an exhausted
/// budget falls through to validation (which then reports the failure).
pub fn route_after_run(state: &RunState) -> String {
  let converged = get_bool(state, &["calculation", "scf_converged"]) == Some(true);
  let remaining = get_i64(state, &["retry", "retries_remaining"]).unwrap_or(0);

  if !converged && remaining > 0 {
    "repair_and_retry".to_string()
  } else {
    "validate_and_report".to_string()
  }
}

/// The standard pipeline:
///
/// ```text
/// load_structure -> build_plan -> run_relaxation --+--> validate_and_report
///                                      ^           |
///                                      |           v
///                                      +---- repair_and_retry
/// ```
pub fn standard_graph() -> Result<WorkflowGraph, GraphError> {
  WorkflowGraph::builder()
    .add_node("load_structure", LoadStructure)
    .add_node("build_plan", BuildPlan)
    .add_node("run_relaxation", RunRelaxation)
    .add_node("repair_and_retry", RepairAndRetry)
    .add_node("validate_and_report", ValidateAndReport)
    .entry("load_structure")
    .add_edge("load_structure", "build_plan")
    .add_edge("build_plan", "run_relaxation")
    .add_conditional_edges(
      "run_relaxation",
      route_after_run,
      ["repair_and_retry", "validate_and_report"],
    )
    .add_edge("repair_and_retry", "run_relaxation")
    .build()
}

/// Seed state for a pipeline run: the retry budget from the config.
pub fn initial_state(config: &RootConfig) -> RunState {
  RunState::new().with(
    "retry",
    json!({
      "retries_remaining": config.run.retries,
      "retries_used": 0,
      "history": [],
    }),
  )
}
