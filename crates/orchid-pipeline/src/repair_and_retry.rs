//! Deterministic SCF repair between attempts.

use async_trait::async_trait;
use serde_json::{Value, json};
use tracing::info;

use orchid_workflow::{Node, NodeResult, RunState};

use crate::util::{get, get_i64};

/// Hard cap on the repaired `max_cycle`.
const MAX_CYCLE_CAP: u64 = 400;

/// Applies the deterministic repair policy after an unconverged SCF:
/// raise `max_cycle` to at least 50, otherwise double it up to the cap,
/// and floor an unreasonably tight `conv_tol` at 1e-8. Bookkeeping goes
/// into the `retry` block, including a per-attempt change history.
///
/// The router only sends the run here while retries remain; with none
/// left this node is a no-op passthrough.
pub struct RepairAndRetry;

#[async_trait]
impl Node for RepairAndRetry {
  async fn execute(&self, state: &RunState, _attempt: u32) -> NodeResult {
    let remaining = get_i64(state, &["retry", "retries_remaining"]).unwrap_or(0);
    let used = get_i64(state, &["retry", "retries_used"]).unwrap_or(0);

    if remaining <= 0 {
      return NodeResult::Success {
        state: state.clone(),
        next: None,
      };
    }

    let prev_max_cycle = get(state, &["resolved_config", "calculator", "scf", "max_cycle"])
      .and_then(Value::as_u64)
      .unwrap_or(50);
    let prev_conv_tol = get(state, &["resolved_config", "calculator", "scf", "conv_tol"])
      .and_then(Value::as_f64)
      .unwrap_or(1e-8);

    let new_max_cycle = if prev_max_cycle < 50 {
      50
    } else {
      (prev_max_cycle * 2).min(MAX_CYCLE_CAP)
    };
    let new_conv_tol = prev_conv_tol.max(1e-8);

    let changes = json!({
      "calculator.scf.max_cycle": { "old": prev_max_cycle, "new": new_max_cycle },
      "calculator.scf.conv_tol": { "old": prev_conv_tol, "new": new_conv_tol },
    });

    // Rewrite the config and plan with the repaired settings.
    let mut config = get(state, &["resolved_config"])
      .cloned()
      .unwrap_or_else(|| json!({}));
    config["calculator"]["scf"]["max_cycle"] = json!(new_max_cycle);
    config["calculator"]["scf"]["conv_tol"] = json!(new_conv_tol);

    let mut plan = get(state, &["plan"]).cloned().unwrap_or_else(|| json!({}));
    if plan.get("scf").is_some() {
      plan["scf"]["max_cycle"] = json!(new_max_cycle);
      plan["scf"]["conv_tol"] = json!(new_conv_tol);
    }

    let mut history = get(state, &["retry", "history"])
      .and_then(Value::as_array)
      .cloned()
      .unwrap_or_default();
    history.push(json!({
      "attempt": used + 1,
      "reason": "scf_not_converged",
      "changes": changes,
    }));

    let retry = json!({
      "retries_remaining": remaining - 1,
      "retries_used": used + 1,
      "history": history,
    });

    info!(
      attempt = used + 1,
      max_cycle = new_max_cycle,
      "applied retry modifications"
    );

    NodeResult::Success {
      state: state
        .with("resolved_config", config)
        .with("plan", plan)
        .with("retry", retry),
      next: None,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn state(max_cycle: u64, remaining: i64, used: i64) -> RunState {
    RunState::new()
      .with(
        "resolved_config",
        json!({ "calculator": { "scf": { "max_cycle": max_cycle, "conv_tol": 1e-8 } } }),
      )
      .with("plan", json!({ "scf": { "max_cycle": max_cycle, "conv_tol": 1e-8 } }))
      .with(
        "retry",
        json!({ "retries_remaining": remaining, "retries_used": used, "history": [] }),
      )
  }

  async fn repaired(s: RunState) -> RunState {
    match RepairAndRetry.execute(&s, 1).await {
      NodeResult::Success { state, .. } => state,
      other => panic!("expected success, got {other:?}"),
    }
  }

  #[tokio::test]
  async fn test_low_max_cycle_bumped_to_fifty() {
    let state = repaired(state(20, 1, 0)).await;
    assert_eq!(
      state.get("resolved_config").unwrap()["calculator"]["scf"]["max_cycle"],
      50
    );
    assert_eq!(state.get("plan").unwrap()["scf"]["max_cycle"], 50);
  }

  #[tokio::test]
  async fn test_high_max_cycle_doubles_with_cap() {
    let doubled = repaired(state(60, 1, 0)).await;
    assert_eq!(
      doubled.get("resolved_config").unwrap()["calculator"]["scf"]["max_cycle"],
      120
    );

    let capped = repaired(state(300, 1, 0)).await;
    assert_eq!(
      capped.get("resolved_config").unwrap()["calculator"]["scf"]["max_cycle"],
      400
    );
  }

  #[tokio::test]
  async fn test_bookkeeping_and_history() {
    let state = repaired(state(20, 2, 0)).await;
    let retry = state.get("retry").unwrap();
    assert_eq!(retry["retries_remaining"], 1);
    assert_eq!(retry["retries_used"], 1);
    assert_eq!(retry["history"].as_array().unwrap().len(), 1);
    assert_eq!(retry["history"][0]["reason"], "scf_not_converged");
  }

  #[tokio::test]
  async fn test_no_retries_remaining_is_passthrough() {
    let before = state(20, 0, 1);
    let after = repaired(before.clone()).await;
    assert_eq!(after, before);
  }
}
