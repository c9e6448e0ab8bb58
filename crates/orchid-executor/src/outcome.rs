//! Run outcome, final summary, and report rendering.

use std::path::PathBuf;

use serde_json::{Map, Value, json};

use orchid_artifact::{Manifest, RunStatus};
use orchid_workflow::RunState;

/// What a finished (or aborted) run hands back to the caller.
#[derive(Debug, Clone)]
pub struct RunOutcome {
  pub status: RunStatus,
  pub run_dir: PathBuf,
  /// The final summary, present on success and failure, absent when the
  /// run was cancelled before termination.
  pub summary: Option<Value>,
}

/// Build the machine-readable summary from the final state.
pub fn build_summary(
  status: RunStatus,
  manifest: &Manifest,
  state: &RunState,
  error: Option<&str>,
) -> Value {
  let mut summary = Map::new();
  summary.insert("status".to_string(), json!(status));
  summary.insert("run_id".to_string(), json!(manifest.run_id));
  summary.insert("material_id".to_string(), json!(manifest.material_id));
  summary.insert("config_hash".to_string(), json!(manifest.config_hash));

  for key in ["structure", "plan", "calculation", "relaxation", "retry", "validation"] {
    if let Some(value) = state.get(key) {
      summary.insert(key.to_string(), value.clone());
    }
  }
  if let Some(error) = error {
    summary.insert("error".to_string(), json!(error));
  }

  Value::Object(summary)
}

/// Render the human-readable report from the summary.
pub fn render_report(summary: &Value) -> String {
  let field = |path: &[&str]| -> String {
    let mut cur = summary;
    for key in path {
      match cur.get(key) {
        Some(next) => cur = next,
        None => return "null".to_string(),
      }
    }
    match cur {
      Value::String(s) => s.clone(),
      Value::Null => "null".to_string(),
      other => other.to_string(),
    }
  };

  let reasons = summary
    .get("validation")
    .and_then(|v| v.get("reasons"))
    .and_then(Value::as_array)
    .map(|items| {
      items
        .iter()
        .map(|r| format!("- {}", r.as_str().unwrap_or("?")))
        .collect::<Vec<_>>()
        .join("\n")
    })
    .filter(|s| !s.is_empty())
    .unwrap_or_else(|| "- (none)".to_string());

  let mut report = format!(
    "# orchid report\n\n\
     Run: `{run_id}`  \n\
     Material: `{material}`\n\n\
     Energy (eV): `{energy}`  \n\
     Max force (eV/A): `{max_force}`\n\n\
     Relax enabled: `{relax_enabled}`  \n\
     Retries used: `{retries_used}`\n\n\
     Status: **{status}**  \n\
     Passed: **{passed}**\n\n\
     ## Reasons\n\n\
     {reasons}\n",
    run_id = field(&["run_id"]),
    material = field(&["material_id"]),
    energy = field(&["calculation", "energy_ev"]),
    max_force = field(&["validation", "max_force"]),
    relax_enabled = field(&["relaxation", "enabled"]),
    retries_used = field(&["retry", "retries_used"]),
    status = field(&["status"]),
    passed = field(&["validation", "passed"]),
    reasons = reasons,
  );

  if let Some(error) = summary.get("error").and_then(Value::as_str) {
    report.push_str(&format!("\n## Error\n\n```\n{error}\n```\n"));
  }

  report
}
