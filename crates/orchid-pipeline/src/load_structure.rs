//! Structure loading: turn the copied input into a structure descriptor.

use async_trait::async_trait;
use serde_json::{Value, json};
use tracing::debug;

use orchid_workflow::{FailureKind, Node, NodeResult, RunState};

use crate::util::get_str;

/// Extensions treated as periodic crystal formats; everything else is
/// read as a molecular geometry.
const PERIODIC_EXTENSIONS: &[&str] = &["cif", "vasp", "poscar"];

/// Loads the structure input and records a deterministic descriptor
/// (atom count, periodicity, format) on the state.
///
/// A run without a structure reference proceeds with an empty descriptor;
/// downstream validation reports the missing calculation. A reference
/// that cannot be read is a fatal structure failure.
pub struct LoadStructure;

#[async_trait]
impl Node for LoadStructure {
  async fn execute(&self, state: &RunState, _attempt: u32) -> NodeResult {
    let source = get_str(state, &["structure", "copied_path"])
      .or_else(|| get_str(state, &["structure", "path"]))
      .map(str::to_string);

    let Some(source) = source else {
      debug!("no structure reference configured");
      let descriptor = merge_descriptor(state, json!({ "present": false }));
      return NodeResult::Success {
        state: state.with("structure", descriptor),
        next: None,
      };
    };

    let text = match std::fs::read_to_string(&source) {
      Ok(text) => text,
      Err(e) => {
        return NodeResult::Failure {
          kind: FailureKind::Structure,
          message: format!("failed to read structure at {source}: {e}"),
        };
      }
    };

    let extension = source
      .rsplit('.')
      .next()
      .unwrap_or("")
      .to_ascii_lowercase();
    let periodic = PERIODIC_EXTENSIONS.contains(&extension.as_str());
    let natoms = parse_atom_count(&text);

    debug!(natoms, periodic, format = %extension, "structure loaded");
    let descriptor = merge_descriptor(
      state,
      json!({
        "present": true,
        "format": extension,
        "natoms": natoms,
        "periodic": periodic,
      }),
    );

    NodeResult::Success {
      state: state.with("structure", descriptor),
      next: None,
    }
  }
}

/// Atom count from an XYZ-style header line, falling back to counting
/// coordinate lines.
fn parse_atom_count(text: &str) -> u64 {
  let mut lines = text.lines();
  if let Some(first) = lines.next() {
    if let Ok(n) = first.trim().parse::<u64>() {
      return n.max(1);
    }
  }
  let coordinate_lines = text
    .lines()
    .skip(2)
    .filter(|line| !line.trim().is_empty())
    .count() as u64;
  coordinate_lines.max(1)
}

/// Keep the provenance fields the executor recorded and layer the
/// descriptor on top.
fn merge_descriptor(state: &RunState, descriptor: Value) -> Value {
  let mut merged = state
    .get("structure")
    .and_then(Value::as_object)
    .cloned()
    .unwrap_or_default();
  if let Value::Object(descriptor) = descriptor {
    merged.extend(descriptor);
  }
  Value::Object(merged)
}
