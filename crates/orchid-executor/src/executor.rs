//! The sequential workflow executor.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde_json::json;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use orchid_artifact::{
  ArtifactStore, LogEntry, LogEvent, Manifest, NodeOutcome, RunHandle, RunStatus,
  StructureProvenance, TransitionRecord,
};
use orchid_identity::{INPUT_HASH_LEN, RunIdentity, sha256_file};
use orchid_workflow::{Edge, FailureKind, NodeResult, RunState, WorkflowGraph};

use crate::error::ExecutionError;
use crate::outcome::{RunOutcome, build_summary, render_report};

/// Everything a single run needs from its collaborators.
///
/// The timestamp is part of the request so run identity stays a pure
/// function of its inputs; callers capture the clock once, at the edge.
#[derive(Debug, Clone)]
pub struct RunRequest {
  pub material_key: String,
  pub resolved_config: serde_json::Value,
  pub structure_path: Option<PathBuf>,
  pub run_name: Option<String>,
  pub revision: Option<String>,
  pub timestamp: DateTime<Utc>,
  /// Extra state seeded before the entry node runs (e.g. retry counters).
  pub initial_state: RunState,
}

impl RunRequest {
  pub fn new(
    material_key: impl Into<String>,
    resolved_config: serde_json::Value,
    timestamp: DateTime<Utc>,
  ) -> Self {
    Self {
      material_key: material_key.into(),
      resolved_config,
      structure_path: None,
      run_name: None,
      revision: None,
      timestamp,
      initial_state: RunState::new(),
    }
  }
}

/// Walks a workflow graph from its entry node and records every transition.
pub struct Executor {
  store: ArtifactStore,
}

/// How one node attempt resolved, after retry policy was applied.
enum Step {
  Advance { state: RunState, next: String },
  RetryAgain { reason: String },
  Fail { kind: FailureKind, message: String },
  Complete { state: RunState },
}

impl Executor {
  pub fn new(store: ArtifactStore) -> Self {
    Self { store }
  }

  /// Execute `graph` for the given request.
  ///
  /// Identity errors and run-directory collisions surface as `Err` before
  /// any artifact exists. Once the run directory is initialized, every
  /// failure is written to the log and manifest first, and the run returns
  /// `Ok` with a `failed` (or `cancelled`) outcome.
  pub async fn run(
    &self,
    graph: &WorkflowGraph,
    request: RunRequest,
    cancel: CancellationToken,
  ) -> Result<RunOutcome, ExecutionError> {
    let identity = RunIdentity::derive(
      &request.material_key,
      &request.resolved_config,
      request.timestamp,
      request.revision.as_deref(),
      request.run_name.as_deref(),
    )?;

    let handle = self.store.init(&identity).await?;
    info!(
      run_id = %identity.run_id(),
      material = %request.material_key,
      "run_started"
    );

    let mut manifest = Manifest::new(&identity, request.resolved_config.clone());
    manifest.structure = self.stage_input(&handle, &request).await?;
    handle.write_manifest(&manifest).await?;

    let mut state = request
      .initial_state
      .with("material_id", json!(request.material_key))
      .with("resolved_config", request.resolved_config.clone())
      .with(
        "structure",
        json!({
          "path": manifest.structure.path,
          "copied_path": manifest.structure.copied_path,
          "input_hash": manifest.structure.input_hash,
        }),
      );
    if let Some(run_name) = &request.run_name {
      state = state.with("run_name", json!(run_name));
    }

    let mut current = graph.entry().to_string();
    let mut attempt: u32 = 1;

    loop {
      // The only suspension point: between a node's exit and the next
      // node's entry.
      if cancel.is_cancelled() {
        return self.finish_cancelled(&handle, &mut manifest, &current).await;
      }

      let node = graph
        .node(&current)
        .ok_or_else(|| ExecutionError::UnknownNode(current.clone()))?;
      let policy = node.retry_policy();

      handle
        .append_log(&LogEntry::new(&current, LogEvent::Start).attempt(attempt))
        .await?;
      info!(node = %current, attempt, "node_started");

      let started_at = Utc::now();
      let result = node.execute(&state, attempt).await;
      let completed_at = Utc::now();

      let step = match result {
        NodeResult::Success { state: next_state, next } => {
          match route(graph, &current, next.as_deref(), &next_state) {
            Ok(next_node) => Step::Advance {
              state: next_state,
              next: next_node,
            },
            Err(message) => Step::Fail {
              kind: FailureKind::Routing,
              message,
            },
          }
        }
        NodeResult::Retry { reason, .. } => {
          if attempt < policy.max_attempts {
            Step::RetryAgain { reason }
          } else {
            Step::Fail {
              kind: FailureKind::RetriesExhausted,
              message: format!("retries exhausted after {attempt} attempts: {reason}"),
            }
          }
        }
        NodeResult::Failure { kind, message } => {
          if policy.is_retryable(kind) && attempt < policy.max_attempts {
            Step::RetryAgain {
              reason: format!("{kind}: {message}"),
            }
          } else {
            Step::Fail { kind, message }
          }
        }
        NodeResult::Terminal { state: final_state } => {
          if graph.is_terminal(&current) {
            Step::Complete { state: final_state }
          } else {
            Step::Fail {
              kind: FailureKind::Routing,
              message: format!(
                "node '{current}' returned a terminal result but has outgoing edges"
              ),
            }
          }
        }
      };

      match step {
        Step::Advance { state: next_state, next } => {
          handle
            .append_log(
              &LogEntry::new(&current, LogEvent::End)
                .attempt(attempt)
                .field("next", json!(next)),
            )
            .await?;
          record(&mut manifest, &current, attempt, started_at, completed_at, NodeOutcome::Advanced);
          mirror_retry(&mut manifest, &next_state);
          handle.write_manifest(&manifest).await?;

          state = next_state;
          current = next;
          attempt = 1;
        }
        Step::RetryAgain { reason } => {
          warn!(node = %current, attempt, reason = %reason, "node_retry");
          handle
            .append_log(
              &LogEntry::new(&current, LogEvent::Retry)
                .attempt(attempt)
                .message(reason),
            )
            .await?;
          record(&mut manifest, &current, attempt, started_at, completed_at, NodeOutcome::Retried);
          handle.write_manifest(&manifest).await?;

          attempt += 1;
        }
        Step::Fail { kind, message } => {
          return self
            .finish_failed(
              &handle,
              &mut manifest,
              &state,
              &current,
              attempt,
              started_at,
              kind,
              &message,
            )
            .await;
        }
        Step::Complete { state: final_state } => {
          return self
            .finish_succeeded(&handle, &mut manifest, &final_state, &current, attempt, started_at)
            .await;
        }
      }
    }
  }

  /// Copy the structure input (when given) and record its provenance.
  async fn stage_input(
    &self,
    handle: &RunHandle,
    request: &RunRequest,
  ) -> Result<StructureProvenance, ExecutionError> {
    let mut structure = StructureProvenance::default();
    let Some(source) = &request.structure_path else {
      return Ok(structure);
    };

    structure.path = Some(source.display().to_string());
    let dest = handle.copy_input(source).await?;
    let mut input_hash = sha256_file(&dest).map_err(orchid_artifact::ArtifactError::Io)?;
    input_hash.truncate(INPUT_HASH_LEN);

    handle
      .append_log(
        &LogEntry::new("executor", LogEvent::Info)
          .message("copied structure input")
          .field("source", json!(source.display().to_string()))
          .field("dest", json!(dest.display().to_string()))
          .field("input_hash", json!(input_hash)),
      )
      .await?;

    structure.copied_path = Some(dest.display().to_string());
    structure.input_hash = Some(input_hash);
    Ok(structure)
  }

  async fn finish_cancelled(
    &self,
    handle: &RunHandle,
    manifest: &mut Manifest,
    current: &str,
  ) -> Result<RunOutcome, ExecutionError> {
    warn!(node = %current, "run_cancelled");
    handle
      .append_log(&LogEntry::new(current, LogEvent::Cancelled).message("cancelled between nodes"))
      .await?;
    manifest.status = RunStatus::Cancelled;
    handle.write_manifest(manifest).await?;

    Ok(RunOutcome {
      status: RunStatus::Cancelled,
      run_dir: handle.run_dir().to_path_buf(),
      summary: None,
    })
  }

  #[allow(clippy::too_many_arguments)]
  async fn finish_failed(
    &self,
    handle: &RunHandle,
    manifest: &mut Manifest,
    state: &RunState,
    current: &str,
    attempt: u32,
    started_at: DateTime<Utc>,
    kind: FailureKind,
    message: &str,
  ) -> Result<RunOutcome, ExecutionError> {
    error!(node = %current, attempt, kind = %kind, message, "node_failed");
    handle
      .append_log(
        &LogEntry::new(current, LogEvent::Failure)
          .attempt(attempt)
          .message(message)
          .field("kind", json!(kind)),
      )
      .await?;

    record(manifest, current, attempt, started_at, Utc::now(), NodeOutcome::Failed);
    mirror_retry(manifest, state);
    manifest.status = RunStatus::Failed;
    manifest.error = Some(format!("{kind}: {message}"));
    handle.write_manifest(manifest).await?;

    let summary = build_summary(
      RunStatus::Failed,
      manifest,
      state,
      Some(&format!("{kind}: {message}")),
    );
    handle.write_results(&summary, &render_report(&summary)).await?;

    Ok(RunOutcome {
      status: RunStatus::Failed,
      run_dir: handle.run_dir().to_path_buf(),
      summary: Some(summary),
    })
  }

  async fn finish_succeeded(
    &self,
    handle: &RunHandle,
    manifest: &mut Manifest,
    final_state: &RunState,
    current: &str,
    attempt: u32,
    started_at: DateTime<Utc>,
  ) -> Result<RunOutcome, ExecutionError> {
    handle
      .append_log(&LogEntry::new(current, LogEvent::End).attempt(attempt))
      .await?;

    record(manifest, current, attempt, started_at, Utc::now(), NodeOutcome::Completed);
    mirror_retry(manifest, final_state);
    manifest.status = RunStatus::Succeeded;
    handle.write_manifest(manifest).await?;

    let summary = build_summary(RunStatus::Succeeded, manifest, final_state, None);
    handle.write_results(&summary, &render_report(&summary)).await?;
    info!(run_id = %manifest.run_id, "run_completed");

    Ok(RunOutcome {
      status: RunStatus::Succeeded,
      run_dir: handle.run_dir().to_path_buf(),
      summary: Some(summary),
    })
  }
}

/// Resolve the successor of `current` after a successful node exit.
///
/// A node may name a successor directly, but it must be one the topology
/// declares; otherwise the edge routes: unconditionally, or through its
/// selector, whose choice must be a declared target.
fn route(
  graph: &WorkflowGraph,
  current: &str,
  requested: Option<&str>,
  state: &RunState,
) -> Result<String, String> {
  if graph.is_terminal(current) {
    return Err(format!(
      "terminal node '{current}' must return a terminal result, not a successor"
    ));
  }

  let Some(edge) = graph.edge(current) else {
    return Err(format!("node '{current}' has no outgoing edge"));
  };

  if let Some(requested) = requested {
    if edge.targets().contains(&requested) {
      return Ok(requested.to_string());
    }
    return Err(format!(
      "node '{current}' requested undeclared successor '{requested}'"
    ));
  }

  match edge {
    Edge::Unconditional(to) => Ok(to.clone()),
    Edge::Conditional { selector, targets } => {
      // Evaluated exactly once per node exit.
      let choice = selector(state);
      if targets.contains(&choice) {
        Ok(choice)
      } else {
        Err(format!(
          "selector for '{current}' chose undeclared target '{choice}'"
        ))
      }
    }
  }
}

fn record(
  manifest: &mut Manifest,
  node: &str,
  attempt: u32,
  started_at: DateTime<Utc>,
  completed_at: DateTime<Utc>,
  outcome: NodeOutcome,
) {
  manifest.push_transition(TransitionRecord {
    node: node.to_string(),
    attempt,
    started_at,
    completed_at,
    outcome,
  });
}

/// Keep the manifest's retry block in step with the state's.
fn mirror_retry(manifest: &mut Manifest, state: &RunState) {
  if let Some(retry) = state.get("retry") {
    manifest.retry = Some(retry.clone());
  }
}
