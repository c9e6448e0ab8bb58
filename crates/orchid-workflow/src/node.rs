//! The node contract and its result/retry types.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::state::RunState;

/// Classification of a node failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
  /// The structure input is missing or unusable.
  Structure,
  /// The calculation plan could not be built from the config.
  Plan,
  /// The energy/force evaluation failed.
  Calculation,
  /// Result validation could not be performed.
  Validation,
  /// A node returned a successor the graph does not declare for it.
  Routing,
  /// A transient kernel error (typically retryable).
  Kernel,
  /// A node's retry budget ran out.
  RetriesExhausted,
}

impl std::fmt::Display for FailureKind {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    let s = match self {
      FailureKind::Structure => "structure",
      FailureKind::Plan => "plan",
      FailureKind::Calculation => "calculation",
      FailureKind::Validation => "validation",
      FailureKind::Routing => "routing",
      FailureKind::Kernel => "kernel",
      FailureKind::RetriesExhausted => "retries_exhausted",
    };
    f.write_str(s)
  }
}

/// What a node invocation produced. Exactly one variant per invocation.
#[derive(Debug, Clone)]
pub enum NodeResult {
  /// The node succeeded. `next` may name a declared successor directly;
  /// `None` defers routing to the node's outgoing edge.
  Success {
    state: RunState,
    next: Option<String>,
  },
  /// A retryable condition; the executor re-invokes while the node's
  /// policy allows.
  Retry { reason: String, attempt: u32 },
  /// An unrecoverable condition; the run terminates as failed.
  Failure { kind: FailureKind, message: String },
  /// The run's final state; the run terminates as succeeded.
  Terminal { state: RunState },
}

/// A node's own retry policy: how many attempts it gets, and which failure
/// kinds count as retryable rather than fatal.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
  pub max_attempts: u32,
  pub retryable: Vec<FailureKind>,
}

impl Default for RetryPolicy {
  /// One attempt, nothing retryable.
  fn default() -> Self {
    Self {
      max_attempts: 1,
      retryable: Vec::new(),
    }
  }
}

impl RetryPolicy {
  pub fn attempts(max_attempts: u32) -> Self {
    Self {
      max_attempts: max_attempts.max(1),
      retryable: Vec::new(),
    }
  }

  #[must_use]
  pub fn retry_on(mut self, kind: FailureKind) -> Self {
    self.retryable.push(kind);
    self
  }

  pub fn is_retryable(&self, kind: FailureKind) -> bool {
    self.retryable.contains(&kind)
  }
}

/// The contract every workflow step implements.
///
/// Nodes are side-effect-free with respect to orchestration state: they may
/// compute whatever they like, but they never write run artifacts; only
/// the executor does, through the artifact store.
#[async_trait]
pub trait Node: Send + Sync {
  /// Execute against an immutable state snapshot. `attempt` starts at 1.
  async fn execute(&self, state: &RunState, attempt: u32) -> NodeResult;

  /// The node's retry policy. Defaults to a single attempt.
  fn retry_policy(&self) -> RetryPolicy {
    RetryPolicy::default()
  }
}
