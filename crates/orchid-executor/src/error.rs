use thiserror::Error;

/// Errors surfaced by the executor itself.
///
/// Node failures are not in this enum: a failed node terminates the run
/// with a recorded `failed` outcome (see [`crate::RunOutcome`]), because
/// by then the run directory exists and the failure is part of its record.
/// This enum covers what prevents or interrupts record-keeping.
#[derive(Debug, Error)]
pub enum ExecutionError {
  /// Run identity could not be derived; no artifact was created.
  #[error(transparent)]
  Identity(#[from] orchid_identity::IdentityError),

  /// The artifact store refused or failed an operation.
  #[error(transparent)]
  Artifact(#[from] orchid_artifact::ArtifactError),

  /// The executor was asked to enter a node the graph does not contain.
  /// Graph validation makes this unreachable for well-formed graphs.
  #[error("node not present in graph: {0}")]
  UnknownNode(String),
}
