use thiserror::Error;

/// Structural errors, raised at graph construction, never mid-run.
#[derive(Debug, Error)]
pub enum GraphError {
  #[error("duplicate node name: {0}")]
  DuplicateNode(String),

  #[error("no entry node declared")]
  MissingEntry,

  #[error("entry node not found: {0}")]
  EntryNotFound(String),

  #[error("edge references unknown node: from={from}, to={to}")]
  InvalidEdge { from: String, to: String },

  #[error("edge declared from unknown node: {0}")]
  UnknownSource(String),

  #[error("node '{0}' already has an outgoing edge")]
  DuplicateEdge(String),

  #[error("conditional edge from '{0}' declares no targets")]
  EmptyTargets(String),

  #[error("node unreachable from entry: {0}")]
  Unreachable(String),

  #[error("graph has no terminal node")]
  NoTerminal,

  #[error("cycle of unconditional edges through node '{0}' can never terminate")]
  UnboundedCycle(String),
}
