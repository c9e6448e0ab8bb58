//! Orchid Artifact
//!
//! This crate owns the on-disk run directory. It is the only component
//! permitted to write under a run's subtree; everything else hands it data.
//!
//! Write discipline:
//! - the run directory is created exactly once (`AlreadyExists` on
//!   collision, never a silent overwrite)
//! - the log is append-only, one complete JSON line per call
//! - the manifest is replaced atomically (tmp + rename), so a reader never
//!   observes a half-written file
//! - results are written once, at termination, never mid-run

mod log;
mod manifest;
mod store;

pub use log::{LogEntry, LogEvent};
pub use manifest::{Manifest, NodeOutcome, RunStatus, StructureProvenance, TransitionRecord};
pub use store::{ArtifactStore, RunHandle};

use std::path::PathBuf;

/// Error type for artifact storage operations.
#[derive(Debug, thiserror::Error)]
pub enum ArtifactError {
  /// The target already exists and must not be overwritten.
  #[error("artifact already exists: {0}")]
  AlreadyExists(PathBuf),

  /// A structure input was referenced but does not exist on disk.
  #[error("input file not found: {0}")]
  InputNotFound(PathBuf),

  /// An I/O error occurred.
  #[error("io error: {0}")]
  Io(#[from] std::io::Error),

  /// An artifact could not be serialized.
  #[error("serialization error: {0}")]
  Serialize(#[from] serde_json::Error),
}
