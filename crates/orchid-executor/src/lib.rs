//! Orchid Executor
//!
//! This crate walks a validated workflow graph node by node, strictly
//! sequentially, and records every transition through the artifact store:
//! a log line per event, an atomically rewritten manifest per transition,
//! and results exactly once at termination.
//!
//! The executor owns the in-memory run state while a run is in flight; the
//! artifact store owns everything on disk. Nodes never write artifacts.
//!
//! Cancellation is cooperative and is only consulted between nodes: a
//! cancelled run logs the event, flushes the manifest with status
//! `cancelled`, and exits without writing results.

mod error;
mod executor;
mod outcome;

pub use error::ExecutionError;
pub use executor::{Executor, RunRequest};
pub use outcome::RunOutcome;
